//! Runtime files.
//!
//! Syntax definitions come from two places: the user's `<config>/syntax`
//! directory and the definitions compiled into the binary. Both are exposed
//! through the same `RuntimeFile` trait so the resolver does not care where a
//! file lives. Disk files are read only when the resolver asks for them.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::Config;

/// A named file whose contents can be read on demand.
pub trait RuntimeFile: Send + Sync + std::fmt::Debug {
    /// Name without extension
    fn name(&self) -> &str;

    /// Reads the contents.
    fn data(&self) -> std::io::Result<Vec<u8>>;
}

/// A runtime file on disk.
#[derive(Debug, Clone)]
pub struct RealFile {
    name: String,
    path: PathBuf,
}

impl RealFile {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RuntimeFile for RealFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn data(&self) -> std::io::Result<Vec<u8>> {
        std::fs::read(&self.path)
    }
}

/// A runtime file held in memory.
#[derive(Debug, Clone)]
pub struct MemoryFile {
    name: String,
    data: Cow<'static, [u8]>,
}

impl MemoryFile {
    pub fn new(name: impl Into<String>, data: impl Into<Cow<'static, [u8]>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

impl RuntimeFile for MemoryFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn data(&self) -> std::io::Result<Vec<u8>> {
        Ok(self.data.to_vec())
    }
}

const BUILTIN_SYNTAX: &[(&str, &str)] = &[
    ("c", include_str!("../runtime/syntax/c.toml")),
    ("cpp", include_str!("../runtime/syntax/cpp.toml")),
    ("markdown", include_str!("../runtime/syntax/markdown.toml")),
    ("rust", include_str!("../runtime/syntax/rust.toml")),
    ("shell", include_str!("../runtime/syntax/shell.toml")),
];

/// Registry of runtime files, in lookup order.
#[derive(Debug, Clone, Default)]
pub struct RuntimeFiles {
    syntax: Vec<Arc<dyn RuntimeFile>>,
}

impl RuntimeFiles {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// User syntax files first, then the built-in definitions.
    pub fn load(config: &Config) -> Self {
        let mut runtime = Self::new();
        runtime.add_syntax_dir(&config.syntax_dir());
        runtime.add_builtin_syntax();
        runtime
    }

    /// Appends the syntax definitions compiled into the binary.
    pub fn add_builtin_syntax(&mut self) {
        for (name, data) in BUILTIN_SYNTAX {
            self.add_syntax(MemoryFile::new(*name, data.as_bytes()));
        }
    }

    /// Appends every `*.toml` file in `dir`, sorted by name.
    ///
    /// A missing or unreadable directory adds nothing, and unreadable
    /// entries are skipped. Returns the number of files added.
    pub fn add_syntax_dir(&mut self, dir: &Path) -> usize {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
            Err(e) => {
                warn!("Skipping syntax directory {}: {}", dir.display(), e);
                return 0;
            }
        };

        let mut paths = Vec::new();
        for entry in entries {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    warn!("Skipping entry in {}: {}", dir.display(), e);
                    continue;
                }
            };
            if path.is_file() && path.extension().is_some_and(|ext| ext == "toml") {
                paths.push(path);
            }
        }
        paths.sort();

        let count = paths.len();
        for path in paths {
            let name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            self.add_syntax(RealFile::new(name, path));
        }
        debug!("Found {} syntax files in {}", count, dir.display());
        count
    }

    pub fn add_syntax(&mut self, file: impl RuntimeFile + 'static) {
        self.syntax.push(Arc::new(file));
    }

    /// Syntax files in lookup order.
    pub fn syntax_files(&self) -> impl Iterator<Item = &dyn RuntimeFile> {
        self.syntax.iter().map(|file| &**file as &dyn RuntimeFile)
    }
}
