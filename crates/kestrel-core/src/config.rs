//! Configuration and per-buffer settings.
//!
//! ## Learning: Serde for validation
//!
//! `Settings` is a plain struct with `#[serde(default, deny_unknown_fields)]`.
//! Missing keys fall back to `Default`, while a misspelled key or a value of
//! the wrong type is rejected when the file is loaded instead of surfacing
//! later as a failed lookup.
//!
//! ## Layout
//!
//! ```toml
//! [settings]
//! saveundo = true
//!
//! [[local]]
//! pattern = "*.bat"
//! fileformat = "dos"
//!
//! [[local]]
//! pattern = "ft:go"
//! eofnewline = true
//! ```
//!
//! `pattern` is a glob matched against the file name and the full path, or
//! `ft:<filetype>` which applies once the buffer's filetype is known.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the config directory.
pub const CONFIG_HOME_VAR: &str = "KESTREL_CONFIG_HOME";

/// Line terminator written when saving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    #[default]
    Unix,
    Dos,
}

impl FileFormat {
    pub fn eol(&self) -> &'static [u8] {
        match self {
            FileFormat::Unix => b"\n",
            FileFormat::Dos => b"\r\n",
        }
    }
}

impl std::str::FromStr for FileFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unix" => Ok(FileFormat::Unix),
            "dos" => Ok(FileFormat::Dos),
            other => Err(format!("unknown file format {other:?} (expected unix or dos)")),
        }
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            FileFormat::Unix => "unix",
            FileFormat::Dos => "dos",
        })
    }
}

/// Settings a buffer consults while loading and saving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Track modification with a flag instead of hashing the content
    pub fastdirty: bool,

    /// Restore the cursor from the previous session
    pub savecursor: bool,

    /// Restore undo history from the previous session
    pub saveundo: bool,

    /// Make sure saved files end in a newline
    pub eofnewline: bool,

    pub fileformat: FileFormat,

    /// Declared filetype; "unknown" lets the resolver detect one
    pub filetype: String,

    /// Compute highlight state
    pub syntax: bool,

    /// Helper used for privileged saves
    pub sucmd: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fastdirty: false,
            savecursor: false,
            saveundo: false,
            eofnewline: true,
            fileformat: FileFormat::Unix,
            filetype: "unknown".to_string(),
            syntax: true,
            sucmd: "sudo".to_string(),
        }
    }
}

impl Settings {
    /// Returns true if a filetype has been declared or detected.
    pub fn has_file_type(&self) -> bool {
        !(self.filetype.is_empty() || self.filetype.eq_ignore_ascii_case("unknown"))
    }
}

/// One `[[local]]` entry: a pattern plus the settings it overrides.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalOverride {
    pub pattern: String,
    pub fastdirty: Option<bool>,
    pub savecursor: Option<bool>,
    pub saveundo: Option<bool>,
    pub eofnewline: Option<bool>,
    pub fileformat: Option<FileFormat>,
    pub filetype: Option<String>,
    pub syntax: Option<bool>,
    pub sucmd: Option<String>,
}

impl LocalOverride {
    fn apply(&self, settings: &mut Settings) {
        if let Some(v) = self.fastdirty {
            settings.fastdirty = v;
        }
        if let Some(v) = self.savecursor {
            settings.savecursor = v;
        }
        if let Some(v) = self.saveundo {
            settings.saveundo = v;
        }
        if let Some(v) = self.eofnewline {
            settings.eofnewline = v;
        }
        if let Some(v) = self.fileformat {
            settings.fileformat = v;
        }
        if let Some(v) = &self.filetype {
            settings.filetype = v.clone();
        }
        if let Some(v) = self.syntax {
            settings.syntax = v;
        }
        if let Some(v) = &self.sucmd {
            settings.sucmd = v.clone();
        }
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    Glob(Regex),
    FileType(String),
}

#[derive(Debug, Clone)]
struct LocalSettings {
    matcher: Matcher,
    overrides: LocalOverride,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    settings: Settings,
    local: Vec<LocalOverride>,
}

/// Process-wide configuration.
#[derive(Debug, Clone)]
pub struct Config {
    dir: PathBuf,

    /// Global settings every buffer starts from
    pub settings: Settings,

    local: Vec<LocalSettings>,
}

impl Config {
    /// Configuration with default settings rooted at `dir`.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            settings: Settings::default(),
            local: Vec::new(),
        }
    }

    /// Resolves the config directory and loads `settings.toml` from it.
    pub fn load(explicit_dir: Option<&Path>) -> Result<Self, ConfigError> {
        let dir = Self::resolve_dir(explicit_dir)?;
        Self::load_from(dir)
    }

    /// Picks the config directory: explicit, then `$KESTREL_CONFIG_HOME`,
    /// then the platform config dir.
    pub fn resolve_dir(explicit_dir: Option<&Path>) -> Result<PathBuf, ConfigError> {
        if let Some(dir) = explicit_dir {
            return Ok(dir.to_path_buf());
        }
        if let Some(dir) = std::env::var_os(CONFIG_HOME_VAR).filter(|d| !d.is_empty()) {
            return Ok(PathBuf::from(dir));
        }
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("kestrel"))
    }

    /// Loads `<dir>/settings.toml`; a missing file yields defaults.
    pub fn load_from(dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let dir = dir.into();
        let path = dir.join("settings.toml");
        match std::fs::read_to_string(&path) {
            Ok(content) => Self::from_toml(dir, &content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::with_dir(dir)),
            Err(e) => Err(e.into()),
        }
    }

    /// Parses configuration text, compiling every local pattern.
    pub fn from_toml(dir: impl Into<PathBuf>, content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content)?;
        let local = file
            .local
            .into_iter()
            .map(|overrides| {
                let matcher = match overrides.pattern.strip_prefix("ft:") {
                    Some(ft) => Matcher::FileType(ft.to_string()),
                    None => Matcher::Glob(glob_to_regex(&overrides.pattern)?),
                };
                Ok(LocalSettings { matcher, overrides })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self {
            dir: dir.into(),
            settings: file.settings,
            local,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Directory holding session files.
    pub fn buffers_dir(&self) -> PathBuf {
        self.dir.join("buffers")
    }

    /// Directory holding user syntax files.
    pub fn syntax_dir(&self) -> PathBuf {
        self.dir.join("syntax")
    }

    /// Global settings with every matching glob override applied.
    pub fn settings_for_path(&self, path: &str) -> Settings {
        let mut settings = self.settings.clone();
        let file_name = Path::new(path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());

        for local in &self.local {
            if let Matcher::Glob(re) = &local.matcher {
                let hit = re.is_match(path) || file_name.as_deref().is_some_and(|n| re.is_match(n));
                if hit {
                    local.overrides.apply(&mut settings);
                }
            }
        }
        settings
    }

    /// Applies `ft:` overrides matching the current filetype.
    pub fn apply_file_type_overrides(&self, settings: &mut Settings) {
        for local in &self.local {
            if let Matcher::FileType(ft) = &local.matcher {
                if *ft == settings.filetype {
                    local.overrides.apply(settings);
                }
            }
        }
    }
}

/// Converts a glob into an anchored regex.
///
/// `**` matches across directories, `*` and `?` stay within one component.
fn glob_to_regex(glob: &str) -> Result<Regex, ConfigError> {
    let mut re = String::from("^");
    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                re.push_str(".*");
            }
            '*' => re.push_str("[^/]*"),
            '?' => re.push_str("[^/]"),
            c => re.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    re.push('$');

    Regex::new(&re).map_err(|source| ConfigError::InvalidPattern {
        pattern: glob.to_string(),
        source,
    })
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config directory not found")]
    NoConfigDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert!(!settings.fastdirty);
        assert!(settings.eofnewline);
        assert_eq!(settings.fileformat, FileFormat::Unix);
        assert_eq!(settings.sucmd, "sudo");
        assert!(!settings.has_file_type());
    }

    #[test]
    fn test_has_file_type() {
        let mut settings = Settings::default();
        settings.filetype = "Unknown".into();
        assert!(!settings.has_file_type());
        settings.filetype = String::new();
        assert!(!settings.has_file_type());
        settings.filetype = "c".into();
        assert!(settings.has_file_type());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(dir.path()).unwrap();
        assert_eq!(config.settings, Settings::default());
        assert_eq!(config.buffers_dir(), dir.path().join("buffers"));
    }

    #[test]
    fn test_load_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("settings.toml"),
            "[settings]\nsaveundo = true\nfileformat = \"dos\"\n",
        )
        .unwrap();

        let config = Config::load_from(dir.path()).unwrap();
        assert!(config.settings.saveundo);
        assert_eq!(config.settings.fileformat, FileFormat::Dos);
        assert!(config.settings.eofnewline);
    }

    #[test]
    fn test_unknown_keys_fail_fast() {
        let err = Config::from_toml("/tmp", "[settings]\nsavecursr = true\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let err = Config::from_toml("/tmp", "[settings]\nsavecursor = \"yes\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_glob_overrides() {
        let config = Config::from_toml(
            "/tmp",
            r#"
[[local]]
pattern = "*.bat"
fileformat = "dos"

[[local]]
pattern = "/srv/**"
sucmd = "doas"
"#,
        )
        .unwrap();

        let bat = config.settings_for_path("scripts/run.bat");
        assert_eq!(bat.fileformat, FileFormat::Dos);

        let srv = config.settings_for_path("/srv/www/index.html");
        assert_eq!(srv.sucmd, "doas");
        assert_eq!(srv.fileformat, FileFormat::Unix);
    }

    #[test]
    fn test_file_type_overrides() {
        let config = Config::from_toml(
            "/tmp",
            "[[local]]\npattern = \"ft:go\"\neofnewline = false\n",
        )
        .unwrap();

        let mut settings = config.settings_for_path("main.go");
        assert!(settings.eofnewline);

        settings.filetype = "go".into();
        config.apply_file_type_overrides(&mut settings);
        assert!(!settings.eofnewline);
    }

    #[test]
    fn test_glob_to_regex() {
        let re = glob_to_regex("a?c.*").unwrap();
        assert!(re.is_match("abc.rs"));
        assert!(!re.is_match("abcxrs"));
        assert!(!re.is_match("a/c.rs"));
    }

    #[test]
    fn test_file_format_parse() {
        assert_eq!("DOS".parse::<FileFormat>(), Ok(FileFormat::Dos));
        assert!("mac".parse::<FileFormat>().is_err());
        assert_eq!(FileFormat::Dos.eol(), b"\r\n");
    }
}
