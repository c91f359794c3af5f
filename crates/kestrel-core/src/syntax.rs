//! Picking a syntax definition for a buffer.

use std::sync::Arc;

use kestrel_buffer::TextStore;
use kestrel_syntax::{
    Header, Highlighter, SyntaxFile, matches_filetype, parse_def, parse_file, parse_ft_detect,
    resolve_includes,
};
use tracing::debug;

use crate::buffer::Buffer;
use crate::{CoreError, SyntaxLoadError};

impl Buffer {
    /// Selects the syntax definition and rebuilds highlighting.
    ///
    /// Without a declared filetype the first definition whose detector
    /// matches the path or first line wins; otherwise the first definition
    /// with that filetype. If nothing is selected the current definition
    /// and highlighter are kept.
    ///
    /// Load warnings still pending from an earlier run are replaced by the
    /// ones from this run.
    pub fn update_rules(&mut self) {
        self.warnings.retain(|w| !matches!(w, CoreError::SyntaxLoad { .. }));

        let ctx = Arc::clone(&self.ctx);
        let mut selected = None;
        let mut files: Vec<SyntaxFile> = Vec::new();

        for runtime_file in ctx.runtime.syntax_files() {
            let name = runtime_file.name();
            let loaded = runtime_file
                .data()
                .map_err(SyntaxLoadError::from)
                .and_then(|data| Ok(parse_file(&data)?))
                .and_then(|file| Ok((parse_ft_detect(&file)?, file)));
            let (detect, file) = match loaded {
                Ok(loaded) => loaded,
                Err(source) => {
                    self.record_warning(syntax_load(name, source));
                    continue;
                }
            };

            let wanted = if selected.is_some() {
                false
            } else if self.settings.has_file_type() {
                file.file_type() == self.settings.filetype
            } else {
                matches_filetype(&detect, &self.path, self.lines.line_bytes(0))
            };

            if wanted {
                match parse_def(&file, Header::new(file.file_type(), detect)) {
                    Ok(def) => {
                        debug!("Selected syntax {} from {}", def.file_type(), name);
                        selected = Some(def);
                    }
                    Err(e) => {
                        self.record_warning(syntax_load(name, e.into()));
                        continue;
                    }
                }
            }
            files.push(file);
        }

        let rehighlight = selected.is_some();
        if let Some(mut def) = selected {
            resolve_includes(&mut def, &files);
            self.syntax_def = Some(Arc::new(def));
        }

        if self.highlighter.is_none() || rehighlight {
            if let Some(def) = &self.syntax_def {
                self.settings.filetype = def.file_type().to_string();
                let mut highlighter = Highlighter::new(Arc::clone(def));
                if self.settings.syntax {
                    highlighter.highlight_states(&self.lines);
                }
                self.highlighter = Some(highlighter);
            }
        }
    }
}

fn syntax_load(name: &str, source: SyntaxLoadError) -> CoreError {
    CoreError::SyntaxLoad {
        name: name.to_string(),
        source,
    }
}
