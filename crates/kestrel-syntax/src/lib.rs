//! # Kestrel Syntax
//!
//! Rule-based syntax definitions and line-state highlighting.
//!
//! ## Pipeline
//!
//! ```text
//! bytes ──parse_file──▶ SyntaxFile ──parse_ft_detect──▶ FtDetect
//!                          │                               │
//!                          └──────parse_def(Header)────────┘
//!                                      │
//!                              resolve_includes
//!                                      │
//!                                      ▼
//!                         Highlighter::highlight_states
//! ```
//!
//! A `SyntaxFile` is cheap: it only deserializes the TOML document. Regexes
//! are compiled by `parse_ft_detect` (detection only) and `parse_def` (all
//! rules), so a resolver can scan many candidates and only pay for the
//! full compile of the one it selects.
//!
//! ## Rule file format
//!
//! ```toml
//! filetype = "c"
//!
//! [detect]
//! filename = '\.(c|h)$'
//!
//! [[rules]]
//! group = "statement"
//! pattern = '\b(if|else|return)\b'
//!
//! [[rules]]
//! group = "constant.string"
//! start = '"'
//! end = '"'
//! skip = '\\.'
//!
//! [[rules]]
//! include = "other-filetype"
//! ```

mod def;
mod file;
mod highlighter;

pub use def::{Def, Pattern, Region, Rule, parse_def, resolve_includes};
pub use file::{FtDetect, Header, SyntaxFile, matches_filetype, parse_file, parse_ft_detect};
pub use highlighter::{Highlighter, LineMatch, Span, State};

/// Errors that can occur while loading a syntax definition.
#[derive(Debug, thiserror::Error)]
pub enum SyntaxError {
    #[error("Syntax file is not valid UTF-8")]
    NotUtf8(#[from] std::str::Utf8Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid regex {pattern:?}: {source}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid rule: {0}")]
    InvalidRule(String),
}
