//! Syntax files and filetype detection.

use regex::bytes::Regex;
use serde::Deserialize;

use crate::SyntaxError;

/// Raw document shape of a syntax file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawSyntax {
    pub filetype: String,
    #[serde(default)]
    pub detect: RawDetect,
    #[serde(default)]
    pub rules: Vec<RawRule>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawDetect {
    pub filename: Option<String>,
    pub header: Option<String>,
}

/// One `[[rules]]` entry before compilation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawRule {
    pub group: Option<String>,
    pub pattern: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub skip: Option<String>,
    pub include: Option<String>,
    #[serde(default)]
    pub rules: Vec<RawRule>,
}

/// A deserialized, not yet compiled, syntax file.
#[derive(Debug, Clone)]
pub struct SyntaxFile {
    pub(crate) raw: RawSyntax,
}

impl SyntaxFile {
    /// The filetype this file defines.
    pub fn file_type(&self) -> &str {
        &self.raw.filetype
    }
}

/// Parses the bytes of a syntax file.
pub fn parse_file(data: &[u8]) -> Result<SyntaxFile, SyntaxError> {
    let text = std::str::from_utf8(data)?;
    let raw: RawSyntax = toml::from_str(text)?;
    if raw.filetype.trim().is_empty() {
        return Err(SyntaxError::InvalidRule("filetype must not be empty".into()));
    }
    Ok(SyntaxFile { raw })
}

/// Compiled detection predicates of a syntax file.
#[derive(Debug, Clone, Default)]
pub struct FtDetect {
    pub filename: Option<Regex>,
    pub header: Option<Regex>,
}

/// Compiles the `[detect]` table of a syntax file.
pub fn parse_ft_detect(file: &SyntaxFile) -> Result<FtDetect, SyntaxError> {
    let detect = &file.raw.detect;
    Ok(FtDetect {
        filename: detect.filename.as_deref().map(compile).transpose()?,
        header: detect.header.as_deref().map(compile).transpose()?,
    })
}

/// Returns true if `path` or `first_line` matches the detection predicates.
///
/// The filename predicate is tried first; the header predicate is only
/// consulted when the filename does not match.
pub fn matches_filetype(detect: &FtDetect, path: &str, first_line: &[u8]) -> bool {
    if detect
        .filename
        .as_ref()
        .is_some_and(|re| re.is_match(path.as_bytes()))
    {
        return true;
    }
    detect
        .header
        .as_ref()
        .is_some_and(|re| re.is_match(first_line))
}

/// Identity of a definition: its filetype and detection predicates.
#[derive(Debug, Clone)]
pub struct Header {
    pub file_type: String,
    pub ft_detect: FtDetect,
}

impl Header {
    pub fn new(file_type: impl Into<String>, ft_detect: FtDetect) -> Self {
        Self {
            file_type: file_type.into(),
            ft_detect,
        }
    }
}

pub(crate) fn compile(pattern: &str) -> Result<Regex, SyntaxError> {
    Regex::new(pattern).map_err(|source| SyntaxError::Regex {
        pattern: pattern.to_string(),
        source,
    })
}
