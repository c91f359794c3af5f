//! Compiled syntax definitions.
//!
//! ## Learning: Recursive enums
//!
//! A region holds its own list of rules, which may hold regions again.
//! `Rule` is therefore a recursive type; the recursion goes through a `Vec`,
//! which already puts the children on the heap, so no `Box` is needed.

use regex::bytes::Regex;
use tracing::{debug, warn};

use crate::SyntaxError;
use crate::file::{Header, RawRule, SyntaxFile, compile};

/// A single highlight rule.
#[derive(Debug, Clone)]
pub enum Rule {
    /// Every match of `regex` gets `group`
    Pattern(Pattern),
    /// Text between `start` and `end` gets `group`, possibly across lines
    Region(Region),
    /// Placeholder for the rules of another filetype
    Include(String),
}

#[derive(Debug, Clone)]
pub struct Pattern {
    pub group: String,
    pub regex: Regex,
}

#[derive(Debug, Clone)]
pub struct Region {
    pub group: String,
    pub start: Regex,
    pub end: Regex,
    /// Matches inside the region that can never close it (escapes)
    pub skip: Option<Regex>,
    /// Rules applied inside the region
    pub rules: Vec<Rule>,
}

/// A compiled syntax definition.
#[derive(Debug, Clone)]
pub struct Def {
    pub header: Header,
    pub rules: Vec<Rule>,
}

impl Def {
    pub fn file_type(&self) -> &str {
        &self.header.file_type
    }

    /// Returns true if any `Include` placeholder is left in the rule tree.
    pub fn has_includes(&self) -> bool {
        fn any_include(rules: &[Rule]) -> bool {
            rules.iter().any(|rule| match rule {
                Rule::Include(_) => true,
                Rule::Region(region) => any_include(&region.rules),
                Rule::Pattern(_) => false,
            })
        }
        any_include(&self.rules)
    }
}

/// Compiles every rule of `file` into a definition identified by `header`.
pub fn parse_def(file: &SyntaxFile, header: Header) -> Result<Def, SyntaxError> {
    let rules = compile_rules(&file.raw.rules)?;
    Ok(Def { header, rules })
}

fn compile_rules(raw: &[RawRule]) -> Result<Vec<Rule>, SyntaxError> {
    raw.iter().map(compile_rule).collect()
}

fn compile_rule(raw: &RawRule) -> Result<Rule, SyntaxError> {
    if let Some(name) = &raw.include {
        return Ok(Rule::Include(name.clone()));
    }

    let group = raw
        .group
        .clone()
        .ok_or_else(|| SyntaxError::InvalidRule("rule without a group".into()))?;

    match (&raw.pattern, &raw.start, &raw.end) {
        (Some(pattern), None, None) => Ok(Rule::Pattern(Pattern {
            group,
            regex: compile(pattern)?,
        })),
        (None, Some(start), Some(end)) => Ok(Rule::Region(Region {
            group,
            start: compile(start)?,
            end: compile(end)?,
            skip: raw.skip.as_deref().map(compile).transpose()?,
            rules: compile_rules(&raw.rules)?,
        })),
        _ => Err(SyntaxError::InvalidRule(format!(
            "group {group:?} needs either `pattern` or both `start` and `end`"
        ))),
    }
}

/// Replaces every `Include` in `def` with the rules of the named filetype.
///
/// Includes are resolved recursively. An include naming a filetype that is
/// not in `files`, or one that would include itself again, is dropped.
/// Running this twice is harmless: the second pass finds nothing to do.
pub fn resolve_includes(def: &mut Def, files: &[SyntaxFile]) {
    let mut visiting = vec![def.file_type().to_string()];
    let rules = std::mem::take(&mut def.rules);
    def.rules = resolve_rules(rules, files, &mut visiting);
}

fn resolve_rules(rules: Vec<Rule>, files: &[SyntaxFile], visiting: &mut Vec<String>) -> Vec<Rule> {
    let mut out = Vec::with_capacity(rules.len());

    for rule in rules {
        match rule {
            Rule::Include(name) => {
                if visiting.contains(&name) {
                    debug!("Skipping recursive include of {}", name);
                    continue;
                }
                let Some(file) = files.iter().find(|f| f.file_type() == name) else {
                    debug!("Dropping include of unknown filetype {}", name);
                    continue;
                };
                match compile_rules(&file.raw.rules) {
                    Ok(included) => {
                        visiting.push(name);
                        out.extend(resolve_rules(included, files, visiting));
                        visiting.pop();
                    }
                    Err(e) => warn!("Cannot include {}: {}", name, e),
                }
            }
            Rule::Region(mut region) => {
                region.rules = resolve_rules(std::mem::take(&mut region.rules), files, visiting);
                out.push(Rule::Region(region));
            }
            pattern => out.push(pattern),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::{FtDetect, parse_file, parse_ft_detect};

    fn load(src: &str) -> (SyntaxFile, Def) {
        let file = parse_file(src.as_bytes()).unwrap();
        let header = Header::new(file.file_type(), parse_ft_detect(&file).unwrap());
        let def = parse_def(&file, header).unwrap();
        (file, def)
    }

    const C: &str = r#"
filetype = "c"

[[rules]]
group = "type"
pattern = '\bint\b'

[[rules]]
group = "comment"
start = '/\*'
end = '\*/'

[[rules.rules]]
group = "todo"
pattern = 'TODO'
"#;

    const CPP: &str = r#"
filetype = "cpp"

[[rules]]
group = "statement"
pattern = '\bclass\b'

[[rules]]
include = "c"
"#;

    #[test]
    fn test_parse_nested_region() {
        let (_, def) = load(C);
        assert_eq!(def.rules.len(), 2);
        match &def.rules[1] {
            Rule::Region(region) => {
                assert_eq!(region.group, "comment");
                assert_eq!(region.rules.len(), 1);
            }
            other => panic!("expected region, got {other:?}"),
        }
    }

    #[test]
    fn test_rule_without_pattern_is_invalid() {
        let file = parse_file(b"filetype = \"x\"\n[[rules]]\ngroup = \"g\"\n").unwrap();
        let header = Header::new("x", FtDetect::default());
        assert!(matches!(
            parse_def(&file, header),
            Err(SyntaxError::InvalidRule(_))
        ));
    }

    #[test]
    fn test_resolve_includes_splices_rules() {
        let (c_file, _) = load(C);
        let (cpp_file, mut def) = load(CPP);
        assert!(def.has_includes());

        resolve_includes(&mut def, &[c_file, cpp_file]);
        assert!(!def.has_includes());
        assert_eq!(def.rules.len(), 3);
    }

    #[test]
    fn test_resolve_includes_is_idempotent() {
        let (c_file, _) = load(C);
        let (cpp_file, mut def) = load(CPP);
        let files = [c_file, cpp_file];

        resolve_includes(&mut def, &files);
        let count = def.rules.len();
        resolve_includes(&mut def, &files);
        assert_eq!(def.rules.len(), count);
    }

    #[test]
    fn test_unknown_and_cyclic_includes_are_dropped() {
        let a = r#"
filetype = "a"
[[rules]]
include = "b"
[[rules]]
include = "missing"
"#;
        let b = r#"
filetype = "b"
[[rules]]
group = "b"
pattern = 'b'
[[rules]]
include = "a"
"#;
        let (a_file, mut def) = load(a);
        let (b_file, _) = load(b);

        resolve_includes(&mut def, &[a_file, b_file]);
        assert!(!def.has_includes());
        assert_eq!(def.rules.len(), 1);
    }
}
