//! Line-state highlighting.
//!
//! ## How it works
//!
//! Each line is highlighted from the state left behind by the line above.
//! A state is the stack of regions still open at the end of a line, written
//! as indices into the rule tree. Because a line's result depends only on
//! its bytes and its incoming state, an edit only needs to re-highlight
//! from the edited line until the outgoing state matches what was stored
//! before.
//!
//! Spans inside a line are produced outermost first, so when spans overlap
//! the later one is the more specific.

use std::sync::Arc;

use kestrel_buffer::TextStore;
use tracing::trace;

use crate::def::{Def, Region, Rule};

/// Regions open at the end of a line, outermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct State(Vec<usize>);

impl State {
    /// Number of open regions.
    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

/// A highlighted byte range of a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub group: String,
}

/// All spans of one line.
pub type LineMatch = Vec<Span>;

/// Highlights lines of text against one definition.
#[derive(Debug, Clone)]
pub struct Highlighter {
    def: Arc<Def>,
    states: Vec<State>,
    matches: Vec<LineMatch>,
}

impl Highlighter {
    pub fn new(def: Arc<Def>) -> Self {
        Self {
            def,
            states: Vec::new(),
            matches: Vec::new(),
        }
    }

    pub fn def(&self) -> &Def {
        &self.def
    }

    /// End-of-line state of line `n`, if it has been highlighted.
    pub fn state(&self, n: usize) -> Option<&State> {
        self.states.get(n)
    }

    /// Spans of line `n`; empty if it has not been highlighted.
    pub fn line_match(&self, n: usize) -> &[Span] {
        self.matches.get(n).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Highlights every line of `text` from scratch.
    pub fn highlight_states(&mut self, text: &impl TextStore) {
        self.states.clear();
        self.matches.clear();
        self.highlight_from(text, 0);
    }

    /// Re-highlights from line `start` after an edit.
    ///
    /// When the line count is unchanged, stops as soon as a line's outgoing
    /// state equals the stored one. Returns the last line recomputed.
    pub fn highlight_from(&mut self, text: &impl TextStore, start: usize) -> usize {
        let count = text.line_count();
        let reshaped = self.states.len() != count;
        self.states.resize(count, State::default());
        self.matches.resize(count, LineMatch::new());

        let start = start.min(count.saturating_sub(1));
        let mut state = match start {
            0 => State::default(),
            n => self.states[n - 1].clone(),
        };

        let mut last = start;
        for y in start..count {
            let (spans, next) = self.highlight_line(text.line_bytes(y), &state);
            let converged = !reshaped && y > start && next == self.states[y];
            self.matches[y] = spans;
            self.states[y] = next.clone();
            state = next;
            last = y;
            if converged {
                break;
            }
        }

        trace!("Highlighted lines {}..={}", start, last);
        last
    }

    /// Highlights a single line starting in `state`.
    pub fn highlight_line(&self, line: &[u8], state: &State) -> (LineMatch, State) {
        let mut spans = LineMatch::new();
        let mut stack = state.0.clone();
        let mut pos = 0;

        loop {
            match self.region_at(&stack) {
                Some(region) => {
                    let end = find_end(region, line, pos);
                    let stop = end.map_or(line.len(), |(s, _)| s);

                    if let Some((idx, s, e)) = next_region(&region.rules, line, pos, stop) {
                        push_span(&mut spans, pos, s, &region.group);
                        patterns(&region.rules, line, pos, s, &mut spans);
                        if let Rule::Region(inner) = &region.rules[idx] {
                            push_span(&mut spans, s, e, &inner.group);
                        }
                        stack.push(idx);
                        pos = e;
                        continue;
                    }

                    let body_end = end.map_or(line.len(), |(_, e)| e);
                    push_span(&mut spans, pos, body_end, &region.group);
                    patterns(&region.rules, line, pos, stop, &mut spans);

                    match end {
                        Some((_, e)) => {
                            stack.pop();
                            pos = e;
                        }
                        None => break,
                    }
                }
                None => {
                    let next = next_region(&self.def.rules, line, pos, line.len());
                    let stop = next.map_or(line.len(), |(_, s, _)| s);
                    patterns(&self.def.rules, line, pos, stop, &mut spans);

                    match next {
                        Some((idx, s, e)) => {
                            if let Rule::Region(region) = &self.def.rules[idx] {
                                push_span(&mut spans, s, e, &region.group);
                            }
                            stack.push(idx);
                            pos = e;
                        }
                        None => break,
                    }
                }
            }
        }

        (spans, State(stack))
    }

    /// Follows a stack of rule indices down to the innermost open region.
    fn region_at(&self, stack: &[usize]) -> Option<&Region> {
        let mut rules = &self.def.rules;
        let mut current = None;
        for &idx in stack {
            match rules.get(idx) {
                Some(Rule::Region(region)) => {
                    rules = &region.rules;
                    current = Some(region);
                }
                _ => return None,
            }
        }
        current
    }
}

fn push_span(spans: &mut LineMatch, start: usize, end: usize, group: &str) {
    if end > start {
        spans.push(Span {
            start,
            end,
            group: group.to_string(),
        });
    }
}

/// Finds where `region` closes, stepping over `skip` matches.
fn find_end(region: &Region, line: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut pos = from;
    loop {
        let end = region.end.find_at(line, pos)?;
        if let Some(skip) = &region.skip {
            if let Some(hit) = skip.find_at(line, pos) {
                if hit.start() < end.start() && hit.end() > hit.start() {
                    pos = hit.end();
                    continue;
                }
            }
        }
        return Some((end.start(), end.end()));
    }
}

/// Earliest non-empty region opening in `rules` that starts before `limit`.
fn next_region(rules: &[Rule], line: &[u8], from: usize, limit: usize) -> Option<(usize, usize, usize)> {
    let mut best: Option<(usize, usize, usize)> = None;
    for (idx, rule) in rules.iter().enumerate() {
        let Rule::Region(region) = rule else { continue };
        let Some(m) = region.start.find_at(line, from) else {
            continue;
        };
        if m.start() >= limit || m.end() == m.start() {
            continue;
        }
        if best.is_none_or(|(_, s, _)| m.start() < s) {
            best = Some((idx, m.start(), m.end()));
        }
    }
    best
}

/// Adds a span for every pattern match fully inside `from..to`.
fn patterns(rules: &[Rule], line: &[u8], from: usize, to: usize, spans: &mut LineMatch) {
    let to = to.min(line.len());
    for rule in rules {
        let Rule::Pattern(pattern) = rule else { continue };
        for m in pattern.regex.find_iter(&line[..to]) {
            if m.start() >= from && m.end() > m.start() {
                push_span(spans, m.start(), m.end(), &pattern.group);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::{Header, parse_file, parse_ft_detect};
    use crate::def::parse_def;
    use kestrel_buffer::{Endings, LineArray, Loc};

    const LANG: &str = r#"
filetype = "toy"

[[rules]]
group = "keyword"
pattern = '\blet\b'

[[rules]]
group = "string"
start = '"'
end = '"'
skip = '\\.'

[[rules]]
group = "comment"
start = '/\*'
end = '\*/'

[[rules.rules]]
group = "todo"
pattern = 'TODO'
"#;

    fn highlighter() -> Highlighter {
        let file = parse_file(LANG.as_bytes()).unwrap();
        let header = Header::new(file.file_type(), parse_ft_detect(&file).unwrap());
        Highlighter::new(Arc::new(parse_def(&file, header).unwrap()))
    }

    fn groups(spans: &[Span]) -> Vec<&str> {
        spans.iter().map(|s| s.group.as_str()).collect()
    }

    #[test]
    fn test_patterns_on_plain_line() {
        let h = highlighter();
        let (spans, state) = h.highlight_line(b"let x = 1", &State::default());
        assert_eq!(state.depth(), 0);
        assert_eq!(spans, vec![Span { start: 0, end: 3, group: "keyword".into() }]);
    }

    #[test]
    fn test_pattern_not_matched_inside_region() {
        let h = highlighter();
        let (spans, _) = h.highlight_line(br#""let" let"#, &State::default());
        assert_eq!(groups(&spans), vec!["string", "string", "keyword"]);
        assert_eq!(spans[2].start, 6);
    }

    #[test]
    fn test_skip_escapes() {
        let h = highlighter();
        let (spans, state) = h.highlight_line(br#""a\"b" let"#, &State::default());
        assert_eq!(state.depth(), 0);
        let string_end = spans
            .iter()
            .filter(|s| s.group == "string")
            .map(|s| s.end)
            .max();
        assert_eq!(string_end, Some(6));
    }

    #[test]
    fn test_region_spans_lines_with_nested_pattern() {
        let mut h = highlighter();
        let text = LineArray::from_bytes(b"/* TODO\nmore */ let", Endings::Auto);
        h.highlight_states(&text);

        assert_eq!(h.state(0).map(State::depth), Some(1));
        assert!(groups(h.line_match(0)).contains(&"todo"));
        assert_eq!(h.state(1).map(State::depth), Some(0));
        assert_eq!(groups(h.line_match(1)), vec!["comment", "keyword"]);
    }

    #[test]
    fn test_highlight_from_after_edit() {
        let mut h = highlighter();
        let mut text = LineArray::from_bytes(b"a\nb\nc", Endings::Auto);
        h.highlight_states(&text);

        // Opening a comment on line 0 changes every state below it
        text.insert(Loc::new(0, 0), b"/*").unwrap();
        let last = h.highlight_from(&text, 0);
        assert_eq!(last, 2);
        assert_eq!(h.state(2).map(State::depth), Some(1));

        // A change that does not alter states converges right away
        text.insert(Loc::new(0, 1), b"x").unwrap();
        let last = h.highlight_from(&text, 1);
        assert_eq!(last, 2);
    }

    #[test]
    fn test_highlight_from_after_line_count_change() {
        let mut h = highlighter();
        let mut text = LineArray::from_bytes(b"let\nlet", Endings::Auto);
        h.highlight_states(&text);

        text.insert(Loc::new(3, 0), b"\nlet").unwrap();
        h.highlight_from(&text, 0);
        for y in 0..3 {
            assert_eq!(groups(h.line_match(y)), vec!["keyword"]);
        }
    }
}
