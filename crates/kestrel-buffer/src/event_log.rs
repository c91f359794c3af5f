//! Undo/redo event log.
//!
//! ## Learning: The Command Pattern
//!
//! Every edit is recorded as a `TextEvent` that knows how to apply itself and
//! how to build its inverse. Undo pops events and applies their inverses;
//! redo re-applies them.
//!
//! Events that happened within `UNDO_THRESHOLD` of each other are undone and
//! redone together, so a burst of typing is a single undo step.
//!
//! The log is `Serialize`/`Deserialize` so it can outlive the process. It
//! carries no reference to the text it describes; the `owner` id is
//! bookkeeping for which buffer adopted it and is never persisted.

use serde::{Deserialize, Serialize};
use similar::{Algorithm, DiffTag, capture_diff_slices};
use std::collections::VecDeque;
use std::ops::Range;
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::{BufferError, BufferResult, LineArray, Loc, TextStore};

/// Events closer together than this are undone as one step.
pub const UNDO_THRESHOLD: Duration = Duration::from_millis(500);

/// Default maximum number of undoable events.
const DEFAULT_MAX_EVENTS: usize = 10_000;

/// Unique identifier for a buffer instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BufferId(Uuid);

impl BufferId {
    /// Creates a new unique buffer ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BufferId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BufferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The type of edit an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Text was inserted
    Insert,
    /// Text was removed
    Remove,
}

/// A single recorded edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEvent {
    /// What kind of edit this is
    pub kind: EventKind,
    /// Where the edited text starts
    pub start: Loc,
    /// Where the edited text ends (after an insert, before a remove)
    pub end: Loc,
    /// The inserted or removed bytes, lines joined by `\n`
    pub text: Vec<u8>,
    /// When the edit happened
    pub time: SystemTime,
}

impl TextEvent {
    /// Applies this event to `lines`.
    fn apply(&self, lines: &mut LineArray) -> BufferResult<()> {
        match self.kind {
            EventKind::Insert => {
                lines.insert(self.start, &self.text)?;
            }
            EventKind::Remove => {
                lines.remove(self.start, self.end)?;
            }
        }
        Ok(())
    }

    /// Returns the event that reverses this one.
    pub fn inverse(&self) -> Self {
        Self {
            kind: match self.kind {
                EventKind::Insert => EventKind::Remove,
                EventKind::Remove => EventKind::Insert,
            },
            start: self.start,
            end: self.end,
            text: self.text.clone(),
            time: self.time,
        }
    }
}

/// Undo/redo history for one buffer.
///
/// ## Learning: VecDeque
///
/// The undo stack is a `VecDeque` so the oldest events can be dropped from
/// the front once `max_size` is reached, while undo pops from the back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLog {
    undo_stack: VecDeque<TextEvent>,
    redo_stack: Vec<TextEvent>,
    max_size: usize,
    #[serde(skip)]
    owner: Option<BufferId>,
}

impl EventLog {
    /// Creates an empty log keeping at most `max_size` undoable events.
    pub fn new(max_size: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            max_size,
            owner: None,
        }
    }

    /// Creates an empty log already bound to `owner`.
    pub fn bound_to(owner: BufferId) -> Self {
        let mut log = Self::default();
        log.rebind(owner);
        log
    }

    /// Binds this log to the buffer that will apply it from now on.
    ///
    /// A log restored from disk is unbound until its new owner adopts it.
    pub fn rebind(&mut self, owner: BufferId) {
        self.owner = Some(owner);
    }

    /// Returns the buffer this log is bound to.
    pub fn owner(&self) -> Option<BufferId> {
        self.owner
    }

    // ==================== Recording Edits ====================

    /// Inserts `text` at `loc` and records the edit.
    pub fn insert(&mut self, lines: &mut LineArray, loc: Loc, text: &[u8]) -> BufferResult<Loc> {
        self.insert_at(lines, loc, text, SystemTime::now())
    }

    /// Removes the text between `start` and `end` and records the edit.
    pub fn remove(&mut self, lines: &mut LineArray, start: Loc, end: Loc) -> BufferResult<Vec<u8>> {
        self.remove_at(lines, start, end, SystemTime::now())
    }

    fn insert_at(
        &mut self,
        lines: &mut LineArray,
        loc: Loc,
        text: &[u8],
        time: SystemTime,
    ) -> BufferResult<Loc> {
        let end = lines.insert(loc, text)?;
        self.push(TextEvent {
            kind: EventKind::Insert,
            start: loc,
            end,
            text: text.to_vec(),
            time,
        });
        Ok(end)
    }

    fn remove_at(
        &mut self,
        lines: &mut LineArray,
        start: Loc,
        end: Loc,
        time: SystemTime,
    ) -> BufferResult<Vec<u8>> {
        let removed = lines.remove(start, end)?;
        self.push(TextEvent {
            kind: EventKind::Remove,
            start,
            end,
            text: removed.clone(),
            time,
        });
        Ok(removed)
    }

    /// Records an event. Clears the redo stack.
    fn push(&mut self, event: TextEvent) {
        self.redo_stack.clear();
        self.undo_stack.push_back(event);
        while self.undo_stack.len() > self.max_size {
            self.undo_stack.pop_front();
        }
    }

    // ==================== Undo/Redo ====================

    /// Undoes the most recent group of events.
    ///
    /// Returns the location where the last undone edit started.
    pub fn undo(&mut self, lines: &mut LineArray) -> BufferResult<Loc> {
        let first = self.undo_stack.back().ok_or(BufferError::NothingToUndo)?.time;
        let mut loc = Loc::ZERO;

        while let Some(event) = self.undo_stack.back() {
            if time_gap(first, event.time) > UNDO_THRESHOLD {
                break;
            }
            let Some(event) = self.undo_stack.pop_back() else {
                break;
            };
            event.inverse().apply(lines)?;
            loc = event.start;
            self.redo_stack.push(event);
        }
        Ok(loc)
    }

    /// Redoes the most recently undone group of events.
    ///
    /// Returns the location where the last redone edit ends.
    pub fn redo(&mut self, lines: &mut LineArray) -> BufferResult<Loc> {
        let first = self.redo_stack.last().ok_or(BufferError::NothingToRedo)?.time;
        let mut loc = Loc::ZERO;

        while let Some(event) = self.redo_stack.last() {
            if time_gap(first, event.time) > UNDO_THRESHOLD {
                break;
            }
            let Some(event) = self.redo_stack.pop() else {
                break;
            };
            event.apply(lines)?;
            loc = match event.kind {
                EventKind::Insert => event.end,
                EventKind::Remove => event.start,
            };
            self.undo_stack.push_back(event);
        }
        Ok(loc)
    }

    // ==================== Diff Application ====================

    /// Rewrites `lines` so they hold `text`, recording the minimal set of
    /// line-level edits as undoable events.
    ///
    /// All recorded events share one timestamp, so the whole reload is a
    /// single undo step.
    pub fn apply_diff(&mut self, lines: &mut LineArray, text: &[u8]) -> BufferResult<()> {
        let new_lines: Vec<&[u8]> = text.split(|&b| b == b'\n').collect();
        let hunks = {
            let old_lines: Vec<&[u8]> = lines.lines().collect();
            diff_hunks(&old_lines, &new_lines)
        };

        let time = SystemTime::now();
        // Bottom-up, so earlier hunks keep their line numbers.
        for (old, new) in hunks.into_iter().rev() {
            self.apply_hunk(lines, old, &new_lines[new], time)?;
        }
        Ok(())
    }

    fn apply_hunk(
        &mut self,
        lines: &mut LineArray,
        old: Range<usize>,
        replacement: &[&[u8]],
        time: SystemTime,
    ) -> BufferResult<()> {
        let count = lines.line_count();
        let joined = replacement.join(&b'\n');

        if old.is_empty() {
            // Pure insertion before line `old.start`, or after the last line.
            if old.start < count {
                let mut text = joined;
                text.push(b'\n');
                self.insert_at(lines, Loc::new(0, old.start), &text, time)?;
            } else {
                let mut text = vec![b'\n'];
                text.extend_from_slice(&joined);
                self.insert_at(lines, lines.end(), &text, time)?;
            }
            return Ok(());
        }

        let last = old.end - 1;
        if !replacement.is_empty() {
            let end = Loc::new(crate::rune_count(lines.line_bytes(last)), last);
            self.remove_at(lines, Loc::new(0, old.start), end, time)?;
            self.insert_at(lines, Loc::new(0, old.start), &joined, time)?;
        } else if old.end < count {
            self.remove_at(lines, Loc::new(0, old.start), Loc::new(0, old.end), time)?;
        } else if old.start > 0 {
            let prev = old.start - 1;
            let start = Loc::new(crate::rune_count(lines.line_bytes(prev)), prev);
            let end = lines.end();
            self.remove_at(lines, start, end, time)?;
        } else {
            let end = lines.end();
            self.remove_at(lines, Loc::ZERO, end, time)?;
        }
        Ok(())
    }

    // ==================== Queries ====================

    /// Returns the number of undoable events.
    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    /// Returns the number of redoable events.
    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EVENTS)
    }
}

/// Two logs are equal when they hold the same history; ownership is ignored.
impl PartialEq for EventLog {
    fn eq(&self, other: &Self) -> bool {
        self.undo_stack == other.undo_stack
            && self.redo_stack == other.redo_stack
            && self.max_size == other.max_size
    }
}

impl Eq for EventLog {}

fn time_gap(a: SystemTime, b: SystemTime) -> Duration {
    a.duration_since(b).unwrap_or_else(|e| e.duration())
}

/// Groups a line diff into (old range, new range) hunks of changed lines.
fn diff_hunks(old: &[&[u8]], new: &[&[u8]]) -> Vec<(Range<usize>, Range<usize>)> {
    let mut hunks: Vec<(Range<usize>, Range<usize>)> = Vec::new();
    let mut open = false;

    for op in capture_diff_slices(Algorithm::Myers, old, new) {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        if tag == DiffTag::Equal {
            open = false;
            continue;
        }
        match hunks.last_mut() {
            Some((o, n)) if open => {
                o.end = old_range.end;
                n.end = new_range.end;
            }
            _ => hunks.push((old_range, new_range)),
        }
        open = true;
    }
    hunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Endings;

    fn text(lines: &LineArray) -> Vec<u8> {
        lines.bytes(b"\n")
    }

    #[test]
    fn test_event_inverse() {
        let event = TextEvent {
            kind: EventKind::Insert,
            start: Loc::new(0, 0),
            end: Loc::new(5, 0),
            text: b"hello".to_vec(),
            time: SystemTime::now(),
        };
        let inverse = event.inverse();
        assert_eq!(inverse.kind, EventKind::Remove);
        assert_eq!(inverse.end, Loc::new(5, 0));
        assert_eq!(inverse.text, b"hello");
    }

    #[test]
    fn test_undo_groups_close_events() {
        let mut lines = LineArray::new();
        let mut log = EventLog::default();

        log.insert(&mut lines, Loc::ZERO, b"a").unwrap();
        log.insert(&mut lines, Loc::new(1, 0), b"b").unwrap();
        assert_eq!(text(&lines), b"ab");

        // Both inserts happened within the threshold
        log.undo(&mut lines).unwrap();
        assert_eq!(text(&lines), b"");
        assert_eq!(log.redo_count(), 2);

        log.redo(&mut lines).unwrap();
        assert_eq!(text(&lines), b"ab");
        assert_eq!(log.redo_count(), 0);
    }

    #[test]
    fn test_undo_separates_distant_events() {
        let mut lines = LineArray::new();
        let mut log = EventLog::default();
        let earlier = SystemTime::now() - Duration::from_secs(5);

        log.insert_at(&mut lines, Loc::ZERO, b"one", earlier).unwrap();
        log.insert(&mut lines, Loc::new(3, 0), b" two").unwrap();

        log.undo(&mut lines).unwrap();
        assert_eq!(text(&lines), b"one");
        log.undo(&mut lines).unwrap();
        assert_eq!(text(&lines), b"");
        assert!(matches!(log.undo(&mut lines), Err(BufferError::NothingToUndo)));
    }

    #[test]
    fn test_new_edit_clears_redo() {
        let mut lines = LineArray::new();
        let mut log = EventLog::default();

        log.insert(&mut lines, Loc::ZERO, b"x").unwrap();
        log.undo(&mut lines).unwrap();
        assert!(log.redo_count() > 0);

        log.insert(&mut lines, Loc::ZERO, b"y").unwrap();
        assert_eq!(log.redo_count(), 0);
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut lines = LineArray::new();
        let mut log = EventLog::new(2);
        for _ in 0..3 {
            log.insert(&mut lines, Loc::ZERO, b"z").unwrap();
        }
        assert_eq!(log.undo_count(), 2);
    }

    #[test]
    fn test_remove_and_undo_restores_text() {
        let mut lines = LineArray::from_bytes(b"one\ntwo\nthree", Endings::Auto);
        let mut log = EventLog::default();

        log.remove(&mut lines, Loc::new(1, 0), Loc::new(1, 2)).unwrap();
        assert_eq!(text(&lines), b"ohree");

        log.undo(&mut lines).unwrap();
        assert_eq!(text(&lines), b"one\ntwo\nthree");
    }

    #[test]
    fn test_apply_diff_reaches_target() {
        let cases: [(&[u8], &[u8]); 7] = [
            (b"a\nb\nc", b"a\nB\nc"),
            (b"a\nb\nc", b"a\nc"),
            (b"a\nb\nc", b"a\nb"),
            (b"a\nb", b"a\nb\nc\nd"),
            (b"", b"x"),
            (b"a\nb", b""),
            (b"keep\nold\nkeep", b"new\nkeep\nkeep\nnew"),
        ];

        for (before, after) in cases {
            let mut lines = LineArray::from_bytes(before, Endings::Unix);
            let mut log = EventLog::default();
            log.apply_diff(&mut lines, after).unwrap();
            assert_eq!(text(&lines), after, "diff from {:?}", before);

            // The whole reload is one undo step
            log.undo(&mut lines).unwrap();
            assert_eq!(text(&lines), before, "undo to {:?}", before);
        }
    }

    #[test]
    fn test_serde_preserves_history_not_owner() {
        let mut lines = LineArray::new();
        let mut log = EventLog::bound_to(BufferId::new());
        log.insert(&mut lines, Loc::ZERO, b"persist me").unwrap();

        let json = serde_json::to_string(&log).unwrap();
        let restored: EventLog = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, log);
        assert!(restored.owner().is_none());
    }

    #[test]
    fn test_rebind() {
        let id = BufferId::new();
        let mut log = EventLog::default();
        assert!(log.owner().is_none());
        log.rebind(id);
        assert_eq!(log.owner(), Some(id));
    }
}
