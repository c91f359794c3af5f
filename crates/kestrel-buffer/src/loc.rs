//! Locations and cursors.
//!
//! ## Learning: Newtype-style coordinates
//!
//! `Loc` names its axes (`x` is the rune column, `y` the line) instead of
//! passing bare `(usize, usize)` tuples around, so a column can never be
//! mistaken for a line number at a call site.

use serde::{Deserialize, Serialize};

/// A location in the buffer.
///
/// Both coordinates are 0-indexed. `x` counts runes, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Loc {
    /// Column (rune index within the line)
    pub x: usize,
    /// Line number
    pub y: usize,
}

impl Loc {
    /// Creates a new location.
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// Location at the start of the buffer.
    pub const ZERO: Loc = Loc { x: 0, y: 0 };

    /// Returns true if this location is before another.
    pub fn is_before(&self, other: &Loc) -> bool {
        self.y < other.y || (self.y == other.y && self.x < other.x)
    }
}

impl PartialOrd for Loc {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Loc {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match self.y.cmp(&other.y) {
            std::cmp::Ordering::Equal => self.x.cmp(&other.x),
            other => other,
        }
    }
}

impl std::fmt::Display for Loc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 1-indexed line:column, as shown to users
        write!(f, "{}:{}", self.y + 1, self.x + 1)
    }
}

/// A cursor in the buffer.
///
/// Cursor movement lives with the view layer; the buffer only stores
/// cursors so the active one can be persisted across sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    /// Current location
    pub loc: Loc,
}

impl Cursor {
    pub fn new(loc: Loc) -> Self {
        Self { loc }
    }
}
