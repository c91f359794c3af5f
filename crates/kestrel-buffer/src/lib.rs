//! # Kestrel Buffer
//!
//! Line storage and undo/redo history for Kestrel buffers.
//!
//! ## Key Concepts
//!
//! ### Raw bytes, not strings
//! - `LineArray` keeps each line as a `Vec<u8>` so files that are not valid
//!   UTF-8 survive a load/save round trip untouched
//! - Columns (`Loc::x`) count runes; invalid bytes count as one rune each
//!
//! ### Explicit collaborators
//! - `EventLog` never holds a reference to the text it edits; every mutating
//!   call takes `&mut LineArray`. The owning buffer decides which log is
//!   applied to which text, and `EventLog::rebind` records that decision.

mod event_log;
mod line_array;
mod loc;
mod utf8;

pub use event_log::{BufferId, EventKind, EventLog, TextEvent, UNDO_THRESHOLD};
pub use line_array::{Endings, LineArray, TextStore};
pub use loc::{Cursor, Loc};
pub use utf8::{decode_rune, rune_count, rune_to_byte};

/// Result type for buffer operations
pub type BufferResult<T> = Result<T, BufferError>;

/// Errors that can occur during buffer operations
#[derive(Debug, thiserror::Error)]
pub enum BufferError {
    #[error("Location {loc} is out of bounds")]
    LocOutOfBounds { loc: Loc },

    #[error("Invalid range: start {start} is after end {end}")]
    InvalidRange { start: Loc, end: Loc },

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,
}
