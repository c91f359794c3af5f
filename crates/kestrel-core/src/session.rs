//! Session persistence for the `savecursor` and `saveundo` settings.
//!
//! Each file gets one JSON snapshot under `<config>/buffers/`, named after
//! its escaped absolute path. Undo history is only trusted when the file's
//! modification time is exactly the one recorded with it; otherwise the
//! events would point at text that may no longer exist.

use std::path::PathBuf;
use std::time::SystemTime;

use kestrel_buffer::{EventLog, Loc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::buffer::Buffer;
use crate::util::{escape_path, overwrite_file};
use crate::{CoreError, CoreResult};

/// What is stored per file between sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedBuffer {
    pub event_log: EventLog,
    pub cursor: Loc,
    pub mod_time: Option<SystemTime>,
}

/// Borrowing twin of `SerializedBuffer` used when writing.
#[derive(Serialize)]
struct SnapshotRef<'a> {
    event_log: &'a EventLog,
    cursor: Loc,
    mod_time: Option<SystemTime>,
}

impl Buffer {
    /// Location of this buffer's session file.
    pub fn session_path(&self) -> PathBuf {
        self.ctx
            .config
            .buffers_dir()
            .join(escape_path(&self.abs_path))
    }

    /// Writes the session snapshot if `savecursor` or `saveundo` is on.
    pub fn serialize(&self) -> CoreResult<()> {
        if !self.settings.savecursor && !self.settings.saveundo {
            return Ok(());
        }

        std::fs::create_dir_all(self.ctx.config.buffers_dir())?;
        let path = self.session_path();
        let snapshot = SnapshotRef {
            event_log: &self.event_log,
            cursor: self.active_cursor().loc,
            mod_time: self.mod_time,
        };

        overwrite_file(&path, |w| {
            serde_json::to_writer(&mut *w, &snapshot).map_err(std::io::Error::from)
        })?;
        debug!("Wrote session {}", path.display());
        Ok(())
    }

    /// Serializes, recording a failure as a warning.
    pub(crate) fn serialize_or_warn(&mut self) {
        if let Err(e) = self.serialize() {
            self.record_warning(e);
        }
    }

    /// Restores cursor and undo history from the session file, if any.
    pub fn unserialize(&mut self) -> CoreResult<()> {
        let path = self.session_path();
        let data = match std::fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let snapshot: SerializedBuffer = serde_json::from_slice(&data)
            .map_err(|source| CoreError::SessionCorrupt { path, source })?;

        if self.settings.savecursor {
            self.start_cursor = self.clamp(snapshot.cursor);
        }

        if self.settings.saveundo {
            if self.mod_time == snapshot.mod_time {
                let mut event_log = snapshot.event_log;
                event_log.rebind(self.id);
                self.event_log = event_log;
                debug!(
                    "Restored {} undo and {} redo events",
                    self.event_log.undo_count(),
                    self.event_log.redo_count()
                );
            } else {
                debug!("{} changed on disk, discarding saved undo history", self.path);
            }
        }
        Ok(())
    }
}
