//! Dirty tracking and saving.
//!
//! ## Learning: Choosing between exact and cheap
//!
//! Small files are compared against a SHA-256 of their clean content, so
//! typing a character and deleting it again leaves the buffer clean. Files
//! above `LARGE_FILE_THRESHOLD` skip hashing and use a plain "was edited"
//! flag instead. Once a buffer has switched to the flag it stays there.

use std::io::Write;

use kestrel_buffer::{LineArray, Loc};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::CoreResult;
use crate::buffer::{Buffer, LARGE_FILE_THRESHOLD};
use crate::util::{mod_time, overwrite_file, replace_home};

/// SHA-256 of all lines joined by `\n`, whatever the file format.
pub(crate) fn calc_hash(lines: &LineArray) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for (i, line) in lines.lines().enumerate() {
        if i > 0 {
            hasher.update(b"\n");
        }
        hasher.update(line);
    }
    hasher.finalize().into()
}

impl Buffer {
    /// Returns true if the buffer differs from what was last loaded or saved.
    pub fn modified(&self) -> bool {
        if self.settings.fastdirty {
            return self.is_modified;
        }
        calc_hash(&self.lines) != self.orig_hash
    }

    /// Re-establishes the clean state after content of `size` bytes was
    /// read or written.
    pub(crate) fn update_dirty_baseline(&mut self, size: u64) {
        if self.settings.fastdirty {
            return;
        }
        if size > LARGE_FILE_THRESHOLD {
            debug!("{} grew to {} bytes, enabling fastdirty", self.path, size);
            self.settings.fastdirty = true;
        } else {
            self.orig_hash = calc_hash(&self.lines);
        }
    }

    /// Saves to the current path.
    pub fn save(&mut self) -> CoreResult<()> {
        let path = self.path.clone();
        self.save_as(&path)
    }

    /// Saves to `filename` and makes it the buffer's path.
    ///
    /// On failure nothing about the buffer changes except that syntax
    /// resolution has run and a final newline may have been added.
    pub fn save_as(&mut self, filename: &str) -> CoreResult<()> {
        self.update_rules();

        if self.settings.eofnewline {
            self.ensure_eof_newline()?;
        }

        let target = replace_home(filename);
        let eol = self.settings.fileformat.eol();
        let mut file_size: u64 = 0;

        overwrite_file(&target, |w| {
            let mut lines = self.lines.lines();
            if let Some(first) = lines.next() {
                w.write_all(first)?;
                file_size = first.len() as u64;
            }
            for line in lines {
                w.write_all(eol)?;
                w.write_all(line)?;
                file_size += (eol.len() + line.len()) as u64;
            }
            Ok(())
        })?;

        self.update_dirty_baseline(file_size);
        self.set_path(&target);
        self.is_modified = false;
        self.mod_time = mod_time(&target);
        info!("Saved {} ({} bytes)", target, file_size);

        self.serialize_or_warn();
        Ok(())
    }

    /// Appends a line break unless the file already appears to end in one.
    ///
    /// The probe looks two runes back from the end of the last line, so a
    /// last line holding a single rune is left alone.
    fn ensure_eof_newline(&mut self) -> CoreResult<()> {
        let end = self.end();
        let probe = match end.x {
            0 | 1 => '\n',
            x => self.rune_at(Loc::new(x - 2, end.y)),
        };
        if probe != '\n' {
            self.insert(end, b"\n")?;
        }
        Ok(())
    }
}
