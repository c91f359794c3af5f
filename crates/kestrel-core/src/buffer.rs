//! The buffer: one open file and everything known about it.
//!
//! ## Learning: Composition with named fields
//!
//! A `Buffer` owns its `LineArray` and `EventLog` as plain fields and goes
//! through their public methods. The event log never holds a pointer back
//! to the buffer; every edit passes `&mut self.lines` explicitly, which is
//! what lets the borrow checker prove the two are never aliased.
//!
//! Saving, sessions and syntax resolution live in their own modules as
//! further `impl Buffer` blocks.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use kestrel_buffer::{
    BufferId, Cursor, Endings, EventLog, LineArray, Loc, TextStore, rune_count,
};
use kestrel_syntax::{Def, Highlighter};
use tracing::{debug, warn};

use crate::config::{FileFormat, Settings};
use crate::context::Context;
use crate::save::calc_hash;
use crate::util::{absolute, mod_time, replace_home, split_cursor_suffix};
use crate::{CoreError, CoreResult};

/// Size in bytes above which content hashing is replaced by a dirty flag.
pub const LARGE_FILE_THRESHOLD: u64 = 50_000;

/// What kind of buffer this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufKind {
    Default,
    Help,
    Log,
    Scratch,
    Raw,
}

/// Buffer kind plus its fixed capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufType {
    pub kind: BufKind,
    /// The text cannot be edited
    pub readonly: bool,
    /// The text cannot be saved
    pub scratch: bool,
}

impl BufType {
    pub const DEFAULT: BufType = BufType::of(BufKind::Default, false, false);
    pub const HELP: BufType = BufType::of(BufKind::Help, true, true);
    pub const LOG: BufType = BufType::of(BufKind::Log, true, true);
    pub const SCRATCH: BufType = BufType::of(BufKind::Scratch, false, true);
    pub const RAW: BufType = BufType::of(BufKind::Raw, true, true);

    const fn of(kind: BufKind, readonly: bool, scratch: bool) -> Self {
        Self {
            kind,
            readonly,
            scratch,
        }
    }
}

/// An open file.
#[derive(Debug)]
pub struct Buffer {
    pub(crate) id: BufferId,

    pub(crate) lines: LineArray,
    pub(crate) event_log: EventLog,

    pub(crate) ctx: Arc<Context>,
    pub(crate) settings: Settings,

    /// Path as given by the user (with `~` expanded)
    pub(crate) path: String,
    pub(crate) abs_path: PathBuf,
    /// Display name override
    name: String,
    buf_type: BufType,

    /// Modification time of the file when it was last read or written
    pub(crate) mod_time: Option<SystemTime>,

    /// SHA-256 of the clean content; unused while `fastdirty` is on
    pub(crate) orig_hash: [u8; 32],
    pub(crate) is_modified: bool,

    pub(crate) syntax_def: Option<Arc<Def>>,
    pub(crate) highlighter: Option<Highlighter>,

    cursors: Vec<Cursor>,
    pub(crate) start_cursor: Loc,

    /// Problems that did not stop the buffer from working
    pub(crate) warnings: Vec<CoreError>,
}

impl Buffer {
    // ==================== Construction ====================

    /// Opens `path`, which may carry a `:line[:column]` suffix.
    ///
    /// A missing file gives an empty buffer bound to that path. A directory
    /// is an error, as is any other failure to open the file.
    pub fn from_file(path: &str, ctx: Arc<Context>) -> CoreResult<Self> {
        let expanded = replace_home(path);
        let (filename, cursor) = if Path::new(&expanded).exists() {
            (expanded, None)
        } else {
            let (name, cursor) = split_cursor_suffix(path);
            (replace_home(&name), cursor)
        };

        match std::fs::metadata(&filename) {
            Ok(meta) if meta.is_dir() => Err(CoreError::IsDirectory(PathBuf::from(filename))),
            Ok(meta) => {
                let file = std::fs::File::open(&filename)?;
                Self::new(file, meta.len(), &filename, cursor, ctx)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} does not exist, starting empty", filename);
                Ok(Self::construct(LineArray::new(), 0, &filename, cursor, ctx))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Creates a buffer holding `text`.
    pub fn from_string(text: &str, path: &str, ctx: Arc<Context>) -> Self {
        let lines = LineArray::from_bytes(text.as_bytes(), Endings::Auto);
        Self::construct(lines, text.len() as u64, path, None, ctx)
    }

    /// Creates a buffer from `size` bytes of `reader`.
    ///
    /// `start` overrides any cursor restored from the session store.
    pub fn new<R: Read>(
        reader: R,
        size: u64,
        path: &str,
        start: Option<Loc>,
        ctx: Arc<Context>,
    ) -> CoreResult<Self> {
        let lines = LineArray::from_reader(reader, size, Endings::Auto)?;
        Ok(Self::construct(lines, size, path, start, ctx))
    }

    fn construct(
        lines: LineArray,
        size: u64,
        path: &str,
        start: Option<Loc>,
        ctx: Arc<Context>,
    ) -> Self {
        let mut settings = ctx.config.settings_for_path(path);
        if lines.endings() == Endings::Dos {
            settings.fileformat = FileFormat::Dos;
        }

        let id = BufferId::new();
        let mut buf = Self {
            id,
            lines,
            event_log: EventLog::bound_to(id),
            ctx: Arc::clone(&ctx),
            settings,
            path: path.to_string(),
            abs_path: absolute(path),
            name: String::new(),
            buf_type: BufType::DEFAULT,
            mod_time: mod_time(path),
            orig_hash: [0; 32],
            is_modified: false,
            syntax_def: None,
            highlighter: None,
            cursors: Vec::new(),
            start_cursor: Loc::ZERO,
            warnings: Vec::new(),
        };

        if let Err(e) = std::fs::create_dir_all(ctx.config.buffers_dir()) {
            buf.record_warning(e.into());
        }

        buf.update_rules();
        ctx.config.apply_file_type_overrides(&mut buf.settings);

        if buf.settings.savecursor || buf.settings.saveundo {
            if let Err(e) = buf.unserialize() {
                buf.record_warning(e);
            }
        }

        if let Some(loc) = start {
            buf.start_cursor = loc;
        }
        buf.start_cursor = buf.clamp(buf.start_cursor);
        buf.cursors = vec![Cursor::new(buf.start_cursor)];

        if !buf.settings.fastdirty {
            if size > LARGE_FILE_THRESHOLD {
                debug!("{} is {} bytes, enabling fastdirty", buf.path, size);
                buf.settings.fastdirty = true;
            } else {
                buf.orig_hash = calc_hash(&buf.lines);
            }
        }

        buf
    }

    /// Sets the buffer type.
    pub fn with_type(mut self, buf_type: BufType) -> Self {
        self.buf_type = buf_type;
        self
    }

    // ==================== Accessors ====================

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn abs_path(&self) -> &Path {
        &self.abs_path
    }

    /// Name shown to the user: the override, else the path, else "No name".
    pub fn name(&self) -> &str {
        if !self.name.is_empty() {
            &self.name
        } else if !self.path.is_empty() {
            &self.path
        } else {
            "No name"
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn buf_type(&self) -> BufType {
        self.buf_type
    }

    pub fn file_type(&self) -> &str {
        &self.settings.filetype
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    pub fn mod_time(&self) -> Option<SystemTime> {
        self.mod_time
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    pub fn syntax_def(&self) -> Option<&Def> {
        self.syntax_def.as_deref()
    }

    pub fn highlighter(&self) -> Option<&Highlighter> {
        self.highlighter.as_ref()
    }

    /// Bytes of line `n`; empty when out of range.
    pub fn line_bytes(&self, n: usize) -> &[u8] {
        self.lines.line_bytes(n)
    }

    pub fn lines_num(&self) -> usize {
        self.lines.line_count()
    }

    pub fn start(&self) -> Loc {
        Loc::ZERO
    }

    /// Location just past the last rune.
    pub fn end(&self) -> Loc {
        self.lines.end()
    }

    pub fn rune_at(&self, loc: Loc) -> char {
        self.lines.rune_at(loc)
    }

    /// Content joined with the configured line terminator.
    pub fn bytes(&self) -> Vec<u8> {
        self.lines.bytes(self.settings.fileformat.eol())
    }

    pub fn lines(&self) -> &LineArray {
        &self.lines
    }

    // ==================== Cursors ====================

    pub fn start_cursor(&self) -> Loc {
        self.start_cursor
    }

    pub fn set_cursors(&mut self, cursors: Vec<Cursor>) {
        self.cursors = cursors;
    }

    pub fn cursors(&self) -> &[Cursor] {
        &self.cursors
    }

    /// The primary cursor; sits at the start cursor when none are set.
    pub fn active_cursor(&self) -> Cursor {
        self.cursors
            .first()
            .copied()
            .unwrap_or(Cursor::new(self.start_cursor))
    }

    pub fn cursor(&self, n: usize) -> Option<&Cursor> {
        self.cursors.get(n)
    }

    pub fn num_cursors(&self) -> usize {
        self.cursors.len()
    }

    /// Clamps `loc` to an existing position.
    pub(crate) fn clamp(&self, loc: Loc) -> Loc {
        let y = loc.y.min(self.lines_num() - 1);
        let x = loc.x.min(rune_count(self.line_bytes(y)));
        Loc::new(x, y)
    }

    // ==================== Editing ====================

    /// Inserts `text` at `loc`, returning the location after it.
    pub fn insert(&mut self, loc: Loc, text: &[u8]) -> CoreResult<Loc> {
        let end = self.event_log.insert(&mut self.lines, loc, text)?;
        self.after_edit(loc.y);
        Ok(end)
    }

    /// Removes the text between `start` and `end`, returning it.
    pub fn remove(&mut self, start: Loc, end: Loc) -> CoreResult<Vec<u8>> {
        let removed = self.event_log.remove(&mut self.lines, start, end)?;
        self.after_edit(start.y);
        Ok(removed)
    }

    pub fn undo(&mut self) -> CoreResult<Loc> {
        let loc = self.event_log.undo(&mut self.lines)?;
        self.after_edit(0);
        Ok(loc)
    }

    pub fn redo(&mut self) -> CoreResult<Loc> {
        let loc = self.event_log.redo(&mut self.lines)?;
        self.after_edit(0);
        Ok(loc)
    }

    fn after_edit(&mut self, line: usize) {
        self.is_modified = true;
        if self.settings.syntax {
            if let Some(highlighter) = &mut self.highlighter {
                highlighter.highlight_from(&self.lines, line);
            }
        }
    }

    /// Reloads the file from disk as one undoable edit.
    pub fn reopen(&mut self) -> CoreResult<()> {
        let data = std::fs::read(&self.path)?;
        let text = match self.settings.fileformat {
            FileFormat::Dos => strip_carriage_returns(&data),
            FileFormat::Unix => data,
        };

        self.event_log.apply_diff(&mut self.lines, &text)?;
        self.after_edit(0);

        self.mod_time = mod_time(&self.path);
        self.is_modified = false;
        self.update_dirty_baseline(text.len() as u64);
        Ok(())
    }

    // ==================== Warnings ====================

    pub(crate) fn record_warning(&mut self, err: CoreError) {
        warn!("{}: {}", self.name(), err);
        self.warnings.push(err);
    }

    /// Drains the non-fatal problems collected so far.
    pub fn take_warnings(&mut self) -> Vec<CoreError> {
        std::mem::take(&mut self.warnings)
    }

    pub(crate) fn set_path(&mut self, path: &str) {
        self.path = path.to_string();
        self.abs_path = absolute(path);
    }
}

/// Drops every `\r` that directly precedes a `\n`.
fn strip_carriage_returns(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for (i, &b) in data.iter().enumerate() {
        if b == b'\r' && data.get(i + 1) == Some(&b'\n') {
            continue;
        }
        out.push(b);
    }
    out
}
