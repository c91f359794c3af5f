//! Line storage.
//!
//! ## Why a vector of lines?
//!
//! Everything the persistence layer does is line oriented: saving writes
//! lines joined by the configured terminator, dirty checks hash lines joined
//! by `\n`, and the highlighter keeps one state per line. Storing the text as
//! `Vec<Vec<u8>>` makes all three a plain iteration, and keeps raw bytes
//! intact for files that are not valid UTF-8.
//!
//! Line terminators are never stored. A buffer always has at least one line.

use std::io::Read;

use crate::utf8::{rune_count, rune_to_byte, runes};
use crate::{BufferError, BufferResult, Loc};

/// Read access to ordered lines of raw bytes.
///
/// This is the contract consumers (hashing, highlighting, saving) rely on;
/// they never see how lines are stored.
pub trait TextStore {
    /// Number of lines; always at least 1.
    fn line_count(&self) -> usize;

    /// Raw bytes of line `n`, without terminator. Empty when out of range.
    fn line_bytes(&self, n: usize) -> &[u8];
}

/// Line-ending mode used when splitting a byte stream into lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endings {
    /// Detect from the first line terminator in the stream
    #[default]
    Auto,
    /// Lines end in `\n`
    Unix,
    /// Lines end in `\r\n`
    Dos,
}

/// Ordered lines of raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineArray {
    lines: Vec<Vec<u8>>,
    /// The resolved (never `Auto`) line-ending mode
    endings: Endings,
}

impl LineArray {
    /// Creates storage holding a single empty line.
    pub fn new() -> Self {
        Self {
            lines: vec![Vec::new()],
            endings: Endings::Unix,
        }
    }

    /// Reads a whole stream and splits it into lines.
    ///
    /// `size_hint` is used to pre-size the read buffer.
    pub fn from_reader<R: Read>(
        mut reader: R,
        size_hint: u64,
        endings: Endings,
    ) -> std::io::Result<Self> {
        let mut data = Vec::with_capacity(usize::try_from(size_hint).unwrap_or(0));
        reader.read_to_end(&mut data)?;
        Ok(Self::from_bytes(&data, endings))
    }

    /// Splits bytes into lines.
    ///
    /// With `Endings::Auto` the mode is `Dos` when the first line ends in
    /// `\r\n`, otherwise `Unix`. In `Dos` mode a `\r` directly before a `\n`
    /// is dropped; a lone trailing `\r` on the last line is kept as content.
    pub fn from_bytes(data: &[u8], endings: Endings) -> Self {
        let endings = match endings {
            Endings::Auto => detect_endings(data),
            explicit => explicit,
        };

        let mut lines: Vec<Vec<u8>> = data.split(|&b| b == b'\n').map(<[u8]>::to_vec).collect();

        if endings == Endings::Dos {
            let terminated = lines.len() - 1;
            for line in &mut lines[..terminated] {
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
            }
        }

        Self { lines, endings }
    }

    /// Returns the resolved line-ending mode.
    pub fn endings(&self) -> Endings {
        self.endings
    }

    /// Location just past the last rune of the last line.
    pub fn end(&self) -> Loc {
        let y = self.lines.len() - 1;
        Loc::new(rune_count(&self.lines[y]), y)
    }

    /// Returns the rune at `loc`, or `'\n'` for the line break position and
    /// anything out of range.
    pub fn rune_at(&self, loc: Loc) -> char {
        runes(self.line_bytes(loc.y))
            .nth(loc.x)
            .map(|(_, rune)| rune)
            .unwrap_or('\n')
    }

    /// Iterates over all lines.
    pub fn lines(&self) -> impl Iterator<Item = &[u8]> {
        self.lines.iter().map(Vec::as_slice)
    }

    /// Joins all lines with `eol`.
    pub fn bytes(&self, eol: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len_bytes(eol.len()));
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                out.extend_from_slice(eol);
            }
            out.extend_from_slice(line);
        }
        out
    }

    /// Total size in bytes when joined with a terminator of `eol_len` bytes.
    pub fn len_bytes(&self, eol_len: usize) -> usize {
        let content: usize = self.lines.iter().map(Vec::len).sum();
        content + eol_len * (self.lines.len() - 1)
    }

    // ==================== Mutations ====================

    /// Inserts `text` at `loc`, splitting on `\n`.
    ///
    /// Returns the location just past the inserted text.
    pub fn insert(&mut self, loc: Loc, text: &[u8]) -> BufferResult<Loc> {
        let offset = self.byte_offset(loc)?;
        let tail = self.lines[loc.y].split_off(offset);

        let mut parts = text.split(|&b| b == b'\n');
        if let Some(first) = parts.next() {
            self.lines[loc.y].extend_from_slice(first);
        }
        let new_lines: Vec<Vec<u8>> = parts.map(<[u8]>::to_vec).collect();
        let last_y = loc.y + new_lines.len();
        self.lines.splice(loc.y + 1..loc.y + 1, new_lines);

        let end = Loc::new(rune_count(&self.lines[last_y]), last_y);
        self.lines[last_y].extend_from_slice(&tail);
        Ok(end)
    }

    /// Removes the text between `start` and `end`, returning it with lines
    /// joined by `\n`.
    pub fn remove(&mut self, start: Loc, end: Loc) -> BufferResult<Vec<u8>> {
        let removed = self.substr(start, end)?;
        let start_off = self.byte_offset(start)?;
        let end_off = self.byte_offset(end)?;

        if start.y == end.y {
            self.lines[start.y].drain(start_off..end_off);
        } else {
            let tail = self.lines[end.y].split_off(end_off);
            self.lines[start.y].truncate(start_off);
            self.lines[start.y].extend_from_slice(&tail);
            self.lines.drain(start.y + 1..=end.y);
        }
        Ok(removed)
    }

    /// Returns the text between `start` and `end` with lines joined by `\n`.
    pub fn substr(&self, start: Loc, end: Loc) -> BufferResult<Vec<u8>> {
        if end.is_before(&start) {
            return Err(BufferError::InvalidRange { start, end });
        }
        let start_off = self.byte_offset(start)?;
        let end_off = self.byte_offset(end)?;

        if start.y == end.y {
            return Ok(self.lines[start.y][start_off..end_off].to_vec());
        }

        let mut out = self.lines[start.y][start_off..].to_vec();
        for line in &self.lines[start.y + 1..end.y] {
            out.push(b'\n');
            out.extend_from_slice(line);
        }
        out.push(b'\n');
        out.extend_from_slice(&self.lines[end.y][..end_off]);
        Ok(out)
    }

    /// Validates `loc` and converts its column to a byte offset.
    fn byte_offset(&self, loc: Loc) -> BufferResult<usize> {
        self.lines
            .get(loc.y)
            .and_then(|line| rune_to_byte(line, loc.x))
            .ok_or(BufferError::LocOutOfBounds { loc })
    }
}

impl TextStore for LineArray {
    fn line_count(&self) -> usize {
        self.lines.len()
    }

    fn line_bytes(&self, n: usize) -> &[u8] {
        self.lines.get(n).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Default for LineArray {
    fn default() -> Self {
        Self::new()
    }
}

fn detect_endings(data: &[u8]) -> Endings {
    match data.iter().position(|&b| b == b'\n') {
        Some(i) if i > 0 && data[i - 1] == b'\r' => Endings::Dos,
        _ => Endings::Unix,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines_of(la: &LineArray) -> Vec<&[u8]> {
        la.lines().collect()
    }

    #[test]
    fn test_split_unix() {
        let la = LineArray::from_bytes(b"ab\ncd\n", Endings::Auto);
        assert_eq!(la.endings(), Endings::Unix);
        let expected: Vec<&[u8]> = vec![&b"ab"[..], &b"cd"[..], &b""[..]];
        assert_eq!(lines_of(&la), expected);
    }

    #[test]
    fn test_split_dos_detected() {
        let la = LineArray::from_bytes(b"ab\r\ncd\r\nef\r", Endings::Auto);
        assert_eq!(la.endings(), Endings::Dos);
        let expected: Vec<&[u8]> = vec![&b"ab"[..], &b"cd"[..], &b"ef\r"[..]];
        assert_eq!(lines_of(&la), expected);
    }

    #[test]
    fn test_unix_keeps_carriage_returns() {
        let la = LineArray::from_bytes(b"ab\r\ncd", Endings::Unix);
        let expected: Vec<&[u8]> = vec![&b"ab\r"[..], &b"cd"[..]];
        assert_eq!(lines_of(&la), expected);
    }

    #[test]
    fn test_from_reader() {
        let la = LineArray::from_reader(&b"one\ntwo"[..], 7, Endings::Auto).unwrap();
        assert_eq!(la.line_count(), 2);
        assert_eq!(la.line_bytes(1), b"two");
        assert_eq!(la.line_bytes(9), b"");
    }

    #[test]
    fn test_end_and_rune_at() {
        let la = LineArray::from_bytes("x\nab世".as_bytes(), Endings::Auto);
        assert_eq!(la.end(), Loc::new(3, 1));
        assert_eq!(la.rune_at(Loc::new(2, 1)), '世');
        assert_eq!(la.rune_at(Loc::new(3, 1)), '\n');
        assert_eq!(la.rune_at(Loc::new(0, 5)), '\n');
    }

    #[test]
    fn test_insert_multiline() {
        let mut la = LineArray::from_bytes(b"hello world", Endings::Auto);
        let end = la.insert(Loc::new(5, 0), b",\nbig\nwide").unwrap();
        assert_eq!(end, Loc::new(4, 2));
        assert_eq!(la.bytes(b"\n"), b"hello,\nbig\nwide world");
    }

    #[test]
    fn test_insert_out_of_bounds() {
        let mut la = LineArray::from_bytes(b"abc", Endings::Auto);
        assert!(la.insert(Loc::new(4, 0), b"x").is_err());
        assert!(la.insert(Loc::new(0, 1), b"x").is_err());
    }

    #[test]
    fn test_remove_across_lines() {
        let mut la = LineArray::from_bytes(b"one\ntwo\nthree", Endings::Auto);
        let removed = la.remove(Loc::new(1, 0), Loc::new(2, 2)).unwrap();
        assert_eq!(removed, b"ne\ntwo\nth");
        assert_eq!(la.bytes(b"\n"), b"oree");
        assert_eq!(la.line_count(), 1);
    }

    #[test]
    fn test_remove_rejects_reversed_range() {
        let mut la = LineArray::from_bytes(b"abc", Endings::Auto);
        assert!(matches!(
            la.remove(Loc::new(2, 0), Loc::new(1, 0)),
            Err(BufferError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_bytes_with_crlf() {
        let la = LineArray::from_bytes(b"ab\ncd", Endings::Auto);
        assert_eq!(la.bytes(b"\r\n"), b"ab\r\ncd");
        assert_eq!(la.len_bytes(2), 6);
    }

    proptest::proptest! {
        #[test]
        fn test_unix_split_is_lossless(data in proptest::collection::vec(proptest::num::u8::ANY, 0..256)) {
            let la = LineArray::from_bytes(&data, Endings::Unix);
            proptest::prop_assert_eq!(la.bytes(b"\n"), data.clone());
            proptest::prop_assert_eq!(la.len_bytes(1), data.len());
        }
    }
}
