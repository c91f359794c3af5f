//! Rune decoding over raw line bytes.
//!
//! Lines are stored as bytes, so column arithmetic cannot lean on `str`.
//! These helpers walk bytes one rune at a time; a byte that does not start
//! a valid UTF-8 sequence is treated as a single rune of its own.

/// Decodes the first rune of `bytes`, returning it and its width in bytes.
///
/// Invalid or truncated sequences yield `U+FFFD` with a width of 1. An empty
/// slice yields `U+FFFD` with a width of 0.
pub fn decode_rune(bytes: &[u8]) -> (char, usize) {
    let Some(&first) = bytes.first() else {
        return (char::REPLACEMENT_CHARACTER, 0);
    };

    let width = match first {
        0x00..=0x7F => return (first as char, 1),
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => return (char::REPLACEMENT_CHARACTER, 1),
    };

    if bytes.len() < width {
        return (char::REPLACEMENT_CHARACTER, 1);
    }

    match std::str::from_utf8(&bytes[..width]) {
        Ok(s) => match s.chars().next() {
            Some(c) => (c, width),
            None => (char::REPLACEMENT_CHARACTER, 1),
        },
        Err(_) => (char::REPLACEMENT_CHARACTER, 1),
    }
}

/// Iterates `(byte_offset, rune)` pairs over raw bytes.
pub(crate) fn runes(bytes: &[u8]) -> impl Iterator<Item = (usize, char)> + '_ {
    let mut offset = 0;
    std::iter::from_fn(move || {
        if offset >= bytes.len() {
            return None;
        }
        let (rune, width) = decode_rune(&bytes[offset..]);
        let at = offset;
        offset += width;
        Some((at, rune))
    })
}

/// Counts the runes in `bytes`.
pub fn rune_count(bytes: &[u8]) -> usize {
    runes(bytes).count()
}

/// Converts a rune index into a byte offset.
///
/// Returns `None` when `rune_idx` is past the end; the index equal to the
/// rune count maps to `bytes.len()`.
pub fn rune_to_byte(bytes: &[u8], rune_idx: usize) -> Option<usize> {
    let mut count = 0;
    for (offset, _) in runes(bytes) {
        if count == rune_idx {
            return Some(offset);
        }
        count += 1;
    }
    (count == rune_idx).then_some(bytes.len())
}
