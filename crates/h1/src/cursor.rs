//! A small forward-only cursor over an immutable byte window.
//!
//! The parser and the header store both need the same primitive: "find the next
//! delimiter, hand me what came before it, and step over it". [`ByteCursor`]
//! provides exactly that without allocating or copying.

/// Line terminator used everywhere in HTTP/1.x framing.
pub(crate) const CRLF: &[u8] = b"\r\n";

/// Forward-only view over a byte slice.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ByteCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Creates a cursor that starts scanning at `pos` instead of the beginning.
    ///
    /// `pos` is clamped to the window length.
    pub(crate) fn starting_at(bytes: &'a [u8], pos: usize) -> Self {
        Self { bytes, pos: pos.min(bytes.len()) }
    }

    #[inline]
    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub(crate) fn remaining(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }

    /// Searches the remaining bytes for `delimiter` and returns its offset
    /// relative to the start of the whole window, without moving the cursor.
    pub(crate) fn find(&self, delimiter: &[u8]) -> Option<usize> {
        debug_assert!(!delimiter.is_empty());
        if delimiter.len() == 1 {
            return self.remaining().iter().position(|b| *b == delimiter[0]).map(|i| self.pos + i);
        }
        self.remaining().windows(delimiter.len()).position(|window| window == delimiter).map(|i| self.pos + i)
    }

    /// Returns the bytes up to (not including) the next `delimiter` and moves the
    /// cursor past the delimiter.
    ///
    /// Returns `None`, leaving the cursor untouched, if the delimiter is absent.
    pub(crate) fn scan_until(&mut self, delimiter: &[u8]) -> Option<&'a [u8]> {
        let end = self.find(delimiter)?;
        let found = &self.bytes[self.pos..end];
        self.pos = end + delimiter.len();
        Some(found)
    }

    /// Consumes and returns everything that is left.
    pub(crate) fn take_rest(&mut self) -> &'a [u8] {
        let rest = self.remaining();
        self.pos = self.bytes.len();
        rest
    }
}

/// Strips optional whitespace (SP / HTAB) from both ends of `bytes`.
pub(crate) fn trim_ows(bytes: &[u8]) -> &[u8] {
    let is_ows = |b: &u8| *b == b' ' || *b == b'\t';
    let start = bytes.iter().position(|b| !is_ows(b)).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|b| !is_ows(b)).map_or(start, |i| i + 1);
    &bytes[start..end]
}
