use std::ops::Range;

/// Byte ranges of one `Name: Value\r\n` line inside a [`HeaderStore`](super::HeaderStore) buffer.
///
/// Invariant: `name_start <= name_end < value_start <= value_end`, the two bytes
/// at `name_end` are `": "` and the two bytes at `value_end` are `"\r\n"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HeaderIndex {
    name_start: usize,
    name_end: usize,
    value_start: usize,
    value_end: usize,
}

impl HeaderIndex {
    /// Index of a line written at `at` with the given name and value lengths.
    pub(crate) fn for_line(at: usize, name_len: usize, value_len: usize) -> Self {
        let name_end = at + name_len;
        let value_start = name_end + 2;
        let index = Self { name_start: at, name_end, value_start, value_end: value_start + value_len };
        index.debug_check();
        index
    }

    #[inline]
    pub(crate) fn name<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        &buf[self.name_start..self.name_end]
    }

    #[inline]
    pub(crate) fn value<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        &buf[self.value_start..self.value_end]
    }

    #[inline]
    pub(crate) fn value_range(&self) -> Range<usize> {
        self.value_start..self.value_end
    }

    /// The whole line including the trailing CRLF.
    #[inline]
    pub(crate) fn line_range(&self) -> Range<usize> {
        self.name_start..self.value_end + 2
    }

    pub(crate) fn shifted_left(self, by: usize) -> Self {
        debug_assert!(by <= self.name_start);
        Self {
            name_start: self.name_start - by,
            name_end: self.name_end - by,
            value_start: self.value_start - by,
            value_end: self.value_end - by,
        }
    }

    /// Checks the ordering invariant and, given the buffer, the separators.
    pub(crate) fn debug_validate(&self, buf: &[u8]) {
        self.debug_check();
        debug_assert!(self.value_end + 2 <= buf.len(), "header index out of bounds");
        debug_assert_eq!(&buf[self.name_end..self.value_start], b": ");
        debug_assert_eq!(&buf[self.value_end..self.value_end + 2], b"\r\n");
    }

    #[inline]
    fn debug_check(&self) {
        debug_assert!(self.name_start <= self.name_end);
        debug_assert!(self.name_end < self.value_start);
        debug_assert!(self.value_start <= self.value_end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_of_a_line() {
        let buf = b"Host: example.com\r\n";
        let index = HeaderIndex::for_line(0, 4, 11);
        index.debug_validate(buf);

        assert_eq!(index.name(buf), b"Host");
        assert_eq!(index.value(buf), b"example.com");
        assert_eq!(index.line_range(), 0..buf.len());
    }

    #[test]
    fn empty_value() {
        let buf = b"X-Empty: \r\n";
        let index = HeaderIndex::for_line(0, 7, 0);
        index.debug_validate(buf);
        assert_eq!(index.value(buf), b"");
    }

    #[test]
    fn shift_keeps_lengths() {
        let buf = b"A: 1\r\nB: 22\r\n";
        let second = HeaderIndex::for_line(6, 1, 2);
        let moved = second.shifted_left(6);

        assert_eq!(moved.name(&buf[6..]), b"B");
        assert_eq!(moved.value(&buf[6..]), b"22");
    }
}
