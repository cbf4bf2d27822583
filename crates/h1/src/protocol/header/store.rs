use std::collections::HashMap;
use std::fmt;
use std::slice;
use std::sync::OnceLock;

use bytes::{Bytes, BytesMut};
use tracing::trace;

use super::index::HeaderIndex;
use super::{CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING, is_chunked_coding, validate_name, validate_value};
use crate::cursor::trim_ows;
use crate::protocol::HeaderError;

/// Header collection backed by one contiguous buffer of wire-format lines.
///
/// Every field is stored as `Name: Value\r\n` in append order, so the buffer is
/// always exactly the serialized header block (without the terminating blank
/// line). A parallel list of [`HeaderIndex`] entries points into it, which lets
/// lookups compare raw bytes without allocating per header.
///
/// Cloning is cheap: buffer and index list are shared until one of the copies
/// is mutated, at which point that copy takes its own.
///
/// The store is `Send + Sync`, so handlers may hold `&HeaderStore` across an
/// `.await` inside spawned tasks.
#[derive(Clone, Default)]
pub struct HeaderStore {
    buf: Bytes,
    entries: triomphe::Arc<Vec<HeaderIndex>>,
    /// First entry position per folded name hash, built by the first lookup
    /// after a mutation.
    lookup: OnceLock<HashMap<u64, usize>>,
}

impl HeaderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store with room for `bytes` bytes of header lines and
    /// `headers` fields.
    pub fn with_capacity(bytes: usize, headers: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(bytes).freeze(),
            entries: triomphe::Arc::new(Vec::with_capacity(headers)),
            lookup: OnceLock::new(),
        }
    }

    /// Number of fields, duplicates counted separately.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The serialized header block, one `Name: Value\r\n` line per field.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Shared handle to the serialized header block.
    #[inline]
    pub fn to_bytes(&self) -> Bytes {
        self.buf.clone()
    }

    /// Appends a field after all existing ones.
    ///
    /// Leading and trailing whitespace of `value` is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError`] if `name` is not a token or `value` contains
    /// control characters other than horizontal tab.
    pub fn append<N, V>(&mut self, name: N, value: V) -> Result<(), HeaderError>
    where
        N: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let name = name.as_ref();
        let value = trim_ows(value.as_ref());
        validate_name(name)?;
        validate_value(name, value)?;
        self.push_validated(name, value);
        Ok(())
    }

    /// Replaces every field called `name` with a single new one at the end.
    ///
    /// # Errors
    ///
    /// Same as [`append`](Self::append); the store is left untouched on error.
    pub fn set<N, V>(&mut self, name: N, value: V) -> Result<(), HeaderError>
    where
        N: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let name = name.as_ref();
        let value = trim_ows(value.as_ref());
        validate_name(name)?;
        validate_value(name, value)?;
        self.remove_all(name);
        self.push_validated(name, value);
        Ok(())
    }

    /// `set` when `value` is `Some`, `remove_all` otherwise.
    ///
    /// # Errors
    ///
    /// Same as [`set`](Self::set).
    pub fn set_or_remove<N, V>(&mut self, name: N, value: Option<V>) -> Result<(), HeaderError>
    where
        N: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        match value {
            Some(value) => self.set(name, value),
            None => {
                self.remove_all(name);
                Ok(())
            }
        }
    }

    /// Removes every field called `name` (ASCII case-insensitive), shifting the
    /// following lines left over the gap. Returns how many were removed.
    pub fn remove_all<N: AsRef<[u8]>>(&mut self, name: N) -> usize {
        let name = name.as_ref();
        let removed = self.entries.iter().filter(|entry| entry.name(&self.buf).eq_ignore_ascii_case(name)).count();
        if removed == 0 {
            return 0;
        }

        let mut buf = self.take_buf_mut();
        let entries = triomphe::Arc::make_mut(&mut self.entries);
        let mut write_pos = 0;
        entries.retain_mut(|entry| {
            if entry.name(&buf).eq_ignore_ascii_case(name) {
                return false;
            }
            let line = entry.line_range();
            let line_len = line.len();
            if line.start > write_pos {
                buf.copy_within(line.clone(), write_pos);
                *entry = entry.shifted_left(line.start - write_pos);
            }
            write_pos += line_len;
            true
        });
        buf.truncate(write_pos);
        self.buf = buf.freeze();
        self.invalidate_lookup();

        trace!(name = %String::from_utf8_lossy(name), removed, "removed header fields");
        removed
    }

    /// Value of the first field called `name`.
    pub fn get<N: AsRef<[u8]>>(&self, name: N) -> Option<&[u8]> {
        self.position(name.as_ref()).map(|pos| self.entries[pos].value(&self.buf))
    }

    /// Value of the first field called `name` as a shared [`Bytes`] slice.
    pub fn get_bytes<N: AsRef<[u8]>>(&self, name: N) -> Option<Bytes> {
        self.position(name.as_ref()).map(|pos| self.buf.slice(self.entries[pos].value_range()))
    }

    /// Value of the first field called `name`, if it is valid UTF-8.
    pub fn get_str<N: AsRef<[u8]>>(&self, name: N) -> Option<&str> {
        self.get(name).and_then(|value| std::str::from_utf8(value).ok())
    }

    /// Values of all fields called `name`, in append order.
    pub fn get_all<'a>(&'a self, name: &'a [u8]) -> impl Iterator<Item = &'a [u8]> + 'a {
        self.iter().filter(move |(entry_name, _)| entry_name.eq_ignore_ascii_case(name)).map(|(_, value)| value)
    }

    pub fn contains<N: AsRef<[u8]>>(&self, name: N) -> bool {
        self.position(name.as_ref()).is_some()
    }

    /// Iterates `(name, value)` pairs in append order.
    pub fn iter(&self) -> Iter<'_> {
        Iter { buf: &self.buf, entries: self.entries.iter() }
    }

    /// `Content-Length` as a number, if present and well formed.
    ///
    /// When the field is repeated all copies must agree.
    pub fn content_length(&self) -> Option<u64> {
        let mut result = None;
        for value in self.get_all(CONTENT_LENGTH.as_bytes()) {
            let length = parse_decimal(value)?;
            if result.is_some_and(|previous| previous != length) {
                return None;
            }
            result = Some(length);
        }
        result
    }

    /// Whether the final transfer coding is `chunked`.
    pub fn is_chunked(&self) -> bool {
        self.get_all(TRANSFER_ENCODING.as_bytes()).last().is_some_and(is_chunked_coding)
    }

    pub fn content_type(&self) -> Option<&[u8]> {
        self.get(CONTENT_TYPE)
    }

    /// Whether any `Connection` field lists `token`.
    pub fn connection_has(&self, token: &str) -> bool {
        self.get_all(CONNECTION.as_bytes())
            .flat_map(|value| value.split(|b| *b == b','))
            .any(|item| trim_ows(item).eq_ignore_ascii_case(token.as_bytes()))
    }

    /// Adopts a header block exactly as received, without copying.
    ///
    /// Every entry must describe a canonical `Name: Value\r\n` line of `buf` and
    /// together they must cover `buf` completely.
    pub(crate) fn from_wire(buf: Bytes, entries: Vec<HeaderIndex>) -> Self {
        for entry in &entries {
            entry.debug_validate(&buf);
        }
        debug_assert_eq!(entries.last().map_or(0, |entry| entry.line_range().end), buf.len());
        Self { buf, entries: triomphe::Arc::new(entries), lookup: OnceLock::new() }
    }

    /// Appends a field whose name and value have already been validated.
    pub(crate) fn push_validated(&mut self, name: &[u8], value: &[u8]) {
        let mut buf = self.take_buf_mut();
        let at = buf.len();
        buf.reserve(name.len() + value.len() + 4);
        buf.extend_from_slice(name);
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(value);
        buf.extend_from_slice(b"\r\n");
        self.buf = buf.freeze();

        let index = HeaderIndex::for_line(at, name.len(), value.len());
        index.debug_validate(&self.buf);
        triomphe::Arc::make_mut(&mut self.entries).push(index);
        self.invalidate_lookup();
    }

    /// Takes the buffer for writing, cloning it if another store still shares it.
    fn take_buf_mut(&mut self) -> BytesMut {
        match std::mem::take(&mut self.buf).try_into_mut() {
            Ok(unique) => unique,
            Err(shared) => {
                trace!(len = shared.len(), "header buffer is shared, copying before write");
                BytesMut::from(&shared[..])
            }
        }
    }

    fn invalidate_lookup(&mut self) {
        self.lookup.take();
    }

    /// Position of the first entry called `name`.
    ///
    /// A slot is only trusted after comparing the bytes; on a hash collision
    /// the entries are scanned instead.
    fn position(&self, name: &[u8]) -> Option<usize> {
        let slots = self.lookup.get_or_init(|| self.index_names());
        let &pos = slots.get(&fold_hash(name))?;
        if self.entries[pos].name(&self.buf).eq_ignore_ascii_case(name) {
            return Some(pos);
        }
        self.entries.iter().position(|entry| entry.name(&self.buf).eq_ignore_ascii_case(name))
    }

    fn index_names(&self) -> HashMap<u64, usize> {
        let mut slots = HashMap::with_capacity(self.entries.len());
        for (pos, entry) in self.entries.iter().enumerate() {
            slots.entry(fold_hash(entry.name(&self.buf))).or_insert(pos);
        }
        slots
    }
}

impl PartialEq for HeaderStore {
    fn eq(&self, other: &Self) -> bool {
        self.buf == other.buf
    }
}

impl Eq for HeaderStore {}

impl fmt::Debug for HeaderStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(name, value)| (String::from_utf8_lossy(name), String::from_utf8_lossy(value))))
            .finish()
    }
}

impl<'a> IntoIterator for &'a HeaderStore {
    type Item = (&'a [u8], &'a [u8]);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl TryFrom<&http::HeaderMap> for HeaderStore {
    type Error = HeaderError;

    fn try_from(map: &http::HeaderMap) -> Result<Self, Self::Error> {
        let mut store = HeaderStore::with_capacity(map.len() * 32, map.len());
        for (name, value) in map {
            store.append(name.as_str(), value.as_bytes())?;
        }
        Ok(store)
    }
}

impl TryFrom<&HeaderStore> for http::HeaderMap {
    type Error = HeaderError;

    fn try_from(store: &HeaderStore) -> Result<Self, Self::Error> {
        let mut map = http::HeaderMap::with_capacity(store.len());
        for (name, value) in store {
            let header_name = http::HeaderName::from_bytes(name).map_err(|_| HeaderError::invalid_name(name))?;
            let header_value = http::HeaderValue::from_bytes(value).map_err(|_| HeaderError::invalid_value(name))?;
            map.append(header_name, header_value);
        }
        Ok(map)
    }
}

/// Iterator over `(name, value)` pairs of a [`HeaderStore`].
#[derive(Debug, Clone)]
pub struct Iter<'a> {
    buf: &'a [u8],
    entries: slice::Iter<'a, HeaderIndex>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a [u8], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next().map(|entry| (entry.name(self.buf), entry.value(self.buf)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl DoubleEndedIterator for Iter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.entries.next_back().map(|entry| (entry.name(self.buf), entry.value(self.buf)))
    }
}

impl ExactSizeIterator for Iter<'_> {}

/// FNV-1a over the ASCII-lowercased name.
fn fold_hash(name: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;
    name.iter().fold(OFFSET_BASIS, |hash, b| (hash ^ u64::from(b.to_ascii_lowercase())).wrapping_mul(PRIME))
}

/// Parses a non-empty run of ASCII digits, rejecting signs and overflow.
pub(crate) fn parse_decimal(bytes: &[u8]) -> Option<u64> {
    if bytes.is_empty() {
        return None;
    }
    bytes.iter().try_fold(0u64, |acc, b| {
        if b.is_ascii_digit() { acc.checked_mul(10)?.checked_add(u64::from(b - b'0')) } else { None }
    })
}
