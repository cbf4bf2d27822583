//! Zero-copy header storage.
//!
//! [`HeaderStore`] keeps every field in its serialized `Name: Value\r\n` form
//! inside one buffer. Lookups and iteration hand out slices of that buffer, and
//! the serializer writes it to the wire as is.

mod index;
mod names;
mod store;

pub(crate) use index::HeaderIndex;

pub use names::*;
pub use store::HeaderStore;
pub use store::Iter;

pub(crate) use store::parse_decimal;

use crate::cursor::trim_ows;
use crate::protocol::HeaderError;

/// `tchar` from RFC 9110 section 5.6.2.
#[inline]
pub(crate) fn is_token_byte(b: u8) -> bool {
    matches!(b,
        b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.'
        | b'^' | b'_' | b'`' | b'|' | b'~'
        | b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z')
}

/// Field value bytes: HTAB, SP, VCHAR and obs-text.
#[inline]
pub(crate) fn is_value_byte(b: u8) -> bool {
    b == b'\t' || b == b' ' || (0x21..=0x7e).contains(&b) || b >= 0x80
}

pub(crate) fn validate_name(name: &[u8]) -> Result<(), HeaderError> {
    if name.is_empty() || !name.iter().copied().all(is_token_byte) {
        return Err(HeaderError::invalid_name(name));
    }
    Ok(())
}

pub(crate) fn validate_value(name: &[u8], value: &[u8]) -> Result<(), HeaderError> {
    if !value.iter().copied().all(is_value_byte) {
        return Err(HeaderError::invalid_value(name));
    }
    Ok(())
}

/// Whether the last coding listed in a `Transfer-Encoding` value is `chunked`.
pub(crate) fn is_chunked_coding(value: &[u8]) -> bool {
    value.rsplit(|b| *b == b',').next().is_some_and(|last| trim_ows(last).eq_ignore_ascii_case(b"chunked"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_bytes() {
        assert!(validate_name(b"X-Custom_Header.1").is_ok());
        assert!(validate_name(b"Bad:Name").is_err());
        assert!(validate_name(b"Bad Name").is_err());
        assert!(validate_name(b"").is_err());
    }

    #[test]
    fn value_bytes() {
        assert!(validate_value(b"a", b"text/plain; charset=utf-8").is_ok());
        assert!(validate_value(b"a", "caf\u{e9}".as_bytes()).is_ok());
        assert!(validate_value(b"a", b"a\tb").is_ok());
        assert!(validate_value(b"a", b"a\rb").is_err());
        assert!(validate_value(b"a", b"a\0b").is_err());
    }

    #[test]
    fn final_coding_decides_chunked() {
        assert!(is_chunked_coding(b"chunked"));
        assert!(is_chunked_coding(b"gzip, Chunked "));
        assert!(!is_chunked_coding(b"chunked, gzip"));
        assert!(!is_chunked_coding(b"identity"));
    }
}
