use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;
use tracing::warn;

use crate::protocol::{PayloadItem, SendError};

/// Writes a body whose size was announced with `Content-Length`.
///
/// Both directions of a mismatch are errors: more bytes than declared, and an
/// end of stream before the declared size was reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthEncoder {
    expected: u64,
    length: u64,
    eof: bool,
}

impl LengthEncoder {
    pub fn new(length: u64) -> Self {
        Self { expected: length, length, eof: false }
    }

    pub fn is_finish(&self) -> bool {
        self.length == 0
    }

    /// Bytes still owed.
    pub fn remaining(&self) -> u64 {
        self.length
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for LengthEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            PayloadItem::Chunk(mut bytes) => {
                let len = bytes.remaining() as u64;
                if len == 0 {
                    return Ok(());
                }
                if len > self.length {
                    warn!(expected = self.expected, actual = self.expected - self.length + len, "body exceeds content-length");
                    return Err(SendError::length_mismatch(self.expected, self.expected - self.length + len));
                }
                while bytes.has_remaining() {
                    let chunk = bytes.chunk();
                    let n = chunk.len();
                    dst.extend_from_slice(chunk);
                    bytes.advance(n);
                }
                self.length -= len;
                Ok(())
            }
            PayloadItem::Eof => {
                if self.eof {
                    return Ok(());
                }
                self.eof = true;
                if self.length > 0 {
                    let actual = self.expected - self.length;
                    warn!(expected = self.expected, actual, "body ended before content-length was reached");
                    return Err(SendError::length_mismatch(self.expected, actual));
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn writes_exact_length() {
        let mut encoder = LengthEncoder::new(10);
        let mut dst = BytesMut::new();

        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"hello")), &mut dst).unwrap();
        assert!(!encoder.is_finish());
        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"world")), &mut dst).unwrap();
        encoder.encode(PayloadItem::<Bytes>::Eof, &mut dst).unwrap();

        assert!(encoder.is_finish());
        assert_eq!(&dst[..], b"helloworld");
    }

    #[test]
    fn rejects_extra_bytes() {
        let mut encoder = LengthEncoder::new(3);
        let mut dst = BytesMut::new();

        let err = encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"toolong")), &mut dst).unwrap_err();
        assert!(matches!(err, SendError::BodyLengthMismatch { expected: 3, actual: 7 }));
        assert!(dst.is_empty());
    }

    #[test]
    fn rejects_short_body() {
        let mut encoder = LengthEncoder::new(5);
        let mut dst = BytesMut::new();

        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"abc")), &mut dst).unwrap();
        let err = encoder.encode(PayloadItem::<Bytes>::Eof, &mut dst).unwrap_err();
        assert!(matches!(err, SendError::BodyLengthMismatch { expected: 5, actual: 3 }));
    }
}
