//! Decoder for bodies framed by `Content-Length`.

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::protocol::{ParseError, PayloadItem};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthDecoder {
    remaining: u64,
}

impl LengthDecoder {
    pub fn new(length: u64) -> Self {
        Self { remaining: length }
    }

    /// Bytes still expected.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl Decoder for LengthDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.remaining == 0 {
            return Ok(Some(PayloadItem::Eof));
        }
        if src.is_empty() {
            return Ok(None);
        }

        let take = usize::try_from(self.remaining).map_or(src.len(), |remaining| remaining.min(src.len()));
        self.remaining -= take as u64;
        Ok(Some(PayloadItem::Chunk(src.split_to(take).freeze())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_at_declared_length() {
        let mut buffer = BytesMut::from(&b"1012345678GET / HTTP/1.1\r\n"[..]);
        let mut decoder = LengthDecoder::new(10);

        let payload = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(&payload.as_bytes().unwrap()[..], b"1012345678");
        assert_eq!(&buffer[..], b"GET / HTTP/1.1\r\n");

        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
    }

    #[test]
    fn partial_input() {
        let mut buffer = BytesMut::from(&b"abc"[..]);
        let mut decoder = LengthDecoder::new(5);

        assert_eq!(decoder.decode(&mut buffer).unwrap().unwrap().into_bytes().unwrap(), &b"abc"[..]);
        assert_eq!(decoder.remaining(), 2);
        assert!(decoder.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b"de");
        assert_eq!(decoder.decode(&mut buffer).unwrap().unwrap().into_bytes().unwrap(), &b"de"[..]);
        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
    }

    #[test]
    fn zero_length_is_immediately_done() {
        let mut buffer = BytesMut::from(&b"next"[..]);
        assert!(LengthDecoder::new(0).decode(&mut buffer).unwrap().unwrap().is_eof());
        assert_eq!(&buffer[..], b"next");
    }
}
