use std::io::Write;

use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;

use crate::protocol::{PayloadItem, SendError};
use crate::utils::FastWrite;

/// Size of the terminating `0\r\n\r\n`.
pub(crate) const LAST_CHUNK_LEN: usize = 5;

/// Framing bytes around a chunk of `len` data bytes: hex size plus two CRLFs.
pub(crate) fn chunk_overhead(len: usize) -> usize {
    let hex_digits = if len == 0 { 1 } else { (usize::BITS - len.leading_zeros()).div_ceil(4) as usize };
    hex_digits + 4
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedEncoder {
    eof: bool,
    send_size: u64,
}

impl ChunkedEncoder {
    pub fn new() -> Self {
        Self { eof: false, send_size: 0 }
    }

    pub fn is_finish(&self) -> bool {
        self.eof
    }

    /// Data bytes written so far, framing excluded.
    pub fn send_size(&self) -> u64 {
        self.send_size
    }
}

impl Default for ChunkedEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for ChunkedEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if self.eof {
            return Ok(());
        }

        match item {
            PayloadItem::Chunk(mut bytes) => {
                let len = bytes.remaining();
                // a zero sized chunk would end the body
                if len == 0 {
                    return Ok(());
                }
                dst.reserve(len + chunk_overhead(len));
                write!(FastWrite(dst), "{len:X}\r\n")?;
                while bytes.has_remaining() {
                    let chunk = bytes.chunk();
                    let n = chunk.len();
                    dst.extend_from_slice(chunk);
                    bytes.advance(n);
                }
                dst.extend_from_slice(b"\r\n");
                self.send_size += len as u64;
                Ok(())
            }
            PayloadItem::Eof => {
                self.eof = true;
                dst.extend_from_slice(b"0\r\n\r\n");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use tokio_util::codec::Decoder;

    use super::*;
    use crate::codec::body::ChunkedDecoder;

    /// Encodes `pieces` as one chunked body and decodes it again.
    fn through_decoder(pieces: &[&[u8]]) -> (Vec<u8>, BytesMut) {
        let mut encoder = ChunkedEncoder::new();
        let mut wire = BytesMut::new();
        for piece in pieces {
            encoder.encode(PayloadItem::Chunk(Bytes::copy_from_slice(piece)), &mut wire).unwrap();
        }
        encoder.encode(PayloadItem::<Bytes>::Eof, &mut wire).unwrap();
        let encoded = wire.clone();

        let mut decoder = ChunkedDecoder::new();
        let mut decoded = Vec::new();
        loop {
            match decoder.decode(&mut wire).unwrap() {
                Some(PayloadItem::Chunk(bytes)) => decoded.extend_from_slice(&bytes),
                Some(PayloadItem::Eof) => break,
                None => panic!("decoder wants more than the encoder produced"),
            }
        }
        assert!(wire.is_empty());
        (decoded, encoded)
    }

    #[test]
    fn frames_chunks_and_terminator() {
        let mut encoder = ChunkedEncoder::new();
        let mut dst = BytesMut::new();

        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"hello")), &mut dst).unwrap();
        encoder.encode(PayloadItem::Chunk(Bytes::from(vec![b'x'; 26])), &mut dst).unwrap();
        encoder.encode(PayloadItem::<Bytes>::Eof, &mut dst).unwrap();

        let mut expected = b"5\r\nhello\r\n1A\r\n".to_vec();
        expected.extend(vec![b'x'; 26]);
        expected.extend(b"\r\n0\r\n\r\n");
        assert_eq!(&dst[..], &expected[..]);
        assert!(encoder.is_finish());
        assert_eq!(encoder.send_size(), 31);
    }

    #[test]
    fn empty_chunks_are_skipped() {
        let mut encoder = ChunkedEncoder::new();
        let mut dst = BytesMut::new();

        encoder.encode(PayloadItem::Chunk(Bytes::new()), &mut dst).unwrap();
        assert!(dst.is_empty());
        assert!(!encoder.is_finish());
    }

    #[test]
    fn nothing_after_eof() {
        let mut encoder = ChunkedEncoder::new();
        let mut dst = BytesMut::new();

        encoder.encode(PayloadItem::<Bytes>::Eof, &mut dst).unwrap();
        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"late")), &mut dst).unwrap();
        assert_eq!(&dst[..], b"0\r\n\r\n");
    }

    #[test]
    fn overhead_matches_encoded_size() {
        for len in [1usize, 15, 16, 255, 256, 4095, 4096, 65536] {
            let mut dst = BytesMut::new();
            ChunkedEncoder::new().encode(PayloadItem::Chunk(Bytes::from(vec![0u8; len])), &mut dst).unwrap();
            assert_eq!(dst.len(), len + chunk_overhead(len), "len {len}");
        }
    }

    #[test]
    fn decoder_reads_back_what_was_encoded() {
        let (decoded, encoded) = through_decoder(&[]);
        assert!(decoded.is_empty());
        assert_eq!(&encoded[..], b"0\r\n\r\n");

        let (decoded, _) = through_decoder(&[&b"a"[..]]);
        assert_eq!(decoded, b"a");

        let big = vec![b'z'; 5000];
        let (decoded, _) = through_decoder(&[&b"hello "[..], &b""[..], &b"chunked"[..], &big[..], &b"\r\n0\r\n"[..]]);
        let mut expected = b"hello chunked".to_vec();
        expected.extend_from_slice(&big);
        expected.extend_from_slice(b"\r\n0\r\n");
        assert_eq!(decoded, expected);
    }
}
