use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::codec::body::chunked_decoder::ChunkedDecoder;
use crate::codec::body::length_decoder::LengthDecoder;
use crate::protocol::{ParseError, PayloadItem, PayloadSize};

/// Body decoder selected from the framing of a message head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadDecoder {
    Length(LengthDecoder),
    Chunked(ChunkedDecoder),
    /// Yields `Eof` without touching the buffer.
    Empty,
}

impl From<PayloadSize> for PayloadDecoder {
    fn from(payload_size: PayloadSize) -> Self {
        match payload_size {
            PayloadSize::Length(length) => Self::Length(LengthDecoder::new(length)),
            PayloadSize::Chunked => Self::Chunked(ChunkedDecoder::new()),
            PayloadSize::Empty => Self::Empty,
        }
    }
}

impl Decoder for PayloadDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self {
            Self::Length(decoder) => decoder.decode(src),
            Self::Chunked(decoder) => decoder.decode(src),
            Self::Empty => Ok(Some(PayloadItem::Eof)),
        }
    }
}
