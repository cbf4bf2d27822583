use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;

use crate::codec::body::chunked_encoder::ChunkedEncoder;
use crate::codec::body::length_encoder::LengthEncoder;
use crate::protocol::{PayloadItem, PayloadSize, SendError};

/// Body encoder matching the framing headers that were written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadEncoder {
    Length(LengthEncoder),
    Chunked(ChunkedEncoder),
    Empty,
}

impl PayloadEncoder {
    pub fn is_chunked(&self) -> bool {
        matches!(self, Self::Chunked(_))
    }
}

impl From<PayloadSize> for PayloadEncoder {
    fn from(payload_size: PayloadSize) -> Self {
        match payload_size {
            PayloadSize::Length(length) => Self::Length(LengthEncoder::new(length)),
            PayloadSize::Chunked => Self::Chunked(ChunkedEncoder::new()),
            PayloadSize::Empty => Self::Empty,
        }
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for PayloadEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match self {
            Self::Length(encoder) => encoder.encode(item, dst),
            Self::Chunked(encoder) => encoder.encode(item, dst),
            Self::Empty => Ok(()),
        }
    }
}
