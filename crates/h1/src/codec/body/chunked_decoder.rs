//! Decoder for `Transfer-Encoding: chunked` bodies.
//!
//! The decoder is a byte-level state machine that can stop at any byte and pick
//! up again once more input arrives. Roughly it moves through
//! size line → data → data CRLF → (next size line | trailer section → done);
//! the finer states below track where inside a line it stopped.
//!
//! Chunk extensions and trailer fields are consumed and discarded.

use std::task::Poll;

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::protocol::{ParseError, PayloadItem};

use ChunkedState::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: ChunkedState,
    remaining_size: u64,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self { state: SizeStart, remaining_size: 0 }
    }

    /// Whether the terminating chunk and trailer section have been read.
    pub fn is_done(&self) -> bool {
        self.state == Done
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    /// First hex digit of a size line.
    SizeStart,
    Size,
    SizeLws,
    Extension,
    SizeLf,
    Data,
    DataCr,
    DataLf,
    Trailer,
    TrailerLf,
    EndCr,
    EndLf,
    Done,
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if self.state == Done {
                trace!("finished reading chunked data");
                return Ok(Some(PayloadItem::Eof));
            }

            if src.is_empty() {
                return Ok(None);
            }

            let mut buf = None;

            self.state = match self.state.step(src, &mut self.remaining_size, &mut buf) {
                Poll::Pending => return Ok(None),
                Poll::Ready(Ok(new_state)) => new_state,
                Poll::Ready(Err(e)) => return Err(e),
            };

            if let Some(bytes) = buf {
                trace!(len = bytes.len(), "read chunked bytes");
                return Ok(Some(PayloadItem::Chunk(bytes)));
            }
        }
    }
}

macro_rules! try_next_byte {
    ($src:ident) => {{
        if $src.has_remaining() {
            $src.get_u8()
        } else {
            return Poll::Pending;
        }
    }};
}

type StepResult = Poll<Result<ChunkedState, ParseError>>;

impl ChunkedState {
    fn step(&self, src: &mut BytesMut, remaining_size: &mut u64, buf: &mut Option<Bytes>) -> StepResult {
        match self {
            SizeStart => ChunkedState::read_size_start(src, remaining_size),
            Size => ChunkedState::read_size(src, remaining_size),
            SizeLws => ChunkedState::read_size_lws(src),
            Extension => ChunkedState::read_extension(src),
            SizeLf => ChunkedState::read_size_lf(src, *remaining_size),
            Data => ChunkedState::read_data(src, remaining_size, buf),
            DataCr => ChunkedState::read_data_cr(src),
            DataLf => ChunkedState::read_data_lf(src),
            Trailer => ChunkedState::read_trailer(src),
            TrailerLf => ChunkedState::read_trailer_lf(src),
            EndCr => ChunkedState::read_end_cr(src),
            EndLf => ChunkedState::read_end_lf(src),
            Done => Poll::Ready(Ok(Done)),
        }
    }

    fn read_size_start(src: &mut BytesMut, size: &mut u64) -> StepResult {
        let b = try_next_byte!(src);
        match hex_value(b) {
            Some(digit) => {
                *size = u64::from(digit);
                Poll::Ready(Ok(Size))
            }
            None => Poll::Ready(Err(ParseError::invalid_chunk_size(format!("expected hex digit, found byte {b:#04x}")))),
        }
    }

    fn read_size(src: &mut BytesMut, size: &mut u64) -> StepResult {
        let b = try_next_byte!(src);
        if let Some(digit) = hex_value(b) {
            *size = match size.checked_mul(16).and_then(|s| s.checked_add(u64::from(digit))) {
                Some(size) => size,
                None => return Poll::Ready(Err(ParseError::invalid_chunk_size("chunk size overflows u64"))),
            };
            return Poll::Ready(Ok(Size));
        }

        match b {
            b'\t' | b' ' => Poll::Ready(Ok(SizeLws)),
            b';' => Poll::Ready(Ok(Extension)),
            b'\r' => Poll::Ready(Ok(SizeLf)),
            _ => Poll::Ready(Err(ParseError::invalid_chunk_size(format!("unexpected byte {b:#04x} in chunk size")))),
        }
    }

    fn read_size_lws(src: &mut BytesMut) -> StepResult {
        match try_next_byte!(src) {
            // whitespace may follow the size, digits may not
            b'\t' | b' ' => Poll::Ready(Ok(SizeLws)),
            b';' => Poll::Ready(Ok(Extension)),
            b'\r' => Poll::Ready(Ok(SizeLf)),
            _ => Poll::Ready(Err(ParseError::invalid_chunk_size("invalid whitespace after chunk size"))),
        }
    }

    fn read_extension(src: &mut BytesMut) -> StepResult {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(SizeLf)),
            b'\n' => Poll::Ready(Err(ParseError::invalid_chunk_size("bare LF in chunk extension"))),
            _ => Poll::Ready(Ok(Extension)),
        }
    }

    fn read_size_lf(src: &mut BytesMut, size: u64) -> StepResult {
        match try_next_byte!(src) {
            b'\n' if size == 0 => Poll::Ready(Ok(EndCr)),
            b'\n' => Poll::Ready(Ok(Data)),
            _ => Poll::Ready(Err(ParseError::invalid_chunk_size("chunk size line not terminated by CRLF"))),
        }
    }

    fn read_data(src: &mut BytesMut, remaining_size: &mut u64, buf: &mut Option<Bytes>) -> StepResult {
        if src.is_empty() {
            return Poll::Pending;
        }

        let remaining = usize::try_from(*remaining_size).unwrap_or(usize::MAX);
        let read_size = remaining.min(src.len());

        *remaining_size -= read_size as u64;
        *buf = Some(src.split_to(read_size).freeze());

        if *remaining_size > 0 { Poll::Ready(Ok(Data)) } else { Poll::Ready(Ok(DataCr)) }
    }

    fn read_data_cr(src: &mut BytesMut) -> StepResult {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(DataLf)),
            b => Poll::Ready(Err(ParseError::invalid_chunk_framing(format!("expected CR after chunk data, found byte {b:#04x}")))),
        }
    }

    fn read_data_lf(src: &mut BytesMut) -> StepResult {
        match try_next_byte!(src) {
            b'\n' => Poll::Ready(Ok(SizeStart)),
            b => Poll::Ready(Err(ParseError::invalid_chunk_framing(format!("expected LF after chunk data, found byte {b:#04x}")))),
        }
    }

    fn read_trailer(src: &mut BytesMut) -> StepResult {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(TrailerLf)),
            _ => Poll::Ready(Ok(Trailer)),
        }
    }

    fn read_trailer_lf(src: &mut BytesMut) -> StepResult {
        match try_next_byte!(src) {
            b'\n' => Poll::Ready(Ok(EndCr)),
            _ => Poll::Ready(Err(ParseError::invalid_chunk_framing("trailer field not terminated by CRLF"))),
        }
    }

    fn read_end_cr(src: &mut BytesMut) -> StepResult {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(EndLf)),
            _ => Poll::Ready(Ok(Trailer)),
        }
    }

    fn read_end_lf(src: &mut BytesMut) -> StepResult {
        match try_next_byte!(src) {
            b'\n' => Poll::Ready(Ok(Done)),
            _ => Poll::Ready(Err(ParseError::invalid_chunk_framing("chunked body not terminated by CRLF"))),
        }
    }
}

#[inline]
fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
