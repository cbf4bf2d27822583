//! Body framing in both directions.
//!
//! [`PayloadDecoder`] and [`PayloadEncoder`] pick the concrete codec from a
//! [`PayloadSize`](crate::protocol::PayloadSize): fixed length, chunked, or no
//! body at all.

mod chunked_decoder;
mod chunked_encoder;
mod length_decoder;
mod length_encoder;
mod payload_decoder;
mod payload_encoder;

pub use chunked_decoder::ChunkedDecoder;
pub use chunked_encoder::ChunkedEncoder;
pub use length_decoder::LengthDecoder;
pub use length_encoder::LengthEncoder;
pub use payload_decoder::PayloadDecoder;
pub use payload_encoder::PayloadEncoder;

pub(crate) use chunked_encoder::{LAST_CHUNK_LEN, chunk_overhead};
