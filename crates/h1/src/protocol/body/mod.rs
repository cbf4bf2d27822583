//! Message bodies.
//!
//! A [`Body`] is one of three storage kinds:
//!
//! - `Empty`: no payload at all
//! - `Fixed`: a buffer whose size is known when the head is written
//! - `Stream`: a [`LiveStream`] that yields bytes while the message is being
//!   written, with or without a declared length
//!
//! All of them implement [`http_body::Body`] so they can be handed to anything in
//! the `http-body` ecosystem, and `http_body_util::BodyExt::collect` can be used
//! to buffer them.

mod live_stream;

pub use live_stream::BodySender;
pub use live_stream::LiveStream;

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body::{Frame, SizeHint};
use http_body_util::BodyExt;

use crate::protocol::{BoxError, PayloadSize};

#[derive(Debug, Default)]
pub enum Body {
    #[default]
    Empty,
    Fixed(Bytes),
    Stream(LiveStream),
}

impl Body {
    #[inline]
    pub fn empty() -> Self {
        Body::Empty
    }

    /// The framing this body needs on the wire.
    ///
    /// A zero-length fixed buffer counts as empty.
    pub fn payload_size(&self) -> PayloadSize {
        match self {
            Body::Empty => PayloadSize::Empty,
            Body::Fixed(bytes) if bytes.is_empty() => PayloadSize::Empty,
            Body::Fixed(bytes) => PayloadSize::Length(bytes.len() as u64),
            Body::Stream(stream) => stream.length().map_or(PayloadSize::Chunked, PayloadSize::Length),
        }
    }

    pub fn as_fixed(&self) -> Option<&Bytes> {
        match self {
            Body::Fixed(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Body::Stream(_))
    }

    /// Buffers the whole body.
    ///
    /// # Errors
    ///
    /// Whatever error the underlying stream produced.
    pub async fn collect_bytes(self) -> Result<Bytes, BoxError> {
        match self {
            Body::Empty => Ok(Bytes::new()),
            Body::Fixed(bytes) => Ok(bytes),
            Body::Stream(stream) => Ok(stream.collect().await?.to_bytes()),
        }
    }
}

impl http_body::Body for Body {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match this {
            Body::Empty => Poll::Ready(None),
            Body::Fixed(bytes) => {
                let data = std::mem::take(bytes);
                *this = Body::Empty;
                if data.is_empty() { Poll::Ready(None) } else { Poll::Ready(Some(Ok(Frame::data(data)))) }
            }
            Body::Stream(stream) => Pin::new(stream).poll_frame(cx),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            Body::Empty => true,
            Body::Fixed(bytes) => bytes.is_empty(),
            Body::Stream(stream) => stream.is_end_stream(),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match self {
            Body::Empty => SizeHint::with_exact(0),
            Body::Fixed(bytes) => SizeHint::with_exact(bytes.len() as u64),
            Body::Stream(stream) => stream.size_hint(),
        }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Fixed(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(vec: Vec<u8>) -> Self {
        Body::Fixed(Bytes::from(vec))
    }
}

impl From<String> for Body {
    fn from(string: String) -> Self {
        Body::Fixed(Bytes::from(string))
    }
}

impl From<&'static str> for Body {
    fn from(str: &'static str) -> Self {
        Body::Fixed(Bytes::from_static(str.as_bytes()))
    }
}

impl From<&'static [u8]> for Body {
    fn from(slice: &'static [u8]) -> Self {
        Body::Fixed(Bytes::from_static(slice))
    }
}

impl From<()> for Body {
    fn from(_: ()) -> Self {
        Body::Empty
    }
}

impl From<LiveStream> for Body {
    fn from(stream: LiveStream) -> Self {
        Body::Stream(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_size_per_kind() {
        assert_eq!(Body::Empty.payload_size(), PayloadSize::Empty);
        assert_eq!(Body::from("").payload_size(), PayloadSize::Empty);
        assert_eq!(Body::from("world").payload_size(), PayloadSize::Length(5));
        assert_eq!(Body::from(LiveStream::from_chunks(vec![])).payload_size(), PayloadSize::Chunked);

        let (_sender, stream) = LiveStream::channel(Some(10));
        assert_eq!(Body::from(stream).payload_size(), PayloadSize::Length(10));
    }

    #[tokio::test]
    async fn fixed_body_yields_once() {
        let mut body = Body::from("world");
        assert!(!http_body::Body::is_end_stream(&body));

        let frame = body.frame().await.unwrap().unwrap();
        assert_eq!(frame.into_data().unwrap(), Bytes::from_static(b"world"));
        assert!(body.frame().await.is_none());
        assert!(http_body::Body::is_end_stream(&body));
    }

    #[tokio::test]
    async fn collect_each_kind() {
        assert_eq!(Body::Empty.collect_bytes().await.unwrap(), Bytes::new());
        assert_eq!(Body::from("ab").collect_bytes().await.unwrap(), Bytes::from_static(b"ab"));

        let stream = LiveStream::from_chunks(vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")]);
        assert_eq!(Body::from(stream).collect_bytes().await.unwrap(), Bytes::from_static(b"ab"));
    }
}
