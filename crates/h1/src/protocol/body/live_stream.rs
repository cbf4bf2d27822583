use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::channel::mpsc;
use futures::{SinkExt, Stream, TryStreamExt};
use http_body::{Body, Frame, SizeHint};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, StreamBody};
use tracing::debug;

use crate::protocol::{BodySendError, BoxError};

const CHANNEL_CAPACITY: usize = 16;

/// A body whose bytes are produced while it is being consumed.
///
/// `length` is the declared size when the producer knows it up front; the
/// serializer frames such bodies with `Content-Length` and everything else with
/// chunked encoding.
pub struct LiveStream {
    inner: UnsyncBoxBody<Bytes, BoxError>,
    length: Option<u64>,
}

impl LiveStream {
    /// Wraps any `http_body::Body`, taking the length from its exact size hint.
    pub fn new<B>(body: B) -> Self
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let length = body.size_hint().exact();
        Self { inner: body.map_err(Into::into).boxed_unsync(), length }
    }

    pub fn from_stream<S, E>(stream: S, length: Option<u64>) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        let body = BodyExt::map_err(StreamBody::new(stream.map_ok(Frame::data)), Into::into);
        Self { inner: body.boxed_unsync(), length }
    }

    /// A stream of unknown length over chunks that are already in memory.
    pub fn from_chunks(chunks: Vec<Bytes>) -> Self {
        Self::from_stream(futures::stream::iter(chunks.into_iter().map(Ok::<_, BoxError>)), None)
    }

    /// Creates a bounded producer/consumer pair.
    ///
    /// The stream ends when the [`BodySender`] is dropped.
    pub fn channel(length: Option<u64>) -> (BodySender, LiveStream) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        (BodySender { tx }, LiveStream::from_stream(rx, length))
    }

    #[inline]
    pub fn length(&self) -> Option<u64> {
        self.length
    }

    pub fn with_length(mut self, length: Option<u64>) -> Self {
        self.length = length;
        self
    }
}

impl Body for LiveStream {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Pin::new(&mut self.inner).poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        match self.length {
            Some(length) => SizeHint::with_exact(length),
            None => self.inner.size_hint(),
        }
    }
}

impl fmt::Debug for LiveStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveStream").field("length", &self.length).finish_non_exhaustive()
    }
}

/// Producer half of [`LiveStream::channel`].
#[derive(Debug, Clone)]
pub struct BodySender {
    tx: mpsc::Sender<Result<Bytes, BoxError>>,
}

impl BodySender {
    /// Sends a chunk, waiting for capacity.
    ///
    /// # Errors
    ///
    /// [`BodySendError::Closed`] once the consuming side has been dropped.
    pub async fn send_data(&mut self, data: Bytes) -> Result<(), BodySendError> {
        self.tx.send(Ok(data)).await.map_err(|_| BodySendError::Closed)
    }

    /// Sends a chunk without waiting.
    ///
    /// # Errors
    ///
    /// [`BodySendError::Full`] if the channel has no capacity left,
    /// [`BodySendError::Closed`] if the consumer is gone.
    pub fn try_send_data(&mut self, data: Bytes) -> Result<(), BodySendError> {
        self.tx.try_send(Ok(data)).map_err(|e| if e.is_full() { BodySendError::Full } else { BodySendError::Closed })
    }

    /// Ends the stream with an error instead of a clean end.
    pub fn abort<E: Into<BoxError>>(mut self, reason: E) {
        if self.tx.try_send(Err(reason.into())).is_err() {
            debug!("body stream aborted while the consumer was gone or full");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
