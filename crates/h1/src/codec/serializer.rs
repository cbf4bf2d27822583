//! Outbound message serialization.
//!
//! [`MessageSerializer`] turns a [`Request`](crate::protocol::Request) or
//! [`Response`](crate::protocol::Response) into wire bytes and pushes them into a
//! transport that may accept only part of each write. Everything goes through a
//! fixed-size scratch buffer:
//!
//! 1. the start-line is rendered into the scratch buffer
//! 2. the header block is copied next to it when it fits, otherwise it is written
//!    straight from the [`HeaderStore`](crate::protocol::header::HeaderStore)
//!    buffer after the scratch buffer has been drained
//! 3. the body is copied in scratch-sized slices, with chunked framing for
//!    streams of unknown length
//!
//! Unwritten bytes are kept across calls and always go out before anything new
//! is produced, so a transport returning `Pending` or `WouldBlock` never
//! reorders or loses data.
//!
//! The serializer can be driven from async code with [`MessageSerializer::serialize`]
//! or [`MessageSerializer::poll_write`], or from a non-blocking
//! [`std::io::Write`] with [`MessageSerializer::write_to`].

use std::future::poll_fn;
use std::io;
use std::mem;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::{Buf, Bytes, BytesMut};
use http::Method;
use http_body::Body as HttpBody;
use tokio::io::AsyncWrite;
use tokio_util::codec::Encoder;
use tracing::{debug, trace};

use crate::codec::body::{LAST_CHUNK_LEN, PayloadEncoder, chunk_overhead};
use crate::codec::header::HeaderEncoder;
use crate::config::SerializerConfig;
use crate::cursor::CRLF;
use crate::protocol::body::Body;
use crate::protocol::{Message, PayloadItem, Response, SendError};
use crate::utils::ensure;

/// Where the serializer is within the current message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializeState {
    /// Idle, ready for [`MessageSerializer::start`].
    StartLine,
    Headers,
    Body,
    /// Everything is produced; waiting for the transport to take the rest.
    Done,
}

/// Outcome of [`MessageSerializer::write_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// The whole message was written and flushed.
    Done,
    /// The transport would block, or a live body has no data yet. Call again later.
    Pending,
}

#[derive(Debug)]
pub struct MessageSerializer {
    config: SerializerConfig,
    header_encoder: HeaderEncoder,
    state: SerializeState,
    wire: WireBuffer,
    in_flight: Option<InFlight>,
}

#[derive(Debug)]
struct InFlight {
    headers: Option<Bytes>,
    body: Body,
    encoder: PayloadEncoder,
    /// Body bytes already taken from the body but not yet framed into the scratch buffer.
    carry: Bytes,
}

/// The scratch buffer plus the bytes that are written directly after it.
#[derive(Debug)]
struct WireBuffer {
    scratch: BytesMut,
    capacity: usize,
    /// Offset of the first unwritten scratch byte.
    written: usize,
    /// Wire-ready bytes that follow the scratch content.
    pending: Bytes,
}

impl WireBuffer {
    fn new(capacity: usize) -> Self {
        Self { scratch: BytesMut::with_capacity(capacity), capacity, written: 0, pending: Bytes::new() }
    }

    #[inline]
    fn free(&self) -> usize {
        self.capacity.saturating_sub(self.scratch.len())
    }

    #[inline]
    fn has_unwritten(&self) -> bool {
        self.written < self.scratch.len() || !self.pending.is_empty()
    }

    fn clear(&mut self) {
        self.scratch.clear();
        self.written = 0;
        self.pending = Bytes::new();
    }

    /// Writes the scratch content, then the pending bytes.
    fn poll_drain<W>(&mut self, cx: &mut Context<'_>, io: &mut W) -> Poll<io::Result<()>>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        while self.written < self.scratch.len() {
            let n = ready!(poll_write_some(cx, io, &self.scratch[self.written..]))?;
            self.written += n;
        }
        self.scratch.clear();
        self.written = 0;

        while !self.pending.is_empty() {
            let n = ready!(poll_write_some(cx, io, &self.pending))?;
            self.pending.advance(n);
        }
        Poll::Ready(Ok(()))
    }
}

fn poll_write_some<W>(cx: &mut Context<'_>, io: &mut W, buf: &[u8]) -> Poll<io::Result<usize>>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let n = ready!(Pin::new(io).poll_write(cx, buf))?;
    if n == 0 {
        return Poll::Ready(Err(io::Error::new(io::ErrorKind::WriteZero, "transport accepted zero bytes")));
    }
    trace!(written = n, "wrote to transport");
    Poll::Ready(Ok(n))
}

impl MessageSerializer {
    pub fn new() -> Self {
        Self::with_config(SerializerConfig::default())
    }

    pub fn with_config(config: SerializerConfig) -> Self {
        Self {
            wire: WireBuffer::new(config.effective_scratch_size()),
            config,
            header_encoder: HeaderEncoder,
            state: SerializeState::StartLine,
            in_flight: None,
        }
    }

    pub fn config(&self) -> &SerializerConfig {
        &self.config
    }

    pub fn state(&self) -> SerializeState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_none()
    }

    /// Prepares `message` for writing: framing headers are normalized and the
    /// start-line is rendered. Nothing touches the transport until
    /// [`poll_write`](Self::poll_write) or [`write_to`](Self::write_to).
    ///
    /// # Errors
    ///
    /// - [`SendError::UnexpectedState`] while a previous message is still in flight
    /// - [`SendError::StartLineTooLong`] if the start-line does not fit the scratch buffer
    /// - [`SendError::UnsupportedVersion`] for versions other than HTTP/1.0 and HTTP/1.1
    /// - [`SendError::InvalidReason`] if the reason phrase contains CR, LF or other control bytes
    pub fn start(&mut self, message: impl Into<Message>) -> Result<(), SendError> {
        self.start_message(message.into(), None)
    }

    /// Like [`start`](Self::start) for a response to a request made with
    /// `request_method`: a response to `HEAD` is written without its body, and
    /// a 2xx response to `CONNECT` without body or framing headers.
    pub fn start_response_to(&mut self, response: Response, request_method: &Method) -> Result<(), SendError> {
        self.start_message(response.into(), Some(request_method))
    }

    fn start_message(&mut self, mut message: Message, request_method: Option<&Method>) -> Result<(), SendError> {
        ensure!(self.in_flight.is_none(), SendError::unexpected_state("previous message has not been fully written"));

        let payload_size = self.header_encoder.prepare(&mut message, request_method)?;

        self.wire.clear();
        if let Err(e) = self.header_encoder.encode_start_line(&message, &mut self.wire.scratch) {
            self.wire.clear();
            return Err(e);
        }
        if self.wire.scratch.len() > self.wire.capacity {
            let size = self.wire.scratch.len();
            self.wire.clear();
            return Err(SendError::StartLineTooLong { size, max_size: self.wire.capacity });
        }

        let (body, carry) = match mem::take(message.body_mut()) {
            Body::Fixed(bytes) => (Body::Empty, bytes),
            body => (body, Bytes::new()),
        };
        debug!(?payload_size, header_bytes = message.headers().as_bytes().len(), "start serializing message");

        self.in_flight =
            Some(InFlight { headers: Some(message.headers().to_bytes()), body, encoder: payload_size.into(), carry });
        self.state = SerializeState::Headers;
        Ok(())
    }

    /// Drives the message started with [`start`](Self::start) into `io`.
    ///
    /// Returns `Ready(Ok(()))` once everything is written and flushed, or right
    /// away when no message is in flight. After an error the message is
    /// abandoned and the serializer is idle again; the transport should be
    /// closed since it may hold part of a message.
    pub fn poll_write<W>(&mut self, cx: &mut Context<'_>, io: &mut W) -> Poll<Result<(), SendError>>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let result = self.poll_drive(cx, io);
        if let Poll::Ready(Err(e)) = &result {
            debug!(cause = %e, "abandoning message");
            self.reset();
        }
        result
    }

    /// Writes `message` completely.
    ///
    /// # Errors
    ///
    /// See [`start`](Self::start) and [`poll_write`](Self::poll_write).
    pub async fn serialize<W>(&mut self, message: impl Into<Message>, io: &mut W) -> Result<(), SendError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        self.start(message)?;
        poll_fn(|cx| self.poll_write(cx, io)).await
    }

    /// Writes `response` completely, see [`start_response_to`](Self::start_response_to).
    ///
    /// # Errors
    ///
    /// See [`start`](Self::start) and [`poll_write`](Self::poll_write).
    pub async fn serialize_response_to<W>(
        &mut self,
        response: Response,
        request_method: &Method,
        io: &mut W,
    ) -> Result<(), SendError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        self.start_response_to(response, request_method)?;
        poll_fn(|cx| self.poll_write(cx, io)).await
    }

    /// Non-blocking variant of [`poll_write`](Self::poll_write) for
    /// [`std::io::Write`] transports.
    ///
    /// `WouldBlock` from the writer, and a live body that has nothing to offer
    /// yet, both yield [`Progress::Pending`]; call again when the socket is
    /// writable or more body data was sent.
    ///
    /// # Errors
    ///
    /// Any transport error except `WouldBlock` and `Interrupted`, and body errors.
    pub fn write_to<W: io::Write>(&mut self, io: &mut W) -> Result<Progress, SendError> {
        let mut cx = Context::from_waker(futures::task::noop_waker_ref());
        match self.poll_write(&mut cx, &mut SyncWriter(io)) {
            Poll::Ready(Ok(())) => Ok(Progress::Done),
            Poll::Ready(Err(e)) => Err(e),
            Poll::Pending => Ok(Progress::Pending),
        }
    }

    fn reset(&mut self) {
        self.in_flight = None;
        self.wire.clear();
        self.state = SerializeState::StartLine;
    }

    fn poll_drive<W>(&mut self, cx: &mut Context<'_>, io: &mut W) -> Poll<Result<(), SendError>>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        loop {
            // nothing may be appended to the scratch buffer while bytes are pending behind it
            if !self.wire.pending.is_empty() {
                ready!(self.wire.poll_drain(cx, io))?;
            }

            let Some(flight) = &mut self.in_flight else {
                return Poll::Ready(Ok(()));
            };

            match self.state {
                SerializeState::StartLine => return Poll::Ready(Ok(())),

                SerializeState::Headers => match flight.headers.take() {
                    Some(headers) if headers.len() + CRLF.len() <= self.wire.free() => {
                        self.wire.scratch.extend_from_slice(&headers);
                        self.wire.scratch.extend_from_slice(CRLF);
                        self.state = SerializeState::Body;
                    }
                    Some(headers) => {
                        trace!(header_bytes = headers.len(), "header block larger than scratch space, writing it directly");
                        self.wire.pending = headers;
                    }
                    None => {
                        self.wire.scratch.extend_from_slice(CRLF);
                        self.state = SerializeState::Body;
                    }
                },

                SerializeState::Body => {
                    if !flight.carry.is_empty() {
                        let free = self.wire.free();
                        let room = if flight.encoder.is_chunked() { free.saturating_sub(chunk_overhead(free)) } else { free };
                        if room == 0 {
                            ready!(self.wire.poll_drain(cx, io))?;
                            continue;
                        }
                        let data = flight.carry.split_to(room.min(flight.carry.len()));
                        flight.encoder.encode(PayloadItem::Chunk(data), &mut self.wire.scratch)?;
                        continue;
                    }

                    let end_of_body = match &mut flight.body {
                        Body::Empty | Body::Fixed(_) => true,
                        Body::Stream(stream) => match Pin::new(stream).poll_frame(cx) {
                            Poll::Pending if self.wire.has_unwritten() => {
                                ready!(self.wire.poll_drain(cx, io))?;
                                continue;
                            }
                            Poll::Pending => return Poll::Pending,
                            Poll::Ready(Some(Ok(frame))) => {
                                if let Ok(data) = frame.into_data() {
                                    flight.carry = data;
                                }
                                false
                            }
                            Poll::Ready(Some(Err(e))) => return Poll::Ready(Err(SendError::invalid_body(e))),
                            Poll::Ready(None) => true,
                        },
                    };

                    if end_of_body {
                        if flight.encoder.is_chunked() && self.wire.free() < LAST_CHUNK_LEN {
                            ready!(self.wire.poll_drain(cx, io))?;
                            continue;
                        }
                        flight.encoder.encode(PayloadItem::<Bytes>::Eof, &mut self.wire.scratch)?;
                        self.state = SerializeState::Done;
                    }
                }

                SerializeState::Done => {
                    ready!(self.wire.poll_drain(cx, io))?;
                    ready!(Pin::new(&mut *io).poll_flush(cx))?;
                    trace!("message fully written");
                    self.in_flight = None;
                    self.state = SerializeState::StartLine;
                    return Poll::Ready(Ok(()));
                }
            }
        }
    }
}

impl Default for MessageSerializer {
    fn default() -> Self {
        Self::new()
    }
}

/// Presents a non-blocking `std::io::Write` as an `AsyncWrite`, turning
/// `WouldBlock` into `Pending`.
struct SyncWriter<'a, W>(&'a mut W);

impl<W: io::Write> AsyncWrite for SyncWriter<'_, W> {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        loop {
            match this.0.write(buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Poll::Pending,
                result => return Poll::Ready(result),
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            match this.0.flush() {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Poll::Pending,
                result => return Poll::Ready(result),
            }
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.poll_flush(cx)
    }
}
