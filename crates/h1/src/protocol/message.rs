use bytes::{Buf, Bytes};
use http::Version;
use http_body::SizeHint;

use crate::protocol::body::Body;
use crate::protocol::header::HeaderStore;
use crate::protocol::{Request, Response};

/// A complete HTTP/1.x message of either direction.
#[derive(Debug)]
pub enum Message {
    Request(Request),
    Response(Response),
}

impl Message {
    pub fn version(&self) -> Version {
        match self {
            Message::Request(request) => request.version(),
            Message::Response(response) => response.version(),
        }
    }

    pub fn headers(&self) -> &HeaderStore {
        match self {
            Message::Request(request) => request.headers(),
            Message::Response(response) => response.headers(),
        }
    }

    pub fn headers_mut(&mut self) -> &mut HeaderStore {
        match self {
            Message::Request(request) => request.headers_mut(),
            Message::Response(response) => response.headers_mut(),
        }
    }

    pub fn body(&self) -> &Body {
        match self {
            Message::Request(request) => request.body(),
            Message::Response(response) => response.body(),
        }
    }

    pub fn body_mut(&mut self) -> &mut Body {
        match self {
            Message::Request(request) => request.body_mut(),
            Message::Response(response) => response.body_mut(),
        }
    }

    pub fn is_keep_alive(&self) -> bool {
        keep_alive(self.version(), self.headers())
    }

    pub fn into_request(self) -> Option<Request> {
        match self {
            Message::Request(request) => Some(request),
            Message::Response(_) => None,
        }
    }

    pub fn into_response(self) -> Option<Response> {
        match self {
            Message::Request(_) => None,
            Message::Response(response) => Some(response),
        }
    }
}

impl From<Request> for Message {
    fn from(request: Request) -> Self {
        Message::Request(request)
    }
}

impl From<Response> for Message {
    fn from(response: Response) -> Self {
        Message::Response(response)
    }
}

/// One item produced by the streaming decoder: the head of a message, then its
/// payload piece by piece.
#[derive(Debug)]
pub enum MessageItem<H, Data: Buf = Bytes> {
    Head(H),
    Payload(PayloadItem<Data>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem<Data: Buf = Bytes> {
    Chunk(Data),
    Eof,
}

/// How the body of a message is framed on the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PayloadSize {
    Length(u64),
    Chunked,
    Empty,
}

impl PayloadSize {
    #[inline]
    pub fn new_length(length: u64) -> Self {
        PayloadSize::Length(length)
    }

    #[inline]
    pub fn new_chunked() -> Self {
        PayloadSize::Chunked
    }

    #[inline]
    pub fn new_empty() -> Self {
        PayloadSize::Empty
    }

    #[inline]
    pub fn is_chunked(&self) -> bool {
        matches!(self, PayloadSize::Chunked)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, PayloadSize::Empty)
    }
}

impl From<SizeHint> for PayloadSize {
    fn from(size_hint: SizeHint) -> Self {
        match size_hint.exact() {
            Some(0) => PayloadSize::new_empty(),
            Some(length) => PayloadSize::new_length(length),
            None => PayloadSize::new_chunked(),
        }
    }
}

impl From<PayloadSize> for SizeHint {
    fn from(payload_size: PayloadSize) -> Self {
        match payload_size {
            PayloadSize::Length(length) => SizeHint::with_exact(length),
            PayloadSize::Chunked => SizeHint::new(),
            PayloadSize::Empty => SizeHint::with_exact(0),
        }
    }
}

impl<H> MessageItem<H> {
    #[inline]
    pub fn is_payload(&self) -> bool {
        matches!(self, MessageItem::Payload(_))
    }

    #[inline]
    pub fn is_head(&self) -> bool {
        matches!(self, MessageItem::Head(_))
    }

    pub fn into_payload_item(self) -> Option<PayloadItem> {
        match self {
            MessageItem::Head(_) => None,
            MessageItem::Payload(payload_item) => Some(payload_item),
        }
    }
}

impl<H> From<Bytes> for MessageItem<H> {
    fn from(bytes: Bytes) -> Self {
        Self::Payload(PayloadItem::Chunk(bytes))
    }
}

impl<D: Buf> PayloadItem<D> {
    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, PayloadItem::Eof)
    }

    #[inline]
    pub fn is_chunk(&self) -> bool {
        matches!(self, PayloadItem::Chunk(_))
    }
}

impl PayloadItem {
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }

    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }
}

/// HTTP/1.1 connections persist unless `Connection: close` is sent, HTTP/1.0
/// ones only with an explicit `Connection: keep-alive`.
pub(crate) fn keep_alive(version: Version, headers: &HeaderStore) -> bool {
    if headers.connection_has("close") {
        return false;
    }
    version == Version::HTTP_11 || headers.connection_has("keep-alive")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_hint_conversions() {
        assert_eq!(PayloadSize::from(SizeHint::with_exact(0)), PayloadSize::Empty);
        assert_eq!(PayloadSize::from(SizeHint::with_exact(7)), PayloadSize::Length(7));
        assert_eq!(PayloadSize::from(SizeHint::new()), PayloadSize::Chunked);
        assert_eq!(SizeHint::from(PayloadSize::Length(3)).exact(), Some(3));
    }

    #[test]
    fn keep_alive_defaults_by_version() {
        let mut headers = HeaderStore::new();
        assert!(keep_alive(Version::HTTP_11, &headers));
        assert!(!keep_alive(Version::HTTP_10, &headers));

        headers.append("Connection", "Keep-Alive").unwrap();
        assert!(keep_alive(Version::HTTP_10, &headers));

        headers.set("Connection", "close").unwrap();
        assert!(!keep_alive(Version::HTTP_11, &headers));
    }
}
