//! Whole-message parsing.
//!
//! [`MessageParser`] sits on top of [`MessageDecoder`] and collects the payload
//! of each message into its [`Body`]: a `Content-Length` body becomes
//! [`Body::Fixed`], a chunked body becomes a [`LiveStream`] of the decoded
//! chunks, and everything else is [`Body::Empty`]. Collected bodies are bounded
//! by [`ParserConfig::max_body_bytes`].
//!
//! It can be driven two ways:
//!
//! - push style with [`MessageParser::feed`], handing over whatever the
//!   transport produced and getting back [`Parsed::NeedMore`] or a complete
//!   message, with unconsumed bytes kept for the next call
//! - as a [`tokio_util::codec::Decoder`], for example inside a `FramedRead`

use std::mem;

use bytes::{Bytes, BytesMut};
use http::Method;
use tokio_util::codec::Decoder;
use tracing::{debug, trace};

use crate::codec::MessageHead;
use crate::codec::message_decoder::{MessageDecoder, ParseState};
use crate::config::ParserConfig;
use crate::protocol::body::{Body, LiveStream};
use crate::protocol::{MessageItem, ParseError, PayloadItem, PayloadSize, Request, Response};

/// Outcome of [`MessageParser::feed`].
#[derive(Debug)]
pub enum Parsed<M> {
    /// The buffered bytes do not hold a complete message yet.
    NeedMore,
    Complete(M),
}

impl<M> Parsed<M> {
    pub fn is_complete(&self) -> bool {
        matches!(self, Parsed::Complete(_))
    }

    pub fn into_message(self) -> Option<M> {
        match self {
            Parsed::NeedMore => None,
            Parsed::Complete(message) => Some(message),
        }
    }
}

#[derive(Debug)]
pub struct MessageParser<M> {
    decoder: MessageDecoder<M>,
    buffer: BytesMut,
    assembler: Option<Assembler<M>>,
    just_completed: bool,
}

pub type RequestParser = MessageParser<Request>;
pub type ResponseParser = MessageParser<Response>;

impl<M: MessageHead> MessageParser<M> {
    pub fn new() -> Self {
        Self::with_config(ParserConfig::default())
    }

    pub fn with_config(config: ParserConfig) -> Self {
        Self { decoder: MessageDecoder::with_config(config), buffer: BytesMut::new(), assembler: None, just_completed: false }
    }

    pub fn config(&self) -> &ParserConfig {
        self.decoder.config()
    }

    /// See [`MessageDecoder::expect_response_to`].
    pub fn expect_response_to(&mut self, method: Method) {
        self.decoder.expect_response_to(method);
    }

    pub fn state(&self) -> ParseState {
        match self.decoder.state() {
            ParseState::AwaitingStartLine if self.just_completed => ParseState::Complete,
            state => state,
        }
    }

    /// Appends `bytes` to the internal buffer and tries to complete one message.
    ///
    /// At most one message is returned per call. When the transport delivered
    /// several pipelined messages at once, call `feed(&[])` again to get the next
    /// one out of the [leftover](Self::leftover) bytes.
    ///
    /// # Errors
    ///
    /// Any [`ParseError`]. The parser is unusable afterwards.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Parsed<M>, ParseError> {
        self.buffer.extend_from_slice(bytes);

        let mut buffer = mem::take(&mut self.buffer);
        let result = self.decode(&mut buffer);
        self.buffer = buffer;

        Ok(match result? {
            Some(message) => Parsed::Complete(message),
            None => Parsed::NeedMore,
        })
    }

    /// Signals that the transport reached end of stream.
    ///
    /// # Errors
    ///
    /// [`ParseError::UnexpectedEof`] if a message was started but not finished.
    pub fn finish(&mut self) -> Result<Parsed<M>, ParseError> {
        let mut buffer = mem::take(&mut self.buffer);
        let result = self.decode_eof(&mut buffer);
        self.buffer = buffer;

        Ok(match result? {
            Some(message) => Parsed::Complete(message),
            None => Parsed::NeedMore,
        })
    }

    /// Bytes received but not consumed by any message yet.
    pub fn leftover(&self) -> &[u8] {
        &self.buffer
    }

    pub fn take_leftover(&mut self) -> BytesMut {
        mem::take(&mut self.buffer)
    }

    fn fail(&mut self, error: ParseError) -> ParseError {
        self.decoder.fail(&error);
        self.assembler = None;
        error
    }
}

impl<M: MessageHead> Default for MessageParser<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: MessageHead> Decoder for MessageParser<M> {
    type Item = M;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(item) = self.decoder.decode(src)? else {
                return Ok(None);
            };

            match item {
                MessageItem::Head((head, payload_size)) => {
                    self.just_completed = false;
                    let assembler = Assembler::new(head, payload_size, self.decoder.config().max_body_bytes)
                        .map_err(|e| self.fail(e))?;
                    self.assembler = Some(assembler);
                }
                MessageItem::Payload(PayloadItem::Chunk(bytes)) => {
                    let Some(assembler) = &mut self.assembler else {
                        return Err(self.fail(ParseError::unexpected_state("payload without a message head")));
                    };
                    if let Err(e) = assembler.push(bytes) {
                        return Err(self.fail(e));
                    }
                }
                MessageItem::Payload(PayloadItem::Eof) => {
                    let Some(assembler) = self.assembler.take() else {
                        return Err(self.fail(ParseError::unexpected_state("payload without a message head")));
                    };
                    self.just_completed = true;
                    return Ok(Some(assembler.finish()));
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(message) = self.decode(src)? {
            return Ok(Some(message));
        }
        if self.assembler.is_some() || self.decoder.is_mid_message() || !src.is_empty() {
            debug!(buffered = src.len(), "transport closed in the middle of a message");
            return Err(self.fail(ParseError::UnexpectedEof));
        }
        Ok(None)
    }
}

/// Collects the payload of one message.
#[derive(Debug)]
pub(crate) struct Assembler<M> {
    head: M,
    payload_size: PayloadSize,
    chunks: Vec<Bytes>,
    size: u64,
    max_body_bytes: u64,
}

impl<M: MessageHead> Assembler<M> {
    pub(crate) fn new(head: M, payload_size: PayloadSize, max_body_bytes: u64) -> Result<Self, ParseError> {
        if let PayloadSize::Length(length) = payload_size
            && length > max_body_bytes
        {
            return Err(ParseError::too_large_body(length, max_body_bytes));
        }
        Ok(Self { head, payload_size, chunks: Vec::new(), size: 0, max_body_bytes })
    }

    pub(crate) fn head(&self) -> &M {
        &self.head
    }

    pub(crate) fn push(&mut self, bytes: Bytes) -> Result<(), ParseError> {
        self.size += bytes.len() as u64;
        if self.size > self.max_body_bytes {
            return Err(ParseError::too_large_body(self.size, self.max_body_bytes));
        }
        self.chunks.push(bytes);
        Ok(())
    }

    pub(crate) fn finish(self) -> M {
        let Self { mut head, payload_size, mut chunks, size, .. } = self;
        trace!(?payload_size, size, chunks = chunks.len(), "assembled message body");

        let body = match payload_size {
            PayloadSize::Empty => Body::Empty,
            PayloadSize::Chunked => Body::Stream(LiveStream::from_chunks(chunks)),
            PayloadSize::Length(_) if chunks.len() == 1 => Body::Fixed(chunks.pop().unwrap_or_default()),
            PayloadSize::Length(_) => {
                let mut joined = BytesMut::with_capacity(usize::try_from(size).unwrap_or_default());
                for chunk in &chunks {
                    joined.extend_from_slice(chunk);
                }
                Body::Fixed(joined.freeze())
            }
        };
        head.set_body(body);
        head
    }
}

#[cfg(test)]
mod tests {
    use http::{StatusCode, Version};
    use indoc::indoc;

    use super::*;
    use crate::protocol::ParseErrorKind;

    fn crlf(text: &str) -> Vec<u8> {
        text.replace('\n', "\r\n").into_bytes()
    }

    fn complete<M>(parsed: Parsed<M>) -> M {
        match parsed {
            Parsed::Complete(message) => message,
            Parsed::NeedMore => panic!("message is not complete"),
        }
    }

    #[test]
    fn request_with_fixed_body() {
        let mut parser = RequestParser::new();
        let request = complete(parser.feed(b"GET /hello HTTP/1.1\r\nContent-Type: text/plain\r\nContent-Length: 5\r\n\r\nworld").unwrap());

        assert_eq!(request.method(), Method::GET);
        assert_eq!(request.uri().path(), "/hello");
        assert_eq!(request.version(), Version::HTTP_11);
        assert_eq!(request.headers().get("content-type"), Some(&b"text/plain"[..]));
        assert_eq!(request.body().as_fixed().map(|b| &b[..]), Some(&b"world"[..]));
        assert_eq!(parser.state(), ParseState::Complete);
        assert!(parser.leftover().is_empty());
    }

    #[test]
    fn split_input_gives_the_same_request() {
        let mut parser = RequestParser::new();
        assert!(!parser.feed(b"GET /hello HTTP/1.1\r\nContent-").unwrap().is_complete());
        assert_eq!(parser.state(), ParseState::AwaitingHeaders);
        assert!(!parser.feed(b"Type: text/plain\r\nContent-Length: 5\r\n\r\nwor").unwrap().is_complete());
        assert_eq!(parser.state(), ParseState::AwaitingBody);
        let request = complete(parser.feed(b"ld").unwrap());

        assert_eq!(request.uri().path(), "/hello");
        assert_eq!(request.headers().get("Content-Type"), Some(&b"text/plain"[..]));
        assert_eq!(request.body().as_fixed().map(|b| &b[..]), Some(&b"world"[..]));
    }

    #[tokio::test]
    async fn chunked_response_body() {
        let mut parser = ResponseParser::new();
        let response =
            complete(parser.feed(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n").unwrap());

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.reason(), b"OK");
        assert!(response.body().is_stream());
        assert_eq!(response.into_body().collect_bytes().await.unwrap(), Bytes::from_static(b"hello"));
    }

    #[test]
    fn space_before_colon_is_rejected() {
        let mut parser = RequestParser::new();
        let err = parser.feed(b"GET / HTTP/1.1\r\nAccept : */*\r\n\r\n").unwrap_err();

        assert_eq!(err.kind(), ParseErrorKind::InvalidHeaderSyntax);
        assert!(!err.is_size_limit());
        assert_eq!(parser.state(), ParseState::Failed(ParseErrorKind::InvalidHeaderSyntax));
    }

    #[test]
    fn every_split_point_gives_the_same_messages() {
        let input = crlf(indoc! {r"
            POST /a HTTP/1.1
            Host: example.com
            Content-Length: 3

            abcPUT /b HTTP/1.1
            Transfer-Encoding: chunked

            2;ext=1
            de
            1
            f
            0
            Trailer: x

            GET /c HTTP/1.0

        "});

        let summarize = |requests: Vec<Request>| -> Vec<(String, Vec<u8>, usize)> {
            requests
                .into_iter()
                .map(|r| (r.uri().to_string(), r.headers().as_bytes().to_vec(), r.body().as_fixed().map_or(0, Bytes::len)))
                .collect()
        };

        let mut whole = RequestParser::new();
        let mut expected = Vec::new();
        let mut next = whole.feed(&input).unwrap();
        while let Parsed::Complete(request) = next {
            expected.push(request);
            next = whole.feed(&[]).unwrap();
        }
        assert_eq!(expected.len(), 3);
        let expected = summarize(expected);

        for split in 1..input.len() {
            let mut parser = RequestParser::new();
            let mut requests = Vec::new();
            for part in [&input[..split], &input[split..]] {
                let mut next = parser.feed(part).unwrap();
                while let Parsed::Complete(request) = next {
                    requests.push(request);
                    next = parser.feed(&[]).unwrap();
                }
            }
            assert_eq!(summarize(requests), expected, "split at {split}");
        }

        let mut parser = RequestParser::new();
        let mut requests = Vec::new();
        for byte in &input {
            let mut next = parser.feed(std::slice::from_ref(byte)).unwrap();
            while let Parsed::Complete(request) = next {
                requests.push(request);
                next = parser.feed(&[]).unwrap();
            }
        }
        assert_eq!(summarize(requests), expected);
    }

    #[test]
    fn content_length_zero_keeps_following_bytes() {
        let mut parser = RequestParser::new();
        let request = complete(parser.feed(b"POST /empty HTTP/1.1\r\nContent-Length: 0\r\n\r\nGET /next HTTP/1.1\r\n").unwrap());

        assert!(matches!(request.body(), Body::Empty));
        assert_eq!(parser.leftover(), b"GET /next HTTP/1.1\r\n");

        let next = complete(parser.feed(b"\r\n").unwrap());
        assert_eq!(next.uri().path(), "/next");
    }

    #[test]
    fn body_limits() {
        let config = ParserConfig::default().with_max_body_bytes(4);

        let mut parser = RequestParser::with_config(config);
        let err = parser.feed(b"POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\n").unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::BodyTooLarge);
        assert!(err.is_size_limit());
        assert_eq!(err.suggested_status(), StatusCode::PAYLOAD_TOO_LARGE);

        let mut parser = RequestParser::with_config(config);
        let err = parser.feed(b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n3\r\ndef\r\n").unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::BodyTooLarge);
        assert_eq!(parser.state(), ParseState::Failed(ParseErrorKind::BodyTooLarge));

        let mut parser = RequestParser::with_config(config);
        assert!(parser.feed(b"POST / HTTP/1.1\r\nContent-Length: 4\r\n\r\nabcd").unwrap().is_complete());
    }

    #[test]
    fn head_limit() {
        let config = ParserConfig::default().with_max_head_bytes(32);
        let mut parser = RequestParser::with_config(config);
        assert!(!parser.feed(b"GET / HTTP/1.1\r\n").unwrap().is_complete());

        let err = parser.feed(b"X-Padding: aaaaaaaaaaaaaaaaaaaaaa\r\n").unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::HeadersTooLarge);
        assert_eq!(err.suggested_status(), StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE);
    }

    #[test]
    fn eof_handling() {
        let mut parser = RequestParser::new();
        parser.feed(b"POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\nab").unwrap();
        assert_eq!(parser.finish().unwrap_err().kind(), ParseErrorKind::UnexpectedEof);

        let mut parser = RequestParser::new();
        complete(parser.feed(b"GET / HTTP/1.1\r\n\r\n").unwrap());
        assert!(!parser.finish().unwrap().is_complete());
    }

    #[test]
    fn response_to_head_has_no_body() {
        let mut parser = ResponseParser::new();
        parser.expect_response_to(Method::HEAD);

        let response = complete(parser.feed(b"HTTP/1.1 200 OK\r\nContent-Length: 1024\r\n\r\n").unwrap());
        assert!(matches!(response.body(), Body::Empty));
        assert_eq!(response.headers().content_length(), Some(1024));
        assert!(parser.leftover().is_empty());
    }

    #[test]
    fn works_as_a_tokio_decoder() {
        let mut parser = RequestParser::new();
        let mut src = BytesMut::from(&b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n"[..]);

        assert_eq!(parser.decode(&mut src).unwrap().unwrap().uri().path(), "/a");
        assert_eq!(parser.decode(&mut src).unwrap().unwrap().uri().path(), "/b");
        assert!(parser.decode(&mut src).unwrap().is_none());
        assert!(parser.decode_eof(&mut src).unwrap().is_none());
    }
}
