use std::collections::VecDeque;

use bytes::BytesMut;
use http::Method;
use tokio_util::codec::Decoder;
use tracing::{debug, warn};

use crate::codec::MessageHead;
use crate::codec::body::PayloadDecoder;
use crate::codec::header::HeaderDecoder;
use crate::config::ParserConfig;
use crate::protocol::header::{CONTENT_LENGTH, TRANSFER_ENCODING, parse_decimal};
use crate::protocol::{MessageItem, ParseError, ParseErrorKind, PayloadItem, PayloadSize, Request, Response};

/// Where a decoder or parser currently is within a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    AwaitingStartLine,
    AwaitingHeaders,
    AwaitingBody,
    /// A message was just handed out and nothing of the next one has been read.
    Complete,
    /// Terminal: the byte stream cannot be resynchronized.
    Failed(ParseErrorKind),
}

/// Streaming HTTP/1.x decoder.
///
/// Yields the head of a message as soon as its header block is complete, then
/// the body as [`PayloadItem::Chunk`]s followed by exactly one
/// [`PayloadItem::Eof`]; a message without body yields only the `Eof`. Body
/// bytes are never buffered, which makes this the layer to use for forwarding
/// large payloads. [`MessageParser`](crate::codec::MessageParser) builds complete
/// messages on top of it.
#[derive(Debug)]
pub struct MessageDecoder<M> {
    config: ParserConfig,
    header_decoder: HeaderDecoder<M>,
    payload_decoder: Option<PayloadDecoder>,
    failed: Option<ParseErrorKind>,
    request_methods: VecDeque<Method>,
}

pub type RequestDecoder = MessageDecoder<Request>;
pub type ResponseDecoder = MessageDecoder<Response>;

impl<M: MessageHead> MessageDecoder<M> {
    pub fn new() -> Self {
        Self::with_config(ParserConfig::default())
    }

    pub fn with_config(config: ParserConfig) -> Self {
        Self {
            header_decoder: HeaderDecoder::new(&config),
            config,
            payload_decoder: None,
            failed: None,
            request_methods: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Registers the method of a request whose response will be decoded next.
    ///
    /// Responses are matched to requests in order; `HEAD` and `CONNECT` change
    /// whether a response has a body. Interim 1xx responses do not consume an
    /// entry.
    pub fn expect_response_to(&mut self, method: Method) {
        self.request_methods.push_back(method);
    }

    pub fn state(&self) -> ParseState {
        if let Some(kind) = self.failed {
            return ParseState::Failed(kind);
        }
        if self.payload_decoder.is_some() {
            return ParseState::AwaitingBody;
        }
        if self.header_decoder.has_start_line() {
            return ParseState::AwaitingHeaders;
        }
        ParseState::AwaitingStartLine
    }

    /// Whether part of a message has been consumed but not all of it.
    pub fn is_mid_message(&self) -> bool {
        self.payload_decoder.is_some() || self.header_decoder.has_start_line()
    }

    pub(crate) fn fail(&mut self, error: &ParseError) {
        debug!(cause = %error, "message decoding failed");
        self.failed = Some(error.kind());
        self.payload_decoder = None;
    }

    fn decode_head(&mut self, src: &mut BytesMut) -> Result<Option<MessageItem<(M, PayloadSize)>>, ParseError> {
        let Some(mut head) = self.header_decoder.decode(src)? else {
            return Ok(None);
        };

        let request_method = if head.is_interim() { self.request_methods.front().cloned() } else { self.request_methods.pop_front() };
        let payload_size = payload_size(&mut head, request_method.as_ref(), &self.config)?;

        self.payload_decoder = Some(payload_size.into());
        Ok(Some(MessageItem::Head((head, payload_size))))
    }
}

impl<M: MessageHead> Default for MessageDecoder<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: MessageHead> Decoder for MessageDecoder<M> {
    type Item = MessageItem<(M, PayloadSize)>;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(kind) = self.failed {
            return Err(ParseError::unexpected_state(format!("decoder already failed with {kind:?}")));
        }

        let result = match &mut self.payload_decoder {
            Some(payload_decoder) => match payload_decoder.decode(src) {
                Ok(Some(item @ PayloadItem::Chunk(_))) => Ok(Some(MessageItem::Payload(item))),
                Ok(Some(item @ PayloadItem::Eof)) => {
                    self.payload_decoder = None;
                    Ok(Some(MessageItem::Payload(item)))
                }
                Ok(None) => Ok(None),
                Err(e) => Err(e),
            },
            None => self.decode_head(src),
        };

        if let Err(e) = &result {
            self.fail(e);
        }
        result
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(item) = self.decode(src)? {
            return Ok(Some(item));
        }
        if self.is_mid_message() || !src.is_empty() {
            let error = ParseError::UnexpectedEof;
            self.fail(&error);
            return Err(error);
        }
        Ok(None)
    }
}

/// Picks the body framing of a freshly decoded head.
///
/// Refer: <https://www.rfc-editor.org/rfc/rfc9112.html#name-message-body-length>
fn payload_size<M: MessageHead>(
    head: &mut M,
    request_method: Option<&Method>,
    config: &ParserConfig,
) -> Result<PayloadSize, ParseError> {
    if head.body_forbidden(request_method) {
        return Ok(PayloadSize::Empty);
    }

    let headers = head.headers();
    if headers.contains(TRANSFER_ENCODING) {
        if !headers.is_chunked() {
            return Err(ParseError::unsupported_transfer_encoding("chunked is not the final transfer coding"));
        }
        if headers.contains(CONTENT_LENGTH) {
            if config.reject_ambiguous_framing {
                return Err(ParseError::invalid_content_length("transfer-encoding and content-length both present"));
            }
            warn!("message carries both transfer-encoding and content-length, using chunked framing; possible request smuggling");
            head.headers_mut().remove_all(CONTENT_LENGTH);
        }
        return Ok(PayloadSize::Chunked);
    }

    let mut length = None;
    for value in headers.get_all(CONTENT_LENGTH.as_bytes()) {
        let parsed = parse_decimal(value).ok_or_else(|| {
            ParseError::invalid_content_length(format!("value {:?} is not a non-negative integer", String::from_utf8_lossy(value)))
        })?;
        if length.is_some_and(|previous| previous != parsed) {
            return Err(ParseError::invalid_content_length("conflicting content-length values"));
        }
        length = Some(parsed);
    }

    Ok(match length {
        None | Some(0) => PayloadSize::Empty,
        Some(length) => PayloadSize::Length(length),
    })
}
