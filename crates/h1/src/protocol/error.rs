use std::io;

use http::StatusCode;
use thiserror::Error;

/// Boxed error type used by body streams.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("parse error: {source}")]
    Parse {
        #[from]
        source: ParseError,
    },

    #[error("send error: {source}")]
    Send {
        #[from]
        source: SendError,
    },
}

/// Errors produced while parsing an inbound message.
///
/// Every variant is terminal for the message being parsed; the connection should
/// be closed afterwards since the byte stream cannot be resynchronized.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("malformed start line: {reason}")]
    MalformedStartLine { reason: String },

    #[error("invalid header syntax: {reason}")]
    InvalidHeaderSyntax { reason: String },

    #[error("header size too large, current: {current_size} exceed the limit {max_size}")]
    HeadersTooLarge { current_size: usize, max_size: usize },

    #[error("header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("body size too large, current: {current_size} exceed the limit {max_size}")]
    BodyTooLarge { current_size: u64, max_size: u64 },

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("unsupported transfer-encoding: {reason}")]
    UnsupportedTransferEncoding { reason: String },

    #[error("invalid chunk size: {reason}")]
    InvalidChunkSize { reason: String },

    #[error("invalid chunk framing: {reason}")]
    InvalidChunkFraming { reason: String },

    #[error("unexpected parser state: {reason}")]
    UnexpectedState { reason: String },

    #[error("connection closed before the message was complete")]
    UnexpectedEof,

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

/// Field-less mirror of [`ParseError`], kept by the parser in its `Failed` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseErrorKind {
    MalformedStartLine,
    InvalidHeaderSyntax,
    HeadersTooLarge,
    TooManyHeaders,
    BodyTooLarge,
    InvalidContentLength,
    UnsupportedTransferEncoding,
    InvalidChunkSize,
    InvalidChunkFraming,
    UnexpectedState,
    UnexpectedEof,
    Transport,
}

impl ParseError {
    pub fn malformed_start_line<S: ToString>(str: S) -> Self {
        Self::MalformedStartLine { reason: str.to_string() }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeaderSyntax { reason: str.to_string() }
    }

    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::HeadersTooLarge { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn too_large_body(current_size: u64, max_size: u64) -> Self {
        Self::BodyTooLarge { current_size, max_size }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    pub fn unsupported_transfer_encoding<S: ToString>(str: S) -> Self {
        Self::UnsupportedTransferEncoding { reason: str.to_string() }
    }

    pub fn invalid_chunk_size<S: ToString>(str: S) -> Self {
        Self::InvalidChunkSize { reason: str.to_string() }
    }

    pub fn invalid_chunk_framing<S: ToString>(str: S) -> Self {
        Self::InvalidChunkFraming { reason: str.to_string() }
    }

    pub fn unexpected_state<S: ToString>(str: S) -> Self {
        Self::UnexpectedState { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    pub fn kind(&self) -> ParseErrorKind {
        match self {
            Self::MalformedStartLine { .. } => ParseErrorKind::MalformedStartLine,
            Self::InvalidHeaderSyntax { .. } => ParseErrorKind::InvalidHeaderSyntax,
            Self::HeadersTooLarge { .. } => ParseErrorKind::HeadersTooLarge,
            Self::TooManyHeaders { .. } => ParseErrorKind::TooManyHeaders,
            Self::BodyTooLarge { .. } => ParseErrorKind::BodyTooLarge,
            Self::InvalidContentLength { .. } => ParseErrorKind::InvalidContentLength,
            Self::UnsupportedTransferEncoding { .. } => ParseErrorKind::UnsupportedTransferEncoding,
            Self::InvalidChunkSize { .. } => ParseErrorKind::InvalidChunkSize,
            Self::InvalidChunkFraming { .. } => ParseErrorKind::InvalidChunkFraming,
            Self::UnexpectedState { .. } => ParseErrorKind::UnexpectedState,
            Self::UnexpectedEof => ParseErrorKind::UnexpectedEof,
            Self::Io { .. } => ParseErrorKind::Transport,
        }
    }

    /// Whether a configured limit was exceeded, as opposed to a syntax violation.
    pub fn is_size_limit(&self) -> bool {
        matches!(self, Self::HeadersTooLarge { .. } | Self::TooManyHeaders { .. } | Self::BodyTooLarge { .. })
    }

    /// The status code a server would answer with before closing the connection.
    pub fn suggested_status(&self) -> StatusCode {
        match self {
            Self::HeadersTooLarge { .. } | Self::TooManyHeaders { .. } => StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE,
            Self::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedTransferEncoding { .. } => StatusCode::NOT_IMPLEMENTED,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// Errors produced while serializing an outbound message.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("start line of {size} bytes does not fit the {max_size} bytes scratch buffer")]
    StartLineTooLong { size: usize, max_size: usize },

    #[error("unsupported http version: {version:?}")]
    UnsupportedVersion { version: http::Version },

    #[error("reason phrase contains bytes that are not allowed on the status line")]
    InvalidReason,

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("body length mismatch, declared: {expected}, actual: {actual}")]
    BodyLengthMismatch { expected: u64, actual: u64 },

    #[error("unexpected serializer state: {reason}")]
    UnexpectedState { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn length_mismatch(expected: u64, actual: u64) -> Self {
        Self::BodyLengthMismatch { expected, actual }
    }

    pub fn unexpected_state<S: ToString>(str: S) -> Self {
        Self::UnexpectedState { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

/// Rejected input to the [`HeaderStore`](crate::protocol::header::HeaderStore) mutation API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    #[error("invalid header name: {name:?}")]
    InvalidName { name: String },

    #[error("invalid value for header {name:?}")]
    InvalidValue { name: String },
}

impl HeaderError {
    pub(crate) fn invalid_name(name: &[u8]) -> Self {
        Self::InvalidName { name: String::from_utf8_lossy(name).into_owned() }
    }

    pub(crate) fn invalid_value(name: &[u8]) -> Self {
        Self::InvalidValue { name: String::from_utf8_lossy(name).into_owned() }
    }
}

/// Failure to push data into a live body stream.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodySendError {
    #[error("body receiver has been dropped")]
    Closed,

    #[error("body channel is full")]
    Full,
}
