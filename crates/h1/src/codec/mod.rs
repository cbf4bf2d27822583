//! HTTP/1.x codecs.
//!
//! The inbound direction is layered:
//!
//! - [`header`]: start-line and header block, see [`HeaderDecoder`](header::HeaderDecoder)
//! - [`body`]: fixed-length and chunked bodies
//! - [`MessageDecoder`]: both of the above plus the framing decision; yields a
//!   head followed by the payload as it arrives
//! - [`MessageParser`]: collects the payload into the message body and hands out
//!   complete messages
//!
//! The outbound direction is a single state machine, [`MessageSerializer`],
//! which normalizes the framing headers and writes through a bounded scratch
//! buffer into a transport that may accept partial writes.
//!
//! # Example
//!
//! ```
//! use micro_h1::codec::{MessageSerializer, Parsed, RequestParser};
//! use micro_h1::protocol::Response;
//! use http::StatusCode;
//!
//! let mut parser = RequestParser::new();
//! assert!(matches!(parser.feed(b"GET /hello HTTP/1.1\r\nHost: a\r\n").unwrap(), Parsed::NeedMore));
//!
//! let request = parser.feed(b"\r\n").unwrap().into_message().unwrap();
//! assert_eq!(request.uri().path(), "/hello");
//!
//! let mut serializer = MessageSerializer::new();
//! let mut out = Vec::new();
//! serializer.start(Response::new(StatusCode::OK).with_body("hi")).unwrap();
//! serializer.write_to(&mut out).unwrap();
//! assert_eq!(out, b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nhi");
//! ```

pub mod body;
pub mod header;
mod message_decoder;
mod parser;
mod serializer;
mod start_line;

pub use message_decoder::{MessageDecoder, ParseState, RequestDecoder, ResponseDecoder};
pub use parser::{MessageParser, Parsed, RequestParser, ResponseParser};
pub(crate) use parser::Assembler;
pub use serializer::{MessageSerializer, Progress, SerializeState};
pub use start_line::MessageHead;
