//! An incremental HTTP/1.x protocol engine
//!
//! This crate parses raw bytes from a connection into structured requests and
//! responses, and serializes structured messages back into wire bytes. It does
//! not own sockets, routing or TLS; those belong to the layers above and below.
//!
//! # Features
//!
//! - Incremental parsing that tolerates arbitrary read boundaries
//! - Zero-copy header storage: headers stay in their `Name: Value\r\n` wire form
//! - Fixed-length and chunked bodies in both directions
//! - Serialization through a bounded scratch buffer with partial-write support
//! - Sync (`std::io::Write`) and async (tokio `AsyncWrite`) drive modes
//! - Configurable size limits for heads, header counts and buffered bodies
//!
//! # Example
//!
//! ```no_run
//! use http::StatusCode;
//! use micro_h1::connection::HttpConnection;
//! use micro_h1::protocol::{BoxError, Request, Response};
//! use tokio::net::TcpListener;
//! use tracing::{error, info, warn, Level};
//! use tracing_subscriber::FmtSubscriber;
//!
//! #[tokio::main]
//! async fn main() {
//!     let subscriber = FmtSubscriber::builder()
//!         .with_max_level(Level::INFO)
//!         .finish();
//!     tracing::subscriber::set_global_default(subscriber)
//!         .expect("setting default subscriber failed");
//!
//!     info!(port = 8080, "start listening");
//!     let tcp_listener = match TcpListener::bind("127.0.0.1:8080").await {
//!         Ok(tcp_listener) => tcp_listener,
//!         Err(e) => {
//!             error!(cause = %e, "bind server error");
//!             return;
//!         }
//!     };
//!
//!     loop {
//!         let (tcp_stream, _remote_addr) = match tcp_listener.accept().await {
//!             Ok(stream_and_addr) => stream_and_addr,
//!             Err(e) => {
//!                 warn!(cause = %e, "failed to accept");
//!                 continue;
//!             }
//!         };
//!
//!         tokio::spawn(async move {
//!             let (reader, writer) = tcp_stream.into_split();
//!             let mut connection = HttpConnection::new(reader, writer);
//!             match connection.process(hello_world).await {
//!                 Ok(()) => info!("finished process, connection shutdown"),
//!                 Err(e) => error!("service has error, cause {}, connection shutdown", e),
//!             }
//!         });
//!     }
//! }
//!
//! async fn hello_world(request: Request) -> Result<Response, BoxError> {
//!     info!(path = request.uri().path(), "receiving request");
//!     let body = request.into_body().collect_bytes().await?;
//!     info!(size = body.len(), "receiving request body");
//!
//!     Ok(Response::new(StatusCode::OK).with_body("Hello World!\r\n"))
//! }
//! ```
//!
//! # Architecture
//!
//! - [`protocol`]: messages, the [`HeaderStore`](protocol::header::HeaderStore),
//!   bodies and error types
//! - [`codec`]: the streaming [`MessageDecoder`](codec::MessageDecoder), the
//!   whole-message [`MessageParser`](codec::MessageParser) and the
//!   [`MessageSerializer`](codec::MessageSerializer)
//! - [`connection`]: an async request/response loop on top of the codecs
//! - [`config`]: parser and serializer limits
//!
//! # Error Handling
//!
//! - [`protocol::ParseError`]: inbound failures; every one is terminal for the
//!   connection since the byte stream cannot be resynchronized
//! - [`protocol::SendError`]: outbound failures
//! - [`protocol::HeaderError`]: rejected input to the header mutation API
//! - [`protocol::HttpError`]: either of the first two
//!
//! # Limitations
//!
//! - HTTP/1.0 and HTTP/1.1 only
//! - No close-delimited response bodies; responses need `Content-Length` or chunked framing
//! - Obsolete header line folding is rejected
//! - Chunk extensions and trailers are read but dropped

pub mod codec;
pub mod config;
pub mod connection;
pub mod protocol;

mod cursor;
mod utils;
