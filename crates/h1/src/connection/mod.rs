//! Async connection driver.
//!
//! [`HttpConnection`] wires one request decoder and one serializer to a tokio
//! transport and runs the request/response loop of an HTTP/1.x server:
//! keep-alive, `Expect: 100-continue` and error responses for requests that
//! cannot be parsed.

mod http_connection;

pub use http_connection::HttpConnection;
