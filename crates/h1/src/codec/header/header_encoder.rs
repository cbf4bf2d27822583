//! Outbound message heads.
//!
//! Before a message is written its framing headers are brought in line with its
//! body: `Content-Length` for bodies of known size, `Transfer-Encoding: chunked`
//! for streams of unknown size, and nothing at all for statuses that never carry
//! a body. User supplied values that already match are left where they are.

use bytes::BytesMut;
use http::{Method, StatusCode};
use tracing::warn;

use crate::codec::start_line::{write_request_line, write_status_line};
use crate::protocol::body::Body;
use crate::protocol::header::{CONTENT_LENGTH, HeaderStore, TRANSFER_ENCODING};
use crate::protocol::{Message, PayloadSize, SendError};

#[derive(Debug, Default, Clone, Copy)]
pub struct HeaderEncoder;

impl HeaderEncoder {
    /// Decides how the body of `message` is framed and rewrites its framing
    /// headers to match.
    ///
    /// `request_method` is the method of the request a response answers. A
    /// response to `HEAD` keeps the framing headers its body would have had but
    /// the body itself is dropped; a 2xx response to `CONNECT` has neither.
    pub fn prepare(&self, message: &mut Message, request_method: Option<&Method>) -> Result<PayloadSize, SendError> {
        if let Message::Response(response) = message {
            let tunnel = request_method == Some(&Method::CONNECT) && response.status().is_success();
            if response.is_bodiless_status() || tunnel {
                if !response.body().payload_size().is_empty() {
                    warn!(status = %response.status(), "dropping body of a response that cannot carry one");
                }
                *response.body_mut() = Body::Empty;

                let status = response.status();
                let headers = response.headers_mut();
                headers.remove_all(TRANSFER_ENCODING);
                // a 304 may describe the selected representation
                if status != StatusCode::NOT_MODIFIED {
                    headers.remove_all(CONTENT_LENGTH);
                }
                return Ok(PayloadSize::Empty);
            }
        }

        let payload_size = frame(message);
        if request_method == Some(&Method::HEAD) && matches!(message, Message::Response(_)) {
            *message.body_mut() = Body::Empty;
            return Ok(PayloadSize::Empty);
        }
        Ok(payload_size)
    }

    /// Renders the start-line of `message` into `dst`.
    pub fn encode_start_line(&self, message: &Message, dst: &mut BytesMut) -> Result<(), SendError> {
        match message {
            Message::Request(request) => write_request_line(request, dst),
            Message::Response(response) => write_status_line(response, dst),
        }
    }
}

/// Brings the framing headers in line with the body.
fn frame(message: &mut Message) -> PayloadSize {
    let payload_size = message.body().payload_size();
    let is_response = matches!(message, Message::Response(_));
    let headers = message.headers_mut();

    match payload_size {
        PayloadSize::Length(length) => {
            headers.remove_all(TRANSFER_ENCODING);
            set_content_length(headers, length);
        }
        PayloadSize::Chunked => {
            headers.remove_all(CONTENT_LENGTH);
            let already_chunked = headers.get_all(TRANSFER_ENCODING.as_bytes()).eq([&b"chunked"[..]]);
            if !already_chunked {
                headers.remove_all(TRANSFER_ENCODING);
                headers.push_validated(TRANSFER_ENCODING.as_bytes(), b"chunked");
            }
        }
        PayloadSize::Empty => {
            headers.remove_all(TRANSFER_ENCODING);
            if is_response {
                // an explicit length is kept for HEAD responses
                if !headers.contains(CONTENT_LENGTH) {
                    headers.push_validated(CONTENT_LENGTH.as_bytes(), b"0");
                }
            } else if headers.contains(CONTENT_LENGTH) {
                set_content_length(headers, 0);
            }
        }
    }

    payload_size
}

fn set_content_length(headers: &mut HeaderStore, length: u64) {
    let single_match = headers.get_all(CONTENT_LENGTH.as_bytes()).count() == 1 && headers.content_length() == Some(length);
    if single_match {
        return;
    }
    headers.remove_all(CONTENT_LENGTH);
    headers.push_validated(CONTENT_LENGTH.as_bytes(), length.to_string().as_bytes());
}
