//! Request-line and status-line parsing and rendering.

use std::io::Write;

use bytes::{Bytes, BytesMut};
use http::{Method, StatusCode, Uri, Version};

use crate::cursor::ByteCursor;
use crate::protocol::body::Body;
use crate::protocol::header::{HeaderStore, is_token_byte, is_value_byte};
use crate::protocol::{ParseError, Request, Response, SendError};
use crate::utils::{FastWrite, ensure};

/// A message kind the decoder can produce.
///
/// Implemented for [`Request`] and [`Response`] only.
pub trait MessageHead: Sized + sealed::Sealed {
    /// Parses a start-line, given without its trailing CRLF.
    fn parse_start_line(line: Bytes) -> Result<Self, ParseError>;

    fn version(&self) -> Version;

    fn headers(&self) -> &HeaderStore;

    fn headers_mut(&mut self) -> &mut HeaderStore;

    fn set_body(&mut self, body: Body);

    /// Whether the message cannot have a body regardless of its framing headers.
    ///
    /// `request_method` is the method of the request a response answers, when known.
    fn body_forbidden(&self, request_method: Option<&Method>) -> bool;

    /// 1xx responses precede the final response to the same request.
    fn is_interim(&self) -> bool;
}

mod sealed {
    pub trait Sealed {}

    impl Sealed for crate::protocol::Request {}
    impl Sealed for crate::protocol::Response {}
}

impl MessageHead for Request {
    fn parse_start_line(line: Bytes) -> Result<Self, ParseError> {
        let (method, uri, version) = parse_request_line(&line)?;
        Ok(Request::from_start_line(method, uri, version))
    }

    fn version(&self) -> Version {
        self.version()
    }

    fn headers(&self) -> &HeaderStore {
        self.headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderStore {
        self.headers_mut()
    }

    fn set_body(&mut self, body: Body) {
        *self.body_mut() = body;
    }

    fn body_forbidden(&self, _request_method: Option<&Method>) -> bool {
        false
    }

    fn is_interim(&self) -> bool {
        false
    }
}

impl MessageHead for Response {
    fn parse_start_line(line: Bytes) -> Result<Self, ParseError> {
        let (version, status, reason) = parse_status_line(&line)?;
        Ok(Response::from_start_line(status, reason, version))
    }

    fn version(&self) -> Version {
        self.version()
    }

    fn headers(&self) -> &HeaderStore {
        self.headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderStore {
        self.headers_mut()
    }

    fn set_body(&mut self, body: Body) {
        *self.body_mut() = body;
    }

    fn body_forbidden(&self, request_method: Option<&Method>) -> bool {
        if self.is_bodiless_status() {
            return true;
        }
        match request_method {
            Some(&Method::HEAD) => true,
            Some(&Method::CONNECT) => self.status().is_success(),
            _ => false,
        }
    }

    fn is_interim(&self) -> bool {
        self.status().is_informational()
    }
}

/// `method SP request-target SP HTTP-version`
pub(crate) fn parse_request_line(line: &Bytes) -> Result<(Method, Uri, Version), ParseError> {
    let mut cursor = ByteCursor::new(line);

    let method = cursor.scan_until(b" ").ok_or_else(|| ParseError::malformed_start_line("missing request target"))?;
    ensure!(
        !method.is_empty() && method.iter().copied().all(is_token_byte),
        ParseError::malformed_start_line("invalid method")
    );
    let method = Method::from_bytes(method).map_err(ParseError::malformed_start_line)?;

    let target_start = cursor.position();
    let target = cursor.scan_until(b" ").ok_or_else(|| ParseError::malformed_start_line("missing http version"))?;
    ensure!(!target.is_empty(), ParseError::malformed_start_line("empty request target"));
    let uri = Uri::from_maybe_shared(line.slice(target_start..target_start + target.len()))
        .map_err(|e| ParseError::malformed_start_line(format!("invalid request target: {e}")))?;

    let version = parse_version(cursor.take_rest())?;
    Ok((method, uri, version))
}

/// `HTTP-version SP status-code SP [ reason-phrase ]`
///
/// A missing space after the status code is tolerated.
pub(crate) fn parse_status_line(line: &Bytes) -> Result<(Version, StatusCode, Option<Bytes>), ParseError> {
    let mut cursor = ByteCursor::new(line);

    let version = cursor.scan_until(b" ").ok_or_else(|| ParseError::malformed_start_line("missing status code"))?;
    let version = parse_version(version)?;

    let code_start = cursor.position();
    let (code, reason) = match cursor.scan_until(b" ") {
        Some(code) => (code, Some(line.slice(cursor.position()..))),
        None => (cursor.take_rest(), None),
    };
    ensure!(
        code.len() == 3 && code.iter().all(u8::is_ascii_digit),
        ParseError::malformed_start_line(format!("invalid status code {:?}", String::from_utf8_lossy(code)))
    );
    let status = StatusCode::from_bytes(&line[code_start..code_start + 3]).map_err(ParseError::malformed_start_line)?;

    if let Some(reason) = &reason {
        ensure!(reason.iter().copied().all(is_value_byte), ParseError::malformed_start_line("invalid reason phrase"));
    }
    Ok((version, status, reason))
}

fn parse_version(bytes: &[u8]) -> Result<Version, ParseError> {
    match bytes {
        b"HTTP/1.1" => Ok(Version::HTTP_11),
        b"HTTP/1.0" => Ok(Version::HTTP_10),
        _ => Err(ParseError::malformed_start_line(format!("unsupported http version {:?}", String::from_utf8_lossy(bytes)))),
    }
}

fn version_str(version: Version) -> Result<&'static str, SendError> {
    match version {
        Version::HTTP_11 => Ok("HTTP/1.1"),
        Version::HTTP_10 => Ok("HTTP/1.0"),
        version => Err(SendError::UnsupportedVersion { version }),
    }
}

pub(crate) fn write_request_line(request: &Request, dst: &mut BytesMut) -> Result<(), SendError> {
    let version = version_str(request.version())?;
    write!(FastWrite(dst), "{} {} {}\r\n", request.method().as_str(), request.uri(), version)?;
    Ok(())
}

pub(crate) fn write_status_line(response: &Response, dst: &mut BytesMut) -> Result<(), SendError> {
    let version = version_str(response.version())?;
    let reason = response.reason();
    ensure!(reason.iter().copied().all(is_value_byte), SendError::InvalidReason);

    dst.extend_from_slice(version.as_bytes());
    dst.extend_from_slice(b" ");
    dst.extend_from_slice(response.status().as_str().as_bytes());
    dst.extend_from_slice(b" ");
    dst.extend_from_slice(reason);
    dst.extend_from_slice(b"\r\n");
    Ok(())
}
