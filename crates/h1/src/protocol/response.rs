use bytes::Bytes;
use http::{StatusCode, Version};

use crate::protocol::body::Body;
use crate::protocol::header::HeaderStore;
use crate::protocol::message::keep_alive;
use crate::protocol::HeaderError;

/// An HTTP/1.x response.
///
/// The reason phrase is kept as received; when none was set the canonical
/// phrase of the status code is written.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    reason: Option<Bytes>,
    version: Version,
    headers: HeaderStore,
    body: Body,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self { status, reason: None, version: Version::HTTP_11, headers: HeaderStore::new(), body: Body::Empty }
    }

    pub(crate) fn from_start_line(status: StatusCode, reason: Option<Bytes>, version: Version) -> Self {
        Self { status, reason, version, headers: HeaderStore::new(), body: Body::Empty }
    }

    #[must_use]
    pub fn with_body<B: Into<Body>>(mut self, body: B) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: HeaderStore) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    #[must_use]
    pub fn with_reason<R: Into<Bytes>>(mut self, reason: R) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn status_mut(&mut self) -> &mut StatusCode {
        &mut self.status
    }

    /// The reason phrase that was received or set, otherwise the canonical one.
    pub fn reason(&self) -> &[u8] {
        match &self.reason {
            Some(reason) => reason,
            None => self.status.canonical_reason().unwrap_or_default().as_bytes(),
        }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn version_mut(&mut self) -> &mut Version {
        &mut self.version
    }

    pub fn headers(&self) -> &HeaderStore {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderStore {
        &mut self.headers
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    pub fn into_body(self) -> Body {
        self.body
    }

    pub fn is_keep_alive(&self) -> bool {
        keep_alive(self.version, &self.headers)
    }

    /// 1xx, 204 and 304 responses never carry a body or framing headers.
    pub fn is_bodiless_status(&self) -> bool {
        self.status.is_informational() || self.status == StatusCode::NO_CONTENT || self.status == StatusCode::NOT_MODIFIED
    }
}

impl TryFrom<http::Response<Body>> for Response {
    type Error = HeaderError;

    fn try_from(response: http::Response<Body>) -> Result<Self, Self::Error> {
        let (parts, body) = response.into_parts();
        let headers = HeaderStore::try_from(&parts.headers)?;
        Ok(Self { status: parts.status, reason: None, version: parts.version, headers, body })
    }
}

impl TryFrom<Response> for http::Response<Body> {
    type Error = HeaderError;

    fn try_from(response: Response) -> Result<Self, Self::Error> {
        let headers = http::HeaderMap::try_from(&response.headers)?;
        let mut converted = http::Response::new(response.body);
        *converted.status_mut() = response.status;
        *converted.version_mut() = response.version;
        *converted.headers_mut() = headers;
        Ok(converted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_falls_back_to_canonical() {
        let response = Response::new(StatusCode::NOT_FOUND);
        assert_eq!(response.reason(), b"Not Found");

        let response = response.with_reason(Bytes::from_static(b"Nope"));
        assert_eq!(response.reason(), b"Nope");

        assert_eq!(Response::new(StatusCode::from_u16(599).unwrap()).reason(), b"");
    }

    #[test]
    fn bodiless_statuses() {
        assert!(Response::new(StatusCode::CONTINUE).is_bodiless_status());
        assert!(Response::new(StatusCode::NO_CONTENT).is_bodiless_status());
        assert!(Response::new(StatusCode::NOT_MODIFIED).is_bodiless_status());
        assert!(!Response::new(StatusCode::OK).is_bodiless_status());
    }

    #[test]
    fn converts_through_http_response() {
        let http_response = http::Response::builder()
            .status(StatusCode::CREATED)
            .header("Location", "/items/1")
            .body(Body::from("done"))
            .unwrap();

        let response = Response::try_from(http_response).unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers().get_str("location"), Some("/items/1"));

        let back = http::Response::<Body>::try_from(response).unwrap();
        assert_eq!(back.headers()["location"], "/items/1");
    }
}
