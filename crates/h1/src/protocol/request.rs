use http::{Method, Uri, Version};

use crate::protocol::body::Body;
use crate::protocol::header::{EXPECT, HeaderStore};
use crate::protocol::message::keep_alive;
use crate::protocol::HeaderError;

/// An HTTP/1.x request: start-line fields, raw header block and body.
#[derive(Debug)]
pub struct Request {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderStore,
    body: Body,
}

impl Request {
    /// Creates an HTTP/1.1 request without headers or body.
    pub fn new(method: Method, uri: Uri) -> Self {
        Self { method, uri, version: Version::HTTP_11, headers: HeaderStore::new(), body: Body::Empty }
    }

    pub(crate) fn from_start_line(method: Method, uri: Uri, version: Version) -> Self {
        Self { method, uri, version, headers: HeaderStore::new(), body: Body::Empty }
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

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn method_mut(&mut self) -> &mut Method {
        &mut self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn uri_mut(&mut self) -> &mut Uri {
        &mut self.uri
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

    /// Whether the client waits for `100 Continue` before sending the body.
    pub fn expects_continue(&self) -> bool {
        self.version == Version::HTTP_11 && self.headers.get(EXPECT).is_some_and(|value| value.eq_ignore_ascii_case(b"100-continue"))
    }
}

impl TryFrom<http::Request<Body>> for Request {
    type Error = HeaderError;

    fn try_from(request: http::Request<Body>) -> Result<Self, Self::Error> {
        let (parts, body) = request.into_parts();
        let headers = HeaderStore::try_from(&parts.headers)?;
        Ok(Self { method: parts.method, uri: parts.uri, version: parts.version, headers, body })
    }
}

impl TryFrom<Request> for http::Request<Body> {
    type Error = HeaderError;

    fn try_from(request: Request) -> Result<Self, Self::Error> {
        let headers = http::HeaderMap::try_from(&request.headers)?;
        let mut converted = http::Request::new(request.body);
        *converted.method_mut() = request.method;
        *converted.uri_mut() = request.uri;
        *converted.version_mut() = request.version;
        *converted.headers_mut() = headers;
        Ok(converted)
    }
}
