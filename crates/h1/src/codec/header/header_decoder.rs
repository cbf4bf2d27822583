//! Incremental decoder for the start-line and header block.
//!
//! Lines are only recognized by a full `\r\n`; a bare LF is just another byte
//! and gets rejected by the start-line or field validation. The decoder keeps
//! the offset up to which it has already searched, so feeding a header block one
//! byte at a time stays linear.
//!
//! When every field line is in the canonical `Name: Value` form the received
//! header block becomes the [`HeaderStore`] buffer as is. Anything else (extra
//! whitespace around the value, no space after the colon) is rebuilt into a
//! fresh canonical buffer.

use std::ops::Range;

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::MessageHead;
use crate::config::ParserConfig;
use crate::cursor::{ByteCursor, CRLF, trim_ows};
use crate::protocol::ParseError;
use crate::protocol::header::{HeaderIndex, HeaderStore, is_token_byte, is_value_byte};
use crate::utils::ensure;

#[derive(Debug)]
pub struct HeaderDecoder<M> {
    max_head_bytes: usize,
    max_headers: usize,
    head: Option<M>,
    start_line_len: usize,
    /// Start of the next unparsed field line in the buffer.
    line_start: usize,
    /// Where the CRLF search resumes.
    scanned: usize,
    fields: Vec<FieldRange>,
    canonical: bool,
}

#[derive(Debug, Clone)]
struct FieldRange {
    name: Range<usize>,
    value: Range<usize>,
}

impl<M: MessageHead> HeaderDecoder<M> {
    pub fn new(config: &ParserConfig) -> Self {
        Self {
            max_head_bytes: config.max_head_bytes,
            max_headers: config.max_headers,
            head: None,
            start_line_len: 0,
            line_start: 0,
            scanned: 0,
            fields: Vec::new(),
            canonical: true,
        }
    }

    /// Whether the start-line of the current message has been read.
    pub fn has_start_line(&self) -> bool {
        self.head.is_some()
    }

    fn reset(&mut self) {
        self.head = None;
        self.start_line_len = 0;
        self.line_start = 0;
        self.scanned = 0;
        self.fields.clear();
        self.canonical = true;
    }

    fn parse_field_line(&mut self, line: &[u8], offset: usize) -> Result<(), ParseError> {
        ensure!(!matches!(line[0], b' ' | b'\t'), ParseError::invalid_header("obsolete line folding is not supported"));

        let mut cursor = ByteCursor::new(line);
        let name = cursor.scan_until(b":").ok_or_else(|| ParseError::invalid_header("missing colon in header line"))?;
        ensure!(!name.is_empty(), ParseError::invalid_header("empty header name"));
        ensure!(
            !matches!(name[name.len() - 1], b' ' | b'\t'),
            ParseError::invalid_header("whitespace between header name and colon")
        );
        ensure!(
            name.iter().copied().all(is_token_byte),
            ParseError::invalid_header(format!("invalid header name {:?}", String::from_utf8_lossy(name)))
        );

        let raw_value = cursor.take_rest();
        let value = trim_ows(raw_value);
        ensure!(
            value.iter().copied().all(is_value_byte),
            ParseError::invalid_header(format!("invalid value for header {:?}", String::from_utf8_lossy(name)))
        );
        ensure!(self.fields.len() < self.max_headers, ParseError::too_many_headers(self.max_headers));

        let leading = raw_value.iter().take_while(|b| matches!(b, b' ' | b'\t')).count();
        self.canonical &= leading == 1 && raw_value.first() == Some(&b' ') && raw_value.len() == value.len() + 1;

        let name_end = offset + name.len();
        let value_start = name_end + 1 + leading;
        self.fields.push(FieldRange { name: offset..name_end, value: value_start..value_start + value.len() });
        Ok(())
    }

    fn build_store(&mut self, block: Bytes) -> HeaderStore {
        if self.canonical {
            let entries = self
                .fields
                .iter()
                .map(|field| HeaderIndex::for_line(field.name.start, field.name.len(), field.value.len()))
                .collect();
            return HeaderStore::from_wire(block, entries);
        }

        trace!(fields = self.fields.len(), "header block not in canonical form, rebuilding");
        let mut store = HeaderStore::with_capacity(block.len(), self.fields.len());
        for field in &self.fields {
            store.push_validated(&block[field.name.clone()], &block[field.value.clone()]);
        }
        store
    }
}

impl<M: MessageHead> Decoder for HeaderDecoder<M> {
    type Item = M;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let search_from = self.scanned.max(self.line_start);
            let Some(line_end) = ByteCursor::starting_at(&src[..], search_from).find(CRLF) else {
                let pending = self.start_line_len + src.len();
                ensure!(pending <= self.max_head_bytes, ParseError::too_large_header(pending, self.max_head_bytes));
                // a trailing CR may be completed by the next read
                self.scanned = src.len().saturating_sub(1);
                return Ok(None);
            };
            self.scanned = 0;

            let consumed = self.start_line_len + line_end + CRLF.len();
            ensure!(consumed <= self.max_head_bytes, ParseError::too_large_header(consumed, self.max_head_bytes));

            if self.head.is_none() {
                if line_end == 0 {
                    src.advance(CRLF.len());
                    trace!("skipped empty line before start line");
                    continue;
                }
                let line = src.split_to(line_end + CRLF.len()).freeze();
                self.start_line_len = line.len();
                self.head = Some(M::parse_start_line(line.slice(..line_end))?);
                continue;
            }

            if line_end == self.line_start {
                let block = src.split_to(self.line_start).freeze();
                src.advance(CRLF.len());

                let headers = self.build_store(block);
                let head_size = self.start_line_len + headers.as_bytes().len();
                let Some(mut head) = self.head.take() else {
                    return Err(ParseError::unexpected_state("header block ended without a start line"));
                };
                *head.headers_mut() = headers;
                trace!(head_size, header_count = head.headers().len(), "decoded message head");
                self.reset();
                return Ok(Some(head));
            }

            let line_start = self.line_start;
            self.parse_field_line(&src[line_start..line_end], line_start)?;
            self.line_start = line_end + CRLF.len();
        }
    }
}

#[cfg(test)]
mod tests {
    use http::{Method, StatusCode, Version};
    use indoc::indoc;

    use super::*;
    use crate::protocol::{ParseErrorKind, Request, Response};

    fn crlf(text: &str) -> BytesMut {
        BytesMut::from(text.replace('\n', "\r\n").as_str())
    }

    fn request_decoder() -> HeaderDecoder<Request> {
        HeaderDecoder::new(&ParserConfig::default())
    }

    #[test]
    fn from_curl() {
        let mut buf = crlf(indoc! {r##"
        GET /index.html HTTP/1.1
        Host: 127.0.0.1:8080
        User-Agent: curl/7.79.1
        Accept: */*

        123"##});

        let request = request_decoder().decode(&mut buf).unwrap().unwrap();

        assert_eq!(request.method(), &Method::GET);
        assert_eq!(request.version(), Version::HTTP_11);
        assert_eq!(request.uri().path(), "/index.html");
        assert_eq!(request.headers().len(), 3);
        assert_eq!(request.headers().get("accept"), Some(&b"*/*"[..]));
        assert_eq!(request.headers().get("HOST"), Some(&b"127.0.0.1:8080"[..]));
        assert_eq!(request.headers().get_str("user-agent"), Some("curl/7.79.1"));
        assert_eq!(request.headers().as_bytes(), b"Host: 127.0.0.1:8080\r\nUser-Agent: curl/7.79.1\r\nAccept: */*\r\n");

        assert_eq!(&buf[..], b"123");
    }

    #[test]
    fn from_edge() {
        let mut buf = crlf(indoc! {r##"
        GET /index/?a=1&b=2&a=3 HTTP/1.1
        Host: 127.0.0.1:8080
        Connection: keep-alive
        Cache-Control: max-age=0
        sec-ch-ua: "#Not_A Brand";v="99", "Microsoft Edge";v="109", "Chromium";v="109"
        sec-ch-ua-mobile: ?0
        sec-ch-ua-platform: "macOS"
        Upgrade-Insecure-Requests: 1
        User-Agent: Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/109.0.0.0 Safari/537.36 Edg/109.0.1518.52
        Accept: text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.9
        Sec-Fetch-Site: none
        Sec-Fetch-Mode: navigate
        Sec-Fetch-User: ?1
        Sec-Fetch-Dest: document
        Accept-Encoding: gzip, deflate, br
        Accept-Language: zh-CN,zh;q=0.9,en-US;q=0.8,en;q=0.7

        "##});

        let request = request_decoder().decode(&mut buf).unwrap().unwrap();

        assert_eq!(request.uri().query(), Some("a=1&b=2&a=3"));
        assert_eq!(request.headers().len(), 15);
        assert!(request.is_keep_alive());
        assert_eq!(
            request.headers().get("sec-ch-ua"),
            Some(&br##""#Not_A Brand";v="99", "Microsoft Edge";v="109", "Chromium";v="109""##[..])
        );
        assert_eq!(request.headers().get("sec-ch-ua-platform"), Some(&b"\"macOS\""[..]));
        assert_eq!(request.headers().get("accept-language"), Some(&b"zh-CN,zh;q=0.9,en-US;q=0.8,en;q=0.7"[..]));
        assert!(buf.is_empty());
    }

    #[test]
    fn byte_by_byte_matches_whole_input() {
        let input = crlf(indoc! {r##"
        POST /submit HTTP/1.1
        Host: example.com
        Content-Type:   text/plain
        X-Empty:

        body"##});

        let mut decoder = request_decoder();
        let mut buf = BytesMut::new();
        let mut decoded = None;
        for byte in input.iter() {
            buf.extend_from_slice(&[*byte]);
            if let Some(request) = decoder.decode(&mut buf).unwrap() {
                decoded = Some(request);
                break;
            }
        }

        let request = decoded.unwrap();
        assert_eq!(request.method(), &Method::POST);
        assert_eq!(request.headers().as_bytes(), b"Host: example.com\r\nContent-Type: text/plain\r\nX-Empty: \r\n");
        assert_eq!(request.headers().get("content-type"), Some(&b"text/plain"[..]));
        assert_eq!(request.headers().get("x-empty"), Some(&b""[..]));
        assert!(buf.is_empty());
    }

    #[test]
    fn skips_leading_empty_lines() {
        let mut buf = BytesMut::from(&b"\r\n\r\nGET / HTTP/1.1\r\nHost: a\r\n\r\n"[..]);
        let request = request_decoder().decode(&mut buf).unwrap().unwrap();
        assert_eq!(request.uri().path(), "/");
    }

    #[test]
    fn rejects_space_before_colon() {
        let mut buf = crlf("GET / HTTP/1.1\nAccept : */*\n\n");
        let err = request_decoder().decode(&mut buf).unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::InvalidHeaderSyntax);
    }

    #[test]
    fn rejects_invalid_field_lines() {
        for text in [
            "GET / HTTP/1.1\nNoColon\n\n",
            "GET / HTTP/1.1\nHost: a\n folded\n\n",
            "GET / HTTP/1.1\n: empty\n\n",
            "GET / HTTP/1.1\nBad Name: v\n\n",
            "GET / HTTP/1.1\nX-Bin: a\x01b\n\n",
        ] {
            let err = request_decoder().decode(&mut crlf(text)).unwrap_err();
            assert_eq!(err.kind(), ParseErrorKind::InvalidHeaderSyntax, "input: {text:?}");
        }
    }

    #[test]
    fn bare_lf_is_not_a_terminator() {
        let mut buf = BytesMut::from(&b"GET / HTTP/1.1\r\nHost: a\nX: b\r\n\r\n"[..]);
        let err = request_decoder().decode(&mut buf).unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::InvalidHeaderSyntax);
    }

    #[test]
    fn enforces_head_size_limit() {
        let config = ParserConfig::default().with_max_head_bytes(32);
        let mut decoder = HeaderDecoder::<Request>::new(&config);

        let mut buf = BytesMut::from(&b"GET / HTTP/1.1\r\nX-Long: aaaaaaaaaaaaaaaa"[..]);
        let err = decoder.decode(&mut buf).unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::HeadersTooLarge);
        assert!(err.is_size_limit());
    }

    #[test]
    fn enforces_header_count_limit() {
        let config = ParserConfig::default().with_max_headers(2);
        let mut decoder = HeaderDecoder::<Request>::new(&config);

        let mut buf = crlf("GET / HTTP/1.1\nA: 1\nB: 2\nC: 3\n\n");
        let err = decoder.decode(&mut buf).unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::TooManyHeaders);
    }

    #[test]
    fn decodes_response_head() {
        let mut decoder = HeaderDecoder::<Response>::new(&ParserConfig::default());
        let mut buf = crlf("HTTP/1.1 404 Not Found\nContent-Length: 0\n\n");

        let response = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.reason(), b"Not Found");
        assert_eq!(response.headers().content_length(), Some(0));
    }

    #[test]
    fn decoder_is_reusable() {
        let mut decoder = request_decoder();
        let mut buf = crlf("GET /a HTTP/1.1\nHost: x\n\nGET /b HTTP/1.1\nA:b\n\n");

        let first = decoder.decode(&mut buf).unwrap().unwrap();
        let second = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first.uri().path(), "/a");
        assert_eq!(second.uri().path(), "/b");
        assert_eq!(second.headers().as_bytes(), b"A: b\r\n");
        assert!(decoder.decode(&mut buf).unwrap().is_none());
    }
}
