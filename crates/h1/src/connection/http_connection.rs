use std::future::Future;

use bytes::Bytes;
use futures::StreamExt;
use http::StatusCode;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::FramedRead;
use tracing::{debug, error, info};

use crate::codec::{Assembler, MessageSerializer, RequestDecoder};
use crate::config::{ParserConfig, SerializerConfig};
use crate::protocol::header::CONNECTION;
use crate::protocol::{BoxError, HttpError, MessageItem, ParseError, PayloadItem, PayloadSize, Request, Response, SendError};

/// Server side of one HTTP/1.x connection.
///
/// `HttpConnection` reads requests with a [`RequestDecoder`] and writes responses
/// through a [`MessageSerializer`]. It takes care of:
/// - `Expect: 100-continue` interim responses
/// - collecting request bodies, bounded by [`ParserConfig::max_body_bytes`]
/// - keep-alive, closing after `Connection: close` or a non-persistent HTTP/1.0 exchange
/// - answering unparsable requests with a 4xx response before closing
///
/// # Type Parameters
///
/// * `R`: The async readable half of the transport
/// * `W`: The async writable half of the transport
pub struct HttpConnection<R, W> {
    framed_read: FramedRead<R, RequestDecoder>,
    writer: W,
    serializer: MessageSerializer,
    max_body_bytes: u64,
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_config(reader, writer, ParserConfig::default(), SerializerConfig::default())
    }

    pub fn with_config(reader: R, writer: W, parser_config: ParserConfig, serializer_config: SerializerConfig) -> Self {
        Self {
            framed_read: FramedRead::with_capacity(reader, RequestDecoder::with_config(parser_config), 8 * 1024),
            writer,
            serializer: MessageSerializer::with_config(serializer_config),
            max_body_bytes: parser_config.max_body_bytes,
        }
    }

    /// Serves requests until the peer closes the connection or either side asks
    /// for it to be closed.
    ///
    /// Handler errors are answered with `500 Internal Server Error` and the
    /// connection stays open. Parse errors are answered with the matching 4xx
    /// status, then the error is returned.
    pub async fn process<H, Fut, E>(&mut self, mut handler: H) -> Result<(), HttpError>
    where
        H: FnMut(Request) -> Fut,
        Fut: Future<Output = Result<Response, E>>,
        E: Into<BoxError>,
    {
        loop {
            let request = match self.next_request().await {
                Ok(Some(request)) => request,
                Ok(None) => {
                    info!("cant read more request, break this connection down");
                    return Ok(());
                }
                Err(HttpError::Parse { source }) => {
                    error!(cause = %source, "can't receive next request");
                    if !matches!(source, ParseError::Io { .. }) {
                        let mut response = Response::new(source.suggested_status());
                        mark_close(&mut response);
                        if let Err(e) = self.send(response).await {
                            debug!(cause = %e, "failed to send error response");
                        }
                    }
                    return Err(source.into());
                }
                Err(e) => return Err(e),
            };

            let request_keep_alive = request.is_keep_alive();
            let request_method = request.method().clone();
            let mut response = match handler(request).await {
                Ok(response) => response,
                Err(e) => {
                    let e: BoxError = e.into();
                    error!(cause = %e, "handle request error");
                    Response::new(StatusCode::INTERNAL_SERVER_ERROR)
                }
            };

            if !request_keep_alive {
                mark_close(&mut response);
            }
            let keep_alive = response.is_keep_alive();
            self.serializer.serialize_response_to(response, &request_method, &mut self.writer).await?;

            if !keep_alive {
                info!("connection is not persistent, closing it");
                self.writer.shutdown().await.map_err(SendError::io)?;
                return Ok(());
            }
        }
    }

    /// Reads the next request including its body.
    ///
    /// Returns `Ok(None)` when the peer closed the connection between requests.
    pub async fn next_request(&mut self) -> Result<Option<Request>, HttpError> {
        let Some((request, payload_size)) = self.read_head().await? else {
            return Ok(None);
        };

        let mut assembler = Assembler::new(request, payload_size, self.max_body_bytes)?;
        if !payload_size.is_empty() && assembler.head().expects_continue() {
            self.send(Response::new(StatusCode::CONTINUE)).await?;
            info!("receive expect request header, sent continue response");
        }

        while let Some(bytes) = self.read_payload().await? {
            assembler.push(bytes)?;
        }
        Ok(Some(assembler.finish()))
    }

    /// Reads the next request head. Its payload must be consumed with
    /// [`read_payload`](Self::read_payload) or [`skip_body`](Self::skip_body)
    /// before the next head can be read.
    pub async fn read_head(&mut self) -> Result<Option<(Request, PayloadSize)>, ParseError> {
        match self.framed_read.next().await {
            Some(Ok(MessageItem::Head(head))) => Ok(Some(head)),
            Some(Ok(MessageItem::Payload(_))) => {
                Err(ParseError::unexpected_state("payload of the previous request was not consumed"))
            }
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    /// Next piece of the current request body, `None` once the body is complete.
    pub async fn read_payload(&mut self) -> Result<Option<Bytes>, ParseError> {
        match self.framed_read.next().await {
            Some(Ok(MessageItem::Payload(PayloadItem::Chunk(bytes)))) => Ok(Some(bytes)),
            Some(Ok(MessageItem::Payload(PayloadItem::Eof))) => Ok(None),
            Some(Ok(MessageItem::Head(_))) => Err(ParseError::unexpected_state("read payload while receiving a new head")),
            Some(Err(e)) => Err(e),
            None => Err(ParseError::UnexpectedEof),
        }
    }

    /// Discards the rest of the current request body and returns its size.
    pub async fn skip_body(&mut self) -> Result<u64, ParseError> {
        let mut skipped = 0;
        while let Some(bytes) = self.read_payload().await? {
            skipped += bytes.len() as u64;
        }
        if skipped > 0 {
            info!(skipped, "skipped unread request body");
        }
        Ok(skipped)
    }

    pub async fn send(&mut self, response: Response) -> Result<(), SendError> {
        self.serializer.serialize(response, &mut self.writer).await
    }

    pub fn into_parts(self) -> (R, W) {
        (self.framed_read.into_inner(), self.writer)
    }
}

fn mark_close(response: &mut Response) {
    let headers = response.headers_mut();
    headers.remove_all(CONNECTION);
    headers.push_validated(CONNECTION.as_bytes(), b"close");
}

#[cfg(test)]
mod tests {
    use http::Method;

    use super::*;
    use crate::protocol::ParseErrorKind;

    async fn echo(request: Request) -> Result<Response, BoxError> {
        match request.uri().path() {
            "/fail" => return Err("handler failed".into()),
            "/hello" => return Ok(Response::new(StatusCode::OK).with_body("hello")),
            _ => {}
        }
        let body = request.into_body().collect_bytes().await?;
        Ok(Response::new(StatusCode::OK).with_body(body))
    }

    async fn serve(input: &'static [u8]) -> (Result<(), HttpError>, Vec<u8>) {
        let mut connection = HttpConnection::new(input, Vec::new());
        let result = connection.process(echo).await;
        let (_, out) = connection.into_parts();
        (result, out)
    }

    #[tokio::test]
    async fn keep_alive_pipelined_requests() {
        let (result, out) = serve(b"POST /echo HTTP/1.1\r\nContent-Length: 5\r\n\r\nhelloGET /ping HTTP/1.1\r\n\r\n").await;

        assert!(result.is_ok());
        assert_eq!(out, b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhelloHTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n");
    }

    #[tokio::test]
    async fn chunked_request_body() {
        let (result, out) =
            serve(b"POST /echo HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n3\r\ndef\r\n0\r\n\r\n").await;

        assert!(result.is_ok());
        assert_eq!(out, b"HTTP/1.1 200 OK\r\nContent-Length: 6\r\n\r\nabcdef");
    }

    #[tokio::test]
    async fn sends_continue_before_reading_body() {
        let (result, out) =
            serve(b"POST /upload HTTP/1.1\r\nExpect: 100-continue\r\nContent-Length: 3\r\n\r\nabc").await;

        assert!(result.is_ok());
        assert_eq!(out, b"HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 200 OK\r\nContent-Length: 3\r\n\r\nabc");
    }

    #[tokio::test]
    async fn http10_closes_after_one_exchange() {
        let (result, out) = serve(b"GET /a HTTP/1.0\r\n\r\nGET /b HTTP/1.0\r\n\r\n").await;

        assert!(result.is_ok());
        assert_eq!(out, b"HTTP/1.1 200 OK\r\nConnection: close\r\nContent-Length: 0\r\n\r\n");
    }

    #[tokio::test]
    async fn bad_request_is_answered_then_closed() {
        let (result, out) = serve(b"GET / HTTP/1.1\r\nBad Header\r\n\r\n").await;

        match result {
            Err(HttpError::Parse { source }) => assert_eq!(source.kind(), ParseErrorKind::InvalidHeaderSyntax),
            other => panic!("unexpected result {other:?}"),
        }
        assert_eq!(out, b"HTTP/1.1 400 Bad Request\r\nConnection: close\r\nContent-Length: 0\r\n\r\n");
    }

    #[tokio::test]
    async fn truncated_body_is_an_error() {
        let (result, out) = serve(b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc").await;

        match result {
            Err(HttpError::Parse { source }) => assert_eq!(source.kind(), ParseErrorKind::UnexpectedEof),
            other => panic!("unexpected result {other:?}"),
        }
        assert!(out.starts_with(b"HTTP/1.1 400 Bad Request\r\n"));
    }

    #[tokio::test]
    async fn head_response_is_sent_without_body() {
        let (result, out) = serve(b"HEAD /hello HTTP/1.1\r\n\r\nGET /hello HTTP/1.1\r\n\r\n").await;

        assert!(result.is_ok());
        assert_eq!(
            out,
            b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nHTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello"
        );
    }

    #[tokio::test]
    async fn handler_errors_become_500() {
        let (result, out) = serve(b"GET /fail HTTP/1.1\r\n\r\n").await;

        assert!(result.is_ok());
        assert_eq!(out, b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\n\r\n");
    }

    #[tokio::test]
    async fn oversized_body_gets_413() {
        let parser_config = ParserConfig::default().with_max_body_bytes(2);
        let input: &[u8] = b"POST / HTTP/1.1\r\nExpect: 100-continue\r\nContent-Length: 3\r\n\r\n";
        let mut connection = HttpConnection::with_config(input, Vec::new(), parser_config, SerializerConfig::default());

        assert!(connection.process(echo).await.is_err());
        let (_, out) = connection.into_parts();
        assert!(out.starts_with(b"HTTP/1.1 413 "));
        assert!(out.ends_with(b"\r\nConnection: close\r\nContent-Length: 0\r\n\r\n"));
    }

    #[tokio::test]
    async fn head_then_skip_body() {
        let input: &[u8] = b"PUT /file HTTP/1.1\r\nContent-Length: 4\r\n\r\ndataDELETE /file HTTP/1.1\r\n\r\n";
        let mut connection = HttpConnection::new(input, Vec::new());

        let (request, payload_size) = connection.read_head().await.unwrap().unwrap();
        assert_eq!(request.method(), Method::PUT);
        assert_eq!(payload_size, PayloadSize::Length(4));
        assert_eq!(connection.skip_body().await.unwrap(), 4);

        let next = connection.next_request().await.unwrap().unwrap();
        assert_eq!(next.method(), Method::DELETE);
        assert!(connection.next_request().await.unwrap().is_none());
    }
}
