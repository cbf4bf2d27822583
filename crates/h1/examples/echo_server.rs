//! Echoes every request body back, streaming it as a chunked response.
//!
//! ```text
//! cargo run --example echo_server
//! curl -v -d 'hello' http://127.0.0.1:8080/echo
//! ```

use bytes::Bytes;
use http::StatusCode;
use micro_h1::connection::HttpConnection;
use micro_h1::protocol::body::LiveStream;
use micro_h1::protocol::{BoxError, Request, Response};
use tokio::net::TcpListener;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!(port = 8080, "start listening");
    let tcp_listener = match TcpListener::bind("127.0.0.1:8080").await {
        Ok(tcp_listener) => tcp_listener,
        Err(e) => {
            error!(cause = %e, "bind server error");
            return;
        }
    };

    loop {
        let (tcp_stream, remote_addr) = match tcp_listener.accept().await {
            Ok(stream_and_addr) => stream_and_addr,
            Err(e) => {
                warn!(cause = %e, "failed to accept");
                continue;
            }
        };

        tokio::spawn(async move {
            let (reader, writer) = tcp_stream.into_split();
            let mut connection = HttpConnection::new(reader, writer);
            match connection.process(echo).await {
                Ok(()) => info!(%remote_addr, "finished process, connection shutdown"),
                Err(e) => error!(%remote_addr, cause = %e, "service has error, connection shutdown"),
            }
        });
    }
}

async fn echo(request: Request) -> Result<Response, BoxError> {
    info!(method = %request.method(), path = request.uri().path(), "receiving request");
    let content_type = request.headers().get_bytes("content-type");
    let body = request.into_body().collect_bytes().await?;

    let (mut sender, stream) = LiveStream::channel(None);
    tokio::spawn(async move {
        for piece in body.chunks(16).map(Bytes::copy_from_slice) {
            if sender.send_data(piece).await.is_err() {
                warn!("client went away while echoing");
                return;
            }
        }
    });

    let mut response = Response::new(StatusCode::OK).with_body(stream);
    if let Some(content_type) = content_type {
        response.headers_mut().append("Content-Type", content_type)?;
    }
    Ok(response)
}
