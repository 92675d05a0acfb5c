//! RPC over HTTP `CONNECT`.
//!
//! A client issues `CONNECT /_minirpc_/ HTTP/1.0`; the server answers with
//! `HTTP/1.0 200 Connected to minirpc` and from then on the raw socket
//! carries a normal RPC session. The request head is parsed directly off the
//! socket so it can be hijacked afterwards; this endpoint speaks just enough
//! HTTP for the CONNECT exchange.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error};

use minirpc_core::{Result, CONNECTED, DEFAULT_RPC_PATH};

use crate::server::Server;

/// Upper bound on the CONNECT request head.
const MAX_HEAD_SIZE: usize = 8 * 1024;

/// Accepts HTTP connections forever, upgrading each CONNECT into a session.
pub async fn serve_http(server: Arc<Server>, listener: TcpListener) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!(%peer, "accepted http connection");
                let server = Arc::clone(&server);
                tokio::spawn(async move {
                    if let Err(err) = serve_http_conn(server, stream).await {
                        error!("http connection error: {err}");
                    }
                });
            }
            Err(err) => {
                error!("accept error: {err}");
                return;
            }
        }
    }
}

/// Handles one HTTP connection: parse the head, answer, hijack on CONNECT.
pub async fn serve_http_conn(server: Arc<Server>, mut stream: TcpStream) -> Result<()> {
    let request_line = read_head(&mut stream).await?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default();
    let path = parts.next().unwrap_or_default();

    if method != "CONNECT" {
        stream
            .write_all(
                b"HTTP/1.0 405 Method Not Allowed\r\n\
                  Content-Type: text/plain; charset=utf-8\r\n\r\n\
                  405 must CONNECT\n",
            )
            .await?;
        return Ok(());
    }
    if path != DEFAULT_RPC_PATH {
        stream.write_all(b"HTTP/1.0 404 Not Found\r\n\r\n").await?;
        return Ok(());
    }

    let response = format!("HTTP/1.0 {CONNECTED}\r\n\r\n");
    stream.write_all(response.as_bytes()).await?;
    stream.flush().await?;

    server.serve_conn(stream).await;
    Ok(())
}

/// Reads the request head up to the blank line, returning the request line.
async fn read_head(stream: &mut TcpStream) -> Result<String> {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    let mut total = request_line.len();
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        total += n;
        if n == 0 || line.trim_end().is_empty() {
            break;
        }
        if total > MAX_HEAD_SIZE {
            return Err(minirpc_core::RpcError::Transport(
                "http request head too large".to_string(),
            ));
        }
    }
    Ok(request_line.trim_end().to_string())
}
