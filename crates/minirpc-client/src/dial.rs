//! Transport dialers.
//!
//! Three concrete dialers (TCP, Unix-domain, HTTP CONNECT) plus the
//! scheme-dispatching [`xdial`]. They share one timeout policy: the socket
//! connect and the client construction are each bounded by the options'
//! connect timeout (zero waits indefinitely). Dropping a timed-out
//! construction future closes its stream.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpStream, UnixStream};

use minirpc_core::{Result, RpcError, SessionOptions, CONNECTED, DEFAULT_RPC_PATH};

use crate::client::Client;

/// Connects over TCP and constructs a client on the stream.
pub async fn dial_tcp(addr: &str, options: SessionOptions) -> Result<Arc<Client>> {
    let timeout = options.connect_timeout;
    let stream = with_connect_timeout(timeout, TcpStream::connect(addr)).await??;
    new_client_timeout(stream, options).await
}

/// Connects over a Unix-domain socket.
pub async fn dial_unix(path: &str, options: SessionOptions) -> Result<Arc<Client>> {
    let timeout = options.connect_timeout;
    let stream = with_connect_timeout(timeout, UnixStream::connect(path)).await??;
    new_client_timeout(stream, options).await
}

/// Connects over TCP and upgrades via HTTP `CONNECT` before the session.
pub async fn dial_http(addr: &str, options: SessionOptions) -> Result<Arc<Client>> {
    let timeout = options.connect_timeout;
    let stream = with_connect_timeout(timeout, TcpStream::connect(addr)).await??;
    if timeout.is_zero() {
        new_http_client(stream, options).await
    } else {
        tokio::time::timeout(timeout, new_http_client(stream, options))
            .await
            .map_err(|_| RpcError::ConnectTimeout(timeout))?
    }
}

/// Dials `scheme://address`: `tcp`/`tcp4`/`tcp6`, `unix` (address is the
/// socket path), or `http`/`https` (RPC over HTTP CONNECT).
pub async fn xdial(rpc_addr: &str, options: SessionOptions) -> Result<Arc<Client>> {
    let (network, addr) = split_rpc_address(rpc_addr)?;
    match network {
        "tcp" | "tcp4" | "tcp6" => dial_tcp(addr, options).await,
        "unix" => dial_unix(addr, options).await,
        "http" | "https" => dial_http(addr, options).await,
        _ => Err(RpcError::UnknownNetwork(network.to_string())),
    }
}

fn split_rpc_address(rpc_addr: &str) -> Result<(&str, &str)> {
    rpc_addr
        .split_once("://")
        .ok_or_else(|| RpcError::InvalidAddress(rpc_addr.to_string()))
}

/// Bounds a connect future by the timeout; zero waits indefinitely.
async fn with_connect_timeout<F, T>(timeout: Duration, connect: F) -> Result<std::io::Result<T>>
where
    F: Future<Output = std::io::Result<T>>,
{
    if timeout.is_zero() {
        Ok(connect.await)
    } else {
        tokio::time::timeout(timeout, connect)
            .await
            .map_err(|_| RpcError::ConnectTimeout(timeout))
    }
}

/// Constructs the client, racing the connect timeout. If the timer wins the
/// construction future is dropped along with its stream.
async fn new_client_timeout<S>(stream: S, options: SessionOptions) -> Result<Arc<Client>>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let timeout = options.connect_timeout;
    if timeout.is_zero() {
        Client::new(stream, options).await
    } else {
        tokio::time::timeout(timeout, Client::new(stream, options))
            .await
            .map_err(|_| RpcError::ConnectTimeout(timeout))?
    }
}

/// Issues the CONNECT preamble and hands the raw socket to [`Client::new`]
/// once the server answers `200 Connected to minirpc`.
async fn new_http_client(mut stream: TcpStream, options: SessionOptions) -> Result<Arc<Client>> {
    let request = format!("CONNECT {DEFAULT_RPC_PATH} HTTP/1.0\r\n\r\n");
    stream.write_all(request.as_bytes()).await?;
    stream.flush().await?;

    let status = read_connect_response(&mut stream).await?;
    if status != CONNECTED {
        return Err(RpcError::ConnectStatus(status));
    }
    Client::new(stream, options).await
}

/// Reads the response head, returning the status portion of the status line.
async fn read_connect_response(stream: &mut TcpStream) -> Result<String> {
    let mut reader = BufReader::new(stream);

    let mut status_line = String::new();
    let n = reader.read_line(&mut status_line).await?;
    if n == 0 {
        return Err(RpcError::ConnectionClosed);
    }
    // "HTTP/1.0 200 Connected to minirpc" -> "200 Connected to minirpc"
    let status = match status_line.trim_end().split_once(' ') {
        Some((_version, status)) => status.to_string(),
        None => status_line.trim_end().to_string(),
    };

    // drain the remaining header lines up to the blank line
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 || line.trim_end().is_empty() {
            break;
        }
    }
    Ok(status)
}
