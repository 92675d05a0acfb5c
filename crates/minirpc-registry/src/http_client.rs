//! Minimal HTTP client for talking to a registry endpoint.
//!
//! One short-lived connection per request is plenty here: discovery
//! refreshes are TTL-throttled and heartbeats fire once a period.

use http_body_util::Empty;
use hyper::body::{Bytes, Incoming};
use hyper::client::conn::http1;
use hyper::header::HOST;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tracing::debug;

use minirpc_core::{Result, RpcError};

use crate::registry::SERVERS_HEADER;

/// GETs the registry and returns the live-server list from its header.
pub async fn fetch_servers(registry_url: &str) -> Result<Vec<String>> {
    let response = roundtrip(registry_url, Method::GET, None).await?;
    if !response.status().is_success() {
        return Err(RpcError::Transport(format!(
            "registry returned status {}",
            response.status()
        )));
    }

    let servers = response
        .headers()
        .get(SERVERS_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    Ok(servers
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect())
}

/// Issues one request against a `http://host:port/path` URL.
pub(crate) async fn roundtrip(
    url: &str,
    method: Method,
    header: Option<(&str, &str)>,
) -> Result<Response<Incoming>> {
    let (authority, path) = split_url(url)?;

    let stream = TcpStream::connect(authority).await?;
    let io = TokioIo::new(stream);
    let (mut sender, connection) = http1::handshake(io)
        .await
        .map_err(|e| RpcError::Transport(e.to_string()))?;
    tokio::spawn(async move {
        if let Err(err) = connection.await {
            debug!("registry connection error: {err}");
        }
    });

    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header(HOST, authority);
    if let Some((name, value)) = header {
        builder = builder.header(name, value);
    }
    let request = builder
        .body(Empty::<Bytes>::new())
        .map_err(|e| RpcError::Transport(e.to_string()))?;

    sender
        .send_request(request)
        .await
        .map_err(|e| RpcError::Transport(e.to_string()))
}

/// Splits `http://authority/path` into its authority and path.
fn split_url(url: &str) -> Result<(&str, String)> {
    let rest = url
        .strip_prefix("http://")
        .ok_or_else(|| RpcError::InvalidAddress(url.to_string()))?;
    Ok(match rest.split_once('/') {
        Some((authority, path)) => (authority, format!("/{path}")),
        None => (rest, "/".to_string()),
    })
}
