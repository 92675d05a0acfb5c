//! The registry service.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use minirpc_core::{Result, RpcError};

/// Default path the registry is served on.
pub const DEFAULT_REGISTRY_PATH: &str = "/_minirpc_/registry";

/// Default liveness TTL for registered servers.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Response header carrying the comma-separated live-server list.
pub const SERVERS_HEADER: &str = "X-Minirpc-Servers";

/// Request header carrying the heartbeating server's address.
pub const SERVER_HEADER: &str = "X-Minirpc-Server";

/// Tracks live servers by their last heartbeat.
///
/// A TTL of zero disables expiry.
pub struct Registry {
    timeout: Duration,
    servers: Mutex<HashMap<String, Instant>>,
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new(DEFAULT_TIMEOUT)
    }
}

impl Registry {
    pub fn new(timeout: Duration) -> Registry {
        Registry {
            timeout,
            servers: Mutex::new(HashMap::new()),
        }
    }

    /// Inserts a server or refreshes its heartbeat timestamp.
    pub fn put_server(&self, addr: impl Into<String>) {
        let addr = addr.into();
        debug!(%addr, "heartbeat");
        self.servers
            .lock()
            .expect("registry lock poisoned")
            .insert(addr, Instant::now());
    }

    /// Returns the live addresses, evicting every expired entry.
    pub fn alive_servers(&self) -> Vec<String> {
        let mut servers = self.servers.lock().expect("registry lock poisoned");
        if !self.timeout.is_zero() {
            servers.retain(|_, start| start.elapsed() < self.timeout);
        }
        let mut alive: Vec<String> = servers.keys().cloned().collect();
        alive.sort();
        alive
    }

    /// Answers one registry request; see the crate docs for the contract.
    pub fn handle<B>(&self, req: &Request<B>) -> Response<Full<Bytes>> {
        if req.uri().path() != DEFAULT_REGISTRY_PATH {
            return status_response(StatusCode::NOT_FOUND);
        }
        if req.method() == Method::GET {
            Response::builder()
                .header(SERVERS_HEADER, self.alive_servers().join(","))
                .body(Full::new(Bytes::new()))
                .unwrap()
        } else if req.method() == Method::POST {
            let addr = req
                .headers()
                .get(SERVER_HEADER)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default();
            if addr.is_empty() {
                return status_response(StatusCode::INTERNAL_SERVER_ERROR);
            }
            self.put_server(addr);
            status_response(StatusCode::OK)
        } else {
            status_response(StatusCode::METHOD_NOT_ALLOWED)
        }
    }

    /// Serves the registry on the listener until an accept fails.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        let local = listener
            .local_addr()
            .map_err(|e| RpcError::Transport(format!("failed to get local addr: {e}")))?;
        info!("registry listening on {local}{DEFAULT_REGISTRY_PATH}");

        loop {
            let (stream, _) = listener
                .accept()
                .await
                .map_err(|e| RpcError::Transport(format!("failed to accept connection: {e}")))?;

            let io = TokioIo::new(stream);
            let registry = Arc::clone(&self);

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let registry = Arc::clone(&registry);
                    async move { Ok::<_, RpcError>(registry.handle(&req)) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("error serving registry connection: {err}");
                }
            });
        }
    }
}

fn status_response(status: StatusCode) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .body(Full::new(Bytes::new()))
        .unwrap()
}
