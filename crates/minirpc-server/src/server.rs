//! Connection acceptance and the per-connection request pump.
//!
//! One task per accepted connection, one task per in-flight request. The
//! pump owns the read side; all responses funnel through a per-session
//! mutex around the write side so a header and its body are never
//! interleaved with another response.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, UnixListener};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error};

use minirpc_core::{
    read_handshake, Codec, Header, MessageReader, MessageWriter, Result, RpcError,
};

use crate::service::{is_exported, Service};

/// An RPC server: a concurrent map from service name to service.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use minirpc_server::{Server, Service};
/// use minirpc_core::RpcError;
///
/// #[derive(serde::Serialize, serde::Deserialize)]
/// struct Args { a: i32, b: i32 }
///
/// #[tokio::main]
/// async fn main() {
///     let server = Arc::new(Server::new());
///     server
///         .register(Service::new("Arith").method("Sum", |args: Args| async move {
///             Ok::<_, RpcError>(args.a + args.b)
///         }))
///         .unwrap();
///
///     let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
///     server.accept(listener).await;
/// }
/// ```
#[derive(Default)]
pub struct Server {
    services: DashMap<String, Arc<Service>>,
}

impl Server {
    pub fn new() -> Server {
        Server::default()
    }

    /// Installs a service under its name.
    ///
    /// Fails if the name is not exported or a service of that name already
    /// exists.
    pub fn register(&self, service: Service) -> Result<()> {
        let name = service.name().to_string();
        if !is_exported(&name) {
            return Err(RpcError::Registration(format!(
                "rpc: service name is not exported: {name}"
            )));
        }
        match self.services.entry(name) {
            Entry::Occupied(occupied) => Err(RpcError::Registration(format!(
                "rpc: service already defined: {}",
                occupied.key()
            ))),
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::new(service));
                Ok(())
            }
        }
    }

    /// Looks up a registered service by name.
    pub fn service(&self, name: &str) -> Option<Arc<Service>> {
        self.services.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Resolves `"Service.Method"`, splitting on the first `.`.
    fn find_method(&self, service_method: &str) -> Result<(Arc<Service>, String)> {
        let Some((service_name, method_name)) = service_method.split_once('.') else {
            return Err(RpcError::Dispatch(format!(
                "rpc: service/method request ill-formed: {service_method}"
            )));
        };
        let service = self.service(service_name).ok_or_else(|| {
            RpcError::Dispatch(format!("rpc: can't find service {service_name}"))
        })?;
        if !service.has_method(method_name) {
            return Err(RpcError::Dispatch(format!(
                "rpc: can't find method {method_name}"
            )));
        }
        Ok((service, method_name.to_string()))
    }

    /// Accepts TCP connections forever, one session task per connection.
    pub async fn accept(self: Arc<Self>, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    debug!(%peer, "accepted connection");
                    let server = Arc::clone(&self);
                    tokio::spawn(async move { server.serve_conn(stream).await });
                }
                Err(err) => {
                    error!("accept error: {err}");
                    return;
                }
            }
        }
    }

    /// Accepts Unix-domain connections forever.
    pub async fn accept_unix(self: Arc<Self>, listener: UnixListener) {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let server = Arc::clone(&self);
                    tokio::spawn(async move { server.serve_conn(stream).await });
                }
                Err(err) => {
                    error!("accept error: {err}");
                    return;
                }
            }
        }
    }

    /// Runs one session over an established stream until it closes.
    ///
    /// Reads the handshake preamble, then pumps requests: each one is read
    /// sequentially and handed to a worker task, so a slow call never blocks
    /// the next read. On exit the pump drains its workers and shuts the
    /// write side down.
    pub async fn serve_conn<S>(self: Arc<Self>, stream: S)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (mut read_half, write_half) = tokio::io::split(stream);

        let options = match read_handshake(&mut read_half).await {
            Ok(options) => options,
            Err(err) => {
                error!("handshake failed: {err}");
                return;
            }
        };
        let codec = match options.codec() {
            Ok(codec) => codec,
            Err(err) => {
                error!("{err}");
                return;
            }
        };

        let mut reader = MessageReader::new(read_half, codec);
        let writer = Arc::new(Mutex::new(MessageWriter::new(write_half, codec)));
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let mut workers = JoinSet::new();

        loop {
            let header = tokio::select! {
                read = reader.read_header() => match read {
                    Ok(header) => header,
                    Err(RpcError::ConnectionClosed) => break,
                    Err(err) => {
                        error!("read header error: {err}");
                        break;
                    }
                },
                _ = shutdown_rx.changed() => break,
            };

            // Resolve before the body read so the body frame is consumed
            // even for unknown methods, keeping the stream in sync.
            let resolved = self.find_method(&header.service_method);

            let body = match reader.read_body().await {
                Ok(body) => body,
                Err(err) => {
                    if !matches!(err, RpcError::ConnectionClosed) {
                        error!("read body error: {err}");
                        let mut header = header;
                        header.error = err.to_string();
                        send_response(&writer, &header, &codec.placeholder()).await;
                    }
                    break;
                }
            };

            match resolved {
                Ok((service, method)) => {
                    workers.spawn(handle_request(
                        service,
                        method,
                        header,
                        body,
                        codec,
                        Arc::clone(&writer),
                        options.handle_timeout,
                        shutdown_tx.clone(),
                    ));
                }
                Err(err) => {
                    error!("{err}");
                    let writer = Arc::clone(&writer);
                    let mut header = header;
                    workers.spawn(async move {
                        header.error = err.to_string();
                        send_response(&writer, &header, &codec.placeholder()).await;
                    });
                }
            }
        }

        while workers.join_next().await.is_some() {}
        let _ = writer.lock().await.shutdown().await;
    }
}

/// Executes one call and writes its response.
///
/// With a non-zero handle timeout the call races a timer; if the timer wins,
/// a canonical timeout error goes out and the whole session is torn down,
/// failing the writes of any other in-flight worker.
#[allow(clippy::too_many_arguments)]
async fn handle_request<W>(
    service: Arc<Service>,
    method: String,
    mut header: Header,
    body: Vec<u8>,
    codec: Codec,
    writer: Arc<Mutex<MessageWriter<W>>>,
    handle_timeout: Duration,
    shutdown: watch::Sender<bool>,
) where
    W: AsyncWrite + Send + Unpin + 'static,
{
    let call = match service.dispatch(&method, codec, body) {
        Ok(call) => call,
        Err(err) => {
            header.error = err.to_string();
            send_response(&writer, &header, &codec.placeholder()).await;
            return;
        }
    };

    let outcome = if handle_timeout.is_zero() {
        Some(call.await)
    } else {
        tokio::time::timeout(handle_timeout, call).await.ok()
    };

    match outcome {
        Some(Ok(reply)) => send_response(&writer, &header, &reply).await,
        Some(Err(err)) => {
            header.error = err.to_string();
            send_response(&writer, &header, &codec.placeholder()).await;
        }
        None => {
            error!(
                service_method = %header.service_method,
                "call exceeded handle timeout, closing session"
            );
            header.error = RpcError::HandleTimeout(handle_timeout).to_string();
            send_response(&writer, &header, &codec.placeholder()).await;
            let _ = writer.lock().await.shutdown().await;
            let _ = shutdown.send(true);
        }
    }
}

async fn send_response<W>(writer: &Mutex<MessageWriter<W>>, header: &Header, body: &[u8])
where
    W: AsyncWrite + Unpin,
{
    let mut writer = writer.lock().await;
    if let Err(err) = writer.write_payload(header, body).await {
        error!("rpc server: write response error: {err}");
    }
}
