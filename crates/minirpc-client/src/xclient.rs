//! The fan-out client: discovery-driven unicast and broadcast.
//!
//! An [`XClient`] pools one [`Client`] per server address. `call` forwards a
//! single request to one server chosen by the discovery mode; `broadcast`
//! fans a request out to every known server, keeps the first successful
//! reply, and lets the first error cancel the remaining arms.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinSet;
use tracing::warn;

use minirpc_core::{Result, RpcError, SessionOptions};

use crate::client::Client;
use crate::dial::xdial;
use crate::discovery::{Discovery, SelectMode};

type ClientCache = Arc<Mutex<HashMap<String, Arc<Client>>>>;

/// A client over many servers.
pub struct XClient<D: Discovery> {
    discovery: D,
    mode: SelectMode,
    options: SessionOptions,
    clients: ClientCache,
}

/// What one broadcast arm produced; `None` when the arm was cancelled.
type ArmOutcome = Option<Result<Vec<u8>>>;

impl<D: Discovery> XClient<D> {
    pub fn new(discovery: D, mode: SelectMode, options: SessionOptions) -> Self {
        XClient {
            discovery,
            mode,
            options,
            clients: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn discovery(&self) -> &D {
        &self.discovery
    }

    /// Closes every cached client and resets the cache.
    pub async fn close(&self) -> Result<()> {
        let mut clients = self.clients.lock().await;
        for (_, client) in clients.drain() {
            let _ = client.close().await;
        }
        Ok(())
    }

    /// Picks one server by the configured mode and forwards the call.
    pub async fn call<A, R>(&self, service_method: &str, args: &A) -> Result<R>
    where
        A: Serialize,
        R: DeserializeOwned,
    {
        let addr = self.discovery.get(self.mode).await?;
        let client = dial_cached(&self.clients, &self.options, &addr).await?;
        client.call(service_method, args).await
    }

    /// Invokes the method on every known server concurrently.
    ///
    /// Each arm gets its own reply slot; only the first successful reply is
    /// retained. The first error cancels the outstanding arms (their pending
    /// entries are dropped, so late server responses are discarded) and is
    /// returned to the caller.
    pub async fn broadcast<A, R>(&self, service_method: &str, args: &A) -> Result<R>
    where
        A: Serialize,
        R: DeserializeOwned,
    {
        let servers = self.discovery.get_all().await?;
        let codec = self.options.codec()?;
        let body = codec.encode(args)?;

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let mut arms: JoinSet<ArmOutcome> = JoinSet::new();
        for addr in servers {
            let clients = Arc::clone(&self.clients);
            let options = self.options.clone();
            let service_method = service_method.to_string();
            let body = body.clone();
            let mut cancel = cancel_rx.clone();

            arms.spawn(async move {
                let client = match dial_cached(&clients, &options, &addr).await {
                    Ok(client) => client,
                    Err(err) => return Some(Err(err)),
                };
                let call = client.go_raw(&service_method, body).await;
                let seq = call.seq;
                tokio::select! {
                    outcome = call.recv_raw() => Some(outcome),
                    _ = cancel.changed() => {
                        client.remove_call(seq);
                        None
                    }
                }
            });
        }
        drop(cancel_rx);

        let mut first_err: Option<RpcError> = None;
        let mut reply: Option<R> = None;
        while let Some(joined) = arms.join_next().await {
            let Ok(outcome) = joined else { continue };
            match outcome {
                Some(Ok(bytes)) => {
                    if reply.is_none() {
                        match codec.decode(&bytes) {
                            Ok(decoded) => reply = Some(decoded),
                            Err(err) => {
                                if first_err.is_none() {
                                    first_err = Some(err);
                                    let _ = cancel_tx.send(true);
                                }
                            }
                        }
                    }
                }
                Some(Err(err)) => {
                    if first_err.is_none() {
                        first_err = Some(err);
                        let _ = cancel_tx.send(true);
                    }
                }
                None => {}
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => reply.ok_or(RpcError::NoAvailableServer),
        }
    }
}

/// Returns the cached client for `addr`, evicting one that is no longer
/// available, dialing a fresh connection when needed.
async fn dial_cached(
    clients: &ClientCache,
    options: &SessionOptions,
    addr: &str,
) -> Result<Arc<Client>> {
    let mut clients = clients.lock().await;
    if let Some(client) = clients.get(addr) {
        if client.available() {
            return Ok(Arc::clone(client));
        }
        warn!(%addr, "cached client is no longer available, redialing");
        let _ = client.close().await;
        clients.remove(addr);
    }

    let client = xdial(addr, options.clone()).await?;
    clients.insert(addr.to_string(), Arc::clone(&client));
    Ok(client)
}
