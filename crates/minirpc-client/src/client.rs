//! The client session: one connection, many concurrent calls.
//!
//! A [`Client`] owns both halves of a stream. Writes go through the
//! `sending` mutex so a header and its argument frame leave as one unit and
//! sequence numbers hit the wire in order. A single background receive loop
//! owns the read half and demultiplexes responses through the pending-call
//! table; responses can arrive in any order.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::oneshot;
use tracing::{debug, error};

use minirpc_core::{
    write_handshake, Codec, Header, MessageReader, MessageWriter, Result, RpcError,
    SessionOptions,
};

type DynRead = Box<dyn AsyncRead + Send + Unpin>;
type DynWrite = Box<dyn AsyncWrite + Send + Unpin>;

/// One in-flight (or completed) call handle returned by [`Client::go`].
///
/// The completion channel carries the raw reply bytes; [`Call::recv`]
/// decodes them with the session codec.
pub struct Call {
    pub seq: u64,
    pub service_method: String,
    codec: Codec,
    rx: oneshot::Receiver<Result<Vec<u8>>>,
}

impl Call {
    fn failed(service_method: &str, codec: Codec, err: RpcError) -> Call {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Err(err));
        Call {
            seq: 0,
            service_method: service_method.to_string(),
            codec,
            rx,
        }
    }

    /// Waits for completion and decodes the reply.
    pub async fn recv<R: DeserializeOwned>(self) -> Result<R> {
        let codec = self.codec;
        let bytes = self.recv_raw().await?;
        codec.decode(&bytes)
    }

    /// Waits for completion, returning the undecoded reply bytes.
    pub(crate) async fn recv_raw(self) -> Result<Vec<u8>> {
        match self.rx.await {
            Ok(outcome) => outcome,
            // sender dropped: the entry was removed by cancel or shutdown
            Err(_) => Err(RpcError::Shutdown),
        }
    }
}

struct ClientState {
    seq: u64,
    pending: HashMap<u64, oneshot::Sender<Result<Vec<u8>>>>,
    closed: bool,
    shutdown: bool,
}

/// A multiplexing RPC client over a single connection.
///
/// Cheap to share: construction returns an `Arc`, and every method takes
/// `&self`, so any number of tasks can issue calls concurrently.
pub struct Client {
    codec: Codec,
    options: SessionOptions,
    writer: tokio::sync::Mutex<MessageWriter<DynWrite>>,
    state: Mutex<ClientState>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}

impl Client {
    /// Wraps an established stream: writes the handshake preamble, selects
    /// the codec it names, and starts the receive loop.
    pub async fn new<S>(stream: S, options: SessionOptions) -> Result<Arc<Client>>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let codec = options.codec()?;
        let (read_half, write_half) = tokio::io::split(stream);
        let mut write_half: DynWrite = Box::new(write_half);
        write_handshake(&mut write_half, &options).await?;

        let client = Arc::new(Client {
            codec,
            options,
            writer: tokio::sync::Mutex::new(MessageWriter::new(write_half, codec)),
            state: Mutex::new(ClientState {
                seq: 1,
                pending: HashMap::new(),
                closed: false,
                shutdown: false,
            }),
        });

        let reader = MessageReader::new(Box::new(read_half) as DynRead, codec);
        tokio::spawn(Arc::clone(&client).receive_loop(reader));
        Ok(client)
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// False once the client was closed or the session failed.
    pub fn available(&self) -> bool {
        let state = self.state.lock();
        !state.closed && !state.shutdown
    }

    /// User-initiated shutdown: marks the client closed and shuts the write
    /// side down. Pending calls are not failed here; they terminate when the
    /// receive loop observes the closed stream.
    pub async fn close(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.closed || state.shutdown {
                return Err(RpcError::Shutdown);
            }
            state.closed = true;
        }
        self.writer.lock().await.shutdown().await
    }

    /// Asynchronous invocation: registers the call, sends the request, and
    /// returns the handle immediately. Send failures are delivered through
    /// the handle's completion channel.
    pub async fn go<A: Serialize>(&self, service_method: &str, args: &A) -> Call {
        match self.codec.encode(args) {
            Ok(body) => self.go_raw(service_method, body).await,
            Err(err) => Call::failed(service_method, self.codec, err),
        }
    }

    /// Invokes `service_method` and waits for the reply.
    pub async fn call<A, R>(&self, service_method: &str, args: &A) -> Result<R>
    where
        A: Serialize,
        R: DeserializeOwned,
    {
        self.go(service_method, args).await.recv().await
    }

    /// Like [`Client::call`] but bounded by a deadline. On expiry the call
    /// is dropped from the pending table; a late server response is then
    /// discarded by the receive loop.
    pub async fn call_timeout<A, R>(
        &self,
        service_method: &str,
        args: &A,
        timeout: std::time::Duration,
    ) -> Result<R>
    where
        A: Serialize,
        R: DeserializeOwned,
    {
        let call = self.go(service_method, args).await;
        let seq = call.seq;
        match tokio::time::timeout(timeout, call.recv()).await {
            Ok(outcome) => outcome,
            Err(_) => {
                self.remove_call(seq);
                Err(RpcError::CallTimeout(timeout))
            }
        }
    }

    /// The send path for pre-encoded arguments.
    ///
    /// The `sending` mutex is taken before the pending-table registration so
    /// sequence numbers reach the wire in the order they were assigned.
    pub(crate) async fn go_raw(&self, service_method: &str, body: Vec<u8>) -> Call {
        let (tx, rx) = oneshot::channel();
        let mut writer = self.writer.lock().await;

        let seq = {
            let mut state = self.state.lock();
            if state.closed || state.shutdown {
                drop(state);
                drop(writer);
                return Call::failed(service_method, self.codec, RpcError::Shutdown);
            }
            let seq = state.seq;
            state.seq += 1;
            state.pending.insert(seq, tx);
            seq
        };

        let header = Header::request(service_method, seq);
        if let Err(err) = writer.write_payload(&header, &body).await {
            drop(writer);
            if let Some(tx) = self.remove_call(seq) {
                let _ = tx.send(Err(err));
            }
        }

        Call {
            seq,
            service_method: header.service_method,
            codec: self.codec,
            rx,
        }
    }

    pub(crate) fn remove_call(&self, seq: u64) -> Option<oneshot::Sender<Result<Vec<u8>>>> {
        self.state.lock().pending.remove(&seq)
    }

    /// Demultiplexes responses until the stream fails, then terminates
    /// every pending call.
    async fn receive_loop(self: Arc<Self>, mut reader: MessageReader<DynRead>) {
        let err = loop {
            let header = match reader.read_header().await {
                Ok(header) => header,
                Err(err) => break err,
            };

            match self.remove_call(header.seq) {
                // unknown sequence: removed by cancel or shutdown, discard
                None => {
                    if let Err(err) = reader.read_body().await {
                        break err;
                    }
                }
                Some(tx) if !header.error.is_empty() => {
                    let body = reader.read_body().await;
                    let _ = tx.send(Err(RpcError::Remote(header.error)));
                    if let Err(err) = body {
                        break err;
                    }
                }
                Some(tx) => match reader.read_body().await {
                    Ok(bytes) => {
                        let _ = tx.send(Ok(bytes));
                    }
                    Err(err) => {
                        let _ = tx.send(Err(RpcError::ReadBody(err.to_string())));
                        break err;
                    }
                },
            }
        };

        if matches!(err, RpcError::ConnectionClosed) {
            debug!("receive loop finished: connection closed");
        } else {
            error!("receive loop error: {err}");
        }
        self.terminate_calls(err).await;
    }

    /// Error-triggered shutdown: under both mutexes, marks the client
    /// unavailable and fails every pending call.
    async fn terminate_calls(&self, err: RpcError) {
        let _sending = self.writer.lock().await;
        let mut state = self.state.lock();
        state.shutdown = true;
        let reason = err.to_string();
        for (_, tx) in state.pending.drain() {
            let _ = tx.send(Err(RpcError::Terminated(reason.clone())));
        }
    }
}
