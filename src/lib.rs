//! minirpc — a small multiplexed RPC framework.
//!
//! One connection carries any number of concurrent calls, correlated by
//! sequence number. Servers expose explicitly registered typed methods;
//! clients multiplex calls over pooled connections, discover servers through
//! a heartbeat registry, and fan out broadcasts with first-reply semantics.
//!
//! This facade crate re-exports the member crates:
//!
//! - [`minirpc_core`]: protocol types, codecs, frame I/O
//! - [`minirpc_server`]: service registry and connection dispatcher
//! - [`minirpc_client`]: client session, dialers, discovery, fan-out client
//! - [`minirpc_registry`] (as [`registry`]): the heartbeat registry service
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use minirpc::{dial_tcp, RpcError, Server, Service, SessionOptions};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Args { a: i32, b: i32 }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), RpcError> {
//!     let server = Arc::new(Server::new());
//!     server.register(Service::new("Arith").method("Sum", |args: Args| async move {
//!         Ok::<_, RpcError>(args.a + args.b)
//!     }))?;
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
//!     let addr = listener.local_addr()?.to_string();
//!     tokio::spawn(async move { server.accept(listener).await });
//!
//!     let client = dial_tcp(&addr, SessionOptions::default()).await?;
//!     let sum: i32 = client.call("Arith.Sum", &Args { a: 3, b: 4 }).await?;
//!     assert_eq!(sum, 7);
//!     Ok(())
//! }
//! ```

pub use minirpc_core::{
    Codec, Header, Result, RpcError, SessionOptions, CONNECTED, DEFAULT_RPC_PATH, MAGIC_NUMBER,
};

pub use minirpc_server::{serve_http, Server, Service};

pub use minirpc_client::{
    dial_http, dial_tcp, dial_unix, xdial, Call, Client, ConsistentHash, Discovery,
    MultiDiscovery, RegistryDiscovery, SelectMode, XClient,
};

pub use minirpc_registry as registry;
