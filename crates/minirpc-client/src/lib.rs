//! minirpc Client
//!
//! This crate provides the client half of minirpc: the multiplexing session
//! client, the transport dialers, service discovery, and the fan-out client.
//!
//! # Overview
//!
//! A [`Client`] multiplexes any number of concurrent calls over one
//! connection: each call gets a sequence number, waits in the pending table,
//! and is completed by the background receive loop whenever its response
//! arrives, in any order. [`XClient`] layers discovery on top: it pools one
//! client per server address and adds one-of-N calls plus broadcast with
//! first-reply/first-error semantics.
//!
//! # Usage
//!
//! ```rust,no_run
//! use minirpc_client::dial_tcp;
//! use minirpc_core::SessionOptions;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Args { a: i32, b: i32 }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), minirpc_core::RpcError> {
//!     let client = dial_tcp("127.0.0.1:7001", SessionOptions::default()).await?;
//!     let sum: i32 = client.call("Arith.Sum", &Args { a: 3, b: 4 }).await?;
//!     assert_eq!(sum, 7);
//!     Ok(())
//! }
//! ```
//!
//! # Addressing
//!
//! [`xdial`] accepts `scheme://address` with schemes `tcp`, `tcp4`, `tcp6`,
//! `unix` (address is a socket path) and `http`/`https` (RPC tunneled
//! through an HTTP CONNECT upgrade).

pub mod client;
pub mod dial;
pub mod discovery;
pub mod hash;
pub mod xclient;

pub use client::{Call, Client};
pub use dial::{dial_http, dial_tcp, dial_unix, xdial};
pub use discovery::{
    Discovery, MultiDiscovery, RegistryDiscovery, SelectMode, DEFAULT_UPDATE_TIMEOUT,
};
pub use hash::ConsistentHash;
pub use xclient::XClient;
