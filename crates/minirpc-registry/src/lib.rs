//! minirpc Registry
//!
//! An HTTP service tracking live RPC servers through heartbeats, plus the
//! client-side helpers the rest of minirpc uses to talk to it.
//!
//! # Wire Contract
//!
//! The registry lives on a single path (default `/_minirpc_/registry`):
//!
//! - `GET` answers with header `X-Minirpc-Servers: addr1,addr2,…` listing
//!   every address whose heartbeat is younger than the TTL
//! - `POST` reads the address from header `X-Minirpc-Server` and inserts or
//!   refreshes it; a missing header is a 500
//! - any other method is a 405
//!
//! Servers keep themselves alive with [`heartbeat`], which posts once
//! immediately and then periodically (default TTL − 1 s) until a send fails.

pub mod heartbeat;
pub mod http_client;
pub mod registry;

pub use heartbeat::{heartbeat, send_heartbeat};
pub use http_client::fetch_servers;
pub use registry::{Registry, DEFAULT_REGISTRY_PATH, DEFAULT_TIMEOUT, SERVERS_HEADER, SERVER_HEADER};
