//! minirpc Protocol Definitions
//!
//! This module defines the core wire-level types of minirpc:
//!
//! - **[`Header`]**: the framing header carried by every request and response
//! - **[`SessionOptions`]**: the handshake record that opens every session
//! - **[`RpcError`]**: error type shared by every minirpc crate
//!
//! # Correlation
//!
//! Requests and responses are correlated solely by the `seq` field of the
//! header; response ordering is not guaranteed to match request ordering.

pub mod error;
pub mod handshake;
pub mod header;

pub use error::RpcError;
pub use handshake::{read_handshake, write_handshake, SessionOptions, MAGIC_NUMBER};
pub use header::Header;

/// Path accepted by the server for `CONNECT`-based RPC over HTTP.
pub const DEFAULT_RPC_PATH: &str = "/_minirpc_/";

/// Status text sent on a successful `CONNECT` upgrade.
pub const CONNECTED: &str = "200 Connected to minirpc";
