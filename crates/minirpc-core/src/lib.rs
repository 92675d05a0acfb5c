//! minirpc protocol types and wire session primitives
//!
//! This crate provides the pieces shared by the minirpc client and server:
//!
//! - **Protocol Layer**: the per-message [`Header`], the [`SessionOptions`]
//!   handshake record and the [`RpcError`] taxonomy
//! - **Codec Layer**: pluggable serialization keyed by content-type tag
//!   ([`Codec`]), JSON by default with a bincode variant
//! - **Framing Layer**: length-prefixed frame I/O and the
//!   [`MessageReader`]/[`MessageWriter`] pair that carry `(Header, Body)`
//!   messages over a byte stream
//!
//! # Wire Format
//!
//! A session starts with a single client-to-server handshake record (one
//! length-prefixed JSON frame, always JSON regardless of the session codec).
//! Every subsequent message is a header frame followed by a body frame, each
//! `[4-byte length prefix as u32 big-endian] + [encoded data]`.
//!
//! # Example
//!
//! ```
//! use minirpc_core::{Codec, Header};
//!
//! let codec = Codec::Json;
//! let header = Header::request("Arith.Sum", 1);
//! let bytes = codec.encode(&header).unwrap();
//! let decoded: Header = codec.decode(&bytes).unwrap();
//! assert_eq!(header, decoded);
//! ```

pub mod codec;
pub mod framing;
pub mod protocol;

pub use codec::Codec;
pub use framing::{read_frame, write_frame, MessageReader, MessageWriter, MAX_FRAME_SIZE};
pub use protocol::{
    read_handshake, write_handshake, Header, RpcError, SessionOptions, CONNECTED,
    DEFAULT_RPC_PATH, MAGIC_NUMBER,
};

/// Convenience alias used across all minirpc crates.
pub type Result<T> = std::result::Result<T, RpcError>;
