use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json codec error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bincode codec error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("frame too large: {0} bytes")]
    FrameTooLarge(usize),

    #[error("bad magic number {0:#x}: not a minirpc connection")]
    InvalidMagic(u32),

    #[error("unsupported codec type: {0}")]
    UnsupportedCodec(String),

    #[error("invalid rpc address: {0}")]
    InvalidAddress(String),

    #[error("rpc client: unknown network {0:?}")]
    UnknownNetwork(String),

    #[error("{0}")]
    Registration(String),

    #[error("{0}")]
    Dispatch(String),

    /// Error text carried back in a response header.
    #[error("{0}")]
    Remote(String),

    #[error("reading body {0}")]
    ReadBody(String),

    #[error("unexpected connect status: {0}")]
    ConnectStatus(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("rpc client: connect timeout expect within {0:?}")]
    ConnectTimeout(Duration),

    #[error("rpc client: call timeout expect within {0:?}")]
    CallTimeout(Duration),

    #[error("rpc server: handle timeout expect within {0:?}")]
    HandleTimeout(Duration),

    #[error("client is shutdown")]
    Shutdown,

    /// A pending call terminated by a receive-loop failure.
    #[error("rpc client: connection lost: {0}")]
    Terminated(String),

    #[error("no available server")]
    NoAvailableServer,
}

pub type Result<T> = std::result::Result<T, RpcError>;
