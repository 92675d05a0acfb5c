//! Session handshake.
//!
//! The handshake record is the very first thing on a connection: a single
//! length-prefixed frame holding a JSON-encoded [`SessionOptions`]. It is
//! always JSON, decoded by a fixed decoder independent of the codec the
//! record selects for the rest of the session. The record travels client to
//! server only; the server never echoes it back.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::codec::Codec;
use crate::framing::{read_frame, write_frame};
use crate::protocol::error::{Result, RpcError};

/// Marks the first bytes of every minirpc connection.
pub const MAGIC_NUMBER: u32 = 0x065279;

/// The handshake record that opens a session.
///
/// Timeouts are advisory to the side that enforces them: `connect_timeout`
/// bounds dialing and client construction on the client, `handle_timeout`
/// bounds each call on the server. Zero means unlimited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOptions {
    pub magic_number: u32,
    /// Content-type tag selecting the session codec, e.g. `application/json`.
    pub codec_type: String,
    pub connect_timeout: Duration,
    pub handle_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            magic_number: MAGIC_NUMBER,
            codec_type: Codec::Json.content_type().to_string(),
            connect_timeout: Duration::from_secs(3),
            handle_timeout: Duration::ZERO,
        }
    }
}

impl SessionOptions {
    /// Selects the session codec.
    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec_type = codec.content_type().to_string();
        self
    }

    /// Bounds dialing and client construction. Zero waits indefinitely.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Bounds each server-side call. Zero means unlimited.
    pub fn with_handle_timeout(mut self, timeout: Duration) -> Self {
        self.handle_timeout = timeout;
        self
    }

    /// Resolves the codec named by `codec_type`.
    pub fn codec(&self) -> Result<Codec> {
        Codec::from_content_type(&self.codec_type)
            .ok_or_else(|| RpcError::UnsupportedCodec(self.codec_type.clone()))
    }
}

/// Writes the handshake record and flushes it.
pub async fn write_handshake<W>(writer: &mut W, options: &SessionOptions) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let bytes = serde_json::to_vec(options)?;
    write_frame(writer, &bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads and validates the handshake record.
pub async fn read_handshake<R>(reader: &mut R) -> Result<SessionOptions>
where
    R: AsyncRead + Unpin,
{
    let frame = read_frame(reader).await?;
    let options: SessionOptions = serde_json::from_slice(&frame)?;
    if options.magic_number != MAGIC_NUMBER {
        return Err(RpcError::InvalidMagic(options.magic_number));
    }
    Ok(options)
}
