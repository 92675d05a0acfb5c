//! Length-prefixed frame I/O.
//!
//! Every unit on the wire (handshake record, header, body) is one frame:
//! `[4-byte length prefix as u32 big-endian] + [payload]`. A message is a
//! header frame immediately followed by a body frame; [`MessageWriter`]
//! guarantees the pair is written back to back and flushed as one unit.

use serde::Serialize;
use tokio::io::{
    AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter,
};

use crate::codec::Codec;
use crate::protocol::error::{Result, RpcError};
use crate::protocol::Header;

/// Maximum frame size (100 MB).
pub const MAX_FRAME_SIZE: usize = 100 * 1024 * 1024;

/// Reads one length-prefixed frame.
///
/// A clean end-of-stream on the length prefix (or a truncated payload) is
/// reported as [`RpcError::ConnectionClosed`].
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let len = reader.read_u32().await.map_err(eof_to_closed)? as usize;

    if len > MAX_FRAME_SIZE {
        return Err(RpcError::FrameTooLarge(len));
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await.map_err(eof_to_closed)?;
    Ok(buf)
}

/// Writes one length-prefixed frame. The caller flushes.
pub async fn write_frame<W>(writer: &mut W, bytes: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_u32(bytes.len() as u32).await?;
    writer.write_all(bytes).await?;
    Ok(())
}

fn eof_to_closed(err: std::io::Error) -> RpcError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        RpcError::ConnectionClosed
    } else {
        err.into()
    }
}

/// The read side of a session. Consumed by exactly one reader.
pub struct MessageReader<R> {
    reader: BufReader<R>,
    codec: Codec,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(reader: R, codec: Codec) -> Self {
        MessageReader {
            reader: BufReader::new(reader),
            codec,
        }
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Reads and decodes the next header frame.
    pub async fn read_header(&mut self) -> Result<Header> {
        let frame = read_frame(&mut self.reader).await?;
        self.codec.decode(&frame)
    }

    /// Reads the next body frame without decoding it.
    ///
    /// Decoding is left to the call site: only there is the target type
    /// known, and responses to cancelled calls are discarded undecoded.
    pub async fn read_body(&mut self) -> Result<Vec<u8>> {
        read_frame(&mut self.reader).await
    }
}

/// The write side of a session.
///
/// Callers serialize access externally (one mutex per session); the writer
/// itself guarantees a header and its body go out as one flushed unit.
pub struct MessageWriter<W> {
    writer: BufWriter<W>,
    codec: Codec,
}

impl<W: AsyncWrite + Unpin> MessageWriter<W> {
    pub fn new(writer: W, codec: Codec) -> Self {
        MessageWriter {
            writer: BufWriter::new(writer),
            codec,
        }
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Writes a header followed by a pre-encoded body, then flushes.
    pub async fn write_payload(&mut self, header: &Header, body: &[u8]) -> Result<()> {
        let header_bytes = self.codec.encode(header)?;
        write_frame(&mut self.writer, &header_bytes).await?;
        write_frame(&mut self.writer, body).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Encodes a body value and writes the message.
    pub async fn write_message<B: Serialize>(&mut self, header: &Header, body: &B) -> Result<()> {
        let body_bytes = self.codec.encode(body)?;
        self.write_payload(header, &body_bytes).await
    }

    /// Flushes buffered data and shuts the underlying stream down.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frame_round_trip() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"hello").await.unwrap();
        write_frame(&mut buf, b"").await.unwrap();

        let mut cursor = buf.as_slice();
        assert_eq!(read_frame(&mut cursor).await.unwrap(), b"hello");
        assert_eq!(read_frame(&mut cursor).await.unwrap(), b"");
    }

    #[tokio::test]
    async fn test_read_frame_on_empty_stream() {
        let err = read_frame(&mut [].as_slice()).await.unwrap_err();
        assert!(matches!(err, RpcError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_read_frame_truncated_payload() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&100u32.to_be_bytes());
        buf.extend_from_slice(b"short");

        let err = read_frame(&mut buf.as_slice()).await.unwrap_err();
        assert!(matches!(err, RpcError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(MAX_FRAME_SIZE as u32 + 1).to_be_bytes());

        let err = read_frame(&mut buf.as_slice()).await.unwrap_err();
        assert!(matches!(err, RpcError::FrameTooLarge(_)));
    }

    #[tokio::test]
    async fn test_message_write_produces_one_header_one_body() {
        let codec = Codec::Json;
        let mut buf = Vec::new();
        {
            let mut writer = MessageWriter::new(&mut buf, codec);
            let header = Header::request("Echo.Say", 5);
            writer.write_message(&header, &"payload").await.unwrap();
        }

        let mut reader = MessageReader::new(buf.as_slice(), codec);
        let header = reader.read_header().await.unwrap();
        assert_eq!(header.seq, 5);
        assert_eq!(header.service_method, "Echo.Say");

        let body = reader.read_body().await.unwrap();
        let decoded: String = codec.decode(&body).unwrap();
        assert_eq!(decoded, "payload");
    }

    #[tokio::test]
    async fn test_large_body_survives_buffering() {
        let codec = Codec::Bincode;
        let big = vec![0xabu8; 1 << 20];

        let mut buf = Vec::new();
        {
            let mut writer = MessageWriter::new(&mut buf, codec);
            writer
                .write_message(&Header::request("Blob.Echo", 1), &big)
                .await
                .unwrap();
        }

        let mut reader = MessageReader::new(buf.as_slice(), codec);
        reader.read_header().await.unwrap();
        let body = reader.read_body().await.unwrap();
        let decoded: Vec<u8> = codec.decode(&body).unwrap();
        assert_eq!(decoded, big);
    }
}
