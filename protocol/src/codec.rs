//! Frame-level read/write over any `AsyncRead`/`AsyncWrite` stream.

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::header::{PacketHeader, HEADER_SIZE};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// A decoded frame: header plus owned payload bytes.
#[derive(Debug, Clone)]
pub struct Packet {
    pub header: PacketHeader,
    pub payload: Bytes,
}

/// Reads one frame from `reader`.
///
/// Returns `Ok(None)` iff the peer closed the stream before sending any
/// byte of the next header — this is the distinct end-of-stream signal, not
/// an error. An EOF that arrives mid-header or mid-payload is a genuine
/// protocol violation and surfaces as [`CodecError::Io`].
pub async fn read_packet<R>(reader: &mut R) -> Result<Option<Packet>, CodecError>
where
    R: AsyncRead + Unpin,
{
    let mut header_buf = [0u8; HEADER_SIZE];
    let first = reader.read(&mut header_buf[..1]).await?;
    if first == 0 {
        return Ok(None);
    }
    reader.read_exact(&mut header_buf[1..]).await?;
    let header = PacketHeader::decode(&header_buf[..]);

    let payload = if header.size > 0 {
        let mut buf = vec![0u8; header.size as usize];
        reader.read_exact(&mut buf).await?;
        Bytes::from(buf)
    } else {
        Bytes::new()
    };

    Ok(Some(Packet { header, payload }))
}

/// Writes one frame: header then, iff `payload` is non-empty, the payload.
/// Both writes fully drain partial writes (via `write_all`) before
/// returning.
pub async fn write_packet<W>(
    writer: &mut W,
    header: &PacketHeader,
    payload: &[u8],
) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = BytesMut::with_capacity(HEADER_SIZE);
    header.encode(&mut buf);
    writer.write_all(&buf).await?;
    if !payload.is_empty() {
        writer.write_all(payload).await?;
    }
    writer.flush().await?;
    Ok(())
}
