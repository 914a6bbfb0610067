//! Length-prefixed framing: `[u32 big-endian length][payload]`.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;

use crate::error::{DaemonError, ProtocolErrorKind};

fn protocol_error(kind: ProtocolErrorKind) -> DaemonError {
    DaemonError::Protocol { kind }
}

/// Read one frame, refusing payloads larger than `max_size`.
///
/// A clean EOF before the length prefix is [`ProtocolErrorKind::ConnectionClosed`].
pub async fn read_message<R>(reader: &mut R, max_size: usize) -> Result<Vec<u8>, DaemonError>
where
    R: AsyncReadExt + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(protocol_error(ProtocolErrorKind::ConnectionClosed));
        }
        Err(e) => return Err(DaemonError::Io(e)),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > max_size {
        return Err(protocol_error(ProtocolErrorKind::MessageTooLarge {
            size: len,
            max: max_size,
        }));
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            protocol_error(ProtocolErrorKind::InvalidMessageFormat {
                message: format!("frame truncated, expected {} bytes", len),
            })
        } else {
            DaemonError::Io(e)
        }
    })?;

    Ok(buf)
}

/// Write one frame and flush.
pub async fn write_message<W>(writer: &mut W, data: &[u8]) -> Result<(), DaemonError>
where
    W: AsyncWriteExt + Unpin,
{
    let len = u32::try_from(data.len()).map_err(|_| {
        protocol_error(ProtocolErrorKind::MessageTooLarge {
            size: data.len(),
            max: u32::MAX as usize,
        })
    })?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

/// [`read_message`] bounded by `timeout_duration`.
pub async fn read_message_with_timeout<R>(
    reader: &mut R,
    max_size: usize,
    timeout_duration: Duration,
) -> Result<Vec<u8>, DaemonError>
where
    R: AsyncReadExt + Unpin,
{
    timeout(timeout_duration, read_message(reader, max_size))
        .await
        .map_err(|_| protocol_error(ProtocolErrorKind::ConnectionTimeout))?
}

/// [`write_message`] bounded by `timeout_duration`.
pub async fn write_message_with_timeout<W>(
    writer: &mut W,
    data: &[u8],
    timeout_duration: Duration,
) -> Result<(), DaemonError>
where
    W: AsyncWriteExt + Unpin,
{
    timeout(timeout_duration, write_message(writer, data))
        .await
        .map_err(|_| protocol_error(ProtocolErrorKind::ConnectionTimeout))?
}
