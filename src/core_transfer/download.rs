use log::debug;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::core_error::GatewayError;
use crate::core_transport::RemoteFile;

/// Streams `file` from `offset` to the data channel in `chunk`-sized reads,
/// strictly in offset order. Cancellation is checked between chunks, never
/// in the middle of a remote read. Returns the number of bytes sent.
pub async fn send_file<W>(
    data: &mut W,
    file: &mut dyn RemoteFile,
    offset: u64,
    chunk: usize,
    cancel: &CancellationToken,
) -> Result<u64, GatewayError>
where
    W: AsyncWrite + Unpin,
{
    let mut position = offset;
    loop {
        if cancel.is_cancelled() {
            return Err(GatewayError::Cancelled);
        }

        let buffer = file.read(position, chunk).await?;
        if buffer.is_empty() {
            break;
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(GatewayError::Cancelled),
            written = data.write_all(&buffer) => written?,
        }
        position += buffer.len() as u64;
    }

    data.shutdown().await?;
    debug!("Sent {} bytes starting at offset {}", position - offset, offset);
    Ok(position - offset)
}

/// Sends a directory listing, one line per entry.
pub async fn send_listing<W>(
    data: &mut W,
    lines: &[String],
    cancel: &CancellationToken,
) -> Result<u64, GatewayError>
where
    W: AsyncWrite + Unpin,
{
    let mut payload = String::new();
    for line in lines {
        payload.push_str(line);
        payload.push_str("\r\n");
    }

    tokio::select! {
        _ = cancel.cancelled() => return Err(GatewayError::Cancelled),
        written = data.write_all(payload.as_bytes()) => written?,
    }
    data.shutdown().await?;
    Ok(payload.len() as u64)
}
