use log::debug;
use std::io::SeekFrom;
use tempfile::NamedTempFile;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::core_error::GatewayError;
use crate::core_transport::{OpenMode, RemoteTransport};

/// Creates the scratch file an upload is staged in. It is deleted when the
/// returned handle is dropped.
pub fn create_scratch(dir: Option<&str>) -> Result<NamedTempFile, std::io::Error> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("rouillegate-stor-");
    match dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
}

/// Drains the data channel into `scratch` until the client closes it.
pub async fn drain_to_scratch<R>(
    data: &mut R,
    scratch: &mut File,
    chunk: usize,
    cancel: &CancellationToken,
) -> Result<u64, GatewayError>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = vec![0u8; chunk];
    let mut total = 0u64;
    loop {
        let n = tokio::select! {
            _ = cancel.cancelled() => return Err(GatewayError::Cancelled),
            n = data.read(&mut buffer) => n?,
        };
        if n == 0 {
            break;
        }
        scratch.write_all(&buffer[..n]).await?;
        total += n as u64;
    }
    scratch.flush().await?;
    Ok(total)
}

/// Copies the staged upload to `path` on the remote side in bounded chunks
/// at increasing offsets. The remote file is closed on every path.
pub async fn upload_scratch(
    transport: &dyn RemoteTransport,
    scratch: &mut File,
    path: &str,
    chunk: usize,
    cancel: &CancellationToken,
) -> Result<u64, GatewayError> {
    scratch.seek(SeekFrom::Start(0)).await?;
    let mut remote = transport.open_file(path, OpenMode::WriteTruncate).await?;

    let mut buffer = vec![0u8; chunk];
    let mut offset = 0u64;
    let copied: Result<u64, GatewayError> = async {
        loop {
            if cancel.is_cancelled() {
                return Err(GatewayError::Cancelled);
            }
            let n = scratch.read(&mut buffer).await?;
            if n == 0 {
                return Ok(offset);
            }
            remote.write(&buffer[..n], offset).await?;
            offset += n as u64;
        }
    }
    .await;

    let closed = remote.close().await;
    let written = copied?;
    closed?;
    debug!("Uploaded {} bytes to {}", written, path);
    Ok(written)
}
