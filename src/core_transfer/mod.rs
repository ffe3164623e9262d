pub mod download;
pub mod upload;

use log::{info, warn};
use std::sync::Arc;
use std::time::Instant;
use tokio::fs::File;
use tokio_util::sync::CancellationToken;

use crate::core_error::GatewayError;
use crate::core_network::data_channel::PendingDataChannel;
use crate::core_network::network::GatewayContext;
use crate::core_pool::TransportLease;
use crate::core_transport::RemoteFile;
use crate::helpers::{send_response, ControlWriter};
use crate::session::{ActiveTransfer, Session};

/// Work carried out over one data connection.
pub enum TransferJob {
    /// Pre-formatted `ls -l` lines.
    Listing { lines: Vec<String> },
    /// Remote file already opened for reading, sent from `offset`.
    Retrieve {
        lease: TransportLease,
        file: Box<dyn RemoteFile>,
        path: String,
        offset: u64,
    },
    /// Upload staged locally, then written to `path`.
    Store { lease: TransportLease, path: String },
}

impl TransferJob {
    fn describe(&self) -> String {
        match self {
            TransferJob::Listing { lines } => format!("listing ({} entries)", lines.len()),
            TransferJob::Retrieve { path, offset, .. } => format!("RETR {} @{}", path, offset),
            TransferJob::Store { path, .. } => format!("STOR {}", path),
        }
    }

    fn completion_message(&self) -> &'static str {
        match self {
            TransferJob::Listing { .. } => "Directory send OK",
            _ => "Transfer complete",
        }
    }
}

/// Runs `job` in the background and registers it on the session so ABOR
/// and disconnects can cancel it. The final reply (226, 4xx or 5xx) is sent
/// by the task itself.
pub fn spawn_transfer(
    writer: ControlWriter,
    ctx: Arc<GatewayContext>,
    session: &mut Session,
    pending: PendingDataChannel,
    job: TransferJob,
) {
    let cancel = CancellationToken::new();
    let id = session.id;
    let task = run_transfer(writer, ctx, id, pending, job, cancel.clone());
    session.transfer = Some(ActiveTransfer::spawn(cancel, task));
}

async fn run_transfer(
    writer: ControlWriter,
    ctx: Arc<GatewayContext>,
    id: u64,
    pending: PendingDataChannel,
    job: TransferJob,
    cancel: CancellationToken,
) {
    let started = Instant::now();
    let description = job.describe();
    let completion = job.completion_message();
    info!("Session {}: starting {}", id, description);

    let result = execute(&ctx, pending, job, &cancel).await;

    let response = match &result {
        Ok(bytes) => {
            info!(
                "Session {}: {} finished, {} bytes in {:?}",
                id,
                description,
                bytes,
                started.elapsed()
            );
            format!("226 {}\r\n", completion)
        }
        Err(GatewayError::Cancelled) => {
            info!("Session {}: {} aborted", id, description);
            format!("{}\r\n", GatewayError::Cancelled.to_ftp_response())
        }
        Err(e) => {
            warn!("Session {}: {} failed: {}", id, description, e);
            format!("{}\r\n", e.to_ftp_response())
        }
    };

    if let Err(e) = send_response(&writer, response.as_bytes()).await {
        warn!("Session {}: could not send transfer reply: {}", id, e);
    }
}

/// Opens the data connection and performs the job. Every remote resource the
/// job owns is released before this returns.
async fn execute(
    ctx: &GatewayContext,
    pending: PendingDataChannel,
    job: TransferJob,
    cancel: &CancellationToken,
) -> Result<u64, GatewayError> {
    let server = &ctx.config.server;
    let timeout = server.data_connection_timeout();

    let opened = tokio::select! {
        _ = cancel.cancelled() => Err(GatewayError::Cancelled),
        stream = pending.open(timeout) => stream,
    };

    match job {
        TransferJob::Listing { lines } => {
            let mut data = opened?;
            download::send_listing(&mut data, &lines, cancel).await
        }
        TransferJob::Retrieve {
            mut lease,
            mut file,
            offset,
            ..
        } => {
            let result = match opened {
                Ok(mut data) => {
                    download::send_file(
                        &mut data,
                        file.as_mut(),
                        offset,
                        server.download_chunk(),
                        cancel,
                    )
                    .await
                }
                Err(e) => Err(e),
            };
            if let Err(e) = file.close().await {
                warn!("Failed to close remote file: {}", e);
                lease.note_error(&e);
            }
            if let Err(GatewayError::Transport(e)) = &result {
                lease.note_error(e);
            }
            result
        }
        TransferJob::Store { mut lease, path } => {
            let mut data = opened?;
            let scratch = upload::create_scratch(server.scratch_dir.as_deref())?;
            let mut local = File::from_std(scratch.reopen()?);

            let result = async {
                upload::drain_to_scratch(&mut data, &mut local, server.upload_chunk(), cancel)
                    .await?;
                drop(data);
                upload::upload_scratch(&*lease, &mut local, &path, server.upload_chunk(), cancel)
                    .await
            }
            .await;

            if let Err(GatewayError::Transport(e)) = &result {
                lease.note_error(e);
            }
            // Scratch file is deleted here whatever the outcome.
            drop(local);
            drop(scratch);
            result
        }
    }
}
