use crate::core_ftpcommand::utils::{acquire_transport, reply_error, reply_transport_error};
use crate::core_network::data_channel::take_pending;
use crate::core_network::network::GatewayContext;
use crate::core_transfer::{spawn_transfer, TransferJob};
use crate::core_transport::OpenMode;
use crate::helpers::{reply, resolve_path, ControlWriter};
use crate::session::Session;
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles the RETR (Retrieve) FTP command.
///
/// Opens the remote file, answers 150 and streams it over the negotiated
/// data connection from the pending REST offset, if any. The offset is
/// consumed by this command whatever its outcome.
///
/// # Arguments
///
/// * `writer` - The shared control connection writer.
/// * `ctx` - The gateway context holding the connection manager.
/// * `session` - The client's session.
/// * `arg` - The name of the file to retrieve.
///
/// # Returns
///
/// Result<(), std::io::Error> indicating the success or failure of the operation.
pub async fn handle_retr_command(
    writer: ControlWriter,
    ctx: Arc<GatewayContext>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    if arg.trim().is_empty() {
        warn!("RETR command received with no arguments");
        return reply(&writer, 501, "Syntax error in parameters or arguments").await;
    }

    let (path, offset, pending) = {
        let mut session = session.lock().await;
        let path = resolve_path(&session.current_dir, &arg);
        let offset = session.rest_offset.take().unwrap_or(0);
        match take_pending(&mut session) {
            Ok(pending) => (path, offset, pending),
            Err(e) => {
                drop(session);
                return reply_error(&writer, &e).await;
            }
        }
    };

    let Some(mut lease) = acquire_transport(&writer, &ctx).await? else {
        return Ok(());
    };
    let opened = lease.open_file(&path, OpenMode::Read).await;
    let file = match opened {
        Ok(file) => file,
        Err(e) => {
            warn!("Failed to open remote file {}: {}", path, e);
            return reply_transport_error(&writer, &mut lease, e).await;
        }
    };

    info!("Sending file {} from offset {}", path, offset);
    let message = if offset > 0 {
        format!(
            "Opening data connection for file transfer (restarting from position {})",
            offset
        )
    } else {
        "Opening data connection for file transfer".to_string()
    };
    reply(&writer, 150, &message).await?;

    let mut session = session.lock().await;
    spawn_transfer(
        writer.clone(),
        ctx,
        &mut session,
        pending,
        TransferJob::Retrieve {
            lease,
            file,
            path,
            offset,
        },
    );
    Ok(())
}
