use crate::core_ftpcommand::utils::{acquire_transport, reply_transport_error, resolve_arg};
use crate::core_network::network::GatewayContext;
use crate::helpers::{reply, ControlWriter};
use crate::session::Session;
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles the DELE (Delete) FTP command.
///
/// Removes the named file on the remote host.
///
/// # Arguments
///
/// * `writer` - The shared control connection writer.
/// * `ctx` - The gateway context holding the connection manager.
/// * `session` - The client's session, for the working directory.
/// * `arg` - The file to delete.
///
/// # Returns
///
/// Result<(), std::io::Error> indicating the success or failure of the operation.
pub async fn handle_dele_command(
    writer: ControlWriter,
    ctx: Arc<GatewayContext>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    if arg.trim().is_empty() {
        warn!("DELE command received with no arguments");
        return reply(&writer, 501, "Syntax error in parameters or arguments").await;
    }

    let path = resolve_arg(&session, &arg).await;
    let Some(mut lease) = acquire_transport(&writer, &ctx).await? else {
        return Ok(());
    };

    let result = lease.remove(&path).await;
    match result {
        Ok(()) => {
            info!("Deleted remote file {}", path);
            reply(&writer, 250, "File deleted").await
        }
        Err(e) => {
            warn!("Failed to delete {}: {}", path, e);
            reply_transport_error(&writer, &mut lease, e).await
        }
    }
}
