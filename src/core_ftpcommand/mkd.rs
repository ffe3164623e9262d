use crate::core_ftpcommand::utils::{acquire_transport, reply_transport_error, resolve_arg};
use crate::core_network::network::GatewayContext;
use crate::helpers::{reply, ControlWriter};
use crate::session::Session;
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles the MKD (Make Directory) FTP command.
pub async fn handle_mkd_command(
    writer: ControlWriter,
    ctx: Arc<GatewayContext>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    if arg.trim().is_empty() {
        warn!("MKD command received with no arguments");
        return reply(&writer, 501, "Syntax error in parameters or arguments").await;
    }

    let path = resolve_arg(&session, &arg).await;
    let Some(mut lease) = acquire_transport(&writer, &ctx).await? else {
        return Ok(());
    };

    let result = lease.create_directory(&path).await;
    match result {
        Ok(()) => {
            info!("Created remote directory {}", path);
            let quoted = path.replace('"', "\"\"");
            reply(&writer, 257, &format!("\"{}\" directory created", quoted)).await
        }
        Err(e) => {
            warn!("Failed to create directory {}: {}", path, e);
            reply_transport_error(&writer, &mut lease, e).await
        }
    }
}
