use crate::core_ftpcommand::utils::{acquire_transport, reply_transport_error, resolve_arg};
use crate::core_network::network::GatewayContext;
use crate::helpers::{reply, ControlWriter};
use crate::session::Session;
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::Mutex;

pub async fn handle_rmd_command(
    writer: ControlWriter,
    ctx: Arc<GatewayContext>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    if arg.trim().is_empty() {
        return reply(&writer, 501, "Syntax error in parameters or arguments").await;
    }

    let path = resolve_arg(&session, &arg).await;
    if path == "/" {
        return reply(&writer, 550, "Cannot remove root directory").await;
    }

    let Some(mut lease) = acquire_transport(&writer, &ctx).await? else {
        return Ok(());
    };

    let result = lease.rmdir(&path).await;
    match result {
        Ok(()) => {
            info!("Removed remote directory {}", path);
            reply(&writer, 250, "Directory removed").await
        }
        Err(e) => {
            warn!("Failed to remove directory {}: {}", path, e);
            reply_transport_error(&writer, &mut lease, e).await
        }
    }
}
