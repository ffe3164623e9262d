use crate::core_ftpcommand::utils::{acquire_transport, reply_transport_error, resolve_arg};
use crate::core_network::network::GatewayContext;
use crate::helpers::{reply, ControlWriter};
use crate::session::Session;
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles the RNTO command.
///
/// Requires a source staged by RNFR. The staged source is cleared whatever
/// the outcome of the rename.
pub async fn handle_rnto_command(
    writer: ControlWriter,
    ctx: Arc<GatewayContext>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    let rename_from = session.lock().await.rename_from.take();
    let Some(from) = rename_from else {
        warn!("RNTO received without RNFR");
        return reply(&writer, 503, "Bad sequence of commands").await;
    };

    if arg.trim().is_empty() {
        return reply(&writer, 501, "Syntax error in parameters or arguments").await;
    }

    let to = resolve_arg(&session, &arg).await;
    let Some(mut lease) = acquire_transport(&writer, &ctx).await? else {
        return Ok(());
    };

    let result = lease.rename(&from, &to).await;
    match result {
        Ok(()) => {
            info!("Renamed {} to {}", from, to);
            reply(&writer, 250, "Rename successful").await
        }
        Err(e) => {
            warn!("Failed to rename {} to {}: {}", from, to, e);
            reply_transport_error(&writer, &mut lease, e).await
        }
    }
}
