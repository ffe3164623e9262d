use crate::core_ftpcommand::utils::{acquire_transport, reply_transport_error, resolve_arg};
use crate::core_network::network::GatewayContext;
use crate::core_transport::TransportError;
use crate::helpers::{reply, ControlWriter};
use crate::session::Session;
use log::{debug, warn};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles the SIZE command.
///
/// Replies `213 <bytes>` for a regular file and 550 when the path is missing
/// or names a directory.
pub async fn handle_size_command(
    writer: ControlWriter,
    ctx: Arc<GatewayContext>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    if arg.trim().is_empty() {
        warn!("SIZE command received with no arguments");
        return reply(&writer, 501, "Syntax error in parameters or arguments").await;
    }

    let path = resolve_arg(&session, &arg).await;
    let Some(mut lease) = acquire_transport(&writer, &ctx).await? else {
        return Ok(());
    };

    let result = lease.attributes(&path).await;
    match result {
        Ok(attributes) if !attributes.is_directory => {
            debug!("SIZE {} -> {}", path, attributes.size);
            reply(&writer, 213, &attributes.size.to_string()).await
        }
        Ok(_) | Err(TransportError::NotFound(_)) => reply(&writer, 550, "File not found").await,
        Err(e) => reply_transport_error(&writer, &mut lease, e).await,
    }
}
