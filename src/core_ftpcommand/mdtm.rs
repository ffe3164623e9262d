use crate::core_ftpcommand::utils::{acquire_transport, reply_transport_error, resolve_arg};
use crate::core_network::network::GatewayContext;
use crate::core_transport::TransportError;
use crate::helpers::{format_mdtm, reply, ControlWriter};
use crate::session::Session;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles the MDTM command: `213 YYYYMMDDHHMMSS` in UTC.
pub async fn handle_mdtm_command(
    writer: ControlWriter,
    ctx: Arc<GatewayContext>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    if arg.trim().is_empty() {
        return reply(&writer, 501, "Syntax error in parameters or arguments").await;
    }

    let path = resolve_arg(&session, &arg).await;
    let Some(mut lease) = acquire_transport(&writer, &ctx).await? else {
        return Ok(());
    };

    let result = lease.attributes(&path).await;
    match result {
        Ok(attributes) => match attributes.modified.and_then(format_mdtm) {
            Some(stamp) => reply(&writer, 213, &stamp).await,
            None => reply(&writer, 550, "Modification time not available").await,
        },
        Err(TransportError::NotFound(_)) => reply(&writer, 550, "File not found").await,
        Err(e) => reply_transport_error(&writer, &mut lease, e).await,
    }
}
