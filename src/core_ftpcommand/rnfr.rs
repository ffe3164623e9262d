use crate::core_ftpcommand::utils::resolve_arg;
use crate::core_network::network::GatewayContext;
use crate::helpers::{reply, ControlWriter};
use crate::session::Session;
use log::debug;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles the RNFR command. Only stages the source path; the remote side
/// is not touched until RNTO.
pub async fn handle_rnfr_command(
    writer: ControlWriter,
    _ctx: Arc<GatewayContext>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    if arg.trim().is_empty() {
        return reply(&writer, 501, "Syntax error in parameters or arguments").await;
    }

    let path = resolve_arg(&session, &arg).await;
    {
        let mut session = session.lock().await;
        debug!("Session {}: rename source staged: {}", session.id, path);
        session.rename_from = Some(path);
    }

    reply(&writer, 350, "Ready for destination name").await
}
