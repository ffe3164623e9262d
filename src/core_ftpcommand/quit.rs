use crate::core_network::network::GatewayContext;
use crate::helpers::{reply, ControlWriter};
use crate::session::Session;
use log::info;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles the QUIT FTP command.
///
/// Acknowledges and flags the session; the command loop closes the
/// connection and tears the session down after this returns.
///
/// # Arguments
///
/// * `writer` - The shared control connection writer.
/// * `_ctx` - The gateway context (not used in this command).
/// * `session` - The client's session.
/// * `_arg` - The argument for the QUIT command (not used in this command).
///
/// # Returns
///
/// Result<(), std::io::Error> indicating the success or failure of the operation.
pub async fn handle_quit_command(
    writer: ControlWriter,
    _ctx: Arc<GatewayContext>,
    session: Arc<Mutex<Session>>,
    _arg: String,
) -> Result<(), std::io::Error> {
    {
        let mut session = session.lock().await;
        info!("Session {}: received QUIT command", session.id);
        session.quit = true;
    }
    reply(&writer, 221, "Goodbye").await
}
