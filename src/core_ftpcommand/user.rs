use crate::core_network::network::GatewayContext;
use crate::helpers::{reply, ControlWriter};
use crate::session::Session;
use log::info;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles the USER FTP command.
///
/// The gateway already holds working credentials for the remote host, so any
/// user name is accepted and only recorded for logging.
///
/// # Arguments
///
/// * `writer` - The shared control connection writer.
/// * `_ctx` - The gateway context (not used in this command).
/// * `session` - The client's session.
/// * `username` - The user name provided by the client.
///
/// # Returns
///
/// Result<(), std::io::Error> indicating the success or failure of the operation.
pub async fn handle_user_command(
    writer: ControlWriter,
    _ctx: Arc<GatewayContext>,
    session: Arc<Mutex<Session>>,
    username: String,
) -> Result<(), std::io::Error> {
    {
        let mut session = session.lock().await;
        info!("Session {}: USER {}", session.id, username);
        session.username = Some(username);
    }

    reply(&writer, 331, "User name okay, need password").await
}
