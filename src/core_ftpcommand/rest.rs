use crate::core_network::network::GatewayContext;
use crate::helpers::{reply, ControlWriter};
use crate::session::Session;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles the REST command. The offset applies to the next RETR only.
pub async fn handle_rest_command(
    writer: ControlWriter,
    _ctx: Arc<GatewayContext>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    match arg.trim().parse::<u64>() {
        Ok(offset) => {
            session.lock().await.rest_offset = Some(offset);
            reply(
                &writer,
                350,
                &format!("Restarting at {}. Send RETR to initiate transfer.", offset),
            )
            .await
        }
        Err(_) => reply(&writer, 501, "Invalid REST parameter").await,
    }
}
