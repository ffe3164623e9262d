use crate::core_network::network::GatewayContext;
use crate::helpers::{reply, ControlWriter};
use crate::session::Session;
use std::sync::Arc;
use tokio::sync::Mutex;

pub async fn handle_pass_command(
    writer: ControlWriter,
    _ctx: Arc<GatewayContext>,
    _session: Arc<Mutex<Session>>,
    _password: String,
) -> Result<(), std::io::Error> {
    reply(&writer, 230, "User logged in").await
}
