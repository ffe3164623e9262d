use crate::core_network::network::GatewayContext;
use crate::helpers::{reply, ControlWriter};
use crate::session::Session;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles the TYPE FTP command.
///
/// The type is stored and echoed back. Transfers are always binary-safe byte
/// streams, so it has no effect on the data sent.
///
/// # Arguments
///
/// * `writer` - The shared control connection writer.
/// * `_ctx` - The gateway context.
/// * `session` - The client's session.
/// * `arg` - The argument specifying the transfer type.
pub async fn handle_type_command(
    writer: ControlWriter,
    _ctx: Arc<GatewayContext>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    let primary_type = arg
        .split_whitespace()
        .next()
        .map(|s| s.to_uppercase())
        .unwrap_or_default();

    match primary_type.as_str() {
        "A" | "I" | "E" | "L" => {
            session.lock().await.type_ = primary_type.clone();
            reply(&writer, 200, &format!("Type set to {}", primary_type)).await
        }
        "" => reply(&writer, 501, "Syntax error in parameters or arguments").await,
        _ => reply(&writer, 504, "Command not implemented for that parameter").await,
    }
}
