use crate::core_network::network::GatewayContext;
use crate::helpers::{reply, ControlWriter};
use crate::session::Session;
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles the ABOR command.
///
/// Cancels the running transfer and waits until it has released its data
/// connection, remote file and transport. The transfer answers 426 itself,
/// then ABOR is acknowledged with 226.
pub async fn handle_abor_command(
    writer: ControlWriter,
    _ctx: Arc<GatewayContext>,
    session: Arc<Mutex<Session>>,
    _arg: String,
) -> Result<(), std::io::Error> {
    let transfer = {
        let mut session = session.lock().await;
        session.passive_listener = None;
        session.take_transfer()
    };

    if let Some(transfer) = transfer {
        info!("Aborting in-flight transfer");
        transfer.cancel.cancel();
        if let Err(e) = transfer.handle.await {
            warn!("Aborted transfer task failed: {}", e);
        }
    }

    reply(&writer, 226, "ABOR command successful").await
}
