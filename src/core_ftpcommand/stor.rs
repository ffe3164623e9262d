use crate::core_ftpcommand::utils::{acquire_transport, reply_error};
use crate::core_network::data_channel::take_pending;
use crate::core_network::network::GatewayContext;
use crate::core_transfer::{spawn_transfer, TransferJob};
use crate::helpers::{reply, resolve_path, ControlWriter};
use crate::session::Session;
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles the STOR (Store) FTP command.
///
/// The upload is drained into a local scratch file first, then written to
/// the remote path; the scratch file is removed on every outcome.
pub async fn handle_stor_command(
    writer: ControlWriter,
    ctx: Arc<GatewayContext>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    if arg.trim().is_empty() {
        warn!("STOR command received with no arguments");
        return reply(&writer, 501, "Syntax error in parameters or arguments").await;
    }

    let (path, pending) = {
        let mut session = session.lock().await;
        let path = resolve_path(&session.current_dir, &arg);
        match take_pending(&mut session) {
            Ok(pending) => (path, pending),
            Err(e) => {
                drop(session);
                return reply_error(&writer, &e).await;
            }
        }
    };

    let Some(lease) = acquire_transport(&writer, &ctx).await? else {
        return Ok(());
    };

    info!("Receiving upload for {}", path);
    reply(&writer, 150, "Opening data connection for file upload").await?;

    let mut session = session.lock().await;
    spawn_transfer(
        writer.clone(),
        ctx,
        &mut session,
        pending,
        TransferJob::Store { lease, path },
    );
    Ok(())
}
