use crate::core_ftpcommand::utils::{acquire_transport, reply_error, reply_transport_error};
use crate::core_network::data_channel::take_pending;
use crate::core_network::network::GatewayContext;
use crate::core_transfer::{spawn_transfer, TransferJob};
use crate::helpers::{format_list_line, reply, resolve_path, ControlWriter};
use crate::session::Session;
use chrono::Utc;
use log::{debug, warn};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Strips leading `ls`-style flags (`-la`) some clients send with LIST. The
/// rest is the path, spaces included.
fn list_target(arg: &str) -> &str {
    let mut rest = arg.trim_start();
    while rest.starts_with('-') {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        rest = rest[end..].trim_start();
    }
    rest.trim_end()
}

/// Handles the LIST command.
///
/// The listing is fetched and formatted before the 150 reply; the remote
/// transport goes back to the pool before the data connection is used.
///
/// # Arguments
///
/// * `writer` - The shared control connection writer.
/// * `ctx` - The gateway context holding the connection manager.
/// * `session` - The client's session.
/// * `arg` - Optional directory, relative or absolute.
///
/// # Returns
///
/// Result<(), std::io::Error> indicating the success or failure of the operation.
pub async fn handle_list_command(
    writer: ControlWriter,
    ctx: Arc<GatewayContext>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    let (path, pending) = {
        let mut session = session.lock().await;
        let path = resolve_path(&session.current_dir, list_target(&arg));
        match take_pending(&mut session) {
            Ok(pending) => (path, pending),
            Err(e) => {
                drop(session);
                return reply_error(&writer, &e).await;
            }
        }
    };

    let Some(mut lease) = acquire_transport(&writer, &ctx).await? else {
        return Ok(());
    };
    let result = lease.list_directory(&path).await;
    let entries = match result {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to list directory {}: {}", path, e);
            return reply_transport_error(&writer, &mut lease, e).await;
        }
    };
    drop(lease);

    let now = Utc::now();
    let lines: Vec<String> = entries
        .iter()
        .map(|entry| format_list_line(entry, now))
        .collect();
    debug!("Listing {} ({} entries)", path, lines.len());

    reply(&writer, 150, "Opening data connection for directory listing").await?;
    let mut session = session.lock().await;
    spawn_transfer(
        writer.clone(),
        ctx,
        &mut session,
        pending,
        TransferJob::Listing { lines },
    );
    Ok(())
}
