use crate::core_error::GatewayError;
use crate::core_network::network::GatewayContext;
use crate::core_pool::TransportLease;
use crate::helpers::{resolve_path, send_response, ControlWriter};
use crate::session::Session;
use log::warn;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Resolves a command argument against the session's working directory.
pub async fn resolve_arg(session: &Arc<Mutex<Session>>, arg: &str) -> String {
    let session = session.lock().await;
    resolve_path(&session.current_dir, arg)
}

/// Sends the reply matching `err` on the control connection.
pub async fn reply_error(writer: &ControlWriter, err: &GatewayError) -> Result<(), std::io::Error> {
    send_response(writer, format!("{}\r\n", err.to_ftp_response()).as_bytes()).await
}

/// Acquires a remote transport for the current command. On failure the
/// client has already been answered and `None` is returned.
pub async fn acquire_transport(
    writer: &ControlWriter,
    ctx: &GatewayContext,
) -> Result<Option<TransportLease>, std::io::Error> {
    match ctx.pool.acquire().await {
        Ok(lease) => Ok(Some(lease)),
        Err(e) => {
            warn!("Could not acquire remote transport: {}", e);
            reply_error(writer, &e).await?;
            Ok(None)
        }
    }
}

/// Replies to a failed remote operation and retires the transport if the
/// failure left it unusable.
pub async fn reply_transport_error(
    writer: &ControlWriter,
    lease: &mut TransportLease,
    err: crate::core_transport::TransportError,
) -> Result<(), std::io::Error> {
    lease.note_error(&err);
    reply_error(writer, &GatewayError::Transport(err)).await
}
