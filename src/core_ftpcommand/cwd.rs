use crate::core_ftpcommand::utils::{acquire_transport, reply_transport_error, resolve_arg};
use crate::core_network::network::GatewayContext;
use crate::core_transport::TransportError;
use crate::helpers::{reply, ControlWriter};
use crate::session::Session;
use log::{debug, info};
use std::sync::Arc;
use tokio::sync::Mutex;

pub async fn handle_cwd_command(
    writer: ControlWriter,
    ctx: Arc<GatewayContext>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    change_directory(writer, ctx, session, &arg).await
}

/// Moves the session to `target` once the remote side confirms it is a
/// directory. The working directory is left untouched on any failure.
pub async fn change_directory(
    writer: ControlWriter,
    ctx: Arc<GatewayContext>,
    session: Arc<Mutex<Session>>,
    target: &str,
) -> Result<(), std::io::Error> {
    let new_dir = resolve_arg(&session, target).await;

    let Some(mut lease) = acquire_transport(&writer, &ctx).await? else {
        return Ok(());
    };

    let result = lease.attributes(&new_dir).await;
    match result {
        Ok(attributes) if attributes.is_directory => {
            drop(lease);
            let mut session = session.lock().await;
            info!("Session {}: directory changed to {}", session.id, new_dir);
            session.current_dir = new_dir.clone();
            drop(session);
            reply(&writer, 250, &format!("Directory changed to {}", new_dir)).await
        }
        Ok(_) | Err(TransportError::NotFound(_)) => {
            debug!("CWD target {} is not a directory", new_dir);
            reply(&writer, 550, "Directory not found").await
        }
        Err(e) => reply_transport_error(&writer, &mut lease, e).await,
    }
}
