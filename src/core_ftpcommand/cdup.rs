use crate::core_ftpcommand::cwd::change_directory;
use crate::core_network::network::GatewayContext;
use crate::helpers::ControlWriter;
use crate::session::Session;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handles the CDUP command: a CWD to the parent directory.
pub async fn handle_cdup_command(
    writer: ControlWriter,
    ctx: Arc<GatewayContext>,
    session: Arc<Mutex<Session>>,
    _arg: String,
) -> Result<(), std::io::Error> {
    change_directory(writer, ctx, session, "..").await
}
