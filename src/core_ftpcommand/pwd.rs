// src/core_ftpcommand/pwd.rs
use crate::helpers::{reply, ControlWriter};
use crate::session::Session;
use std::sync::Arc;
use tokio::sync::Mutex;

pub async fn handle_pwd_command(
    writer: ControlWriter,
    session: Arc<Mutex<Session>>,
) -> std::io::Result<()> {
    let current_dir = session.lock().await.current_dir.clone();
    // Double quotes inside the path are doubled per RFC 959.
    let quoted = current_dir.replace('"', "\"\"");
    reply(&writer, 257, &format!("\"{}\" is current directory", quoted)).await
}
