use crate::helpers::{reply, ControlWriter};

/// Shared handler for NOOP, OPTS, MODE, STRU and STAT: acknowledged, no effect.
pub async fn handle_noop_command(writer: ControlWriter, _arg: String) -> Result<(), std::io::Error> {
    reply(&writer, 200, "Command OK").await
}
