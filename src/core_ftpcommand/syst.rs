use crate::constants::SYSTEM_TYPE;
use crate::helpers::{reply, ControlWriter};
use log::debug;

/// Handles the SYST (System) FTP command.
pub async fn handle_syst_command(writer: ControlWriter) -> Result<(), std::io::Error> {
    debug!("Responding to SYST command with system type.");
    reply(&writer, 215, SYSTEM_TYPE).await
}
