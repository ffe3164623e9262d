// Error taxonomy of the FTP gateway
use thiserror::Error;

use crate::core_transport::TransportError;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Remote transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("No connection slot available for {0}")]
    AdmissionTimeout(String),

    #[error("No data connection established within timeout")]
    NoDataConnection,

    #[error("Data connection mode not negotiated")]
    NoDataMode,

    #[error("Cannot open data connection: {0}")]
    DataConnection(String),

    #[error("Local IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transfer cancelled")]
    Cancelled,
}

impl GatewayError {
    /// Maps the failure to the reply sent on the control connection.
    pub fn to_ftp_response(&self) -> String {
        match self {
            GatewayError::Transport(TransportError::NotFound(_)) => {
                "550 File not found".to_string()
            }
            GatewayError::Transport(TransportError::PermissionDenied(_)) => {
                "550 Permission denied".to_string()
            }
            GatewayError::Transport(TransportError::Remote(msg)) => {
                format!("550 Requested action not taken: {}", msg)
            }
            GatewayError::Transport(_) => {
                "421 Service not available, remote host unreachable".to_string()
            }
            GatewayError::AdmissionTimeout(_) => {
                "421 Too many connections to remote host, try again later".to_string()
            }
            GatewayError::NoDataConnection => {
                "425 No data connection established within timeout".to_string()
            }
            GatewayError::NoDataMode => "425 Use PORT or PASV first".to_string(),
            GatewayError::DataConnection(_) => "425 Cannot open data connection".to_string(),
            GatewayError::Io(_) => {
                "451 Requested action aborted. Local error in processing.".to_string()
            }
            GatewayError::Cancelled => "426 Connection closed; transfer aborted".to_string(),
        }
    }

    /// Whether the remote transport involved must be discarded instead of pooled.
    pub fn is_fatal_to_transport(&self) -> bool {
        matches!(self, GatewayError::Transport(err) if err.is_fatal())
    }
}
