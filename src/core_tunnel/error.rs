use crate::core_transport::TransportError;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TunnelError {
    #[error("Failed to bind tunnel listener on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("Failed to open channel to {target}: {source}")]
    Channel {
        target: String,
        #[source]
        source: TransportError,
    },

    #[error("No free connection slot for {0}")]
    AdmissionTimeout(String),

    #[error("Tunnel is stopping")]
    Stopped,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
