use thiserror::Error;

/// Failures reported by a Remote File Transport.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("No such file or directory: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Remote operation failed: {0}")]
    Remote(String),

    #[error("Transport closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Errors that mean the underlying session is unusable and must not go
    /// back to the pool.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TransportError::ConnectionFailed(_)
                | TransportError::AuthenticationFailed(_)
                | TransportError::Closed
                | TransportError::Io(_)
        )
    }
}

impl From<russh::Error> for TransportError {
    fn from(err: russh::Error) -> Self {
        TransportError::ConnectionFailed(err.to_string())
    }
}

impl From<russh_sftp::client::error::Error> for TransportError {
    fn from(err: russh_sftp::client::error::Error) -> Self {
        use russh_sftp::client::error::Error as SftpError;
        use russh_sftp::protocol::StatusCode;

        match err {
            SftpError::Status(status) => match status.status_code {
                StatusCode::NoSuchFile => TransportError::NotFound(status.error_message),
                StatusCode::PermissionDenied => {
                    TransportError::PermissionDenied(status.error_message)
                }
                StatusCode::ConnectionLost | StatusCode::NoConnection => TransportError::Closed,
                _ => TransportError::Remote(status.error_message),
            },
            SftpError::IO(msg) => {
                TransportError::Io(std::io::Error::new(std::io::ErrorKind::Other, msg))
            }
            other => TransportError::Remote(other.to_string()),
        }
    }
}
