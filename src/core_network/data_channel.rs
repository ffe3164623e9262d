use log::{debug, warn};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;

use crate::core_error::GatewayError;
use crate::session::{DataMode, PassiveListener, Session};

/// Data connection negotiated for one transfer command, not yet connected.
#[derive(Debug)]
pub enum PendingDataChannel {
    Passive(PassiveListener),
    Active(SocketAddr),
}

/// Takes what the last PASV/EPSV/PORT prepared. A passive listener serves a
/// single transfer; an active address stays valid until replaced.
pub fn take_pending(session: &mut Session) -> Result<PendingDataChannel, GatewayError> {
    match session.data_mode {
        Some(DataMode::Passive) => session
            .passive_listener
            .take()
            .map(PendingDataChannel::Passive)
            .ok_or(GatewayError::NoDataMode),
        Some(DataMode::Active) => session
            .active_addr
            .map(PendingDataChannel::Active)
            .ok_or(GatewayError::NoDataMode),
        None => Err(GatewayError::NoDataMode),
    }
}

impl PendingDataChannel {
    /// Establishes the data connection. In passive mode the listener accepts
    /// one client and is closed right after.
    pub async fn open(self, timeout: Duration) -> Result<TcpStream, GatewayError> {
        match self {
            PendingDataChannel::Passive(PassiveListener { listener, port }) => {
                let accepted = tokio::time::timeout(timeout, listener.accept()).await;
                drop(listener);
                match accepted {
                    Ok(Ok((stream, addr))) => {
                        debug!("Accepted data connection from {} on port {}", addr, port);
                        Ok(stream)
                    }
                    Ok(Err(e)) => Err(GatewayError::DataConnection(e.to_string())),
                    Err(_) => {
                        warn!("No data connection on port {} within {:?}", port, timeout);
                        Err(GatewayError::NoDataConnection)
                    }
                }
            }
            PendingDataChannel::Active(addr) => {
                match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
                    Ok(Ok(stream)) => {
                        debug!("Connected to client data address {}", addr);
                        Ok(stream)
                    }
                    Ok(Err(e)) => {
                        warn!("Failed to connect to client {}: {}", addr, e);
                        Err(GatewayError::DataConnection(e.to_string()))
                    }
                    Err(_) => Err(GatewayError::DataConnection(format!(
                        "connect to {} timed out",
                        addr
                    ))),
                }
            }
        }
    }
}
