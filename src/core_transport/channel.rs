use async_trait::async_trait;
use log::{debug, info};
use russh::client;
use russh::Disconnect;
use std::net::SocketAddr;

use super::error::TransportError;
use super::sftp::{connect_ssh, ClientHandler};
use super::transport::{ChannelOpener, TunnelStream};
use crate::config::RemoteConfig;

/// Direct-tcpip channel opener over one dedicated SSH session.
pub struct SshChannelOpener {
    handle: client::Handle<ClientHandler>,
    host_key: String,
}

impl SshChannelOpener {
    pub async fn connect(remote: &RemoteConfig) -> Result<Self, TransportError> {
        let handle = connect_ssh(remote).await?;
        Ok(Self {
            handle,
            host_key: format!("{}@{}:{}", remote.username, remote.host, remote.port),
        })
    }
}

#[async_trait]
impl ChannelOpener for SshChannelOpener {
    fn host_key(&self) -> String {
        self.host_key.clone()
    }

    async fn open_direct(
        &self,
        host: &str,
        port: u16,
        originator: SocketAddr,
    ) -> Result<Box<dyn TunnelStream>, TransportError> {
        let channel = self
            .handle
            .channel_open_direct_tcpip(
                host,
                port as u32,
                originator.ip().to_string(),
                originator.port() as u32,
            )
            .await?;
        debug!("Opened direct channel to {}:{} for {}", host, port, originator);
        Ok(Box::new(Box::pin(channel.into_stream())))
    }

    async fn close(&self) {
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
        {
            debug!("SSH disconnect failed: {}", e);
        }
        info!("Tunnel SSH session to {} closed", self.host_key);
    }
}
