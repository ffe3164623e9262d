use log::{debug, info};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::error::TunnelError;
use super::relay::{Tunnel, TunnelStatsSnapshot};
use crate::config::TunnelConfig;
use crate::core_pool::AdmissionSemaphore;
use crate::core_transport::ChannelOpener;

/// What the registry reports about one running tunnel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelInfo {
    pub id: String,
    pub local_addr: SocketAddr,
    pub remote_host: String,
    pub remote_port: u16,
    pub stats: TunnelStatsSnapshot,
}

/// Running tunnels keyed by the caller's identifier.
pub struct TunnelRegistry {
    admission: Arc<AdmissionSemaphore>,
    admission_timeout: Duration,
    tunnels: Mutex<HashMap<String, Tunnel>>,
}

impl TunnelRegistry {
    pub fn new(admission: Arc<AdmissionSemaphore>, admission_timeout: Duration) -> Self {
        Self {
            admission,
            admission_timeout,
            tunnels: Mutex::new(HashMap::new()),
        }
    }

    /// Starts a tunnel under `config.id`. A tunnel already registered with
    /// that id is stopped first, which frees its local port.
    pub async fn start(
        &self,
        config: TunnelConfig,
        opener: Arc<dyn ChannelOpener>,
    ) -> Result<SocketAddr, TunnelError> {
        let mut tunnels = self.tunnels.lock().await;
        if let Some(mut previous) = tunnels.remove(&config.id) {
            info!("Replacing tunnel {}", config.id);
            previous.stop().await;
        }

        let id = config.id.clone();
        let tunnel = Tunnel::start(
            config,
            opener,
            Arc::clone(&self.admission),
            self.admission_timeout,
        )
        .await?;
        let local_addr = tunnel.local_addr();
        tunnels.insert(id, tunnel);
        Ok(local_addr)
    }

    /// Stops the tunnel registered under `id`. Returns false when there was
    /// none.
    pub async fn stop(&self, id: &str) -> bool {
        let removed = self.tunnels.lock().await.remove(id);
        match removed {
            Some(mut tunnel) => {
                tunnel.stop().await;
                true
            }
            None => {
                debug!("No tunnel named {} to stop", id);
                false
            }
        }
    }

    pub async fn stop_all(&self) {
        let drained: Vec<Tunnel> = self.tunnels.lock().await.drain().map(|(_, t)| t).collect();
        for mut tunnel in drained {
            tunnel.stop().await;
        }
    }

    pub async fn info(&self, id: &str) -> Option<TunnelInfo> {
        let tunnels = self.tunnels.lock().await;
        tunnels.get(id).map(|tunnel| TunnelInfo {
            id: tunnel.id().to_string(),
            local_addr: tunnel.local_addr(),
            remote_host: tunnel.config().remote_host.clone(),
            remote_port: tunnel.config().remote_port,
            stats: tunnel.stats(),
        })
    }

    pub async fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.tunnels.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}
