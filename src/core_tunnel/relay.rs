use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::error::TunnelError;
use crate::config::TunnelConfig;
use crate::constants::TUNNEL_BUFFER_SIZE;
use crate::core_pool::AdmissionSemaphore;
use crate::core_transport::{ChannelOpener, TunnelStream};

/// Counters shared by the accept loop and every relayed connection.
#[derive(Debug, Default)]
pub struct TunnelStats {
    connection_count: AtomicU64,
    active_connections: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
}

/// Point-in-time copy of [`TunnelStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TunnelStatsSnapshot {
    pub connection_count: u64,
    pub active_connections: u64,
    /// Bytes sent from local clients to the remote endpoint.
    pub bytes_sent: u64,
    /// Bytes received from the remote endpoint.
    pub bytes_received: u64,
}

impl TunnelStats {
    pub fn snapshot(&self) -> TunnelStatsSnapshot {
        TunnelStatsSnapshot {
            connection_count: self.connection_count.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
        }
    }
}

/// A local listener forwarding every connection to `remote_host:remote_port`
/// through the SSH session held by its opener.
pub struct Tunnel {
    config: TunnelConfig,
    local_addr: SocketAddr,
    stop_accept: CancellationToken,
    stop_connections: CancellationToken,
    accept_task: Option<JoinHandle<()>>,
    connections: TaskTracker,
    opener: Arc<dyn ChannelOpener>,
    stats: Arc<TunnelStats>,
}

impl Tunnel {
    /// Binds the local port and starts accepting. Each connection holds an
    /// admission permit for the opener's host while its channel is open; a
    /// connection that gets no permit within `admission_timeout` is closed.
    pub async fn start(
        config: TunnelConfig,
        opener: Arc<dyn ChannelOpener>,
        admission: Arc<AdmissionSemaphore>,
        admission_timeout: Duration,
    ) -> Result<Self, TunnelError> {
        let listener = TcpListener::bind(("127.0.0.1", config.local_port))
            .await
            .map_err(|source| TunnelError::Bind {
                port: config.local_port,
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let stop_accept = CancellationToken::new();
        let stop_connections = CancellationToken::new();
        let connections = TaskTracker::new();
        let stats = Arc::new(TunnelStats::default());

        let accept_task = tokio::spawn(accept_loop(
            listener,
            config.clone(),
            Arc::clone(&opener),
            admission,
            admission_timeout,
            Arc::clone(&stats),
            connections.clone(),
            stop_accept.clone(),
            stop_connections.clone(),
        ));

        info!(
            "Tunnel {} started: {} -> {}:{}",
            config.id, local_addr, config.remote_host, config.remote_port
        );
        Ok(Self {
            config,
            local_addr,
            stop_accept,
            stop_connections,
            accept_task: Some(accept_task),
            connections,
            opener,
            stats,
        })
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn config(&self) -> &TunnelConfig {
        &self.config
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> TunnelStatsSnapshot {
        self.stats.snapshot()
    }

    /// Closes the listener, then every relayed connection, then the SSH
    /// session. Calling it again does nothing.
    pub async fn stop(&mut self) {
        let Some(accept_task) = self.accept_task.take() else {
            return;
        };

        self.stop_accept.cancel();
        if let Err(e) = accept_task.await {
            error!("Tunnel {} accept task failed: {}", self.config.id, e);
        }
        debug!("Tunnel {} listener closed", self.config.id);

        self.stop_connections.cancel();
        self.connections.close();
        self.connections.wait().await;

        self.opener.close().await;
        info!(
            "Tunnel {} stopped after {} connection(s)",
            self.config.id,
            self.stats.connection_count.load(Ordering::Relaxed)
        );
    }
}

impl Drop for Tunnel {
    fn drop(&mut self) {
        if self.accept_task.is_some() {
            warn!("Tunnel {} dropped without stop", self.config.id);
            self.stop_accept.cancel();
            self.stop_connections.cancel();
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn accept_loop(
    listener: TcpListener,
    config: TunnelConfig,
    opener: Arc<dyn ChannelOpener>,
    admission: Arc<AdmissionSemaphore>,
    admission_timeout: Duration,
    stats: Arc<TunnelStats>,
    connections: TaskTracker,
    stop_accept: CancellationToken,
    stop_connections: CancellationToken,
) {
    loop {
        let accepted = tokio::select! {
            _ = stop_accept.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((socket, peer)) => {
                debug!("Tunnel {}: connection from {}", config.id, peer);
                stats.connection_count.fetch_add(1, Ordering::Relaxed);
                stats.active_connections.fetch_add(1, Ordering::Relaxed);

                let config = config.clone();
                let opener = Arc::clone(&opener);
                let admission = Arc::clone(&admission);
                let stats = Arc::clone(&stats);
                let cancel = stop_connections.clone();
                connections.spawn(async move {
                    let slot = Admission {
                        semaphore: admission,
                        timeout: admission_timeout,
                    };
                    if let Err(e) =
                        handle_connection(socket, peer, &config, opener, slot, &stats, cancel).await
                    {
                        warn!("Tunnel {}: connection from {} failed: {}", config.id, peer, e);
                    }
                    stats.active_connections.fetch_sub(1, Ordering::Relaxed);
                    debug!("Tunnel {}: connection from {} closed", config.id, peer);
                });
            }
            Err(e) => {
                error!("Tunnel {}: failed to accept connection: {}", config.id, e);
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

/// Where a connection gets its slot from, and how long it may wait.
struct Admission {
    semaphore: Arc<AdmissionSemaphore>,
    timeout: Duration,
}

/// Relays one accepted connection. Returning drops `socket`, which closes
/// the local side on every error path.
async fn handle_connection(
    socket: TcpStream,
    peer: SocketAddr,
    config: &TunnelConfig,
    opener: Arc<dyn ChannelOpener>,
    admission: Admission,
    stats: &TunnelStats,
    cancel: CancellationToken,
) -> Result<(), TunnelError> {
    let host = opener.host_key();
    let _permit = tokio::select! {
        _ = cancel.cancelled() => return Err(TunnelError::Stopped),
        permit = admission.semaphore.acquire_within(&host, admission.timeout) => {
            permit.ok_or(TunnelError::AdmissionTimeout(host.clone()))?
        }
    };

    let target = format!("{}:{}", config.remote_host, config.remote_port);
    let channel = tokio::select! {
        _ = cancel.cancelled() => return Err(TunnelError::Stopped),
        channel = opener.open_direct(&config.remote_host, config.remote_port, peer) => channel,
    }
    .map_err(|source| TunnelError::Channel {
        target: target.clone(),
        source,
    })?;
    debug!("Tunnel {}: channel to {} open for {}", config.id, target, peer);

    relay(socket, channel, stats, &cancel).await;
    Ok(())
}

/// Copies bytes both ways until either direction ends, then shuts down
/// both sides.
async fn relay(
    local: TcpStream,
    remote: Box<dyn TunnelStream>,
    stats: &TunnelStats,
    cancel: &CancellationToken,
) {
    let (mut local_read, mut local_write) = local.into_split();
    let (mut remote_read, mut remote_write) = tokio::io::split(remote);

    tokio::select! {
        result = copy_counted(&mut local_read, &mut remote_write, &stats.bytes_sent) => {
            if let Err(e) = result {
                debug!("Local to remote copy ended: {}", e);
            }
        }
        result = copy_counted(&mut remote_read, &mut local_write, &stats.bytes_received) => {
            if let Err(e) = result {
                debug!("Remote to local copy ended: {}", e);
            }
        }
        _ = cancel.cancelled() => {}
    }

    let _ = remote_write.shutdown().await;
    let _ = local_write.shutdown().await;
}

async fn copy_counted<R, W>(
    reader: &mut R,
    writer: &mut W,
    counter: &AtomicU64,
) -> Result<u64, std::io::Error>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; TUNNEL_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(total);
        }
        writer.write_all(&buf[..n]).await?;
        writer.flush().await?;
        total += n as u64;
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }
}
