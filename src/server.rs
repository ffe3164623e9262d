use crate::config::Config;
use crate::constants::STARTUP_PROBE_COMMAND;
use crate::core_network::network::{self, GatewayContext};
use crate::core_pool::{AdmissionSemaphore, ConnectionManager, PoolSettings};
use crate::core_transport::TransportFactory;
use anyhow::{bail, Context, Result};
use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A running gateway. Dropping the handle leaves it running; call
/// [`GatewayHandle::stop`] to shut it down.
pub struct GatewayHandle {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    server: JoinHandle<()>,
    sweeper: JoinHandle<()>,
    pool: ConnectionManager,
}

impl GatewayHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn pool(&self) -> &ConnectionManager {
        &self.pool
    }

    /// Waits until the gateway stops on its own (it only does on `stop`).
    pub async fn wait(&mut self) {
        if let Err(e) = (&mut self.server).await {
            error!("Gateway task failed: {}", e);
        }
    }

    /// Closes the listener, ends every session and closes pooled transports.
    pub async fn stop(mut self) {
        info!("Stopping gateway on {}", self.local_addr);
        self.shutdown.cancel();
        self.wait().await;
        self.sweeper.abort();
        self.pool.shutdown().await;
        info!("Gateway stopped");
    }
}

/// Checks that the remote host answers before the gateway starts listening.
async fn run_startup_probe(pool: &ConnectionManager) -> Result<()> {
    let mut lease = pool
        .acquire()
        .await
        .with_context(|| format!("Remote host {} is not reachable", pool.host()))?;
    let outcome = lease.execute_command(STARTUP_PROBE_COMMAND).await;
    // The probe transport is not kept.
    lease.discard();

    let (status, output) =
        outcome.with_context(|| format!("Startup probe failed on {}", pool.host()))?;
    if status != 0 || !output.contains("Connected") {
        bail!(
            "Startup probe on {} returned status {}: {}",
            pool.host(),
            status,
            output.trim()
        );
    }
    info!("Startup probe succeeded on {}", pool.host());
    Ok(())
}

/// Starts the FTP gateway for one remote endpoint.
///
/// Registers the host's connection budget on `admission`, probes the remote
/// host, opens the warm transport and binds the control listener. Any of
/// these failing aborts startup.
pub async fn start(
    config: Arc<Config>,
    factory: Arc<dyn TransportFactory>,
    admission: Arc<AdmissionSemaphore>,
) -> Result<GatewayHandle> {
    admission.configure(&factory.host_key(), config.remote.max_connections);
    let pool = ConnectionManager::new(factory, admission, PoolSettings::from(&config.pool));

    if config.server.startup_probe {
        run_startup_probe(&pool).await?;
    }
    if config.pool.keep_warm {
        if let Err(e) = pool.warm_up().await {
            warn!("Could not open warm transport: {}", e);
        }
    }

    let listener = network::bind_listener(&config).await?;
    let local_addr = listener.local_addr()?;

    let sweeper = pool.spawn_sweeper();
    let shutdown = CancellationToken::new();
    let ctx = Arc::new(GatewayContext {
        config,
        pool: pool.clone(),
    });
    let server = tokio::spawn(network::start_server(listener, ctx, shutdown.clone()));

    info!("FTP gateway for {} ready on {}", pool.host(), local_addr);
    Ok(GatewayHandle {
        local_addr,
        shutdown,
        server,
        sweeper,
        pool,
    })
}
