use log::{debug, info, warn};
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use super::semaphore::{AdmissionPermit, AdmissionSemaphore, IdleReclaimer};
use crate::config::PoolConfig;
use crate::core_error::GatewayError;
use crate::core_transport::{RemoteTransport, TransportError, TransportFactory};

/// Tunables of the connection lifecycle manager.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub stale_after: Duration,
    pub sweep_interval: Duration,
    pub connect_attempts: u32,
    pub retry_delay: Duration,
    pub admission_timeout: Duration,
}

impl From<&PoolConfig> for PoolSettings {
    fn from(config: &PoolConfig) -> Self {
        Self {
            stale_after: Duration::from_secs(config.stale_timeout_secs),
            sweep_interval: Duration::from_secs(config.sweep_interval_secs.max(1)),
            connect_attempts: config.connect_attempts.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            admission_timeout: Duration::from_secs(config.admission_timeout_secs),
        }
    }
}

/// One open transport together with the admission slot it occupies.
struct PooledTransport {
    transport: Box<dyn RemoteTransport>,
    last_used: Instant,
    permanent: bool,
    _permit: AdmissionPermit,
}

impl PooledTransport {
    fn is_stale(&self, stale_after: Duration) -> bool {
        self.last_used.elapsed() > stale_after
    }
}

struct PoolInner {
    factory: Arc<dyn TransportFactory>,
    admission: Arc<AdmissionSemaphore>,
    host: String,
    settings: PoolSettings,
    idle: Mutex<Vec<PooledTransport>>,
    released: Notify,
    reclaiming: Arc<AtomicBool>,
}

impl PoolInner {
    fn take_idle(&self) -> Option<PooledTransport> {
        self.idle.lock().unwrap_or_else(|e| e.into_inner()).pop()
    }

    fn put_idle(&self, pooled: PooledTransport) {
        self.idle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(pooled);
        self.released.notify_one();
    }
}

impl IdleReclaimer for PoolInner {
    /// Closes the oldest idle transport so its slot goes to another waiter
    /// on the same host. The warm transport is only given up when nothing
    /// else is idle.
    fn reclaim_idle(&self) -> bool {
        if self.reclaiming.load(Ordering::SeqCst) {
            // The previous eviction still holds its slot until closed.
            return true;
        }
        let victim = {
            let mut idle = self.idle.lock().unwrap_or_else(|e| e.into_inner());
            let index = idle
                .iter()
                .enumerate()
                .min_by_key(|(_, p)| (p.permanent, p.last_used))
                .map(|(i, _)| i);
            index.map(|i| idle.remove(i))
        };
        let Some(pooled) = victim else {
            return false;
        };

        if pooled.permanent {
            info!("Giving up warm transport for {} to another admission waiter", self.host);
        } else {
            debug!("Evicting idle transport for {}", self.host);
        }
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                self.reclaiming.store(true, Ordering::SeqCst);
                let reclaiming = Arc::clone(&self.reclaiming);
                runtime.spawn(async move {
                    pooled.transport.close().await;
                    drop(pooled);
                    reclaiming.store(false, Ordering::SeqCst);
                });
            }
            Err(_) => drop(pooled),
        }
        true
    }
}

/// Creates, reuses and tears down remote transports for one remote host.
///
/// Handles are lent out through [`TransportLease`], which puts them back in
/// the idle pool when dropped, so a handle is never used by two sessions at
/// once and is never leaked on an error or cancellation path.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<PoolInner>,
}

impl ConnectionManager {
    pub fn new(
        factory: Arc<dyn TransportFactory>,
        admission: Arc<AdmissionSemaphore>,
        settings: PoolSettings,
    ) -> Self {
        let host = factory.host_key();
        let inner = Arc::new(PoolInner {
            factory,
            admission,
            host,
            settings,
            idle: Mutex::new(Vec::new()),
            released: Notify::new(),
            reclaiming: Arc::new(AtomicBool::new(false)),
        });
        let reclaimer: Weak<dyn IdleReclaimer> = Arc::downgrade(&inner) as Weak<dyn IdleReclaimer>;
        inner.admission.register_reclaimer(&inner.host, reclaimer);
        Self { inner }
    }

    pub fn host(&self) -> &str {
        &self.inner.host
    }

    pub fn admission(&self) -> &Arc<AdmissionSemaphore> {
        &self.inner.admission
    }

    pub fn idle_count(&self) -> usize {
        self.inner
            .idle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Opens the permanent transport kept warm regardless of idle time.
    pub async fn warm_up(&self) -> Result<(), GatewayError> {
        let permit = tokio::time::timeout(
            self.inner.settings.admission_timeout,
            self.inner.admission.acquire(&self.inner.host),
        )
        .await
        .map_err(|_| GatewayError::AdmissionTimeout(self.inner.host.clone()))?;
        let transport = self.connect_with_retry().await?;
        info!("Warm transport opened for {}", self.inner.host);
        self.inner.put_idle(PooledTransport {
            transport,
            last_used: Instant::now(),
            permanent: true,
            _permit: permit,
        });
        Ok(())
    }

    /// Returns a usable transport, reusing an idle one when it is fresh and
    /// answers a liveness probe, otherwise connecting a new one once an
    /// admission slot is free.
    pub async fn acquire(&self) -> Result<TransportLease, GatewayError> {
        let deadline = tokio::time::Instant::now() + self.inner.settings.admission_timeout;

        loop {
            let released = self.inner.released.notified();
            tokio::pin!(released);
            released.as_mut().enable();

            if let Some(pooled) = self.reuse_idle().await {
                return Ok(self.lease(pooled));
            }

            tokio::select! {
                permit = self.inner.admission.acquire(&self.inner.host) => {
                    let transport = self.connect_with_retry().await?;
                    debug!("Opened new transport for {}", self.inner.host);
                    return Ok(self.lease(PooledTransport {
                        transport,
                        last_used: Instant::now(),
                        permanent: false,
                        _permit: permit,
                    }));
                }
                _ = &mut released => {
                    debug!("Transport released for {}, retrying pool", self.inner.host);
                }
                _ = tokio::time::sleep_until(deadline) => {
                    warn!("Admission wait timed out for {}", self.inner.host);
                    return Err(GatewayError::AdmissionTimeout(self.inner.host.clone()));
                }
            }
        }
    }

    async fn reuse_idle(&self) -> Option<PooledTransport> {
        while let Some(mut pooled) = self.inner.take_idle() {
            if !pooled.permanent && pooled.is_stale(self.inner.settings.stale_after) {
                debug!("Discarding stale transport for {}", self.inner.host);
                pooled.transport.close().await;
                continue;
            }
            match pooled.transport.list_directory("/").await {
                Ok(_) => {
                    pooled.last_used = Instant::now();
                    debug!("Reusing pooled transport for {}", self.inner.host);
                    return Some(pooled);
                }
                Err(e) => {
                    warn!(
                        "Pooled transport for {} failed liveness probe: {}",
                        self.inner.host, e
                    );
                    pooled.transport.close().await;
                    if pooled.permanent {
                        // Replace the warm transport in the background.
                        let manager = self.clone();
                        drop(pooled);
                        tokio::spawn(async move {
                            if let Err(e) = manager.warm_up().await {
                                warn!("Could not replace warm transport: {}", e);
                            }
                        });
                    }
                }
            }
        }
        None
    }

    async fn connect_with_retry(&self) -> Result<Box<dyn RemoteTransport>, GatewayError> {
        let attempts = self.inner.settings.connect_attempts;
        let mut last_error = TransportError::Closed;
        for attempt in 1..=attempts {
            match self.inner.factory.connect().await {
                Ok(transport) => return Ok(transport),
                Err(e) => {
                    warn!(
                        "Connection attempt {}/{} to {} failed: {}",
                        attempt, attempts, self.inner.host, e
                    );
                    last_error = e;
                    if attempt < attempts {
                        tokio::time::sleep(self.inner.settings.retry_delay * attempt).await;
                    }
                }
            }
        }
        Err(GatewayError::Transport(last_error))
    }

    fn lease(&self, pooled: PooledTransport) -> TransportLease {
        TransportLease {
            pooled: Some(pooled),
            inner: Arc::clone(&self.inner),
            discard: false,
        }
    }

    /// Closes idle, non-permanent transports unused beyond the staleness window.
    pub async fn sweep(&self) -> usize {
        let stale: Vec<PooledTransport> = {
            let mut idle = self.inner.idle.lock().unwrap_or_else(|e| e.into_inner());
            let (stale, keep): (Vec<_>, Vec<_>) = idle
                .drain(..)
                .partition(|p| !p.permanent && p.is_stale(self.inner.settings.stale_after));
            *idle = keep;
            stale
        };
        let closed = stale.len();
        for pooled in stale {
            pooled.transport.close().await;
        }
        if closed > 0 {
            info!("Idle sweep closed {} transport(s) for {}", closed, self.inner.host);
        }
        closed
    }

    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(manager.inner.settings.sweep_interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                manager.sweep().await;
            }
        })
    }

    /// Closes every idle transport, permanent ones included.
    pub async fn shutdown(&self) {
        let all: Vec<PooledTransport> = self
            .inner
            .idle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for pooled in all {
            pooled.transport.close().await;
        }
    }
}

/// Exclusive use of one remote transport for the duration of a command.
pub struct TransportLease {
    pooled: Option<PooledTransport>,
    inner: Arc<PoolInner>,
    discard: bool,
}

impl TransportLease {
    /// Marks the transport as broken: it is closed instead of pooled on release.
    pub fn discard(&mut self) {
        self.discard = true;
    }

    /// Discards the transport if `err` shows the session is unusable.
    pub fn note_error(&mut self, err: &TransportError) {
        if err.is_fatal() {
            self.discard();
        }
    }
}

impl Deref for TransportLease {
    type Target = dyn RemoteTransport;

    fn deref(&self) -> &Self::Target {
        match &self.pooled {
            Some(pooled) => pooled.transport.as_ref(),
            None => unreachable!("lease used after release"),
        }
    }
}

impl Drop for TransportLease {
    fn drop(&mut self) {
        let Some(mut pooled) = self.pooled.take() else {
            return;
        };
        if self.discard {
            debug!("Closing discarded transport for {}", self.inner.host);
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    runtime.spawn(async move {
                        pooled.transport.close().await;
                    });
                }
                Err(_) => drop(pooled),
            }
            return;
        }
        pooled.last_used = Instant::now();
        self.inner.put_idle(pooled);
        debug!("Transport returned to pool for {}", self.inner.host);
    }
}
