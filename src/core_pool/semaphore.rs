use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::constants::ADMISSION_RECLAIM_INTERVAL_MS;

/// Capacity applied to hosts that were never configured explicitly.
const DEFAULT_CAPACITY: usize = 5;

struct HostPool {
    capacity: usize,
    semaphore: Arc<Semaphore>,
}

impl HostPool {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            semaphore: Arc::new(Semaphore::new(capacity)),
        }
    }
}

/// A holder of admission permits that can hand an idle one back on demand.
pub trait IdleReclaimer: Send + Sync {
    /// Starts releasing one idle slot. Returns false when nothing is idle.
    fn reclaim_idle(&self) -> bool;
}

/// Counting permit pool, one per remote host, shared by the FTP gateway and
/// the tunnel relay.
#[derive(Default)]
pub struct AdmissionSemaphore {
    hosts: Mutex<HashMap<String, HostPool>>,
    reclaimers: Mutex<HashMap<String, Vec<Weak<dyn IdleReclaimer>>>>,
}

/// A held connection slot. Dropping it returns the slot.
#[derive(Debug)]
pub struct AdmissionPermit {
    host: String,
    _permit: OwnedSemaphorePermit,
}

impl AdmissionPermit {
    pub fn host(&self) -> &str {
        &self.host
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        debug!("Admission permit released for {}", self.host);
    }
}

impl AdmissionSemaphore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the capacity for `host`. A changed capacity replaces the pool:
    /// current holders keep their permits, future acquisitions see the new
    /// ceiling.
    pub fn configure(&self, host: &str, max_connections: usize) {
        let capacity = max_connections.max(1);
        let mut hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
        match hosts.get(host) {
            Some(pool) if pool.capacity == capacity => {}
            _ => {
                info!(
                    "Admission limit for {} set to {} connection(s)",
                    host, capacity
                );
                hosts.insert(host.to_string(), HostPool::new(capacity));
            }
        }
    }

    fn semaphore_for(&self, host: &str) -> Arc<Semaphore> {
        let mut hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            &hosts
                .entry(host.to_string())
                .or_insert_with(|| HostPool::new(DEFAULT_CAPACITY))
                .semaphore,
        )
    }

    /// Waits until a slot for `host` is free.
    pub async fn acquire(&self, host: &str) -> AdmissionPermit {
        let semaphore = self.semaphore_for(host);
        debug!(
            "Acquiring admission permit for {} ({} available)",
            host,
            semaphore.available_permits()
        );
        // The semaphore is never closed, so acquisition cannot fail.
        let permit = match semaphore.acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => unreachable!("admission semaphore closed"),
        };
        AdmissionPermit {
            host: host.to_string(),
            _permit: permit,
        }
    }

    /// Registers a holder whose idle permits [`acquire_within`] may reclaim.
    ///
    /// [`acquire_within`]: AdmissionSemaphore::acquire_within
    pub fn register_reclaimer(&self, host: &str, reclaimer: Weak<dyn IdleReclaimer>) {
        let mut reclaimers = self.reclaimers.lock().unwrap_or_else(|e| e.into_inner());
        let list = reclaimers.entry(host.to_string()).or_default();
        list.retain(|r| r.strong_count() > 0);
        list.push(reclaimer);
    }

    fn reclaim_one(&self, host: &str) -> bool {
        let holders: Vec<Arc<dyn IdleReclaimer>> = {
            let mut reclaimers = self.reclaimers.lock().unwrap_or_else(|e| e.into_inner());
            match reclaimers.get_mut(host) {
                Some(list) => {
                    list.retain(|r| r.strong_count() > 0);
                    list.iter().filter_map(Weak::upgrade).collect()
                }
                None => Vec::new(),
            }
        };
        holders.iter().any(|holder| holder.reclaim_idle())
    }

    /// Waits at most `timeout` for a slot for `host`. While waiting, idle
    /// holders registered for the host are asked to give their slot back.
    pub async fn acquire_within(&self, host: &str, timeout: Duration) -> Option<AdmissionPermit> {
        let semaphore = self.semaphore_for(host);
        let deadline = tokio::time::Instant::now() + timeout;
        let acquire = semaphore.acquire_owned();
        tokio::pin!(acquire);
        let mut reclaim_tick =
            tokio::time::interval(Duration::from_millis(ADMISSION_RECLAIM_INTERVAL_MS));

        loop {
            tokio::select! {
                biased;
                permit = &mut acquire => {
                    let permit = match permit {
                        Ok(permit) => permit,
                        Err(_) => unreachable!("admission semaphore closed"),
                    };
                    return Some(AdmissionPermit {
                        host: host.to_string(),
                        _permit: permit,
                    });
                }
                _ = tokio::time::sleep_until(deadline) => {
                    warn!("No admission slot for {} within {:?}", host, timeout);
                    return None;
                }
                _ = reclaim_tick.tick() => {
                    if self.reclaim_one(host) {
                        debug!("Reclaimed an idle slot for {}", host);
                    }
                }
            }
        }
    }

    pub fn try_acquire(&self, host: &str) -> Option<AdmissionPermit> {
        let semaphore = self.semaphore_for(host);
        semaphore.try_acquire_owned().ok().map(|permit| AdmissionPermit {
            host: host.to_string(),
            _permit: permit,
        })
    }

    pub fn capacity(&self, host: &str) -> usize {
        let hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
        hosts.get(host).map(|p| p.capacity).unwrap_or(DEFAULT_CAPACITY)
    }

    pub fn available(&self, host: &str) -> usize {
        self.semaphore_for(host).available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_acquire_blocks_at_capacity() {
        let admission = Arc::new(AdmissionSemaphore::new());
        admission.configure("nas", 2);

        let first = admission.acquire("nas").await;
        let _second = admission.acquire("nas").await;
        assert_eq!(admission.available("nas"), 0);
        assert!(admission.try_acquire("nas").is_none());

        let waiter = {
            let admission = Arc::clone(&admission);
            tokio::spawn(async move { admission.acquire("nas").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(first);
        let third = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should be admitted")
            .unwrap();
        assert_eq!(third.host(), "nas");
    }

    #[tokio::test]
    async fn test_hosts_are_independent() {
        let admission = AdmissionSemaphore::new();
        admission.configure("a", 1);
        admission.configure("b", 1);

        let _a = admission.acquire("a").await;
        assert!(admission.try_acquire("a").is_none());
        assert!(admission.try_acquire("b").is_some());
    }

    #[tokio::test]
    async fn test_reconfigure_resets_pool() {
        let admission = AdmissionSemaphore::new();
        admission.configure("nas", 1);
        let _held = admission.acquire("nas").await;
        assert!(admission.try_acquire("nas").is_none());

        admission.configure("nas", 3);
        assert_eq!(admission.capacity("nas"), 3);
        assert_eq!(admission.available("nas"), 3);

        // Same capacity again keeps the current pool.
        let _one = admission.acquire("nas").await;
        admission.configure("nas", 3);
        assert_eq!(admission.available("nas"), 2);
    }

    struct HeldSlots {
        admission: Arc<AdmissionSemaphore>,
        idle: Mutex<Vec<AdmissionPermit>>,
    }

    impl IdleReclaimer for HeldSlots {
        fn reclaim_idle(&self) -> bool {
            self.idle.lock().unwrap().pop().is_some()
        }
    }

    #[tokio::test]
    async fn test_acquire_within_reclaims_idle_slot() {
        let admission = Arc::new(AdmissionSemaphore::new());
        admission.configure("nas", 1);
        let held = Arc::new(HeldSlots {
            admission: Arc::clone(&admission),
            idle: Mutex::new(vec![admission.acquire("nas").await]),
        });
        let weak: Weak<dyn IdleReclaimer> = Arc::downgrade(&held) as Weak<dyn IdleReclaimer>;
        admission.register_reclaimer("nas", weak);

        let permit = held
            .admission
            .acquire_within("nas", Duration::from_secs(2))
            .await;
        assert!(permit.is_some());
        assert!(held.idle.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_acquire_within_gives_up() {
        let admission = AdmissionSemaphore::new();
        admission.configure("nas", 1);
        let _busy = admission.acquire("nas").await;

        let started = std::time::Instant::now();
        let permit = admission.acquire_within("nas", Duration::from_millis(100)).await;
        assert!(permit.is_none());
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let admission = AdmissionSemaphore::new();
        admission.configure("nas", 0);
        assert_eq!(admission.capacity("nas"), 1);
        assert!(admission.try_acquire("nas").is_some());
    }
}
