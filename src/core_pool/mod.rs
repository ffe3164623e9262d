pub mod manager;
pub mod semaphore;

pub use manager::{ConnectionManager, PoolSettings, TransportLease};
pub use semaphore::{AdmissionPermit, AdmissionSemaphore, IdleReclaimer};
