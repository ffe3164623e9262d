pub mod error;
pub mod registry;
pub mod relay;

pub use error::TunnelError;
pub use registry::{TunnelInfo, TunnelRegistry};
pub use relay::{Tunnel, TunnelStats, TunnelStatsSnapshot};
