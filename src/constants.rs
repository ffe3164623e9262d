// src/constants.rs

pub const DEFAULT_LISTEN_PORT: u16 = 2121;
pub const DEFAULT_PASV_PORT_MIN: u16 = 60000;
pub const DEFAULT_PASV_PORT_MAX: u16 = 60100;
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Longest command line accepted on the control connection.
pub const MAX_COMMAND_LINE: usize = 8 * 1024;

pub const SYSTEM_TYPE: &str = "UNIX Type: L8";
pub const WELCOME_MESSAGE: &str = "Anonymous FTP server ready";

pub const FEATURES: &[&str] = &["SIZE", "MDTM", "PASV", "EPSV", "REST STREAM", "UTF8"];

/// Command used to check the remote host at gateway startup.
pub const STARTUP_PROBE_COMMAND: &str = "echo Connected";

/// Relay buffer for tunnelled connections.
pub const TUNNEL_BUFFER_SIZE: usize = 32 * 1024;

/// How often a blocked admission waiter asks idle transports to step aside.
pub const ADMISSION_RECLAIM_INTERVAL_MS: u64 = 50;

/// Commands buffered while a transfer is running before the client is cut off.
pub const MAX_PENDING_COMMANDS: usize = 32;
