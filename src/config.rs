use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use crate::constants::{
    DEFAULT_BUFFER_SIZE, DEFAULT_LISTEN_PORT, DEFAULT_PASV_PORT_MAX, DEFAULT_PASV_PORT_MIN,
};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_address: String,
    pub listen_port: u16,
    pub pasv_address: String,
    pub pasv_port_min: u16,
    pub pasv_port_max: u16,
    pub data_connection_timeout_secs: u64,
    pub control_idle_timeout_secs: u64,
    pub upload_buffer_size: Option<usize>, // Optional to allow default value
    pub download_buffer_size: Option<usize>, // Optional to allow default value
    pub scratch_dir: Option<String>,
    pub startup_probe: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: String::from("127.0.0.1"),
            listen_port: DEFAULT_LISTEN_PORT,
            pasv_address: String::from("127.0.0.1"),
            pasv_port_min: DEFAULT_PASV_PORT_MIN,
            pasv_port_max: DEFAULT_PASV_PORT_MAX,
            data_connection_timeout_secs: 10,
            control_idle_timeout_secs: 300,
            upload_buffer_size: Some(DEFAULT_BUFFER_SIZE),
            download_buffer_size: Some(DEFAULT_BUFFER_SIZE),
            scratch_dir: None,
            startup_probe: true,
        }
    }
}

impl ServerConfig {
    pub fn data_connection_timeout(&self) -> Duration {
        Duration::from_secs(self.data_connection_timeout_secs)
    }

    pub fn download_chunk(&self) -> usize {
        self.download_buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE).max(1)
    }

    pub fn upload_chunk(&self) -> usize {
        self.upload_buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE).max(1)
    }
}

/// Remote endpoint reached over SSH/SFTP, including the credentials reference.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
    pub key_path: Option<String>,
    pub key_passphrase: Option<String>,
    pub host_key_fingerprint: Option<String>,
    pub max_connections: usize,
    pub connect_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: String::from("localhost"),
            port: 22,
            username: String::new(),
            password: None,
            key_path: None,
            key_passphrase: None,
            host_key_fingerprint: None,
            max_connections: 5,
            connect_timeout_secs: 15,
        }
    }
}

// Credentials stay out of the logs.
impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("key_path", &self.key_path)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    pub stale_timeout_secs: u64,
    pub sweep_interval_secs: u64,
    pub connect_attempts: u32,
    pub retry_delay_ms: u64,
    pub admission_timeout_secs: u64,
    pub keep_warm: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            stale_timeout_secs: 300,
            sweep_interval_secs: 30,
            connect_attempts: 3,
            retry_delay_ms: 500,
            admission_timeout_secs: 30,
            keep_warm: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TunnelConfig {
    pub id: String,
    pub local_port: u16,
    pub remote_host: String,
    pub remote_port: u16,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub tunnels: Vec<TunnelConfig>,
}

impl Config {
    pub fn load_from_file(path: &str) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path))?;
        Self::parse(&config_str)
            .with_context(|| format!("Failed to parse configuration file: {}", path))
    }

    pub fn parse(config_str: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(config_str)?;

        // Set defaults if not specified
        if config.server.upload_buffer_size.is_none() {
            config.server.upload_buffer_size = Some(DEFAULT_BUFFER_SIZE);
        }
        if config.server.download_buffer_size.is_none() {
            config.server.download_buffer_size = Some(DEFAULT_BUFFER_SIZE);
        }
        if config.server.pasv_port_min > config.server.pasv_port_max {
            anyhow::bail!(
                "pasv_port_min ({}) is greater than pasv_port_max ({})",
                config.server.pasv_port_min,
                config.server.pasv_port_max
            );
        }
        // PASV replies can only carry an IPv4 address.
        config
            .server
            .pasv_address
            .parse::<Ipv4Addr>()
            .with_context(|| {
                format!("Invalid pasv_address: {}", config.server.pasv_address)
            })?;
        config
            .server
            .listen_address
            .parse::<IpAddr>()
            .with_context(|| {
                format!("Invalid listen_address: {}", config.server.listen_address)
            })?;
        config.remote.max_connections = config.remote.max_connections.max(1);

        Ok(config)
    }
}
