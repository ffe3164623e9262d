use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};
use log::{error, info};
use rouillegate::config::Config;
use rouillegate::core_cli::Cli;
use rouillegate::core_pool::AdmissionSemaphore;
use rouillegate::core_transport::channel::SshChannelOpener;
use rouillegate::core_transport::sftp::SftpTransportFactory;
use rouillegate::core_tunnel::TunnelRegistry;
use rouillegate::server;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Cli::parse();

    // Initialize the logger with a custom format
    let default_level = if args.verbose { "debug" } else { "info" };
    Builder::from_env(Env::default().default_filter_or(default_level))
        .format(|buf, record| {
            let timestamp = buf.timestamp();
            writeln!(
                buf,
                "[{}] [{}] {}",
                timestamp,
                record.level(),
                record.args()
            )
        })
        .init();

    // Determine the default config path based on the OS
    let default_config_path = if cfg!(target_os = "windows") {
        "C:\\ProgramData\\rouillegate\\rouillegate.conf"
    } else {
        "/etc/rouillegate.conf"
    };

    let config_path = if args.config.is_empty() {
        default_config_path
    } else {
        args.config.as_str()
    };
    let mut config = Config::load_from_file(config_path)?;

    if let Some(port) = args.listen_port {
        config.server.listen_port = port;
    }
    let config = Arc::new(config);

    let admission = Arc::new(AdmissionSemaphore::new());
    let factory = Arc::new(SftpTransportFactory::new(config.remote.clone()));
    let gateway = server::start(Arc::clone(&config), factory, Arc::clone(&admission)).await?;

    let tunnels = TunnelRegistry::new(
        Arc::clone(&admission),
        Duration::from_secs(config.pool.admission_timeout_secs),
    );
    for tunnel in &config.tunnels {
        let opener = match SshChannelOpener::connect(&config.remote).await {
            Ok(opener) => Arc::new(opener),
            Err(e) => {
                error!("Tunnel {}: SSH session failed: {}", tunnel.id, e);
                continue;
            }
        };
        match tunnels.start(tunnel.clone(), opener).await {
            Ok(addr) => info!("Tunnel {} listening on {}", tunnel.id, addr),
            Err(e) => error!("Tunnel {} failed to start: {}", tunnel.id, e),
        }
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    tunnels.stop_all().await;
    gateway.stop().await;

    Ok(())
}
