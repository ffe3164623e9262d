use clap::Parser;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "rouillegate",
    about = "A local FTP gateway to SFTP servers, with SSH tunnels."
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "")]
    pub config: String,

    /// Port for the FTP listener, overrides the configuration file
    #[arg(short = 'p', long)]
    pub listen_port: Option<u16>,

    /// Enable verbose mode
    #[arg(short, long)]
    pub verbose: bool,
}
