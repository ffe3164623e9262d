//! Local FTP gateway to SFTP servers, plus SSH tunnels exposing remote TCP
//! endpoints on local ports.

pub mod config;
pub mod constants;
pub mod core_cli;
pub mod core_error;
pub mod core_ftpcommand;
pub mod core_network;
pub mod core_pool;
pub mod core_transfer;
pub mod core_transport;
pub mod core_tunnel;
pub mod helpers;
pub mod server;
pub mod session;
