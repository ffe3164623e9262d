use crate::core_network::network::GatewayContext;
use crate::helpers::{reply, ControlWriter};
use crate::session::Session;
use log::{info, warn};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Parses `h1,h2,h3,h4,p1,p2` into the client's data address.
pub fn parse_port_argument(arg: &str) -> Option<SocketAddr> {
    let parts: Vec<u8> = arg
        .trim()
        .split(',')
        .map(|x| x.trim().parse::<u8>())
        .collect::<Result<_, _>>()
        .ok()?;
    if parts.len() != 6 {
        return None;
    }

    let ip = Ipv4Addr::new(parts[0], parts[1], parts[2], parts[3]);
    let port = (parts[4] as u16) << 8 | parts[5] as u16;
    if port == 0 {
        return None;
    }
    Some(SocketAddr::from((ip, port)))
}

/// Handles the PORT (Active Mode) FTP command. No connection is made until
/// the next transfer command.
pub async fn handle_port_command(
    writer: ControlWriter,
    _ctx: Arc<GatewayContext>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    match parse_port_argument(&arg) {
        Some(addr) => {
            let mut session = session.lock().await;
            session.set_active(addr);
            info!("Session {}: active mode, client data address {}", session.id, addr);
            drop(session);
            reply(&writer, 200, "PORT command successful").await
        }
        None => {
            warn!("Invalid PORT argument: {}", arg);
            reply(&writer, 501, "Invalid PORT command").await
        }
    }
}
