use crate::core_network::network::GatewayContext;
use crate::helpers::{reply, ControlWriter};
use crate::session::{PassiveListener, Session};
use log::{debug, warn};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// Binds the first free port of `min..=max` on `ip`, falling back to an
/// OS-assigned port when the whole range is taken.
pub async fn bind_passive_listener(
    ip: IpAddr,
    min: u16,
    max: u16,
) -> Result<PassiveListener, std::io::Error> {
    for port in min..=max {
        match TcpListener::bind((ip, port)).await {
            Ok(listener) => {
                debug!("Passive listener bound on {}:{}", ip, port);
                return Ok(PassiveListener { listener, port });
            }
            Err(e) => {
                debug!("Passive port {} unavailable: {}", port, e);
            }
        }
    }

    warn!(
        "No free passive port in {}-{}, using an ephemeral port",
        min, max
    );
    let listener = TcpListener::bind((ip, 0)).await?;
    let port = listener.local_addr()?.port();
    Ok(PassiveListener { listener, port })
}

/// The address advertised in PASV replies. `Config::parse` has already
/// rejected anything that is not IPv4.
fn passive_ip(ctx: &GatewayContext) -> IpAddr {
    let address = &ctx.config.server.pasv_address;
    match address.parse::<Ipv4Addr>() {
        Ok(ip) => IpAddr::V4(ip),
        Err(_) => {
            warn!("Invalid pasv_address {}, advertising 127.0.0.1", address);
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}

/// `227 Entering Passive Mode (h1,h2,h3,h4,p1,p2)`
pub fn format_pasv_reply(ip: IpAddr, port: u16) -> String {
    let octets = match ip {
        IpAddr::V4(v4) => v4.octets(),
        IpAddr::V6(_) => Ipv4Addr::LOCALHOST.octets(),
    };
    format!(
        "Entering Passive Mode ({},{},{},{},{},{})",
        octets[0],
        octets[1],
        octets[2],
        octets[3],
        port / 256,
        port % 256
    )
}

/// Opens a fresh listener for this session. The new one is bound while the
/// previous one still holds its port, so consecutive calls never report
/// the same port.
async fn open_passive(
    ctx: &GatewayContext,
    session: &Arc<Mutex<Session>>,
) -> Result<(IpAddr, u16), std::io::Error> {
    let ip = passive_ip(ctx);
    let listener = bind_passive_listener(
        ip,
        ctx.config.server.pasv_port_min,
        ctx.config.server.pasv_port_max,
    )
    .await?;
    let port = listener.port;

    let mut session = session.lock().await;
    session.set_passive(listener);
    debug!("Session {}: passive mode on port {}", session.id, port);
    Ok((ip, port))
}

/// Handles the PASV command.
pub async fn handle_pasv_command(
    writer: ControlWriter,
    ctx: Arc<GatewayContext>,
    session: Arc<Mutex<Session>>,
    _arg: String,
) -> Result<(), std::io::Error> {
    match open_passive(&ctx, &session).await {
        Ok((ip, port)) => reply(&writer, 227, &format_pasv_reply(ip, port)).await,
        Err(e) => {
            warn!("Failed to open passive listener: {}", e);
            reply(&writer, 425, "Cannot open data connection").await
        }
    }
}

/// Handles the EPSV command. `EPSV ALL` is acknowledged without opening a listener.
pub async fn handle_epsv_command(
    writer: ControlWriter,
    ctx: Arc<GatewayContext>,
    session: Arc<Mutex<Session>>,
    arg: String,
) -> Result<(), std::io::Error> {
    if arg.trim().eq_ignore_ascii_case("ALL") {
        return reply(&writer, 200, "EPSV ALL command successful").await;
    }

    match open_passive(&ctx, &session).await {
        Ok((_, port)) => {
            reply(
                &writer,
                229,
                &format!("Entering Extended Passive Mode (|||{}|)", port),
            )
            .await
        }
        Err(e) => {
            warn!("Failed to open passive listener: {}", e);
            reply(&writer, 425, "Cannot open data connection").await
        }
    }
}
