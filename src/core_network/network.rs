use crate::config::Config;
use crate::constants::{MAX_COMMAND_LINE, MAX_PENDING_COMMANDS, WELCOME_MESSAGE};
use crate::core_ftpcommand::ftpcommand::FtpCommand;
use crate::core_ftpcommand::handlers::{initialize_command_handlers, CommandHandler};
use crate::core_pool::ConnectionManager;
use crate::helpers::{reply, ControlWriter};
use crate::session::Session;
use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Everything a command handler needs beyond its own session.
pub struct GatewayContext {
    pub config: Arc<Config>,
    pub pool: ConnectionManager,
}

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Binds the gateway's control listener.
pub async fn bind_listener(config: &Config) -> Result<TcpListener> {
    let addr = format!(
        "{}:{}",
        config.server.listen_address, config.server.listen_port
    );
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind FTP listener on {}", addr))?;
    info!("Server listening on {}", listener.local_addr()?);
    Ok(listener)
}

/// Accepts clients until `shutdown` fires, then waits for every session to
/// finish its teardown.
pub async fn start_server(
    listener: TcpListener,
    ctx: Arc<GatewayContext>,
    shutdown: CancellationToken,
) {
    let sessions = TaskTracker::new();

    loop {
        let accepted = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((socket, addr)) => {
                info!("New connection from {}", addr);
                let ctx = Arc::clone(&ctx);
                let shutdown = shutdown.clone();
                sessions.spawn(async move {
                    if let Err(e) = handle_connection(socket, ctx, shutdown).await {
                        debug!("Connection error for {}: {}", addr, e);
                    }
                    info!("Connection closed for {}", addr);
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }

    drop(listener);
    info!("FTP listener closed, waiting for {} session(s)", sessions.len());
    sessions.close();
    sessions.wait().await;
}

/// Runs one client's control connection and tears its session down on
/// every exit path.
pub async fn handle_connection(
    socket: TcpStream,
    ctx: Arc<GatewayContext>,
    shutdown: CancellationToken,
) -> Result<(), std::io::Error> {
    let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
    let (read_half, write_half) = socket.into_split();
    let writer: ControlWriter = Arc::new(Mutex::new(write_half));
    let session = Arc::new(Mutex::new(Session::new(id)));

    let result = command_loop(
        BufReader::new(read_half),
        Arc::clone(&writer),
        ctx,
        Arc::clone(&session),
        shutdown,
    )
    .await;

    let transfer = session.lock().await.teardown();
    if let Some(transfer) = transfer {
        debug!("Session {}: waiting for cancelled transfer", id);
        if let Err(e) = transfer.handle.await {
            warn!("Session {}: transfer task failed: {}", id, e);
        }
    }
    debug!("Session {} destroyed", id);
    result
}

/// Reads one command line, appending to `line`. Partial reads survive
/// cancellation because the bytes stay in `line`.
async fn read_command_line<R>(reader: &mut R, line: &mut Vec<u8>) -> Result<usize, std::io::Error>
where
    R: AsyncBufRead + Unpin,
{
    let remaining = MAX_COMMAND_LINE.saturating_sub(line.len()) as u64;
    reader.take(remaining).read_until(b'\n', line).await
}

/// Splits `VERB argument` into an upper-cased verb and the raw argument.
pub fn parse_command(line: &str) -> (String, String) {
    let line = line.trim();
    match line.split_once(char::is_whitespace) {
        Some((cmd, arg)) => (cmd.to_ascii_uppercase(), arg.trim().to_string()),
        None => (line.to_ascii_uppercase(), String::new()),
    }
}

/// A command received while a transfer was running, replayed afterwards.
struct QueuedCommand {
    cmd: String,
    arg: String,
}

async fn command_loop<R>(
    mut reader: R,
    writer: ControlWriter,
    ctx: Arc<GatewayContext>,
    session: Arc<Mutex<Session>>,
    shutdown: CancellationToken,
) -> Result<(), std::io::Error>
where
    R: AsyncBufRead + Unpin,
{
    let id = session.lock().await.id;
    let idle_timeout = Duration::from_secs(ctx.config.server.control_idle_timeout_secs.max(1));
    let handlers = initialize_command_handlers();
    let mut line = Vec::new();
    let mut queued: VecDeque<QueuedCommand> = VecDeque::new();

    reply(&writer, 220, WELCOME_MESSAGE).await?;

    loop {
        let transfer_done = session.lock().await.transfer_done();

        // Commands that arrived during a transfer run once it is over, in
        // arrival order, before anything new is read.
        if transfer_done.is_none() {
            if let Some(QueuedCommand { cmd, arg }) = queued.pop_front() {
                if dispatch(&handlers, &writer, &ctx, &session, id, &cmd, arg).await? {
                    break;
                }
                continue;
            }
        }

        let read = tokio::select! {
            _ = shutdown.cancelled() => {
                reply(&writer, 421, "Service closing control connection").await.ok();
                break;
            }
            _ = transfer_finished(&transfer_done) => continue,
            _ = tokio::time::sleep(idle_timeout) => {
                let mut session = session.lock().await;
                if session.has_active_transfer() {
                    session.touch();
                    continue;
                }
                if session.last_activity.elapsed() < idle_timeout {
                    continue;
                }
                info!("Session {}: idle for {:?}, closing", id, idle_timeout);
                drop(session);
                reply(&writer, 421, "Idle timeout, closing control connection").await.ok();
                break;
            }
            read = read_command_line(&mut reader, &mut line) => read?,
        };

        if read == 0 && !line.ends_with(b"\n") {
            if line.len() >= MAX_COMMAND_LINE {
                warn!("Session {}: command line too long", id);
                reply(&writer, 500, "Command line too long").await?;
            } else {
                info!("Session {}: client disconnected", id);
            }
            break;
        }
        if !line.ends_with(b"\n") {
            // Partial line, keep buffering.
            continue;
        }

        let text = String::from_utf8_lossy(&line).into_owned();
        line.clear();
        let (cmd, arg) = parse_command(&text);
        if cmd.is_empty() {
            continue;
        }
        if cmd == "PASS" {
            info!("Session {}: received command: PASS ****", id);
        } else {
            info!("Session {}: received command: {} {}", id, cmd, arg);
        }
        session.lock().await.touch();

        // ABOR and QUIT act on the running transfer right away; everything
        // else waits for it so replies stay in command order.
        let urgent = matches!(
            FtpCommand::from_str(&cmd),
            Some(FtpCommand::ABOR) | Some(FtpCommand::QUIT)
        );
        if !urgent && (transfer_done.is_some() || !queued.is_empty()) {
            if queued.len() >= MAX_PENDING_COMMANDS {
                warn!("Session {}: too many commands queued behind a transfer", id);
                reply(&writer, 421, "Too many pending commands, closing control connection")
                    .await
                    .ok();
                break;
            }
            debug!("Session {}: queueing {} behind the running transfer", id, cmd);
            queued.push_back(QueuedCommand { cmd, arg });
            continue;
        }

        if dispatch(&handlers, &writer, &ctx, &session, id, &cmd, arg).await? {
            break;
        }
    }

    Ok(())
}

/// Runs one command. Returns true once the session asked to quit.
async fn dispatch(
    handlers: &HashMap<FtpCommand, Arc<CommandHandler>>,
    writer: &ControlWriter,
    ctx: &Arc<GatewayContext>,
    session: &Arc<Mutex<Session>>,
    id: u64,
    cmd: &str,
    arg: String,
) -> Result<bool, std::io::Error> {
    match FtpCommand::from_str(cmd).as_ref().and_then(|c| handlers.get(c)) {
        Some(handler) => {
            if let Err(e) = handler(
                Arc::clone(writer),
                Arc::clone(ctx),
                Arc::clone(session),
                arg,
            )
            .await
            {
                error!("Session {}: error handling command {}: {}", id, cmd, e);
                return Err(e);
            }
        }
        None => {
            debug!("Session {}: unsupported command {}", id, cmd);
            reply(writer, 502, "Command not implemented").await?;
        }
    }

    Ok(session.lock().await.quit)
}

async fn transfer_finished(done: &Option<CancellationToken>) {
    match done {
        Some(done) => done.cancelled().await,
        None => std::future::pending().await,
    }
}
