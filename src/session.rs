use log::debug;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How the next data connection will be established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataMode {
    /// We listen, the client connects (PASV/EPSV).
    Passive,
    /// We connect back to the client (PORT).
    Active,
}

/// Listener created by the last PASV/EPSV, waiting for its single client.
#[derive(Debug)]
pub struct PassiveListener {
    pub listener: TcpListener,
    pub port: u16,
}

/// A transfer running in the background of the command loop.
#[derive(Debug)]
pub struct ActiveTransfer {
    pub cancel: CancellationToken,
    pub handle: JoinHandle<()>,
    /// Cancelled once the task has finished, however it ends.
    done: CancellationToken,
}

impl ActiveTransfer {
    pub fn spawn<F>(cancel: CancellationToken, task: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let done = CancellationToken::new();
        let guard = done.clone().drop_guard();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            task.await;
        });
        Self {
            cancel,
            handle,
            done,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.done.is_cancelled()
    }

    /// Token that fires when the task finishes, for waiting without taking
    /// the handle.
    pub fn done(&self) -> CancellationToken {
        self.done.clone()
    }
}

/// State of one FTP client connection. Only the owning command loop and
/// its handlers ever touch it.
#[derive(Debug)]
pub struct Session {
    pub id: u64,
    pub current_dir: String,
    pub type_: String, // The transfer type (A, I), stored only
    pub username: Option<String>,
    pub data_mode: Option<DataMode>,
    pub passive_listener: Option<PassiveListener>,
    pub active_addr: Option<SocketAddr>,
    pub last_activity: Instant,
    pub rename_from: Option<String>,
    pub rest_offset: Option<u64>,
    pub transfer: Option<ActiveTransfer>,
    pub quit: bool,
}

impl Session {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            current_dir: String::from("/"),
            type_: "A".to_string(), // Default transfer type is ASCII
            username: None,
            data_mode: None,
            passive_listener: None,
            active_addr: None,
            last_activity: Instant::now(),
            rename_from: None,
            rest_offset: None,
            transfer: None,
            quit: false,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// True while a transfer task is still running.
    pub fn has_active_transfer(&self) -> bool {
        self.transfer.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Replaces the pending passive listener; the previous one is closed.
    pub fn set_passive(&mut self, listener: PassiveListener) {
        if let Some(old) = self.passive_listener.replace(listener) {
            debug!(
                "Session {}: closing previous passive listener on port {}",
                self.id, old.port
            );
        }
        self.data_mode = Some(DataMode::Passive);
        self.active_addr = None;
    }

    pub fn set_active(&mut self, addr: SocketAddr) {
        self.passive_listener = None;
        self.active_addr = Some(addr);
        self.data_mode = Some(DataMode::Active);
    }

    /// Completion signal of the transfer still running, if any.
    pub fn transfer_done(&self) -> Option<CancellationToken> {
        self.transfer
            .as_ref()
            .filter(|t| !t.is_finished())
            .map(ActiveTransfer::done)
    }

    /// Detaches the running transfer, if any.
    pub fn take_transfer(&mut self) -> Option<ActiveTransfer> {
        self.transfer.take()
    }

    /// Drops every resource the session holds. The caller awaits the
    /// returned transfer so the remote handle is back in the pool before the
    /// session is gone.
    pub fn teardown(&mut self) -> Option<ActiveTransfer> {
        self.passive_listener = None;
        self.rename_from = None;
        self.rest_offset = None;
        let transfer = self.transfer.take();
        if let Some(transfer) = &transfer {
            transfer.cancel.cancel();
        }
        transfer
    }
}
