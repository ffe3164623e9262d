use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};

use super::error::TransportError;

/// One entry of a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub is_directory: bool,
    pub size: u64,
    /// Seconds since the Unix epoch, if the server reported it.
    pub modified: Option<i64>,
}

/// Attributes of a single remote path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RemoteAttributes {
    pub is_directory: bool,
    pub size: u64,
    pub modified: Option<i64>,
}

/// How a remote file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    /// Create the file if needed and truncate it.
    WriteTruncate,
}

/// An open remote file descriptor.
#[async_trait]
pub trait RemoteFile: Send {
    /// Reads up to `len` bytes at `offset`. An empty buffer means end of file.
    async fn read(&mut self, offset: u64, len: usize) -> Result<Vec<u8>, TransportError>;

    async fn write(&mut self, buffer: &[u8], offset: u64) -> Result<(), TransportError>;

    async fn attributes(&mut self) -> Result<RemoteAttributes, TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

/// An authenticated session against the remote file server.
///
/// Implementations are owned by exactly one holder at a time; the connection
/// manager guarantees no two FTP sessions share one concurrently.
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    /// Runs a shell command and returns its exit status and combined output.
    async fn execute_command(&self, command: &str) -> Result<(u32, String), TransportError>;

    async fn open_file(
        &self,
        path: &str,
        mode: OpenMode,
    ) -> Result<Box<dyn RemoteFile>, TransportError>;

    async fn list_directory(&self, path: &str) -> Result<Vec<RemoteEntry>, TransportError>;

    async fn attributes(&self, path: &str) -> Result<RemoteAttributes, TransportError>;

    async fn rename(&self, from: &str, to: &str) -> Result<(), TransportError>;

    async fn remove(&self, path: &str) -> Result<(), TransportError>;

    async fn rmdir(&self, path: &str) -> Result<(), TransportError>;

    async fn create_directory(&self, path: &str) -> Result<(), TransportError>;

    async fn close(&self);
}

/// Produces ready-to-use transports for one remote endpoint.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    /// Identity of the remote host, used to key the admission semaphore.
    fn host_key(&self) -> String;

    async fn connect(&self) -> Result<Box<dyn RemoteTransport>, TransportError>;
}

/// A bidirectional byte stream carried by one SSH direct channel.
pub trait TunnelStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> TunnelStream for T {}

/// Opens direct channels through one SSH session owned by a tunnel.
#[async_trait]
pub trait ChannelOpener: Send + Sync {
    /// Identity of the remote host, used to key the admission semaphore.
    fn host_key(&self) -> String;

    /// Opens a channel to `host:port` as seen from the remote side.
    async fn open_direct(
        &self,
        host: &str,
        port: u16,
        originator: SocketAddr,
    ) -> Result<Box<dyn TunnelStream>, TransportError>;

    /// Closes the underlying SSH session.
    async fn close(&self);
}
