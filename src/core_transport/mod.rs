pub mod channel;
pub mod error;
pub mod sftp;
pub mod transport;

#[cfg(test)]
pub mod memory;

pub use error::TransportError;
pub use transport::{
    ChannelOpener, OpenMode, RemoteAttributes, RemoteEntry, RemoteFile, RemoteTransport,
    TransportFactory, TunnelStream,
};
