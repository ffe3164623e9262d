use std::io::SeekFrom;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use russh::client;
use russh::keys::key::PrivateKeyWithHashAlg;
use russh::keys::{HashAlg, PublicKey};
use russh::{ChannelMsg, Disconnect};
use russh_sftp::client::fs::File as SftpFile;
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::OpenFlags;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use super::error::TransportError;
use super::transport::{
    OpenMode, RemoteAttributes, RemoteEntry, RemoteFile, RemoteTransport, TransportFactory,
};
use crate::config::RemoteConfig;

/// russh callbacks: host key verification against the configured fingerprint.
pub struct ClientHandler {
    host: String,
    expected_fingerprint: Option<String>,
}

impl client::Handler for ClientHandler {
    type Error = TransportError;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let fingerprint = server_public_key.fingerprint(HashAlg::Sha256).to_string();
        match &self.expected_fingerprint {
            Some(expected) if *expected == fingerprint => Ok(true),
            Some(expected) => {
                warn!(
                    "Host key mismatch for {}: expected {}, got {}",
                    self.host, expected, fingerprint
                );
                Err(TransportError::ConnectionFailed(format!(
                    "host key verification failed for {}",
                    self.host
                )))
            }
            None => {
                warn!(
                    "No host key pinned for {}, accepting {}",
                    self.host, fingerprint
                );
                Ok(true)
            }
        }
    }
}

/// Opens and authenticates an SSH session to the configured remote host.
pub async fn connect_ssh(remote: &RemoteConfig) -> Result<client::Handle<ClientHandler>, TransportError> {
    let ssh_config = client::Config {
        inactivity_timeout: None,
        keepalive_interval: Some(Duration::from_secs(30)),
        keepalive_max: 3,
        ..Default::default()
    };

    let handler = ClientHandler {
        host: remote.host.clone(),
        expected_fingerprint: remote.host_key_fingerprint.clone(),
    };

    debug!("Connecting to SSH server at {}:{}", remote.host, remote.port);
    let mut handle = tokio::time::timeout(
        Duration::from_secs(remote.connect_timeout_secs),
        client::connect(
            Arc::new(ssh_config),
            (remote.host.as_str(), remote.port),
            handler,
        ),
    )
    .await
    .map_err(|_| TransportError::ConnectionFailed("connection timed out".to_string()))??;

    let authenticated = if let Some(key_path) = &remote.key_path {
        let key = russh::keys::load_secret_key(key_path, remote.key_passphrase.as_deref())
            .map_err(|e| TransportError::AuthenticationFailed(e.to_string()))?;
        handle
            .authenticate_publickey(
                &remote.username,
                PrivateKeyWithHashAlg::new(Arc::new(key), None),
            )
            .await?
    } else {
        let password = remote.password.clone().unwrap_or_default();
        handle
            .authenticate_password(&remote.username, password)
            .await?
    };

    if !authenticated.success() {
        return Err(TransportError::AuthenticationFailed(format!(
            "server rejected credentials for {}",
            remote.username
        )));
    }

    info!("SSH session established with {}:{}", remote.host, remote.port);
    Ok(handle)
}

/// Remote File Transport backed by one SSH connection and its SFTP subsystem.
pub struct SftpTransport {
    handle: client::Handle<ClientHandler>,
    sftp: SftpSession,
}

impl SftpTransport {
    pub async fn connect(remote: &RemoteConfig) -> Result<Self, TransportError> {
        let handle = connect_ssh(remote).await?;

        let channel = handle.channel_open_session().await?;
        channel.request_subsystem(true, "sftp").await?;
        let sftp = SftpSession::new(channel.into_stream()).await?;

        Ok(Self { handle, sftp })
    }
}

fn to_attributes(metadata: &russh_sftp::client::fs::Metadata) -> RemoteAttributes {
    RemoteAttributes {
        is_directory: metadata.is_dir(),
        size: metadata.size.unwrap_or(0),
        modified: metadata.mtime.map(i64::from),
    }
}

#[async_trait]
impl RemoteTransport for SftpTransport {
    async fn execute_command(&self, command: &str) -> Result<(u32, String), TransportError> {
        let mut channel = self.handle.channel_open_session().await?;
        channel.exec(true, command).await?;

        let mut output = Vec::new();
        let mut exit_status = 0;
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { data } => output.extend_from_slice(&data),
                ChannelMsg::ExtendedData { data, .. } => output.extend_from_slice(&data),
                ChannelMsg::ExitStatus { exit_status: status } => exit_status = status,
                _ => {}
            }
        }

        Ok((exit_status, String::from_utf8_lossy(&output).into_owned()))
    }

    async fn open_file(
        &self,
        path: &str,
        mode: OpenMode,
    ) -> Result<Box<dyn RemoteFile>, TransportError> {
        let flags = match mode {
            OpenMode::Read => OpenFlags::READ,
            OpenMode::WriteTruncate => OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE,
        };
        let file = self.sftp.open_with_flags(path, flags).await?;
        Ok(Box::new(SftpRemoteFile { file }))
    }

    async fn list_directory(&self, path: &str) -> Result<Vec<RemoteEntry>, TransportError> {
        let entries = self.sftp.read_dir(path).await?;
        Ok(entries
            .filter(|entry| {
                let name = entry.file_name();
                name != "." && name != ".."
            })
            .map(|entry| {
                let attributes = to_attributes(&entry.metadata());
                RemoteEntry {
                    name: entry.file_name(),
                    is_directory: attributes.is_directory,
                    size: attributes.size,
                    modified: attributes.modified,
                }
            })
            .collect())
    }

    async fn attributes(&self, path: &str) -> Result<RemoteAttributes, TransportError> {
        let metadata = self.sftp.metadata(path).await?;
        Ok(to_attributes(&metadata))
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), TransportError> {
        Ok(self.sftp.rename(from, to).await?)
    }

    async fn remove(&self, path: &str) -> Result<(), TransportError> {
        Ok(self.sftp.remove_file(path).await?)
    }

    async fn rmdir(&self, path: &str) -> Result<(), TransportError> {
        Ok(self.sftp.remove_dir(path).await?)
    }

    async fn create_directory(&self, path: &str) -> Result<(), TransportError> {
        Ok(self.sftp.create_dir(path).await?)
    }

    async fn close(&self) {
        if let Err(e) = self.sftp.close().await {
            debug!("SFTP close failed: {}", e);
        }
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
        {
            debug!("SSH disconnect failed: {}", e);
        }
    }
}

struct SftpRemoteFile {
    file: SftpFile,
}

#[async_trait]
impl RemoteFile for SftpRemoteFile {
    async fn read(&mut self, offset: u64, len: usize) -> Result<Vec<u8>, TransportError> {
        self.file.seek(SeekFrom::Start(offset)).await?;
        let mut buffer = vec![0u8; len];
        let n = self.file.read(&mut buffer).await?;
        buffer.truncate(n);
        Ok(buffer)
    }

    async fn write(&mut self, buffer: &[u8], offset: u64) -> Result<(), TransportError> {
        self.file.seek(SeekFrom::Start(offset)).await?;
        self.file.write_all(buffer).await?;
        Ok(())
    }

    async fn attributes(&mut self) -> Result<RemoteAttributes, TransportError> {
        let metadata = self.file.metadata().await?;
        Ok(to_attributes(&metadata))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.file.shutdown().await?;
        Ok(())
    }
}

/// Connects a fresh [`SftpTransport`] for every request.
pub struct SftpTransportFactory {
    remote: RemoteConfig,
}

impl SftpTransportFactory {
    pub fn new(remote: RemoteConfig) -> Self {
        Self { remote }
    }
}

#[async_trait]
impl TransportFactory for SftpTransportFactory {
    fn host_key(&self) -> String {
        format!("{}@{}:{}", self.remote.username, self.remote.host, self.remote.port)
    }

    async fn connect(&self) -> Result<Box<dyn RemoteTransport>, TransportError> {
        let transport = SftpTransport::connect(&self.remote).await?;
        Ok(Box::new(transport))
    }
}
