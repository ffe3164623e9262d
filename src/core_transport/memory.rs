//! In-memory Remote File Transport used by the test suites.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::error::TransportError;
use super::transport::{
    OpenMode, RemoteAttributes, RemoteEntry, RemoteFile, RemoteTransport, TransportFactory,
};

fn parent_of(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

#[derive(Default)]
struct Tree {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
}

/// Shared state behind every transport a [`MemoryFactory`] hands out.
#[derive(Default)]
pub struct MemoryState {
    tree: Mutex<Tree>,
    pub open_transports: AtomicUsize,
    pub peak_transports: AtomicUsize,
    pub connects: AtomicUsize,
    pub closes: AtomicUsize,
    pub failing_connects: AtomicUsize,
    pub fail_probes: AtomicBool,
    pub fail_writes: AtomicBool,
    pub open_files: AtomicUsize,
    read_delay: Mutex<Option<Duration>>,
    op_delay: Mutex<Option<Duration>>,
}

impl MemoryState {
    pub fn add_dir(&self, path: &str) {
        let mut tree = self.tree.lock().unwrap();
        let mut current = String::new();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            current.push('/');
            current.push_str(part);
            tree.dirs.insert(current.clone());
        }
    }

    pub fn add_file(&self, path: &str, content: Vec<u8>) {
        self.add_dir(&parent_of(path));
        self.tree.lock().unwrap().files.insert(path.to_string(), content);
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.tree.lock().unwrap().files.get(path).cloned()
    }

    pub fn has_dir(&self, path: &str) -> bool {
        path == "/" || self.tree.lock().unwrap().dirs.contains(path)
    }

    pub fn set_read_delay(&self, delay: Duration) {
        *self.read_delay.lock().unwrap() = Some(delay);
    }

    /// Delay applied to attribute lookups, to hold a transport busy.
    pub fn set_op_delay(&self, delay: Duration) {
        *self.op_delay.lock().unwrap() = Some(delay);
    }
}

pub struct MemoryFactory {
    pub state: Arc<MemoryState>,
    host: String,
}

impl MemoryFactory {
    pub fn new(host: &str) -> Self {
        Self {
            state: Arc::new(MemoryState::default()),
            host: host.to_string(),
        }
    }
}

#[async_trait]
impl TransportFactory for MemoryFactory {
    fn host_key(&self) -> String {
        self.host.clone()
    }

    async fn connect(&self) -> Result<Box<dyn RemoteTransport>, TransportError> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        let pending_failures = self.state.failing_connects.load(Ordering::SeqCst);
        if pending_failures > 0 {
            self.state
                .failing_connects
                .store(pending_failures - 1, Ordering::SeqCst);
            return Err(TransportError::ConnectionFailed("injected failure".into()));
        }
        let open = self.state.open_transports.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.peak_transports.fetch_max(open, Ordering::SeqCst);
        Ok(Box::new(MemoryTransport {
            state: Arc::clone(&self.state),
            closed: AtomicBool::new(false),
        }))
    }
}

pub struct MemoryTransport {
    state: Arc<MemoryState>,
    closed: AtomicBool,
}

#[async_trait]
impl RemoteTransport for MemoryTransport {
    async fn execute_command(&self, command: &str) -> Result<(u32, String), TransportError> {
        match command.strip_prefix("echo ") {
            Some(rest) => Ok((0, format!("{}\n", rest))),
            None => Ok((127, "command not found\n".to_string())),
        }
    }

    async fn open_file(
        &self,
        path: &str,
        mode: OpenMode,
    ) -> Result<Box<dyn RemoteFile>, TransportError> {
        let content = match mode {
            OpenMode::Read => self
                .state
                .file(path)
                .ok_or_else(|| TransportError::NotFound(path.to_string()))?,
            OpenMode::WriteTruncate => {
                if !self.state.has_dir(&parent_of(path)) {
                    return Err(TransportError::NotFound(path.to_string()));
                }
                Vec::new()
            }
        };
        self.state.open_files.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryFile {
            state: Arc::clone(&self.state),
            path: path.to_string(),
            content,
            writable: mode == OpenMode::WriteTruncate,
            closed: false,
        }))
    }

    async fn list_directory(&self, path: &str) -> Result<Vec<RemoteEntry>, TransportError> {
        if self.state.fail_probes.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        if !self.state.has_dir(path) {
            return Err(TransportError::NotFound(path.to_string()));
        }
        let tree = self.state.tree.lock().unwrap();
        let mut entries = Vec::new();
        for dir in tree.dirs.iter().filter(|d| parent_of(d) == path) {
            entries.push(RemoteEntry {
                name: dir.rsplit('/').next().unwrap_or_default().to_string(),
                is_directory: true,
                size: 0,
                modified: Some(1_700_000_000),
            });
        }
        for (file, content) in tree.files.iter().filter(|(f, _)| parent_of(f) == path) {
            entries.push(RemoteEntry {
                name: file.rsplit('/').next().unwrap_or_default().to_string(),
                is_directory: false,
                size: content.len() as u64,
                modified: Some(1_700_000_000),
            });
        }
        Ok(entries)
    }

    async fn attributes(&self, path: &str) -> Result<RemoteAttributes, TransportError> {
        let delay = *self.state.op_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.state.has_dir(path) {
            return Ok(RemoteAttributes {
                is_directory: true,
                size: 0,
                modified: Some(1_700_000_000),
            });
        }
        self.state
            .file(path)
            .map(|content| RemoteAttributes {
                is_directory: false,
                size: content.len() as u64,
                modified: Some(1_700_000_000),
            })
            .ok_or_else(|| TransportError::NotFound(path.to_string()))
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), TransportError> {
        let mut tree = self.state.tree.lock().unwrap();
        match tree.files.remove(from) {
            Some(content) => {
                tree.files.insert(to.to_string(), content);
                Ok(())
            }
            None if tree.dirs.remove(from) => {
                tree.dirs.insert(to.to_string());
                Ok(())
            }
            None => Err(TransportError::NotFound(from.to_string())),
        }
    }

    async fn remove(&self, path: &str) -> Result<(), TransportError> {
        let mut tree = self.state.tree.lock().unwrap();
        tree.files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| TransportError::NotFound(path.to_string()))
    }

    async fn rmdir(&self, path: &str) -> Result<(), TransportError> {
        let mut tree = self.state.tree.lock().unwrap();
        if tree.dirs.remove(path) {
            Ok(())
        } else {
            Err(TransportError::NotFound(path.to_string()))
        }
    }

    async fn create_directory(&self, path: &str) -> Result<(), TransportError> {
        if self.state.has_dir(path) {
            return Err(TransportError::Remote(format!("{} already exists", path)));
        }
        self.state.add_dir(path);
        Ok(())
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.state.open_transports.fetch_sub(1, Ordering::SeqCst);
            self.state.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}

struct MemoryFile {
    state: Arc<MemoryState>,
    path: String,
    content: Vec<u8>,
    writable: bool,
    closed: bool,
}

#[async_trait]
impl RemoteFile for MemoryFile {
    async fn read(&mut self, offset: u64, len: usize) -> Result<Vec<u8>, TransportError> {
        let delay = *self.state.read_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let start = (offset as usize).min(self.content.len());
        let end = (start + len).min(self.content.len());
        Ok(self.content[start..end].to_vec())
    }

    async fn write(&mut self, buffer: &[u8], offset: u64) -> Result<(), TransportError> {
        if !self.writable || self.state.fail_writes.load(Ordering::SeqCst) {
            return Err(TransportError::Remote("write rejected".into()));
        }
        let offset = offset as usize;
        if self.content.len() < offset + buffer.len() {
            self.content.resize(offset + buffer.len(), 0);
        }
        self.content[offset..offset + buffer.len()].copy_from_slice(buffer);
        Ok(())
    }

    async fn attributes(&mut self) -> Result<RemoteAttributes, TransportError> {
        Ok(RemoteAttributes {
            is_directory: false,
            size: self.content.len() as u64,
            modified: Some(1_700_000_000),
        })
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if !self.closed {
            self.closed = true;
            self.state.open_files.fetch_sub(1, Ordering::SeqCst);
            if self.writable {
                let content = std::mem::take(&mut self.content);
                self.state.add_file(&self.path, content);
            }
        }
        Ok(())
    }
}

impl Drop for MemoryFile {
    fn drop(&mut self) {
        if !self.closed {
            self.state.open_files.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
