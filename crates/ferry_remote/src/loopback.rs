//! Loopback transport.
//!
//! Serves "remote" paths from the local filesystem. With the default root of
//! `/`, a remote path names exactly the same file as the local path, which is
//! what a session to `localhost` sees. With a custom root, remote paths are
//! sandboxed beneath it.
//!
//! The connector also carries a few knobs for exercising failure handling:
//! [`refuse`](LoopbackConnector::refuse) makes dials to a host fail, and
//! [`sever_all`](LoopbackConnector::sever_all) marks every live session as
//! dropped by the remote side.

use crate::auth::Auth;
use crate::error::ConnectionError;
use crate::transport::{Connector, Transport};
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use hashbrown::HashSet;
use parking_lot::Mutex;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Connector producing [`Transport`]s backed by the local filesystem.
#[derive(Debug)]
pub struct LoopbackConnector {
    root: PathBuf,
    refused: Mutex<HashSet<String>>,
    dials: AtomicUsize,
    epoch: Arc<AtomicU64>,
}

impl Default for LoopbackConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackConnector {
    /// Creates a connector whose remote paths are local paths.
    #[must_use]
    pub fn new() -> Self {
        Self::with_root("/")
    }

    /// Creates a connector serving remote paths from beneath `root`.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            refused: Mutex::new(HashSet::new()),
            dials: AtomicUsize::new(0),
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns the local directory remote paths resolve under.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Makes future dials to `hostname` fail as unreachable.
    pub fn refuse(&self, hostname: &str) {
        self.refused.lock().insert(hostname.to_ascii_lowercase());
    }

    /// Lets dials to `hostname` succeed again.
    pub fn accept(&self, hostname: &str) {
        self.refused.lock().remove(&hostname.to_ascii_lowercase());
    }

    /// Marks every session dialed so far as closed by the remote side.
    pub fn sever_all(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// Returns the number of successful dials.
    #[must_use]
    pub fn dial_count(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    /// Maps a remote path to the local file serving it.
    #[must_use]
    pub fn resolve(&self, remote: &str) -> PathBuf {
        resolve_under(&self.root, remote)
    }
}

fn resolve_under(root: &Path, remote: &str) -> PathBuf {
    if root == Path::new("/") {
        PathBuf::from(remote)
    } else {
        root.join(remote.trim_start_matches('/'))
    }
}

impl Connector for LoopbackConnector {
    fn dial(&self, auth: &Auth) -> Result<Box<dyn Transport>, ConnectionError> {
        let host = auth.hostname().trim().to_ascii_lowercase();
        if host.is_empty() || self.refused.lock().contains(&host) {
            return Err(ConnectionError::unreachable(auth.hostname()));
        }
        self.dials.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(LoopbackTransport {
            root: self.root.clone(),
            epoch: Arc::clone(&self.epoch),
            born: self.epoch.load(Ordering::SeqCst),
            open: true,
        }))
    }

    fn name(&self) -> &str {
        "loopback"
    }
}

struct LoopbackTransport {
    root: PathBuf,
    epoch: Arc<AtomicU64>,
    born: u64,
    open: bool,
}

impl LoopbackTransport {
    fn path(&self, remote: &str) -> Result<PathBuf, ConnectionError> {
        if !self.is_active() {
            return Err(ConnectionError::Closed);
        }
        Ok(resolve_under(&self.root, remote))
    }
}

fn not_found(remote: &str) -> impl FnOnce(std::io::Error) -> ConnectionError + '_ {
    move |err| {
        if err.kind() == ErrorKind::NotFound {
            ConnectionError::not_found(remote)
        } else {
            ConnectionError::Io(err)
        }
    }
}

impl Transport for LoopbackTransport {
    fn is_active(&self) -> bool {
        self.open && self.epoch.load(Ordering::SeqCst) == self.born
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn put(&mut self, local: &Path, remote: &str) -> Result<(), ConnectionError> {
        let target = self.path(remote)?;
        if target.as_path() != local {
            fs::copy(local, &target)?;
        }
        Ok(())
    }

    fn get(&mut self, remote: &str, local: &Path) -> Result<(), ConnectionError> {
        let source = self.path(remote)?;
        if source.as_path() != local {
            fs::copy(&source, local).map_err(not_found(remote))?;
        }
        Ok(())
    }

    fn read(&mut self, remote: &str) -> Result<Vec<u8>, ConnectionError> {
        let source = self.path(remote)?;
        fs::read(source).map_err(not_found(remote))
    }

    fn write(&mut self, remote: &str, contents: &[u8]) -> Result<(), ConnectionError> {
        let target = self.path(remote)?;
        fs::write(target, contents)?;
        Ok(())
    }

    fn remove(&mut self, remote: &str) -> Result<(), ConnectionError> {
        let target = self.path(remote)?;
        fs::remove_file(target).map_err(not_found(remote))
    }

    fn exists(&mut self, remote: &str) -> Result<bool, ConnectionError> {
        Ok(self.path(remote)?.exists())
    }

    fn list(&mut self, dir: &str) -> Result<Vec<String>, ConnectionError> {
        let dir_path = self.path(dir)?;
        let mut names = Vec::new();
        for entry in fs::read_dir(dir_path).map_err(not_found(dir))? {
            let entry = entry?;
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type()?.is_dir() {
                name.push('/');
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }

    fn create_dir(&mut self, dir: &str) -> Result<(), ConnectionError> {
        fs::create_dir_all(self.path(dir)?)?;
        Ok(())
    }

    fn remove_dir(&mut self, dir: &str) -> Result<(), ConnectionError> {
        let target = self.path(dir)?;
        fs::remove_dir(target).map_err(not_found(dir))
    }
}
