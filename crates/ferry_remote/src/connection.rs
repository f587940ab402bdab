//! Connection handles.

use crate::auth::{Auth, AuthKey};
use crate::error::ConnectionError;
use crate::transport::{Connector, Transport};
use core::sync::atomic::{AtomicUsize, Ordering};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

/// A shared handle to a remote session.
///
/// Resources hold an `Arc<Connection>` obtained from the
/// [`ConnectionCache`](crate::ConnectionCache); they never dial on their own.
/// The handle keeps its identity for its whole life: when the underlying
/// session is closed (explicitly or by the remote side) the next operation,
/// or [`ensure_open`](Self::ensure_open), dials again and swaps the new
/// session in behind the same handle.
///
/// Operations are serialized: a transfer holds the session lock until it
/// completes, so concurrent conversions against one host queue up here.
pub struct Connection {
    key: AuthKey,
    auth: Auth,
    connector: Arc<dyn Connector>,
    session: Mutex<Option<Box<dyn Transport>>>,
    dials: AtomicUsize,
}

impl core::fmt::Debug for Connection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Connection")
            .field("key", &self.key)
            .field("connector", &self.connector.name())
            .field("dials", &self.dial_count())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Wraps an already-dialed session.
    pub(crate) fn from_session(
        key: AuthKey,
        auth: Auth,
        connector: Arc<dyn Connector>,
        session: Box<dyn Transport>,
    ) -> Self {
        Self {
            key,
            auth,
            connector,
            session: Mutex::new(Some(session)),
            dials: AtomicUsize::new(1),
        }
    }

    /// Returns the canonical key this connection is cached under.
    #[must_use]
    pub fn key(&self) -> &AuthKey {
        &self.key
    }

    /// Returns the auth fields the connection was first opened with.
    #[must_use]
    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    /// Returns how many sessions this handle has dialed.
    #[must_use]
    pub fn dial_count(&self) -> usize {
        self.dials.load(Ordering::Relaxed)
    }

    /// Returns true if the current session is open and active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.session
            .lock()
            .as_ref()
            .is_some_and(|session| session.is_active())
    }

    /// Closes the current session. Idempotent.
    pub fn close(&self) {
        if let Some(mut session) = self.session.lock().take() {
            session.close();
            tracing::debug!(key = %self.key, "connection closed");
        }
    }

    /// Re-dials if the session is closed or no longer active.
    ///
    /// # Errors
    ///
    /// Returns the connector's error if dialing fails. The handle stays
    /// closed and the next call tries again.
    pub fn ensure_open(&self) -> Result<(), ConnectionError> {
        let mut session = self.session.lock();
        self.open_locked(&mut session)?;
        Ok(())
    }

    fn open_locked<'a>(
        &self,
        session: &'a mut Option<Box<dyn Transport>>,
    ) -> Result<&'a mut Box<dyn Transport>, ConnectionError> {
        if session.as_ref().is_some_and(|s| !s.is_active())
            && let Some(mut stale) = session.take()
        {
            stale.close();
        }
        if session.is_none() {
            tracing::debug!(key = %self.key, connector = self.connector.name(), "re-dialing");
            let fresh = self.connector.dial(&self.auth)?;
            self.dials.fetch_add(1, Ordering::Relaxed);
            *session = Some(fresh);
        }
        session.as_mut().ok_or(ConnectionError::Closed)
    }

    /// Runs `op` against an open session, dialing first if needed.
    ///
    /// # Errors
    ///
    /// Returns dial errors or whatever `op` returns.
    pub fn with_transport<R>(
        &self,
        op: impl FnOnce(&mut dyn Transport) -> Result<R, ConnectionError>,
    ) -> Result<R, ConnectionError> {
        let mut session = self.session.lock();
        let transport = self.open_locked(&mut session)?;
        op(transport.as_mut())
    }

    /// Uploads a local file.
    ///
    /// # Errors
    ///
    /// Propagates transport failures.
    pub fn put(&self, local: &Path, remote: &str) -> Result<(), ConnectionError> {
        self.with_transport(|t| t.put(local, remote))
    }

    /// Downloads a remote file.
    ///
    /// # Errors
    ///
    /// Propagates transport failures.
    pub fn get(&self, remote: &str, local: &Path) -> Result<(), ConnectionError> {
        self.with_transport(|t| t.get(remote, local))
    }

    /// Reads a remote file.
    ///
    /// # Errors
    ///
    /// Propagates transport failures.
    pub fn read(&self, remote: &str) -> Result<Vec<u8>, ConnectionError> {
        self.with_transport(|t| t.read(remote))
    }

    /// Writes a remote file.
    ///
    /// # Errors
    ///
    /// Propagates transport failures.
    pub fn write(&self, remote: &str, contents: &[u8]) -> Result<(), ConnectionError> {
        self.with_transport(|t| t.write(remote, contents))
    }

    /// Deletes a remote file.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::NotFound`] when the file is absent.
    pub fn remove(&self, remote: &str) -> Result<(), ConnectionError> {
        self.with_transport(|t| t.remove(remote))
    }

    /// Returns true if the remote path exists.
    ///
    /// # Errors
    ///
    /// Propagates transport failures.
    pub fn exists(&self, remote: &str) -> Result<bool, ConnectionError> {
        self.with_transport(|t| t.exists(remote))
    }

    /// Lists a remote directory.
    ///
    /// # Errors
    ///
    /// Propagates transport failures.
    pub fn list(&self, dir: &str) -> Result<Vec<String>, ConnectionError> {
        self.with_transport(|t| t.list(dir))
    }

    /// Creates a remote directory.
    ///
    /// # Errors
    ///
    /// Propagates transport failures.
    pub fn create_dir(&self, dir: &str) -> Result<(), ConnectionError> {
        self.with_transport(|t| t.create_dir(dir))
    }

    /// Removes an empty remote directory.
    ///
    /// # Errors
    ///
    /// Propagates transport failures, including a non-empty directory.
    pub fn remove_dir(&self, dir: &str) -> Result<(), ConnectionError> {
        self.with_transport(|t| t.remove_dir(dir))
    }
}
