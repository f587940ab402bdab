//! The secure-transport boundary.
//!
//! Ferry does not speak any wire protocol itself. A [`Connector`] knows how to
//! open a session to a host, and the resulting [`Transport`] performs the
//! handful of file operations the engine needs. Concrete implementations:
//!
//! - [`SshConnector`](crate::SshConnector) drives the system OpenSSH client.
//! - [`LoopbackConnector`](crate::LoopbackConnector) maps remote paths onto a
//!   local directory and is used for tests and single-host setups.

use crate::auth::Auth;
use crate::error::ConnectionError;
use std::path::Path;

/// One live session to a remote host.
///
/// A transport is driven by a single [`Connection`](crate::Connection) which
/// serializes access, so methods take `&mut self`.
pub trait Transport: Send + 'static {
    /// Returns true while the session can carry requests.
    fn is_active(&self) -> bool;

    /// Closes the session. Closing an already-closed session is a no-op.
    fn close(&mut self);

    /// Uploads a local file to `remote`, replacing it if present.
    fn put(&mut self, local: &Path, remote: &str) -> Result<(), ConnectionError>;

    /// Downloads `remote` into a local file, replacing it if present.
    fn get(&mut self, remote: &str, local: &Path) -> Result<(), ConnectionError>;

    /// Reads the whole remote file.
    fn read(&mut self, remote: &str) -> Result<Vec<u8>, ConnectionError>;

    /// Writes the whole remote file.
    fn write(&mut self, remote: &str, contents: &[u8]) -> Result<(), ConnectionError>;

    /// Deletes a remote file.
    ///
    /// Returns [`ConnectionError::NotFound`] when the file is already absent.
    fn remove(&mut self, remote: &str) -> Result<(), ConnectionError>;

    /// Returns true if the remote path exists.
    fn exists(&mut self, remote: &str) -> Result<bool, ConnectionError>;

    /// Lists the entry names (not paths) of a remote directory, sorted.
    ///
    /// Subdirectory names carry a trailing `/`.
    fn list(&mut self, dir: &str) -> Result<Vec<String>, ConnectionError>;

    /// Creates a remote directory and its parents.
    fn create_dir(&mut self, dir: &str) -> Result<(), ConnectionError>;

    /// Removes an empty remote directory.
    fn remove_dir(&mut self, dir: &str) -> Result<(), ConnectionError>;
}

/// Opens transports.
///
/// Connectors are shared by every connection a cache creates, so they must
/// be thread-safe.
pub trait Connector: Send + Sync + 'static {
    /// Establishes a new session.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Unreachable`] or
    /// [`ConnectionError::AuthRejected`] when no session can be opened.
    fn dial(&self, auth: &Auth) -> Result<Box<dyn Transport>, ConnectionError>;

    /// Short name used in logs.
    fn name(&self) -> &str {
        core::any::type_name::<Self>()
    }
}
