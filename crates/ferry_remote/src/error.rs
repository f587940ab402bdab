//! Error types for remote transports.

use thiserror::Error;

/// Errors raised while establishing or using a remote connection.
///
/// Dial failures ([`Unreachable`](Self::Unreachable),
/// [`AuthRejected`](Self::AuthRejected)) are transient from the cache's point
/// of view: they never leave a broken entry behind, so the next
/// [`ConnectionCache::connect`](crate::ConnectionCache::connect) retries.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The remote host could not be reached.
    #[error("host unreachable: {0}")]
    Unreachable(String),

    /// The remote host refused the supplied credentials.
    #[error("authentication rejected for {0}")]
    AuthRejected(String),

    /// The session was closed and could not be used.
    #[error("connection closed")]
    Closed,

    /// The remote path does not exist.
    #[error("remote path not found: {0}")]
    NotFound(String),

    /// A transport command exited unsuccessfully.
    #[error("`{program}` failed with status {status}: {stderr}")]
    Command {
        /// The program that was run.
        program: String,
        /// Exit status, or -1 when terminated by a signal.
        status: i32,
        /// Captured standard error.
        stderr: String,
    },

    /// Local I/O failed while talking to the transport.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConnectionError {
    /// Creates an [`Unreachable`](Self::Unreachable) error.
    pub fn unreachable(host: impl Into<String>) -> Self {
        Self::Unreachable(host.into())
    }

    /// Creates a [`NotFound`](Self::NotFound) error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Returns true if the error means the remote artifact is absent.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Io(err) => err.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// Returns true if retrying the dial may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Closed)
    }
}
