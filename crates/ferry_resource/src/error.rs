//! Error types for resource resolution.

use ferry_remote::ConnectionError;
use thiserror::Error;

/// Errors raised while parsing identifiers or touching resource locations.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// The identifier matches neither the local nor the remote grammar.
    #[error("malformed resource identifier '{uri}': {reason}")]
    MalformedUri {
        /// The offending identifier.
        uri: String,
        /// What was wrong with it.
        reason: String,
    },

    /// No backend is registered for the extension or type hint.
    #[error("unknown format: {0}")]
    UnknownFormat(String),

    /// The identifier and overrides contradict each other.
    #[error("ambiguous resource: {0}")]
    AmbiguousResource(String),

    /// The remote side could not be reached or failed an operation.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Local filesystem access failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ResourceError {
    /// Creates a [`MalformedUri`](Self::MalformedUri) error.
    pub fn malformed(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedUri {
            uri: uri.into(),
            reason: reason.into(),
        }
    }

    /// Creates an [`UnknownFormat`](Self::UnknownFormat) error.
    pub fn unknown_format(what: impl Into<String>) -> Self {
        Self::UnknownFormat(what.into())
    }

    /// Creates an [`AmbiguousResource`](Self::AmbiguousResource) error.
    pub fn ambiguous(why: impl Into<String>) -> Self {
        Self::AmbiguousResource(why.into())
    }
}
