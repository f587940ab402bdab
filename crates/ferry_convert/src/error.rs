//! Engine and codec errors.

use ferry_remote::ConnectionError;
use ferry_resource::{FormatId, ResourceError, ResourceType};
use thiserror::Error;

/// Boxed error returned by converter, drop and discover routines.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by a [`Codec`](crate::Codec).
#[derive(Debug, Error)]
pub enum CodecError {
    /// The input is not valid for the format.
    #[error("invalid {format} input{}: {message}", .line.map(|l| format!(" at line {l}")).unwrap_or_default())]
    Syntax {
        /// Format being decoded.
        format: FormatId,
        /// 1-based line of the problem, when known.
        line: Option<usize>,
        /// Parser message.
        message: String,
    },

    /// A value cannot be represented in the format.
    #[error("cannot encode as {format}: {message}")]
    Unrepresentable {
        /// Format being encoded.
        format: FormatId,
        /// What could not be represented.
        message: String,
    },

    /// A codec parameter has an invalid value.
    #[error("invalid parameter '{name}': {message}")]
    Parameter {
        /// Parameter name.
        name: String,
        /// What was wrong with it.
        message: String,
    },
}

/// Caller-facing errors.
///
/// Lower-level errors keep their category when converted: a
/// [`ResourceError::UnknownFormat`] becomes [`EngineError::UnknownFormat`],
/// a [`ConnectionError`] becomes [`EngineError::Connection`].
#[derive(Debug, Error)]
pub enum EngineError {
    /// The identifier could not be parsed. Fix the input.
    #[error("malformed resource identifier '{uri}': {reason}")]
    MalformedUri {
        /// The offending identifier.
        uri: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The remote side could not be reached. Safe to retry.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// No backend handles the extension, hint or type.
    #[error("unknown format: {0}")]
    UnknownFormat(String),

    /// The identifier and overrides contradict each other.
    #[error("ambiguous resource: {0}")]
    AmbiguousResource(String),

    /// The converter graph has no route between the two types.
    #[error("no conversion path from {from} to {to}")]
    NoConversionPath {
        /// Source type.
        from: ResourceType,
        /// Requested target type.
        to: ResourceType,
    },

    /// A converter failed. Temporaries from earlier steps were dropped.
    #[error("conversion failed in edge '{edge}': {source}")]
    ConversionFailure {
        /// Name of the failing edge.
        edge: String,
        /// The converter's error.
        #[source]
        source: BoxError,
    },

    /// Local filesystem access outside a converter failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Creates an [`UnknownFormat`](Self::UnknownFormat) error.
    pub fn unknown_format(what: impl Into<String>) -> Self {
        Self::UnknownFormat(what.into())
    }

    /// Creates an [`AmbiguousResource`](Self::AmbiguousResource) error.
    pub fn ambiguous(why: impl Into<String>) -> Self {
        Self::AmbiguousResource(why.into())
    }

    /// Returns true if retrying the operation may succeed.
    ///
    /// Connection failures are transient wherever they occur, including
    /// inside a converter.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection(err) => err.is_transient(),
            Self::ConversionFailure { source, .. } => {
                let mut cause: Option<&(dyn std::error::Error + 'static)> = Some(source.as_ref());
                while let Some(err) = cause {
                    if let Some(conn) = err.downcast_ref::<ConnectionError>() {
                        return conn.is_transient();
                    }
                    if let Some(engine) = err.downcast_ref::<EngineError>() {
                        return engine.is_transient();
                    }
                    cause = err.source();
                }
                false
            }
            _ => false,
        }
    }
}

impl From<ResourceError> for EngineError {
    fn from(err: ResourceError) -> Self {
        match err {
            ResourceError::MalformedUri { uri, reason } => Self::MalformedUri { uri, reason },
            ResourceError::UnknownFormat(what) => Self::UnknownFormat(what),
            ResourceError::AmbiguousResource(why) => Self::AmbiguousResource(why),
            ResourceError::Connection(err) => Self::Connection(err),
            ResourceError::Io(err) => Self::Io(err),
        }
    }
}
