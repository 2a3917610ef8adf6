//! Error type shared by storage, registry and pipeline code.

use thiserror::Error;

/// Errors that can occur in AutoOp operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing blob, metadata record or artifact.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed payload, bad split ratio, unknown type tag and the like.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation called in the wrong lifecycle state (predict before fit, read before data).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Corrupt, unversioned or undecodable persisted data.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Design matrix is not invertible in closed-form regression.
    #[error("Singular matrix: {0}")]
    SingularMatrix(String),

    /// Unrecognized model or metric identifier.
    #[error("Unknown name: {0}")]
    UnknownName(String),

    /// Filesystem failure other than a missing path.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Returns true for the NotFound variant.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
