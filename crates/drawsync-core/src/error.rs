//! Error types for synchronization, host access and configuration.

use crate::snapshot::ObjectKind;
use thiserror::Error;

/// Errors raised by the synchronization engine.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The target session's execution context no longer accepts work.
    #[error("session {key} is unreachable")]
    Unreachable {
        /// Registry key of the target session.
        key: String,
    },

    /// The host object has a kind outside the supported set.
    #[error("object {name:?} has an unsupported kind")]
    UnsupportedKind {
        /// Name of the offending object (may be synthesized).
        name: String,
    },

    /// The host rejected an operation.
    #[error(transparent)]
    Host(#[from] HostError),
}

/// Errors reported by a chart host.
#[derive(Debug, Error, PartialEq)]
pub enum HostError {
    #[error("object not found: {0}")]
    NotFound(String),

    /// An object with the same name exists but is of a different kind.
    #[error("object {name:?} is a {found:?}, not a {expected:?}")]
    KindMismatch {
        name: String,
        expected: ObjectKind,
        found: ObjectKind,
    },

    #[error("an object named {0:?} already exists")]
    DuplicateName(String),

    /// The object exists but its kind is not one this crate can edit.
    #[error("object {0:?} has an unsupported kind")]
    Unsupported(String),
}

/// Errors while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Result type for engine operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Result type for host operations.
pub type HostResult<T> = Result<T, HostError>;
