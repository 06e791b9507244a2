//! Config Directory Error Hierarchy
//!
//! Errors are split by layer: what a directory caller can observe
//! ([`Error`]), what the coordination service reports ([`CoordinationError`])
//! and payload encoding failures ([`SerializationError`]).

use std::time::Duration;

use config::ConfigError;

use crate::ConnectionState;
use crate::EntityKind;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The directory did not reach `Connected` within the bounded wait
    #[error("Directory not connected (waited {waited:?})")]
    NotConnected { waited: Duration },

    /// Requested namespace or table is absent from the directory
    #[error("{kind} not found: {key}")]
    NotFound { kind: EntityKind, key: String },

    /// Optimistic concurrency check failed
    #[error("Write conflict on {kind} {key} (base version: {expected}, current version: {actual:?})")]
    WriteConflict {
        kind: EntityKind,
        key: String,
        expected: u64,
        actual: Option<u64>,
    },

    /// Operation attempted after `stop()`
    #[error("Directory is closed")]
    Closed,

    /// `start()` may only be called once per instance
    #[error("Directory already started")]
    AlreadyStarted,

    /// Illegal connection state machine edge
    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: ConnectionState,
        to: ConnectionState,
    },

    /// Malformed input from the caller
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Coordination service failures
    #[error(transparent)]
    Coordination(#[from] CoordinationError),

    /// Payload encode/decode failures
    #[error(transparent)]
    Serialization(#[from] SerializationError),

    /// Unrecoverable failures
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoordinationError {
    /// The session is gone; a fresh connect and full reload is required
    #[error("Coordination session expired")]
    SessionExpired,

    /// Transient loss of connectivity, the session may survive
    #[error("Coordination connection lost")]
    ConnectionLoss,

    /// Conditional write precondition failed
    #[error("Version mismatch at {path} (expected: {expected}, actual: {actual:?})")]
    VersionMismatch {
        path: String,
        expected: String,
        actual: Option<u64>,
    },

    /// Service cannot be reached at all
    #[error("Coordination service unavailable: {0}")]
    Unavailable(String),

    /// A single coordination operation exceeded its deadline
    #[error("Coordination operation timed out after {0:?}")]
    Timeout(Duration),

    /// The client handle was closed locally
    #[error("Coordination client closed")]
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    #[error("Bincode serialization failed: {0}")]
    Bincode(#[from] bincode::Error),
}

impl CoordinationError {
    /// Whether the failure is a connectivity problem the session driver
    /// recovers from on its own
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CoordinationError::SessionExpired
                | CoordinationError::ConnectionLoss
                | CoordinationError::Unavailable(_)
                | CoordinationError::Timeout(_)
        )
    }
}

impl Error {
    /// Whether the caller may retry the same request later
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::NotConnected { .. } => true,
            Error::Coordination(e) => e.is_transient(),
            _ => false,
        }
    }
}

// ============== Conversion Implementations ============== //
impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Serialization(SerializationError::Bincode(e))
    }
}
