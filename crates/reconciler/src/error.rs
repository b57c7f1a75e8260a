//! Error types for the reconciler crate.

use thiserror::Error;

/// Result type alias for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Reconciler error types.
///
/// Validation errors are raised before any network call. Connectivity errors
/// are recovered from while probing; every other variant aborts the pass.
#[derive(Debug, Error)]
pub enum Error {
    /// A member declaration failed normalization.
    #[error("invalid member definition: {reason}")]
    InvalidMember { reason: String },

    /// The declared replica set is inconsistent.
    #[error("invalid replica set '{set}': {reason}")]
    InvalidDesiredState { set: String, reason: String },

    /// The command channel could not reach a host.
    #[error("cannot connect to {host}: {reason}")]
    ConnectionFailed { host: String, reason: String },

    /// The command output could not be decoded.
    #[error("invalid response: {reason}")]
    InvalidResponse { reason: String },

    /// A declared host runs without replication support.
    #[error(
        "can't configure replicaset {set}, host {host} is not supposed to be part of a replicaset"
    )]
    NotReplicaCapable { set: String, host: String },

    /// A declared host already belongs to another replica set.
    #[error(
        "can't configure replicaset {set}, host {host} is already part of \
         another replicaset ({foreign})"
    )]
    ForeignReplicaSet {
        set: String,
        host: String,
        foreign: String,
    },

    /// None of the declared members answered.
    #[error("cannot connect to any member of replicaset {set}")]
    NoReachableMembers { set: String },

    /// There is nothing to initiate.
    #[error("replicaset {set} declares no members to initiate")]
    NoMembers { set: String },

    /// No alive member reports a primary.
    #[error("cannot find primary for replicaset {set}")]
    NoPrimary { set: String },

    /// `rs.initiate()` answered with a not-ok document.
    #[error("rs.initiate() failed for replicaset {set}: {message}")]
    InitiateFailed { set: String, message: String },

    /// `rs.reconfig()` answered with a not-ok document.
    #[error("rs.reconfig() failed for replicaset {set}: {message}")]
    ReconfigFailed { set: String, message: String },

    /// The initiated host never became primary.
    #[error(
        "rs.initiate() failed for replicaset {set}: host {host} didn't become \
         primary after {attempts} checks"
    )]
    PrimaryTimeout {
        set: String,
        host: String,
        attempts: u32,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an invalid member error.
    pub fn invalid_member(reason: impl Into<String>) -> Self {
        Self::InvalidMember {
            reason: reason.into(),
        }
    }

    /// Create an invalid desired state error.
    pub fn invalid_desired_state(set: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDesiredState {
            set: set.into(),
            reason: reason.into(),
        }
    }

    /// Create a connection failed error.
    pub fn connection_failed(host: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            host: host.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid response error.
    pub fn invalid_response(reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            reason: reason.into(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Check if this error is worth another attempt at the transport level.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectionFailed { .. })
    }

    /// Check if this error means the host could not be talked to at all.
    ///
    /// The prober classifies such hosts as dead instead of failing the pass.
    pub const fn is_unreachable(&self) -> bool {
        matches!(self, Self::ConnectionFailed { .. } | Self::Io(_))
    }
}
