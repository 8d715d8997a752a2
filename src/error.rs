//! Error types used by the routevisor runtime, its protocol and its collaborators.
//!
//! - [`RuntimeError`] failures of the fleet runtime itself (shutdown, wiring).
//! - [`ConfigError`] configuration loading and validation.
//! - [`ProtocolError`] message content that cannot be encoded or parsed.
//! - [`DirectoryError`] name registration and message delivery.
//! - [`SolveError`] failures reported by a [`RouteSolver`](crate::RouteSolver).
//! - [`SourceError`] failures of a [`BatchSource`](crate::BatchSource).
//!
//! Every enum exposes `as_label()`, a short stable snake_case label for logs.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// # Errors produced by the fleet runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some actors were still running and got aborted.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}; forcing termination")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of the actors that did not stop in time.
        stuck: Vec<String>,
    },

    /// The configuration was rejected before the fleet started.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An actor could not be registered in the directory.
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// The coordinator is no longer running.
    #[error("coordinator is not running")]
    CoordinatorGone,

    /// The fleet has stopped and accepts no new actors.
    #[error("fleet is not running")]
    FleetStopped,
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use routevisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::Config(e) => e.as_label(),
            RuntimeError::Directory(e) => e.as_label(),
            RuntimeError::CoordinatorGone => "runtime_coordinator_gone",
            RuntimeError::FleetStopped => "runtime_fleet_stopped",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck actors={stuck:?}")
            }
            other => other.to_string(),
        }
    }
}

/// # Errors produced while loading or validating [`Config`](crate::Config).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::Io { .. } => "config_io",
            ConfigError::Parse(_) => "config_parse",
            ConfigError::Invalid(_) => "config_invalid",
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        ConfigError::Invalid(msg.into())
    }
}

/// # Errors produced by the message codec.
///
/// Parsing is fail-closed: anything that is not exactly one of the known
/// shapes is rejected, and the receiving actor drops the message.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("unrecognized message content: {content:?}")]
    UnknownMessage { content: String },

    #[error("missing field {field}")]
    MissingField { field: &'static str },

    #[error("duplicate field {field}")]
    DuplicateField { field: String },

    #[error("unexpected field {field}")]
    UnexpectedField { field: String },

    #[error("segment without a key: {segment:?}")]
    MalformedSegment { segment: String },

    #[error("invalid value for {field}: {value:?}")]
    InvalidValue { field: &'static str, value: String },

    #[error("list lengths differ: {detail}")]
    LengthMismatch { detail: String },

    #[error("{field} contains a reserved delimiter: {value:?}")]
    ReservedCharacter { field: &'static str, value: String },

    #[error("{kind} must be sent as {expected}, got {actual}")]
    PerformativeMismatch {
        kind: &'static str,
        expected: &'static str,
        actual: &'static str,
    },
}

impl ProtocolError {
    pub fn as_label(&self) -> &'static str {
        match self {
            ProtocolError::UnknownMessage { .. } => "protocol_unknown_message",
            ProtocolError::MissingField { .. } => "protocol_missing_field",
            ProtocolError::DuplicateField { .. } => "protocol_duplicate_field",
            ProtocolError::UnexpectedField { .. } => "protocol_unexpected_field",
            ProtocolError::MalformedSegment { .. } => "protocol_malformed_segment",
            ProtocolError::InvalidValue { .. } => "protocol_invalid_value",
            ProtocolError::LengthMismatch { .. } => "protocol_length_mismatch",
            ProtocolError::ReservedCharacter { .. } => "protocol_reserved_character",
            ProtocolError::PerformativeMismatch { .. } => "protocol_performative_mismatch",
        }
    }
}

/// # Errors produced by the [`Directory`](crate::Directory).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("name {name:?} is already registered")]
    DuplicateName { name: String },

    #[error("no agent named {name:?}")]
    NotFound { name: String },

    #[error("mailbox of {name:?} is full")]
    MailboxFull { name: String },

    #[error("mailbox of {name:?} is closed")]
    MailboxClosed { name: String },
}

impl DirectoryError {
    pub fn as_label(&self) -> &'static str {
        match self {
            DirectoryError::DuplicateName { .. } => "directory_duplicate_name",
            DirectoryError::NotFound { .. } => "directory_not_found",
            DirectoryError::MailboxFull { .. } => "directory_mailbox_full",
            DirectoryError::MailboxClosed { .. } => "directory_mailbox_closed",
        }
    }
}

/// # Errors reported by a route solver.
///
/// A solver error aborts the round and the batch is discarded.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolveError {
    /// The plan refers to something the solver was not given.
    #[error("invalid plan: {reason}")]
    InvalidPlan { reason: String },

    #[error("solver failed: {reason}")]
    Failed { reason: String },
}

impl SolveError {
    pub fn as_label(&self) -> &'static str {
        match self {
            SolveError::InvalidPlan { .. } => "solve_invalid_plan",
            SolveError::Failed { .. } => "solve_failed",
        }
    }
}

/// # Errors reported by a batch source.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SourceError {
    /// Transport-level failure (connection refused, timeout, ...).
    #[error("transport error: {reason}")]
    Transport { reason: String },

    /// The remote side answered with an unexpected status.
    #[error("unexpected status {status}")]
    Status { status: u16 },

    /// The payload could not be decoded.
    #[error("decode error: {reason}")]
    Decode { reason: String },

    #[error("i/o error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The source no longer produces batches.
    #[error("source closed")]
    Closed,
}

impl SourceError {
    pub fn as_label(&self) -> &'static str {
        match self {
            SourceError::Transport { .. } => "source_transport",
            SourceError::Status { .. } => "source_status",
            SourceError::Decode { .. } => "source_decode",
            SourceError::Io { .. } => "source_io",
            SourceError::Closed => "source_closed",
        }
    }

    /// Whether polling again later can succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SourceError::Closed)
    }
}
