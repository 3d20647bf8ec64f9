//! Error types for the simlink session client.
//!
//! Only declaration problems, configuration problems and lifecycle misuse
//! are ever returned to the caller. [`ConnectionError`] and [`DecodeError`]
//! are shared by providers, schemas and the background loop, which absorbs
//! them.

use std::path::PathBuf;

use thiserror::Error;

use crate::provider::{DataType, DefinitionId, EventId};

/// The main error type for all simlink operations.
#[derive(Error, Debug)]
pub enum SimlinkError {
    /// A schema declaration is missing required metadata.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// An event set declaration is missing required metadata.
    #[error("event error: {0}")]
    Event(#[from] EventError),

    /// Client configuration could not be loaded or is invalid.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// `start()` was called on a client whose loop is already running.
    #[error("the connection loop has already been started")]
    AlreadyStarted,

    /// The client has been disposed and accepts no further work.
    #[error("the client has been disposed")]
    Disposed,

    /// The background connection thread could not be spawned.
    #[error("failed to spawn connection thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Errors raised when a schema declaration is rejected at registration time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The schema has no name.
    #[error("schema {id} has an empty name")]
    MissingName {
        /// The definition id of the rejected schema.
        id: DefinitionId,
    },

    /// The sampling interval is zero.
    #[error("schema '{schema}' has a zero sampling interval")]
    ZeroInterval {
        /// The schema name.
        schema: &'static str,
    },

    /// The schema declares no sampled fields at all.
    #[error("schema '{schema}' declares no sampled fields")]
    NoSampledFields {
        /// The schema name.
        schema: &'static str,
    },

    /// A sampled field carries an empty protocol name.
    #[error("field '{member}' of schema '{schema}' has an empty sample name")]
    MissingFieldName {
        /// The schema name.
        schema: &'static str,
        /// The struct member the field describes.
        member: &'static str,
    },

    /// A sampled field carries a unit annotation that is empty.
    #[error("field '{member}' of schema '{schema}' has an empty unit")]
    EmptyUnit {
        /// The schema name.
        schema: &'static str,
        /// The struct member the field describes.
        member: &'static str,
    },
}

/// Errors raised when an event set declaration is rejected at registration time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    /// The set declares no members.
    #[error("event set '{set}' declares no members")]
    Empty {
        /// The event set name.
        set: &'static str,
    },

    /// A declared member has no entry in the event name table.
    #[error("event {event} of set '{set}' has no protocol event name")]
    MissingEventName {
        /// The event set name.
        set: &'static str,
        /// The id of the unmapped member.
        event: EventId,
    },

    /// A declared member maps to an empty protocol event name.
    #[error("event {event} of set '{set}' maps to an empty protocol event name")]
    EmptyEventName {
        /// The event set name.
        set: &'static str,
        /// The id of the offending member.
        event: EventId,
    },
}

/// Errors that can occur when loading or validating a [`ClientConfig`](crate::config::ClientConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file '{}': {source}", path.display())]
    Read {
        /// The config file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The config document is not valid JSON for [`ClientConfig`](crate::config::ClientConfig).
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A config value is out of range.
    #[error("invalid config value for '{field}': {reason}")]
    Invalid {
        /// The offending field.
        field: &'static str,
        /// Why the value is invalid.
        reason: String,
    },
}

/// Transient failures talking to the simulation host.
///
/// These never reach callers of [`SimClient`](crate::client::SimClient); the
/// connection loop logs them, drops the connection and retries after the
/// configured backoff.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// The host could not be reached or refused the session.
    #[error("failed to open session '{client_name}': {reason}")]
    Open {
        /// The client name the session was opened under.
        client_name: String,
        /// Provider-supplied reason.
        reason: String,
    },

    /// The session was already closed when an operation was attempted.
    #[error("session is closed")]
    Closed,

    /// The host rejected a call made on an open session.
    #[error("host rejected {operation}: {reason}")]
    Rejected {
        /// The provider operation that failed.
        operation: &'static str,
        /// Provider-supplied reason.
        reason: String,
    },

    /// Receiving messages from the host failed.
    #[error("receive failed: {reason}")]
    Receive {
        /// Provider-supplied reason.
        reason: String,
    },

    /// Code running on the loop thread panicked during the session.
    #[error("session panicked: {reason}")]
    Panicked {
        /// The panic message, if it carried one.
        reason: String,
    },
}

/// Errors that can occur when turning a raw [`Sample`](crate::provider::Sample)
/// into a schema value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// The sample carries fewer values than the schema expects.
    #[error("sample has {actual} values, expected at least {expected}")]
    TooShort {
        /// Number of values the schema reads.
        expected: usize,
        /// Number of values in the sample.
        actual: usize,
    },

    /// A value has a different data type than the schema declared.
    #[error("value {index} is {actual:?}, expected {expected:?}")]
    TypeMismatch {
        /// Position of the value in the sample.
        index: usize,
        /// The declared data type.
        expected: DataType,
        /// The data type actually received.
        actual: DataType,
    },
}

/// Type alias for `Result<T, SimlinkError>`.
pub type Result<T> = std::result::Result<T, SimlinkError>;
