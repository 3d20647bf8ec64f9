//! Capability set consumed from the native connection provider.
//!
//! The byte-level framing of the host protocol is owned entirely by the
//! provider. simlink only needs the handful of operations below to declare
//! data definitions, map client events, request samples, transmit events and
//! drain inbound messages.
//!
//! # Overview
//!
//! - [`ConnectionProvider`] - opens sessions to the host
//! - [`Connection`] - one open session; owned by the connection loop thread
//! - [`Message`] - inbound notifications drained by [`Connection::receive_messages`]
//! - [`Sample`] / [`Value`] / [`DataType`] - the typed payload of a data message

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ConnectionError, DecodeError};

/// Wire-level key of a data definition.
///
/// Doubles as the request id when sampling, and as the slot key in the
/// [`DataStore`](crate::store::DataStore).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DefinitionId(pub u32);

impl fmt::Display for DefinitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "definition#{}", self.0)
    }
}

/// Application-local identifier of a client event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u32);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event#{}", self.0)
    }
}

/// Host object an event is transmitted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(pub u32);

impl ObjectId {
    /// The user's own object.
    pub const USER: Self = Self(0);
}

/// Which host objects a periodic data request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetScope {
    /// Only the user's own object.
    User,
}

/// Group priority attached to a transmitted event.
///
/// Lower numbers are higher priorities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(pub u32);

impl Priority {
    /// The highest priority that still allows events to be masked.
    pub const HIGHEST_MASKABLE: Self = Self(10_000_000);
    /// The standard priority used for all client events.
    pub const STANDARD: Self = Self(1_900_000_000);
    /// The host's default priority.
    pub const DEFAULT: Self = Self(2_000_000_000);
    /// Priorities lower than this are ignored by the host.
    pub const LOWEST: Self = Self(4_000_000_000);
}

impl Default for Priority {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Flags attached to a transmitted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EventFlags(pub u32);

impl EventFlags {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// The priority argument is a group priority and must be honored.
    pub const GROUP_ID_IS_PRIORITY: Self = Self(0x0000_0010);

    /// Returns `true` if every bit of `other` is set in `self`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Data type a field is declared with in a data definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DataType {
    /// 64-bit float.
    #[default]
    Float64,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// Fixed 256-byte string.
    String256,
}

/// One decoded field value of a [`Sample`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A [`DataType::Float64`] value.
    Float64(f64),
    /// A [`DataType::Int32`] value.
    Int32(i32),
    /// A [`DataType::Int64`] value.
    Int64(i64),
    /// A [`DataType::String256`] value.
    Text(String),
}

impl Value {
    /// The data type this value was declared with.
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Float64(_) => DataType::Float64,
            Self::Int32(_) => DataType::Int32,
            Self::Int64(_) => DataType::Int64,
            Self::Text(_) => DataType::String256,
        }
    }
}

/// Field values of one sampled data definition, in declaration order.
///
/// Only sampled fields are present; structural members are never sent by
/// the host.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sample {
    values: Vec<Value>,
}

impl Sample {
    /// Creates a sample from values in declaration order.
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Number of values in the sample.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the sample carries no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// All values in declaration order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    fn value(&self, index: usize) -> Result<&Value, DecodeError> {
        self.values.get(index).ok_or(DecodeError::TooShort {
            expected: index + 1,
            actual: self.values.len(),
        })
    }

    /// Reads a [`DataType::Float64`] value.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if the index is out of range or the value has
    /// another type.
    pub fn f64(&self, index: usize) -> Result<f64, DecodeError> {
        match self.value(index)? {
            Value::Float64(v) => Ok(*v),
            other => Err(mismatch(index, DataType::Float64, other)),
        }
    }

    /// Reads a [`DataType::Int32`] value.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if the index is out of range or the value has
    /// another type.
    pub fn i32(&self, index: usize) -> Result<i32, DecodeError> {
        match self.value(index)? {
            Value::Int32(v) => Ok(*v),
            other => Err(mismatch(index, DataType::Int32, other)),
        }
    }

    /// Reads a [`DataType::Int64`] value.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if the index is out of range or the value has
    /// another type.
    pub fn i64(&self, index: usize) -> Result<i64, DecodeError> {
        match self.value(index)? {
            Value::Int64(v) => Ok(*v),
            other => Err(mismatch(index, DataType::Int64, other)),
        }
    }

    /// Reads a [`DataType::String256`] value.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if the index is out of range or the value has
    /// another type.
    pub fn text(&self, index: usize) -> Result<&str, DecodeError> {
        match self.value(index)? {
            Value::Text(v) => Ok(v.as_str()),
            other => Err(mismatch(index, DataType::String256, other)),
        }
    }
}

fn mismatch(index: usize, expected: DataType, actual: &Value) -> DecodeError {
    DecodeError::TypeMismatch {
        index,
        expected,
        actual: actual.data_type(),
    }
}

/// Inbound notification drained from an open session.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// The host closed the session.
    Quit,
    /// One sampled value for a data definition.
    Data {
        /// The definition the sample belongs to.
        definition: DefinitionId,
        /// The sampled field values.
        sample: Sample,
    },
}

/// One open session to the simulation host.
///
/// A connection is only ever touched by the connection loop thread, so
/// implementations need to be `Send` but not `Sync`.
pub trait Connection: Send {
    /// Adds one field to a data definition.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] if the host rejects the field.
    fn add_to_data_definition(
        &mut self,
        definition: DefinitionId,
        field_name: &str,
        unit: Option<&str>,
        data_type: DataType,
    ) -> Result<(), ConnectionError>;

    /// Finalizes a data definition after all its fields have been added.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] if the host rejects the definition.
    fn register_data_definition(&mut self, definition: DefinitionId) -> Result<(), ConnectionError>;

    /// Maps a client event id to a protocol-level event name.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] if the host rejects the mapping.
    fn map_client_event(&mut self, event: EventId, event_name: &str) -> Result<(), ConnectionError>;

    /// Requests one sample of a data definition for the given scope.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] if the request cannot be sent.
    fn request_data(
        &mut self,
        definition: DefinitionId,
        scope: TargetScope,
    ) -> Result<(), ConnectionError>;

    /// Transmits a mapped client event.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] if the event cannot be sent.
    fn transmit_client_event(
        &mut self,
        object: ObjectId,
        event: EventId,
        data: u32,
        priority: Priority,
        flags: EventFlags,
    ) -> Result<(), ConnectionError>;

    /// Drains every message currently available without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] if the session failed while receiving.
    fn receive_messages(&mut self) -> Result<Vec<Message>, ConnectionError>;

    /// Closes the session. Called at most once, from the loop thread.
    fn close(&mut self);
}

/// Opens sessions to the simulation host.
pub trait ConnectionProvider: Send + 'static {
    /// Opens a new session under the given client name.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] if the host is unavailable.
    fn open(&mut self, client_name: &str) -> Result<Box<dyn Connection>, ConnectionError>;
}
