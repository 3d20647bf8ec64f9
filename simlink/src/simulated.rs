//! In-process simulated host.
//!
//! [`SimulatedHost`] implements the provider traits without any native
//! library, which makes it the provider of choice for tests, demos and
//! benchmarks. It records everything a client does on every session and
//! lets the caller script the host's behaviour: refuse connections, end the
//! session, fail a receive, or pin the values returned for a definition.
//!
//! # Example
//!
//! ```rust
//! use simlink::provider::{Connection, ConnectionProvider, DefinitionId, TargetScope};
//! use simlink::simulated::SimulatedHost;
//!
//! let host = SimulatedHost::new();
//! host.fail_next_opens(1);
//!
//! let mut provider = host.provider();
//! assert!(provider.open("demo").is_err());
//!
//! let mut session = provider.open("demo").unwrap();
//! session
//!     .add_to_data_definition(DefinitionId(1), "PLANE ALTITUDE", Some("feet"), Default::default())
//!     .unwrap();
//! session.register_data_definition(DefinitionId(1)).unwrap();
//! session.request_data(DefinitionId(1), TargetScope::User).unwrap();
//!
//! assert_eq!(session.receive_messages().unwrap().len(), 1);
//! assert_eq!(host.open_attempts().len(), 2);
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::error::ConnectionError;
use crate::provider::{
    Connection, ConnectionProvider, DataType, DefinitionId, EventFlags, EventId, Message, ObjectId,
    Priority, Sample, TargetScope, Value,
};

/// A field declared on a simulated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredField {
    /// Protocol sample name.
    pub name: String,
    /// Declared unit.
    pub unit: Option<String>,
    /// Declared data type.
    pub data_type: DataType,
}

/// An event the client transmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransmittedEvent {
    /// Target object.
    pub object: ObjectId,
    /// Event id.
    pub event: EventId,
    /// Event payload.
    pub data: u32,
    /// Group priority.
    pub priority: Priority,
    /// Event flags.
    pub flags: EventFlags,
}

/// Everything one session did, in call order.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    /// Client name the session was opened under.
    pub client_name: String,
    /// When the session was opened.
    pub opened_at: Instant,
    /// Fields added per definition.
    pub fields: HashMap<DefinitionId, Vec<DeclaredField>>,
    /// Definitions finalized, in call order.
    pub definitions: Vec<DefinitionId>,
    /// Event mappings, in call order.
    pub event_mappings: Vec<(EventId, String)>,
    /// Sample requests with the time they were made.
    pub requests: Vec<(DefinitionId, Instant)>,
    /// Transmitted events.
    pub transmitted: Vec<TransmittedEvent>,
    /// Whether the client closed the session.
    pub closed: bool,
}

impl SessionRecord {
    fn new(client_name: &str) -> Self {
        Self {
            client_name: client_name.to_string(),
            opened_at: Instant::now(),
            fields: HashMap::new(),
            definitions: Vec::new(),
            event_mappings: Vec::new(),
            requests: Vec::new(),
            transmitted: Vec::new(),
            closed: false,
        }
    }

    /// Number of sample requests made for `definition`.
    pub fn request_count(&self, definition: DefinitionId) -> usize {
        self.requests.iter().filter(|(d, _)| *d == definition).count()
    }
}

#[derive(Debug, Default)]
struct HostState {
    offline: bool,
    failing_opens: u32,
    open_attempts: Vec<Instant>,
    sessions: Vec<SessionRecord>,
    values: HashMap<DefinitionId, Sample>,
    quit_pending: bool,
    receive_failure_pending: bool,
}

/// Handle to a simulated host. Clones share the same host.
#[derive(Debug, Clone, Default)]
pub struct SimulatedHost {
    state: Arc<Mutex<HostState>>,
}

impl SimulatedHost {
    /// Creates a host that accepts every connection.
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider that opens sessions on this host.
    pub fn provider(&self) -> SimulatedProvider {
        SimulatedProvider { host: self.clone() }
    }

    /// Refuses the next `count` connection attempts.
    pub fn fail_next_opens(&self, count: u32) {
        self.state.lock().failing_opens = count;
    }

    /// Refuses all connection attempts while `offline` is set.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    /// Pins the sample returned for every request of `definition`.
    ///
    /// Without a pinned sample, the host synthesizes one from the declared
    /// fields.
    pub fn set_sample(&self, definition: DefinitionId, sample: Sample) {
        self.state.lock().values.insert(definition, sample);
    }

    /// Ends the current session: the next receive returns [`Message::Quit`].
    pub fn quit_session(&self) {
        self.state.lock().quit_pending = true;
    }

    /// Makes the next receive on any session fail.
    pub fn fail_next_receive(&self) {
        self.state.lock().receive_failure_pending = true;
    }

    /// Times of every connection attempt, successful or not.
    pub fn open_attempts(&self) -> Vec<Instant> {
        self.state.lock().open_attempts.clone()
    }

    /// Number of sessions opened so far.
    pub fn session_count(&self) -> usize {
        self.state.lock().sessions.len()
    }

    /// Snapshot of every session opened so far.
    pub fn sessions(&self) -> Vec<SessionRecord> {
        self.state.lock().sessions.clone()
    }

    /// Snapshot of the most recently opened session.
    pub fn last_session(&self) -> Option<SessionRecord> {
        self.state.lock().sessions.last().cloned()
    }
}

/// Opens sessions on a [`SimulatedHost`].
#[derive(Debug, Clone)]
pub struct SimulatedProvider {
    host: SimulatedHost,
}

impl ConnectionProvider for SimulatedProvider {
    fn open(&mut self, client_name: &str) -> Result<Box<dyn Connection>, ConnectionError> {
        let mut state = self.host.state.lock();
        state.open_attempts.push(Instant::now());

        let refusal = if state.offline {
            Some("host is offline")
        } else if state.failing_opens > 0 {
            state.failing_opens -= 1;
            Some("host refused the connection")
        } else {
            None
        };
        if let Some(reason) = refusal {
            return Err(ConnectionError::Open {
                client_name: client_name.to_string(),
                reason: reason.to_string(),
            });
        }

        // A new session supersedes any quit aimed at the previous one.
        state.quit_pending = false;
        state.sessions.push(SessionRecord::new(client_name));
        let session = state.sessions.len() - 1;

        Ok(Box::new(SimulatedConnection {
            host: self.host.clone(),
            session,
            inbox: VecDeque::new(),
            responses: 0,
            closed: false,
        }))
    }
}

/// One session on a [`SimulatedHost`].
#[derive(Debug)]
pub struct SimulatedConnection {
    host: SimulatedHost,
    session: usize,
    inbox: VecDeque<Message>,
    responses: u32,
    closed: bool,
}

impl SimulatedConnection {
    fn with_record<R>(
        &self,
        f: impl FnOnce(&mut SessionRecord) -> Result<R, ConnectionError>,
    ) -> Result<R, ConnectionError> {
        if self.closed {
            return Err(ConnectionError::Closed);
        }
        let mut state = self.host.state.lock();
        let record = state
            .sessions
            .get_mut(self.session)
            .ok_or(ConnectionError::Closed)?;
        f(record)
    }

    fn synthesize(&self, fields: &[DeclaredField]) -> Sample {
        let n = self.responses;
        Sample::new(
            fields
                .iter()
                .map(|field| match field.data_type {
                    DataType::Float64 => Value::Float64(f64::from(n)),
                    DataType::Int32 => Value::Int32(i32::try_from(n).unwrap_or(i32::MAX)),
                    DataType::Int64 => Value::Int64(i64::from(n)),
                    DataType::String256 => Value::Text(field.name.clone()),
                })
                .collect(),
        )
    }
}

impl Connection for SimulatedConnection {
    fn add_to_data_definition(
        &mut self,
        definition: DefinitionId,
        field_name: &str,
        unit: Option<&str>,
        data_type: DataType,
    ) -> Result<(), ConnectionError> {
        self.with_record(|record| {
            record.fields.entry(definition).or_default().push(DeclaredField {
                name: field_name.to_string(),
                unit: unit.map(str::to_string),
                data_type,
            });
            Ok(())
        })
    }

    fn register_data_definition(&mut self, definition: DefinitionId) -> Result<(), ConnectionError> {
        self.with_record(|record| {
            if !record.fields.contains_key(&definition) {
                return Err(ConnectionError::Rejected {
                    operation: "register_data_definition",
                    reason: format!("{definition} has no fields"),
                });
            }
            record.definitions.push(definition);
            Ok(())
        })
    }

    fn map_client_event(&mut self, event: EventId, event_name: &str) -> Result<(), ConnectionError> {
        self.with_record(|record| {
            record.event_mappings.push((event, event_name.to_string()));
            Ok(())
        })
    }

    fn request_data(
        &mut self,
        definition: DefinitionId,
        _scope: TargetScope,
    ) -> Result<(), ConnectionError> {
        let fields = self.with_record(|record| {
            if !record.definitions.contains(&definition) {
                return Err(ConnectionError::Rejected {
                    operation: "request_data",
                    reason: format!("{definition} is not registered"),
                });
            }
            record.requests.push((definition, Instant::now()));
            Ok(record.fields.get(&definition).cloned().unwrap_or_default())
        })?;

        let pinned = self.host.state.lock().values.get(&definition).cloned();
        let sample = pinned.unwrap_or_else(|| self.synthesize(&fields));
        self.responses = self.responses.saturating_add(1);
        self.inbox.push_back(Message::Data { definition, sample });
        Ok(())
    }

    fn transmit_client_event(
        &mut self,
        object: ObjectId,
        event: EventId,
        data: u32,
        priority: Priority,
        flags: EventFlags,
    ) -> Result<(), ConnectionError> {
        self.with_record(|record| {
            record.transmitted.push(TransmittedEvent {
                object,
                event,
                data,
                priority,
                flags,
            });
            Ok(())
        })
    }

    fn receive_messages(&mut self) -> Result<Vec<Message>, ConnectionError> {
        if self.closed {
            return Err(ConnectionError::Closed);
        }

        let quit = {
            let mut state = self.host.state.lock();
            if state.receive_failure_pending {
                state.receive_failure_pending = false;
                return Err(ConnectionError::Receive {
                    reason: "simulated receive failure".to_string(),
                });
            }
            std::mem::take(&mut state.quit_pending)
        };

        let mut messages: Vec<Message> = self.inbox.drain(..).collect();
        if quit {
            messages.push(Message::Quit);
        }
        Ok(messages)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(record) = self.host.state.lock().sessions.get_mut(self.session) {
            record.closed = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declare(conn: &mut dyn Connection, definition: DefinitionId) {
        conn.add_to_data_definition(definition, "AIRSPEED INDICATED", Some("knots"), DataType::Float64)
            .unwrap();
        conn.add_to_data_definition(definition, "TITLE", None, DataType::String256)
            .unwrap();
        conn.register_data_definition(definition).unwrap();
    }

    #[test]
    fn test_refuses_scripted_opens() {
        let host = SimulatedHost::new();
        host.fail_next_opens(2);
        let mut provider = host.provider();

        assert!(provider.open("a").is_err());
        assert!(provider.open("a").is_err());
        assert!(provider.open("a").is_ok());
        assert_eq!(host.open_attempts().len(), 3);
        assert_eq!(host.session_count(), 1);
    }

    #[test]
    fn test_offline_host() {
        let host = SimulatedHost::new();
        host.set_offline(true);
        let mut provider = host.provider();

        assert!(matches!(provider.open("a"), Err(ConnectionError::Open { .. })));
        host.set_offline(false);
        assert!(provider.open("a").is_ok());
    }

    #[test]
    fn test_synthesized_samples_follow_declaration() {
        let host = SimulatedHost::new();
        let mut conn = host.provider().open("a").unwrap();
        declare(conn.as_mut(), DefinitionId(4));

        conn.request_data(DefinitionId(4), TargetScope::User).unwrap();
        conn.request_data(DefinitionId(4), TargetScope::User).unwrap();

        let messages = conn.receive_messages().unwrap();
        assert_eq!(
            messages,
            [
                Message::Data {
                    definition: DefinitionId(4),
                    sample: Sample::new(vec![
                        Value::Float64(0.0),
                        Value::Text("TITLE".to_string()),
                    ]),
                },
                Message::Data {
                    definition: DefinitionId(4),
                    sample: Sample::new(vec![
                        Value::Float64(1.0),
                        Value::Text("TITLE".to_string()),
                    ]),
                },
            ]
        );
        assert!(conn.receive_messages().unwrap().is_empty());
    }

    #[test]
    fn test_pinned_sample() {
        let host = SimulatedHost::new();
        let pinned = Sample::new(vec![Value::Float64(98.6), Value::Text("C172".to_string())]);
        host.set_sample(DefinitionId(4), pinned.clone());

        let mut conn = host.provider().open("a").unwrap();
        declare(conn.as_mut(), DefinitionId(4));
        conn.request_data(DefinitionId(4), TargetScope::User).unwrap();

        assert_eq!(
            conn.receive_messages().unwrap(),
            [Message::Data {
                definition: DefinitionId(4),
                sample: pinned,
            }]
        );
    }

    #[test]
    fn test_rejects_undeclared_request() {
        let host = SimulatedHost::new();
        let mut conn = host.provider().open("a").unwrap();

        assert!(matches!(
            conn.request_data(DefinitionId(9), TargetScope::User),
            Err(ConnectionError::Rejected { .. })
        ));
        assert!(conn.register_data_definition(DefinitionId(9)).is_err());
    }

    #[test]
    fn test_quit_and_receive_failure() {
        let host = SimulatedHost::new();
        let mut conn = host.provider().open("a").unwrap();

        host.quit_session();
        assert_eq!(conn.receive_messages().unwrap(), [Message::Quit]);
        assert!(conn.receive_messages().unwrap().is_empty());

        host.fail_next_receive();
        assert!(matches!(
            conn.receive_messages(),
            Err(ConnectionError::Receive { .. })
        ));
    }

    #[test]
    fn test_close_is_recorded_and_final() {
        let host = SimulatedHost::new();
        let mut conn = host.provider().open("a").unwrap();

        conn.close();
        conn.close();

        assert!(host.last_session().unwrap().closed);
        assert_eq!(conn.receive_messages(), Err(ConnectionError::Closed));
        assert_eq!(
            conn.map_client_event(EventId(1), "PAUSE_TOGGLE"),
            Err(ConnectionError::Closed)
        );
    }

    #[test]
    fn test_records_mappings_and_transmissions() {
        let host = SimulatedHost::new();
        let mut conn = host.provider().open("panel").unwrap();

        conn.map_client_event(EventId(1), "PAUSE_TOGGLE").unwrap();
        conn.transmit_client_event(
            ObjectId::USER,
            EventId(1),
            0,
            Priority::STANDARD,
            EventFlags::GROUP_ID_IS_PRIORITY,
        )
        .unwrap();

        let record = host.last_session().unwrap();
        assert_eq!(record.client_name, "panel");
        assert_eq!(record.event_mappings, [(EventId(1), "PAUSE_TOGGLE".to_string())]);
        assert_eq!(record.transmitted.len(), 1);
        assert_eq!(record.transmitted[0].priority, Priority::STANDARD);
    }
}
