//! Integration tests for the client facade against the simulated host.

use std::time::{Duration, Instant};

use simlink::error::DecodeError;
use simlink::provider::{DataType, DefinitionId, EventFlags, EventId, ObjectId, Sample, Value};
use simlink::simulated::SimulatedHost;
use simlink::{ClientConfig, ConnectionState, EventSet, Field, Priority, Schema, SimClient, SimlinkError};

#[derive(Debug, Default, Clone, PartialEq)]
struct Engine {
    rpm: f64,
    running: i32,
    label: String,
}

impl Schema for Engine {
    const ID: DefinitionId = DefinitionId(10);
    const NAME: &'static str = "engine";
    const SAMPLE_INTERVAL_MS: u64 = 5;
    const FIELDS: &'static [Field] = &[
        Field::sampled("rpm", "GENERAL ENG RPM:1", Some("rpm"), DataType::Float64),
        Field::structural("label"),
        Field::sampled("running", "GENERAL ENG COMBUSTION:1", Some("bool"), DataType::Int32),
    ];

    fn from_sample(sample: &Sample) -> Result<Self, DecodeError> {
        Ok(Self {
            rpm: sample.f64(0)?,
            running: sample.i32(1)?,
            label: String::new(),
        })
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Fuel {
    gallons: f64,
}

impl Schema for Fuel {
    const ID: DefinitionId = DefinitionId(11);
    const NAME: &'static str = "fuel";
    const SAMPLE_INTERVAL_MS: u64 = 500;
    const FIELDS: &'static [Field] = &[Field::sampled(
        "gallons",
        "FUEL TOTAL QUANTITY",
        Some("gallons"),
        DataType::Float64,
    )];

    fn from_sample(sample: &Sample) -> Result<Self, DecodeError> {
        Ok(Self {
            gallons: sample.f64(0)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Controls {
    Pause,
    Throttle,
}

impl EventSet for Controls {
    const NAME: &'static str = "controls";
    const MEMBERS: &'static [Self] = &[Self::Pause, Self::Throttle];
    const EVENT_NAMES: &'static [(Self, &'static str)] = &[
        (Self::Pause, "PAUSE_TOGGLE"),
        (Self::Throttle, "THROTTLE_SET"),
    ];

    fn id(self) -> EventId {
        EventId(200 + self as u32)
    }
}

fn fast_config() -> ClientConfig {
    ClientConfig::new("integration")
        .with_retry_backoff(Duration::from_millis(20))
        .with_tick_interval(Duration::from_millis(1))
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}

fn engine_sample(rpm: f64, running: i32) -> Sample {
    Sample::new(vec![Value::Float64(rpm), Value::Int32(running)])
}

#[test]
fn test_unsampled_schema_reads_default() {
    let host = SimulatedHost::new();
    host.set_offline(true);
    let client = SimClient::new(host.provider(), fast_config()).unwrap();
    client.register_schema::<Engine>().unwrap();
    client.start().unwrap();

    assert_eq!(client.get::<Engine>(), Engine::default());
    assert_eq!(client.get::<Fuel>(), Fuel::default());
    assert!(client.try_get::<Engine>().is_none());

    client.dispose();
    client.join();
}

#[test]
fn test_latest_sample_is_returned() {
    let host = SimulatedHost::new();
    host.set_sample(Engine::ID, engine_sample(2400.0, 1));

    let client = SimClient::new(host.provider(), fast_config()).unwrap();
    client.register_schema::<Engine>().unwrap();
    client.start().unwrap();

    assert!(wait_until(Duration::from_secs(5), || client.get::<Engine>().rpm == 2400.0));
    assert_eq!(
        client.get::<Engine>(),
        Engine {
            rpm: 2400.0,
            running: 1,
            label: String::new(),
        }
    );

    // A newer sample replaces the cached value.
    host.set_sample(Engine::ID, engine_sample(0.0, 0));
    assert!(wait_until(Duration::from_secs(5), || client.get::<Engine>().running == 0));
    assert_eq!(client.get::<Engine>().rpm, 0.0);

    client.dispose();
    client.join();
}

#[test]
fn test_values_survive_dispose() {
    let host = SimulatedHost::new();
    host.set_sample(Fuel::ID, Sample::new(vec![Value::Float64(53.0)]));

    let client = SimClient::new(host.provider(), fast_config()).unwrap();
    client.register_schema::<Fuel>().unwrap();
    client.start().unwrap();
    assert!(wait_until(Duration::from_secs(5), || client.try_get::<Fuel>().is_some()));

    client.dispose();
    client.join();

    assert!(!client.is_connected());
    assert_eq!(client.state(), ConnectionState::Disposed);
    assert_eq!(client.get::<Fuel>(), Fuel { gallons: 53.0 });
}

#[test]
fn test_undecodable_sample_keeps_session() {
    let host = SimulatedHost::new();
    // Wrong type for the second value.
    host.set_sample(
        Engine::ID,
        Sample::new(vec![Value::Float64(1.0), Value::Text("on".to_string())]),
    );

    let client = SimClient::new(host.provider(), fast_config()).unwrap();
    client.register_schema::<Engine>().unwrap();
    client.start().unwrap();

    assert!(wait_until(Duration::from_secs(5), || {
        host.last_session()
            .is_some_and(|s| s.request_count(Engine::ID) >= 3)
    }));
    assert!(client.try_get::<Engine>().is_none());
    assert_eq!(host.session_count(), 1);
    assert!(client.is_connected());

    client.dispose();
    client.join();
}

#[test]
fn test_events_are_transmitted_with_priority() {
    let host = SimulatedHost::new();
    let config = fast_config().with_event_priority(Priority::HIGHEST_MASKABLE);
    let client = SimClient::new(host.provider(), config).unwrap();
    client.register_event_set::<Controls>().unwrap();
    client.start().unwrap();

    assert!(wait_until(Duration::from_secs(5), || client.is_connected()));

    client.send_event(Controls::Pause);
    client.send_event_with_data(Controls::Throttle, 16_383);

    assert!(wait_until(Duration::from_secs(5), || {
        host.last_session().is_some_and(|s| s.transmitted.len() == 2)
    }));

    let session = host.last_session().unwrap();
    let pause = session.transmitted[0];
    assert_eq!(pause.object, ObjectId::USER);
    assert_eq!(pause.event, EventId(200));
    assert_eq!(pause.data, 0);
    assert_eq!(pause.priority, Priority::HIGHEST_MASKABLE);
    assert!(pause.flags.contains(EventFlags::GROUP_ID_IS_PRIORITY));

    let throttle = session.transmitted[1];
    assert_eq!(throttle.event, EventId(201));
    assert_eq!(throttle.data, 16_383);

    client.dispose();
    client.join();
}

#[test]
fn test_event_while_disconnected_is_ignored() {
    let host = SimulatedHost::new();
    host.set_offline(true);
    let client = SimClient::new(host.provider(), fast_config()).unwrap();
    client.register_event_set::<Controls>().unwrap();
    client.start().unwrap();

    client.send_event(Controls::Pause);

    host.set_offline(false);
    assert!(wait_until(Duration::from_secs(5), || client.is_connected()));
    std::thread::sleep(Duration::from_millis(20));

    assert!(host.last_session().unwrap().transmitted.is_empty());

    client.dispose();
    client.join();
}

#[test]
fn test_second_start_fails() {
    let host = SimulatedHost::new();
    let client = SimClient::new(host.provider(), fast_config()).unwrap();

    client.start().unwrap();
    assert!(matches!(client.start(), Err(SimlinkError::AlreadyStarted)));

    client.dispose();
    client.join();
}

#[test]
fn test_dispose_is_idempotent_and_prompt() {
    let host = SimulatedHost::new();
    host.set_offline(true);
    let config = ClientConfig::new("slow-retry").with_retry_backoff(Duration::from_secs(30));
    let client = SimClient::new(host.provider(), config).unwrap();
    client.start().unwrap();

    // Let the loop fail once and enter its long backoff.
    assert!(wait_until(Duration::from_secs(5), || host.open_attempts().len() == 1));
    std::thread::sleep(Duration::from_millis(20));

    let started = Instant::now();
    client.dispose();
    client.dispose();
    client.join();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(client.state(), ConnectionState::Disposed);
    assert_eq!(host.open_attempts().len(), 1);
}

#[test]
fn test_dispose_closes_open_session() {
    let host = SimulatedHost::new();
    let client = SimClient::new(host.provider(), fast_config()).unwrap();
    client.register_schema::<Engine>().unwrap();
    client.start().unwrap();
    assert!(wait_until(Duration::from_secs(5), || client.is_connected()));

    client.dispose();
    client.join();

    assert!(!client.is_connected());
    assert!(host.sessions().iter().all(|s| s.closed));
}

#[test]
fn test_drop_stops_loop() {
    let host = SimulatedHost::new();
    {
        let client = SimClient::new(host.provider(), fast_config()).unwrap();
        client.start().unwrap();
        assert!(wait_until(Duration::from_secs(5), || client.is_connected()));
    }

    assert!(wait_until(Duration::from_secs(5), || {
        host.sessions().iter().all(|s| s.closed)
    }));
}
