//! The public session client.
//!
//! [`SimClient`] is a thin facade over the [`ConnectionManager`]: it owns the
//! background loop, accepts schema and event set registrations and exposes
//! the latest sampled values.

use crate::config::ClientConfig;
use crate::connection::{ConnectionManager, ConnectionState};
use crate::error::{Result, SimlinkError};
use crate::event::EventSet;
use crate::provider::ConnectionProvider;
use crate::schema::Schema;
use crate::store::DataStore;

/// Resilient client session to a simulation host.
///
/// Registration, reads and event sends are all `&self` and safe to call from
/// any thread while the loop runs.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
///
/// use simlink::provider::{DataType, DefinitionId, Sample};
/// use simlink::simulated::SimulatedHost;
/// use simlink::{ClientConfig, DecodeError, Field, Schema, SimClient};
///
/// #[derive(Debug, Default, Clone, PartialEq)]
/// struct Altitude {
///     feet: f64,
/// }
///
/// impl Schema for Altitude {
///     const ID: DefinitionId = DefinitionId(1);
///     const NAME: &'static str = "altitude";
///     const SAMPLE_INTERVAL_MS: u64 = 5;
///     const FIELDS: &'static [Field] =
///         &[Field::sampled("feet", "PLANE ALTITUDE", Some("feet"), DataType::Float64)];
///
///     fn from_sample(sample: &Sample) -> Result<Self, DecodeError> {
///         Ok(Self { feet: sample.f64(0)? })
///     }
/// }
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let host = SimulatedHost::new();
/// let config = ClientConfig::new("doc").with_retry_backoff(Duration::from_millis(10));
/// let client = SimClient::new(host.provider(), config)?;
///
/// client.register_schema::<Altitude>()?;
/// client.start()?;
///
/// while client.try_get::<Altitude>().is_none() {
///     std::thread::sleep(Duration::from_millis(1));
/// }
/// assert!(client.is_connected());
///
/// client.dispose();
/// client.join();
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SimClient {
    manager: ConnectionManager,
}

impl SimClient {
    /// Creates a client for `provider`. Nothing connects until [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`](crate::error::ConfigError) if `config` is invalid.
    pub fn new<P: ConnectionProvider>(provider: P, config: ClientConfig) -> Result<Self> {
        Ok(Self {
            manager: ConnectionManager::new(provider, config)?,
        })
    }

    /// Starts the background connection loop and returns immediately.
    ///
    /// # Errors
    ///
    /// - [`SimlinkError::AlreadyStarted`] on a second call
    /// - [`SimlinkError::Disposed`] after [`dispose`](Self::dispose)
    /// - [`SimlinkError::Spawn`] if the loop thread cannot be created
    pub fn start(&self) -> Result<()> {
        self.manager.start()
    }

    /// Stops the loop and closes any open session. Idempotent.
    ///
    /// After disposal [`is_connected`](Self::is_connected) is `false` and
    /// [`get`](Self::get) keeps returning the last stored values.
    pub fn dispose(&self) {
        self.manager.dispose();
    }

    /// Blocks until the loop thread has exited after [`dispose`](Self::dispose).
    pub fn join(&self) {
        self.manager.join();
    }

    /// Returns `true` iff a session is currently open.
    pub fn is_connected(&self) -> bool {
        self.manager.is_connected()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    /// The configuration the client was created with.
    pub fn config(&self) -> &ClientConfig {
        self.manager.config()
    }

    /// Registers schema `T` for periodic sampling.
    ///
    /// Takes effect on the next (re)connect. Registering the same schema
    /// twice samples it twice.
    ///
    /// # Errors
    ///
    /// - [`SchemaError`](crate::error::SchemaError) if `T` is missing metadata
    /// - [`SimlinkError::Disposed`] after [`dispose`](Self::dispose)
    pub fn register_schema<T: Schema>(&self) -> Result<()> {
        let shared = self.manager.shared();
        if shared.is_disposed() {
            return Err(SimlinkError::Disposed);
        }
        let mut schemas = shared.schemas.write();
        let descriptor = schemas.register::<T>()?;
        tracing::info!(
            schema = descriptor.name(),
            id = %descriptor.id(),
            interval = ?descriptor.interval(),
            "schema registered"
        );
        Ok(())
    }

    /// Registers event set `E`.
    ///
    /// Takes effect on the next (re)connect.
    ///
    /// # Errors
    ///
    /// - [`EventError`](crate::error::EventError) if `E` is missing metadata
    /// - [`SimlinkError::Disposed`] after [`dispose`](Self::dispose)
    pub fn register_event_set<E: EventSet>(&self) -> Result<()> {
        let shared = self.manager.shared();
        if shared.is_disposed() {
            return Err(SimlinkError::Disposed);
        }
        let mut events = shared.events.write();
        let set = events.register::<E>()?;
        tracing::info!(set = set.set(), events = set.mappings().len(), "event set registered");
        Ok(())
    }

    /// Latest sampled value of `T`, or `T::default()` if none has arrived.
    pub fn get<T: Schema>(&self) -> T {
        self.store().get::<T>()
    }

    /// Latest sampled value of `T`, or `None` if none has arrived.
    pub fn try_get<T: Schema>(&self) -> Option<T> {
        self.store().try_get::<T>()
    }

    /// Sends `event` with a data payload of zero.
    ///
    /// A silent no-op unless connected.
    pub fn send_event<E: EventSet>(&self, event: E) {
        self.send_event_with_data(event, 0);
    }

    /// Sends `event` with `data` as its payload.
    ///
    /// A silent no-op unless connected.
    pub fn send_event_with_data<E: EventSet>(&self, event: E, data: u32) {
        self.manager.send_event(event.id(), data);
    }

    /// Number of registered schemas.
    pub fn schema_count(&self) -> usize {
        self.manager.shared().schemas.read().len()
    }

    /// Number of registered event sets.
    pub fn event_set_count(&self) -> usize {
        self.manager.shared().events.read().len()
    }

    /// The value cache the loop writes into.
    pub fn store(&self) -> &DataStore {
        &self.manager.shared().store
    }
}
