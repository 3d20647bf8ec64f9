//! # simlink
//!
//! Resilient session client for a flight-simulation host.
//!
//! simlink keeps a client connected to a simulation host over a pluggable
//! session provider. Applications declare data schemas (structs the host
//! samples periodically) and event sets (enums of control events). A
//! background loop opens the session, replays every declaration, requests
//! samples on each schema's cadence, transmits queued events and caches the
//! latest value of every schema for lock-light reads from any thread. When
//! the host goes away the loop reconnects on its own, forever, until the
//! client is disposed.
//!
//! **Status**: This crate is in early development. The API is not yet stable.
//!
//! ## Key Properties
//!
//! - Connection failures never reach the caller; the loop retries after a fixed backoff
//! - Registrations survive reconnects and are replayed in registration order
//! - Reads never block on the connection and never observe a torn value
//! - Disposal is observed within one tick or backoff wait
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use simlink::provider::{DataType, DefinitionId, EventId, Sample};
//! use simlink::simulated::SimulatedHost;
//! use simlink::{ClientConfig, DecodeError, EventSet, Field, Schema, SimClient};
//!
//! #[derive(Debug, Default, Clone)]
//! struct Airspeed {
//!     knots: f64,
//! }
//!
//! impl Schema for Airspeed {
//!     const ID: DefinitionId = DefinitionId(1);
//!     const NAME: &'static str = "airspeed";
//!     const SAMPLE_INTERVAL_MS: u64 = 200;
//!     const FIELDS: &'static [Field] = &[Field::sampled(
//!         "knots",
//!         "AIRSPEED INDICATED",
//!         Some("knots"),
//!         DataType::Float64,
//!     )];
//!
//!     fn from_sample(sample: &Sample) -> Result<Self, DecodeError> {
//!         Ok(Self { knots: sample.f64(0)? })
//!     }
//! }
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! enum Sim {
//!     Pause,
//! }
//!
//! impl EventSet for Sim {
//!     const NAME: &'static str = "sim";
//!     const MEMBERS: &'static [Self] = &[Self::Pause];
//!     const EVENT_NAMES: &'static [(Self, &'static str)] = &[(Self::Pause, "PAUSE_TOGGLE")];
//!
//!     fn id(self) -> EventId {
//!         EventId(self as u32)
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let host = SimulatedHost::new();
//! let client = SimClient::new(host.provider(), ClientConfig::new("quick-start"))?;
//!
//! client.register_schema::<Airspeed>()?;
//! client.register_event_set::<Sim>()?;
//! client.start()?;
//!
//! // Later, from any thread:
//! let airspeed = client.get::<Airspeed>();
//! println!("{} kt", airspeed.knots);
//! client.send_event(Sim::Pause);
//!
//! client.dispose();
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`SimClient`]: Public facade over the loop, registries and cache
//! - [`ConnectionManager`]: Background loop and connection state machine
//! - [`Schema`] / [`EventSet`]: Compile-time declarations implemented by applications
//! - [`DataStore`]: Last-value cache keyed by schema identity
//!
//! ## Modules
//!
//! - [`client`]: The public facade
//! - [`connection`]: Connection loop, state machine and event queue
//! - [`schema`]: Schema declarations, descriptors and registry
//! - [`event`]: Event set declarations and registry
//! - [`scheduler`]: Per-schema sampling cadence
//! - [`store`]: Last-value cache
//! - [`provider`]: Session provider traits and wire-level types
//! - [`simulated`]: In-process simulated host
//! - [`config`]: Client configuration
//! - [`error`]: Error types

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod event;
pub mod provider;
pub mod scheduler;
pub mod schema;
pub mod simulated;
pub mod store;

// Re-export primary API types at crate root for convenience.
pub use client::SimClient;
pub use config::ClientConfig;
pub use connection::{ConnectionManager, ConnectionState};
pub use error::{DecodeError, Result, SimlinkError};
pub use event::EventSet;
pub use provider::{Connection, ConnectionProvider, DefinitionId, EventId, Priority, Sample};
pub use schema::{Field, Schema};
pub use store::DataStore;
