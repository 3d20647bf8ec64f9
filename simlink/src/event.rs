//! Client event declarations and the event registry.
//!
//! An event set is an application enum whose members are symbolic control
//! events. Each set implements [`EventSet`] with an explicit table mapping
//! members to protocol-level event names. The table is checked exhaustively
//! when the set is registered, so a member without a name is a configuration
//! error long before any connection exists.

use crate::error::{ConnectionError, EventError};
use crate::provider::{Connection, EventId};

/// An application enum of client events.
///
/// # Example
///
/// ```rust
/// use simlink::event::{EventRegistry, EventSet};
/// use simlink::provider::EventId;
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// enum Lights {
///     Landing,
///     Taxi,
/// }
///
/// impl EventSet for Lights {
///     const NAME: &'static str = "lights";
///     const MEMBERS: &'static [Self] = &[Self::Landing, Self::Taxi];
///     const EVENT_NAMES: &'static [(Self, &'static str)] = &[
///         (Self::Landing, "LANDING_LIGHTS_TOGGLE"),
///         (Self::Taxi, "TOGGLE_TAXI_LIGHTS"),
///     ];
///
///     fn id(self) -> EventId {
///         EventId(100 + self as u32)
///     }
/// }
///
/// let mut registry = EventRegistry::new();
/// registry.register::<Lights>().unwrap();
/// assert_eq!(registry.len(), 1);
/// ```
pub trait EventSet: Copy + Eq + Send + Sync + 'static {
    /// Human-readable name of the set.
    const NAME: &'static str;
    /// Every member of the enum.
    const MEMBERS: &'static [Self];
    /// Member to protocol event name table. Must cover every member.
    const EVENT_NAMES: &'static [(Self, &'static str)];

    /// Wire-level id the member is mapped and transmitted under.
    fn id(self) -> EventId;
}

/// A validated event set: every member paired with its protocol name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSetDescriptor {
    set: &'static str,
    mappings: Vec<(EventId, &'static str)>,
}

impl EventSetDescriptor {
    /// Builds the mapping table for `E`, checking it covers every member.
    ///
    /// # Errors
    ///
    /// Returns [`EventError`] if `E` has no members, or if any member has no
    /// entry or an empty entry in [`EventSet::EVENT_NAMES`].
    pub fn of<E: EventSet>() -> std::result::Result<Self, EventError> {
        if E::MEMBERS.is_empty() {
            return Err(EventError::Empty { set: E::NAME });
        }

        let mut mappings = Vec::with_capacity(E::MEMBERS.len());
        for &member in E::MEMBERS {
            let event = member.id();
            let name = E::EVENT_NAMES
                .iter()
                .find(|(candidate, _)| *candidate == member)
                .map(|&(_, name)| name)
                .ok_or(EventError::MissingEventName { set: E::NAME, event })?;

            if name.trim().is_empty() {
                return Err(EventError::EmptyEventName { set: E::NAME, event });
            }

            mappings.push((event, name));
        }

        Ok(Self {
            set: E::NAME,
            mappings,
        })
    }

    /// Name of the event set.
    pub fn set(&self) -> &'static str {
        self.set
    }

    /// `(id, protocol name)` pairs in member order.
    pub fn mappings(&self) -> &[(EventId, &'static str)] {
        &self.mappings
    }

    /// Maps every member onto an open connection.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] if the host rejects a mapping.
    pub fn apply(&self, connection: &mut dyn Connection) -> Result<(), ConnectionError> {
        for &(event, name) in &self.mappings {
            connection.map_client_event(event, name)?;
        }
        Ok(())
    }
}

/// Append-only list of registered event sets, in registration order.
#[derive(Debug, Default, Clone)]
pub struct EventRegistry {
    sets: Vec<EventSetDescriptor>,
}

impl EventRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates `E` and appends its mapping table.
    ///
    /// # Errors
    ///
    /// Returns [`EventError`] if any member of `E` lacks a protocol name.
    pub fn register<E: EventSet>(&mut self) -> std::result::Result<&EventSetDescriptor, EventError> {
        let descriptor = EventSetDescriptor::of::<E>()?;
        tracing::debug!(
            set = descriptor.set,
            events = descriptor.mappings.len(),
            "registered event set"
        );
        self.sets.push(descriptor);
        Ok(&self.sets[self.sets.len() - 1])
    }

    /// Number of registered sets.
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Returns `true` if nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Registered sets in registration order.
    pub fn sets(&self) -> &[EventSetDescriptor] {
        &self.sets
    }
}
