//! Data schema declarations and the schema registry.
//!
//! A schema is an application struct the host can be asked to sample. Instead
//! of discovering fields at runtime, each schema implements [`Schema`] and
//! describes itself with compile-time tables: an identity, a sampling
//! interval and an ordered list of [`Field`]s. Registration turns those tables
//! into a validated [`SchemaDescriptor`] that knows how to declare itself on a
//! connection and how to decode inbound samples back into the struct.
//!
//! # Example
//!
//! ```rust
//! use simlink::provider::{DataType, DefinitionId, Sample};
//! use simlink::schema::{Field, Schema, SchemaRegistry};
//! use simlink::error::DecodeError;
//!
//! #[derive(Debug, Clone, Default, PartialEq)]
//! struct Altitude {
//!     feet: f64,
//! }
//!
//! impl Schema for Altitude {
//!     const ID: DefinitionId = DefinitionId(1);
//!     const NAME: &'static str = "altitude";
//!     const SAMPLE_INTERVAL_MS: u64 = 200;
//!     const FIELDS: &'static [Field] = &[
//!         Field::sampled("feet", "PLANE ALTITUDE", Some("feet"), DataType::Float64),
//!     ];
//!
//!     fn from_sample(sample: &Sample) -> Result<Self, DecodeError> {
//!         Ok(Self { feet: sample.f64(0)? })
//!     }
//! }
//!
//! let mut registry = SchemaRegistry::new();
//! registry.register::<Altitude>().unwrap();
//! assert_eq!(registry.len(), 1);
//! ```

use std::any::type_name;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ConnectionError, DecodeError, SchemaError};
use crate::provider::{Connection, DataType, DefinitionId, Sample};
use crate::store::StoredValue;

/// One member of a schema struct.
///
/// Only sampled fields (those with a protocol name) are declared on the
/// connection. Structural members exist on the struct but are never sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Field {
    /// Name of the struct member, used in diagnostics.
    pub member: &'static str,
    /// Protocol-level sample name, or `None` for structural members.
    pub name: Option<&'static str>,
    /// Optional unit the host converts the value to.
    pub unit: Option<&'static str>,
    /// Data type the value is declared with.
    pub data_type: DataType,
}

impl Field {
    /// Declares a sampled field.
    pub const fn sampled(
        member: &'static str,
        name: &'static str,
        unit: Option<&'static str>,
        data_type: DataType,
    ) -> Self {
        Self {
            member,
            name: Some(name),
            unit,
            data_type,
        }
    }

    /// Declares a structural member that is never sampled.
    pub const fn structural(member: &'static str) -> Self {
        Self {
            member,
            name: None,
            unit: None,
            data_type: DataType::Float64,
        }
    }

    /// Returns `true` if this field is declared on the connection.
    pub fn is_sampled(&self) -> bool {
        self.name.is_some()
    }
}

/// A structured value the host can sample.
///
/// Implementors describe themselves with associated constants; the
/// [`SchemaRegistry`] validates them when the schema is registered.
pub trait Schema: Default + Clone + Send + Sync + 'static {
    /// Wire-level definition key. Also keys the stored latest value.
    const ID: DefinitionId;
    /// Human-readable schema name.
    const NAME: &'static str;
    /// Minimum time between two sample requests, in milliseconds.
    const SAMPLE_INTERVAL_MS: u64;
    /// Struct members in declaration order.
    const FIELDS: &'static [Field];

    /// Builds the value from a sample whose values follow the order of the
    /// sampled entries in [`FIELDS`](Self::FIELDS).
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if the sample does not match the declaration.
    fn from_sample(sample: &Sample) -> Result<Self, DecodeError>;
}

type Decoder = fn(&Sample) -> Result<StoredValue, DecodeError>;

fn decode_as<T: Schema>(sample: &Sample) -> Result<StoredValue, DecodeError> {
    let value: StoredValue = Arc::new(T::from_sample(sample)?);
    Ok(value)
}

/// A validated, immutable schema declaration.
///
/// Created once per [`SchemaRegistry::register`] call and replayed onto every
/// connection the loop establishes.
#[derive(Clone)]
pub struct SchemaDescriptor {
    id: DefinitionId,
    name: &'static str,
    type_name: &'static str,
    interval: Duration,
    fields: &'static [Field],
    decode: Decoder,
}

impl std::fmt::Debug for SchemaDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("interval", &self.interval)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

impl SchemaDescriptor {
    /// Builds and validates the descriptor for `T`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] if:
    /// - the schema name is empty
    /// - the sampling interval is zero
    /// - no field is sampled
    /// - a sampled field has an empty name or an empty unit
    pub fn of<T: Schema>() -> std::result::Result<Self, SchemaError> {
        let descriptor = Self {
            id: T::ID,
            name: T::NAME,
            type_name: type_name::<T>(),
            interval: Duration::from_millis(T::SAMPLE_INTERVAL_MS),
            fields: T::FIELDS,
            decode: decode_as::<T>,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    fn validate(&self) -> std::result::Result<(), SchemaError> {
        if self.name.trim().is_empty() {
            return Err(SchemaError::MissingName { id: self.id });
        }

        if self.interval.is_zero() {
            return Err(SchemaError::ZeroInterval { schema: self.name });
        }

        for field in self.fields {
            let Some(name) = field.name else {
                continue;
            };
            if name.trim().is_empty() {
                return Err(SchemaError::MissingFieldName {
                    schema: self.name,
                    member: field.member,
                });
            }
            if field.unit.is_some_and(|unit| unit.trim().is_empty()) {
                return Err(SchemaError::EmptyUnit {
                    schema: self.name,
                    member: field.member,
                });
            }
        }

        if !self.fields.iter().any(Field::is_sampled) {
            return Err(SchemaError::NoSampledFields { schema: self.name });
        }

        Ok(())
    }

    /// The definition id.
    pub fn id(&self) -> DefinitionId {
        self.id
    }

    /// The schema name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Rust type the schema decodes into.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Minimum time between two sample requests.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// All declared members, including structural ones.
    pub fn fields(&self) -> &'static [Field] {
        self.fields
    }

    /// Iterates the fields that are declared on the connection.
    pub fn sampled_fields(&self) -> impl Iterator<Item = &'static Field> {
        self.fields.iter().filter(|f| f.is_sampled())
    }

    /// Declares this schema on an open connection.
    ///
    /// Adds every sampled field in order, then finalizes the definition.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] if the host rejects any call.
    pub fn apply(&self, connection: &mut dyn Connection) -> Result<(), ConnectionError> {
        for field in self.sampled_fields() {
            if let Some(name) = field.name {
                connection.add_to_data_definition(self.id, name, field.unit, field.data_type)?;
            }
        }
        connection.register_data_definition(self.id)
    }

    /// Decodes an inbound sample into the schema's type.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if the sample does not match the declaration.
    pub fn decode(&self, sample: &Sample) -> Result<StoredValue, DecodeError> {
        (self.decode)(sample)
    }
}

/// Append-only list of registered schemas, in registration order.
///
/// # Thread Safety
///
/// The registry itself is not synchronized. The client keeps it behind a
/// lock and the connection loop works from a snapshot taken at connect time.
#[derive(Debug, Default, Clone)]
pub struct SchemaRegistry {
    descriptors: Vec<SchemaDescriptor>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates `T` and appends its descriptor.
    ///
    /// Registering the same schema twice appends two independent entries;
    /// both are declared and sampled on every connection.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] if `T`'s metadata is incomplete.
    pub fn register<T: Schema>(&mut self) -> std::result::Result<&SchemaDescriptor, SchemaError> {
        let descriptor = SchemaDescriptor::of::<T>()?;
        tracing::debug!(
            schema = descriptor.name,
            id = %descriptor.id,
            interval_ms = T::SAMPLE_INTERVAL_MS,
            "registered schema"
        );
        self.descriptors.push(descriptor);
        Ok(&self.descriptors[self.descriptors.len() - 1])
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Returns `true` if nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Descriptors in registration order.
    pub fn descriptors(&self) -> &[SchemaDescriptor] {
        &self.descriptors
    }

    /// First descriptor registered under `id`.
    pub fn find(&self, id: DefinitionId) -> Option<&SchemaDescriptor> {
        self.descriptors.iter().find(|d| d.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Value;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Position {
        latitude: f64,
        longitude: f64,
        tail_number: String,
    }

    impl Schema for Position {
        const ID: DefinitionId = DefinitionId(7);
        const NAME: &'static str = "position";
        const SAMPLE_INTERVAL_MS: u64 = 250;
        const FIELDS: &'static [Field] = &[
            Field::sampled("latitude", "PLANE LATITUDE", Some("degrees"), DataType::Float64),
            Field::structural("cached_heading"),
            Field::sampled("longitude", "PLANE LONGITUDE", Some("degrees"), DataType::Float64),
            Field::sampled("tail_number", "ATC ID", None, DataType::String256),
        ];

        fn from_sample(sample: &Sample) -> Result<Self, DecodeError> {
            Ok(Self {
                latitude: sample.f64(0)?,
                longitude: sample.f64(1)?,
                tail_number: sample.text(2)?.to_string(),
            })
        }
    }

    #[derive(Debug, Clone, Default)]
    struct Unnamed;

    impl Schema for Unnamed {
        const ID: DefinitionId = DefinitionId(8);
        const NAME: &'static str = "unnamed";
        const SAMPLE_INTERVAL_MS: u64 = 100;
        const FIELDS: &'static [Field] =
            &[Field::sampled("speed", "", Some("knots"), DataType::Float64)];

        fn from_sample(_sample: &Sample) -> Result<Self, DecodeError> {
            Ok(Self)
        }
    }

    #[derive(Debug, Clone, Default)]
    struct OnlyStructural;

    impl Schema for OnlyStructural {
        const ID: DefinitionId = DefinitionId(9);
        const NAME: &'static str = "only_structural";
        const SAMPLE_INTERVAL_MS: u64 = 100;
        const FIELDS: &'static [Field] = &[Field::structural("scratch")];

        fn from_sample(_sample: &Sample) -> Result<Self, DecodeError> {
            Ok(Self)
        }
    }

    #[derive(Debug, Clone, Default)]
    struct NoInterval;

    impl Schema for NoInterval {
        const ID: DefinitionId = DefinitionId(10);
        const NAME: &'static str = "no_interval";
        const SAMPLE_INTERVAL_MS: u64 = 0;
        const FIELDS: &'static [Field] =
            &[Field::sampled("rpm", "GENERAL ENG RPM:1", Some("rpm"), DataType::Float64)];

        fn from_sample(_sample: &Sample) -> Result<Self, DecodeError> {
            Ok(Self)
        }
    }

    #[derive(Debug, Clone, Default)]
    struct BlankName;

    impl Schema for BlankName {
        const ID: DefinitionId = DefinitionId(11);
        const NAME: &'static str = " ";
        const SAMPLE_INTERVAL_MS: u64 = 100;
        const FIELDS: &'static [Field] =
            &[Field::sampled("rpm", "GENERAL ENG RPM:1", None, DataType::Float64)];

        fn from_sample(_sample: &Sample) -> Result<Self, DecodeError> {
            Ok(Self)
        }
    }

    #[derive(Debug, Clone, Default)]
    struct EmptyUnit;

    impl Schema for EmptyUnit {
        const ID: DefinitionId = DefinitionId(12);
        const NAME: &'static str = "empty_unit";
        const SAMPLE_INTERVAL_MS: u64 = 100;
        const FIELDS: &'static [Field] =
            &[Field::sampled("rpm", "GENERAL ENG RPM:1", Some(""), DataType::Float64)];

        fn from_sample(_sample: &Sample) -> Result<Self, DecodeError> {
            Ok(Self)
        }
    }

    #[test]
    fn test_descriptor_metadata() {
        let descriptor = SchemaDescriptor::of::<Position>().unwrap();

        assert_eq!(descriptor.id(), DefinitionId(7));
        assert_eq!(descriptor.name(), "position");
        assert_eq!(descriptor.interval(), Duration::from_millis(250));
        assert_eq!(descriptor.fields().len(), 4);
        assert!(descriptor.type_name().ends_with("Position"));

        let sampled: Vec<_> = descriptor.sampled_fields().filter_map(|f| f.name).collect();
        assert_eq!(sampled, ["PLANE LATITUDE", "PLANE LONGITUDE", "ATC ID"]);
    }

    #[test]
    fn test_descriptor_decodes_typed_value() {
        let descriptor = SchemaDescriptor::of::<Position>().unwrap();
        let sample = Sample::new(vec![
            Value::Float64(47.45),
            Value::Float64(-122.31),
            Value::Text("N172SP".to_string()),
        ]);

        let stored = descriptor.decode(&sample).unwrap();
        let position = stored.downcast_ref::<Position>().unwrap();
        assert_eq!(position.latitude, 47.45);
        assert_eq!(position.longitude, -122.31);
        assert_eq!(position.tail_number, "N172SP");
    }

    #[test]
    fn test_descriptor_decode_rejects_mismatched_sample() {
        let descriptor = SchemaDescriptor::of::<Position>().unwrap();
        let sample = Sample::new(vec![Value::Float64(1.0)]);

        assert!(descriptor.decode(&sample).is_err());
    }

    #[test]
    fn test_rejects_missing_field_name() {
        assert_eq!(
            SchemaDescriptor::of::<Unnamed>().unwrap_err(),
            SchemaError::MissingFieldName {
                schema: "unnamed",
                member: "speed",
            }
        );
    }

    #[test]
    fn test_rejects_schema_without_sampled_fields() {
        assert_eq!(
            SchemaDescriptor::of::<OnlyStructural>().unwrap_err(),
            SchemaError::NoSampledFields {
                schema: "only_structural",
            }
        );
    }

    #[test]
    fn test_rejects_zero_interval() {
        assert_eq!(
            SchemaDescriptor::of::<NoInterval>().unwrap_err(),
            SchemaError::ZeroInterval {
                schema: "no_interval",
            }
        );
    }

    #[test]
    fn test_rejects_blank_schema_name() {
        assert_eq!(
            SchemaDescriptor::of::<BlankName>().unwrap_err(),
            SchemaError::MissingName {
                id: DefinitionId(11),
            }
        );
    }

    #[test]
    fn test_rejects_empty_unit() {
        assert_eq!(
            SchemaDescriptor::of::<EmptyUnit>().unwrap_err(),
            SchemaError::EmptyUnit {
                schema: "empty_unit",
                member: "rpm",
            }
        );
    }

    #[test]
    fn test_registry_appends_without_dedup() {
        let mut registry = SchemaRegistry::new();
        assert!(registry.is_empty());

        registry.register::<Position>().unwrap();
        registry.register::<Position>().unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.descriptors()[0].id(), registry.descriptors()[1].id());
        assert_eq!(registry.find(DefinitionId(7)).unwrap().name(), "position");
        assert!(registry.find(DefinitionId(99)).is_none());
    }

    #[test]
    fn test_registry_failed_registration_leaves_registry_unchanged() {
        let mut registry = SchemaRegistry::new();
        registry.register::<Position>().unwrap();

        assert!(registry.register::<Unnamed>().is_err());
        assert_eq!(registry.len(), 1);
    }
}
