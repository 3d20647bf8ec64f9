//! Schemas and events the demo client registers.

use simlink::error::DecodeError;
use simlink::provider::{DataType, DefinitionId, EventId, Sample};
use simlink::{EventSet, Field, Schema};

/// Aircraft position, sampled five times a second.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

impl Schema for Position {
    const ID: DefinitionId = DefinitionId(1);
    const NAME: &'static str = "position";
    const SAMPLE_INTERVAL_MS: u64 = 200;
    const FIELDS: &'static [Field] = &[
        Field::sampled("latitude", "PLANE LATITUDE", Some("degrees"), DataType::Float64),
        Field::sampled("longitude", "PLANE LONGITUDE", Some("degrees"), DataType::Float64),
        Field::sampled("altitude", "PLANE ALTITUDE", Some("feet"), DataType::Float64),
    ];

    fn from_sample(sample: &Sample) -> Result<Self, DecodeError> {
        Ok(Self {
            latitude: sample.f64(0)?,
            longitude: sample.f64(1)?,
            altitude: sample.f64(2)?,
        })
    }
}

impl Position {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "latitude": self.latitude,
            "longitude": self.longitude,
            "altitude": self.altitude,
        })
    }
}

/// Engine state, sampled once a second.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Engine {
    pub rpm: f64,
    pub combustion: i32,
    pub aircraft: String,
}

impl Schema for Engine {
    const ID: DefinitionId = DefinitionId(2);
    const NAME: &'static str = "engine";
    const SAMPLE_INTERVAL_MS: u64 = 1000;
    const FIELDS: &'static [Field] = &[
        Field::sampled("rpm", "GENERAL ENG RPM:1", Some("rpm"), DataType::Float64),
        Field::sampled("combustion", "GENERAL ENG COMBUSTION:1", Some("bool"), DataType::Int32),
        Field::sampled("aircraft", "TITLE", None, DataType::String256),
    ];

    fn from_sample(sample: &Sample) -> Result<Self, DecodeError> {
        Ok(Self {
            rpm: sample.f64(0)?,
            combustion: sample.i32(1)?,
            aircraft: sample.text(2)?.to_string(),
        })
    }
}

impl Engine {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "rpm": self.rpm,
            "combustion": self.combustion != 0,
            "aircraft": self.aircraft,
        })
    }
}

/// Control events the demo sends each time it prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    ParkingBrakes,
    Strobes,
}

impl EventSet for Control {
    const NAME: &'static str = "control";
    const MEMBERS: &'static [Self] = &[Self::ParkingBrakes, Self::Strobes];
    const EVENT_NAMES: &'static [(Self, &'static str)] = &[
        (Self::ParkingBrakes, "PARKING_BRAKES"),
        (Self::Strobes, "STROBES_TOGGLE"),
    ];

    fn id(self) -> EventId {
        EventId(self as u32)
    }
}
