use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A single observation pushed by a sensor.
///
/// `last_seen` together with the sensor id is the uniqueness key in the
/// time-series store, all metric fields are optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SensorDataMessage {
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub velocity: Option<f64>,
    #[serde(default)]
    pub battery_level: Option<f64>,
    pub last_seen: DateTime<Utc>,
}

impl std::default::Default for SensorDataMessage {
    fn default() -> Self {
        SensorDataMessage {
            temperature: None,
            humidity: None,
            velocity: None,
            battery_level: None,
            last_seen: Utc::now(),
        }
    }
}

/// Latest known state of a sensor: identity merged with the cached reading.
///
/// `data` is flattened, a sensor without a cached reading serializes
/// to just `{id, name}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub id: i32,
    pub name: String,
    #[serde(flatten)]
    pub data: Option<SensorDataMessage>,
}

/// One bucket-aligned window of averaged readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BucketRow {
    pub id: i32,
    pub bucket_start: DateTime<Utc>,
    pub velocity: Option<f64>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
}
