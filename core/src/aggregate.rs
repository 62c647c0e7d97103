use crate::Sensor;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Battery levels strictly below this fraction count as low
pub const LOW_BATTERY_THRESHOLD: f64 = 0.2;

/// Per-sensor temperature statistics as computed by the wide-column store.
#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureStats {
    pub id: i32,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

/// Latest battery row recorded for a sensor. `None` when the reading
/// that produced the row carried no battery level.
#[derive(Debug, Clone, PartialEq)]
pub struct BatteryLevel {
    pub id: i32,
    pub battery_level: Option<f64>,
}

impl BatteryLevel {
    pub fn is_low(&self) -> bool {
        matches!(self.battery_level, Some(level) if level < LOW_BATTERY_THRESHOLD)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TypeQuantity {
    #[serde(rename = "type")]
    pub kind: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TemperatureValues {
    pub max_temperature: f64,
    pub min_temperature: f64,
    pub average_temperature: f64,
}

impl From<&TemperatureStats> for TemperatureValues {
    fn from(stats: &TemperatureStats) -> Self {
        TemperatureValues {
            max_temperature: stats.max,
            min_temperature: stats.min,
            average_temperature: stats.avg,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorTemperature {
    #[serde(flatten)]
    pub sensor: Sensor,
    pub values: TemperatureValues,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowBatterySensor {
    #[serde(flatten)]
    pub sensor: Sensor,
    pub battery_level: f64,
}

/// Envelope used by every aggregate endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorsResponse<T> {
    pub sensors: Vec<T>,
}

impl<T> From<Vec<T>> for SensorsResponse<T> {
    fn from(sensors: Vec<T>) -> Self {
        SensorsResponse { sensors }
    }
}

pub fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_low_battery_threshold() {
        let low = BatteryLevel {
            id: 1,
            battery_level: Some(0.1),
        };
        let edge = BatteryLevel {
            id: 2,
            battery_level: Some(0.2),
        };
        let missing = BatteryLevel {
            id: 3,
            battery_level: None,
        };

        assert!(low.is_low());
        assert!(!edge.is_low());
        assert!(!missing.is_low());
    }

    #[test]
    fn test_round_to_cents() {
        assert_eq!(round_to_cents(0.1), 0.1);
        assert_eq!(round_to_cents(0.123456), 0.12);
        assert_eq!(round_to_cents(0.199), 0.2);
    }
}
