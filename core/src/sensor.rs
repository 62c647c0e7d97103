use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Metadata a client submits to register a sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NewSensor {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "type")]
    pub kind: String,
    pub mac_address: String,
    pub manufacturer: String,
    pub model: String,
    pub serie_number: String,
    pub firmware_version: String,
    pub description: String,
}

/// Canonical sensor as stored in the registry.
///
/// The id is assigned by the registry and copied into every projection,
/// the document store keeps the full record as well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Sensor {
    pub id: i32,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "type")]
    pub kind: String,
    pub mac_address: String,
    pub manufacturer: String,
    pub model: String,
    pub serie_number: String,
    pub firmware_version: String,
    pub description: String,
}

impl Sensor {
    pub fn from_new(id: i32, new: NewSensor) -> Self {
        Sensor {
            id,
            name: new.name,
            latitude: new.latitude,
            longitude: new.longitude,
            kind: new.kind,
            mac_address: new.mac_address,
            manufacturer: new.manufacturer,
            model: new.model,
            serie_number: new.serie_number,
            firmware_version: new.firmware_version,
            description: new.description,
        }
    }

    pub fn search_document(&self) -> SearchDocument {
        SearchDocument {
            name: self.name.clone(),
            kind: self.kind.clone(),
            description: self.description.clone(),
        }
    }
}

/// The free-text projection kept in the search index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchDocument {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
}

impl SearchDocument {
    /// Field lookup by the names clients use in search queries
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "name" => Some(&self.name),
            "type" => Some(&self.kind),
            "description" => Some(&self.description),
            _ => None,
        }
    }
}
