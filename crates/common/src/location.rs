//! Location enrichment attached to a snapshot when consent allows it.

use serde::{Deserialize, Serialize};

/// A position fix in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Coordinates plus the address resolved for them, if the lookup succeeded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationEnrichment {
    pub latitude: f64,
    pub longitude: f64,
    /// Address structure as returned by the reverse lookup
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<serde_json::Value>,
}

impl LocationEnrichment {
    pub fn coordinates_only(coords: Coordinates) -> Self {
        Self {
            latitude: coords.latitude,
            longitude: coords.longitude,
            address: None,
        }
    }

    pub fn with_address(coords: Coordinates, address: serde_json::Value) -> Self {
        Self {
            latitude: coords.latitude,
            longitude: coords.longitude,
            address: Some(address),
        }
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}
