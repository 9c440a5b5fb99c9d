use serde::{Deserialize, Serialize};

use super::null_as_default;

/// Outdoor conditions at the device's location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmbientReading {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    pub temp: f64,
    /// Older history blobs stored this under `main`.
    #[serde(default, alias = "main", deserialize_with = "null_as_default")]
    pub condition: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Used whenever the location capability cannot produce a fix.
    pub const FALLBACK: Coordinates = Coordinates {
        latitude: 23.2599,
        longitude: 77.4126,
    };

    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl Default for Coordinates {
    fn default() -> Self {
        Self::FALLBACK
    }
}
