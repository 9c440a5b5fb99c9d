use serde::{Deserialize, Serialize};

use super::{null_as_default, DeviceState, TempMetric};

/// Snapshot of on-device metrics as reported by the stats endpoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceSample {
    pub battery_percent: Option<f64>,
    pub battery_temp: Option<f64>,
    /// Only consulted when `battery_temp` is missing.
    pub cpu_temp: Option<f64>,
    pub thermal_pressure: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cpu_load: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mem_percent: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub charging: bool,
    pub platform: Option<String>,
}

impl DeviceSample {
    /// Battery temperature, falling back to the CPU sensor.
    pub fn device_temp(&self) -> Option<f64> {
        self.battery_temp.or(self.cpu_temp)
    }

    /// Device temperature with the ambient temperature as the last resort.
    pub fn device_temp_or(&self, ambient_temp: f64) -> f64 {
        self.device_temp().unwrap_or(ambient_temp)
    }

    pub fn device_state(&self) -> DeviceState {
        DeviceState::from_charging(self.charging)
    }

    pub fn temp_metric(&self) -> TempMetric {
        TempMetric::from_sample(self)
    }
}
