use serde::{Deserialize, Serialize};

/// Severity of an advisory, ordered `Safe < Warning < Danger`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Safe,
    Warning,
    Danger,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Safe => "safe",
            AlertLevel::Warning => "warning",
            AlertLevel::Danger => "danger",
        }
    }
}

impl Default for AlertLevel {
    fn default() -> Self {
        AlertLevel::Safe
    }
}

/// Coarse charging classification submitted with an advisory request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceState {
    Charging,
    Idle,
}

impl DeviceState {
    pub fn from_charging(charging: bool) -> Self {
        if charging {
            DeviceState::Charging
        } else {
            DeviceState::Idle
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceState::Charging => "charging",
            DeviceState::Idle => "idle",
        }
    }
}

/// Body of `POST /advisory`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryRequest {
    pub battery_temp: f64,
    pub ambient_temp: f64,
    pub device_state: DeviceState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryJudgment {
    pub alert_level: AlertLevel,
    pub natural_language_tip: String,
    #[serde(default)]
    pub optional_action: Option<String>,
    pub predicted_health_impact: f64,
}
