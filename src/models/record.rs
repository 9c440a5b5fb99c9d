use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AdvisoryJudgment, AmbientReading, DeviceSample};

/// Creation time in milliseconds, bumped past the previous id on collisions.
pub type RecordId = u64;

/// One history entry: a frozen copy of what the dashboard showed at a point
/// in time. Absent ambient or advisory snapshots are stored as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedRecord {
    pub id: RecordId,
    pub timestamp: DateTime<Utc>,
    pub stats: DeviceSample,
    #[serde(alias = "weather")]
    pub ambient: Option<AmbientReading>,
    pub advisory: Option<AdvisoryJudgment>,
}

impl FusedRecord {
    pub fn device_temp(&self) -> Option<f64> {
        self.stats.device_temp()
    }

    pub fn ambient_temp(&self) -> Option<f64> {
        self.ambient.as_ref().map(|reading| reading.temp)
    }
}
