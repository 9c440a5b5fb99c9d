mod advisory;
mod ambient;
mod metric;
mod record;
mod sample;

pub use advisory::{AdvisoryJudgment, AdvisoryRequest, AlertLevel, DeviceState};
pub use ambient::{AmbientReading, Coordinates};
pub use metric::{grade, MetricGrades, TempMetric};
pub use record::{FusedRecord, RecordId};
pub use sample::DeviceSample;

use serde::{Deserialize, Deserializer};

/// Gateways report missing values as explicit `null`; treat those like an
/// absent field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
