use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{AdvisoryJudgment, AdvisoryRequest, AmbientReading, DeviceSample};

/// Latest known stats, ambient reading and advisory. Updates consume the old
/// state and hand back the next one.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FusionState {
    pub sample: Option<DeviceSample>,
    pub ambient: Option<AmbientReading>,
    pub advisory: Option<AdvisoryJudgment>,
    /// Bumped on every sample arrival.
    pub sample_seq: u64,
    pub sampled_at: Option<DateTime<Utc>>,
}

impl FusionState {
    pub fn with_sample(self, sample: DeviceSample, at: DateTime<Utc>) -> Self {
        Self {
            sample: Some(sample),
            sample_seq: self.sample_seq + 1,
            sampled_at: Some(at),
            ..self
        }
    }

    pub fn with_ambient(self, ambient: AmbientReading) -> Self {
        Self {
            ambient: Some(ambient),
            ..self
        }
    }

    pub fn with_advisory(self, advisory: AdvisoryJudgment) -> Self {
        Self {
            advisory: Some(advisory),
            ..self
        }
    }

    /// Both halves of the fusion are present.
    pub fn is_live(&self) -> bool {
        self.sample.is_some() && self.ambient.is_some()
    }

    pub fn advisory_request(&self) -> Option<AdvisoryRequest> {
        match (&self.sample, &self.ambient) {
            (Some(sample), Some(ambient)) => Some(advisory_request(sample, ambient)),
            _ => None,
        }
    }

    /// Battery, then CPU, then ambient temperature.
    pub fn device_temp(&self) -> Option<f64> {
        let sample = self.sample.as_ref()?;
        sample
            .device_temp()
            .or_else(|| self.ambient.as_ref().map(|ambient| ambient.temp))
    }
}

pub fn advisory_request(sample: &DeviceSample, ambient: &AmbientReading) -> AdvisoryRequest {
    AdvisoryRequest {
        battery_temp: sample.device_temp_or(ambient.temp),
        ambient_temp: ambient.temp,
        device_state: sample.device_state(),
    }
}
