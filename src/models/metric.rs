use serde::Serialize;

use super::{AlertLevel, DeviceSample};

/// The single temperature-ish reading a sample can offer, picked once so
/// downstream consumers don't repeat the presence checks.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TempMetric {
    BatteryTemp(f64),
    CpuTemp(f64),
    ThermalPressure(Option<String>),
}

impl TempMetric {
    pub fn from_sample(sample: &DeviceSample) -> Self {
        match (sample.battery_temp, sample.cpu_temp) {
            (Some(temp), _) => TempMetric::BatteryTemp(temp),
            (None, Some(temp)) => TempMetric::CpuTemp(temp),
            (None, None) => TempMetric::ThermalPressure(sample.thermal_pressure.clone()),
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            TempMetric::BatteryTemp(_) => "Battery Temperature",
            TempMetric::CpuTemp(_) => "CPU Temperature",
            TempMetric::ThermalPressure(_) => "Thermal Pressure",
        }
    }

    pub fn level(&self) -> AlertLevel {
        match self {
            TempMetric::BatteryTemp(temp) => grade(*temp, 30.0, 40.0),
            TempMetric::CpuTemp(temp) => grade(*temp, 50.0, 70.0),
            TempMetric::ThermalPressure(label) => match label.as_deref() {
                Some("Critical") => AlertLevel::Danger,
                Some("Serious") | Some("Elevated") => AlertLevel::Warning,
                _ => AlertLevel::Safe,
            },
        }
    }
}

/// Bands `value` with strict thresholds: above `danger` is danger, above
/// `warning` is warning.
pub fn grade(value: f64, warning: f64, danger: f64) -> AlertLevel {
    if value > danger {
        AlertLevel::Danger
    } else if value > warning {
        AlertLevel::Warning
    } else {
        AlertLevel::Safe
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricGrades {
    pub battery: AlertLevel,
    pub temperature: TempMetric,
    pub temperature_level: AlertLevel,
    pub cpu_load: AlertLevel,
    pub memory: AlertLevel,
}

impl MetricGrades {
    pub fn for_sample(sample: &DeviceSample) -> Self {
        let temperature = sample.temp_metric();
        Self {
            battery: if sample.charging {
                AlertLevel::Warning
            } else {
                AlertLevel::Safe
            },
            temperature_level: temperature.level(),
            temperature,
            cpu_load: grade(sample.cpu_load, 50.0, 80.0),
            memory: grade(sample.mem_percent, 60.0, 80.0),
        }
    }

    /// Worst band across every gauge.
    pub fn worst(&self) -> AlertLevel {
        [
            self.battery,
            self.temperature_level,
            self.cpu_load,
            self.memory,
        ]
        .into_iter()
        .max()
        .unwrap_or_default()
    }
}
