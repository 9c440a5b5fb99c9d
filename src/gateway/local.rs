use std::{
    fs,
    path::Path,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Result;
use async_trait::async_trait;
use sysinfo::{Components, System, MINIMUM_CPU_UPDATE_INTERVAL};
use tokio::sync::Mutex;

use super::{DynGateway, TelemetryGateway};
use crate::models::{AdvisoryJudgment, AdvisoryRequest, AmbientReading, Coordinates, DeviceSample};

const POWER_SUPPLY_DIR: &str = "/sys/class/power_supply";

/// Answers stats requests from the local host and forwards ambient and
/// advisory requests to `inner`.
pub struct LocalStatsGateway {
    inner: DynGateway,
    sampler: Arc<Mutex<HostSampler>>,
}

struct HostSampler {
    system: System,
    components: Components,
    cpu_refreshed_at: Instant,
}

#[derive(Debug, Default, PartialEq)]
struct BatteryReading {
    percent: Option<f64>,
    charging: Option<bool>,
    temp: Option<f64>,
}

impl LocalStatsGateway {
    pub fn new(inner: DynGateway) -> Self {
        let mut system = System::new();

        // CPU usage is a delta between refreshes; take the baseline now.
        system.refresh_cpu_all();

        Self {
            inner,
            sampler: Arc::new(Mutex::new(HostSampler {
                system,
                components: Components::new_with_refreshed_list(),
                cpu_refreshed_at: Instant::now(),
            })),
        }
    }
}

impl HostSampler {
    fn sample(&mut self) -> DeviceSample {
        self.system.refresh_cpu_all();
        self.cpu_refreshed_at = Instant::now();
        self.system.refresh_memory();
        self.components.refresh();

        let total_memory = self.system.total_memory();
        let mem_percent = if total_memory == 0 {
            0.0
        } else {
            self.system.used_memory() as f64 / total_memory as f64 * 100.0
        };

        let cpu_temp = self
            .components
            .list()
            .iter()
            .filter(|component| is_cpu_sensor(component.label()))
            .map(|component| component.temperature())
            .filter(|temp| temp.is_finite() && *temp > 0.0)
            .fold(None, |hottest: Option<f32>, temp| {
                Some(hottest.map_or(temp, |current| current.max(temp)))
            })
            .map(|temp| round1(temp as f64));

        let battery = read_battery(Path::new(POWER_SUPPLY_DIR));

        DeviceSample {
            battery_percent: battery.percent,
            battery_temp: battery.temp,
            cpu_temp,
            thermal_pressure: None,
            cpu_load: round1(self.system.global_cpu_usage() as f64),
            mem_percent: round1(mem_percent),
            charging: battery.charging.unwrap_or(false),
            platform: Some(std::env::consts::OS.to_string()),
        }
    }
}

#[async_trait]
impl TelemetryGateway for LocalStatsGateway {
    async fn fetch_device_stats(&self) -> Result<DeviceSample> {
        let mut sampler = self.sampler.lock().await;
        let settle = cpu_settle_delay(sampler.cpu_refreshed_at.elapsed());
        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
        }
        Ok(sampler.sample())
    }

    async fn fetch_ambient(&self, at: Coordinates) -> Result<AmbientReading> {
        self.inner.fetch_ambient(at).await
    }

    async fn fetch_advisory(&self, request: &AdvisoryRequest) -> Result<AdvisoryJudgment> {
        self.inner.fetch_advisory(request).await
    }
}

/// Time still needed before a CPU refresh yields a usable delta.
fn cpu_settle_delay(since_refresh: Duration) -> Duration {
    MINIMUM_CPU_UPDATE_INTERVAL.saturating_sub(since_refresh)
}

fn is_cpu_sensor(label: &str) -> bool {
    let label = label.to_ascii_lowercase();
    ["package", "core", "cpu", "tctl", "tdie"]
        .iter()
        .any(|needle| label.contains(needle))
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// First `BAT*` entry under `dir`; `temp` is reported in tenths of a degree.
fn read_battery(dir: &Path) -> BatteryReading {
    let Ok(entries) = fs::read_dir(dir) else {
        return BatteryReading::default();
    };

    let mut batteries: Vec<_> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("BAT"))
        .map(|entry| entry.path())
        .collect();
    batteries.sort();

    let Some(battery) = batteries.first() else {
        return BatteryReading::default();
    };

    let read = |name: &str| {
        fs::read_to_string(battery.join(name))
            .ok()
            .map(|raw| raw.trim().to_string())
    };

    BatteryReading {
        percent: read("capacity").and_then(|raw| raw.parse::<f64>().ok()),
        charging: read("status").map(|status| status == "Charging" || status == "Full"),
        temp: read("temp")
            .and_then(|raw| raw.parse::<f64>().ok())
            .map(|tenths| round1(tenths / 10.0)),
    }
}
