//! Scripted collaborators shared by the async tests.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::gateway::TelemetryGateway;
use crate::models::{
    AdvisoryJudgment, AdvisoryRequest, AlertLevel, AmbientReading, Coordinates, DeviceSample,
};

pub(crate) fn sample(battery_temp: f64) -> DeviceSample {
    DeviceSample {
        battery_percent: Some(80.0),
        battery_temp: Some(battery_temp),
        cpu_load: 20.0,
        mem_percent: 50.0,
        platform: Some("linux".into()),
        ..Default::default()
    }
}

pub(crate) fn ambient(temp: f64) -> AmbientReading {
    AmbientReading {
        name: "Bhopal".into(),
        temp,
        condition: "Clear".into(),
    }
}

pub(crate) fn judgment(level: AlertLevel) -> AdvisoryJudgment {
    AdvisoryJudgment {
        alert_level: level,
        natural_language_tip: format!("{} tip", level.as_str()),
        optional_action: None,
        predicted_health_impact: 0.25,
    }
}

type PendingAdvisory = oneshot::Receiver<Result<AdvisoryJudgment>>;

/// Gateway whose answers are queued or held open by the test.
///
/// Stats pop from a queue (default sample once empty). Advisory calls for a
/// battery temperature registered with `hold_advisory` wait for the test to
/// answer; all others resolve immediately with a safe judgment.
pub(crate) struct MockGateway {
    stats: Mutex<VecDeque<Result<DeviceSample>>>,
    held: Mutex<HashMap<u64, PendingAdvisory>>,
    fail_ambient: AtomicBool,
    fail_advisory: AtomicBool,
    pub stats_calls: AtomicUsize,
    pub ambient_calls: Mutex<Vec<Coordinates>>,
    pub advisory_requests: Mutex<Vec<AdvisoryRequest>>,
}

impl MockGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            stats: Mutex::new(VecDeque::new()),
            held: Mutex::new(HashMap::new()),
            fail_ambient: AtomicBool::new(false),
            fail_advisory: AtomicBool::new(false),
            stats_calls: AtomicUsize::new(0),
            ambient_calls: Mutex::new(Vec::new()),
            advisory_requests: Mutex::new(Vec::new()),
        })
    }

    pub fn push_stats(&self, result: Result<DeviceSample>) {
        self.stats.lock().unwrap().push_back(result);
    }

    pub fn fail_ambient(&self) {
        self.fail_ambient.store(true, Ordering::SeqCst);
    }

    pub fn heal_ambient(&self) {
        self.fail_ambient.store(false, Ordering::SeqCst);
    }

    pub fn fail_advisory(&self) {
        self.fail_advisory.store(true, Ordering::SeqCst);
    }

    pub fn hold_advisory(&self, battery_temp: f64) -> oneshot::Sender<Result<AdvisoryJudgment>> {
        let (tx, rx) = oneshot::channel();
        self.held.lock().unwrap().insert(battery_temp.to_bits(), rx);
        tx
    }

    pub fn stats_calls(&self) -> usize {
        self.stats_calls.load(Ordering::SeqCst)
    }

    pub fn advisory_count(&self) -> usize {
        self.advisory_requests.lock().unwrap().len()
    }
}

#[async_trait]
impl TelemetryGateway for MockGateway {
    async fn fetch_device_stats(&self) -> Result<DeviceSample> {
        self.stats_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.stats.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(sample(30.0)))
    }

    async fn fetch_ambient(&self, at: Coordinates) -> Result<AmbientReading> {
        self.ambient_calls.lock().unwrap().push(at);
        if self.fail_ambient.load(Ordering::SeqCst) {
            return Err(anyhow!("weather service error"));
        }
        Ok(ambient(24.0))
    }

    async fn fetch_advisory(&self, request: &AdvisoryRequest) -> Result<AdvisoryJudgment> {
        self.advisory_requests.lock().unwrap().push(request.clone());
        let held = self
            .held
            .lock()
            .unwrap()
            .remove(&request.battery_temp.to_bits());
        if let Some(rx) = held {
            return rx.await.map_err(|_| anyhow!("advisory sender dropped"))?;
        }
        if self.fail_advisory.load(Ordering::SeqCst) {
            return Err(anyhow!("advisory service error"));
        }
        Ok(judgment(AlertLevel::Safe))
    }
}
