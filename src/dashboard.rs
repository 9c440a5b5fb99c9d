use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{Local, Utc};
use log::{info, warn};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::chart::{self, ChartPoint};
use crate::config::DashboardConfig;
use crate::fusion::{FusionEngine, FusionState};
use crate::gateway::{DynGateway, DynLocation};
use crate::history::HistoryLedger;
use crate::models::{MetricGrades, RecordId};
use crate::poller::{acquire_ambient, PollSettings, PollingController};
use crate::utils::format_age;

/// Everything the renderer draws for one frame.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub state: FusionState,
    pub metrics: Option<MetricGrades>,
    /// Heading for the temperature card, following the metric actually shown.
    pub temperature_title: Option<&'static str>,
    pub chart: Vec<ChartPoint>,
    pub history_len: usize,
    pub history_capacity: usize,
    pub last_update: Option<String>,
}

pub struct Dashboard {
    engine: FusionEngine,
    poller: PollingController,
    location: DynLocation,
    settings: PollSettings,
    chart_window: usize,
}

impl Dashboard {
    pub fn new(
        engine: FusionEngine,
        location: DynLocation,
        settings: PollSettings,
        chart_window: usize,
    ) -> Self {
        Self {
            engine,
            poller: PollingController::new(),
            location,
            settings,
            chart_window,
        }
    }

    pub fn from_config(
        config: &DashboardConfig,
        gateway: DynGateway,
        location: DynLocation,
        ledger: HistoryLedger,
    ) -> Self {
        let engine = FusionEngine::new(gateway, ledger, config.history_policy);
        Self::new(engine, location, config.poll_settings(), config.chart_window)
    }

    pub fn engine(&self) -> &FusionEngine {
        &self.engine
    }

    pub fn is_active(&self) -> bool {
        self.poller.is_active()
    }

    pub fn activate(&mut self) -> Result<String> {
        self.poller
            .activate(&self.engine, self.location.clone(), self.settings.clone())
    }

    pub async fn deactivate(&mut self) -> Result<()> {
        self.poller.deactivate().await
    }

    /// Re-runs ambient acquisition for the current activation. Returns `None`
    /// when the dashboard is not active.
    pub fn refresh_ambient(&self) -> Option<JoinHandle<bool>> {
        let session = self.engine.current_session();
        if !self.is_active() || session.is_cancelled() {
            warn!("Ambient refresh requested while inactive; ignoring");
            return None;
        }

        let engine = self.engine.clone();
        let location = self.location.clone();
        let settings = self.settings.clone();
        Some(tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = session.cancelled() => false,
                acquired = acquire_ambient(&engine, location.as_ref(), &settings) => acquired,
            }
        }))
    }

    pub fn subscribe(&self) -> watch::Receiver<FusionState> {
        self.engine.subscribe()
    }

    pub async fn delete_history(&self, id: RecordId) -> bool {
        let ledger = self.engine.ledger();
        let removed = ledger.lock().await.delete_by_id(id);
        if removed {
            info!("Deleted history record {id}");
        }
        removed
    }

    /// Clears history only if `confirm`, given the current record count,
    /// agrees.
    pub async fn clear_history(&self, confirm: impl FnOnce(usize) -> bool) -> bool {
        let ledger = self.engine.ledger();
        let mut ledger = ledger.lock().await;
        if !confirm(ledger.len()) {
            return false;
        }
        ledger.clear();
        info!("Cleared history");
        true
    }

    /// Writes the ledger into `dir` under today's export file name.
    pub async fn export_history(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(HistoryLedger::export_file_name(Local::now().date_naive()));
        let ledger = self.engine.ledger();
        ledger.lock().await.export_json(&path)?;
        info!("Exported history to {}", path.display());
        Ok(path)
    }

    pub async fn view(&self) -> DashboardView {
        let state = self.engine.state();
        let ledger = self.engine.ledger();
        let ledger = ledger.lock().await;

        let last_update = state.sampled_at.map(|at| {
            let age = Utc::now().signed_duration_since(at);
            format_age(age.to_std().unwrap_or_default())
        });

        let metrics = state.sample.as_ref().map(MetricGrades::for_sample);

        DashboardView {
            temperature_title: metrics.as_ref().map(|grades| grades.temperature.title()),
            metrics,
            chart: chart::project(&state, ledger.recent(self.chart_window), self.chart_window),
            history_len: ledger.len(),
            history_capacity: ledger.capacity(),
            last_update,
            state,
        }
    }
}
