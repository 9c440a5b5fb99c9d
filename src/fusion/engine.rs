use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex as StdMutex,
};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::gateway::DynGateway;
use crate::history::HistoryLedger;
use crate::models::{AdvisoryRequest, AmbientReading, DeviceSample};

use super::FusionState;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// When a fused record is written to history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryPolicy {
    /// On every stats arrival, pairing the new sample with whatever ambient
    /// reading and advisory are current, even if the advisory predates it.
    #[default]
    OnSample,
    /// When an advisory resolves, pairing it with the sample and ambient
    /// reading it was computed from. At most one record per sample.
    OnFreshAdvisory,
}

/// Owns the current fusion state and turns sample/ambient arrivals into
/// advisory requests and history records.
///
/// Advisory requests are never deduplicated: whichever response resolves last
/// becomes the current judgment. Results tied to a session that has since
/// ended are dropped without touching state.
#[derive(Clone)]
pub struct FusionEngine {
    state: Arc<watch::Sender<FusionState>>,
    ledger: Arc<Mutex<HistoryLedger>>,
    gateway: DynGateway,
    policy: HistoryPolicy,
    session: Arc<StdMutex<CancellationToken>>,
    recorded_seq: Arc<AtomicU64>,
}

impl FusionEngine {
    pub fn new(gateway: DynGateway, ledger: HistoryLedger, policy: HistoryPolicy) -> Self {
        let (state_tx, _) = watch::channel(FusionState::default());
        Self {
            state: Arc::new(state_tx),
            ledger: Arc::new(Mutex::new(ledger)),
            gateway,
            policy,
            session: Arc::new(StdMutex::new(CancellationToken::new())),
            recorded_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn gateway(&self) -> DynGateway {
        self.gateway.clone()
    }

    pub fn ledger(&self) -> Arc<Mutex<HistoryLedger>> {
        self.ledger.clone()
    }

    pub fn state(&self) -> FusionState {
        self.state.borrow().clone()
    }

    /// Receives every state transition; the rendering layer hangs off this.
    pub fn subscribe(&self) -> watch::Receiver<FusionState> {
        self.state.subscribe()
    }

    /// Starts a new session and returns its token. Any previous session is
    /// ended first.
    pub fn begin_session(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let mut guard = self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.cancel();
        *guard = token.clone();
        token
    }

    /// Ends the current session. In-flight work belonging to it is discarded
    /// when it completes.
    pub fn end_session(&self) {
        self.current_session().cancel();
    }

    pub fn current_session(&self) -> CancellationToken {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Stores a fresh device sample and, when an ambient reading is known,
    /// fires an advisory request. Returns the request task, if one started.
    pub async fn on_device_sample(&self, sample: DeviceSample) -> Option<JoinHandle<()>> {
        let session = self.current_session();
        if session.is_cancelled() {
            log_debug!("discarding device sample for an ended session");
            return None;
        }

        let now = Utc::now();
        self.state
            .send_modify(|state| *state = std::mem::take(state).with_sample(sample, now));
        let snapshot = self.state();

        if self.policy == HistoryPolicy::OnSample {
            if let (Some(sample), Some(ambient), Some(advisory)) =
                (&snapshot.sample, &snapshot.ambient, &snapshot.advisory)
            {
                let mut ledger = self.ledger.lock().await;
                let record = ledger.append(sample, Some(ambient), Some(advisory));
                log_debug!("history record {} appended on sample arrival", record.id);
            }
        }

        self.request_advisory(&snapshot, session)
    }

    /// Stores an ambient reading and, when a sample is known, fires an
    /// advisory request.
    pub fn on_ambient(&self, ambient: AmbientReading) -> Option<JoinHandle<()>> {
        let session = self.current_session();
        if session.is_cancelled() {
            log_debug!("discarding ambient reading for an ended session");
            return None;
        }

        log_info!(
            "ambient reading: {} {:.1}°C {}",
            ambient.name,
            ambient.temp,
            ambient.condition
        );
        self.state
            .send_modify(|state| *state = std::mem::take(state).with_ambient(ambient));
        let snapshot = self.state();
        self.request_advisory(&snapshot, session)
    }

    fn request_advisory(
        &self,
        snapshot: &FusionState,
        session: CancellationToken,
    ) -> Option<JoinHandle<()>> {
        let request = snapshot.advisory_request()?;
        let sample = snapshot.sample.clone()?;
        let ambient = snapshot.ambient.clone()?;
        let seq = snapshot.sample_seq;
        let engine = self.clone();

        Some(tokio::spawn(async move {
            engine
                .resolve_advisory(request, seq, sample, ambient, session)
                .await;
        }))
    }

    async fn resolve_advisory(
        &self,
        request: AdvisoryRequest,
        seq: u64,
        sample: DeviceSample,
        ambient: AmbientReading,
        session: CancellationToken,
    ) {
        let result = self.gateway.fetch_advisory(&request).await;

        if session.is_cancelled() {
            log_debug!("dropping advisory that resolved after its session ended");
            return;
        }

        let judgment = match result {
            Ok(judgment) => judgment,
            Err(err) => {
                log_warn!("advisory fetch failed; keeping previous judgment: {err:#}");
                return;
            }
        };

        log_info!(
            "advisory {} for {:.1}°C/{:.1}°C {} (impact {:.5})",
            judgment.alert_level.as_str(),
            request.battery_temp,
            request.ambient_temp,
            request.device_state.as_str(),
            judgment.predicted_health_impact
        );

        if self.policy == HistoryPolicy::OnFreshAdvisory {
            let previous = self.recorded_seq.fetch_max(seq, Ordering::SeqCst);
            if seq > previous {
                let mut ledger = self.ledger.lock().await;
                ledger.append(&sample, Some(&ambient), Some(&judgment));
            }
        }

        self.state
            .send_modify(|state| *state = std::mem::take(state).with_advisory(judgment));
    }
}
