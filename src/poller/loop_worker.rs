use tokio::time::{timeout, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::fusion::FusionEngine;
use crate::gateway::{locate_or_fallback, LocationProvider};
use crate::models::Coordinates;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct PollSettings {
    pub interval: Duration,
    pub request_timeout: Duration,
    pub fallback: Coordinates,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            fallback: Coordinates::FALLBACK,
        }
    }
}

/// Fetches device stats immediately and then once per `settings.interval`
/// until `cancel_token` fires. A failed or timed-out fetch leaves the last
/// sample in place and the schedule running.
pub async fn stats_loop(
    engine: FusionEngine,
    settings: PollSettings,
    activation_id: String,
    cancel_token: CancellationToken,
) {
    let gateway = engine.gateway();
    let mut ticker = tokio::time::interval(settings.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut polls: u64 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        polls += 1;
        let fetched = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            result = timeout(settings.request_timeout, gateway.fetch_device_stats()) => result,
        };

        match fetched {
            Ok(Ok(sample)) => {
                log_debug!(
                    "poll #{} ({}): cpu {:.1}% mem {:.1}% charging={}",
                    polls,
                    activation_id,
                    sample.cpu_load,
                    sample.mem_percent,
                    sample.charging
                );
                engine.on_device_sample(sample).await;
            }
            Ok(Err(err)) => log_error!(
                "stats fetch failed on poll #{} ({}); keeping last sample: {err:#}",
                polls,
                activation_id
            ),
            Err(_) => log_warn!(
                "stats fetch timeout (> {:?}) on poll #{} ({})",
                settings.request_timeout,
                polls,
                activation_id
            ),
        }
    }

    log_info!("stats poller {} shutting down after {} polls", activation_id, polls);
}

/// Resolves a position (falling back when the location capability fails or
/// stalls) and feeds the ambient reading for it into the engine. Returns
/// whether a reading arrived.
pub async fn acquire_ambient(
    engine: &FusionEngine,
    location: &dyn LocationProvider,
    settings: &PollSettings,
) -> bool {
    let coords = match timeout(
        settings.request_timeout,
        locate_or_fallback(location, settings.fallback),
    )
    .await
    {
        Ok(coords) => coords,
        Err(_) => {
            log_warn!("location timed out; using fallback");
            settings.fallback
        }
    };

    match timeout(settings.request_timeout, engine.gateway().fetch_ambient(coords)).await {
        Ok(Ok(reading)) => {
            engine.on_ambient(reading);
            true
        }
        Ok(Err(err)) => {
            log_error!(
                "ambient fetch failed for {:.4},{:.4}: {err:#}",
                coords.latitude,
                coords.longitude
            );
            false
        }
        Err(_) => {
            log_warn!("ambient fetch timeout (> {:?})", settings.request_timeout);
            false
        }
    }
}
