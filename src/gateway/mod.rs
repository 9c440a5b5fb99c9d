//! Request/response access to the three remote services the dashboard fuses:
//! device stats, ambient conditions, and the advisory judgment.

mod http;
mod local;
mod location;

pub use http::HttpGateway;
pub use local::LocalStatsGateway;
pub use location::{locate_or_fallback, DynLocation, FixedLocation, LocationProvider};

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{AdvisoryJudgment, AdvisoryRequest, AmbientReading, Coordinates, DeviceSample};

pub type DynGateway = Arc<dyn TelemetryGateway>;

/// Each call is an independent round trip; implementations keep no state
/// between calls that callers could observe.
#[async_trait]
pub trait TelemetryGateway: Send + Sync {
    async fn fetch_device_stats(&self) -> Result<DeviceSample>;

    async fn fetch_ambient(&self, at: Coordinates) -> Result<AmbientReading>;

    async fn fetch_advisory(&self, request: &AdvisoryRequest) -> Result<AdvisoryJudgment>;
}

pub trait IntoDynGateway {
    fn into_dyn(self) -> DynGateway
    where
        Self: Sized + TelemetryGateway + 'static,
    {
        Arc::new(self)
    }
}

impl<T> IntoDynGateway for T where T: TelemetryGateway + 'static {}
