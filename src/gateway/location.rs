use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::warn;

use crate::models::Coordinates;

pub type DynLocation = Arc<dyn LocationProvider>;

#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_position(&self) -> Result<Coordinates>;
}

/// Position taken from configuration; fails when none was configured.
#[derive(Debug, Clone, Default)]
pub struct FixedLocation {
    coords: Option<Coordinates>,
}

impl FixedLocation {
    pub fn new(coords: Option<Coordinates>) -> Self {
        Self { coords }
    }
}

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn current_position(&self) -> Result<Coordinates> {
        self.coords
            .ok_or_else(|| anyhow!("no device location configured"))
    }
}

/// Never fails: a provider error yields `fallback`.
pub async fn locate_or_fallback(provider: &dyn LocationProvider, fallback: Coordinates) -> Coordinates {
    match provider.current_position().await {
        Ok(coords) => coords,
        Err(err) => {
            warn!(
                "location unavailable ({err:#}); using fallback {:.4},{:.4}",
                fallback.latitude, fallback.longitude
            );
            fallback
        }
    }
}
