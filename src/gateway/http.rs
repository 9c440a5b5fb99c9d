use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;

use super::TelemetryGateway;
use crate::models::{AdvisoryJudgment, AdvisoryRequest, AmbientReading, Coordinates, DeviceSample};

/// JSON-over-HTTP client for the ThermoSense backend.
pub struct HttpGateway {
    http: Client,
    api_root: String,
}

impl HttpGateway {
    pub fn new(api_root: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            api_root: api_root.trim_end_matches('/').to_string(),
        })
    }

    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_root, path)
    }
}

#[async_trait]
impl TelemetryGateway for HttpGateway {
    async fn fetch_device_stats(&self) -> Result<DeviceSample> {
        self.http
            .get(self.url("/system_stats"))
            .send()
            .await
            .context("system stats request failed")?
            .error_for_status()
            .context("system stats endpoint returned an error")?
            .json::<DeviceSample>()
            .await
            .context("parse system stats")
    }

    async fn fetch_ambient(&self, at: Coordinates) -> Result<AmbientReading> {
        self.http
            .get(self.url("/weather"))
            .query(&[("lat", at.latitude), ("lon", at.longitude)])
            .send()
            .await
            .context("weather request failed")?
            .error_for_status()
            .context("weather endpoint returned an error")?
            .json::<AmbientReading>()
            .await
            .context("parse weather reading")
    }

    async fn fetch_advisory(&self, request: &AdvisoryRequest) -> Result<AdvisoryJudgment> {
        self.http
            .post(self.url("/advisory"))
            .json(request)
            .send()
            .await
            .context("advisory request failed")?
            .error_for_status()
            .context("advisory endpoint returned an error")?
            .json::<AdvisoryJudgment>()
            .await
            .context("parse advisory judgment")
    }
}
