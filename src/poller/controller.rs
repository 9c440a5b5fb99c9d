use anyhow::{bail, Context, Result};
use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::fusion::FusionEngine;
use crate::gateway::DynLocation;

use super::loop_worker::{acquire_ambient, stats_loop, PollSettings};

/// Owns the periodic stats timer and the one-shot ambient acquisition for a
/// single activation. Dropping the controller cancels both.
pub struct PollingController {
    handle: Option<JoinHandle<()>>,
    ambient_handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
    activation_id: Option<String>,
}

impl PollingController {
    pub fn new() -> Self {
        Self {
            handle: None,
            ambient_handle: None,
            cancel_token: None,
            activation_id: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    pub fn activation_id(&self) -> Option<&str> {
        self.activation_id.as_deref()
    }

    /// Starts polling on a fresh engine session. Returns the activation id
    /// used to tag this run's log lines.
    pub fn activate(
        &mut self,
        engine: &FusionEngine,
        location: DynLocation,
        settings: PollSettings,
    ) -> Result<String> {
        if self.handle.is_some() {
            bail!("polling already active");
        }

        let activation_id = Uuid::new_v4().to_string();
        let cancel_token = engine.begin_session();
        info!(
            "Activating stats polling {} every {:?}",
            activation_id, settings.interval
        );

        let handle = tokio::spawn(stats_loop(
            engine.clone(),
            settings.clone(),
            activation_id.clone(),
            cancel_token.clone(),
        ));

        let ambient_handle = tokio::spawn({
            let engine = engine.clone();
            let token = cancel_token.clone();
            async move {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {}
                    _ = acquire_ambient(&engine, location.as_ref(), &settings) => {}
                }
            }
        });

        self.handle = Some(handle);
        self.ambient_handle = Some(ambient_handle);
        self.cancel_token = Some(cancel_token);
        self.activation_id = Some(activation_id.clone());
        Ok(activation_id)
    }

    /// Stops the timer and waits for the poller to exit. Safe to call when
    /// inactive.
    pub async fn deactivate(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(id) = self.activation_id.take() {
            info!("Deactivating stats polling {id}");
        }

        if let Some(handle) = self.ambient_handle.take() {
            handle
                .await
                .context("ambient acquisition task failed to join")?;
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("stats poller task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

impl Default for PollingController {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PollingController {
    fn drop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
    }
}
