pub mod chart;
pub mod config;
pub mod dashboard;
pub mod fusion;
pub mod gateway;
pub mod history;
pub mod models;
pub mod poller;
pub mod store;
pub mod utils;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{error, info};

use config::{DashboardConfig, StoreBackend};
use dashboard::{Dashboard, DashboardView};
use gateway::{DynGateway, DynLocation, FixedLocation, HttpGateway, IntoDynGateway, LocalStatsGateway};
use history::{HistoryLedger, HISTORY_KEY};
use store::{JsonFileStore, MemoryStore, SharedStore, SqliteStore};

pub fn run() {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("ThermoSense starting up...");

    let config = DashboardConfig::load();
    let result = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")
        .and_then(|runtime| runtime.block_on(serve(config)));

    if let Err(err) = result {
        error!("ThermoSense stopped: {err:#}");
        std::process::exit(1);
    }
}

async fn serve(config: DashboardConfig) -> Result<()> {
    let store = build_store(&config)?;
    let ledger = HistoryLedger::restore_with(store, HISTORY_KEY, config.history_capacity);
    let gateway = build_gateway(&config)?;
    let location: DynLocation = Arc::new(FixedLocation::new(config.location));

    let mut dashboard = Dashboard::from_config(&config, gateway, location, ledger);
    let mut updates = dashboard.subscribe();
    dashboard.activate()?;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            signal = &mut shutdown => {
                signal.context("Failed to listen for Ctrl-C")?;
                info!("Shutdown requested");
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                log_view(&dashboard.view().await);
            }
        }
    }

    dashboard.deactivate().await
}

pub fn build_store(config: &DashboardConfig) -> Result<SharedStore> {
    if config.store == StoreBackend::Memory {
        return Ok(Arc::new(MemoryStore::new()));
    }

    std::fs::create_dir_all(&config.data_dir).with_context(|| {
        format!(
            "Failed to create data directory {}",
            config.data_dir.display()
        )
    })?;

    let store: SharedStore = match config.store {
        StoreBackend::Sqlite => Arc::new(SqliteStore::new(config.store_path())?),
        StoreBackend::Json | StoreBackend::Memory => {
            Arc::new(JsonFileStore::new(config.store_path())?)
        }
    };
    Ok(store)
}

pub fn build_gateway(config: &DashboardConfig) -> Result<DynGateway> {
    let http = HttpGateway::new(&config.api_root, config.request_timeout())?.into_dyn();
    if config.local_stats {
        info!("Sampling device stats from this host");
        return Ok(LocalStatsGateway::new(http).into_dyn());
    }
    Ok(http)
}

fn log_view(view: &DashboardView) {
    let Some(sample) = view.state.sample.as_ref() else {
        return;
    };

    let device = view
        .state
        .device_temp()
        .map(|temp| format!("{temp:.1}°C"))
        .unwrap_or_else(|| "--".into());
    let ambient = view
        .state
        .ambient
        .as_ref()
        .map(|reading| format!("{:.1}°C in {}", reading.temp, reading.name))
        .unwrap_or_else(|| "pending".into());
    let advisory = view
        .state
        .advisory
        .as_ref()
        .map(|judgment| judgment.alert_level.as_str())
        .unwrap_or("pending");

    info!(
        "{} {device} | ambient {ambient} | cpu {:.0}% mem {:.0}% | advisory {advisory} | history {}/{} | updated {}",
        view.temperature_title.unwrap_or("Device temperature"),
        sample.cpu_load,
        sample.mem_percent,
        view.history_len,
        view.history_capacity,
        view.last_update.as_deref().unwrap_or("never"),
    );
}
