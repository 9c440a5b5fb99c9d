use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::chart::DEFAULT_CHART_WINDOW;
use crate::fusion::HistoryPolicy;
use crate::history::DEFAULT_CAPACITY;
use crate::models::Coordinates;
use crate::poller::{PollSettings, DEFAULT_POLL_INTERVAL};

pub const CONFIG_PATH_ENV: &str = "THERMOSENSE_CONFIG";
pub const API_ROOT_ENV: &str = "THERMOSENSE_API_ROOT";
pub const DATA_DIR_ENV: &str = "THERMOSENSE_DATA_DIR";
pub const DEBUG_ENV: &str = "THERMOSENSE_DEBUG";

const DEFAULT_API_ROOT: &str = "http://127.0.0.1:8000";
const DEFAULT_DATA_DIR: &str = ".thermosense";
const DEBUG_POLL_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Json,
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub api_root: String,
    pub data_dir: PathBuf,
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub history_capacity: usize,
    pub chart_window: usize,
    /// Fixed device position; `None` means the fallback is used.
    pub location: Option<Coordinates>,
    pub fallback_location: Coordinates,
    pub store: StoreBackend,
    pub local_stats: bool,
    pub history_policy: HistoryPolicy,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_root: DEFAULT_API_ROOT.into(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            poll_interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
            request_timeout_secs: 10,
            history_capacity: DEFAULT_CAPACITY,
            chart_window: DEFAULT_CHART_WINDOW,
            location: None,
            fallback_location: Coordinates::FALLBACK,
            store: StoreBackend::default(),
            local_stats: false,
            history_policy: HistoryPolicy::default(),
        }
    }
}

impl DashboardConfig {
    /// Reads the config named by the environment (or the default path under
    /// the data directory) and applies environment overrides.
    pub fn load() -> Self {
        let lookup = |key: &str| std::env::var(key).ok();
        let path = Self::config_path(&lookup);
        let mut config = Self::from_file(&path).unwrap_or_else(|err| {
            warn!("Ignoring config at {}: {err:#}", path.display());
            Self::default()
        });
        config.apply_overrides(lookup);
        config
    }

    fn config_path(lookup: &impl Fn(&str) -> Option<String>) -> PathBuf {
        if let Some(path) = lookup(CONFIG_PATH_ENV) {
            return PathBuf::from(path);
        }
        lookup(DATA_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
            .join("config.json")
    }

    /// Missing file → defaults; unreadable or malformed file → `Err`.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config at {}", path.display()))
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(api_root) = lookup(API_ROOT_ENV).filter(|value| !value.is_empty()) {
            self.api_root = api_root;
        }
        if let Some(data_dir) = lookup(DATA_DIR_ENV).filter(|value| !value.is_empty()) {
            self.data_dir = PathBuf::from(data_dir);
        }
        if lookup(DEBUG_ENV).is_some_and(|value| is_truthy(&value)) {
            self.poll_interval_secs = DEBUG_POLL_INTERVAL_SECS;
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: self.poll_interval(),
            request_timeout: self.request_timeout(),
            fallback: self.fallback_location,
        }
    }

    pub fn store_path(&self) -> PathBuf {
        match self.store {
            StoreBackend::Sqlite => self.data_dir.join("thermosense.sqlite3"),
            StoreBackend::Json | StoreBackend::Memory => self.data_dir.join("store"),
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
