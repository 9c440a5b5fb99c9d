//! Bounded, durable, newest-first log of fused samples.
//!
//! The in-memory sequence and the stored blob are kept in lockstep: every
//! mutation writes the whole ledger back before returning. Storage failures are
//! logged and otherwise ignored, so the ledger keeps working from memory when
//! the disk does not.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use log::{error, info, warn};

use crate::models::{AdvisoryJudgment, AmbientReading, DeviceSample, FusedRecord, RecordId};
use crate::store::{BlobStore, SharedStore};

pub const HISTORY_KEY: &str = "thermosense_history";
pub const DEFAULT_CAPACITY: usize = 50;

pub struct HistoryLedger {
    store: SharedStore,
    key: String,
    capacity: usize,
    records: Vec<FusedRecord>,
    last_id: RecordId,
}

impl HistoryLedger {
    pub fn restore(store: SharedStore) -> Self {
        Self::restore_with(store, HISTORY_KEY, DEFAULT_CAPACITY)
    }

    /// Hydrates from `store`. Missing, unreadable or corrupt blobs start an
    /// empty ledger.
    pub fn restore_with(store: SharedStore, key: &str, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut records = match load(store.as_ref(), key) {
            Ok(records) => records,
            Err(err) => {
                error!("Failed to restore history from '{key}': {err:#}");
                Vec::new()
            }
        };

        if records.len() > capacity {
            warn!(
                "Stored history holds {} records; keeping newest {}",
                records.len(),
                capacity
            );
            records.truncate(capacity);
        }

        let last_id = records.iter().map(|record| record.id).max().unwrap_or(0);
        info!("Restored {} history records", records.len());

        Self {
            store,
            key: key.to_string(),
            capacity,
            records,
            last_id,
        }
    }

    /// Newest first.
    pub fn records(&self) -> &[FusedRecord] {
        &self.records
    }

    /// The `n` newest records, newest first.
    pub fn recent(&self, n: usize) -> &[FusedRecord] {
        &self.records[..n.min(self.records.len())]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn append(
        &mut self,
        sample: &DeviceSample,
        ambient: Option<&AmbientReading>,
        advisory: Option<&AdvisoryJudgment>,
    ) -> &FusedRecord {
        self.append_at(Utc::now(), sample, ambient, advisory)
    }

    pub(crate) fn append_at(
        &mut self,
        now: DateTime<Utc>,
        sample: &DeviceSample,
        ambient: Option<&AmbientReading>,
        advisory: Option<&AdvisoryJudgment>,
    ) -> &FusedRecord {
        let record = FusedRecord {
            id: self.next_id(now),
            timestamp: now,
            stats: sample.clone(),
            ambient: ambient.cloned(),
            advisory: advisory.cloned(),
        };

        self.records.insert(0, record);
        self.records.truncate(self.capacity);
        self.persist();

        &self.records[0]
    }

    /// Returns whether a record was removed. Unknown ids are a no-op.
    pub fn delete_by_id(&mut self, id: RecordId) -> bool {
        let before = self.records.len();
        self.records.retain(|record| record.id != id);
        let removed = self.records.len() != before;
        if removed {
            self.persist();
        }
        removed
    }

    /// Empties the ledger and erases the stored copy. When the store refuses
    /// the delete, an empty ledger is written over it instead.
    pub fn clear(&mut self) {
        self.records.clear();
        if let Err(err) = self.store.delete(&self.key) {
            warn!(
                "Failed to erase stored history '{}' ({err:#}); overwriting with an empty ledger",
                self.key
            );
            self.persist();
        }
        info!("History cleared");
    }

    /// Writes the ledger, newest first, as pretty-printed JSON.
    pub fn export_json(&self, path: &Path) -> Result<()> {
        let serialized = serde_json::to_string_pretty(&self.records)?;
        std::fs::write(path, serialized)
            .with_context(|| format!("Failed to export history to {}", path.display()))
    }

    pub fn export_file_name(date: NaiveDate) -> String {
        format!("thermosense-history-{}.json", date.format("%Y-%m-%d"))
    }

    fn next_id(&mut self, now: DateTime<Utc>) -> RecordId {
        let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        let id = if millis > self.last_id {
            millis
        } else {
            self.last_id + 1
        };
        self.last_id = id;
        id
    }

    fn persist(&self) {
        let result = serde_json::to_string(&self.records)
            .context("failed to serialize history")
            .and_then(|blob| self.store.set(&self.key, &blob));
        if let Err(err) = result {
            error!("Failed to persist history '{}': {err:#}", self.key);
        }
    }
}

fn load(store: &dyn BlobStore, key: &str) -> Result<Vec<FusedRecord>> {
    match store.get(key)? {
        Some(blob) => serde_json::from_str(&blob).context("stored history is not valid JSON"),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::bail;
    use chrono::Duration;

    use super::*;
    use crate::models::AlertLevel;
    use crate::store::MemoryStore;

    struct BrokenStore;

    impl BlobStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            bail!("disk on fire")
        }
        fn set(&self, _key: &str, _blob: &str) -> Result<()> {
            bail!("disk on fire")
        }
        fn delete(&self, _key: &str) -> Result<()> {
            bail!("disk on fire")
        }
    }

    /// Reads and writes work; deletes always fail.
    struct UndeletableStore(MemoryStore);

    impl BlobStore for UndeletableStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.0.get(key)
        }
        fn set(&self, key: &str, blob: &str) -> Result<()> {
            self.0.set(key, blob)
        }
        fn delete(&self, _key: &str) -> Result<()> {
            bail!("read-only directory")
        }
    }

    fn sample(temp: f64) -> DeviceSample {
        DeviceSample {
            battery_temp: Some(temp),
            cpu_load: 10.0,
            mem_percent: 40.0,
            ..Default::default()
        }
    }

    fn ambient() -> AmbientReading {
        AmbientReading {
            name: "Bhopal".into(),
            temp: 29.0,
            condition: "Clear".into(),
        }
    }

    fn advisory() -> AdvisoryJudgment {
        AdvisoryJudgment {
            alert_level: AlertLevel::Safe,
            natural_language_tip: "Normal operation is fine.".into(),
            optional_action: None,
            predicted_health_impact: 0.12,
        }
    }

    #[test]
    fn never_exceeds_capacity_and_evicts_oldest_first() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let mut ledger = HistoryLedger::restore(store);
        let start = Utc::now();

        for i in 0..75 {
            ledger.append_at(
                start + Duration::seconds(i),
                &sample(20.0 + i as f64),
                None,
                None,
            );
            assert!(ledger.len() <= DEFAULT_CAPACITY);
        }

        assert_eq!(ledger.len(), DEFAULT_CAPACITY);
        // Newest first: the 75th append sits at the head, the 26th at the tail.
        assert_eq!(ledger.records()[0].stats.battery_temp, Some(94.0));
        assert_eq!(
            ledger.records()[DEFAULT_CAPACITY - 1].stats.battery_temp,
            Some(45.0)
        );
    }

    #[test]
    fn eviction_follows_insertion_order_not_timestamp() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let mut ledger = HistoryLedger::restore_with(store, HISTORY_KEY, 2);
        let now = Utc::now();

        ledger.append_at(now, &sample(1.0), None, None);
        // Clock stepped backwards; still the newest insertion.
        ledger.append_at(now - Duration::hours(1), &sample(2.0), None, None);
        ledger.append_at(now - Duration::hours(2), &sample(3.0), None, None);

        let temps: Vec<_> = ledger
            .records()
            .iter()
            .map(|record| record.stats.battery_temp)
            .collect();
        assert_eq!(temps, vec![Some(3.0), Some(2.0)]);
    }

    #[test]
    fn ids_stay_unique_within_one_millisecond() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let mut ledger = HistoryLedger::restore(store);
        let now = Utc::now();

        let first = ledger.append_at(now, &sample(1.0), None, None).id;
        let second = ledger.append_at(now, &sample(2.0), None, None).id;
        assert_eq!(second, first + 1);
    }

    #[test]
    fn restore_reproduces_persisted_sequence() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let mut ledger = HistoryLedger::restore(store.clone());
        ledger.append(&sample(30.0), Some(&ambient()), Some(&advisory()));
        ledger.append(&sample(31.0), Some(&ambient()), None);
        let doomed = ledger.append(&sample(32.0), None, None).id;
        ledger.append(&sample(33.0), Some(&ambient()), Some(&advisory()));
        assert!(ledger.delete_by_id(doomed));
        let expected = ledger.records().to_vec();
        drop(ledger);

        let restarted = HistoryLedger::restore(store);
        assert_eq!(restarted.records(), expected.as_slice());
    }

    #[test]
    fn ids_keep_increasing_after_restart() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let far_future = Utc::now() + Duration::days(365);
        let mut ledger = HistoryLedger::restore(store.clone());
        let stored_id = ledger.append_at(far_future, &sample(30.0), None, None).id;
        drop(ledger);

        let mut restarted = HistoryLedger::restore(store);
        let id = restarted.append(&sample(31.0), None, None).id;
        assert!(id > stored_id);
    }

    #[test]
    fn deleting_unknown_id_is_a_noop() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let mut ledger = HistoryLedger::restore(store);
        ledger.append(&sample(30.0), None, None);
        ledger.append(&sample(31.0), None, None);
        let before = ledger.records().to_vec();

        assert!(!ledger.delete_by_id(42));
        assert_eq!(ledger.records(), before.as_slice());
    }

    #[test]
    fn clear_then_restore_is_empty() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let mut ledger = HistoryLedger::restore(store.clone());
        ledger.append(&sample(30.0), Some(&ambient()), Some(&advisory()));
        ledger.clear();
        assert!(ledger.is_empty());
        assert_eq!(store.get(HISTORY_KEY).unwrap(), None);

        assert!(HistoryLedger::restore(store).is_empty());
    }

    #[test]
    fn corrupt_blob_restores_empty() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        store.set(HISTORY_KEY, "{not json").unwrap();
        assert!(HistoryLedger::restore(store).is_empty());
    }

    #[test]
    fn broken_store_degrades_to_memory_only() {
        let mut ledger = HistoryLedger::restore(Arc::new(BrokenStore));
        assert!(ledger.is_empty());

        let id = ledger.append(&sample(30.0), None, None).id;
        assert_eq!(ledger.len(), 1);
        assert!(ledger.delete_by_id(id));
        ledger.clear();
        assert!(ledger.is_empty());
    }

    #[test]
    fn clear_survives_restart_when_delete_fails() {
        let store: SharedStore = Arc::new(UndeletableStore(MemoryStore::new()));
        let mut ledger = HistoryLedger::restore(store.clone());
        ledger.append(&sample(30.0), Some(&ambient()), Some(&advisory()));
        ledger.append(&sample(31.0), Some(&ambient()), None);

        ledger.clear();
        assert!(ledger.is_empty());

        let restored = HistoryLedger::restore(store.clone());
        assert!(restored.is_empty());
        assert_eq!(store.get(HISTORY_KEY).unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn oversized_blob_is_trimmed_on_restore() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let mut big = HistoryLedger::restore_with(store.clone(), HISTORY_KEY, 10);
        for i in 0..10 {
            big.append(&sample(i as f64), None, None);
        }
        drop(big);

        let small = HistoryLedger::restore_with(store, HISTORY_KEY, 4);
        assert_eq!(small.len(), 4);
        assert_eq!(small.records()[0].stats.battery_temp, Some(9.0));
    }

    #[test]
    fn absent_snapshots_are_stored_as_null() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let mut ledger = HistoryLedger::restore(store.clone());
        ledger.append(&sample(30.0), None, None);

        let blob = store.get(HISTORY_KEY).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&blob).unwrap();
        assert!(value[0]["ambient"].is_null());
        assert!(value[0]["advisory"].is_null());
    }

    #[test]
    fn export_writes_full_ledger() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let mut ledger = HistoryLedger::restore(store);
        ledger.append(&sample(30.0), Some(&ambient()), Some(&advisory()));
        ledger.append(&sample(31.0), None, None);

        let dir = tempfile::tempdir().unwrap();
        let name = HistoryLedger::export_file_name(NaiveDate::from_ymd_opt(2025, 7, 27).unwrap());
        assert_eq!(name, "thermosense-history-2025-07-27.json");

        let path = dir.path().join(name);
        ledger.export_json(&path).unwrap();
        let exported: Vec<FusedRecord> =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(exported.as_slice(), ledger.records());
    }
}
