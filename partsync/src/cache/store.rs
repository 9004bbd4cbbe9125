//! Sled-backed key-value store for part records and sync snapshots.
//!
//! Two key prefixes share one database: `part:{inventory_id}` holds the
//! last-fetched [`PartRecord`] plus its fetch timestamp, and
//! `snapshot:{component_id}` holds the managed field values the engine
//! last applied to that component. Eviction is by time-to-live on read,
//! never by size; inventory metadata goes stale, it does not grow.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::PartRecord;

/// Cache and snapshot store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to open store: {0}")]
    Open(String),

    #[error("failed to read from store: {0}")]
    Read(String),

    #[error("failed to write to store: {0}")]
    Write(String),

    #[error("failed to serialize entry: {0}")]
    Serialize(String),

    #[error("failed to deserialize entry: {0}")]
    Deserialize(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedPart {
    record: PartRecord,
    fetched_at: DateTime<Utc>,
}

/// Store statistics for status output.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub cached_parts: usize,
    pub snapshots: usize,
    pub size_on_disk: u64,
}

/// Durable store shared by all sync workers. Cloning is cheap and all
/// clones share the same underlying database.
#[derive(Clone)]
pub struct SyncStore {
    db: sled::Db,
}

fn part_key(inventory_id: &str) -> String {
    format!("part:{}", inventory_id)
}

fn snapshot_key(component_id: &str) -> String {
    format!("snapshot:{}", component_id)
}

impl SyncStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let db = sled::open(path).map_err(|e| StoreError::Open(e.to_string()))?;
        Ok(Self { db })
    }

    /// Cache a freshly fetched record, overwriting any previous entry.
    pub fn put_part(&self, record: &PartRecord) -> Result<(), StoreError> {
        self.put_part_at(record, Utc::now())
    }

    fn put_part_at(&self, record: &PartRecord, fetched_at: DateTime<Utc>) -> Result<(), StoreError> {
        let entry = CachedPart {
            record: record.clone(),
            fetched_at,
        };
        let value =
            serde_json::to_vec(&entry).map_err(|e| StoreError::Serialize(e.to_string()))?;
        self.db
            .insert(part_key(&record.inventory_id).as_bytes(), value)
            .map_err(|e| StoreError::Write(e.to_string()))?;
        Ok(())
    }

    /// Cached record for `inventory_id` if it is younger than `ttl`.
    /// An expired entry reads as a miss; it is not removed, so it can
    /// still be served as a stale fallback after a failed re-fetch.
    pub fn get_part_fresh(
        &self,
        inventory_id: &str,
        ttl: Duration,
    ) -> Result<Option<PartRecord>, StoreError> {
        match self.read_part(inventory_id)? {
            Some(entry) if is_fresh(entry.fetched_at, ttl) => Ok(Some(entry.record)),
            _ => Ok(None),
        }
    }

    /// Cached record regardless of age, with its fetch timestamp.
    pub fn get_part_any(
        &self,
        inventory_id: &str,
    ) -> Result<Option<(PartRecord, DateTime<Utc>)>, StoreError> {
        Ok(self
            .read_part(inventory_id)?
            .map(|entry| (entry.record, entry.fetched_at)))
    }

    /// Drop the cached record for `inventory_id`, if any.
    pub fn invalidate_part(&self, inventory_id: &str) -> Result<(), StoreError> {
        self.db
            .remove(part_key(inventory_id).as_bytes())
            .map_err(|e| StoreError::Write(e.to_string()))?;
        Ok(())
    }

    fn read_part(&self, inventory_id: &str) -> Result<Option<CachedPart>, StoreError> {
        let value = self
            .db
            .get(part_key(inventory_id).as_bytes())
            .map_err(|e| StoreError::Read(e.to_string()))?;
        match value {
            Some(bytes) => {
                let entry: CachedPart = serde_json::from_slice(&bytes)
                    .map_err(|e| StoreError::Deserialize(e.to_string()))?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    /// Managed field values the engine last applied to `component_id`.
    pub fn snapshot(
        &self,
        component_id: &str,
    ) -> Result<Option<BTreeMap<String, String>>, StoreError> {
        let value = self
            .db
            .get(snapshot_key(component_id).as_bytes())
            .map_err(|e| StoreError::Read(e.to_string()))?;
        match value {
            Some(bytes) => {
                let snapshot = serde_json::from_slice(&bytes)
                    .map_err(|e| StoreError::Deserialize(e.to_string()))?;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    pub fn put_snapshot(
        &self,
        component_id: &str,
        snapshot: &BTreeMap<String, String>,
    ) -> Result<(), StoreError> {
        let value =
            serde_json::to_vec(snapshot).map_err(|e| StoreError::Serialize(e.to_string()))?;
        self.db
            .insert(snapshot_key(component_id).as_bytes(), value)
            .map_err(|e| StoreError::Write(e.to_string()))?;
        Ok(())
    }

    pub fn remove_snapshot(&self, component_id: &str) -> Result<(), StoreError> {
        self.db
            .remove(snapshot_key(component_id).as_bytes())
            .map_err(|e| StoreError::Write(e.to_string()))?;
        Ok(())
    }

    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let cached_parts = self.db.scan_prefix("part:").count();
        let snapshots = self.db.scan_prefix("snapshot:").count();
        let size_on_disk = self
            .db
            .size_on_disk()
            .map_err(|e| StoreError::Read(e.to_string()))?;
        Ok(StoreStats {
            cached_parts,
            snapshots,
            size_on_disk,
        })
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db
            .flush()
            .map_err(|e| StoreError::Write(e.to_string()))?;
        Ok(())
    }
}

fn is_fresh(fetched_at: DateTime<Utc>, ttl: Duration) -> bool {
    let age = Utc::now().signed_duration_since(fetched_at);
    match age.to_std() {
        Ok(age) => age <= ttl,
        // Clock went backwards; treat the entry as fresh.
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FIELD_MPN, FIELD_STOCK};
    use chrono::Duration as ChronoDuration;
    use tempfile::tempdir;

    fn record(id: &str) -> PartRecord {
        PartRecord {
            inventory_id: id.to_string(),
            name: format!("part {}", id),
            manufacturer_part_number: Some("R-1206-10K".to_string()),
            description: None,
            datasheet_url: None,
            stock_quantity: 500,
            unit_price: None,
            footprint_ref: None,
            symbol_ref: None,
            storage_location: Some("Shelf A3".to_string()),
            last_modified: None,
        }
    }

    #[test]
    fn get_after_put_within_ttl_hits() {
        let dir = tempdir().unwrap();
        let store = SyncStore::open(dir.path()).unwrap();

        store.put_part(&record("42")).unwrap();
        let hit = store
            .get_part_fresh("42", Duration::from_secs(3600))
            .unwrap();
        assert_eq!(hit, Some(record("42")));
    }

    #[test]
    fn expired_entry_reads_as_miss_but_survives_as_stale() {
        let dir = tempdir().unwrap();
        let store = SyncStore::open(dir.path()).unwrap();

        let old = Utc::now() - ChronoDuration::hours(12);
        store.put_part_at(&record("42"), old).unwrap();

        assert_eq!(
            store
                .get_part_fresh("42", Duration::from_secs(3600))
                .unwrap(),
            None
        );
        let (stale, fetched_at) = store.get_part_any("42").unwrap().unwrap();
        assert_eq!(stale, record("42"));
        assert!(fetched_at < Utc::now() - ChronoDuration::hours(11));
    }

    #[test]
    fn fetch_overwrites_regardless_of_age() {
        let dir = tempdir().unwrap();
        let store = SyncStore::open(dir.path()).unwrap();

        let old = Utc::now() - ChronoDuration::hours(12);
        store.put_part_at(&record("42"), old).unwrap();

        let mut updated = record("42");
        updated.stock_quantity = 1;
        store.put_part(&updated).unwrap();

        let hit = store
            .get_part_fresh("42", Duration::from_secs(3600))
            .unwrap()
            .unwrap();
        assert_eq!(hit.stock_quantity, 1);
    }

    #[test]
    fn invalidate_removes_entry() {
        let dir = tempdir().unwrap();
        let store = SyncStore::open(dir.path()).unwrap();

        store.put_part(&record("42")).unwrap();
        store.invalidate_part("42").unwrap();
        assert_eq!(store.get_part_any("42").unwrap(), None);
    }

    #[test]
    fn snapshot_roundtrip() {
        let dir = tempdir().unwrap();
        let store = SyncStore::open(dir.path()).unwrap();

        let mut snapshot = BTreeMap::new();
        snapshot.insert(FIELD_MPN.to_string(), "R-1206-10K".to_string());
        snapshot.insert(FIELD_STOCK.to_string(), "500".to_string());

        assert_eq!(store.snapshot("R1").unwrap(), None);
        store.put_snapshot("R1", &snapshot).unwrap();
        assert_eq!(store.snapshot("R1").unwrap(), Some(snapshot));

        store.remove_snapshot("R1").unwrap();
        assert_eq!(store.snapshot("R1").unwrap(), None);
    }

    #[test]
    fn store_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = SyncStore::open(dir.path()).unwrap();
            store.put_part(&record("42")).unwrap();
            store.flush().unwrap();
        }
        let store = SyncStore::open(dir.path()).unwrap();
        assert!(store.get_part_any("42").unwrap().is_some());
    }

    #[test]
    fn stats_count_both_prefixes() {
        let dir = tempdir().unwrap();
        let store = SyncStore::open(dir.path()).unwrap();

        store.put_part(&record("1")).unwrap();
        store.put_part(&record("2")).unwrap();
        store.put_snapshot("R1", &BTreeMap::new()).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.cached_parts, 2);
        assert_eq!(stats.snapshots, 1);
    }
}
