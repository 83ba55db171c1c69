//! TargetStore — redb-backed persistence for monitored targets.
//!
//! Provides typed CRUD operations over targets plus the filtered reads the
//! scheduler needs (active targets for re-arming after a restart, aggregate
//! stats for the control surface). All values are JSON-serialized into
//! redb's `&[u8]` value column. The store supports both on-disk and
//! in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::TARGETS;
use crate::types::{NewTarget, Target, TargetId, TargetStats, epoch_secs};

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe target store backed by redb.
#[derive(Clone)]
pub struct TargetStore {
    db: Arc<Database>,
}

impl TargetStore {
    /// Open (or create) a persistent target store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "target store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory target store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory target store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(TARGETS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Persist a new target, allocating the next free id.
    ///
    /// Runtime state starts zeroed: no failures, no probe timestamps. The
    /// caller (the scheduler's add path) is responsible for validation and
    /// URL normalization before the record reaches the store.
    pub fn create_target(&self, new: &NewTarget) -> StateResult<Target> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let target;
        {
            let mut table = txn.open_table(TARGETS).map_err(map_err!(Table))?;
            let next_id = table
                .last()
                .map_err(map_err!(Read))?
                .map(|(key, _)| key.value() + 1)
                .unwrap_or(1);
            target = Target {
                id: next_id,
                url: new.url.clone(),
                credential: new.credential.clone(),
                method: new.method,
                interval_min: new.interval_min,
                interval_max: new.interval_max,
                active: new.active,
                consecutive_failures: 0,
                last_probe_at: None,
                last_status: None,
                next_probe_at: None,
                created_at: epoch_secs(),
            };
            let value = serde_json::to_vec(&target).map_err(map_err!(Serialize))?;
            table
                .insert(next_id, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(target_id = target.id, url = %target.url, "target created");
        Ok(target)
    }

    /// Insert or update a target record.
    pub fn update_target(&self, target: &Target) -> StateResult<()> {
        let value = serde_json::to_vec(target).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(TARGETS).map_err(map_err!(Table))?;
            table
                .insert(target.id, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Get a target by id.
    pub fn get_target(&self, id: TargetId) -> StateResult<Option<Target>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(TARGETS).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => {
                let target: Target =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(target))
            }
            None => Ok(None),
        }
    }

    /// List all targets, in id order.
    pub fn list_targets(&self) -> StateResult<Vec<Target>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(TARGETS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let target: Target =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(target);
        }
        Ok(results)
    }

    /// List targets with `active == true` (the set to re-arm at startup).
    pub fn list_active_targets(&self) -> StateResult<Vec<Target>> {
        let mut targets = self.list_targets()?;
        targets.retain(|t| t.active);
        Ok(targets)
    }

    /// Delete a target by id. Returns true if it existed.
    pub fn delete_target(&self, id: TargetId) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(TARGETS).map_err(map_err!(Table))?;
            existed = table.remove(id).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(target_id = id, existed, "target deleted");
        Ok(existed)
    }

    /// Aggregate counts over all targets (single scan).
    pub fn stats(&self) -> StateResult<TargetStats> {
        let mut stats = TargetStats::default();
        for target in self.list_targets()? {
            stats.total += 1;
            if target.active {
                stats.active += 1;
            }
            if target.consecutive_failures > 0 {
                stats.failing += 1;
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProbeMethod;

    fn test_new_target(url: &str) -> NewTarget {
        NewTarget {
            url: url.to_string(),
            credential: None,
            method: ProbeMethod::Get,
            interval_min: 30,
            interval_max: 60,
            active: true,
        }
    }

    #[test]
    fn create_assigns_sequential_ids() {
        let store = TargetStore::open_in_memory().unwrap();

        let a = store.create_target(&test_new_target("https://a.example")).unwrap();
        let b = store.create_target(&test_new_target("https://b.example")).unwrap();

        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(a.consecutive_failures, 0);
        assert_eq!(a.last_probe_at, None);
        assert_eq!(a.next_probe_at, None);
    }

    #[test]
    fn ids_are_not_reused_after_delete() {
        let store = TargetStore::open_in_memory().unwrap();

        store.create_target(&test_new_target("https://a.example")).unwrap();
        let b = store.create_target(&test_new_target("https://b.example")).unwrap();
        store.delete_target(1).unwrap();

        let c = store.create_target(&test_new_target("https://c.example")).unwrap();
        assert_eq!(c.id, b.id + 1);
    }

    #[test]
    fn get_roundtrips_record() {
        let store = TargetStore::open_in_memory().unwrap();
        let created = store
            .create_target(&NewTarget {
                url: "https://app.example".to_string(),
                credential: Some("hunter2".to_string()),
                method: ProbeMethod::Post,
                interval_min: 5,
                interval_max: 600,
                active: false,
            })
            .unwrap();

        let retrieved = store.get_target(created.id).unwrap();
        assert_eq!(retrieved, Some(created));
    }

    #[test]
    fn get_nonexistent_returns_none() {
        let store = TargetStore::open_in_memory().unwrap();
        assert_eq!(store.get_target(42).unwrap(), None);
    }

    #[test]
    fn update_persists_changed_fields() {
        let store = TargetStore::open_in_memory().unwrap();
        let mut target = store.create_target(&test_new_target("https://a.example")).unwrap();

        target.consecutive_failures = 3;
        target.last_probe_at = Some(1000);
        target.next_probe_at = Some(1045);
        store.update_target(&target).unwrap();

        let retrieved = store.get_target(target.id).unwrap().unwrap();
        assert_eq!(retrieved.consecutive_failures, 3);
        assert_eq!(retrieved.last_probe_at, Some(1000));
        assert_eq!(retrieved.next_probe_at, Some(1045));
    }

    #[test]
    fn delete_returns_existence() {
        let store = TargetStore::open_in_memory().unwrap();
        let target = store.create_target(&test_new_target("https://a.example")).unwrap();

        assert!(store.delete_target(target.id).unwrap());
        assert!(!store.delete_target(target.id).unwrap());
        assert_eq!(store.get_target(target.id).unwrap(), None);
    }

    #[test]
    fn list_active_filters_paused() {
        let store = TargetStore::open_in_memory().unwrap();
        store.create_target(&test_new_target("https://a.example")).unwrap();
        let mut paused = store.create_target(&test_new_target("https://b.example")).unwrap();
        paused.active = false;
        store.update_target(&paused).unwrap();

        let active = store.list_active_targets().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].url, "https://a.example");
    }

    #[test]
    fn stats_counts_total_active_failing() {
        let store = TargetStore::open_in_memory().unwrap();
        store.create_target(&test_new_target("https://a.example")).unwrap();
        store.create_target(&test_new_target("https://b.example")).unwrap();
        let mut third = store.create_target(&test_new_target("https://c.example")).unwrap();
        third.active = false;
        third.consecutive_failures = 2;
        store.update_target(&third).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.active, 2);
        assert_eq!(stats.failing, 1);
    }

    #[test]
    fn on_disk_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keepwarm.redb");

        let id = {
            let store = TargetStore::open(&path).unwrap();
            store.create_target(&test_new_target("https://a.example")).unwrap().id
        };

        let store = TargetStore::open(&path).unwrap();
        let target = store.get_target(id).unwrap().unwrap();
        assert_eq!(target.url, "https://a.example");
    }
}
