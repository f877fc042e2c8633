//! Local index: record key -> last known remote identity.
//!
//! Every read refreshes from the state store and every mutation is a
//! read-modify-write of the stored map, so separate processes sharing one
//! state file see each other's entries. The only consumer decision is append
//! vs update, so entries are never deleted.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::db::{load_json, update_json, StateStore};
use crate::error::{Error, Result};
use crate::models::{IndexEntry, RecordKey, RemoteRowId, WriteMode};

/// Name of the state entry holding the index.
pub const LOCAL_INDEX_KEY: &str = "local_index";

type Entries = BTreeMap<RecordKey, IndexEntry>;

pub struct LocalIndex {
    store: Arc<dyn StateStore>,
    entries: Mutex<Entries>,
}

impl LocalIndex {
    /// Load the persisted index from `store`.
    pub fn load(store: Arc<dyn StateStore>) -> Result<Self> {
        let entries: Entries = load_json(store.as_ref(), LOCAL_INDEX_KEY)?;
        tracing::debug!(entries = entries.len(), "Loaded local index");
        Ok(Self {
            store,
            entries: Mutex::new(entries),
        })
    }

    pub fn lookup(&self, key: &RecordKey) -> Result<Option<IndexEntry>> {
        Ok(self.refreshed()?.get(key).cloned())
    }

    /// Mode the next write for `key` should use.
    pub fn mode_for(&self, key: &RecordKey) -> Result<WriteMode> {
        Ok(if self.refreshed()?.contains_key(key) {
            WriteMode::Update
        } else {
            WriteMode::Append
        })
    }

    /// Record a successful sync, replacing any previous entry for `key`.
    ///
    /// Entries written by other handles on the same store are preserved.
    pub fn upsert_entry(
        &self,
        key: &RecordKey,
        remote_id: Option<RemoteRowId>,
        synced_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut entries = self.lock()?;
        let entry = IndexEntry {
            remote_id,
            synced_at,
        };
        *entries = update_json(self.store.as_ref(), LOCAL_INDEX_KEY, |stored: &mut Entries| {
            stored.insert(key.clone(), entry);
        })?;
        Ok(())
    }

    pub fn entries(&self) -> Result<Vec<(RecordKey, IndexEntry)>> {
        Ok(self
            .refreshed()?
            .iter()
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.refreshed()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.refreshed()?.is_empty())
    }

    fn refreshed(&self) -> Result<MutexGuard<'_, Entries>> {
        let mut entries = self.lock()?;
        *entries = load_json(self.store.as_ref(), LOCAL_INDEX_KEY)?;
        Ok(entries)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Entries>> {
        self.entries
            .lock()
            .map_err(|_| Error::Store("local index lock poisoned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStateStore, SqliteStateStore};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn key(raw: &str) -> RecordKey {
        RecordKey::parse(raw).unwrap()
    }

    #[test]
    fn lookup_is_absent_until_upserted() {
        let index = LocalIndex::load(Arc::new(MemoryStateStore::new())).unwrap();
        let jane = key("https://example.com/in/jane");

        assert_eq!(index.lookup(&jane).unwrap(), None);
        assert_eq!(index.mode_for(&jane).unwrap(), WriteMode::Append);

        let now = Utc::now();
        index
            .upsert_entry(&jane, Some(RemoteRowId::new("4")), now)
            .unwrap();

        let entry = index.lookup(&jane).unwrap().unwrap();
        assert_eq!(entry.remote_id, Some(RemoteRowId::new("4")));
        assert_eq!(entry.synced_at, now);
        assert_eq!(index.mode_for(&jane).unwrap(), WriteMode::Update);
    }

    #[test]
    fn upsert_overwrites_previous_entry() {
        let index = LocalIndex::load(Arc::new(MemoryStateStore::new())).unwrap();
        let jane = key("https://example.com/in/jane");

        index
            .upsert_entry(&jane, Some(RemoteRowId::new("4")), Utc::now())
            .unwrap();
        index
            .upsert_entry(&jane, Some(RemoteRowId::new("9")), Utc::now())
            .unwrap();

        assert_eq!(index.len().unwrap(), 1);
        assert_eq!(
            index.lookup(&jane).unwrap().unwrap().remote_id,
            Some(RemoteRowId::new("9"))
        );
    }

    #[test]
    fn index_survives_restart() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("state.db");
        let jane = key("https://example.com/in/jane");
        let now = Utc::now();

        {
            let store = Arc::new(SqliteStateStore::open(&path).unwrap());
            let index = LocalIndex::load(store).unwrap();
            index
                .upsert_entry(&jane, Some(RemoteRowId::new("12")), now)
                .unwrap();
        }

        let store = Arc::new(SqliteStateStore::open(&path).unwrap());
        let index = LocalIndex::load(store).unwrap();
        let entry = index.lookup(&jane).unwrap().unwrap();
        assert_eq!(entry.remote_id, Some(RemoteRowId::new("12")));
        assert_eq!(entry.synced_at, now);
    }

    #[test]
    fn two_indexes_on_one_state_file_keep_each_others_entries() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("state.db");
        let daemon = LocalIndex::load(Arc::new(SqliteStateStore::open(&path).unwrap())).unwrap();
        let cli = LocalIndex::load(Arc::new(SqliteStateStore::open(&path).unwrap())).unwrap();
        let jane = key("https://example.com/in/jane");
        let ada = key("https://example.com/in/ada");

        cli.upsert_entry(&jane, Some(RemoteRowId::new("4")), Utc::now())
            .unwrap();
        assert_eq!(daemon.mode_for(&jane).unwrap(), WriteMode::Update);

        daemon
            .upsert_entry(&ada, Some(RemoteRowId::new("5")), Utc::now())
            .unwrap();

        let reopened = LocalIndex::load(Arc::new(SqliteStateStore::open(&path).unwrap())).unwrap();
        assert_eq!(reopened.len().unwrap(), 2);
        assert!(reopened.lookup(&jane).unwrap().is_some());
        assert!(reopened.lookup(&ada).unwrap().is_some());
        assert_eq!(cli.mode_for(&ada).unwrap(), WriteMode::Update);
    }
}
