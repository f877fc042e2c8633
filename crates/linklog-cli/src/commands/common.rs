use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use linklog_core::db::{SqliteStateStore, StateStore};
use linklog_core::{
    DurableQueue, HttpUpsertClient, IndexEntry, LocalIndex, QueueItem, ReconciliationScheduler,
    RecordKey, RetryPolicy, SchedulerConfig, SinkConfig, WriteCoordinator,
};
use serde::Serialize;
use tokio::sync::watch;

use crate::config::{default_config_path, CliConfig};
use crate::error::CliError;

/// Where the CLI keeps its state and configuration.
#[derive(Debug, Clone)]
pub struct Context {
    pub state_path: PathBuf,
    pub config_path: PathBuf,
}

impl Context {
    pub fn resolve(
        state_path: Option<PathBuf>,
        config_path: Option<PathBuf>,
    ) -> Result<Self, CliError> {
        let state_path = state_path.or_else(|| env::var_os("LINKLOG_STATE_PATH").map(PathBuf::from));
        let state_path = match state_path {
            Some(path) => path,
            None => default_state_path()?,
        };
        let config_path = match config_path {
            Some(path) => path,
            None => default_config_path()?,
        };
        Ok(Self {
            state_path,
            config_path,
        })
    }

    pub fn load_config(&self) -> Result<CliConfig, CliError> {
        CliConfig::load_from_path(&self.config_path)
    }

    pub fn open_engine(&self) -> Result<Engine, CliError> {
        Engine::open(&self.state_path)
    }
}

pub fn default_state_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("linklog").join("linklog.db"))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}

/// Local index, offline queue and remote client over one state database.
pub struct Engine {
    pub index: Arc<LocalIndex>,
    pub queue: Arc<DurableQueue>,
    pub remote: Arc<HttpUpsertClient>,
}

impl Engine {
    pub fn open(state_path: &Path) -> Result<Self, CliError> {
        let store: Arc<dyn StateStore> = Arc::new(SqliteStateStore::open(state_path)?);
        let index = Arc::new(LocalIndex::load(store.clone())?);
        let queue = Arc::new(DurableQueue::load(store)?);
        let remote = Arc::new(HttpUpsertClient::new()?);
        Ok(Self {
            index,
            queue,
            remote,
        })
    }

    pub fn coordinator(&self) -> WriteCoordinator<HttpUpsertClient> {
        WriteCoordinator::new(self.index.clone(), self.queue.clone(), self.remote.clone())
    }

    pub fn scheduler(
        &self,
        config: watch::Receiver<SinkConfig>,
        settings: SchedulerConfig,
    ) -> Arc<ReconciliationScheduler<HttpUpsertClient>> {
        Arc::new(ReconciliationScheduler::new(
            self.index.clone(),
            self.queue.clone(),
            self.remote.clone(),
            config,
            settings,
            RetryPolicy::default(),
        ))
    }
}

#[derive(Debug, Serialize)]
pub struct QueueListItem {
    pub id: String,
    pub profile_url: String,
    pub name: String,
    pub mode: String,
    pub retry_count: u32,
    pub next_backoff_secs: u64,
    pub enqueued_at: String,
}

#[derive(Debug, Serialize)]
pub struct IndexListItem {
    pub profile_url: String,
    pub remote_id: Option<String>,
    pub synced_at: String,
}

pub fn queue_item_to_list_item(item: &QueueItem, policy: &RetryPolicy) -> QueueListItem {
    QueueListItem {
        id: item.id.to_string(),
        profile_url: item.record.key().to_string(),
        name: item.record.fields().name.clone(),
        mode: item.mode.to_string(),
        retry_count: item.retry_count,
        next_backoff_secs: policy.backoff_delay(item.retry_count).as_secs(),
        enqueued_at: format_timestamp(item.enqueued_at),
    }
}

pub fn index_entry_to_list_item(key: &RecordKey, entry: &IndexEntry) -> IndexListItem {
    IndexListItem {
        profile_url: key.to_string(),
        remote_id: entry.remote_id.as_ref().map(ToString::to_string),
        synced_at: format_timestamp(entry.synced_at),
    }
}

pub fn format_queue_lines(items: &[QueueListItem]) -> Vec<String> {
    items
        .iter()
        .map(|item| {
            let label = if item.name.is_empty() {
                item.profile_url.clone()
            } else {
                format!("{} <{}>", item.name, item.profile_url)
            };
            format!(
                "{}  {:<6}  retries {}  next backoff {}s  {}",
                item.enqueued_at, item.mode, item.retry_count, item.next_backoff_secs, label
            )
        })
        .collect()
}

pub fn format_index_lines(items: &[IndexListItem]) -> Vec<String> {
    items
        .iter()
        .map(|item| {
            format!(
                "{}  row {}  {}",
                item.synced_at,
                item.remote_id.as_deref().unwrap_or("-"),
                item.profile_url
            )
        })
        .collect()
}

pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}
