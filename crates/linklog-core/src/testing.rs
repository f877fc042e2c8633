//! Test doubles shared by the engine tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::SinkConfig;
use crate::db::MemoryStateStore;
use crate::index::LocalIndex;
use crate::models::{Record, RecordFields, RemoteRowId, WriteMode};
use crate::queue::DurableQueue;
use crate::remote::{RemoteError, RemoteUpsert, UpsertReceipt};

type Reply = Result<UpsertReceipt, RemoteError>;

/// Scripted remote: each key replays its replies in order and repeats the
/// last one; unscripted keys always succeed.
#[derive(Default)]
pub struct StubRemote {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<(String, WriteMode)>>,
    latency: Option<Duration>,
}

impl StubRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn script(self, slug: &str, replies: Vec<Reply>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(profile_url(slug), replies.into());
        self
    }

    pub fn calls(&self) -> Vec<(String, WriteMode)> {
        self.calls.lock().unwrap().clone()
    }

    fn next_reply(&self, key: &str) -> Reply {
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(key) {
            Some(replies) if replies.len() > 1 => replies.pop_front().unwrap(),
            Some(replies) if !replies.is_empty() => replies[0].clone(),
            _ => ok(&format!("row-{key}")),
        }
    }
}

impl RemoteUpsert for StubRemote {
    async fn send(&self, _config: &SinkConfig, record: &Record, mode: WriteMode) -> Reply {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.calls
            .lock()
            .unwrap()
            .push((record.key().to_string(), mode));
        self.next_reply(record.key().as_str())
    }
}

pub fn ok(row: &str) -> Reply {
    Ok(UpsertReceipt {
        remote_id: Some(RemoteRowId::new(row)),
        message: None,
    })
}

pub fn profile_url(slug: &str) -> String {
    format!("https://example.com/in/{slug}")
}

pub fn record(slug: &str) -> Record {
    Record::new(RecordFields {
        name: slug.to_string(),
        profile_url: profile_url(slug),
        ..RecordFields::default()
    })
    .unwrap()
}

pub fn sink() -> SinkConfig {
    SinkConfig::new("https://sheet.example.com/exec", "token").unwrap()
}

/// Index and queue sharing one in-memory store.
pub fn memory_state() -> (Arc<MemoryStateStore>, Arc<LocalIndex>, Arc<DurableQueue>) {
    let store = Arc::new(MemoryStateStore::new());
    let index = Arc::new(LocalIndex::load(store.clone()).unwrap());
    let queue = Arc::new(DurableQueue::load(store.clone()).unwrap());
    (store, index, queue)
}
