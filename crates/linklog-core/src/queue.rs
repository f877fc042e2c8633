//! Durable offline queue of pending writes.
//!
//! The whole queue is one persisted entry. A drain pass reads it, processes
//! every item in FIFO order without holding any lock, and then merges its
//! survivors back in a single read-modify-write. Nothing is persisted
//! mid-pass, so a crash can only cause already-delivered items to be sent
//! again. Another process may append to the same entry while a pass runs;
//! the merge keeps those arrivals.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::db::{load_json, update_json, StateStore};
use crate::error::{Error, Result};
use crate::models::{QueueItem, QueueItemId};

/// Name of the state entry holding the queue.
pub const OFFLINE_QUEUE_KEY: &str = "offline_queue";

/// What a drain pass does with one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Delivered or dropped; the item leaves the queue
    Remove,
    /// Keep the item (usually with its retry counter bumped)
    Requeue(QueueItem),
    /// Keep this item and every later one, and stop the pass
    Halt(QueueItem),
}

/// Result of one `drain_all` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainPass {
    /// Queue depth after the rewrite
    pub remaining: usize,
    /// Items left in place by a halt: the halting item plus the ones never visited
    pub deferred: usize,
}

pub struct DurableQueue {
    store: Arc<dyn StateStore>,
    items: Mutex<Vec<QueueItem>>,
    drain_gate: tokio::sync::Mutex<()>,
}

impl DurableQueue {
    /// Load the persisted queue from `store`.
    pub fn load(store: Arc<dyn StateStore>) -> Result<Self> {
        let items: Vec<QueueItem> = load_json(store.as_ref(), OFFLINE_QUEUE_KEY)?;
        tracing::debug!(items = items.len(), "Loaded offline queue");
        Ok(Self {
            store,
            items: Mutex::new(items),
            drain_gate: tokio::sync::Mutex::new(()),
        })
    }

    /// Append an item at the tail and persist the queue.
    pub fn enqueue(&self, item: QueueItem) -> Result<()> {
        let mut items = self.lock()?;
        let (id, key, mode) = (item.id, item.record.key().clone(), item.mode);
        *items = update_json(self.store.as_ref(), OFFLINE_QUEUE_KEY, |stored: &mut Vec<QueueItem>| {
            stored.push(item);
        })?;
        tracing::info!(
            item = %id,
            key = %key,
            mode = %mode,
            depth = items.len(),
            "Queued write for later delivery"
        );
        Ok(())
    }

    /// Current queue contents in FIFO order.
    pub fn snapshot(&self) -> Result<Vec<QueueItem>> {
        Ok(self.refreshed()?.clone())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.refreshed()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.refreshed()?.is_empty())
    }

    /// Run one pass over the queue and replace it with the survivors.
    ///
    /// `process` sees every item once, oldest first. Items enqueued while the
    /// pass runs are kept after the survivors, and survivors that another
    /// handle already removed stay removed. An empty queue is left untouched.
    pub async fn drain_all<F, Fut>(&self, mut process: F) -> Result<DrainPass>
    where
        F: FnMut(QueueItem) -> Fut,
        Fut: Future<Output = Disposition>,
    {
        let _gate = self.drain_gate.lock().await;

        let pending = self.snapshot()?;
        if pending.is_empty() {
            return Ok(DrainPass::default());
        }
        let pending_ids: HashSet<QueueItemId> = pending.iter().map(|item| item.id).collect();

        let mut survivors = Vec::with_capacity(pending.len());
        let mut deferred = 0;
        let mut remaining = pending.into_iter();
        for item in remaining.by_ref() {
            match process(item).await {
                Disposition::Remove => {}
                Disposition::Requeue(item) => survivors.push(item),
                Disposition::Halt(item) => {
                    survivors.push(item);
                    deferred = 1;
                    break;
                }
            }
        }
        deferred += remaining.len();
        survivors.extend(remaining);

        let mut items = self.lock()?;
        *items = update_json(self.store.as_ref(), OFFLINE_QUEUE_KEY, |stored: &mut Vec<QueueItem>| {
            let current = std::mem::take(stored);
            let present: HashSet<QueueItemId> = current.iter().map(|item| item.id).collect();
            stored.extend(survivors.into_iter().filter(|item| present.contains(&item.id)));
            stored.extend(current.into_iter().filter(|item| !pending_ids.contains(&item.id)));
        })?;
        Ok(DrainPass {
            remaining: items.len(),
            deferred,
        })
    }

    fn refreshed(&self) -> Result<MutexGuard<'_, Vec<QueueItem>>> {
        let mut items = self.lock()?;
        *items = load_json(self.store.as_ref(), OFFLINE_QUEUE_KEY)?;
        Ok(items)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<QueueItem>>> {
        self.items
            .lock()
            .map_err(|_| Error::Store("offline queue lock poisoned".to_string()))
    }
}
