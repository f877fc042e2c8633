//! Write coordinator: the single entry point for saving a record.
//!
//! Decides append vs update from the local index, performs one immediate
//! attempt, and hands retryable failures to the offline queue.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::config::SinkConfig;
use crate::error::Result;
use crate::index::LocalIndex;
use crate::models::{QueueItem, Record, RemoteRowId, WriteMode};
use crate::queue::DurableQueue;
use crate::remote::{RemoteErrorKind, RemoteUpsert};
use crate::scheduler::{DrainTrigger, ReconciliationScheduler};

/// What happened to one write request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteOutcome {
    pub mode: WriteMode,
    /// The remote accepted the write
    pub success: bool,
    /// The write was parked in the offline queue for a later attempt
    pub queued: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<RemoteRowId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<RemoteErrorKind>,
}

pub struct WriteCoordinator<R> {
    index: Arc<LocalIndex>,
    queue: Arc<DurableQueue>,
    remote: Arc<R>,
    scheduler: Option<Arc<ReconciliationScheduler<R>>>,
}

impl<R> WriteCoordinator<R>
where
    R: RemoteUpsert + 'static,
{
    pub const fn new(index: Arc<LocalIndex>, queue: Arc<DurableQueue>, remote: Arc<R>) -> Self {
        Self {
            index,
            queue,
            remote,
            scheduler: None,
        }
    }

    /// Kick `scheduler` in the background whenever a write gets queued.
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: Arc<ReconciliationScheduler<R>>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Write `record` to the remote, falling back to the offline queue.
    ///
    /// Remote failures are reported through the outcome. `Err` is reserved
    /// for local storage failures, which mean the write was not captured.
    pub async fn write(&self, config: &SinkConfig, record: Record) -> Result<WriteOutcome> {
        let mode = self.index.mode_for(record.key())?;
        tracing::debug!(key = %record.key(), %mode, "Writing record");

        match self.remote.send(config, &record, mode).await {
            Ok(receipt) => {
                self.index
                    .upsert_entry(record.key(), receipt.remote_id.clone(), Utc::now())?;
                tracing::info!(key = %record.key(), %mode, "Record written");
                Ok(WriteOutcome {
                    mode,
                    success: true,
                    queued: false,
                    remote_id: receipt.remote_id,
                    message: receipt.message,
                    error: None,
                    error_kind: None,
                })
            }
            Err(error) if error.is_retryable() => {
                tracing::warn!(
                    key = %record.key(),
                    %mode,
                    kind = %error.kind(),
                    "Write failed; queued for retry: {error}"
                );
                self.queue.enqueue(QueueItem::new(record, mode))?;
                if let Some(scheduler) = &self.scheduler {
                    scheduler.trigger_drain(DrainTrigger::WriteFailure);
                }
                Ok(WriteOutcome {
                    mode,
                    success: false,
                    queued: true,
                    remote_id: None,
                    message: None,
                    error: Some(error.message().to_string()),
                    error_kind: Some(error.kind()),
                })
            }
            Err(error) => {
                tracing::error!(
                    key = %record.key(),
                    %mode,
                    kind = %error.kind(),
                    "Write rejected: {error}"
                );
                Ok(WriteOutcome {
                    mode,
                    success: false,
                    queued: false,
                    remote_id: None,
                    message: None,
                    error: Some(error.message().to_string()),
                    error_kind: Some(error.kind()),
                })
            }
        }
    }
}
