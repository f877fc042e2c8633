//! Reconciliation scheduler: drains the offline queue through the remote.
//!
//! Two states, `Idle` and `Draining`, guarded by a single-permit semaphore.
//! A trigger that arrives while a pass is running is a no-op. Every failure
//! is contained per item; a pass always ends back in `Idle`.

use std::fmt;
use std::future::Future;
use std::pin::pin;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{watch, Semaphore};
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::{RetryPolicy, SchedulerConfig, SinkConfig};
use crate::index::LocalIndex;
use crate::models::QueueItem;
use crate::queue::{Disposition, DurableQueue};
use crate::remote::{RemoteError, RemoteErrorKind, RemoteUpsert, UpsertReceipt};

/// Why a drain pass was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainTrigger {
    Startup,
    Timer,
    WriteFailure,
    Manual,
}

impl fmt::Display for DrainTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Startup => "startup",
            Self::Timer => "timer",
            Self::WriteFailure => "write_failure",
            Self::Manual => "manual",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Idle,
    Draining,
}

/// Tally of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Items whose write reached the remote
    pub delivered: usize,
    /// Items kept for another attempt
    pub requeued: usize,
    /// Items dropped after a terminal error
    pub dropped: usize,
    /// Items dropped because their retry budget ran out
    pub exhausted: usize,
    /// Items kept without a verdict after the pass stopped on an auth failure,
    /// including the one that was rejected
    pub deferred: usize,
    /// Queue depth after the pass
    pub remaining: usize,
    /// Whether the pass stopped early because credentials were rejected
    pub halted: bool,
}

pub struct ReconciliationScheduler<R> {
    index: Arc<LocalIndex>,
    queue: Arc<DurableQueue>,
    remote: Arc<R>,
    config: watch::Receiver<SinkConfig>,
    settings: SchedulerConfig,
    policy: RetryPolicy,
    drain_permit: Semaphore,
}

impl<R> ReconciliationScheduler<R>
where
    R: RemoteUpsert + 'static,
{
    pub fn new(
        index: Arc<LocalIndex>,
        queue: Arc<DurableQueue>,
        remote: Arc<R>,
        config: watch::Receiver<SinkConfig>,
        settings: SchedulerConfig,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            index,
            queue,
            remote,
            config,
            settings,
            policy,
            drain_permit: Semaphore::new(1),
        }
    }

    pub fn state(&self) -> SchedulerState {
        if self.drain_permit.available_permits() == 0 {
            SchedulerState::Draining
        } else {
            SchedulerState::Idle
        }
    }

    /// Run one drain pass unless one is already in flight.
    ///
    /// Returns `None` when the trigger was coalesced into the running pass.
    pub async fn request_drain(&self, trigger: DrainTrigger) -> Option<DrainReport> {
        let Ok(_permit) = self.drain_permit.try_acquire() else {
            tracing::debug!(%trigger, "Drain already in progress; trigger coalesced");
            return None;
        };

        let config = self.config.borrow().clone();
        Some(self.drain_pass(&config, trigger).await)
    }

    /// Request a drain in the background without waiting for it.
    pub fn trigger_drain(self: &Arc<Self>, trigger: DrainTrigger) {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            scheduler.request_drain(trigger).await;
        });
    }

    /// Drain at startup, then on every interval tick until `shutdown` resolves.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut shutdown = pin!(shutdown);
        let interval = self.settings.drain_interval;
        tracing::info!(interval_secs = interval.as_secs(), "Reconciliation scheduler started");

        self.request_drain(DrainTrigger::Startup).await;

        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("Reconciliation scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    self.request_drain(DrainTrigger::Timer).await;
                }
            }
        }
    }

    async fn drain_pass(&self, config: &SinkConfig, trigger: DrainTrigger) -> DrainReport {
        let depth = self.queue.len().unwrap_or(0);
        if depth > 0 {
            tracing::info!(%trigger, depth, "Draining offline queue");
        }

        let tally = Mutex::new(DrainReport::default());
        let outcome = self
            .queue
            .drain_all(|item| self.process_item(config, item, &tally))
            .await;

        let mut report = tally
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match outcome {
            Ok(pass) => {
                report.remaining = pass.remaining;
                report.deferred = pass.deferred;
            }
            Err(error) => {
                tracing::error!("Failed to persist offline queue after drain: {error}");
                report.remaining = self.queue.len().unwrap_or(depth);
            }
        }

        if depth > 0 {
            tracing::info!(
                %trigger,
                delivered = report.delivered,
                requeued = report.requeued,
                dropped = report.dropped,
                exhausted = report.exhausted,
                deferred = report.deferred,
                remaining = report.remaining,
                "Drain pass finished"
            );
        }
        report
    }

    async fn process_item(
        &self,
        config: &SinkConfig,
        item: QueueItem,
        tally: &Mutex<DrainReport>,
    ) -> Disposition {
        let bump = |update: fn(&mut DrainReport)| {
            if let Ok(mut report) = tally.lock() {
                update(&mut report);
            }
        };

        let delay = self.policy.backoff_delay(item.retry_count);
        if !delay.is_zero() {
            tracing::debug!(
                item = %item.id,
                retry = item.retry_count,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Backing off before retry"
            );
            tokio::time::sleep(delay).await;
        }

        match self.attempt(config, &item).await {
            Ok(receipt) => {
                if let Err(error) =
                    self.index
                        .upsert_entry(item.record.key(), receipt.remote_id, Utc::now())
                {
                    tracing::error!(
                        key = %item.record.key(),
                        "Queued write delivered but local index update failed: {error}"
                    );
                }
                tracing::info!(
                    item = %item.id,
                    key = %item.record.key(),
                    mode = %item.mode,
                    retry = item.retry_count,
                    "Delivered queued write"
                );
                bump(|report| report.delivered += 1);
                Disposition::Remove
            }
            Err(error)
                if error.kind() == RemoteErrorKind::Auth
                    && self.policy.is_exhausted(item.retry_count) =>
            {
                tracing::error!(
                    item = %item.id,
                    key = %item.record.key(),
                    mode = %item.mode,
                    retries = item.retry_count,
                    enqueued_at = %item.enqueued_at,
                    "Lost write: credentials still rejected after every retry (QueueExhausted): {error}"
                );
                bump(|report| report.exhausted += 1);
                Disposition::Remove
            }
            Err(error) if error.kind() == RemoteErrorKind::Auth => {
                tracing::error!(
                    item = %item.id,
                    retry = item.retry_count + 1,
                    "Remote rejected credentials; pausing drain until the next pass: {error}"
                );
                bump(|report| report.halted = true);
                Disposition::Halt(item.into_retried())
            }
            Err(error) if !error.is_retryable() => {
                tracing::error!(
                    item = %item.id,
                    key = %item.record.key(),
                    kind = %error.kind(),
                    "Dropping queued write after terminal error: {error}"
                );
                bump(|report| report.dropped += 1);
                Disposition::Remove
            }
            Err(error) if self.policy.is_exhausted(item.retry_count) => {
                tracing::error!(
                    item = %item.id,
                    key = %item.record.key(),
                    mode = %item.mode,
                    retries = item.retry_count,
                    enqueued_at = %item.enqueued_at,
                    "Lost write: retry budget exhausted (QueueExhausted): {error}"
                );
                bump(|report| report.exhausted += 1);
                Disposition::Remove
            }
            Err(error) => {
                tracing::warn!(
                    item = %item.id,
                    key = %item.record.key(),
                    kind = %error.kind(),
                    retry = item.retry_count + 1,
                    "Queued write failed; will retry: {error}"
                );
                bump(|report| report.requeued += 1);
                Disposition::Requeue(item.into_retried())
            }
        }
    }

    async fn attempt(
        &self,
        config: &SinkConfig,
        item: &QueueItem,
    ) -> Result<UpsertReceipt, RemoteError> {
        let timeout = self.settings.attempt_timeout;
        tokio::time::timeout(timeout, self.remote.send(config, &item.record, item.mode))
            .await
            .unwrap_or_else(|_| {
                Err(RemoteError::network(format!(
                    "Attempt timed out after {}s",
                    timeout.as_secs()
                )))
            })
    }
}
