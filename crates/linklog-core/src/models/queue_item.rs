//! Offline queue item model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Record, WriteMode};

/// A unique identifier for a queue item, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueItemId(Uuid);

impl QueueItemId {
    /// Create a new unique queue item ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for QueueItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QueueItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueItemId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A pending write waiting in the offline queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Unique identifier
    pub id: QueueItemId,
    /// Record to write
    pub record: Record,
    /// Mode chosen when the item was enqueued; never re-derived on retry
    pub mode: WriteMode,
    /// Number of failed drain attempts so far
    pub retry_count: u32,
    /// Time the item first entered the queue
    pub enqueued_at: DateTime<Utc>,
}

impl QueueItem {
    /// Wrap a record that has not been retried yet.
    #[must_use]
    pub fn new(record: Record, mode: WriteMode) -> Self {
        Self {
            id: QueueItemId::new(),
            record,
            mode,
            retry_count: 0,
            enqueued_at: Utc::now(),
        }
    }

    /// The same item after one more failed attempt.
    #[must_use]
    pub fn into_retried(self) -> Self {
        Self {
            retry_count: self.retry_count.saturating_add(1),
            ..self
        }
    }
}
