//! linklog-core - Core library for LinkLog
//!
//! This crate contains the record model, the durable local state (index and
//! offline queue), the remote upsert client, and the reconciliation engine
//! shared by every LinkLog front end.

pub mod config;
pub mod coordinator;
pub mod db;
pub mod error;
pub mod export;
pub mod index;
pub mod models;
pub mod queue;
pub mod remote;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{RetryPolicy, SchedulerConfig, SinkConfig};
pub use coordinator::{WriteCoordinator, WriteOutcome};
pub use error::{Error, Result};
pub use index::LocalIndex;
pub use models::{IndexEntry, QueueItem, Record, RecordFields, RecordKey, RemoteRowId, WriteMode};
pub use queue::DurableQueue;
pub use remote::{HttpUpsertClient, RemoteError, RemoteErrorKind, RemoteUpsert, UpsertReceipt};
pub use scheduler::{DrainReport, DrainTrigger, ReconciliationScheduler, SchedulerState};
