//! Data models for LinkLog

mod index_entry;
mod queue_item;
mod record;

pub use index_entry::{IndexEntry, RemoteRowId};
pub use queue_item::{QueueItem, QueueItemId};
pub use record::{normalize_date_iso, Record, RecordFields, RecordKey, WriteMode, RECORD_COLUMNS};
