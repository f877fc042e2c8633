//! Remote upsert client and outcome classification.
//!
//! The remote endpoint must upsert by `profileUrl` rather than blindly insert:
//! queued writes are delivered at least once, so a retried `append` whose
//! first response was lost in transit would otherwise create a duplicate row.

mod error;
mod http;

use std::future::Future;

pub use error::{classify_response, RemoteError, RemoteErrorKind};
pub use http::HttpUpsertClient;

use crate::config::SinkConfig;
use crate::models::{Record, RemoteRowId, WriteMode};

/// Successful write acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertReceipt {
    /// Row reference assigned by the remote, if it reported one
    pub remote_id: Option<RemoteRowId>,
    /// Optional human-readable message from the remote
    pub message: Option<String>,
}

/// One write attempt against the remote store.
///
/// Both the immediate write path and the queue drain go through this trait,
/// and implementations must classify failures with [`classify_response`] so
/// both paths make identical retry decisions.
pub trait RemoteUpsert: Send + Sync {
    fn send(
        &self,
        config: &SinkConfig,
        record: &Record,
        mode: WriteMode,
    ) -> impl Future<Output = Result<UpsertReceipt, RemoteError>> + Send;
}
