use std::io;

use linklog_core::{RemoteError, RemoteErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] linklog_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Remote error ({}): {}", .0.kind(), .0.message())]
    Remote(#[from] RemoteError),
    #[error("Remote rejected the write ({kind}): {message}")]
    WriteRejected {
        kind: RemoteErrorKind,
        message: String,
    },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(
        "LinkLog is not configured ({0}). Run `linklog config init --endpoint-url <URL> --token <TOKEN>`, or set LINKLOG_ENDPOINT_URL and LINKLOG_TOKEN."
    )]
    NotConfigured(String),
}
