//! Error types for linklog-core

use thiserror::Error;

/// Result type alias using linklog-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in linklog-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// `SQLite` error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Local state store error that is not a `SQLite` failure
    #[error("State store error: {0}")]
    Store(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid or incomplete configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP client construction error
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}
