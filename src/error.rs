//! Error types for the collection and ingestion pipeline.
//!
//! [`UpstreamError`] is scoped to a single upstream call for a single line and
//! is absorbed by the collector. [`StorageError`] is scoped to a whole batch and
//! is surfaced to whoever triggered the run.

use thiserror::Error;

/// A failed call to the transit API.
///
/// `path` is the request path without the query string, so the API key never
/// ends up in an error message or a log line.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{path}: request timed out")]
    Timeout { path: String },

    #[error("{path}: request failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{path}: upstream returned HTTP {status}")]
    Status {
        path: String,
        status: reqwest::StatusCode,
    },

    #[error("{path}: unexpected response body: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path}: response contained no line status entry")]
    EmptyStatus { path: String },

    #[error("invalid upstream url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl UpstreamError {
    /// Classifies a reqwest failure, dropping the URL (and its `app_key`) from it.
    pub fn from_reqwest(path: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout {
                path: path.to_string(),
            }
        } else {
            UpstreamError::Transport {
                path: path.to_string(),
                source: err.without_url(),
            }
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, UpstreamError::Timeout { .. })
    }
}

/// A failed bulk append. No rows of the batch were persisted.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("could not connect to storage: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("bulk copy into {table} failed: {source}")]
    Copy {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("commit failed: {0}")]
    Commit(#[source] sqlx::Error),

    #[error("could not encode batch: {0}")]
    Encode(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage rejected the batch: {0}")]
    Rejected(String),
}

/// Invalid or missing startup configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}
