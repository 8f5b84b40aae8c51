//! Error types for the explorer.
//!
//! Only a failing data source is surfaced as a reportable error by the core.
//! Navigation no-ops, stale responses and missing commodity ancestry are
//! reported through outcome values instead.

use thiserror::Error;

/// Result type used by the input/output adapters.
pub type Result<T> = std::result::Result<T, ExplorerError>;

/// Failure of the external hierarchy data source.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// Network or storage failure. The caller decides whether to retry.
    #[error("data source unavailable for {scope}: {message}")]
    Unavailable { scope: String, message: String },

    /// The requested node does not exist in the source.
    #[error("no hierarchy for {scope} at path [{}]", path.join(" > "))]
    NotFound { scope: String, path: Vec<String> },
}

impl FetchError {
    pub fn unavailable(scope: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            scope: scope.into(),
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Crate-level error for loading, configuration and export.
#[derive(Debug, Error)]
pub enum ExplorerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("invalid color {0:?}, expected oklch(l c h)")]
    InvalidColor(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}
