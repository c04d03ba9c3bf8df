//! Error taxonomy for the recommendation core.
//!
//! Only [`EngineError::Configuration`] and [`EngineError::Catalog`] are meant to stop the
//! process at startup. Everything else is recoverable and gets folded into a well-formed
//! response by [`crate::service::RecommendationService`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Misconfiguration detected at startup (bad dimension, unknown backend, ...).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Catalog file missing, unreadable, or containing invalid records.
    #[error("catalog error: {0}")]
    Catalog(String),

    /// Caller supplied an intent that cannot enter the pipeline.
    #[error("invalid intent: {0}")]
    InvalidIntent(String),

    /// A specific text could not be embedded.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// Repository read or write failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl EngineError {
    /// `true` for errors that must prevent the process from serving.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Catalog(_))
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        Self::Storage(format!("serialization: {e}"))
    }
}
