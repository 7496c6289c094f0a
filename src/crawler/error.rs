//! Crawl error taxonomy.

use thiserror::Error;

use crate::checkpoint::CheckpointError;
use crate::fetch::FetchError;
use crate::repository::StoreError;

/// Errors raised by the pagination controller.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("no checkpoint found to resume from")]
    NoCheckpoint,
}

impl From<StoreError> for CrawlError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { kind, id } => Self::NotFound { kind, id },
            other => Self::Store(other),
        }
    }
}

impl CrawlError {
    /// Whether the error is confined to one page or item.
    ///
    /// Contained errors are logged and counted and the sweep moves on;
    /// everything else ends the job.
    pub fn is_contained(&self) -> bool {
        match self {
            Self::Fetch(_) | Self::Decode { .. } | Self::NotFound { .. } => true,
            Self::Store(StoreError::Sqlite(_)) => true,
            Self::Store(_) => false,
            Self::Checkpoint(_) | Self::InvalidRequest(_) | Self::NoCheckpoint => false,
        }
    }
}
