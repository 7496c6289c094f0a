//! Fetch client for the external catalog.
//!
//! A [`Fetcher`] performs one GET with a header set and returns the raw body.
//! Retry and backoff belong to the caller; decoding happens caller-side so
//! that decode failures stay distinguishable from transport failures.

mod http;

pub use http::HttpFetcher;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Failures of a single fetch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("GET {url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("GET {url} failed: {message}")]
    Transport { url: String, message: String },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            Self::Status { url, .. } | Self::Transport { url, .. } => url,
        }
    }
}

/// Capability to GET a URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
    ) -> Result<Vec<u8>, FetchError>;
}

/// Decode a JSON body into `T`.
pub fn decode_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, serde_json::Error> {
    serde_json::from_slice(body)
}
