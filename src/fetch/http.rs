//! reqwest-backed fetcher.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, info};

use super::{FetchError, Fetcher};
use crate::config::BROWSER_USER_AGENT;

/// HTTP fetcher with a fixed timeout.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    verbose: bool,
}

impl HttpFetcher {
    /// Create a fetcher whose requests time out after `timeout`.
    pub fn new(timeout: Duration, verbose: bool) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| FetchError::Transport {
                url: String::new(),
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client, verbose })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
    ) -> Result<Vec<u8>, FetchError> {
        if self.verbose {
            info!("GET {}", url);
        } else {
            debug!("GET {}", url);
        }

        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        Ok(body.to_vec())
    }
}
