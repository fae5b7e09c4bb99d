//! Configuration types for the index target.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::IndexError;

/// Default per-request timeout for calls to the index cluster.
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Address of the index cluster plus the logical collection documents are
/// written to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexTargetConfig {
    /// Cluster address (e.g., "http://localhost:9200").
    pub url: String,
    /// Logical collection (index) name.
    pub collection: String,
    /// Timeout applied to each request sent to the cluster.
    pub request_timeout_ms: u64,
}

impl IndexTargetConfig {
    /// Create a config for the given cluster address and collection.
    pub fn new(url: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            collection: collection.into(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }

    /// Set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Validate the config and return the parsed cluster address.
    pub fn parsed_url(&self) -> Result<Url, IndexError> {
        if self.collection.trim().is_empty() {
            return Err(IndexError::invalid_target("collection name is empty"));
        }
        let url = Url::parse(&self.url)
            .map_err(|e| IndexError::invalid_target(format!("{}: {}", self.url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(IndexError::invalid_target(format!(
                "unsupported scheme '{}'",
                url.scheme()
            )));
        }
        Ok(url)
    }
}
