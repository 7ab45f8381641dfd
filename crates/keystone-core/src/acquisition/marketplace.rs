//! Module marketplace API client.
//!
//! Provides lookups of module metadata and package downloads from a remote
//! marketplace.

use crate::config::MarketplaceConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// Marketplace client errors.
#[derive(Debug, Error)]
pub enum MarketplaceError {
    /// HTTP request error.
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Invalid response format.
    #[error("invalid response format: {0}")]
    InvalidResponse(String),

    /// The marketplace does not know the requested resource.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Result type for marketplace operations.
pub type Result<T> = std::result::Result<T, MarketplaceError>;

/// Marketplace module metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketplaceModule {
    /// Module name.
    pub name: String,

    /// Latest published version.
    pub version: String,

    /// Human-readable name.
    #[serde(default)]
    pub display_name: String,

    /// Module description.
    #[serde(default)]
    pub description: String,

    /// Module author.
    #[serde(default)]
    pub author: String,

    /// Download URL for the `.tar.gz` package.
    pub download_url: String,
}

#[derive(Debug, Clone)]
struct CachedModule {
    data: MarketplaceModule,
    timestamp: Instant,
}

/// Marketplace client for fetching module metadata and packages.
pub struct MarketplaceClient {
    base_url: String,
    client: reqwest::blocking::Client,
    cache: HashMap<String, CachedModule>,
    cache_ttl: Duration,
    max_retries: u32,
}

impl MarketplaceClient {
    /// Creates a client for `base_url` with default timeout, TTL and retries.
    pub fn with_url(base_url: impl Into<String>) -> Result<Self> {
        Self::from_config(&MarketplaceConfig { url: base_url.into(), ..MarketplaceConfig::default() })
    }

    /// Creates a client from configuration.
    pub fn from_config(config: &MarketplaceConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(MarketplaceError::Http)?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            client,
            cache: HashMap::new(),
            cache_ttl: Duration::from_secs(config.cache_ttl_secs),
            max_retries: config.max_retries,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sets the cache TTL.
    pub fn set_cache_ttl(&mut self, ttl: Duration) {
        self.cache_ttl = ttl;
    }

    /// Gets metadata about a module; `None` when the marketplace has no such
    /// module.
    pub fn get_module_info(&mut self, name: &str) -> Result<Option<MarketplaceModule>> {
        let ttl = self.cache_ttl;
        if let Some(cached) = self.cache.get(name).filter(|c| c.timestamp.elapsed() < ttl) {
            return Ok(Some(cached.data.clone()));
        }

        let url = self.module_url(name);
        let response = match self.make_request_with_retry(&url) {
            Ok(resp) => resp,
            Err(MarketplaceError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let body = response.text().map_err(MarketplaceError::Http)?;
        let module = parse_module_info(&body)?;

        self.cache.insert(
            name.to_string(),
            CachedModule { data: module.clone(), timestamp: Instant::now() },
        );

        Ok(Some(module))
    }

    /// Downloads a package.
    pub fn download(&self, url: &str) -> Result<Vec<u8>> {
        debug!(url = %url, "Downloading module package");
        let response = self.make_request_with_retry(url)?;
        let bytes = response.bytes().map_err(MarketplaceError::Http)?;
        Ok(bytes.to_vec())
    }

    fn module_url(&self, name: &str) -> String {
        format!("{}/modules/{}", self.base_url, urlencoding::encode(name))
    }

    fn make_request_with_retry(&self, url: &str) -> Result<reqwest::blocking::Response> {
        let mut attempt = 0;

        loop {
            match self.client.get(url).send() {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    } else if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(MarketplaceError::NotFound(url.to_string()));
                    } else if !status.is_server_error() || attempt >= self.max_retries {
                        return Err(MarketplaceError::InvalidResponse(format!(
                            "Request failed with status: {}",
                            status
                        )));
                    }
                }
                Err(e) if attempt >= self.max_retries => return Err(MarketplaceError::Http(e)),
                Err(e) => debug!(url = %url, attempt, error = %e, "Retrying marketplace request"),
            }
            std::thread::sleep(backoff(attempt));
            attempt += 1;
        }
    }
}

fn parse_module_info(body: &str) -> Result<MarketplaceModule> {
    Ok(serde_json::from_str(body)?)
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(100 * u64::from(attempt + 1))
}
