//! Loading canary-config documents from disk or over HTTP.
//!
//! Documents may be YAML or JSON; JSON is parsed through the YAML reader.

use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, info};

use crate::kayenta::CanaryConfig;

#[derive(Debug, Error)]
pub enum CanaryConfigError {
    #[error("no canary config location given")]
    Missing,

    #[error("failed to read canary config from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch canary config from {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("attempt to fetch canary config from {url} returned {status}")]
    Status { url: String, status: StatusCode },

    #[error("failed to deserialize canary config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Where a canary config lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Http(String),
    File(PathBuf),
}

impl ConfigSource {
    pub fn parse(location: &str) -> Result<Self, CanaryConfigError> {
        let location = location.trim();
        if location.is_empty() {
            return Err(CanaryConfigError::Missing);
        }
        if location.starts_with("http://") || location.starts_with("https://") {
            return Ok(Self::Http(location.to_string()));
        }
        let path = location.strip_prefix("file://").unwrap_or(location);
        Ok(Self::File(PathBuf::from(path)))
    }
}

/// Load and parse the canary config at `location`.
///
/// `http://` and `https://` locations are fetched; `file://` locations and bare
/// paths are read from disk.
pub async fn load_canary_config(location: &str) -> Result<CanaryConfig, CanaryConfigError> {
    let source = ConfigSource::parse(location)?;
    info!(location = %location.trim(), "fetching canary config");
    let bytes = match source {
        ConfigSource::Http(url) => fetch_remote(&url).await?,
        ConfigSource::File(path) => tokio::fs::read(&path)
            .await
            .map_err(|source| CanaryConfigError::Io { path, source })?,
    };
    let config = parse_canary_config(&bytes)?;
    debug!(name = %config.name, metrics = config.metrics.len(), "canary config loaded");
    Ok(config)
}

pub fn parse_canary_config(bytes: &[u8]) -> Result<CanaryConfig, CanaryConfigError> {
    Ok(serde_yaml::from_slice(bytes)?)
}

async fn fetch_remote(url: &str) -> Result<Vec<u8>, CanaryConfigError> {
    let fetch_err = |source| CanaryConfigError::Fetch {
        url: url.to_string(),
        source,
    };
    let response = reqwest::get(url).await.map_err(fetch_err)?;
    let status = response.status();
    if status != StatusCode::OK {
        return Err(CanaryConfigError::Status {
            url: url.to_string(),
            status,
        });
    }
    let body = response.bytes().await.map_err(fetch_err)?;
    Ok(body.to_vec())
}
