//! Client boundary for the Kayenta canary analysis service.

pub mod error;
pub mod http;
pub mod types;

use std::time::Duration;

pub use error::ClientError;
pub use http::KayentaAdapter;
pub use types::*;

/// Base URL used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8090";

/// Per-request HTTP timeout used when nothing else is configured.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Submit/fetch capability for standalone canary analyses.
///
/// The poller and the CLI only depend on this trait, so tests can drive them
/// with an in-memory implementation.
#[async_trait::async_trait]
pub trait AnalysisApi: Send + Sync {
    /// Start an analysis and return its execution ID.
    async fn submit(&self, input: &StandaloneCanaryAnalysisInput) -> Result<String, ClientError>;

    /// Fetch the current status of an execution.
    async fn fetch(&self, execution_id: &str) -> Result<AnalysisStatus, ClientError>;
}

/// Account listing capability.
#[async_trait::async_trait]
pub trait CredentialsApi: Send + Sync {
    async fn list_credentials(&self) -> Result<Vec<AccountCredential>, ClientError>;
}

/// Stored canary configs on the service.
#[async_trait::async_trait]
pub trait CanaryConfigApi: Send + Sync {
    /// Configs stored for `application`, or every config when `None`.
    async fn list_canary_configs(
        &self,
        application: Option<&str>,
    ) -> Result<Vec<CanaryConfig>, ClientError>;

    /// Store a new config and return its ID.
    async fn create_canary_config(&self, config: &CanaryConfig) -> Result<String, ClientError>;

    /// Replace the config whose ID is `config.id`.
    async fn update_canary_config(&self, config: &CanaryConfig) -> Result<String, ClientError>;

    /// Create or replace the config named `config.name` for `application`.
    ///
    /// The service has no upsert, so this lists the application's configs and
    /// updates the one with the same name, or creates a new one.
    async fn upsert_canary_config(
        &self,
        application: &str,
        config: &CanaryConfig,
    ) -> Result<String, ClientError> {
        let mut config = config.clone();
        config.applications = vec![application.to_string()];

        let existing = self
            .list_canary_configs(Some(application))
            .await?
            .into_iter()
            .find(|c| c.name == config.name && c.id.as_deref().is_some_and(|id| !id.is_empty()));
        match existing {
            Some(found) => {
                config.id = found.id;
                self.update_canary_config(&config).await
            }
            None => {
                config.id = None;
                self.create_canary_config(&config).await
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Read `KAYENTA_URL` and `KAYENTA_TIMEOUT_SECONDS`, falling back to defaults.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("KAYENTA_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let timeout = std::env::var("KAYENTA_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        Self { base_url, timeout }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
