//! reqwest-backed Kayenta client.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::error::ClientError;
use super::types::*;
use super::{AnalysisApi, CanaryConfigApi, ClientConfig, CredentialsApi};

const STANDALONE_ANALYSIS_PATH: &str = "/standalone_canary_analysis";
const CREDENTIALS_PATH: &str = "/credentials";
const CANARY_CONFIG_PATH: &str = "/canaryConfig";

/// Kayenta HTTP adapter.
#[derive(Debug, Clone)]
pub struct KayentaAdapter {
    client: reqwest::Client,
    config: ClientConfig,
}

impl KayentaAdapter {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let base = config.base_url.trim_end_matches('/').to_string();
        reqwest::Url::parse(&base)
            .map_err(|e| ClientError::config(format!("invalid base URL {base:?}: {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .gzip(true)
            .build()
            .map_err(|e| ClientError::config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            config: ClientConfig {
                base_url: base,
                ..config
            },
        })
    }

    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::from_env())
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn map_send_error(&self, err: reqwest::Error) -> ClientError {
        if err.is_timeout() {
            ClientError::Timeout(self.config.timeout)
        } else {
            ClientError::Http(err)
        }
    }
}

#[derive(Deserialize)]
struct ServerErrorBody {
    message: Option<String>,
    error: Option<String>,
}

/// Turn a response into `T`, or into a `ClientError::Server` for 4xx/5xx.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(server_error(status, &body));
    }

    serde_json::from_str(&body).map_err(|e| ClientError::Decode(e.to_string()))
}

fn server_error(status: StatusCode, body: &str) -> ClientError {
    let message = serde_json::from_str::<ServerErrorBody>(body)
        .ok()
        .and_then(|b| b.message.or(b.error))
        .unwrap_or_else(|| body.trim().to_string());
    ClientError::server(status, message)
}

#[async_trait]
impl AnalysisApi for KayentaAdapter {
    async fn submit(&self, input: &StandaloneCanaryAnalysisInput) -> Result<String, ClientError> {
        let url = self.url(STANDALONE_ANALYSIS_PATH);
        debug!(url = %url, scopes = input.execution_request.scopes.len(), "submitting standalone canary analysis");

        let response = self
            .client
            .post(url)
            .query(&input.query_params())
            .json(input)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let output: StartAnalysisResponse = decode(response).await?;
        if output.canary_analysis_execution_id.is_empty() {
            return Err(ClientError::Decode(
                "response did not include canaryAnalysisExecutionId".into(),
            ));
        }
        Ok(output.canary_analysis_execution_id)
    }

    async fn fetch(&self, execution_id: &str) -> Result<AnalysisStatus, ClientError> {
        let url = self.url(&format!("{STANDALONE_ANALYSIS_PATH}/{execution_id}"));
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        decode(response).await
    }
}

#[async_trait]
impl CredentialsApi for KayentaAdapter {
    async fn list_credentials(&self) -> Result<Vec<AccountCredential>, ClientError> {
        let response = self
            .client
            .get(self.url(CREDENTIALS_PATH))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let credentials: Vec<AccountCredential> = decode(response).await?;
        debug!(count = credentials.len(), "fetched account credentials");
        Ok(credentials)
    }
}

#[async_trait]
impl CanaryConfigApi for KayentaAdapter {
    async fn list_canary_configs(
        &self,
        application: Option<&str>,
    ) -> Result<Vec<CanaryConfig>, ClientError> {
        let mut request = self.client.get(self.url(CANARY_CONFIG_PATH));
        if let Some(application) = application.filter(|a| !a.is_empty()) {
            request = request.query(&[("application", application)]);
        }
        let response = request.send().await.map_err(|e| self.map_send_error(e))?;

        let configs: Vec<CanaryConfig> = decode(response).await?;
        debug!(count = configs.len(), "fetched canary configs");
        Ok(configs)
    }

    async fn create_canary_config(&self, config: &CanaryConfig) -> Result<String, ClientError> {
        debug!(name = %config.name, "creating canary config");
        let response = self
            .client
            .post(self.url(CANARY_CONFIG_PATH))
            .json(config)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        config_id(decode(response).await?)
    }

    async fn update_canary_config(&self, config: &CanaryConfig) -> Result<String, ClientError> {
        let id = config
            .id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ClientError::config("canary config ID cannot be empty"))?;
        debug!(name = %config.name, id, "updating canary config");

        let response = self
            .client
            .put(self.url(&format!("{CANARY_CONFIG_PATH}/{id}")))
            .json(config)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        config_id(decode(response).await?)
    }
}

fn config_id(output: CanaryConfigUpdateResponse) -> Result<String, ClientError> {
    if output.canary_config_id.is_empty() {
        return Err(ClientError::Decode(
            "response did not include canaryConfigId".into(),
        ));
    }
    Ok(output.canary_config_id)
}
