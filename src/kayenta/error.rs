//! Error types for the Kayenta client.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Errors raised while talking to the Kayenta service.
///
/// Every variant is fatal to the operation that produced it; the client never
/// retries on its own.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or protocol failure before a response was read.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a 4xx/5xx status.
    #[error("{status} : {message}")]
    Server { status: StatusCode, message: String },

    /// The response body did not match the expected shape.
    #[error("could not decode response: {0}")]
    Decode(String),

    /// The request timed out on the client side.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// Invalid client configuration (bad base URL, etc.).
    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    pub fn server(status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::Server {
            status,
            message: if message.is_empty() {
                "no message included in response from server".to_string()
            } else {
                message
            },
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// HTTP status returned by the service, if the request got that far.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Server { status, .. } => Some(*status),
            Self::Http(e) => e.status(),
            _ => None,
        }
    }

    /// Short error code for logging.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Http(e) if e.is_connect() => "connect_error",
            Self::Http(_) => "http_error",
            Self::Server { status, .. } if status.is_client_error() => "client_error",
            Self::Server { .. } => "server_error",
            Self::Decode(_) => "decode_error",
            Self::Timeout(_) => "timeout",
            Self::Config(_) => "config_error",
        }
    }
}
