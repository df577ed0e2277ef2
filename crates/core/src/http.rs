use crate::types::TimeoutConfig;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

const BODY_SNIPPET_CHARS: usize = 200;

/// Failure talking to an external service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("http status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("response invalid: {0}")]
    InvalidResponse(String),
}

impl ServiceError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Builds a client whose every request is bounded by `timeout`.
pub fn build_client(timeout: Duration) -> Result<Client, ServiceError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ServiceError::Request(format!("failed to build http client: {e}")))
}

/// Client bounded by the default request timeout, used by adapter constructors.
pub fn default_client() -> Client {
    build_client(TimeoutConfig::default().request_timeout()).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "falling back to an unconfigured http client");
        Client::new()
    })
}

/// Sends `request` and decodes a JSON body, treating any non-2xx status as an error.
pub async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ServiceError> {
    let response = request
        .send()
        .await
        .map_err(transport_error)?;
    let status = response.status();
    tracing::debug!(status = status.as_u16(), url = %response.url().path(), "service responded");

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ServiceError::Status {
            status: status.as_u16(),
            body: snippet(&body),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(transport_error)?;
    serde_json::from_slice(&bytes).map_err(|e| ServiceError::InvalidResponse(e.to_string()))
}

// Request URLs can carry API keys in their query string.
fn transport_error(err: reqwest::Error) -> ServiceError {
    ServiceError::Request(err.without_url().to_string())
}

fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(BODY_SNIPPET_CHARS) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}
