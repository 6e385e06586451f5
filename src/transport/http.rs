//! HTTP transport backed by reqwest

use super::traits::{FetchedResource, Transport, TransportError};
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// GET-only transport using a shared `reqwest::Client`
///
/// The client enforces the per-request timeout, so a stalled server fails its
/// own outcome instead of holding the whole batch.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    /// Build a transport with the given per-request timeout and User-Agent
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client, timeout })
    }

    /// The per-request timeout in effect
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn classify(&self, url: &str, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout {
                url: url.to_string(),
                after: self.timeout,
            }
        } else if error.is_builder() {
            TransportError::InvalidUrl {
                url: url.to_string(),
                reason: error.to_string(),
            }
        } else if error.is_body() || error.is_decode() {
            TransportError::Body {
                url: url.to_string(),
                reason: error.to_string(),
            }
        } else {
            TransportError::Connect {
                url: url.to_string(),
                reason: error.to_string(),
            }
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> std::result::Result<FetchedResource, TransportError> {
        // Spaces and other unsafe characters are percent-encoded by the parser
        let parsed = url::Url::parse(url).map_err(|e| TransportError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| self.classify(url, e))?;

        if !response.status().is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| match self.classify(url, e) {
                TransportError::Connect { url, reason } => TransportError::Body { url, reason },
                other => other,
            })?;

        tracing::debug!(url, bytes = bytes.len(), ?content_type, "fetched resource");

        Ok(FetchedResource {
            bytes: bytes.to_vec(),
            content_type,
        })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
