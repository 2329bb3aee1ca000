//! reqwest-backed HTTP client.

use async_trait::async_trait;
use docweave_engine::{HttpClient, HttpResponse, StoreError};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Sends JSON requests with a per-call timeout.
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a client whose calls give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn post_json(
        &self,
        url: &str,
        bearer: Option<&str>,
        body: &Value,
    ) -> Result<HttpResponse, StoreError> {
        let mut request = self.client.post(url).json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        // No response at all (timeout, refused connection) is a network error.
        let response = request
            .send()
            .await
            .map_err(|error| StoreError::network(error.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|error| StoreError::network(error.to_string()))?;
        debug!(url, status, bytes = body.len(), "response received");

        Ok(HttpResponse { status, body })
    }
}
