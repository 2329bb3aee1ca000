//! HTTP document store.
//!
//! Talks to the remote document API through a JSON envelope of the form
//! `{code, msg, data}`. The HTTP client itself is abstracted via a trait so
//! the engine does not depend on a particular HTTP library.

use crate::error::StoreError;
use crate::transport::DocumentStore;
use async_trait::async_trait;
use docweave_model::{Block, BlockId, ConvertedDocument};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

const CONVERT_PATH: &str = "/open-apis/docx/v1/documents/blocks/convert";
const TENANT_TOKEN_PATH: &str = "/open-apis/auth/v3/tenant_access_token/internal";
const EXCERPT_CHARS: usize = 200;

/// Raw HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: String,
}

/// HTTP client abstraction.
///
/// Implementations return `StoreError::network` when no response was
/// received at all, and an `HttpResponse` for every status otherwise.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a JSON POST request.
    async fn post_json(
        &self,
        url: &str,
        bearer: Option<&str>,
        body: &Value,
    ) -> Result<HttpResponse, StoreError>;
}

#[async_trait]
impl<C: HttpClient + ?Sized> HttpClient for Arc<C> {
    async fn post_json(
        &self,
        url: &str,
        bearer: Option<&str>,
        body: &Value,
    ) -> Result<HttpResponse, StoreError> {
        (**self).post_json(url, bearer, body).await
    }
}

/// Supplies the bearer token for store calls.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns a currently valid token.
    async fn token(&self) -> Result<String, StoreError>;
}

/// A fixed, externally managed token.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    /// Wraps a token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken(***)")
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Result<String, StoreError> {
        Ok(self.0.clone())
    }
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Fetches app-level tenant tokens and caches them until shortly before
/// expiry. Concurrent callers share one refresh.
pub struct TenantTokenCache<C> {
    base_url: String,
    app_id: String,
    app_secret: String,
    client: Arc<C>,
    skew: Duration,
    cached: Mutex<Option<CachedToken>>,
}

impl<C: HttpClient> TenantTokenCache<C> {
    /// Creates a cache refreshing 60s before expiry.
    pub fn new(
        base_url: impl Into<String>,
        app_id: impl Into<String>,
        app_secret: impl Into<String>,
        client: Arc<C>,
    ) -> Self {
        Self {
            base_url: trim_base(base_url.into()),
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            client,
            skew: Duration::from_secs(60),
            cached: Mutex::new(None),
        }
    }

    /// Sets how long before expiry the token is refreshed.
    pub fn with_skew(mut self, skew: Duration) -> Self {
        self.skew = skew;
        self
    }

    async fn fetch(&self) -> Result<CachedToken, StoreError> {
        info!(app_id = %self.app_id, "requesting tenant access token");
        let url = format!("{}{}", self.base_url, TENANT_TOKEN_PATH);
        let body = json!({ "app_id": self.app_id, "app_secret": self.app_secret });
        let response = self.client.post_json(&url, None, &body).await?;
        let envelope = parse_envelope(&response)?;

        let value = envelope
            .get("tenant_access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::invalid("token response has no tenant_access_token"))?
            .to_string();
        let ttl = envelope.get("expire").and_then(Value::as_u64).unwrap_or(3600);
        debug!(ttl_secs = ttl, "tenant access token refreshed");

        Ok(CachedToken {
            value,
            expires_at: Instant::now() + Duration::from_secs(ttl),
        })
    }
}

#[async_trait]
impl<C: HttpClient> TokenProvider for TenantTokenCache<C> {
    async fn token(&self) -> Result<String, StoreError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() + self.skew < token.expires_at {
                return Ok(token.value.clone());
            }
        }
        let fresh = self.fetch().await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }
}

/// A [`DocumentStore`] backed by the remote document HTTP API.
pub struct HttpDocumentStore<C, T> {
    base_url: String,
    client: Arc<C>,
    tokens: T,
}

impl<C: HttpClient, T: TokenProvider> HttpDocumentStore<C, T> {
    /// Creates a store.
    pub fn new(base_url: impl Into<String>, client: Arc<C>, tokens: T) -> Self {
        Self {
            base_url: trim_base(base_url.into()),
            client,
            tokens,
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, StoreError> {
        let token = self.tokens.token().await?;
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, body = %summarize(body), "store request");
        let response = self.client.post_json(&url, Some(&token), body).await?;
        debug!(url = %url, status = response.status, "store response");
        parse_envelope(&response)
    }
}

#[async_trait]
impl<C: HttpClient, T: TokenProvider> DocumentStore for HttpDocumentStore<C, T> {
    async fn convert(&self, markdown: &str) -> Result<ConvertedDocument, StoreError> {
        let body = json!({ "content": markdown, "content_type": "markdown" });
        let data = self.post(CONVERT_PATH, &body).await?;

        let converted: ConvertedDocument = serde_json::from_value(data)
            .map_err(|e| StoreError::invalid(format!("invalid conversion output: {e}")))?;
        if converted.is_empty() {
            return Err(StoreError::invalid("conversion returned no blocks"));
        }
        debug!(
            blocks = converted.len(),
            top_level = converted.top_level_order.len(),
            "conversion succeeded"
        );
        Ok(converted)
    }

    async fn write_batch(
        &self,
        document_id: &str,
        container_id: &BlockId,
        top_level_ids: &[BlockId],
        blocks: &[Block],
    ) -> Result<(), StoreError> {
        let path = format!(
            "/open-apis/docx/v1/documents/{document_id}/blocks/{container_id}/descendant"
        );
        let body = json!({ "children_id": top_level_ids, "descendants": blocks });
        self.post(&path, &body).await.map(|_| ())
    }
}

fn trim_base(mut base: String) -> String {
    while base.ends_with('/') {
        base.pop();
    }
    base
}

/// Unwraps a `{code, msg, data}` envelope, classifying failures.
fn parse_envelope(response: &HttpResponse) -> Result<Value, StoreError> {
    let envelope: Value = serde_json::from_str(&response.body).map_err(|_| {
        let excerpt: String = response.body.chars().take(EXCERPT_CHARS).collect();
        StoreError::from_response(
            response.status,
            None,
            format!("non-JSON response: {excerpt}"),
        )
    })?;

    let code = envelope.get("code").and_then(Value::as_i64);
    let ok_status = (200..300).contains(&response.status);
    if !ok_status || code != Some(0) {
        let msg = envelope
            .get("msg")
            .and_then(Value::as_str)
            .unwrap_or("missing or non-zero code");
        return Err(StoreError::from_response(response.status, code, msg));
    }

    // Token responses put their fields beside `code` rather than under `data`.
    Ok(match envelope.get("data") {
        Some(data) => data.clone(),
        None => envelope,
    })
}

/// Describes a request body by shape only, so content never reaches the logs.
fn summarize(body: &Value) -> String {
    match body {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| match value {
                Value::Array(items) => format!("{key}[{}]", items.len()),
                Value::String(s) => format!("{key}:<{} chars>", s.chars().count()),
                _ => key.clone(),
            })
            .collect::<Vec<_>>()
            .join(" "),
        Value::Array(items) => format!("[{}]", items.len()),
        _ => "<scalar>".to_string(),
    }
}
