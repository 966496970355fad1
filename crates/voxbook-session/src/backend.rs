//! HTTP collaborator issuing session credentials and call summaries.

use crate::error::SessionError;
use async_trait::async_trait;
use std::time::Duration;
use voxbook_types::{CallSummary, TokenResponse};

/// Remote backend consumed by the call controller.
#[async_trait]
pub trait CallBackend: Send + Sync + 'static {
    /// `GET /api/token`. Any failure aborts the call start.
    async fn fetch_token(&self) -> Result<TokenResponse, SessionError>;

    /// `GET /api/summary`. Failures are retried by the caller.
    async fn fetch_summary(&self) -> Result<CallSummary, SessionError>;
}

#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("voxbook/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, String> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.client.get(&url).send().await.map_err(|e| {
            tracing::debug!(url = %url, error = %e, "backend request failed");
            e.to_string()
        })?;

        if !resp.status().is_success() {
            return Err(format!("{} returned {}", path, resp.status()));
        }
        Ok(resp)
    }
}

#[async_trait]
impl CallBackend for HttpBackend {
    async fn fetch_token(&self) -> Result<TokenResponse, SessionError> {
        let resp = self.get("/api/token").await.map_err(SessionError::SessionStart)?;
        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| SessionError::SessionStart(format!("invalid token response: {}", e)))?;

        if token.token.is_empty() {
            return Err(SessionError::SessionStart(
                "token endpoint returned an empty credential".to_string(),
            ));
        }
        Ok(token)
    }

    async fn fetch_summary(&self) -> Result<CallSummary, SessionError> {
        let resp = self
            .get("/api/summary")
            .await
            .map_err(SessionError::SummaryFetch)?;
        resp.json()
            .await
            .map_err(|e| SessionError::SummaryFetch(format!("invalid summary body: {}", e)))
    }
}
