// SPDX-License-Identifier: MIT
//! HTTP client for the project and telemetry endpoints.

use std::sync::Arc;
use std::time::Duration;

use ar_scene::project::Project;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::BackendError;
use crate::events::ArEvent;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Source of the signed-in user's bearer token.
///
/// The viewer itself works anonymously; hosts that embed it next to an
/// authenticated dashboard can supply a token so owner views are attributed.
pub trait TokenProvider: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// Anonymous access.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAuth;

impl TokenProvider for NoAuth {
    fn bearer_token(&self) -> Option<String> {
        None
    }
}

/// A fixed token, e.g. from a CLI flag.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

impl TokenProvider for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

#[derive(Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
}

/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl BackendClient {
    /// Create a client rooted at `base_url` (e.g. `https://host/api/v1`).
    pub fn new(base_url: impl Into<String>) -> Result<Self, BackendError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens: Arc::new(NoAuth),
        })
    }

    pub fn with_token_provider(mut self, tokens: Arc<dyn TokenProvider>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn project_url(&self, short_code: &str) -> Result<String, BackendError> {
        validate_short_code(short_code)?;
        Ok(format!("{}/ar/{}", self.base_url, short_code))
    }

    pub fn events_url(&self, project_id: &str) -> String {
        format!("{}/ar/projects/{}/events", self.base_url, project_id)
    }

    /// `GET project-by-short-code`.
    pub async fn project_by_short_code(&self, short_code: &str) -> Result<Project, BackendError> {
        let url = self.project_url(short_code)?;
        debug!(%url, "fetching project");
        let request = self.authorize(self.http.get(&url));
        let envelope: Envelope<Project> = Self::execute(request).await?;
        envelope
            .data
            .ok_or_else(|| BackendError::Decode("project response has no data".to_string()))
    }

    /// `POST track-ar-event`. The response body carries nothing the viewer needs.
    pub async fn track_ar_event(&self, project_id: &str, event: &ArEvent) -> Result<(), BackendError> {
        let url = self.events_url(project_id);
        debug!(%url, event = event.event_type.as_str(), "sending AR event");
        let request = self
            .authorize(self.http.post(&url))
            .header(CONTENT_TYPE, "application/json")
            .json(event);
        let _: Envelope<serde_json::Value> = Self::execute(request).await?;
        Ok(())
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.tokens.bearer_token() {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => request,
        }
    }

    async fn execute<T: DeserializeOwned>(
        request: reqwest::RequestBuilder,
    ) -> Result<Envelope<T>, BackendError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        let parsed = serde_json::from_str::<Envelope<T>>(&body);
        if !status.is_success() {
            // Error bodies only need their message; decode them loosely
            let message = serde_json::from_str::<Envelope<serde_json::Value>>(&body)
                .ok()
                .and_then(|e| e.message)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
            return Err(BackendError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let envelope = parsed.map_err(|e| BackendError::Decode(e.to_string()))?;
        if !envelope.success {
            return Err(BackendError::Rejected {
                status: status.as_u16(),
                message: envelope
                    .message
                    .clone()
                    .unwrap_or_else(|| "request was not successful".to_string()),
            });
        }
        Ok(envelope)
    }
}

fn validate_short_code(short_code: &str) -> Result<(), BackendError> {
    let valid = !short_code.is_empty()
        && short_code.len() <= 64
        && short_code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(BackendError::InvalidShortCode(short_code.to_string()))
    }
}
