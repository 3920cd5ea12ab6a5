// SPDX-License-Identifier: MIT OR Apache-2.0

//! reqwest-backed [`RestClient`].
//!
//! Wraps one authenticated `reqwest::Client` pointed at a provider API
//! base. Non-2xx statuses come back as responses — the REST ingester's
//! fallback handling depends on seeing them — and only transport-level
//! failures become errors.

use crate::{HttpRequest, HttpResponse, ProviderError, RestClient};
use async_trait::async_trait;

/// An authenticated HTTP client for one provider API surface.
pub struct ReqwestRestClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ReqwestRestClient {
    /// Create a client against `base_url` with no authentication.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            token: None,
        }
    }

    /// Attach a bearer token sent with every request.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Resolve a possibly-relative URL against the configured base.
    fn resolve(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            return url.to_owned();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            url.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl RestClient for ReqwestRestClient {
    fn new_request(
        &self,
        method: &str,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> Result<HttpRequest, ProviderError> {
        let method = method.trim().to_uppercase();
        if method.is_empty() {
            return Err(ProviderError::Other("empty HTTP method".to_owned()));
        }
        Ok(HttpRequest {
            method,
            url: self.resolve(url),
            body,
        })
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ProviderError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| ProviderError::Other(format!("invalid HTTP method: {e}")))?;

        let mut builder = self.http.request(method, &request.url);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?
            .to_vec();

        Ok(HttpResponse { status, body })
    }
}
