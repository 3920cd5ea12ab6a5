// SPDX-License-Identifier: MIT OR Apache-2.0

//! The REST ingester.
//!
//! Issues one request through the provider's authenticated HTTP client.
//! Fallbacks substitute a literal body for configured error statuses so
//! that, say, a 404 can mean "feature absent" to an evaluator instead of
//! an ingest failure.

use crate::template;
use crate::{IngestError, IngestResult, Ingester};
use async_trait::async_trait;
use cwn_core::{CheckpointV1, Entity, RestIngestSpec};
use cwn_provider::Provider;
use std::sync::Arc;
use tracing::debug;

/// One authenticated HTTP request, templated from `{entity, params}`.
pub struct RestIngester {
    spec: RestIngestSpec,
    provider: Arc<dyn Provider>,
    max_body_bytes: usize,
}

impl RestIngester {
    /// Create a REST ingester capping response bodies at
    /// `max_body_bytes`.
    #[must_use]
    pub fn new(spec: RestIngestSpec, provider: Arc<dyn Provider>, max_body_bytes: usize) -> Self {
        Self {
            spec,
            provider,
            max_body_bytes,
        }
    }
}

#[async_trait]
impl Ingester for RestIngester {
    async fn ingest(
        &self,
        entity: &Entity,
        params: &serde_json::Value,
    ) -> Result<IngestResult, IngestError> {
        let ctx = template::context(entity, params);
        let url = template::render(&self.spec.endpoint, &ctx)
            .map_err(|e| IngestError::Template(e.to_string()))?;
        let body = match &self.spec.body {
            Some(tpl) => Some(
                template::render(tpl, &ctx)
                    .map_err(|e| IngestError::Template(e.to_string()))?
                    .into_bytes(),
            ),
            None => None,
        };
        let method = self.spec.method.as_deref().unwrap_or("GET");

        let rest = self
            .provider
            .rest()
            .ok_or_else(|| IngestError::Config("provider has no REST capability".to_owned()))?;
        let request = rest.new_request(method, &url, body)?;
        debug!(target: "cwn.ingest", %url, method, "rest ingest");
        let response = rest.send(request).await?;

        // Hard cap before anything looks at the body.
        let mut data = response.body;
        if data.len() > self.max_body_bytes {
            data.truncate(self.max_body_bytes);
        }

        if response.status >= 400 {
            match self
                .spec
                .fallback
                .iter()
                .find(|f| f.http_code == response.status)
            {
                Some(fallback) => {
                    debug!(
                        target: "cwn.ingest",
                        status = response.status,
                        "applying rest fallback body"
                    );
                    data = fallback.body.clone().into_bytes();
                }
                None => {
                    return Err(IngestError::Other(format!(
                        "unexpected HTTP status {}",
                        response.status
                    )));
                }
            }
        }

        let object = if self.spec.parse.as_deref() == Some("json") {
            serde_json::from_slice(&data)
                .map_err(|e| IngestError::Other(format!("response is not valid JSON: {e}")))?
        } else {
            // Raw mode: UTF-8 text when it decodes, a byte array
            // otherwise.
            match String::from_utf8(data) {
                Ok(text) => serde_json::Value::String(text),
                Err(e) => serde_json::Value::from(e.into_bytes()),
            }
        };

        Ok(IngestResult {
            object: Some(object),
            fs: None,
            checkpoint: Some(CheckpointV1::now().seal()),
        })
    }

    fn ingest_type(&self) -> &'static str {
        "rest"
    }

    fn config(&self) -> Option<serde_json::Value> {
        serde_json::to_value(&self.spec).ok()
    }
}
