// SPDX-License-Identifier: MIT OR Apache-2.0

use cwn_core::{Entity, EntityKind, Properties, RestFallback, RestIngestSpec};
use cwn_ingest::{IngestError, Ingester, RestIngester};
use cwn_provider::mock::MockProvider;
use cwn_provider::{
    FetchOptions, HttpRequest, HttpResponse, Provider, ProviderError, RestClient,
};
use cwn_provider::rest::ReqwestRestClient;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn repo_entity() -> Entity {
    let mut properties = Properties::new();
    properties.insert("repo_owner", "acme");
    properties.insert("repo_name", "widgets");
    Entity {
        id: uuid::Uuid::nil(),
        upstream_id: "github:1".into(),
        kind: EntityKind::Repository,
        project_id: uuid::Uuid::nil(),
        provider_id: "test".into(),
        properties,
        originated_from: None,
    }
}

fn spec(endpoint: &str) -> RestIngestSpec {
    RestIngestSpec {
        endpoint: endpoint.into(),
        method: None,
        body: None,
        parse: Some("json".into()),
        fallback: vec![],
    }
}

const CAP: usize = 1024 * 1024;

#[tokio::test]
async fn renders_endpoint_and_decodes_json() {
    let provider = Arc::new(MockProvider::new("test").with_response(
        "GET",
        "repos/acme/widgets",
        200,
        "{\"archived\":false}",
    ));
    let ingester = RestIngester::new(
        spec("repos/{entity.properties.repo_owner}/{entity.properties.repo_name}"),
        provider.clone(),
        CAP,
    );

    let result = ingester
        .ingest(&repo_entity(), &serde_json::json!({}))
        .await
        .unwrap();
    assert_eq!(result.object.unwrap()["archived"], false);
    assert!(result.checkpoint.is_some());

    let seen = provider.requests_seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].method, "GET");
}

#[tokio::test]
async fn fallback_body_is_presented_exactly_once_on_404() {
    let provider = Arc::new(MockProvider::new("test"));
    let mut rest_spec = spec("repos/acme/widgets/branches/main/protection");
    rest_spec.fallback = vec![RestFallback {
        http_code: 404,
        body: "{\"message\":\"Not Found\"}".into(),
    }];
    let ingester = RestIngester::new(rest_spec, provider.clone(), CAP);

    let result = ingester
        .ingest(&repo_entity(), &serde_json::json!({}))
        .await
        .unwrap();
    assert_eq!(result.object.unwrap()["message"], "Not Found");
    assert_eq!(provider.requests_seen().len(), 1);
}

#[tokio::test]
async fn unmatched_error_status_is_an_ingest_error() {
    let provider = Arc::new(
        MockProvider::new("test").with_response("GET", "broken", 500, "oops"),
    );
    let ingester = RestIngester::new(spec("broken"), provider, CAP);
    let err = ingester
        .ingest(&repo_entity(), &serde_json::json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::Other(_)));
}

#[tokio::test]
async fn oversized_json_truncates_and_fails_to_parse() {
    // A body over the cap gets truncated mid-document.
    let big = format!("{{\"filler\":\"{}\"}}", "x".repeat(2 * CAP));
    let provider = Arc::new(MockProvider::new("test").with_response("GET", "big", 200, big));
    let ingester = RestIngester::new(spec("big"), provider, CAP);
    let err = ingester
        .ingest(&repo_entity(), &serde_json::json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::Other(_)));
}

#[tokio::test]
async fn oversized_raw_body_truncates_and_succeeds() {
    let big = "y".repeat(2 * CAP);
    let provider = Arc::new(MockProvider::new("test").with_response("GET", "big", 200, big));
    let mut raw_spec = spec("big");
    raw_spec.parse = None;
    let ingester = RestIngester::new(raw_spec, provider, CAP);

    let result = ingester
        .ingest(&repo_entity(), &serde_json::json!({}))
        .await
        .unwrap();
    let text = result.object.unwrap();
    assert_eq!(text.as_str().unwrap().len(), CAP);
}

#[tokio::test]
async fn template_errors_are_fatal() {
    let provider = Arc::new(MockProvider::new("test"));
    let ingester = RestIngester::new(spec("repos/{params.missing}"), provider.clone(), CAP);
    let err = ingester
        .ingest(&repo_entity(), &serde_json::json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::Template(_)));
    // The request was never issued.
    assert!(provider.requests_seen().is_empty());
}

// ---------------------------------------------------------------------------
// Full provider path against a live HTTP server
// ---------------------------------------------------------------------------

/// Minimal provider wrapping the real reqwest client.
struct LiveRestProvider {
    client: ReqwestRestClient,
}

#[async_trait::async_trait]
impl RestClient for LiveRestProvider {
    fn new_request(
        &self,
        method: &str,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> Result<HttpRequest, ProviderError> {
        self.client.new_request(method, url, body)
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ProviderError> {
        self.client.send(request).await
    }
}

#[async_trait::async_trait]
impl Provider for LiveRestProvider {
    fn id(&self) -> &str {
        "live"
    }

    fn supports_entity(&self, _kind: EntityKind) -> bool {
        true
    }

    fn rest(&self) -> Option<&dyn RestClient> {
        Some(self)
    }

    async fn fetch_all_properties(
        &self,
        identifying: &Properties,
        _kind: EntityKind,
        _opts: FetchOptions,
    ) -> Result<Properties, ProviderError> {
        Ok(identifying.clone())
    }

    fn entity_name(&self, _kind: EntityKind, _props: &Properties) -> String {
        "live".into()
    }

    async fn register_entity(
        &self,
        _kind: EntityKind,
        props: &Properties,
    ) -> Result<Properties, ProviderError> {
        Ok(props.clone())
    }

    async fn deregister_entity(
        &self,
        _kind: EntityKind,
        _props: &Properties,
    ) -> Result<(), ProviderError> {
        Ok(())
    }
}

#[tokio::test]
async fn branch_protection_fallback_over_real_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/branches/main/protection"))
        .respond_with(ResponseTemplate::new(404).set_body_string("{\"message\":\"Branch not protected\"}"))
        .mount(&server)
        .await;

    let provider = Arc::new(LiveRestProvider {
        client: ReqwestRestClient::new(server.uri()),
    });
    let mut rest_spec = spec(
        "repos/{entity.properties.repo_owner}/{entity.properties.repo_name}/branches/{params.branch}/protection",
    );
    rest_spec.fallback = vec![RestFallback {
        http_code: 404,
        body: "{\"message\":\"Not Found\"}".into(),
    }];
    let ingester = RestIngester::new(rest_spec, provider, CAP);

    let result = ingester
        .ingest(&repo_entity(), &serde_json::json!({"branch": "main"}))
        .await
        .unwrap();
    // The configured fallback replaces the server's body.
    assert_eq!(result.object.unwrap()["message"], "Not Found");
}
