// SPDX-License-Identifier: MIT OR Apache-2.0

use cwn_core::{EntityKind, Properties};
use cwn_fs::{FsLimits, MemFs};
use cwn_provider::mock::MockProvider;
use cwn_provider::rest::ReqwestRestClient;
use cwn_provider::{FetchOptions, GitError, PrFile, Provider, ProviderManager, RestClient};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn pr_file(name: &str) -> PrFile {
    PrFile {
        filename: name.into(),
        patch: None,
        status: "modified".into(),
    }
}

#[tokio::test]
async fn reqwest_client_resolves_relative_urls_and_sends_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets"))
        .and(header("authorization", "Bearer sekrit"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"ok\":true}"))
        .mount(&server)
        .await;

    let client = ReqwestRestClient::new(server.uri()).with_token("sekrit");
    let request = client
        .new_request("get", "repos/acme/widgets", None)
        .unwrap();
    assert_eq!(request.method, "GET");

    let response = client.send(request).await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"{\"ok\":true}");
}

#[tokio::test]
async fn non_2xx_statuses_are_responses_not_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("{\"message\":\"Not Found\"}"))
        .mount(&server)
        .await;

    let client = ReqwestRestClient::new(server.uri());
    let request = client.new_request("GET", "/missing", None).unwrap();
    let response = client.send(request).await.unwrap();
    assert_eq!(response.status, 404);
}

#[test]
fn manager_hands_out_registered_providers() {
    let mut manager = ProviderManager::new();
    manager.register(MockProvider::new("github-app"));

    assert!(manager.instantiate("github-app").is_ok());
    assert!(manager.instantiate("gitlab").is_err());
    assert_eq!(manager.list(), vec!["github-app"]);
}

#[tokio::test]
async fn mock_forge_paginates_pr_files() {
    let files: Vec<PrFile> = (0..7).map(|i| pr_file(&format!("f{i}.txt"))).collect();
    let provider = MockProvider::new("test").with_pr_files("acme", "widgets", 5, files);

    let forge = provider.forge().unwrap();
    let (page1, next) = forge.list_files("acme", "widgets", 5, 3, 1).await.unwrap();
    assert_eq!(page1.len(), 3);
    assert_eq!(next, Some(2));

    let (page3, next) = forge.list_files("acme", "widgets", 5, 3, 3).await.unwrap();
    assert_eq!(page3.len(), 1);
    assert_eq!(next, None);
}

#[tokio::test]
async fn mock_clone_maps_unknown_branch_to_typed_error() {
    let provider = MockProvider::new("test");
    let err = provider
        .git()
        .unwrap()
        .clone_ref("https://example.com/r.git", "nope", FsLimits::default())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        GitError::BranchNotFound {
            branch: "nope".into()
        }
    );
}

#[tokio::test]
async fn mock_tracks_registrations() {
    let provider = MockProvider::new("test");
    let props = Properties::new();
    let out = provider
        .register_entity(EntityKind::Repository, &props)
        .await
        .unwrap();
    assert!(out.get("webhook_id").is_some());
    provider
        .deregister_entity(EntityKind::Repository, &out)
        .await
        .unwrap();
    assert_eq!(provider.registered(), vec![EntityKind::Repository]);
    assert_eq!(provider.deregistered(), vec![EntityKind::Repository]);
}

#[tokio::test]
async fn unsupported_kind_is_rejected_on_fetch() {
    let provider = MockProvider::new("test").supporting([EntityKind::Repository]);
    let err = provider
        .fetch_all_properties(&Properties::new(), EntityKind::Artifact, FetchOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        cwn_provider::ProviderError::UnsupportedEntity { .. }
    ));
}

#[tokio::test]
async fn mock_clone_enforces_the_configured_limits() {
    let mut fs = MemFs::new();
    fs.insert("a.txt", "0123456789").unwrap();
    fs.insert("b.txt", "0123456789").unwrap();
    let provider =
        MockProvider::new("test").with_worktree("https://example.com/r.git", "main", fs.freeze(), "head");

    let tight = FsLimits {
        max_files: 1,
        max_total_bytes: 1024,
    };
    let err = provider
        .git()
        .unwrap()
        .clone_ref("https://example.com/r.git", "main", tight)
        .await
        .unwrap_err();
    assert_eq!(err, GitError::RepositoryTooLarge);

    // Default limits admit the same tree.
    provider
        .git()
        .unwrap()
        .clone_ref("https://example.com/r.git", "main", FsLimits::default())
        .await
        .unwrap();
}
