// SPDX-License-Identifier: MIT OR Apache-2.0

use cwn_core::{DepsIngestSpec, Entity, EntityKind, Properties};
use cwn_fs::{FsLimits, MemFs};
use cwn_ingest::{DepsIngester, Ingester};
use cwn_provider::mock::MockProvider;
use std::sync::Arc;
use uuid::Uuid;

const URL: &str = "https://example.com/acme/widgets.git";

fn repo_entity() -> Entity {
    let mut properties = Properties::new();
    properties.insert("clone_url", URL);
    properties.insert("default_branch", "main");
    Entity {
        id: Uuid::nil(),
        upstream_id: "r".into(),
        kind: EntityKind::Repository,
        project_id: Uuid::nil(),
        provider_id: "test".into(),
        properties,
        originated_from: None,
    }
}

#[tokio::test]
async fn extracts_sbom_nodes_across_ecosystems() {
    let mut fs = MemFs::new();
    fs.insert("go.mod", "module m\n\nrequire golang.org/x/mod v0.21.0\n")
        .unwrap();
    fs.insert("requirements.txt", "requests>=2.0,<3\n").unwrap();
    fs.insert(
        "package-lock.json",
        r#"{"packages": {"node_modules/left-pad": {"version": "1.3.0"}}}"#,
    )
    .unwrap();

    let provider =
        Arc::new(MockProvider::new("test").with_worktree(URL, "main", fs.freeze(), "head01"));
    let ingester = DepsIngester::new(DepsIngestSpec::default(), provider, FsLimits::default());

    let result = ingester
        .ingest(&repo_entity(), &serde_json::json!({}))
        .await
        .unwrap();
    let object = result.object.unwrap();
    let nodes = object["nodes"].as_array().unwrap();

    let purls: Vec<&str> = nodes
        .iter()
        .map(|n| n["purl"].as_str().unwrap())
        .collect();
    assert_eq!(
        purls,
        vec![
            "pkg:golang/golang.org/x/mod@0.21.0",
            "pkg:npm/left-pad@1.3.0",
            "pkg:pypi/requests@2.0",
        ]
    );
    for node in nodes {
        assert_eq!(node["type"], "PACKAGE");
        assert!(node["id"].as_str().is_some());
    }

    // The worktree view rides along for filesystem evaluators.
    assert!(result.fs.unwrap().exists("go.mod"));
}
