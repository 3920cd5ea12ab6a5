// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire-format compatibility: documents the JSON shapes stores and the
//! control plane rely on. A failure here means a breaking change.

use cwn_core::{
    ActionSetting, Comparator, DepFilter, DiffMode, Entity, EntityEvent, EntityKind,
    EvaluationOutcome, IngestSpec, Profile, RuleStatus, RuleType,
};

#[test]
fn rule_type_wire_shape_is_stable() {
    let raw = r#"{
        "id": "8d8ac610-566d-4ef0-9c22-186b2a5ed793",
        "name": "branch_protection_enabled",
        "version": "1.0.0",
        "project_id": "7c9e6679-7425-40de-944b-e07fc1f90ae7",
        "entity_kind": "repository",
        "severity": "high",
        "ingest": {
            "type": "rest",
            "endpoint": "repos/{entity.properties.repo_owner}/{entity.properties.repo_name}/protection",
            "parse": "json",
            "fallback": [{"http_code": 404, "body": "{\"message\":\"Not Found\"}"}]
        },
        "eval": {
            "type": "data_source",
            "assertions": [{"path": "$.enabled", "op": "eq", "value": true}]
        },
        "default_actions": {"remediate": "off", "alert": "on"}
    }"#;

    let rule_type: RuleType = serde_json::from_str(raw).unwrap();
    assert_eq!(rule_type.entity_kind, EntityKind::Repository);
    assert_eq!(rule_type.ingest.type_tag(), "rest");
    assert_eq!(rule_type.default_actions.alert, ActionSetting::On);
    match &rule_type.ingest {
        IngestSpec::Rest(spec) => {
            assert_eq!(spec.fallback.len(), 1);
            assert_eq!(spec.fallback[0].http_code, 404);
        }
        other => panic!("unexpected ingest spec: {other:?}"),
    }

    // Round trip preserves the tagged representation.
    let json = serde_json::to_value(&rule_type).unwrap();
    assert_eq!(json["ingest"]["type"], "rest");
    assert_eq!(json["eval"]["type"], "data_source");
    assert_eq!(json["eval"]["assertions"][0]["op"], "eq");
    let back: RuleType = serde_json::from_value(json).unwrap();
    assert_eq!(back, rule_type);
}

#[test]
fn diff_ingest_spec_wire_shape_is_stable() {
    let raw = r#"{
        "type": "diff",
        "mode": "pr_files",
        "ecosystems": [{"ecosystem": "go", "depfile": "**/go.mod"}],
        "filter": "new_and_updated"
    }"#;
    let spec: IngestSpec = serde_json::from_str(raw).unwrap();
    match spec {
        IngestSpec::Diff(diff) => {
            assert_eq!(diff.mode, DiffMode::PrFiles);
            assert_eq!(diff.filter, DepFilter::NewAndUpdated);
        }
        other => panic!("unexpected ingest spec: {other:?}"),
    }
}

#[test]
fn profile_wire_shape_is_stable() {
    let raw = r#"{
        "id": "6f2f69ff-6c35-41f5-8d8b-6e07e9a0ec30",
        "name": "baseline",
        "project_id": "7c9e6679-7425-40de-944b-e07fc1f90ae7",
        "selectors": [
            {"kind": "repository", "expr": "properties.is_private == false"}
        ],
        "actions": {"alert": "dry_run"},
        "rules": {
            "repository": [
                {
                    "id": "f3b9c2d1-0000-4000-8000-000000000001",
                    "rule_type": "branch_protection_enabled",
                    "params": {"branch": "main"},
                    "def": {}
                }
            ]
        }
    }"#;

    let profile: Profile = serde_json::from_str(raw).unwrap();
    assert!(profile.applies_to(EntityKind::Repository));
    assert!(!profile.applies_to(EntityKind::Artifact));
    assert_eq!(profile.actions.alert, Some(ActionSetting::DryRun));
    assert_eq!(profile.actions.remediate, None);
    assert_eq!(profile.selectors_for(EntityKind::Repository).len(), 1);
    assert!(profile.selectors_for(EntityKind::Artifact).is_empty());

    let rules = profile.rules_for(EntityKind::Repository);
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].params["branch"], "main");
}

#[test]
fn outcome_wire_shape_is_stable() {
    let raw = r#"{
        "entity_id": "8d8ac610-566d-4ef0-9c22-186b2a5ed793",
        "profile_id": "6f2f69ff-6c35-41f5-8d8b-6e07e9a0ec30",
        "rule_instance_id": "f3b9c2d1-0000-4000-8000-000000000001",
        "status": "failure",
        "remediation": "skipped",
        "alert": "not_supported",
        "detail": "evaluation failed: $.enabled eq true does not hold",
        "checkpoint": {
            "version": "v1",
            "checkpoint": {"timestamp": "2026-01-01T00:00:00Z", "branch": "main"}
        },
        "timestamp": "2026-01-01T00:00:01Z",
        "lease_id": "00000000-0000-4000-8000-000000000009"
    }"#;

    let outcome: EvaluationOutcome = serde_json::from_str(raw).unwrap();
    assert_eq!(outcome.status, RuleStatus::Failure);
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["checkpoint"]["version"], "v1");
    assert_eq!(json["checkpoint"]["checkpoint"]["branch"], "main");
    let back: EvaluationOutcome = serde_json::from_value(json).unwrap();
    assert_eq!(back, outcome);
}

#[test]
fn entity_event_wire_shape_is_stable() {
    let raw = r#"{
        "version": "cwn/v1",
        "project_id": "7c9e6679-7425-40de-944b-e07fc1f90ae7",
        "provider_id": "github-app",
        "execution_id": "00000000-0000-4000-8000-00000000000a",
        "entity": {
            "id": "8d8ac610-566d-4ef0-9c22-186b2a5ed793",
            "upstream_id": "github:123456",
            "kind": "pull_request",
            "project_id": "7c9e6679-7425-40de-944b-e07fc1f90ae7",
            "provider_id": "github-app",
            "properties": {
                "is_private": {"value": false},
                "pr_number": {"value": 7},
                "repo_name": {"value": "widgets", "fetched_at": "2026-01-01T00:00:00Z"}
            }
        }
    }"#;

    let event: EntityEvent = serde_json::from_str(raw).unwrap();
    assert_eq!(event.entity.kind, EntityKind::PullRequest);
    assert_eq!(event.entity.properties.bool_of("is_private"), Some(false));
    assert_eq!(
        event
            .entity
            .properties
            .value_of("pr_number")
            .and_then(cwn_core::PropertyValue::as_int),
        Some(7)
    );

    let back: Entity =
        serde_json::from_value(serde_json::to_value(&event.entity).unwrap()).unwrap();
    assert_eq!(back, event.entity);
}
