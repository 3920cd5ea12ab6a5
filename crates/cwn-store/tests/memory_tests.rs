// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::Duration;
use cwn_core::{
    ActionStatus, DataSourceEvalSpec, EntityKind, EvalSpec, EvaluationOutcome, GitIngestSpec,
    IngestSpec, Profile, ProfileActionConfig, RuleInstance, RuleStatus, RuleType,
};
use cwn_store::memory::{InMemoryOutcomeStore, InMemoryProfileStore, InMemoryRuleTypeStore};
use cwn_store::{OutcomeStore, ProfileStore, RuleTypeStore, StoreError};
use std::collections::BTreeMap;
use uuid::Uuid;

fn rule_type(project_id: Uuid, kind: EntityKind, name: &str) -> RuleType {
    RuleType {
        id: Uuid::new_v4(),
        name: name.into(),
        version: "1.0.0".into(),
        project_id,
        entity_kind: kind,
        severity: Default::default(),
        params_schema: None,
        def_schema: None,
        ingest: IngestSpec::Git(GitIngestSpec::default()),
        eval: EvalSpec::DataSource(DataSourceEvalSpec::default()),
        default_actions: Default::default(),
    }
}

fn profile(project_id: Uuid, kind: EntityKind, name: &str) -> Profile {
    let mut rules = BTreeMap::new();
    rules.insert(
        kind,
        vec![RuleInstance {
            id: Uuid::new_v4(),
            rule_type: "any".into(),
            name: None,
            params: serde_json::json!({}),
            def: serde_json::json!({}),
            actions: None,
        }],
    );
    Profile {
        id: Uuid::new_v4(),
        name: name.into(),
        project_id,
        selectors: vec![],
        actions: ProfileActionConfig::default(),
        rules,
    }
}

#[tokio::test]
async fn parent_projects_walks_the_hierarchy_nearest_first() {
    let root = Uuid::new_v4();
    let mid = Uuid::new_v4();
    let leaf = Uuid::new_v4();

    let mut store = InMemoryRuleTypeStore::new();
    store.set_parent(leaf, mid);
    store.set_parent(mid, root);

    assert_eq!(
        store.parent_projects(leaf).await.unwrap(),
        vec![leaf, mid, root]
    );
    assert_eq!(store.parent_projects(root).await.unwrap(), vec![root]);
}

#[tokio::test]
async fn rule_types_filter_by_kind_and_hierarchy() {
    let parent = Uuid::new_v4();
    let child = Uuid::new_v4();
    let stranger = Uuid::new_v4();

    let mut store = InMemoryRuleTypeStore::new();
    store.set_parent(child, parent);
    store.add(rule_type(parent, EntityKind::Repository, "inherited"));
    store.add(rule_type(child, EntityKind::Repository, "own"));
    store.add(rule_type(child, EntityKind::Artifact, "other-kind"));
    store.add(rule_type(stranger, EntityKind::Repository, "elsewhere"));

    let hierarchy = store.parent_projects(child).await.unwrap();
    let found = store
        .rule_types_in_hierarchy(EntityKind::Repository, &hierarchy)
        .await
        .unwrap();
    let names: Vec<&str> = found.iter().map(|rt| rt.name.as_str()).collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"inherited"));
    assert!(names.contains(&"own"));
}

#[tokio::test]
async fn profiles_filter_by_project_and_applicability() {
    let project = Uuid::new_v4();
    let store = InMemoryProfileStore::new();
    store.add(profile(project, EntityKind::Repository, "repo-rules"));
    store.add(profile(project, EntityKind::Artifact, "artifact-rules"));
    store.add(profile(Uuid::new_v4(), EntityKind::Repository, "elsewhere"));

    let found = store
        .profiles_for_evaluation(project, EntityKind::Repository)
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "repo-rules");
}

#[tokio::test]
async fn live_lease_blocks_second_acquirer() {
    let store = InMemoryOutcomeStore::new();
    let entity = Uuid::new_v4();

    let lease = store
        .try_acquire_lease(entity, Duration::seconds(60))
        .await
        .unwrap();
    let err = store
        .try_acquire_lease(entity, Duration::seconds(60))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::LeaseHeld { .. }));

    store.release_lock(entity, lease.lease_id).await.unwrap();
    store
        .try_acquire_lease(entity, Duration::seconds(60))
        .await
        .unwrap();
}

#[tokio::test]
async fn expired_lease_is_claimed_over_and_newer_wins() {
    let store = InMemoryOutcomeStore::new();
    let entity = Uuid::new_v4();

    let stale = store
        .try_acquire_lease(entity, Duration::seconds(-1))
        .await
        .unwrap();
    let fresh = store
        .try_acquire_lease(entity, Duration::seconds(60))
        .await
        .unwrap();
    assert_ne!(stale.lease_id, fresh.lease_id);

    // The superseded holder can no longer refresh.
    let err = store
        .update_lease(entity, stale.lease_id, Duration::seconds(60))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::LeaseLost { .. }));

    // Releasing the superseded lease is a harmless no-op.
    store.release_lock(entity, stale.lease_id).await.unwrap();
    store
        .update_lease(entity, fresh.lease_id, Duration::seconds(60))
        .await
        .unwrap();
}

#[tokio::test]
async fn upsert_keeps_one_authoritative_outcome_per_triple() {
    let store = InMemoryOutcomeStore::new();
    let (entity, profile_id, rule) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    let mut outcome = EvaluationOutcome {
        entity_id: entity,
        profile_id,
        rule_instance_id: rule,
        status: RuleStatus::Failure,
        remediation: ActionStatus::Skipped,
        alert: ActionStatus::Skipped,
        detail: None,
        checkpoint: None,
        timestamp: chrono::Utc::now(),
        lease_id: Uuid::new_v4(),
    };
    store.upsert_status(outcome.clone()).await.unwrap();

    outcome.status = RuleStatus::Success;
    store.upsert_status(outcome.clone()).await.unwrap();

    assert_eq!(store.all_outcomes().len(), 1);
    assert_eq!(
        store.outcome(entity, profile_id, rule).unwrap().status,
        RuleStatus::Success
    );
}
