// SPDX-License-Identifier: MIT OR Apache-2.0

use cwn_core::{
    DataSourceEvalSpec, EntityKind, EvalSpec, GitIngestSpec, IngestSpec, RuleType,
};
use cwn_engine::{EngineError, RuleEngineCache};
use cwn_ingest::{BuiltinRegistry, IngesterLimits};
use cwn_provider::mock::MockProvider;
use cwn_store::memory::InMemoryRuleTypeStore;
use cwn_store::RuleTypeStore;
use std::sync::Arc;
use uuid::Uuid;

fn rule_type(project_id: Uuid, name: &str) -> RuleType {
    RuleType {
        id: Uuid::new_v4(),
        name: name.into(),
        version: "1.0.0".into(),
        project_id,
        entity_kind: EntityKind::Repository,
        severity: Default::default(),
        params_schema: None,
        def_schema: None,
        ingest: IngestSpec::Git(GitIngestSpec::default()),
        eval: EvalSpec::DataSource(DataSourceEvalSpec::default()),
        default_actions: Default::default(),
    }
}

fn cache_over(store: Arc<InMemoryRuleTypeStore>) -> RuleEngineCache {
    RuleEngineCache::new(
        store,
        Arc::new(MockProvider::new("test")),
        Arc::new(BuiltinRegistry::new()),
        IngesterLimits::default(),
    )
}

#[tokio::test]
async fn populate_builds_one_engine_per_rule_type() {
    let parent = Uuid::new_v4();
    let child = Uuid::new_v4();
    let mut store = InMemoryRuleTypeStore::new();
    store.set_parent(child, parent);
    store.add(rule_type(parent, "inherited"));
    store.add(rule_type(child, "own"));
    let store = Arc::new(store);

    let hierarchy = store.parent_projects(child).await.unwrap();
    let cache = cache_over(Arc::clone(&store));
    cache
        .populate(EntityKind::Repository, &hierarchy)
        .await
        .unwrap();

    assert_eq!(cache.len(), 2);
    assert!(cache.engine_by_name("inherited").is_some());
    assert!(cache.engine_by_name("own").is_some());
}

#[tokio::test]
async fn nearest_project_wins_the_name_binding() {
    let parent = Uuid::new_v4();
    let child = Uuid::new_v4();
    let mut store = InMemoryRuleTypeStore::new();
    store.set_parent(child, parent);

    let parent_rt = rule_type(parent, "branch_protection");
    let child_rt = rule_type(child, "branch_protection");
    let child_id = child_rt.id;
    store.add(parent_rt);
    store.add(child_rt);
    let store = Arc::new(store);

    let hierarchy = store.parent_projects(child).await.unwrap();
    let cache = cache_over(Arc::clone(&store));
    cache
        .populate(EntityKind::Repository, &hierarchy)
        .await
        .unwrap();

    let bound = cache.engine_by_name("branch_protection").unwrap();
    assert_eq!(bound.rule_type().id, child_id);
}

#[tokio::test]
async fn miss_queries_the_store_once_and_interns() {
    let project = Uuid::new_v4();
    let store = Arc::new(InMemoryRuleTypeStore::new());
    let rt = rule_type(project, "late-addition");
    let id = rt.id;
    store.add(rt);

    let cache = cache_over(Arc::clone(&store));
    assert!(cache.is_empty());

    let engine = cache.get_rule_engine(id).await.unwrap();
    assert_eq!(engine.rule_type().name, "late-addition");
    assert_eq!(cache.len(), 1);

    // Second resolve shares the interned engine.
    let again = cache.get_rule_engine(id).await.unwrap();
    assert!(Arc::ptr_eq(&engine, &again));
}

#[tokio::test]
async fn persistent_absence_is_unknown_rule_type() {
    let cache = cache_over(Arc::new(InMemoryRuleTypeStore::new()));
    let err = cache.get_rule_engine(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, EngineError::UnknownRuleType { .. }));
}
