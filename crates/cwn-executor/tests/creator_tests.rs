// SPDX-License-Identifier: MIT OR Apache-2.0

use cwn_core::{EntityKind, Properties, PROP_IS_ARCHIVED, PROP_IS_PRIVATE};
use cwn_executor::{CreateError, EntityCreator, MessageBus, ProjectPolicy, TOPIC_REPO_INIT};
use cwn_provider::mock::MockProvider;
use cwn_provider::ProviderManager;
use std::sync::Arc;
use uuid::Uuid;

fn manager_with(provider: MockProvider) -> (Arc<ProviderManager>, Arc<MockProvider>) {
    let provider = Arc::new(provider);
    let mut manager = ProviderManager::new();
    manager.register_arc(Arc::clone(&provider) as Arc<dyn cwn_provider::Provider>);
    (Arc::new(manager), provider)
}

fn repo_properties(archived: bool, private: bool) -> Properties {
    let mut properties = Properties::new();
    properties.insert(cwn_core::PROP_UPSTREAM_ID, "github:1");
    properties.insert(PROP_IS_ARCHIVED, archived);
    properties.insert(PROP_IS_PRIVATE, private);
    properties.insert("name", "acme/widgets");
    properties
}

#[tokio::test]
async fn archived_repo_is_rejected_before_registration() {
    let (manager, provider) = manager_with(
        MockProvider::new("test")
            .with_properties(EntityKind::Repository, repo_properties(true, false)),
    );
    let creator = EntityCreator::new(manager, Arc::new(MessageBus::new()));

    let err = creator
        .create_entity(
            Uuid::new_v4(),
            "test",
            EntityKind::Repository,
            Properties::new(),
            ProjectPolicy::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CreateError::ArchivedRepoForbidden));
    // The provider's registration hook was never touched.
    assert!(provider.registered().is_empty());
}

#[tokio::test]
async fn private_repo_is_rejected_when_the_project_disallows_it() {
    let (manager, provider) = manager_with(
        MockProvider::new("test")
            .with_properties(EntityKind::Repository, repo_properties(false, true)),
    );
    let creator = EntityCreator::new(manager, Arc::new(MessageBus::new()));

    let err = creator
        .create_entity(
            Uuid::new_v4(),
            "test",
            EntityKind::Repository,
            Properties::new(),
            ProjectPolicy {
                allow_private_repos: false,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CreateError::PrivateRepoForbidden));
    assert!(provider.registered().is_empty());
}

#[tokio::test]
async fn private_repo_is_allowed_when_the_project_permits_it() {
    let (manager, provider) = manager_with(
        MockProvider::new("test")
            .with_properties(EntityKind::Repository, repo_properties(false, true)),
    );
    let bus = Arc::new(MessageBus::new());
    let mut subscription = bus.subscribe(TOPIC_REPO_INIT);
    let creator = EntityCreator::new(manager, Arc::clone(&bus));

    let entity = creator
        .create_entity(
            Uuid::new_v4(),
            "test",
            EntityKind::Repository,
            Properties::new(),
            ProjectPolicy {
                allow_private_repos: true,
            },
        )
        .await
        .unwrap();
    assert_eq!(entity.kind, EntityKind::Repository);
    assert_eq!(provider.registered(), vec![EntityKind::Repository]);

    // The reconcile event carries the registered entity.
    let event = subscription.recv().await.unwrap().unwrap();
    assert_eq!(event.entity.id, entity.id);
}

#[tokio::test]
async fn unknown_provider_is_a_provider_error() {
    let creator = EntityCreator::new(Arc::new(ProviderManager::new()), Arc::new(MessageBus::new()));
    let err = creator
        .create_entity(
            Uuid::new_v4(),
            "missing",
            EntityKind::Repository,
            Properties::new(),
            ProjectPolicy::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CreateError::Provider(_)));
}
