// SPDX-License-Identifier: MIT OR Apache-2.0

//! The entity creator.
//!
//! Guards registration (archived repositories are never tracked,
//! private ones only where the project allows them), registers the
//! entity with the provider, and publishes the reconcile event. If a
//! later step fails, the registration is undone on a detached budget so
//! the caller's cancellation cannot leak a webhook.

use crate::bus::{MessageBus, TOPIC_REPO_INIT};
use cwn_core::{
    Entity, EntityEvent, EntityKind, Properties, PROP_IS_ARCHIVED, PROP_IS_PRIVATE,
};
use cwn_provider::{FetchOptions, Provider, ProviderError, ProviderManager};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Budget for detached cleanup after a partial failure.
const CLEANUP_BUDGET: Duration = Duration::from_secs(30);

/// Per-project policy knobs the creator enforces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectPolicy {
    /// Whether private repositories may be tracked in this project.
    pub allow_private_repos: bool,
}

/// Why an entity was not created.
#[derive(Debug, thiserror::Error)]
pub enum CreateError {
    /// Archived repositories are never tracked.
    #[error("archived repositories cannot be registered")]
    ArchivedRepoForbidden,

    /// The project does not allow tracking private repositories.
    #[error("private repositories are not allowed in this project")]
    PrivateRepoForbidden,

    /// The provider refused or failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The reconcile event could not be published.
    #[error("failed to publish reconcile event: {0}")]
    Publish(String),
}

/// Registers new entities and kicks off their first reconciliation.
pub struct EntityCreator {
    providers: Arc<ProviderManager>,
    bus: Arc<MessageBus>,
}

impl EntityCreator {
    /// Create an entity creator.
    #[must_use]
    pub fn new(providers: Arc<ProviderManager>, bus: Arc<MessageBus>) -> Self {
        Self { providers, bus }
    }

    /// Track a new entity: fetch properties, enforce project policy,
    /// register upstream, publish the reconcile event.
    ///
    /// # Errors
    ///
    /// Policy violations are typed ([`CreateError::ArchivedRepoForbidden`],
    /// [`CreateError::PrivateRepoForbidden`]) and checked **before** the
    /// provider registration is attempted.
    pub async fn create_entity(
        &self,
        project_id: Uuid,
        provider_id: &str,
        kind: EntityKind,
        identifying: Properties,
        policy: ProjectPolicy,
    ) -> Result<Entity, CreateError> {
        let provider = self.providers.instantiate(provider_id)?;
        if !provider.supports_entity(kind) {
            return Err(CreateError::Provider(ProviderError::UnsupportedEntity {
                kind,
            }));
        }

        let properties = provider
            .fetch_all_properties(&identifying, kind, FetchOptions::default())
            .await?;

        if properties.bool_of(PROP_IS_ARCHIVED) == Some(true) {
            return Err(CreateError::ArchivedRepoForbidden);
        }
        if !policy.allow_private_repos && properties.bool_of(PROP_IS_PRIVATE) == Some(true) {
            return Err(CreateError::PrivateRepoForbidden);
        }

        let registered = provider.register_entity(kind, &properties).await?;
        let entity = Entity {
            id: Uuid::new_v4(),
            upstream_id: registered
                .str_of(cwn_core::PROP_UPSTREAM_ID)
                .unwrap_or_default()
                .to_owned(),
            kind,
            project_id,
            provider_id: provider_id.to_owned(),
            properties: registered,
            originated_from: None,
        };

        if let Err(e) = self.bus.publish(TOPIC_REPO_INIT, &EntityEvent::new(entity.clone())) {
            // Undo the registration on a detached budget: the caller may
            // already be cancelled, the webhook must not leak.
            warn!(
                target: "cwn.creator",
                error = %e,
                "publish failed; deregistering entity"
            );
            spawn_cleanup(provider, kind, entity.properties.clone());
            return Err(CreateError::Publish(e.to_string()));
        }

        info!(
            target: "cwn.creator",
            kind = %kind,
            name = entity.display_name(),
            "entity registered"
        );
        Ok(entity)
    }
}

/// Deregister on a detached 30-second budget.
fn spawn_cleanup(provider: Arc<dyn Provider>, kind: EntityKind, properties: Properties) {
    tokio::spawn(async move {
        let cleanup = provider.deregister_entity(kind, &properties);
        match tokio::time::timeout(CLEANUP_BUDGET, cleanup).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(target: "cwn.creator", error = %e, "deregistration cleanup failed");
            }
            Err(_) => {
                warn!(target: "cwn.creator", "deregistration cleanup timed out");
            }
        }
    });
}
