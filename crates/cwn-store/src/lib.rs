// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! cwn-store
#![deny(unsafe_code)]
#![warn(missing_docs)]

/// In-memory store implementations.
pub mod memory;

use async_trait::async_trait;
use chrono::Duration;
use cwn_core::{EntityKind, EvaluationOutcome, Lease, Profile, RuleType};
use uuid::Uuid;

/// Errors surfaced by store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The per-entity lease is held by another evaluation.
    #[error("lease on entity {entity_id} is held by another evaluation")]
    LeaseHeld {
        /// The contended entity.
        entity_id: Uuid,
    },

    /// The lease being refreshed or released is not the current holder.
    #[error("lease {lease_id} is not the current holder for entity {entity_id}")]
    LeaseLost {
        /// The entity.
        entity_id: Uuid,
        /// The superseded lease.
        lease_id: Uuid,
    },

    /// The requested record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other storage failure.
    #[error("store error: {0}")]
    Internal(String),
}

/// Read access to rule types across the project hierarchy.
#[async_trait]
pub trait RuleTypeStore: Send + Sync {
    /// The project itself followed by its ancestors, nearest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any storage failure.
    async fn parent_projects(&self, project_id: Uuid) -> Result<Vec<Uuid>, StoreError>;

    /// Every rule type used by at least one rule instance in the given
    /// projects, for the given entity variant.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any storage failure.
    async fn rule_types_in_hierarchy(
        &self,
        kind: EntityKind,
        projects: &[Uuid],
    ) -> Result<Vec<RuleType>, StoreError>;

    /// Look up a rule type by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any storage failure; an unknown id is
    /// `Ok(None)`.
    async fn rule_type_by_id(&self, id: Uuid) -> Result<Option<RuleType>, StoreError>;
}

/// Read access to profiles ready for evaluation.
///
/// Implementations only return profiles that passed create/update-time
/// validation — invalid profiles never reach the executor.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Profiles of `project_id` with at least one rule for `kind`, in
    /// hierarchy order (parent before child), declared order within one
    /// project.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any storage failure.
    async fn profiles_for_evaluation(
        &self,
        project_id: Uuid,
        kind: EntityKind,
    ) -> Result<Vec<Profile>, StoreError>;
}

/// Write access to evaluation outcomes and the per-entity lease.
#[async_trait]
pub trait OutcomeStore: Send + Sync {
    /// Claim the per-entity lease, or fail if a live lease exists.
    ///
    /// An expired lease may be claimed over — the newer lease wins.
    ///
    /// # Errors
    ///
    /// [`StoreError::LeaseHeld`] when a live lease exists.
    async fn try_acquire_lease(&self, entity_id: Uuid, ttl: Duration) -> Result<Lease, StoreError>;

    /// Extend the TTL of a held lease.
    ///
    /// # Errors
    ///
    /// [`StoreError::LeaseLost`] when `lease_id` is no longer the
    /// current holder.
    async fn update_lease(
        &self,
        entity_id: Uuid,
        lease_id: Uuid,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    /// Release the lease. Idempotent: releasing a lease that is already
    /// gone succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any storage failure.
    async fn release_lock(&self, entity_id: Uuid, lease_id: Uuid) -> Result<(), StoreError>;

    /// Insert or update the authoritative outcome for the outcome's
    /// (entity, profile, rule-instance) triple.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any storage failure.
    async fn upsert_status(&self, outcome: EvaluationOutcome) -> Result<(), StoreError>;
}
