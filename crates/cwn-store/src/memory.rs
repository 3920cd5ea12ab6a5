// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory store implementations.
//!
//! State lives behind plain mutexes; critical sections are short and
//! never held across an await point.

use crate::{OutcomeStore, ProfileStore, RuleTypeStore, StoreError};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use cwn_core::{EntityKind, EvaluationOutcome, Lease, Profile, RuleType};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Rule types
// ---------------------------------------------------------------------------

/// In-memory [`RuleTypeStore`] with an explicit parent map.
#[derive(Debug, Default)]
pub struct InMemoryRuleTypeStore {
    parents: HashMap<Uuid, Uuid>,
    rule_types: Mutex<Vec<RuleType>>,
}

impl InMemoryRuleTypeStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `child`'s parent project.
    pub fn set_parent(&mut self, child: Uuid, parent: Uuid) {
        self.parents.insert(child, parent);
    }

    /// Add a rule type.
    pub fn add(&self, rule_type: RuleType) {
        self.rule_types.lock().expect("rule types lock").push(rule_type);
    }
}

#[async_trait]
impl RuleTypeStore for InMemoryRuleTypeStore {
    async fn parent_projects(&self, project_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let mut chain = vec![project_id];
        let mut cursor = project_id;
        while let Some(parent) = self.parents.get(&cursor) {
            if chain.contains(parent) {
                return Err(StoreError::Internal(format!(
                    "project hierarchy cycle at {parent}"
                )));
            }
            chain.push(*parent);
            cursor = *parent;
        }
        Ok(chain)
    }

    async fn rule_types_in_hierarchy(
        &self,
        kind: EntityKind,
        projects: &[Uuid],
    ) -> Result<Vec<RuleType>, StoreError> {
        let rule_types = self.rule_types.lock().expect("rule types lock");
        Ok(rule_types
            .iter()
            .filter(|rt| rt.entity_kind == kind && projects.contains(&rt.project_id))
            .cloned()
            .collect())
    }

    async fn rule_type_by_id(&self, id: Uuid) -> Result<Option<RuleType>, StoreError> {
        let rule_types = self.rule_types.lock().expect("rule types lock");
        Ok(rule_types.iter().find(|rt| rt.id == id).cloned())
    }
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

/// In-memory [`ProfileStore`] keeping profiles in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    profiles: Mutex<Vec<Profile>>,
}

impl InMemoryProfileStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a validated profile.
    pub fn add(&self, profile: Profile) {
        self.profiles.lock().expect("profiles lock").push(profile);
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn profiles_for_evaluation(
        &self,
        project_id: Uuid,
        kind: EntityKind,
    ) -> Result<Vec<Profile>, StoreError> {
        let profiles = self.profiles.lock().expect("profiles lock");
        Ok(profiles
            .iter()
            .filter(|p| p.project_id == project_id && p.applies_to(kind))
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Outcomes + leases
// ---------------------------------------------------------------------------

/// In-memory [`OutcomeStore`] with TTL-expiring advisory leases.
#[derive(Debug, Default)]
pub struct InMemoryOutcomeStore {
    leases: Mutex<HashMap<Uuid, Lease>>,
    outcomes: Mutex<HashMap<(Uuid, Uuid, Uuid), EvaluationOutcome>>,
    upsert_log: Mutex<Vec<EvaluationOutcome>>,
}

impl InMemoryOutcomeStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The authoritative outcome for a triple, if recorded.
    #[must_use]
    pub fn outcome(
        &self,
        entity_id: Uuid,
        profile_id: Uuid,
        rule_instance_id: Uuid,
    ) -> Option<EvaluationOutcome> {
        self.outcomes
            .lock()
            .expect("outcomes lock")
            .get(&(entity_id, profile_id, rule_instance_id))
            .cloned()
    }

    /// Every recorded outcome, in unspecified order.
    #[must_use]
    pub fn all_outcomes(&self) -> Vec<EvaluationOutcome> {
        self.outcomes
            .lock()
            .expect("outcomes lock")
            .values()
            .cloned()
            .collect()
    }

    /// Every upsert in write order — the evaluation history as it was
    /// recorded.
    #[must_use]
    pub fn history(&self) -> Vec<EvaluationOutcome> {
        self.upsert_log.lock().expect("history lock").clone()
    }
}

#[async_trait]
impl OutcomeStore for InMemoryOutcomeStore {
    async fn try_acquire_lease(&self, entity_id: Uuid, ttl: Duration) -> Result<Lease, StoreError> {
        let mut leases = self.leases.lock().expect("leases lock");
        let now = Utc::now();
        if let Some(existing) = leases.get(&entity_id) {
            if !existing.is_expired(now) {
                return Err(StoreError::LeaseHeld { entity_id });
            }
        }
        let lease = Lease::claim(entity_id, ttl);
        leases.insert(entity_id, lease.clone());
        Ok(lease)
    }

    async fn update_lease(
        &self,
        entity_id: Uuid,
        lease_id: Uuid,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut leases = self.leases.lock().expect("leases lock");
        match leases.get_mut(&entity_id) {
            Some(lease) if lease.lease_id == lease_id => {
                lease.refresh(ttl);
                Ok(())
            }
            _ => Err(StoreError::LeaseLost {
                entity_id,
                lease_id,
            }),
        }
    }

    async fn release_lock(&self, entity_id: Uuid, lease_id: Uuid) -> Result<(), StoreError> {
        let mut leases = self.leases.lock().expect("leases lock");
        if let Some(lease) = leases.get(&entity_id) {
            if lease.lease_id == lease_id {
                leases.remove(&entity_id);
            }
        }
        // Releasing an absent or superseded lease is a no-op.
        Ok(())
    }

    async fn upsert_status(&self, outcome: EvaluationOutcome) -> Result<(), StoreError> {
        let key = (
            outcome.entity_id,
            outcome.profile_id,
            outcome.rule_instance_id,
        );
        self.upsert_log
            .lock()
            .expect("history lock")
            .push(outcome.clone());
        self.outcomes
            .lock()
            .expect("outcomes lock")
            .insert(key, outcome);
        Ok(())
    }
}
