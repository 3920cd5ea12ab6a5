// SPDX-License-Identifier: MIT OR Apache-2.0

//! Evaluation outcome records and per-entity leases.

use crate::checkpoint::Checkpoint;
use crate::status::{ActionStatus, RuleStatus};
use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The authoritative record of one (entity, profile, rule-instance)
/// evaluation.
///
/// At most one outcome is authoritative per triple; in-flight leases
/// serialize concurrent writers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EvaluationOutcome {
    /// The evaluated entity.
    pub entity_id: Uuid,
    /// The profile the rule instance belongs to.
    pub profile_id: Uuid,
    /// The rule instance that was evaluated.
    pub rule_instance_id: Uuid,

    /// Evaluation verdict.
    pub status: RuleStatus,
    /// Remediation dispatch status.
    pub remediation: ActionStatus,
    /// Alert dispatch status.
    pub alert: ActionStatus,

    /// Failure or skip detail, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// What was evaluated, recorded verbatim and never mutated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<Checkpoint>,

    /// When the outcome was recorded.
    pub timestamp: DateTime<Utc>,

    /// The lease under which this outcome was written.
    pub lease_id: Uuid,
}

/// A per-entity advisory lock serializing evaluations.
///
/// Leases expire by wall-clock TTL; an expired lease may be claimed by a
/// newer evaluation, and the newer lease wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Lease {
    /// The locked entity.
    pub entity_id: Uuid,
    /// Identifies the holder of this lease.
    pub lease_id: Uuid,
    /// Instant past which the lease no longer serializes writers.
    pub expires_at: DateTime<Utc>,
}

impl Lease {
    /// Claim a fresh lease on `entity_id` expiring `ttl` from now.
    #[must_use]
    pub fn claim(entity_id: Uuid, ttl: Duration) -> Self {
        Self {
            entity_id,
            lease_id: Uuid::new_v4(),
            expires_at: Utc::now() + ttl,
        }
    }

    /// Whether the lease has expired as of `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Extend the lease to `ttl` from now.
    pub fn refresh(&mut self, ttl: Duration) {
        self.expires_at = Utc::now() + ttl;
    }
}
