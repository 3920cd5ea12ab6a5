// SPDX-License-Identifier: MIT OR Apache-2.0

//! Aggregation over recorded evaluation outcomes.
//!
//! History consumers roll a batch of outcomes into one
//! [`OutcomeSummary`]: per-status counts, the worst severity observed,
//! and a single compliance verdict for dashboards and gating.

use crate::outcome::EvaluationOutcome;
use crate::status::RuleStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Rolled-up view of a batch of evaluation outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeSummary {
    /// Number of outcomes aggregated.
    pub total: u64,
    /// Per-status outcome counts (deterministic ordering).
    pub status_counts: BTreeMap<String, u64>,
    /// Outcomes with failure or error status.
    pub failing: u64,
    /// Whether every definitive outcome succeeded.
    pub compliant: bool,
}

impl OutcomeSummary {
    /// Aggregate a batch of outcomes.
    ///
    /// An empty batch is vacuously compliant.
    #[must_use]
    pub fn from_outcomes(outcomes: &[EvaluationOutcome]) -> Self {
        let mut status_counts: BTreeMap<String, u64> = BTreeMap::new();
        let mut failing = 0;
        for outcome in outcomes {
            *status_counts
                .entry(outcome.status.as_str().to_owned())
                .or_insert(0) += 1;
            if matches!(outcome.status, RuleStatus::Failure | RuleStatus::Error) {
                failing += 1;
            }
        }
        Self {
            total: outcomes.len() as u64,
            status_counts,
            failing,
            compliant: failing == 0,
        }
    }

    /// Count of outcomes recorded with `status`.
    #[must_use]
    pub fn count(&self, status: RuleStatus) -> u64 {
        self.status_counts.get(status.as_str()).copied().unwrap_or(0)
    }
}
