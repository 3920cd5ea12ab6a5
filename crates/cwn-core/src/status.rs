// SPDX-License-Identifier: MIT OR Apache-2.0

//! Evaluation status taxonomy.
//!
//! Every rule evaluation collapses into one [`RuleStatus`]; the typed
//! [`EvalError`] carries the failure detail and maps onto that taxonomy.
//! The action engine and the history store consume nothing richer.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RuleStatus
// ---------------------------------------------------------------------------

/// The authoritative per-rule evaluation status.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    /// The rule condition was met.
    Success,
    /// The rule condition was not met.
    Failure,
    /// The ingester or evaluator failed unexpectedly.
    Error,
    /// A prerequisite was absent (e.g. the checked feature is off).
    Skipped,
    /// The rule is inapplicable to this entity; recorded only if policy
    /// requires.
    SkippedSilently,
    /// The evaluation has not run yet.
    Pending,
}

impl RuleStatus {
    /// Stable lowercase tag used in logs and persisted records.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Error => "error",
            Self::Skipped => "skipped",
            Self::SkippedSilently => "skipped_silently",
            Self::Pending => "pending",
        }
    }

    /// Whether actions (remediation, alerting) run for this status.
    ///
    /// Only definitive verdicts drive actions; skips and errors do not.
    #[must_use]
    pub fn drives_actions(&self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }
}

impl std::fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ActionStatus
// ---------------------------------------------------------------------------

/// Status of one dispatched action (remediation or alert).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// The action ran and succeeded.
    Success,
    /// The action ran and failed.
    Failure,
    /// The action was turned off or not triggered by the verdict.
    Skipped,
    /// The rule type defines no such action.
    NotSupported,
    /// The action has not been attempted yet.
    Pending,
}

impl ActionStatus {
    /// Stable lowercase tag used in logs and persisted records.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Skipped => "skipped",
            Self::NotSupported => "not_supported",
            Self::Pending => "pending",
        }
    }
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EvalError
// ---------------------------------------------------------------------------

/// Typed evaluation failure.
///
/// Ingester and evaluator errors become the rule's verdict; they stop the
/// rule but never the profile or the entity evaluation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    /// The rule condition was evaluated and not met.
    #[error("evaluation failed: {0}")]
    Failed(String),

    /// A prerequisite was absent; the rule was skipped.
    #[error("evaluation skipped: {0}")]
    Skipped(String),

    /// The rule is inapplicable to this entity.
    #[error("evaluation skipped silently: {0}")]
    SkippedSilently(String),

    /// The ingester or evaluator failed unexpectedly.
    #[error("evaluation error: {0}")]
    Evaluation(String),

    /// A panic or unmatched invariant inside the rule pipeline.
    #[error("internal error: {0}")]
    Internal(String),

    /// The enclosing context was cancelled mid-rule.
    #[error("evaluation error: cancelled")]
    Cancelled,
}

impl EvalError {
    /// The [`RuleStatus`] this error collapses into.
    #[must_use]
    pub fn status(&self) -> RuleStatus {
        match self {
            Self::Failed(_) => RuleStatus::Failure,
            Self::Skipped(_) => RuleStatus::Skipped,
            Self::SkippedSilently(_) => RuleStatus::SkippedSilently,
            Self::Evaluation(_) | Self::Cancelled => RuleStatus::Error,
            Self::Internal(_) => RuleStatus::Error,
        }
    }

    /// Convenience constructor for [`EvalError::Failed`].
    #[must_use]
    pub fn failed(detail: impl Into<String>) -> Self {
        Self::Failed(detail.into())
    }

    /// Convenience constructor for [`EvalError::Skipped`].
    #[must_use]
    pub fn skipped(detail: impl Into<String>) -> Self {
        Self::Skipped(detail.into())
    }
}
