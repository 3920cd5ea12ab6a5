// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! cwn-actions
#![deny(unsafe_code)]
#![warn(missing_docs)]

use async_trait::async_trait;
use cwn_core::{
    ActionDefaults, ActionSetting, ActionStatus, Entity, ProfileActionConfig, RuleStatus,
};
use cwn_provider::Provider;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default bound on one action body's execution time.
const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(60);

/// Which of the two action slots an [`Action`] fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Fixes the non-compliant state (pull request, settings mutation).
    Remediate,
    /// Notifies about the state (security advisory, comment).
    Alert,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Remediate => f.write_str("remediate"),
            Self::Alert => f.write_str("alert"),
        }
    }
}

/// Error returned by an action body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ActionError(pub String);

/// An action body, defined outside the core.
///
/// Dispatch contract: return a typed status plus an optional error
/// (modeled as the `Err` arm), never panic, finish in bounded time. The
/// engine enforces the bound and contains panics regardless.
#[async_trait]
pub trait Action: Send + Sync {
    /// Which slot this body fills.
    fn kind(&self) -> ActionKind;

    /// Apply the action for the given verdict.
    ///
    /// Bodies receive both success and failure verdicts — an alert may
    /// open on failure and resolve on success.
    ///
    /// # Errors
    ///
    /// [`ActionError`] when the action ran and failed.
    async fn apply(
        &self,
        entity: &Entity,
        verdict: RuleStatus,
        provider: &Arc<dyn Provider>,
    ) -> Result<ActionStatus, ActionError>;

    /// The would-have message recorded by a dry run.
    fn describe(&self, entity: &Entity, verdict: RuleStatus) -> String;
}

/// Resolve the effective setting for one slot: rule-instance override,
/// then profile, then the rule type's default.
#[must_use]
pub fn effective_setting(
    defaults: ActionDefaults,
    profile: &ProfileActionConfig,
    rule_override: Option<&ProfileActionConfig>,
    kind: ActionKind,
) -> ActionSetting {
    let pick = |config: &ProfileActionConfig| match kind {
        ActionKind::Remediate => config.remediate,
        ActionKind::Alert => config.alert,
    };
    rule_override
        .and_then(pick)
        .or_else(|| pick(profile))
        .unwrap_or(match kind {
            ActionKind::Remediate => defaults.remediate,
            ActionKind::Alert => defaults.alert,
        })
}

/// What the engine reports back to the executor: both statuses plus
/// their independent errors and any dry-run messages.
#[derive(Debug, Clone)]
pub struct ActionReport {
    /// Remediation dispatch status.
    pub remediation: ActionStatus,
    /// Alert dispatch status.
    pub alert: ActionStatus,
    /// Remediation failure detail, when it failed.
    pub remediate_err: Option<String>,
    /// Alert failure detail, when it failed.
    pub alert_err: Option<String>,
    /// Would-have messages recorded by dry runs.
    pub dry_run_messages: Vec<String>,
}

impl Default for ActionReport {
    fn default() -> Self {
        Self {
            remediation: ActionStatus::Pending,
            alert: ActionStatus::Pending,
            remediate_err: None,
            alert_err: None,
            dry_run_messages: Vec::new(),
        }
    }
}

/// The effective on/off/dry-run pair for one rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionStatusPair {
    /// Effective remediation setting.
    pub remediate: ActionSetting,
    /// Effective alert setting.
    pub alert: ActionSetting,
}

/// Dispatches remediation and alert for one rule's verdicts.
pub struct ActionEngine {
    settings: ActionStatusPair,
    remediation: Option<Arc<dyn Action>>,
    alert: Option<Arc<dyn Action>>,
    timeout: Duration,
}

impl ActionEngine {
    /// Build the engine for one rule instance.
    #[must_use]
    pub fn new(
        defaults: ActionDefaults,
        profile: &ProfileActionConfig,
        rule_override: Option<&ProfileActionConfig>,
    ) -> Self {
        Self {
            settings: ActionStatusPair {
                remediate: effective_setting(
                    defaults,
                    profile,
                    rule_override,
                    ActionKind::Remediate,
                ),
                alert: effective_setting(defaults, profile, rule_override, ActionKind::Alert),
            },
            remediation: None,
            alert: None,
            timeout: DEFAULT_ACTION_TIMEOUT,
        }
    }

    /// Attach the remediation body.
    #[must_use]
    pub fn with_remediation(mut self, action: Arc<dyn Action>) -> Self {
        self.remediation = Some(action);
        self
    }

    /// Attach the alert body.
    #[must_use]
    pub fn with_alert(mut self, action: Arc<dyn Action>) -> Self {
        self.alert = Some(action);
        self
    }

    /// Override the per-action execution bound.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The effective settings, recorded into the evaluation params.
    #[must_use]
    pub fn settings(&self) -> ActionStatusPair {
        self.settings
    }

    /// Run both actions for `verdict`; errors are captured
    /// independently, never propagated.
    pub async fn run(
        &self,
        entity: &Entity,
        verdict: RuleStatus,
        provider: &Arc<dyn Provider>,
    ) -> ActionReport {
        let mut report = ActionReport::default();

        if !verdict.drives_actions() {
            report.remediation = ActionStatus::Skipped;
            report.alert = ActionStatus::Skipped;
            return report;
        }

        let (remediation, remediate_err, mut messages) = self
            .dispatch(
                self.settings.remediate,
                self.remediation.as_ref(),
                entity,
                verdict,
                provider,
            )
            .await;
        report.remediation = remediation;
        report.remediate_err = remediate_err;
        report.dry_run_messages.append(&mut messages);

        let (alert, alert_err, mut messages) = self
            .dispatch(
                self.settings.alert,
                self.alert.as_ref(),
                entity,
                verdict,
                provider,
            )
            .await;
        report.alert = alert;
        report.alert_err = alert_err;
        report.dry_run_messages.append(&mut messages);

        report
    }

    async fn dispatch(
        &self,
        setting: ActionSetting,
        body: Option<&Arc<dyn Action>>,
        entity: &Entity,
        verdict: RuleStatus,
        provider: &Arc<dyn Provider>,
    ) -> (ActionStatus, Option<String>, Vec<String>) {
        // Off wins over everything, including an absent body.
        if setting == ActionSetting::Off {
            return (ActionStatus::Skipped, None, Vec::new());
        }
        let Some(action) = body else {
            return (ActionStatus::NotSupported, None, Vec::new());
        };

        match setting {
            ActionSetting::Off => unreachable!("handled above"),
            ActionSetting::DryRun => {
                let message = action.describe(entity, verdict);
                debug!(
                    target: "cwn.actions",
                    kind = %action.kind(),
                    %message,
                    "dry run"
                );
                (ActionStatus::Skipped, None, vec![message])
            }
            ActionSetting::On => {
                let applied = tokio::time::timeout(
                    self.timeout,
                    AssertUnwindSafe(action.apply(entity, verdict, provider)).catch_unwind(),
                )
                .await;
                match applied {
                    Ok(Ok(Ok(status))) => (status, None, Vec::new()),
                    Ok(Ok(Err(e))) => (ActionStatus::Failure, Some(e.0), Vec::new()),
                    Ok(Err(_panic)) => {
                        warn!(target: "cwn.actions", kind = %action.kind(), "action panicked");
                        (
                            ActionStatus::Failure,
                            Some("action panicked".to_owned()),
                            Vec::new(),
                        )
                    }
                    Err(_elapsed) => (
                        ActionStatus::Failure,
                        Some("action timed out".to_owned()),
                        Vec::new(),
                    ),
                }
            }
        }
    }
}
