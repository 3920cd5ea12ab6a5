// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;
use cwn_actions::{
    effective_setting, Action, ActionEngine, ActionError, ActionKind,
};
use cwn_core::{
    ActionDefaults, ActionSetting, ActionStatus, Entity, EntityKind, ProfileActionConfig,
    Properties, RuleStatus,
};
use cwn_provider::mock::MockProvider;
use cwn_provider::Provider;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

fn entity() -> Entity {
    Entity {
        id: Uuid::nil(),
        upstream_id: "r".into(),
        kind: EntityKind::Repository,
        project_id: Uuid::nil(),
        provider_id: "test".into(),
        properties: Properties::new(),
        originated_from: None,
    }
}

fn provider() -> Arc<dyn Provider> {
    Arc::new(MockProvider::new("test"))
}

struct CountingAction {
    kind: ActionKind,
    calls: Arc<AtomicU64>,
    outcome: Result<ActionStatus, ActionError>,
}

impl CountingAction {
    fn succeeding(kind: ActionKind) -> (Arc<Self>, Arc<AtomicU64>) {
        let calls = Arc::new(AtomicU64::new(0));
        (
            Arc::new(Self {
                kind,
                calls: Arc::clone(&calls),
                outcome: Ok(ActionStatus::Success),
            }),
            calls,
        )
    }

    fn failing(kind: ActionKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            calls: Arc::new(AtomicU64::new(0)),
            outcome: Err(ActionError("upstream rejected the change".into())),
        })
    }
}

#[async_trait]
impl Action for CountingAction {
    fn kind(&self) -> ActionKind {
        self.kind
    }

    async fn apply(
        &self,
        _entity: &Entity,
        _verdict: RuleStatus,
        _provider: &Arc<dyn Provider>,
    ) -> Result<ActionStatus, ActionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }

    fn describe(&self, entity: &Entity, verdict: RuleStatus) -> String {
        format!("would {} {} after {verdict}", self.kind, entity.upstream_id)
    }
}

fn config(remediate: ActionSetting, alert: ActionSetting) -> ProfileActionConfig {
    ProfileActionConfig {
        remediate: Some(remediate),
        alert: Some(alert),
    }
}

#[tokio::test]
async fn on_applies_and_reports_success() {
    let (action, calls) = CountingAction::succeeding(ActionKind::Remediate);
    let engine = ActionEngine::new(
        ActionDefaults::default(),
        &config(ActionSetting::On, ActionSetting::Off),
        None,
    )
    .with_remediation(action);

    let report = engine.run(&entity(), RuleStatus::Failure, &provider()).await;
    assert_eq!(report.remediation, ActionStatus::Success);
    assert_eq!(report.remediate_err, None);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn off_skips_without_invoking_the_body() {
    let (action, calls) = CountingAction::succeeding(ActionKind::Remediate);
    let engine = ActionEngine::new(
        ActionDefaults::default(),
        &config(ActionSetting::Off, ActionSetting::Off),
        None,
    )
    .with_remediation(action);

    let report = engine.run(&entity(), RuleStatus::Failure, &provider()).await;
    assert_eq!(report.remediation, ActionStatus::Skipped);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn dry_run_records_a_would_have_message() {
    let (action, calls) = CountingAction::succeeding(ActionKind::Alert);
    let engine = ActionEngine::new(
        ActionDefaults::default(),
        &config(ActionSetting::Off, ActionSetting::DryRun),
        None,
    )
    .with_alert(action);

    let report = engine.run(&entity(), RuleStatus::Failure, &provider()).await;
    assert_eq!(report.alert, ActionStatus::Skipped);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(report.dry_run_messages.len(), 1);
    assert!(report.dry_run_messages[0].starts_with("would alert"));
}

#[tokio::test]
async fn errors_are_captured_independently() {
    let (alert, _) = CountingAction::succeeding(ActionKind::Alert);
    let engine = ActionEngine::new(
        ActionDefaults::default(),
        &config(ActionSetting::On, ActionSetting::On),
        None,
    )
    .with_remediation(CountingAction::failing(ActionKind::Remediate))
    .with_alert(alert);

    let report = engine.run(&entity(), RuleStatus::Failure, &provider()).await;
    assert_eq!(report.remediation, ActionStatus::Failure);
    assert!(report
        .remediate_err
        .as_deref()
        .unwrap()
        .contains("rejected"));
    // The alert still ran and succeeded.
    assert_eq!(report.alert, ActionStatus::Success);
    assert_eq!(report.alert_err, None);
}

#[tokio::test]
async fn missing_body_is_not_supported() {
    let engine = ActionEngine::new(
        ActionDefaults::default(),
        &config(ActionSetting::On, ActionSetting::On),
        None,
    );
    let report = engine.run(&entity(), RuleStatus::Failure, &provider()).await;
    assert_eq!(report.remediation, ActionStatus::NotSupported);
    assert_eq!(report.alert, ActionStatus::NotSupported);
}

#[tokio::test]
async fn non_definitive_verdicts_skip_both_actions() {
    let (action, calls) = CountingAction::succeeding(ActionKind::Remediate);
    let engine = ActionEngine::new(
        ActionDefaults::default(),
        &config(ActionSetting::On, ActionSetting::On),
        None,
    )
    .with_remediation(action);

    for verdict in [RuleStatus::Skipped, RuleStatus::Error, RuleStatus::Pending] {
        let report = engine.run(&entity(), verdict, &provider()).await;
        assert_eq!(report.remediation, ActionStatus::Skipped);
        assert_eq!(report.alert, ActionStatus::Skipped);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn setting_resolution_prefers_rule_then_profile_then_default() {
    let defaults = ActionDefaults {
        remediate: ActionSetting::Off,
        alert: ActionSetting::On,
    };
    let profile = config(ActionSetting::DryRun, ActionSetting::DryRun);
    let rule = config(ActionSetting::On, ActionSetting::Off);

    // Rule override wins.
    assert_eq!(
        effective_setting(defaults, &profile, Some(&rule), ActionKind::Remediate),
        ActionSetting::On
    );
    // Profile wins when the rule is silent.
    assert_eq!(
        effective_setting(defaults, &profile, None, ActionKind::Alert),
        ActionSetting::DryRun
    );
    // Rule-type defaults apply last.
    assert_eq!(
        effective_setting(
            defaults,
            &ProfileActionConfig::default(),
            None,
            ActionKind::Alert
        ),
        ActionSetting::On
    );
}

struct SleepyAction;

#[async_trait]
impl Action for SleepyAction {
    fn kind(&self) -> ActionKind {
        ActionKind::Remediate
    }

    async fn apply(
        &self,
        _entity: &Entity,
        _verdict: RuleStatus,
        _provider: &Arc<dyn Provider>,
    ) -> Result<ActionStatus, ActionError> {
        tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        Ok(ActionStatus::Success)
    }

    fn describe(&self, _entity: &Entity, _verdict: RuleStatus) -> String {
        "would eventually do something".into()
    }
}

#[tokio::test]
async fn slow_actions_are_bounded_by_the_timeout() {
    let engine = ActionEngine::new(
        ActionDefaults::default(),
        &config(ActionSetting::On, ActionSetting::Off),
        None,
    )
    .with_remediation(Arc::new(SleepyAction))
    .with_timeout(std::time::Duration::from_millis(20));

    let report = engine.run(&entity(), RuleStatus::Failure, &provider()).await;
    assert_eq!(report.remediation, ActionStatus::Failure);
    assert!(report.remediate_err.unwrap().contains("timed out"));
}

struct PanickyAction;

#[async_trait]
impl Action for PanickyAction {
    fn kind(&self) -> ActionKind {
        ActionKind::Alert
    }

    async fn apply(
        &self,
        _entity: &Entity,
        _verdict: RuleStatus,
        _provider: &Arc<dyn Provider>,
    ) -> Result<ActionStatus, ActionError> {
        panic!("alert body exploded")
    }

    fn describe(&self, _entity: &Entity, _verdict: RuleStatus) -> String {
        "would panic".into()
    }
}

#[tokio::test]
async fn panicking_actions_are_contained() {
    let engine = ActionEngine::new(
        ActionDefaults::default(),
        &config(ActionSetting::Off, ActionSetting::On),
        None,
    )
    .with_alert(Arc::new(PanickyAction));

    let report = engine.run(&entity(), RuleStatus::Failure, &provider()).await;
    assert_eq!(report.alert, ActionStatus::Failure);
    assert!(report.alert_err.unwrap().contains("panicked"));
}
