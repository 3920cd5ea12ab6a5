// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! cwn-executor
#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Topic-keyed message bus.
pub mod bus;
/// Entity registration guards and reconcile kick-off.
pub mod creator;

pub use bus::{EventFilter, MessageBus, Subscription, TOPIC_ENTITY_EVENT, TOPIC_REPO_INIT};
pub use creator::{CreateError, EntityCreator, ProjectPolicy};
pub use tokio_util::sync::CancellationToken;

use chrono::Utc;
use cwn_actions::{Action, ActionEngine, ActionReport};
use cwn_cache::{IngestCache, KeyedCache, NoopCache};
use cwn_config::EngineConfig;
use cwn_core::{
    EntityEvent, EntityKind, EvalError, EvaluationOutcome, Lease, Profile, RuleInstance,
    RuleStatus,
};
use cwn_engine::{EngineError, RuleEngineCache, RuleEvalReport};
use cwn_ingest::{BuiltinRegistry, IngesterLimits, IngestResult};
use cwn_provider::{Provider, ProviderError, ProviderManager};
use cwn_select::{Selection, SelectorSet};
use cwn_store::{OutcomeStore, ProfileStore, RuleTypeStore, StoreError};
use cwn_telemetry::{EvaluationMetrics, MetricsCollector};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Unrecoverable executor failures.
///
/// Per-rule failures are recorded as outcomes, never raised here.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// The provider could not be instantiated.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The per-entity lease could not be claimed.
    #[error("cannot claim entity lease: {0}")]
    Lease(StoreError),

    /// A store read failed.
    #[error("store error: {0}")]
    Store(StoreError),

    /// The rule-engine cache could not be built.
    #[error("cannot build rule-engine cache: {0}")]
    CacheBuild(#[from] EngineError),

    /// An outcome could not be persisted; the entity evaluation was
    /// aborted (the lease is still released).
    #[error("cannot persist evaluation outcome: {0}")]
    Persist(StoreError),

    /// The lease was claimed over by a newer evaluation mid-run.
    #[error("evaluation superseded by a newer lease")]
    Superseded,

    /// The whole-entity evaluation exceeded the executor timeout.
    #[error("entity evaluation timed out")]
    Timeout,
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Drives one entity event through the evaluation pipeline.
pub struct Executor {
    providers: Arc<ProviderManager>,
    rule_types: Arc<dyn RuleTypeStore>,
    profiles: Arc<dyn ProfileStore>,
    outcomes: Arc<dyn OutcomeStore>,
    registry: Arc<BuiltinRegistry>,
    remediations: HashMap<String, Arc<dyn Action>>,
    alerts: HashMap<String, Arc<dyn Action>>,
    metrics: MetricsCollector,
    config: EngineConfig,
}

impl Executor {
    /// Wire an executor to its collaborators.
    #[must_use]
    pub fn new(
        providers: Arc<ProviderManager>,
        rule_types: Arc<dyn RuleTypeStore>,
        profiles: Arc<dyn ProfileStore>,
        outcomes: Arc<dyn OutcomeStore>,
        registry: Arc<BuiltinRegistry>,
        config: EngineConfig,
    ) -> Self {
        Self {
            providers,
            rule_types,
            profiles,
            outcomes,
            registry,
            remediations: HashMap::new(),
            alerts: HashMap::new(),
            metrics: MetricsCollector::new(),
            config,
        }
    }

    /// Register the remediation body for a rule-type name.
    pub fn register_remediation(&mut self, rule_type: impl Into<String>, action: Arc<dyn Action>) {
        self.remediations.insert(rule_type.into(), action);
    }

    /// Register the alert body for a rule-type name.
    pub fn register_alert(&mut self, rule_type: impl Into<String>, action: Arc<dyn Action>) {
        self.alerts.insert(rule_type.into(), action);
    }

    /// The metrics collected across evaluations.
    #[must_use]
    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    fn limits(&self) -> IngesterLimits {
        IngesterLimits {
            rest_max_body_bytes: usize::try_from(self.config.ingest.rest_max_body_bytes)
                .unwrap_or(usize::MAX),
            clone_max_files: self.config.ingest.clone_max_files,
            clone_max_bytes: self.config.ingest.clone_max_bytes,
            artifact_retention_days: self.config.artifact.retention_days,
            timeout_secs: self.config.ingest.timeout_secs,
        }
    }

    fn lease_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.config.executor.lease_ttl_secs).unwrap_or(120))
    }

    /// Consume entity events from the bus until cancelled, one task per
    /// event.
    pub async fn serve(self: Arc<Self>, bus: Arc<MessageBus>, cancel: CancellationToken) {
        let mut subscription = bus.subscribe(TOPIC_ENTITY_EVENT);
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                message = subscription.recv() => match message {
                    None => break,
                    Some(Err(e)) => {
                        warn!(target: "cwn.executor", error = %e, "dropping undecodable event");
                    }
                    Some(Ok(event)) => {
                        let executor = Arc::clone(&self);
                        let cancel = cancel.clone();
                        tokio::spawn(async move {
                            if let Err(e) = executor.handle_event(event, &cancel).await {
                                warn!(target: "cwn.executor", error = %e, "entity evaluation failed");
                            }
                        });
                    }
                },
            }
        }
    }

    /// Evaluate one entity event end to end.
    ///
    /// # Errors
    ///
    /// Only unrecoverable conditions ([`ExecutorError`]); per-rule
    /// failures are recorded as outcomes.
    pub async fn handle_event(
        &self,
        event: EntityEvent,
        cancel: &CancellationToken,
    ) -> Result<(), ExecutorError> {
        let started = Instant::now();
        let entity = &event.entity;
        info!(
            target: "cwn.executor",
            entity_kind = %entity.kind,
            execution_id = %event.execution_id,
            provider_id = %event.provider_id,
            project_id = %event.project_id,
            "entity event received"
        );

        let provider = self.providers.instantiate(&event.provider_id)?;

        // Successive artifact versions can look identical upstream while
        // meaning different things, so artifacts never share fetches.
        let cache: Box<dyn IngestCache<IngestResult>> = if entity.kind == EntityKind::Artifact {
            Box::new(NoopCache::new())
        } else {
            Box::new(KeyedCache::new())
        };

        let lease = self
            .outcomes
            .try_acquire_lease(entity.id, self.lease_ttl())
            .await
            .map_err(ExecutorError::Lease)?;

        let mut metrics = EvaluationMetrics {
            entity_kind: entity.kind.as_str().to_owned(),
            provider_id: event.provider_id.clone(),
            ..EvaluationMetrics::default()
        };

        // The executor timeout bounds every ingester-level timeout from
        // above.
        let budget = std::time::Duration::from_secs(self.config.executor.timeout_secs);
        let outcome = match tokio::time::timeout(
            budget,
            self.evaluate_entity(&event, &provider, cache.as_ref(), &lease, cancel, &mut metrics),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_elapsed) => Err(ExecutorError::Timeout),
        };

        // The lease is released on every path, including failures.
        if let Err(e) = self
            .outcomes
            .release_lock(entity.id, lease.lease_id)
            .await
        {
            warn!(target: "cwn.executor", error = %e, "lease release failed");
        }

        metrics.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.metrics.record(metrics);
        outcome
    }

    async fn evaluate_entity(
        &self,
        event: &EntityEvent,
        provider: &Arc<dyn Provider>,
        cache: &dyn IngestCache<IngestResult>,
        lease: &Lease,
        cancel: &CancellationToken,
        metrics: &mut EvaluationMetrics,
    ) -> Result<(), ExecutorError> {
        let entity = &event.entity;

        let hierarchy = self
            .rule_types
            .parent_projects(entity.project_id)
            .await
            .map_err(ExecutorError::Store)?;

        let engines = RuleEngineCache::new(
            Arc::clone(&self.rule_types),
            Arc::clone(provider),
            Arc::clone(&self.registry),
            self.limits(),
        );
        engines.populate(entity.kind, &hierarchy).await?;

        // Hierarchy order: parent before child.
        for project in hierarchy.iter().rev() {
            let profiles = self
                .profiles
                .profiles_for_evaluation(*project, entity.kind)
                .await
                .map_err(ExecutorError::Store)?;

            for profile in &profiles {
                metrics.profiles_seen += 1;
                let selection = self.profile_selection(profile, entity);
                if !selection.selected {
                    metrics.profiles_skipped += 1;
                }

                for rule in profile.rules_for(entity.kind) {
                    if cancel.is_cancelled() {
                        debug!(target: "cwn.executor", "cancelled; skipping remaining rules");
                        return Ok(());
                    }
                    let finished = self
                        .evaluate_rule(
                            event, provider, cache, lease, cancel, metrics, &engines, profile,
                            rule, &selection,
                        )
                        .await?;
                    if !finished {
                        // The in-flight rule was cancelled; remainder
                        // skipped, lease released by the caller.
                        return Ok(());
                    }
                }
            }
        }
        Ok(())
    }

    fn profile_selection(&self, profile: &Profile, entity: &cwn_core::Entity) -> Selection {
        match SelectorSet::compile(&profile.selectors) {
            Ok(set) => set.select(entity),
            Err(e) => {
                // Validated profiles cannot carry bad selectors; if one
                // slips through, evaluating is safer than skipping.
                warn!(
                    target: "cwn.executor",
                    profile = %profile.name,
                    error = %e,
                    "selector failed to compile; treating entity as selected"
                );
                Selection::selected()
            }
        }
    }

    #[allow(clippy::too_many_arguments, reason = "single call site")]
    async fn evaluate_rule(
        &self,
        event: &EntityEvent,
        provider: &Arc<dyn Provider>,
        cache: &dyn IngestCache<IngestResult>,
        lease: &Lease,
        cancel: &CancellationToken,
        metrics: &mut EvaluationMetrics,
        engines: &RuleEngineCache,
        profile: &Profile,
        rule: &RuleInstance,
        selection: &Selection,
    ) -> Result<bool, ExecutorError> {
        let entity = &event.entity;
        let rule_label = rule.name.as_deref().unwrap_or(&rule.rule_type);

        let Some(engine) = engines.engine_by_name(&rule.rule_type) else {
            // Record the unknown reference and carry on with siblings.
            let outcome = EvaluationOutcome {
                entity_id: entity.id,
                profile_id: profile.id,
                rule_instance_id: rule.id,
                status: RuleStatus::Error,
                remediation: cwn_core::ActionStatus::Skipped,
                alert: cwn_core::ActionStatus::Skipped,
                detail: Some(format!("unknown rule type: {}", rule.rule_type)),
                checkpoint: None,
                timestamp: Utc::now(),
                lease_id: lease.lease_id,
            };
            metrics.record_status(RuleStatus::Error);
            self.outcomes
                .upsert_status(outcome)
                .await
                .map_err(ExecutorError::Persist)?;
            return Ok(true);
        };

        let action_engine = self.action_engine(&engine, profile, rule);
        let settings = action_engine.settings();

        let report = if selection.selected {
            tokio::select! {
                report = engine.eval(entity, &rule.params, &rule.def, cache) => report,
                () = cancel.cancelled() => RuleEvalReport {
                    verdict: Err(EvalError::Cancelled),
                    checkpoint: None,
                    cache_hit: false,
                    fingerprint_bypassed: false,
                },
            }
        } else {
            RuleEvalReport {
                verdict: Err(EvalError::Skipped(format!(
                    "entity not selected by profile selector{}",
                    selection
                        .matched_selector
                        .as_deref()
                        .map(|s| format!(": {s}"))
                        .unwrap_or_default()
                ))),
                checkpoint: None,
                cache_hit: false,
                fingerprint_bypassed: false,
            }
        };

        metrics.cache_hits += u64::from(report.cache_hit);
        metrics.fingerprint_bypasses += u64::from(report.fingerprint_bypassed);

        let cancelled = matches!(report.verdict, Err(EvalError::Cancelled));
        let status = report
            .verdict
            .as_ref()
            .map_or_else(EvalError::status, |_| RuleStatus::Success);
        metrics.record_status(status);

        let actions = action_engine.run(entity, status, provider).await;

        info!(
            target: "cwn.executor",
            execution_id = %event.execution_id,
            profile = %profile.name,
            rule = rule_label,
            status = %status,
            remediate = ?settings.remediate,
            alert = ?settings.alert,
            remediation = %actions.remediation,
            alert_status = %actions.alert,
            "rule evaluated"
        );

        let outcome = EvaluationOutcome {
            entity_id: entity.id,
            profile_id: profile.id,
            rule_instance_id: rule.id,
            status,
            remediation: actions.remediation,
            alert: actions.alert,
            detail: outcome_detail(&report, &actions),
            checkpoint: report.checkpoint,
            timestamp: Utc::now(),
            lease_id: lease.lease_id,
        };
        self.outcomes
            .upsert_status(outcome)
            .await
            .map_err(ExecutorError::Persist)?;

        // Lease refresh closes out every rule.
        if let Err(e) = self
            .outcomes
            .update_lease(entity.id, lease.lease_id, self.lease_ttl())
            .await
        {
            warn!(target: "cwn.executor", error = %e, "lease refresh failed; superseded");
            return Err(ExecutorError::Superseded);
        }

        Ok(!cancelled)
    }

    fn action_engine(
        &self,
        engine: &cwn_engine::RuleTypeEngine,
        profile: &Profile,
        rule: &RuleInstance,
    ) -> ActionEngine {
        let rule_type = engine.rule_type();
        let mut action_engine = ActionEngine::new(
            rule_type.default_actions,
            &profile.actions,
            rule.actions.as_ref(),
        );
        if let Some(remediation) = self.remediations.get(&rule_type.name) {
            action_engine = action_engine.with_remediation(Arc::clone(remediation));
        }
        if let Some(alert) = self.alerts.get(&rule_type.name) {
            action_engine = action_engine.with_alert(Arc::clone(alert));
        }
        action_engine
    }
}

/// The human-readable detail persisted with an outcome: the verdict's
/// failure text, plus any dry-run would-have messages.
fn outcome_detail(report: &RuleEvalReport, actions: &ActionReport) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    if let Err(e) = &report.verdict {
        parts.push(e.to_string());
    }
    parts.extend(actions.dry_run_messages.iter().cloned());
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}
