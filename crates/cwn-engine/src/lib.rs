// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! cwn-engine
#![deny(unsafe_code)]
#![warn(missing_docs)]

/// The per-evaluation rule-engine cache.
pub mod cache;
/// Evaluators over ingested data.
pub mod evaluator;
/// Profile validation against rule-type schemas.
pub mod validate;

pub use cache::RuleEngineCache;
pub use evaluator::{DataSourceEvaluator, Evaluator};
pub use validate::{validate_profile, ProfileValidationError};

use cwn_cache::{fingerprint, IngestCache};
use cwn_core::{Checkpoint, Entity, EvalError, EvalSpec, RuleType};
use cwn_ingest::{build_ingester, BuiltinRegistry, Ingester, IngesterLimits, IngestResult};
use cwn_provider::Provider;
use cwn_store::StoreError;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors constructing or resolving rule-type engines.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The rule type has no project context.
    #[error("rule type {name} has no project context")]
    MissingProjectContext {
        /// The offending rule type.
        name: String,
    },

    /// A parameter or definition schema did not compile.
    #[error("schema compilation failed for rule type {name}: {detail}")]
    SchemaCompilation {
        /// The offending rule type.
        name: String,
        /// Compiler detail.
        detail: String,
    },

    /// The ingester could not be built from the rule type's spec.
    #[error("cannot build ingester for rule type {name}: {detail}")]
    BuildIngester {
        /// The offending rule type.
        name: String,
        /// Failure detail.
        detail: String,
    },

    /// No rule type exists under the requested id.
    #[error("unknown rule type: {id}")]
    UnknownRuleType {
        /// The unresolved id.
        id: Uuid,
    },

    /// The rule-type store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// RuleTypeEngine
// ---------------------------------------------------------------------------

/// Everything `eval` reports about one rule run.
#[derive(Debug)]
pub struct RuleEvalReport {
    /// The verdict: `Ok(())` is success, errors carry the §7 taxonomy.
    pub verdict: Result<(), EvalError>,
    /// What was ingested, when ingest got that far.
    pub checkpoint: Option<Checkpoint>,
    /// Whether the ingest cache supplied the result.
    pub cache_hit: bool,
    /// Whether fingerprinting failed and the cache was bypassed.
    pub fingerprint_bypassed: bool,
}

/// One rule type bound to its validators, ingester, and evaluator.
pub struct RuleTypeEngine {
    rule_type: RuleType,
    params_validator: Option<jsonschema::Validator>,
    def_validator: Option<jsonschema::Validator>,
    ingester: Box<dyn Ingester>,
    evaluator: Box<dyn Evaluator>,
    ingest_timeout: std::time::Duration,
}

impl std::fmt::Debug for RuleTypeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleTypeEngine")
            .field("rule_type", &self.rule_type)
            .field("ingest_timeout", &self.ingest_timeout)
            .finish_non_exhaustive()
    }
}

impl RuleTypeEngine {
    /// Bind `rule_type` into an engine.
    ///
    /// # Errors
    ///
    /// [`EngineError`] when the rule type lacks project context, a
    /// schema does not compile, or the ingester cannot be built. Rule
    /// types must be buildable in isolation — any failure here is fatal
    /// to cache population.
    pub fn new(
        rule_type: RuleType,
        provider: Arc<dyn Provider>,
        registry: Arc<BuiltinRegistry>,
        limits: IngesterLimits,
    ) -> Result<Self, EngineError> {
        if rule_type.project_id.is_nil() {
            return Err(EngineError::MissingProjectContext {
                name: rule_type.name.clone(),
            });
        }

        let compile = |schema: &Option<serde_json::Value>| -> Result<
            Option<jsonschema::Validator>,
            EngineError,
        > {
            match schema {
                Some(schema) => jsonschema::validator_for(schema)
                    .map(Some)
                    .map_err(|e| EngineError::SchemaCompilation {
                        name: rule_type.name.clone(),
                        detail: e.to_string(),
                    }),
                None => Ok(None),
            }
        };
        let params_validator = compile(&rule_type.params_schema)?;
        let def_validator = compile(&rule_type.def_schema)?;

        let ingester = build_ingester(&rule_type.ingest, provider, registry, limits).map_err(
            |e| EngineError::BuildIngester {
                name: rule_type.name.clone(),
                detail: e.to_string(),
            },
        )?;

        let evaluator: Box<dyn Evaluator> = match &rule_type.eval {
            EvalSpec::DataSource(spec) => Box::new(DataSourceEvaluator::new(spec.clone())),
        };

        Ok(Self {
            rule_type,
            params_validator,
            def_validator,
            ingester,
            evaluator,
            ingest_timeout: std::time::Duration::from_secs(limits.timeout_secs),
        })
    }

    /// The bound rule type.
    #[must_use]
    pub fn rule_type(&self) -> &RuleType {
        &self.rule_type
    }

    /// Replace the evaluator (tests, alternative predicate languages).
    #[must_use]
    pub fn with_evaluator(mut self, evaluator: Box<dyn Evaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Validate rule-instance params against the params schema.
    ///
    /// # Errors
    ///
    /// Every schema violation, one message per error.
    pub fn validate_params(&self, params: &serde_json::Value) -> Result<(), Vec<String>> {
        validate_against(self.params_validator.as_ref(), params)
    }

    /// Validate a rule-instance definition against the def schema.
    ///
    /// # Errors
    ///
    /// Every schema violation, one message per error.
    pub fn validate_def(&self, def: &serde_json::Value) -> Result<(), Vec<String>> {
        validate_against(self.def_validator.as_ref(), def)
    }

    /// Run one rule: validate, ingest through the cache, evaluate.
    ///
    /// Panics inside ingest or evaluate are contained here and
    /// normalized to internal errors.
    pub async fn eval(
        &self,
        entity: &Entity,
        params: &serde_json::Value,
        def: &serde_json::Value,
        cache: &dyn IngestCache<IngestResult>,
    ) -> RuleEvalReport {
        if let Err(violations) = self.validate_params(params) {
            return RuleEvalReport {
                verdict: Err(EvalError::Evaluation(format!(
                    "invalid rule params: {}",
                    violations.join("; ")
                ))),
                checkpoint: None,
                cache_hit: false,
                fingerprint_bypassed: false,
            };
        }

        // Fingerprint failures bypass the cache, never guess a key.
        let params_for_key = (!params.is_null()).then_some(params);
        let mut fingerprint_bypassed = false;
        let key = match fingerprint(
            self.ingester.ingest_type(),
            self.ingester.config().as_ref(),
            entity,
            params_for_key,
        ) {
            Ok(key) => Some(key),
            Err(e) => {
                warn!(
                    target: "cwn.engine",
                    rule_type = %self.rule_type.name,
                    error = %e,
                    "fingerprinting failed; bypassing ingest cache"
                );
                fingerprint_bypassed = true;
                None
            }
        };

        let mut cache_hit = false;
        let ingested = match key.as_ref().and_then(|k| cache.get(k)) {
            Some(result) => {
                cache_hit = true;
                debug!(
                    target: "cwn.engine",
                    rule_type = %self.rule_type.name,
                    "ingest cache hit"
                );
                Ok(result)
            }
            None => {
                let ingest = AssertUnwindSafe(self.ingester.ingest(entity, params)).catch_unwind();
                match tokio::time::timeout(self.ingest_timeout, ingest).await {
                    Ok(Ok(Ok(result))) => {
                        if let Some(k) = key {
                            cache.set(k, result.clone());
                        }
                        Ok(result)
                    }
                    Ok(Ok(Err(ingest_err))) => Err(ingest_err.to_eval_error()),
                    Ok(Err(_panic)) => Err(EvalError::Internal(format!(
                        "panic during ingest of rule type {}",
                        self.rule_type.name
                    ))),
                    Err(_elapsed) => Err(EvalError::Evaluation(format!(
                        "ingest timed out after {}s",
                        self.ingest_timeout.as_secs()
                    ))),
                }
            }
        };

        let result = match ingested {
            Ok(result) => result,
            Err(verdict) => {
                return RuleEvalReport {
                    verdict: Err(verdict),
                    checkpoint: None,
                    cache_hit,
                    fingerprint_bypassed,
                };
            }
        };
        let checkpoint = result.checkpoint.clone();

        let verdict = match std::panic::catch_unwind(AssertUnwindSafe(|| {
            self.evaluator.evaluate(&result, def)
        })) {
            Ok(verdict) => verdict,
            Err(_) => Err(EvalError::Internal(format!(
                "panic during evaluation of rule type {}",
                self.rule_type.name
            ))),
        };

        RuleEvalReport {
            verdict,
            checkpoint,
            cache_hit,
            fingerprint_bypassed,
        }
    }
}

fn validate_against(
    validator: Option<&jsonschema::Validator>,
    instance: &serde_json::Value,
) -> Result<(), Vec<String>> {
    let Some(validator) = validator else {
        return Ok(());
    };
    let violations: Vec<String> = validator
        .iter_errors(instance)
        .map(|e| e.to_string())
        .collect();
    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}
