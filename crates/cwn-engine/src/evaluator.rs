// SPDX-License-Identifier: MIT OR Apache-2.0

//! Evaluators over ingested data.
//!
//! The data-source evaluator runs path-and-comparator assertions against
//! the ingested object. Missing evidence fails closed: a path that does
//! not resolve fails the assertion rather than passing it.

use cwn_core::{Assertion, Comparator, DataSourceEvalSpec, EvalError};
use cwn_ingest::IngestResult;
use serde_json::Value;

/// Turns an ingest result and a rule definition into a verdict.
///
/// `Ok(())` means the rule condition was met; errors carry the
/// evaluation taxonomy.
pub trait Evaluator: Send + Sync {
    /// Evaluate the ingested data against the rule definition.
    ///
    /// # Errors
    ///
    /// [`EvalError::Failed`] when the condition is not met,
    /// [`EvalError::Evaluation`] when evaluation itself cannot proceed.
    fn evaluate(&self, result: &IngestResult, def: &Value) -> Result<(), EvalError>;
}

/// Assertion-based evaluator over the ingested JSON object.
///
/// Rule-type assertions run first; the instance definition may append
/// its own under an `assertions` key.
pub struct DataSourceEvaluator {
    spec: DataSourceEvalSpec,
}

impl DataSourceEvaluator {
    /// Create an evaluator for the given spec.
    #[must_use]
    pub fn new(spec: DataSourceEvalSpec) -> Self {
        Self { spec }
    }
}

impl Evaluator for DataSourceEvaluator {
    fn evaluate(&self, result: &IngestResult, def: &Value) -> Result<(), EvalError> {
        let object = result.object.as_ref().ok_or_else(|| {
            EvalError::Evaluation("ingest produced no object to evaluate".to_owned())
        })?;

        let mut assertions = self.spec.assertions.clone();
        if let Some(extra) = def.get("assertions") {
            let extra: Vec<Assertion> = serde_json::from_value(extra.clone()).map_err(|e| {
                EvalError::Evaluation(format!("bad assertions in rule definition: {e}"))
            })?;
            assertions.extend(extra);
        }

        for assertion in &assertions {
            check(assertion, object)?;
        }
        Ok(())
    }
}

fn check(assertion: &Assertion, object: &Value) -> Result<(), EvalError> {
    let found = jsonpath_lib::select(object, &assertion.path).map_err(|e| {
        EvalError::Evaluation(format!("bad assertion path {}: {e}", assertion.path))
    })?;

    match assertion.op {
        Comparator::Exists => {
            if found.is_empty() {
                return Err(EvalError::Failed(format!(
                    "{} does not exist",
                    assertion.path
                )));
            }
            return Ok(());
        }
        Comparator::NotExists => {
            if found.is_empty() {
                return Ok(());
            }
            return Err(EvalError::Failed(format!("{} exists", assertion.path)));
        }
        _ => {}
    }

    // Value comparators fail closed on missing evidence.
    let Some(actual) = found.first().copied() else {
        return Err(EvalError::Failed(format!(
            "{} resolved to nothing",
            assertion.path
        )));
    };
    let expected = assertion.value.as_ref().ok_or_else(|| {
        EvalError::Evaluation(format!(
            "assertion on {} needs an expected value",
            assertion.path
        ))
    })?;

    let holds = match assertion.op {
        Comparator::Eq => actual == expected,
        Comparator::Ne => actual != expected,
        Comparator::Lt => numeric(actual, expected, |a, e| a < e),
        Comparator::Gt => numeric(actual, expected, |a, e| a > e),
        Comparator::Contains => match (actual, expected) {
            (Value::Array(items), needle) => items.contains(needle),
            (Value::String(haystack), Value::String(needle)) => haystack.contains(needle),
            _ => false,
        },
        Comparator::InSet => match expected {
            Value::Array(items) => items.contains(actual),
            _ => false,
        },
        Comparator::Exists | Comparator::NotExists => unreachable!("handled above"),
    };

    if holds {
        Ok(())
    } else {
        Err(EvalError::Failed(format!(
            "{} {:?} {} does not hold (actual: {})",
            assertion.path, assertion.op, expected, actual
        )))
    }
}

fn numeric(actual: &Value, expected: &Value, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (actual.as_f64(), expected.as_f64()) {
        (Some(a), Some(e)) => cmp(a, e),
        _ => false,
    }
}
