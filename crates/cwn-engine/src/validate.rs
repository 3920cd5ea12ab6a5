// SPDX-License-Identifier: MIT OR Apache-2.0

//! Profile validation.
//!
//! Runs at profile create/update time: every rule instance must
//! reference a known rule type of the matching entity variant and
//! satisfy that type's parameter and definition schemas, and every
//! selector must compile. Invalid profiles never reach the executor.

use cwn_core::{EntityKind, Profile, RuleType};
use cwn_select::{SelectorError, SelectorSet};
use std::collections::HashMap;

/// Why a profile was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileValidationError {
    /// A rule instance references a rule type that does not exist.
    #[error("rule `{rule}` references unknown rule type `{rule_type}`")]
    UnknownRuleType {
        /// Rule-instance label.
        rule: String,
        /// The unresolved rule-type name.
        rule_type: String,
    },

    /// A rule instance is grouped under a different entity variant than
    /// its rule type declares.
    #[error(
        "rule `{rule}` is grouped under {grouped} but rule type `{rule_type}` applies to {declared}"
    )]
    EntityKindMismatch {
        /// Rule-instance label.
        rule: String,
        /// The group the instance sits in.
        grouped: EntityKind,
        /// The referenced rule type.
        rule_type: String,
        /// The variant the rule type declares.
        declared: EntityKind,
    },

    /// Rule-instance parameters violate the params schema.
    #[error("rule `{rule}` has invalid params: {violations:?}")]
    InvalidParams {
        /// Rule-instance label.
        rule: String,
        /// Schema violations.
        violations: Vec<String>,
    },

    /// Rule-instance definition violates the def schema.
    #[error("rule `{rule}` has invalid definition: {violations:?}")]
    InvalidDef {
        /// Rule-instance label.
        rule: String,
        /// Schema violations.
        violations: Vec<String>,
    },

    /// A profile selector does not compile.
    #[error(transparent)]
    Selector(#[from] SelectorError),

    /// A rule type's schema itself does not compile.
    #[error("rule type `{rule_type}` has an uncompilable schema: {detail}")]
    SchemaCompilation {
        /// The offending rule type.
        rule_type: String,
        /// Compiler detail.
        detail: String,
    },
}

/// Validate `profile` against the rule types visible in its hierarchy.
///
/// # Errors
///
/// The first [`ProfileValidationError`] encountered, in declared rule
/// order.
pub fn validate_profile(
    profile: &Profile,
    rule_types: &[RuleType],
) -> Result<(), ProfileValidationError> {
    SelectorSet::compile(&profile.selectors)?;

    let by_name: HashMap<&str, &RuleType> =
        rule_types.iter().map(|rt| (rt.name.as_str(), rt)).collect();

    for (kind, instances) in &profile.rules {
        for instance in instances {
            let label = instance
                .name
                .clone()
                .unwrap_or_else(|| instance.rule_type.clone());

            let rule_type = by_name.get(instance.rule_type.as_str()).ok_or_else(|| {
                ProfileValidationError::UnknownRuleType {
                    rule: label.clone(),
                    rule_type: instance.rule_type.clone(),
                }
            })?;

            if rule_type.entity_kind != *kind {
                return Err(ProfileValidationError::EntityKindMismatch {
                    rule: label,
                    grouped: *kind,
                    rule_type: rule_type.name.clone(),
                    declared: rule_type.entity_kind,
                });
            }

            validate_schema(
                &rule_type.params_schema,
                &instance.params,
                &rule_type.name,
            )
            .map_err(|violations| ProfileValidationError::InvalidParams {
                rule: label.clone(),
                violations,
            })?;
            validate_schema(&rule_type.def_schema, &instance.def, &rule_type.name).map_err(
                |violations| ProfileValidationError::InvalidDef {
                    rule: label.clone(),
                    violations,
                },
            )?;
        }
    }
    Ok(())
}

/// Validate `instance` against `schema`, returning every violation.
fn validate_schema(
    schema: &Option<serde_json::Value>,
    instance: &serde_json::Value,
    _rule_type: &str,
) -> Result<(), Vec<String>> {
    let Some(schema) = schema else {
        return Ok(());
    };
    let Ok(validator) = jsonschema::validator_for(schema) else {
        return Err(vec!["schema does not compile".to_owned()]);
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
