// SPDX-License-Identifier: MIT OR Apache-2.0

//! Profile descriptors.
//!
//! A profile is a named, ordered collection of rule instances grouped by
//! entity variant, plus project-wide selectors and a profile-global
//! action configuration. Profiles are validated against their rule
//! types' schemas at create/update time; invalid profiles never reach
//! the executor.

use crate::ruletype::ActionSetting;
use crate::EntityKind;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A rule type bound with concrete parameters inside a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RuleInstance {
    /// Unique rule-instance identifier.
    pub id: Uuid,

    /// Name of the referenced rule type.
    pub rule_type: String,

    /// Optional instance name distinguishing repeated uses of one type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Parameters validated against the rule type's params schema.
    #[serde(default)]
    pub params: serde_json::Value,

    /// Definition validated against the rule type's def schema.
    #[serde(default)]
    pub def: serde_json::Value,

    /// Per-rule action override; falls back to the profile, then the
    /// rule type's defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<ProfileActionConfig>,
}

/// Profile-level (or per-rule override) action configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ProfileActionConfig {
    /// Remediation state; `None` defers to the next level down.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediate: Option<ActionSetting>,

    /// Alert state; `None` defers to the next level down.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert: Option<ActionSetting>,
}

/// A profile-level predicate that can skip an entity before any rule of
/// the profile runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ProfileSelector {
    /// Restrict the selector to one entity variant; `None` applies to all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<EntityKind>,

    /// Predicate source in the selector language
    /// (e.g. `properties.is_private == false`).
    pub expr: String,

    /// Free-form comment carried for operators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A named ordered bundle of rule instances applied in a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Profile {
    /// Unique profile identifier.
    pub id: Uuid,

    /// Profile display name, unique within the project.
    pub name: String,

    /// The project this profile belongs to.
    pub project_id: Uuid,

    /// Entity selectors; an entity not selected by a matching selector
    /// skips every rule of this profile.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selectors: Vec<ProfileSelector>,

    /// Profile-global action configuration.
    #[serde(default)]
    pub actions: ProfileActionConfig,

    /// Rule instances grouped by entity variant, in declared order.
    #[serde(default)]
    pub rules: BTreeMap<EntityKind, Vec<RuleInstance>>,
}

impl Profile {
    /// The rules of this profile applicable to `kind`, in declared order.
    #[must_use]
    pub fn rules_for(&self, kind: EntityKind) -> &[RuleInstance] {
        self.rules.get(&kind).map_or(&[], Vec::as_slice)
    }

    /// Whether this profile has at least one rule for `kind`.
    #[must_use]
    pub fn applies_to(&self, kind: EntityKind) -> bool {
        !self.rules_for(kind).is_empty()
    }

    /// Selectors applicable to `kind` (unrestricted selectors included).
    #[must_use]
    pub fn selectors_for(&self, kind: EntityKind) -> Vec<&ProfileSelector> {
        self.selectors
            .iter()
            .filter(|s| s.kind.is_none() || s.kind == Some(kind))
            .collect()
    }
}
