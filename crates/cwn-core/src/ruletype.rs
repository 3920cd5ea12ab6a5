// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rule-type descriptors.
//!
//! A [`RuleType`] is an immutable-per-version template: which entity
//! variant it applies to, the JSON-Schemas its instances are validated
//! against, how its data is ingested, and how the ingested data is
//! evaluated. Rule types are scoped to a project and inherited down the
//! project hierarchy.

use crate::EntityKind;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RuleType
// ---------------------------------------------------------------------------

/// Severity a rule failure carries.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational only.
    Info,
    /// Low severity.
    Low,
    /// Medium severity.
    #[default]
    Medium,
    /// High severity.
    High,
    /// Critical severity.
    Critical,
}

/// Default on/off/dry-run state for one action kind.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ActionSetting {
    /// Apply the action.
    On,
    /// Report the action as skipped.
    #[default]
    Off,
    /// Simulate the action and record a would-have message.
    DryRun,
}

/// Default action states declared by a rule type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ActionDefaults {
    /// Default remediation state.
    #[serde(default)]
    pub remediate: ActionSetting,
    /// Default alert state.
    #[serde(default)]
    pub alert: ActionSetting,
}

/// An immutable-per-version rule template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RuleType {
    /// Unique rule-type identifier.
    pub id: Uuid,

    /// Name the profile's rule instances reference.
    pub name: String,

    /// Rule-type version; a new version is a new immutable descriptor.
    pub version: String,

    /// The project this rule type is scoped to.
    pub project_id: Uuid,

    /// The entity variant this rule type applies to.
    pub entity_kind: EntityKind,

    /// Severity carried by failures of this rule.
    #[serde(default)]
    pub severity: Severity,

    /// JSON-Schema that rule-instance parameters must satisfy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params_schema: Option<serde_json::Value>,

    /// JSON-Schema that rule-instance definitions must satisfy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub def_schema: Option<serde_json::Value>,

    /// How data is ingested for this rule.
    pub ingest: IngestSpec,

    /// How the ingested data is evaluated.
    pub eval: EvalSpec,

    /// Default action states for instances of this rule.
    #[serde(default)]
    pub default_actions: ActionDefaults,
}

// ---------------------------------------------------------------------------
// Ingest configuration
// ---------------------------------------------------------------------------

/// Ingester configuration: a stable tag plus type-specific config.
///
/// New ingesters are added here and to the factory's match — no
/// reflection, no open registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IngestSpec {
    /// One authenticated HTTP request through the provider.
    Rest(RestIngestSpec),
    /// Clone a branch into an in-memory worktree.
    Git(GitIngestSpec),
    /// Dependency difference of a pull request.
    Diff(DiffIngestSpec),
    /// Full dependency extraction from a cloned branch.
    Deps(DepsIngestSpec),
    /// Artifact version filtering plus signature verification.
    Artifact(ArtifactIngestSpec),
    /// A host-provided built-in function.
    Builtin(BuiltinIngestSpec),
}

impl IngestSpec {
    /// The stable ingester tag, used in fingerprints and logs.
    #[must_use]
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::Rest(_) => "rest",
            Self::Git(_) => "git",
            Self::Diff(_) => "diff",
            Self::Deps(_) => "deps",
            Self::Artifact(_) => "artifact",
            Self::Builtin(_) => "builtin",
        }
    }
}

/// A literal body substituted when the provider returns a given status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RestFallback {
    /// HTTP status code that triggers the fallback.
    pub http_code: u16,
    /// Literal body presented to the parser in place of the response.
    pub body: String,
}

/// Configuration for the REST ingester.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RestIngestSpec {
    /// Endpoint template rendered from `{entity, params}`.
    pub endpoint: String,

    /// HTTP method; defaults to GET.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// Optional body template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    /// `"json"` to decode the body, otherwise raw bytes are returned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse: Option<String>,

    /// Status-code fallbacks applied before parsing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback: Vec<RestFallback>,
}

/// Configuration for the Git ingester.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GitIngestSpec {
    /// Branch to clone; rule-instance params and entity properties take
    /// precedence (see the ingester's resolution order).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

/// Which side of a dependency diff is kept.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum DepFilter {
    /// Dependencies whose *name* is absent from the base.
    #[default]
    New,
    /// Dependencies new by name, or present with a different version or
    /// hash set.
    NewAndUpdated,
    /// The target side, untouched.
    All,
}

/// How the diff ingester obtains the two sides to compare.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum DiffMode {
    /// Page through the pull request's changed files and parse `+` hunks.
    #[default]
    PrFiles,
    /// Clone base and target refs and compare extracted dependencies.
    BranchCompare,
}

/// Maps an ecosystem to the dependency files the diff ingester inspects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EcosystemDepFile {
    /// Ecosystem name: `npm`, `go`, or `pypi`.
    pub ecosystem: String,
    /// Glob matched against changed file paths (e.g. `**/package-lock.json`).
    pub depfile: String,
}

/// Configuration for the Diff ingester.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DiffIngestSpec {
    /// How the two sides are obtained.
    #[serde(default)]
    pub mode: DiffMode,

    /// Ecosystems and the dependency files to inspect per ecosystem.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ecosystems: Vec<EcosystemDepFile>,

    /// Which dependencies survive the base/target comparison.
    #[serde(default)]
    pub filter: DepFilter,
}

/// Configuration for the Deps ingester.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DepsIngestSpec {
    /// Branch to clone; same resolution order as the Git ingester.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

/// Configuration for the Artifact ingester.
///
/// Tag matching comes from rule-instance parameters; the spec itself has
/// no knobs today, but the struct keeps the config slot stable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ArtifactIngestSpec {}

/// Configuration for the built-in ingester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BuiltinIngestSpec {
    /// Name of the host-provided method in the built-in registry.
    pub method: String,
}

// ---------------------------------------------------------------------------
// Evaluator configuration
// ---------------------------------------------------------------------------

/// Evaluator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EvalSpec {
    /// Path-and-comparator assertions over the ingested object.
    DataSource(DataSourceEvalSpec),
}

/// Comparator applied between an extracted value and an expected literal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    /// Values are equal.
    Eq,
    /// Values are not equal.
    Ne,
    /// Numeric less-than.
    Lt,
    /// Numeric greater-than.
    Gt,
    /// String or array containment.
    Contains,
    /// Membership in an expected array.
    InSet,
    /// The path resolves to a value.
    Exists,
    /// The path resolves to nothing.
    NotExists,
}

/// One assertion of a data-source evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Assertion {
    /// JSONPath into the ingested object (e.g. `$.enforce_admins.enabled`).
    pub path: String,

    /// Comparator to apply.
    pub op: Comparator,

    /// Expected literal; unused by `exists`/`not_exists`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

/// Configuration for the data-source evaluator: every assertion must hold
/// for the rule to succeed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DataSourceEvalSpec {
    /// Assertions evaluated in order; all must hold.
    #[serde(default)]
    pub assertions: Vec<Assertion>,
}
