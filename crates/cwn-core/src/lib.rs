// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! cwn-core
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The stable contract for Chainwarden.
//!
//! If you only take one dependency, take this one.

/// Versioned checkpoint envelopes recording what was evaluated.
pub mod checkpoint;
/// Error catalog for the Chainwarden platform.
pub mod error;
/// Evaluation outcome records and leases.
pub mod outcome;
/// Profile descriptors: ordered rule instances plus selectors.
pub mod profile;
/// Rule-type descriptors: schemas, ingest and evaluator configuration.
pub mod ruletype;
/// Evaluation status taxonomy shared by the engine, actions, and history.
pub mod status;
/// Aggregation over recorded evaluation outcomes.
pub mod summary;

pub use checkpoint::{Checkpoint, CheckpointV1};
pub use outcome::{EvaluationOutcome, Lease};
pub use summary::OutcomeSummary;
pub use profile::{Profile, ProfileActionConfig, ProfileSelector, RuleInstance};
pub use ruletype::{
    ActionDefaults, ActionSetting, ArtifactIngestSpec, Assertion, BuiltinIngestSpec, Comparator,
    DataSourceEvalSpec, DepFilter, DepsIngestSpec, DiffIngestSpec, DiffMode, EcosystemDepFile,
    EvalSpec, GitIngestSpec, IngestSpec, RestFallback, RestIngestSpec, RuleType, Severity,
};
pub use status::{ActionStatus, EvalError, RuleStatus};

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Current entity-envelope version string embedded in all bus messages.
///
/// # Examples
///
/// ```
/// assert_eq!(cwn_core::ENVELOPE_VERSION, "cwn/v1");
/// ```
pub const ENVELOPE_VERSION: &str = "cwn/v1";

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// The variant of a tracked supply-chain entity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A source repository.
    Repository,
    /// A pull request against a repository.
    PullRequest,
    /// A built artifact (e.g. a container image).
    Artifact,
    /// A single version of an artifact.
    ArtifactVersion,
    /// A tagged release.
    Release,
    /// A dependency extracted from a manifest or lock file.
    Dependency,
    /// A build environment (runner, pipeline).
    BuildEnvironment,
}

impl EntityKind {
    /// Stable lowercase tag used in logs and bus messages.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Repository => "repository",
            Self::PullRequest => "pull_request",
            Self::Artifact => "artifact",
            Self::ArtifactVersion => "artifact_version",
            Self::Release => "release",
            Self::Dependency => "dependency",
            Self::BuildEnvironment => "build_environment",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed scalar stored under a canonical property key.
///
/// Untagged on the wire: order matters — `Bytes` must precede `Struct`
/// so byte arrays don't decode as generic JSON arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Boolean flag (e.g. `is_archived`).
    Bool(bool),
    /// Signed integer counter or identifier.
    Int(i64),
    /// UTF-8 string (e.g. `clone_url`).
    Str(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Structured JSON payload.
    Struct(serde_json::Value),
}

impl PropertyValue {
    /// Returns the boolean value, if this is a [`PropertyValue::Bool`].
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer value, if this is a [`PropertyValue::Int`].
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the string value, if this is a [`PropertyValue::Str`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Convert into a plain JSON value.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Str(s) => serde_json::Value::String(s.clone()),
            Self::Bytes(b) => serde_json::Value::from(b.clone()),
            Self::Struct(v) => v.clone(),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

/// A property value together with its freshness metadata.
///
/// The provider is the source of truth; `fetched_at` records the last
/// refresh. Callers that tolerate stale reads opt in via fetch options
/// on the provider, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Property {
    /// The typed scalar.
    pub value: PropertyValue,
    /// When the provider last refreshed this value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
}

/// Well-known property key: whether the repository is archived.
pub const PROP_IS_ARCHIVED: &str = "is_archived";
/// Well-known property key: whether the repository is private.
pub const PROP_IS_PRIVATE: &str = "is_private";
/// Well-known property key: the URL used to clone the repository.
pub const PROP_CLONE_URL: &str = "clone_url";
/// Well-known property key: the default branch name.
pub const PROP_DEFAULT_BRANCH: &str = "default_branch";
/// Well-known property key: the provider-side identifier.
pub const PROP_UPSTREAM_ID: &str = "upstream_id";

/// String-keyed bag of typed [`Property`] values.
///
/// Keys are canonical dotted paths; iteration order is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Properties {
    inner: BTreeMap<String, Property>,
}

impl Properties {
    /// Create an empty property bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value under `key`, stamping no freshness metadata.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) {
        self.inner.insert(
            key.into(),
            Property {
                value: value.into(),
                fetched_at: None,
            },
        );
    }

    /// Insert a value refreshed at `fetched_at`.
    pub fn insert_fetched(
        &mut self,
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
        fetched_at: DateTime<Utc>,
    ) {
        self.inner.insert(
            key.into(),
            Property {
                value: value.into(),
                fetched_at: Some(fetched_at),
            },
        );
    }

    /// Look up a property by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Property> {
        self.inner.get(key)
    }

    /// Look up the value under `key`.
    #[must_use]
    pub fn value_of(&self, key: &str) -> Option<&PropertyValue> {
        self.inner.get(key).map(|p| &p.value)
    }

    /// Boolean value under `key`, if present and boolean.
    #[must_use]
    pub fn bool_of(&self, key: &str) -> Option<bool> {
        self.value_of(key).and_then(PropertyValue::as_bool)
    }

    /// String value under `key`, if present and a string.
    #[must_use]
    pub fn str_of(&self, key: &str) -> Option<&str> {
        self.value_of(key).and_then(PropertyValue::as_str)
    }

    /// Number of properties in the bag.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the bag is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterate over `(key, property)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Property)> {
        self.inner.iter()
    }

    /// Project the bag to a JSON object of bare values.
    ///
    /// Freshness metadata is dropped; this is the stable form used for
    /// fingerprinting and selector evaluation.
    #[must_use]
    pub fn to_json_values(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .inner
            .iter()
            .map(|(k, p)| (k.clone(), p.value.to_json()))
            .collect();
        serde_json::Value::Object(map)
    }
}

impl<K: Into<String>, V: Into<PropertyValue>> FromIterator<(K, V)> for Properties {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut props = Self::new();
        for (k, v) in iter {
            props.insert(k, v);
        }
        props
    }
}

/// A tracked real-world object: repository, pull request, artifact, …
///
/// Entities carry a stable provider-side identifier (`upstream_id`), a
/// project-scoped internal identifier (`id`), and a property bag filled
/// by the originating provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Entity {
    /// Project-scoped internal identifier, unique within `project_id`.
    pub id: Uuid,

    /// Stable identifier on the provider side (e.g. a forge node id).
    pub upstream_id: String,

    /// Which variant this entity is.
    pub kind: EntityKind,

    /// The project this entity belongs to.
    pub project_id: Uuid,

    /// The provider instance this entity originates from.
    pub provider_id: String,

    /// Provider-filled typed properties.
    #[serde(default)]
    pub properties: Properties,

    /// The entity this one was originated from, if any (single parent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub originated_from: Option<Uuid>,
}

impl Entity {
    /// Human-readable display handle: the entity `name` property when the
    /// provider filled one, otherwise the upstream identifier.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.properties
            .str_of("name")
            .unwrap_or(&self.upstream_id)
    }

    /// The stable payload used for cache fingerprinting.
    ///
    /// Freshness timestamps are excluded so repeated fetches of identical
    /// upstream state produce identical fingerprints.
    #[must_use]
    pub fn fingerprint_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "kind": self.kind.as_str(),
            "project_id": self.project_id,
            "upstream_id": self.upstream_id,
            "properties": self.properties.to_json_values(),
        })
    }
}

// ---------------------------------------------------------------------------
// Entity events
// ---------------------------------------------------------------------------

/// A versioned entity event as published on the internal bus.
///
/// The envelope schema is versioned via [`ENVELOPE_VERSION`]; consumers
/// reject unknown versions rather than guessing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EntityEvent {
    /// Envelope schema version (see [`ENVELOPE_VERSION`]).
    pub version: String,
    /// Project the event applies to.
    pub project_id: Uuid,
    /// Provider instance to evaluate the entity through.
    pub provider_id: String,
    /// Correlates every record written for one evaluation pass.
    pub execution_id: Uuid,
    /// The entity to evaluate.
    pub entity: Entity,
}

impl EntityEvent {
    /// Build a v1 event for `entity` with a fresh execution id.
    #[must_use]
    pub fn new(entity: Entity) -> Self {
        Self {
            version: ENVELOPE_VERSION.to_owned(),
            project_id: entity.project_id,
            provider_id: entity.provider_id.clone(),
            execution_id: Uuid::new_v4(),
            entity,
        }
    }
}

// ---------------------------------------------------------------------------
// Canonical JSON + hashing
// ---------------------------------------------------------------------------

/// Errors from contract-level operations (serialization, hashing).
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    /// JSON serialization or deserialization failed.
    #[error("failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Produce a deterministic JSON string for hashing.
///
/// This is not a full JCS implementation, but it is stable for our types:
/// - keys are sorted (serde_json Map is a BTreeMap by default)
/// - numbers are serialized consistently by serde_json
///
/// # Errors
///
/// Returns [`ContractError::Json`] if the value cannot be serialized.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, ContractError> {
    let v = serde_json::to_value(value)?;
    Ok(serde_json::to_string(&v)?)
}

/// Compute the hex-encoded SHA-512 digest of `bytes`.
///
/// # Examples
///
/// ```
/// let digest = cwn_core::sha512_hex(b"chainwarden");
/// assert_eq!(digest.len(), 128);
/// ```
#[must_use]
pub fn sha512_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha512::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
