// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error catalog for the Chainwarden platform.
//!
//! Every error code follows the pattern `CWN-X###` where `X` is the
//! category letter and `###` is a three-digit number:
//!
//! - **E** — Entity errors
//! - **P** — Profile and rule-type errors
//! - **I** — Ingest errors
//! - **V** — Evaluation errors
//! - **R** — Runtime errors
//! - **S** — System errors

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorCode enum
// ---------------------------------------------------------------------------

/// Enumeration of all Chainwarden error codes, organized by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // ── Entity (E) ────────────────────────────────────────────────────
    /// The entity envelope could not be parsed or is structurally invalid.
    MalformedEntity,
    /// The envelope schema version is not supported.
    UnsupportedEnvelopeVersion,
    /// The entity variant is not supported by the provider.
    UnsupportedEntityKind,
    /// Registration was rejected because the repository is archived.
    ArchivedRepoForbidden,
    /// Registration was rejected because private repositories are
    /// disallowed in the project.
    PrivateRepoForbidden,
    /// A required entity property is missing.
    MissingEntityProperty,

    // ── Profile / rule type (P) ───────────────────────────────────────
    /// The referenced rule type does not exist in the hierarchy.
    UnknownRuleType,
    /// A rule instance references a rule type of a different entity
    /// variant.
    EntityKindMismatch,
    /// Rule-instance parameters violate the rule type's params schema.
    InvalidRuleParams,
    /// Rule-instance definition violates the rule type's def schema.
    InvalidRuleDef,
    /// The rule type has no project context.
    MissingProjectContext,
    /// A rule-type schema could not be compiled.
    SchemaCompilationFailed,

    // ── Ingest (I) ────────────────────────────────────────────────────
    /// The endpoint or body template could not be rendered.
    TemplateRenderFailed,
    /// The response exceeded the permitted size and was truncated.
    ResponseTruncated,
    /// The cloned branch does not exist.
    BranchNotFound,
    /// The cloned repository has no commits.
    RepositoryEmpty,
    /// The repository exceeds the enforced clone limits.
    RepositoryTooLarge,
    /// The built-in method name is not in the registry.
    UnknownBuiltinMethod,
    /// A built-in method invocation failed.
    BuiltinMethodFailed,
    /// `tags` and `tag_regex` were both supplied to the tag matcher.
    ConflictingTagMatchers,

    // ── Evaluation (V) ────────────────────────────────────────────────
    /// Fingerprinting failed; the ingest cache was bypassed.
    BuildingCacheKey,
    /// The evaluator predicate failed to compile.
    PredicateCompilationFailed,
    /// A panic was recovered inside the rule pipeline.
    PanicRecovered,

    // ── Runtime (R) ───────────────────────────────────────────────────
    /// The provider could not be instantiated.
    ProviderUnavailable,
    /// The per-entity lease is held by another evaluation.
    LeaseHeld,
    /// The evaluation was cancelled by the enclosing context.
    EvaluationCancelled,
    /// Building the rule-engine cache failed.
    EngineCacheBuildFailed,
    /// Persisting an evaluation outcome failed.
    OutcomePersistFailed,

    // ── System (S) ────────────────────────────────────────────────────
    /// An I/O operation failed.
    IoError,
    /// JSON serialization or deserialization failed.
    SerializationError,
    /// An unexpected internal error occurred.
    InternalError,
    /// The configuration is invalid or incomplete.
    ConfigurationError,
}

impl ErrorCode {
    /// Machine-readable code string (e.g. `"CWN-E001"`).
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            // Entity
            Self::MalformedEntity => "CWN-E001",
            Self::UnsupportedEnvelopeVersion => "CWN-E002",
            Self::UnsupportedEntityKind => "CWN-E003",
            Self::ArchivedRepoForbidden => "CWN-E004",
            Self::PrivateRepoForbidden => "CWN-E005",
            Self::MissingEntityProperty => "CWN-E006",

            // Profile / rule type
            Self::UnknownRuleType => "CWN-P001",
            Self::EntityKindMismatch => "CWN-P002",
            Self::InvalidRuleParams => "CWN-P003",
            Self::InvalidRuleDef => "CWN-P004",
            Self::MissingProjectContext => "CWN-P005",
            Self::SchemaCompilationFailed => "CWN-P006",

            // Ingest
            Self::TemplateRenderFailed => "CWN-I001",
            Self::ResponseTruncated => "CWN-I002",
            Self::BranchNotFound => "CWN-I003",
            Self::RepositoryEmpty => "CWN-I004",
            Self::RepositoryTooLarge => "CWN-I005",
            Self::UnknownBuiltinMethod => "CWN-I006",
            Self::BuiltinMethodFailed => "CWN-I007",
            Self::ConflictingTagMatchers => "CWN-I008",

            // Evaluation
            Self::BuildingCacheKey => "CWN-V001",
            Self::PredicateCompilationFailed => "CWN-V002",
            Self::PanicRecovered => "CWN-V003",

            // Runtime
            Self::ProviderUnavailable => "CWN-R001",
            Self::LeaseHeld => "CWN-R002",
            Self::EvaluationCancelled => "CWN-R003",
            Self::EngineCacheBuildFailed => "CWN-R004",
            Self::OutcomePersistFailed => "CWN-R005",

            // System
            Self::IoError => "CWN-S001",
            Self::SerializationError => "CWN-S002",
            Self::InternalError => "CWN-S003",
            Self::ConfigurationError => "CWN-S004",
        }
    }

    /// Human-readable category label.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::MalformedEntity
            | Self::UnsupportedEnvelopeVersion
            | Self::UnsupportedEntityKind
            | Self::ArchivedRepoForbidden
            | Self::PrivateRepoForbidden
            | Self::MissingEntityProperty => "entity",

            Self::UnknownRuleType
            | Self::EntityKindMismatch
            | Self::InvalidRuleParams
            | Self::InvalidRuleDef
            | Self::MissingProjectContext
            | Self::SchemaCompilationFailed => "profile",

            Self::TemplateRenderFailed
            | Self::ResponseTruncated
            | Self::BranchNotFound
            | Self::RepositoryEmpty
            | Self::RepositoryTooLarge
            | Self::UnknownBuiltinMethod
            | Self::BuiltinMethodFailed
            | Self::ConflictingTagMatchers => "ingest",

            Self::BuildingCacheKey
            | Self::PredicateCompilationFailed
            | Self::PanicRecovered => "evaluation",

            Self::ProviderUnavailable
            | Self::LeaseHeld
            | Self::EvaluationCancelled
            | Self::EngineCacheBuildFailed
            | Self::OutcomePersistFailed => "runtime",

            Self::IoError
            | Self::SerializationError
            | Self::InternalError
            | Self::ConfigurationError => "system",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl std::error::Error for ErrorCode {}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// All error codes, in definition order.
const ALL_CODES: &[ErrorCode] = &[
    // Entity
    ErrorCode::MalformedEntity,
    ErrorCode::UnsupportedEnvelopeVersion,
    ErrorCode::UnsupportedEntityKind,
    ErrorCode::ArchivedRepoForbidden,
    ErrorCode::PrivateRepoForbidden,
    ErrorCode::MissingEntityProperty,
    // Profile / rule type
    ErrorCode::UnknownRuleType,
    ErrorCode::EntityKindMismatch,
    ErrorCode::InvalidRuleParams,
    ErrorCode::InvalidRuleDef,
    ErrorCode::MissingProjectContext,
    ErrorCode::SchemaCompilationFailed,
    // Ingest
    ErrorCode::TemplateRenderFailed,
    ErrorCode::ResponseTruncated,
    ErrorCode::BranchNotFound,
    ErrorCode::RepositoryEmpty,
    ErrorCode::RepositoryTooLarge,
    ErrorCode::UnknownBuiltinMethod,
    ErrorCode::BuiltinMethodFailed,
    ErrorCode::ConflictingTagMatchers,
    // Evaluation
    ErrorCode::BuildingCacheKey,
    ErrorCode::PredicateCompilationFailed,
    ErrorCode::PanicRecovered,
    // Runtime
    ErrorCode::ProviderUnavailable,
    ErrorCode::LeaseHeld,
    ErrorCode::EvaluationCancelled,
    ErrorCode::EngineCacheBuildFailed,
    ErrorCode::OutcomePersistFailed,
    // System
    ErrorCode::IoError,
    ErrorCode::SerializationError,
    ErrorCode::InternalError,
    ErrorCode::ConfigurationError,
];

/// Static catalog providing lookup and enumeration of [`ErrorCode`]s.
pub struct ErrorCatalog;

impl ErrorCatalog {
    /// Look up an [`ErrorCode`] by its code string (e.g. `"CWN-E004"`).
    #[must_use]
    pub fn lookup(code: &str) -> Option<ErrorCode> {
        ALL_CODES.iter().find(|c| c.code() == code).copied()
    }

    /// Return every defined [`ErrorCode`].
    #[must_use]
    pub fn all() -> Vec<ErrorCode> {
        ALL_CODES.to_vec()
    }

    /// Return all codes belonging to `category` (e.g. `"ingest"`).
    #[must_use]
    pub fn by_category(category: &str) -> Vec<ErrorCode> {
        ALL_CODES
            .iter()
            .filter(|c| c.category() == category)
            .copied()
            .collect()
    }
}
