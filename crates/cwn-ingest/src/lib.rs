// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! cwn-ingest
#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Artifact version filtering and signature verification.
pub mod artifact;
/// Host-provided built-in methods.
pub mod builtin;
/// Dependency model and manifest parsers.
pub mod deps;
/// Full dependency extraction over a cloned branch.
pub mod depsingest;
/// Dependency difference of a pull request.
pub mod diff;
/// Branch cloning into in-memory worktrees.
pub mod git;
/// One authenticated HTTP request through the provider.
pub mod rest;
/// Endpoint and body templating.
pub mod template;

use async_trait::async_trait;
use cwn_core::{Checkpoint, Entity, EvalError, IngestSpec};
use cwn_fs::FsView;
use cwn_provider::{Provider, ProviderError};
use std::sync::Arc;

pub use artifact::{ArtifactIngester, SignatureEvidence, SignatureVerifier};
pub use builtin::{BuiltinIngester, BuiltinRegistry};
pub use deps::Dependency;
pub use depsingest::DepsIngester;
pub use diff::DiffIngester;
pub use git::GitIngester;
pub use rest::RestIngester;

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// What an ingester hands to the evaluator.
///
/// All three payloads are optional; which ones are filled depends on the
/// ingester.
#[derive(Debug, Clone, Default)]
pub struct IngestResult {
    /// Arbitrary decoded value for the evaluator.
    pub object: Option<serde_json::Value>,
    /// Read-only filesystem view (clone-based ingesters).
    pub fs: Option<FsView>,
    /// What was ingested, for the outcome record.
    pub checkpoint: Option<Checkpoint>,
}

/// Typed ingest failure.
///
/// Each variant maps onto the evaluation taxonomy via
/// [`IngestError::to_eval_error`]; an ingest failure becomes the rule's
/// verdict and stops the rule, never the profile.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The fetched state definitively fails the rule (e.g. branch not
    /// found, no applicable artifact versions).
    #[error("{0}")]
    Failed(String),

    /// A prerequisite was absent; the rule should be skipped.
    #[error("{0}")]
    Skipped(String),

    /// The rule is inapplicable to this entity.
    #[error("{0}")]
    Inapplicable(String),

    /// The endpoint or body template could not be rendered. Fatal.
    #[error("template render failed: {0}")]
    Template(String),

    /// The ingester configuration or rule params are unusable.
    #[error("ingest configuration error: {0}")]
    Config(String),

    /// The provider failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Anything else that went wrong mid-ingest.
    #[error("{0}")]
    Other(String),
}

impl IngestError {
    /// Collapse onto the evaluation taxonomy.
    #[must_use]
    pub fn to_eval_error(&self) -> EvalError {
        match self {
            Self::Failed(detail) => EvalError::Failed(detail.clone()),
            Self::Skipped(detail) => EvalError::Skipped(detail.clone()),
            Self::Inapplicable(detail) => EvalError::SkippedSilently(detail.clone()),
            Self::Template(detail) | Self::Config(detail) => {
                EvalError::Evaluation(detail.clone())
            }
            Self::Provider(e) => EvalError::Evaluation(e.to_string()),
            Self::Other(detail) => EvalError::Evaluation(detail.clone()),
        }
    }
}

/// Fetches and shapes upstream data for one rule.
#[async_trait]
pub trait Ingester: Send + Sync {
    /// Run the ingest for `entity` with the rule-instance `params`.
    ///
    /// # Errors
    ///
    /// A typed [`IngestError`] that becomes the rule's verdict.
    async fn ingest(
        &self,
        entity: &Entity,
        params: &serde_json::Value,
    ) -> Result<IngestResult, IngestError>;

    /// Stable ingester tag, used in fingerprints and logs.
    fn ingest_type(&self) -> &'static str;

    /// Typed ingester config for fingerprinting, when there is one.
    fn config(&self) -> Option<serde_json::Value>;
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Operational limits shared by the ingester set.
#[derive(Debug, Clone, Copy)]
pub struct IngesterLimits {
    /// Hard cap on REST response bodies, in bytes.
    pub rest_max_body_bytes: usize,
    /// Maximum number of files accepted from one clone.
    pub clone_max_files: usize,
    /// Maximum total bytes accepted from one clone.
    pub clone_max_bytes: u64,
    /// Versions older than this many days are skipped by the artifact
    /// ingester.
    pub artifact_retention_days: u32,
    /// Per-ingester call timeout, in seconds. Bound from above by the
    /// enclosing executor timeout.
    pub timeout_secs: u64,
}

impl IngesterLimits {
    /// The clone caps, as enforced by the provider's Git capability.
    #[must_use]
    pub fn clone_limits(&self) -> cwn_fs::FsLimits {
        cwn_fs::FsLimits {
            max_files: self.clone_max_files,
            max_total_bytes: self.clone_max_bytes,
        }
    }
}

impl Default for IngesterLimits {
    fn default() -> Self {
        Self {
            rest_max_body_bytes: 1024 * 1024,
            clone_max_files: 100_000,
            clone_max_bytes: 512 * 1024 * 1024,
            artifact_retention_days: 183,
            timeout_secs: 60,
        }
    }
}

/// Build the ingester for a rule type's ingest spec.
///
/// The set is closed: new ingesters extend this match.
///
/// # Errors
///
/// Returns [`IngestError::Config`] when the spec cannot be compiled
/// (e.g. invalid glob patterns).
pub fn build_ingester(
    spec: &IngestSpec,
    provider: Arc<dyn Provider>,
    registry: Arc<BuiltinRegistry>,
    limits: IngesterLimits,
) -> Result<Box<dyn Ingester>, IngestError> {
    Ok(match spec {
        IngestSpec::Rest(spec) => Box::new(RestIngester::new(
            spec.clone(),
            provider,
            limits.rest_max_body_bytes,
        )),
        IngestSpec::Git(spec) => Box::new(GitIngester::new(
            spec.clone(),
            provider,
            limits.clone_limits(),
        )),
        IngestSpec::Diff(spec) => Box::new(DiffIngester::new(
            spec.clone(),
            provider,
            limits.clone_limits(),
        )?),
        IngestSpec::Deps(spec) => Box::new(DepsIngester::new(
            spec.clone(),
            provider,
            limits.clone_limits(),
        )),
        IngestSpec::Artifact(spec) => Box::new(ArtifactIngester::new(
            *spec,
            provider,
            limits.artifact_retention_days,
        )),
        IngestSpec::Builtin(spec) => Box::new(BuiltinIngester::new(spec.clone(), registry)),
    })
}
