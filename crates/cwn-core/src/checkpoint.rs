// SPDX-License-Identifier: MIT OR Apache-2.0

//! Versioned checkpoint envelopes.
//!
//! A checkpoint is a verifiable record of *what* was evaluated: the
//! commit, branch, version, or digest an ingester observed at ingest
//! time. The envelope is append-only — consumers treat older versions as
//! read-only and every new field must be optional.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A versioned checkpoint envelope.
///
/// Included verbatim in the [`EvaluationOutcome`](crate::EvaluationOutcome)
/// and never mutated after being recorded. Adjacently tagged on the
/// wire — `{"version":"v1","checkpoint":{…}}` — so the envelope version
/// never collides with the body's own `version` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "version", content = "checkpoint", rename_all = "snake_case")]
pub enum Checkpoint {
    /// The v1 envelope.
    V1(CheckpointV1),
}

impl Checkpoint {
    /// The envelope timestamp, regardless of version.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::V1(v1) => v1.timestamp,
        }
    }
}

/// The v1 checkpoint body: a timestamp plus any of commit hash, branch,
/// version, and digest.
///
/// Builders are chainable:
///
/// ```
/// use cwn_core::CheckpointV1;
///
/// let cp = CheckpointV1::now()
///     .with_branch("main")
///     .with_commit_hash("0123abcd");
/// assert_eq!(cp.branch.as_deref(), Some("main"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CheckpointV1 {
    /// When the ingester captured this checkpoint.
    pub timestamp: DateTime<Utc>,

    /// Commit hash at the point of ingest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,

    /// Branch that was ingested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    /// Artifact or package version that was ingested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Content digest that was ingested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl CheckpointV1 {
    /// A checkpoint stamped with the current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    /// A checkpoint stamped at `timestamp`.
    #[must_use]
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            commit_hash: None,
            branch: None,
            version: None,
            digest: None,
        }
    }

    /// Set the commit hash.
    #[must_use]
    pub fn with_commit_hash(mut self, commit_hash: impl Into<String>) -> Self {
        self.commit_hash = Some(commit_hash.into());
        self
    }

    /// Set the branch.
    #[must_use]
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Set the version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set the content digest.
    #[must_use]
    pub fn with_digest(mut self, digest: impl Into<String>) -> Self {
        self.digest = Some(digest.into());
        self
    }

    /// Seal the body into a versioned [`Checkpoint`] envelope.
    #[must_use]
    pub fn seal(self) -> Checkpoint {
        Checkpoint::V1(self)
    }
}
