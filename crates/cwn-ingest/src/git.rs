// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Git ingester.
//!
//! Clones one branch through the provider into a bounded in-memory
//! worktree — evaluators never see host paths. Typed clone errors map
//! onto the rule verdict: a missing branch fails the rule, an empty
//! repository skips it.

use crate::{IngestError, IngestResult, Ingester};
use async_trait::async_trait;
use cwn_core::{CheckpointV1, Entity, GitIngestSpec, PROP_CLONE_URL, PROP_DEFAULT_BRANCH};
use cwn_fs::FsLimits;
use cwn_provider::{GitError, GitWorktree, Provider};
use std::sync::Arc;
use tracing::debug;

/// Resolve the branch to clone.
///
/// Order: rule-instance params, then rule-type config, then the entity's
/// default branch, then `"main"`.
#[must_use]
pub fn resolve_branch(
    entity: &Entity,
    params: &serde_json::Value,
    config_branch: Option<&str>,
) -> String {
    params
        .get("branch")
        .and_then(serde_json::Value::as_str)
        .or(config_branch)
        .or_else(|| entity.properties.str_of(PROP_DEFAULT_BRANCH))
        .unwrap_or("main")
        .to_owned()
}

/// Resolve the clone URL: rule-instance params, then the entity.
pub(crate) fn resolve_clone_url(
    entity: &Entity,
    params: &serde_json::Value,
) -> Result<String, IngestError> {
    params
        .get("clone_url")
        .and_then(serde_json::Value::as_str)
        .or_else(|| entity.properties.str_of(PROP_CLONE_URL))
        .map(str::to_owned)
        .ok_or_else(|| IngestError::Config("entity has no clone_url property".to_owned()))
}

/// Map a typed clone failure onto the rule verdict.
pub(crate) fn map_clone_error(error: GitError) -> IngestError {
    match error {
        GitError::BranchNotFound { branch } => {
            IngestError::Failed(format!("branch not found: {branch}"))
        }
        GitError::RepositoryEmpty => IngestError::Skipped("repository is empty".to_owned()),
        GitError::RepositoryTooLarge => IngestError::Failed("repository too large".to_owned()),
        GitError::Other(detail) => IngestError::Other(format!("clone failed: {detail}")),
    }
}

/// Clone through the provider, fully resolved, enforcing `limits`.
pub(crate) async fn clone_resolved(
    provider: &Arc<dyn Provider>,
    entity: &Entity,
    params: &serde_json::Value,
    config_branch: Option<&str>,
    limits: FsLimits,
) -> Result<GitWorktree, IngestError> {
    let url = resolve_clone_url(entity, params)?;
    let branch = resolve_branch(entity, params, config_branch);
    let git = provider
        .git()
        .ok_or_else(|| IngestError::Config("provider has no Git capability".to_owned()))?;
    debug!(target: "cwn.ingest", %url, %branch, "cloning");
    git.clone_ref(&url, &branch, limits)
        .await
        .map_err(map_clone_error)
}

/// The Git ingester: a read-only worktree plus a branch/commit
/// checkpoint.
pub struct GitIngester {
    spec: GitIngestSpec,
    provider: Arc<dyn Provider>,
    limits: FsLimits,
}

impl GitIngester {
    /// Create a Git ingester whose clones are bounded by `limits`.
    #[must_use]
    pub fn new(spec: GitIngestSpec, provider: Arc<dyn Provider>, limits: FsLimits) -> Self {
        Self {
            spec,
            provider,
            limits,
        }
    }
}

#[async_trait]
impl Ingester for GitIngester {
    async fn ingest(
        &self,
        entity: &Entity,
        params: &serde_json::Value,
    ) -> Result<IngestResult, IngestError> {
        let worktree = clone_resolved(
            &self.provider,
            entity,
            params,
            self.spec.branch.as_deref(),
            self.limits,
        )
        .await?;

        let checkpoint = CheckpointV1::now()
            .with_branch(&worktree.branch)
            .with_commit_hash(&worktree.head_commit)
            .seal();

        Ok(IngestResult {
            object: None,
            fs: Some(worktree.fs),
            checkpoint: Some(checkpoint),
        })
    }

    fn ingest_type(&self) -> &'static str {
        "git"
    }

    fn config(&self) -> Option<serde_json::Value> {
        serde_json::to_value(&self.spec).ok()
    }
}
