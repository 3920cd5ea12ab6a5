// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Diff ingester.
//!
//! Produces the new/updated dependencies of a pull request, either by
//! paging through the forge's changed-files API and parsing `+` hunks,
//! or by cloning base and target refs and comparing full extractions.

use crate::deps::{self, sort_dependencies, Dependency};
use crate::git::{map_clone_error, resolve_clone_url};
use crate::{IngestError, IngestResult, Ingester};
use async_trait::async_trait;
use cwn_core::{CheckpointV1, DepFilter, DiffIngestSpec, DiffMode, Entity};
use cwn_fs::{FsLimits, FsView};
use cwn_provider::Provider;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Page size used against the forge's changed-files API.
const PR_FILES_PER_PAGE: u32 = 30;

/// The Diff ingester: dependency difference of a pull request.
pub struct DiffIngester {
    spec: DiffIngestSpec,
    provider: Arc<dyn Provider>,
    limits: FsLimits,
    matchers: Vec<(String, GlobSet)>,
}

impl DiffIngester {
    /// Create a Diff ingester, compiling the per-ecosystem globs;
    /// branch-compare clones are bounded by `limits`.
    ///
    /// # Errors
    ///
    /// [`IngestError::Config`] when a glob pattern does not compile.
    pub fn new(
        spec: DiffIngestSpec,
        provider: Arc<dyn Provider>,
        limits: FsLimits,
    ) -> Result<Self, IngestError> {
        let mut matchers = Vec::new();
        for eco in &spec.ecosystems {
            let glob = Glob::new(&eco.depfile)
                .map_err(|e| IngestError::Config(format!("bad depfile glob: {e}")))?;
            let set = GlobSetBuilder::new()
                .add(glob)
                .build()
                .map_err(|e| IngestError::Config(format!("bad depfile glob: {e}")))?;
            matchers.push((eco.ecosystem.clone(), set));
        }
        Ok(Self {
            spec,
            provider,
            limits,
            matchers,
        })
    }

    /// The ecosystem whose glob matches `path`, if any.
    fn ecosystem_for(&self, path: &str) -> Option<&str> {
        self.matchers
            .iter()
            .find(|(_, set)| set.is_match(path))
            .map(|(eco, _)| eco.as_str())
    }

    async fn ingest_pr_files(
        &self,
        entity: &Entity,
    ) -> Result<Vec<Dependency>, IngestError> {
        let owner = require_property(entity, "repo_owner")?;
        let repo = require_property(entity, "repo_name")?;
        let pr_number = entity
            .properties
            .value_of("pr_number")
            .and_then(cwn_core::PropertyValue::as_int)
            .ok_or_else(|| IngestError::Config("entity has no pr_number property".to_owned()))?;
        let pr_number = u64::try_from(pr_number)
            .map_err(|_| IngestError::Config("pr_number is negative".to_owned()))?;

        let forge = self
            .provider
            .forge()
            .ok_or_else(|| IngestError::Config("provider has no forge capability".to_owned()))?;

        let mut dependencies = Vec::new();
        let mut page = 1u32;
        loop {
            let (files, next) = forge
                .list_files(&owner, &repo, pr_number, PR_FILES_PER_PAGE, page)
                .await?;
            for file in &files {
                if file.status == "removed" {
                    continue;
                }
                let Some(ecosystem) = self.ecosystem_for(&file.filename) else {
                    continue;
                };
                let Some(patch) = &file.patch else { continue };
                dependencies.extend(deps::parse_patch_added(ecosystem, &file.filename, patch));
            }
            match next {
                Some(n) => page = n,
                None => break,
            }
        }
        Ok(dependencies)
    }

    async fn ingest_branch_compare(
        &self,
        entity: &Entity,
        params: &serde_json::Value,
    ) -> Result<(Vec<Dependency>, String), IngestError> {
        let base_branch = require_property(entity, "base_branch")?;
        let target_branch = require_property(entity, "target_branch")?;

        // Both refs are fixed by the pull request — rule params must not
        // redirect them.
        let url = resolve_clone_url(entity, params)?;
        let git = self
            .provider
            .git()
            .ok_or_else(|| IngestError::Config("provider has no Git capability".to_owned()))?;
        let base = git
            .clone_ref(&url, &base_branch, self.limits)
            .await
            .map_err(map_clone_error)?;
        let target = git
            .clone_ref(&url, &target_branch, self.limits)
            .await
            .map_err(map_clone_error)?;

        let base_deps = self.extract_all(&base.fs);
        let target_deps = self.extract_all(&target.fs);
        debug!(
            target: "cwn.ingest",
            base = base_deps.len(),
            target = target_deps.len(),
            "comparing dependency sets"
        );

        Ok((
            apply_filter(self.spec.filter, &base_deps, target_deps),
            target.head_commit,
        ))
    }

    /// Every dependency in the view, across all configured ecosystems.
    fn extract_all(&self, view: &FsView) -> Vec<Dependency> {
        let mut out = Vec::new();
        for (ecosystem, set) in &self.matchers {
            for path in view.matching(set) {
                if let Some(contents) = view.read_to_string(path) {
                    out.extend(deps::parse_depfile(ecosystem, path, &contents));
                }
            }
        }
        out
    }
}

#[async_trait]
impl Ingester for DiffIngester {
    async fn ingest(
        &self,
        entity: &Entity,
        params: &serde_json::Value,
    ) -> Result<IngestResult, IngestError> {
        let (mut dependencies, checkpoint) = match self.spec.mode {
            DiffMode::PrFiles => (
                self.ingest_pr_files(entity).await?,
                CheckpointV1::now().seal(),
            ),
            DiffMode::BranchCompare => {
                let (dependencies, head_commit) =
                    self.ingest_branch_compare(entity, params).await?;
                (
                    dependencies,
                    CheckpointV1::now().with_commit_hash(head_commit).seal(),
                )
            }
        };

        sort_dependencies(&mut dependencies);
        Ok(IngestResult {
            object: Some(serde_json::json!({ "dependencies": dependencies })),
            fs: None,
            checkpoint: Some(checkpoint),
        })
    }

    fn ingest_type(&self) -> &'static str {
        "diff"
    }

    fn config(&self) -> Option<serde_json::Value> {
        serde_json::to_value(&self.spec).ok()
    }
}

/// Keep the target-side dependencies selected by `filter`.
#[must_use]
pub fn apply_filter(
    filter: DepFilter,
    base: &[Dependency],
    target: Vec<Dependency>,
) -> Vec<Dependency> {
    match filter {
        DepFilter::All => target,
        DepFilter::New => {
            // Name-only comparison, per ecosystem.
            let base_names: BTreeSet<(&str, &str)> = base
                .iter()
                .map(|d| (d.ecosystem.as_str(), d.name.as_str()))
                .collect();
            target
                .into_iter()
                .filter(|d| !base_names.contains(&(d.ecosystem.as_str(), d.name.as_str())))
                .collect()
        }
        DepFilter::NewAndUpdated => {
            // (name, version, hashes) comparison; the hash map is
            // already algorithm-ordered.
            let base_keys: BTreeSet<(String, String, Vec<(String, String)>)> = base
                .iter()
                .map(|d| {
                    (
                        d.name.clone(),
                        d.version.clone(),
                        d.hashes.clone().into_iter().collect(),
                    )
                })
                .collect();
            target
                .into_iter()
                .filter(|d| {
                    !base_keys.contains(&(
                        d.name.clone(),
                        d.version.clone(),
                        d.hashes.clone().into_iter().collect(),
                    ))
                })
                .collect()
        }
    }
}

fn require_property(entity: &Entity, key: &str) -> Result<String, IngestError> {
    entity
        .properties
        .str_of(key)
        .map(str::to_owned)
        .ok_or_else(|| IngestError::Config(format!("entity has no {key} property")))
}
