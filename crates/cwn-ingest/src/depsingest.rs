// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Deps ingester.
//!
//! Clones a branch and runs a filesystem extractor over the in-memory
//! worktree, producing an SBOM-style node list. The extractor targets a
//! Linux OS profile and may consult the network, but never the host
//! filesystem — it only sees the bounded view.

use crate::deps::{self, sort_dependencies, Dependency};
use crate::git::clone_resolved;
use crate::{IngestError, IngestResult, Ingester};
use async_trait::async_trait;
use cwn_core::{CheckpointV1, DepsIngestSpec, Entity};
use cwn_fs::{FsLimits, FsView};
use cwn_provider::Provider;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Extracts dependencies from a cloned filesystem view.
pub trait DependencyExtractor: Send + Sync {
    /// Scan the view and return every dependency found.
    fn extract(&self, view: &FsView) -> Vec<Dependency>;
}

/// Default extractor: well-known manifest names per ecosystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestExtractor;

impl DependencyExtractor for ManifestExtractor {
    fn extract(&self, view: &FsView) -> Vec<Dependency> {
        let mut out = Vec::new();
        for path in view.paths() {
            let file = path.rsplit('/').next().unwrap_or(path);
            let ecosystem = match file {
                "package-lock.json" => deps::ECOSYSTEM_NPM,
                "go.mod" => deps::ECOSYSTEM_GO,
                _ if file.starts_with("requirements") && file.ends_with(".txt") => {
                    deps::ECOSYSTEM_PYPI
                }
                _ => continue,
            };
            if let Some(contents) = view.read_to_string(path) {
                out.extend(deps::parse_depfile(ecosystem, path, &contents));
            }
        }
        out
    }
}

/// One SBOM node handed to the evaluator.
#[derive(Debug, Clone, Serialize)]
pub struct SbomNode {
    /// Node type; always `PACKAGE`.
    #[serde(rename = "type")]
    pub node_type: &'static str,
    /// Fresh node identifier.
    pub id: Uuid,
    /// Package name.
    pub name: String,
    /// Package version.
    pub version: String,
    /// PURL-style identifier.
    pub purl: String,
    /// The manifest the package was read from.
    pub source_file: String,
}

impl SbomNode {
    /// Build a node from an extracted dependency.
    #[must_use]
    pub fn from_dependency(dep: &Dependency) -> Self {
        let purl_type = match dep.ecosystem.as_str() {
            deps::ECOSYSTEM_GO => "golang",
            other => other,
        };
        let purl = if dep.version.is_empty() {
            format!("pkg:{purl_type}/{}", dep.name)
        } else {
            format!("pkg:{purl_type}/{}@{}", dep.name, dep.version)
        };
        Self {
            node_type: "PACKAGE",
            id: Uuid::new_v4(),
            name: dep.name.clone(),
            version: dep.version.clone(),
            purl,
            source_file: dep.source_file.clone(),
        }
    }
}

/// The Deps ingester: a full dependency extraction of one branch.
pub struct DepsIngester {
    spec: DepsIngestSpec,
    provider: Arc<dyn Provider>,
    limits: FsLimits,
    extractor: Box<dyn DependencyExtractor>,
}

impl DepsIngester {
    /// Create a Deps ingester with the default manifest extractor,
    /// clones bounded by `limits`.
    #[must_use]
    pub fn new(spec: DepsIngestSpec, provider: Arc<dyn Provider>, limits: FsLimits) -> Self {
        Self {
            spec,
            provider,
            limits,
            extractor: Box::new(ManifestExtractor),
        }
    }

    /// Replace the filesystem extractor.
    #[must_use]
    pub fn with_extractor(mut self, extractor: impl DependencyExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }
}

#[async_trait]
impl Ingester for DepsIngester {
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

        let mut dependencies = self.extractor.extract(&worktree.fs);
        sort_dependencies(&mut dependencies);
        let nodes: Vec<SbomNode> = dependencies.iter().map(SbomNode::from_dependency).collect();

        let checkpoint = CheckpointV1::now()
            .with_branch(&worktree.branch)
            .with_commit_hash(&worktree.head_commit)
            .seal();

        Ok(IngestResult {
            object: Some(serde_json::json!({ "nodes": nodes })),
            fs: Some(worktree.fs),
            checkpoint: Some(checkpoint),
        })
    }

    fn ingest_type(&self) -> &'static str {
        "deps"
    }

    fn config(&self) -> Option<serde_json::Value> {
        serde_json::to_value(&self.spec).ok()
    }
}
