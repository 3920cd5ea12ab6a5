// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dependency model and manifest parsers.
//!
//! One parser pair per supported ecosystem: a full-file parser for
//! cloned manifests and a `+`-hunk parser for pull-request patches.
//! Output ordering is always lexicographic by (name, version, hashes) so
//! diffs are reproducible.

/// go.mod parsing.
pub mod gomod;
/// package-lock.json parsing.
pub mod npm;
/// requirements.txt parsing.
pub mod pypi;

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::warn;

/// Ecosystem tag for npm dependencies.
pub const ECOSYSTEM_NPM: &str = "npm";
/// Ecosystem tag for Go dependencies.
pub const ECOSYSTEM_GO: &str = "go";
/// Ecosystem tag for PyPI dependencies.
pub const ECOSYSTEM_PYPI: &str = "pypi";

/// One dependency extracted from a manifest or lock file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Ecosystem tag (`npm`, `go`, `pypi`).
    pub ecosystem: String,
    /// Package name as written in the manifest.
    pub name: String,
    /// Version, normalized per ecosystem; empty when unpinned.
    pub version: String,
    /// Content hashes keyed by algorithm; `BTreeMap` keeps the
    /// algorithm ordering deterministic.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub hashes: BTreeMap<String, String>,
    /// The file this dependency was read from.
    pub source_file: String,
}

impl Dependency {
    /// Construct a dependency with no hashes.
    #[must_use]
    pub fn new(
        ecosystem: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
        source_file: impl Into<String>,
    ) -> Self {
        Self {
            ecosystem: ecosystem.into(),
            name: name.into(),
            version: version.into(),
            hashes: BTreeMap::new(),
            source_file: source_file.into(),
        }
    }
}

impl PartialOrd for Dependency {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Dependency {
    fn cmp(&self, other: &Self) -> Ordering {
        // Output ordering contract: (name, version, hashes) first.
        self.name
            .cmp(&other.name)
            .then_with(|| self.version.cmp(&other.version))
            .then_with(|| self.hashes.cmp(&other.hashes))
            .then_with(|| self.ecosystem.cmp(&other.ecosystem))
            .then_with(|| self.source_file.cmp(&other.source_file))
    }
}

/// Sort dependencies into the canonical output order.
pub fn sort_dependencies(deps: &mut [Dependency]) {
    deps.sort();
}

/// Parse a complete dependency file.
#[must_use]
pub fn parse_depfile(ecosystem: &str, path: &str, contents: &str) -> Vec<Dependency> {
    match ecosystem {
        ECOSYSTEM_NPM => npm::parse_lockfile(path, contents),
        ECOSYSTEM_GO => gomod::parse_gomod(path, contents),
        ECOSYSTEM_PYPI => pypi::parse_requirements(path, contents),
        other => {
            warn!(target: "cwn.ingest", ecosystem = other, "unsupported ecosystem");
            Vec::new()
        }
    }
}

/// Parse the `+` hunks of a unified-diff patch of a dependency file.
#[must_use]
pub fn parse_patch_added(ecosystem: &str, path: &str, patch: &str) -> Vec<Dependency> {
    match ecosystem {
        ECOSYSTEM_NPM => npm::parse_patch(path, patch),
        ECOSYSTEM_GO => gomod::parse_patch(path, patch),
        ECOSYSTEM_PYPI => pypi::parse_patch(path, patch),
        other => {
            warn!(target: "cwn.ingest", ecosystem = other, "unsupported ecosystem");
            Vec::new()
        }
    }
}

/// The added lines of a unified-diff patch, `+` prefix stripped.
pub(crate) fn added_lines(patch: &str) -> Vec<&str> {
    patch
        .lines()
        .filter(|l| l.starts_with('+') && !l.starts_with("+++"))
        .map(|l| &l[1..])
        .collect()
}
