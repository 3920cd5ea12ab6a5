// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! cwn-provider
#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Scriptable in-memory provider for tests and examples.
pub mod mock;
/// reqwest-backed [`RestClient`] implementation.
pub mod rest;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cwn_core::{EntityKind, Properties};
use cwn_fs::{FsLimits, FsView};
use std::collections::HashMap;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by provider capabilities.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// No provider is registered under the requested identifier.
    #[error("provider unavailable: {id}")]
    Unavailable {
        /// The requested provider id.
        id: String,
    },

    /// The provider does not support the requested entity variant.
    #[error("provider does not support entity kind {kind}")]
    UnsupportedEntity {
        /// The unsupported variant.
        kind: EntityKind,
    },

    /// A required identifying property was missing.
    #[error("missing required property: {key}")]
    MissingProperty {
        /// The property key.
        key: String,
    },

    /// The transport failed before a response was produced.
    #[error("transport error: {0}")]
    Transport(String),

    /// Any other provider-side failure.
    #[error("provider error: {0}")]
    Other(String),
}

/// Typed clone failures, mapped by the Git ingester onto the rule
/// verdict taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GitError {
    /// The requested branch does not exist.
    #[error("branch not found: {branch}")]
    BranchNotFound {
        /// The missing branch.
        branch: String,
    },

    /// The repository has no commits.
    #[error("repository is empty")]
    RepositoryEmpty,

    /// The repository exceeds the enforced clone limits.
    #[error("repository too large")]
    RepositoryTooLarge,

    /// Any other clone failure.
    #[error("clone failed: {0}")]
    Other(String),
}

// ---------------------------------------------------------------------------
// REST capability
// ---------------------------------------------------------------------------

/// An HTTP request built by [`RestClient::new_request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// HTTP method (uppercase).
    pub method: String,
    /// Absolute or provider-relative URL.
    pub url: String,
    /// Optional request body.
    pub body: Option<Vec<u8>>,
}

/// An HTTP response as returned by the provider's authenticated client.
///
/// Non-2xx statuses are responses, not transport errors — fallback
/// handling in the REST ingester depends on seeing them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
}

/// One authenticated HTTP request at a time, through the provider.
#[async_trait]
pub trait RestClient: Send + Sync {
    /// Build a request against the provider's API surface.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the method or URL is unusable.
    fn new_request(
        &self,
        method: &str,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> Result<HttpRequest, ProviderError>;

    /// Send the request and await the response.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Transport`] only when no response was
    /// produced at all.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ProviderError>;
}

// ---------------------------------------------------------------------------
// Git capability
// ---------------------------------------------------------------------------

/// The result of cloning one ref into memory.
#[derive(Debug, Clone)]
pub struct GitWorktree {
    /// Read-only view of the cloned tree.
    pub fs: FsView,
    /// Branch that was cloned.
    pub branch: String,
    /// Commit hash at HEAD.
    pub head_commit: String,
}

/// Clone capability. Clones land in a bounded in-memory filesystem; the
/// core never touches host paths.
#[async_trait]
pub trait GitClient: Send + Sync {
    /// Clone `branch` of the repository at `url`, enforcing `limits` on
    /// file count and total bytes while the tree is materialized.
    ///
    /// # Errors
    ///
    /// Typed [`GitError`]s for missing branches, empty repositories, and
    /// clones exceeding `limits` ([`GitError::RepositoryTooLarge`]).
    async fn clone_ref(
        &self,
        url: &str,
        branch: &str,
        limits: FsLimits,
    ) -> Result<GitWorktree, GitError>;
}

// ---------------------------------------------------------------------------
// Forge capability
// ---------------------------------------------------------------------------

/// A changed file of a pull request, as reported by the forge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrFile {
    /// Path of the file within the repository.
    pub filename: String,
    /// Unified-diff patch hunks, when the forge provides them.
    pub patch: Option<String>,
    /// Change status (`added`, `modified`, `removed`, …).
    pub status: String,
}

/// One version of a stored package/artifact, as reported by the forge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactVersionInfo {
    /// Version identifier on the provider side.
    pub id: String,
    /// Tags attached to this version.
    pub tags: Vec<String>,
    /// When this version was created.
    pub created_at: DateTime<Utc>,
    /// Content digest, when known.
    pub digest: Option<String>,
}

/// Forge API capability used by the Diff and Artifact ingesters.
#[async_trait]
pub trait ForgeClient: Send + Sync {
    /// Page through a pull request's changed files.
    ///
    /// Returns the page plus the next page number, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on any forge-side failure.
    async fn list_files(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
        per_page: u32,
        page: u32,
    ) -> Result<(Vec<PrFile>, Option<u32>), ProviderError>;

    /// List the stored versions of a package.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on any forge-side failure.
    async fn get_package_versions(
        &self,
        owner: &str,
        package_name: &str,
    ) -> Result<Vec<ArtifactVersionInfo>, ProviderError>;

    /// Leave a comment on a pull request.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on any forge-side failure.
    async fn create_comment(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
        body: &str,
    ) -> Result<(), ProviderError>;
}

// ---------------------------------------------------------------------------
// OCI capability
// ---------------------------------------------------------------------------

/// OCI registry capability used by the artifact versioner.
#[async_trait]
pub trait OciClient: Send + Sync {
    /// List the tags of an image.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on any registry-side failure.
    async fn list_tags(&self, image: &str) -> Result<Vec<String>, ProviderError>;

    /// Fetch the manifest of `image:tag`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on any registry-side failure.
    async fn get_manifest(
        &self,
        image: &str,
        tag: &str,
    ) -> Result<serde_json::Value, ProviderError>;

    /// Resolve the digest of `image:tag`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on any registry-side failure.
    async fn get_digest(&self, image: &str, tag: &str) -> Result<String, ProviderError>;
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Options for property fetching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Tolerate properties past their refresh interval.
    pub allow_stale: bool,
}

/// The platform source of truth behind the engine.
///
/// Capabilities are optional; ingesters require the subset they need and
/// fail the rule when the provider lacks it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable provider-instance identifier.
    fn id(&self) -> &str;

    /// Whether this provider can track entities of `kind`.
    fn supports_entity(&self, kind: EntityKind) -> bool;

    /// The authenticated REST capability, when available.
    fn rest(&self) -> Option<&dyn RestClient> {
        None
    }

    /// The clone capability, when available.
    fn git(&self) -> Option<&dyn GitClient> {
        None
    }

    /// The forge API capability, when available.
    fn forge(&self) -> Option<&dyn ForgeClient> {
        None
    }

    /// The OCI registry capability, when available.
    fn oci(&self) -> Option<&dyn OciClient> {
        None
    }

    /// Fetch every property of the entity identified by `identifying`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the entity cannot be resolved.
    async fn fetch_all_properties(
        &self,
        identifying: &Properties,
        kind: EntityKind,
        opts: FetchOptions,
    ) -> Result<Properties, ProviderError>;

    /// Derive the display name of an entity from its properties.
    fn entity_name(&self, kind: EntityKind, props: &Properties) -> String;

    /// Register an entity upstream (e.g. install a webhook).
    ///
    /// Returns provider-filled registration properties.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when registration fails.
    async fn register_entity(
        &self,
        kind: EntityKind,
        props: &Properties,
    ) -> Result<Properties, ProviderError>;

    /// Undo a registration (e.g. remove a webhook). Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when deregistration fails.
    async fn deregister_entity(
        &self,
        kind: EntityKind,
        props: &Properties,
    ) -> Result<(), ProviderError>;
}

// ---------------------------------------------------------------------------
// ProviderManager
// ---------------------------------------------------------------------------

/// A typed registry of named [`Provider`] instances.
///
/// Instances are handed out as `Arc`s — one evaluation holds one
/// reference for its duration.
#[derive(Default)]
pub struct ProviderManager {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl ProviderManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under its own id, replacing any previous
    /// entry.
    pub fn register(&mut self, provider: impl Provider + 'static) {
        self.register_arc(Arc::new(provider));
    }

    /// Register an already-shared provider, keeping the caller's handle
    /// alive.
    pub fn register_arc(&mut self, provider: Arc<dyn Provider>) {
        self.providers.insert(provider.id().to_owned(), provider);
    }

    /// Instantiate the provider registered under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Unavailable`] for unknown ids.
    pub fn instantiate(&self, id: &str) -> Result<Arc<dyn Provider>, ProviderError> {
        self.providers
            .get(id)
            .cloned()
            .ok_or_else(|| ProviderError::Unavailable { id: id.to_owned() })
    }

    /// Return a sorted list of registered provider ids.
    #[must_use]
    pub fn list(&self) -> Vec<&str> {
        let mut v: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        v.sort_unstable();
        v
    }
}
