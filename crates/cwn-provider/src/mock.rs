// SPDX-License-Identifier: MIT OR Apache-2.0

//! A scriptable in-memory [`Provider`] for tests and examples.
//!
//! Script the upstream world — HTTP responses, clonable worktrees, PR
//! files, package versions — then hand the provider to the engine and
//! assert on what it was asked to do.

use crate::{
    ArtifactVersionInfo, FetchOptions, ForgeClient, GitClient, GitError, GitWorktree, HttpRequest,
    HttpResponse, OciClient, PrFile, Provider, ProviderError, RestClient,
};
use async_trait::async_trait;
use cwn_core::{EntityKind, Properties};
use cwn_fs::{FsLimits, FsView};
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

/// Scriptable provider: every capability reads from canned state.
pub struct MockProvider {
    id: String,
    supported: BTreeSet<EntityKind>,
    responses: Mutex<HashMap<(String, String), HttpResponse>>,
    worktrees: HashMap<(String, String), GitWorktree>,
    clone_errors: HashMap<(String, String), GitError>,
    pr_files: HashMap<(String, String, u64), Vec<PrFile>>,
    package_versions: HashMap<(String, String), Vec<ArtifactVersionInfo>>,
    properties: HashMap<EntityKind, Properties>,
    oci_tags: HashMap<String, Vec<String>>,
    oci_manifests: HashMap<(String, String), serde_json::Value>,
    requests_seen: Mutex<Vec<HttpRequest>>,
    comments: Mutex<Vec<(String, String, u64, String)>>,
    registered: Mutex<Vec<EntityKind>>,
    deregistered: Mutex<Vec<EntityKind>>,
    fail_register: bool,
}

impl MockProvider {
    /// A provider supporting every entity kind.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            supported: [
                EntityKind::Repository,
                EntityKind::PullRequest,
                EntityKind::Artifact,
                EntityKind::ArtifactVersion,
                EntityKind::Release,
                EntityKind::Dependency,
                EntityKind::BuildEnvironment,
            ]
            .into_iter()
            .collect(),
            responses: Mutex::new(HashMap::new()),
            worktrees: HashMap::new(),
            clone_errors: HashMap::new(),
            pr_files: HashMap::new(),
            package_versions: HashMap::new(),
            properties: HashMap::new(),
            oci_tags: HashMap::new(),
            oci_manifests: HashMap::new(),
            requests_seen: Mutex::new(Vec::new()),
            comments: Mutex::new(Vec::new()),
            registered: Mutex::new(Vec::new()),
            deregistered: Mutex::new(Vec::new()),
            fail_register: false,
        }
    }

    /// Restrict the supported entity kinds.
    #[must_use]
    pub fn supporting(mut self, kinds: impl IntoIterator<Item = EntityKind>) -> Self {
        self.supported = kinds.into_iter().collect();
        self
    }

    /// Can a canned HTTP response for `(method, url)`.
    #[must_use]
    pub fn with_response(
        self,
        method: &str,
        url: &str,
        status: u16,
        body: impl Into<Vec<u8>>,
    ) -> Self {
        self.responses.lock().expect("responses lock").insert(
            (method.to_uppercase(), url.to_owned()),
            HttpResponse {
                status,
                body: body.into(),
            },
        );
        self
    }

    /// Can a clonable worktree for `(url, branch)`.
    #[must_use]
    pub fn with_worktree(
        mut self,
        url: &str,
        branch: &str,
        fs: FsView,
        head_commit: &str,
    ) -> Self {
        self.worktrees.insert(
            (url.to_owned(), branch.to_owned()),
            GitWorktree {
                fs,
                branch: branch.to_owned(),
                head_commit: head_commit.to_owned(),
            },
        );
        self
    }

    /// Can a typed clone failure for `(url, branch)`.
    #[must_use]
    pub fn with_clone_error(mut self, url: &str, branch: &str, error: GitError) -> Self {
        self.clone_errors
            .insert((url.to_owned(), branch.to_owned()), error);
        self
    }

    /// Can the changed files of a pull request.
    #[must_use]
    pub fn with_pr_files(mut self, owner: &str, repo: &str, pr: u64, files: Vec<PrFile>) -> Self {
        self.pr_files
            .insert((owner.to_owned(), repo.to_owned(), pr), files);
        self
    }

    /// Can the stored versions of a package.
    #[must_use]
    pub fn with_package_versions(
        mut self,
        owner: &str,
        package: &str,
        versions: Vec<ArtifactVersionInfo>,
    ) -> Self {
        self.package_versions
            .insert((owner.to_owned(), package.to_owned()), versions);
        self
    }

    /// Can the tag list of an OCI image.
    #[must_use]
    pub fn with_oci_tags(mut self, image: &str, tags: Vec<String>) -> Self {
        self.oci_tags.insert(image.to_owned(), tags);
        self
    }

    /// Can the manifest of `image:tag`.
    #[must_use]
    pub fn with_oci_manifest(mut self, image: &str, tag: &str, manifest: serde_json::Value) -> Self {
        self.oci_manifests
            .insert((image.to_owned(), tag.to_owned()), manifest);
        self
    }

    /// Can the properties returned by [`Provider::fetch_all_properties`]
    /// for `kind`.
    #[must_use]
    pub fn with_properties(mut self, kind: EntityKind, properties: Properties) -> Self {
        self.properties.insert(kind, properties);
        self
    }

    /// Make [`Provider::register_entity`] fail.
    #[must_use]
    pub fn failing_registration(mut self) -> Self {
        self.fail_register = true;
        self
    }

    /// Every HTTP request the engine issued, in order.
    #[must_use]
    pub fn requests_seen(&self) -> Vec<HttpRequest> {
        self.requests_seen.lock().expect("requests lock").clone()
    }

    /// Every PR comment created, as `(owner, repo, pr, body)`.
    #[must_use]
    pub fn comments(&self) -> Vec<(String, String, u64, String)> {
        self.comments.lock().expect("comments lock").clone()
    }

    /// Entity kinds passed to [`Provider::register_entity`].
    #[must_use]
    pub fn registered(&self) -> Vec<EntityKind> {
        self.registered.lock().expect("registered lock").clone()
    }

    /// Entity kinds passed to [`Provider::deregister_entity`].
    #[must_use]
    pub fn deregistered(&self) -> Vec<EntityKind> {
        self.deregistered.lock().expect("deregistered lock").clone()
    }
}

#[async_trait]
impl RestClient for MockProvider {
    fn new_request(
        &self,
        method: &str,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> Result<HttpRequest, ProviderError> {
        Ok(HttpRequest {
            method: method.to_uppercase(),
            url: url.to_owned(),
            body,
        })
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ProviderError> {
        self.requests_seen
            .lock()
            .expect("requests lock")
            .push(request.clone());
        let responses = self.responses.lock().expect("responses lock");
        Ok(responses
            .get(&(request.method.clone(), request.url.clone()))
            .cloned()
            .unwrap_or(HttpResponse {
                status: 404,
                body: b"{\"message\":\"Not Found\"}".to_vec(),
            }))
    }
}

#[async_trait]
impl GitClient for MockProvider {
    async fn clone_ref(
        &self,
        url: &str,
        branch: &str,
        limits: FsLimits,
    ) -> Result<GitWorktree, GitError> {
        let key = (url.to_owned(), branch.to_owned());
        if let Some(err) = self.clone_errors.get(&key) {
            return Err(err.clone());
        }
        let worktree = self
            .worktrees
            .get(&key)
            .cloned()
            .ok_or_else(|| GitError::BranchNotFound {
                branch: branch.to_owned(),
            })?;
        // A real clone aborts mid-materialization; the canned tree is
        // checked after the fact to the same effect.
        if !worktree.fs.within(&limits) {
            return Err(GitError::RepositoryTooLarge);
        }
        Ok(worktree)
    }
}

#[async_trait]
impl ForgeClient for MockProvider {
    async fn list_files(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
        per_page: u32,
        page: u32,
    ) -> Result<(Vec<PrFile>, Option<u32>), ProviderError> {
        let all = self
            .pr_files
            .get(&(owner.to_owned(), repo.to_owned(), pr_number))
            .cloned()
            .unwrap_or_default();

        // Pages are 1-based, like the forge API we model.
        let per_page = per_page.max(1) as usize;
        let page = page.max(1) as usize;
        let start = (page - 1) * per_page;
        let slice: Vec<PrFile> = all.iter().skip(start).take(per_page).cloned().collect();
        let next = if start + per_page < all.len() {
            Some((page + 1) as u32)
        } else {
            None
        };
        Ok((slice, next))
    }

    async fn get_package_versions(
        &self,
        owner: &str,
        package_name: &str,
    ) -> Result<Vec<ArtifactVersionInfo>, ProviderError> {
        Ok(self
            .package_versions
            .get(&(owner.to_owned(), package_name.to_owned()))
            .cloned()
            .unwrap_or_default())
    }

    async fn create_comment(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
        body: &str,
    ) -> Result<(), ProviderError> {
        self.comments.lock().expect("comments lock").push((
            owner.to_owned(),
            repo.to_owned(),
            pr_number,
            body.to_owned(),
        ));
        Ok(())
    }
}

#[async_trait]
impl OciClient for MockProvider {
    async fn list_tags(&self, image: &str) -> Result<Vec<String>, ProviderError> {
        Ok(self.oci_tags.get(image).cloned().unwrap_or_default())
    }

    async fn get_manifest(
        &self,
        image: &str,
        tag: &str,
    ) -> Result<serde_json::Value, ProviderError> {
        Ok(self
            .oci_manifests
            .get(&(image.to_owned(), tag.to_owned()))
            .cloned()
            .unwrap_or_else(|| serde_json::json!({})))
    }

    async fn get_digest(&self, image: &str, tag: &str) -> Result<String, ProviderError> {
        let digest = cwn_core::sha512_hex(format!("{image}:{tag}").as_bytes());
        Ok(format!("sha256:{}", &digest[..32]))
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn supports_entity(&self, kind: EntityKind) -> bool {
        self.supported.contains(&kind)
    }

    fn rest(&self) -> Option<&dyn RestClient> {
        Some(self)
    }

    fn git(&self) -> Option<&dyn GitClient> {
        Some(self)
    }

    fn forge(&self) -> Option<&dyn ForgeClient> {
        Some(self)
    }

    fn oci(&self) -> Option<&dyn OciClient> {
        Some(self)
    }

    async fn fetch_all_properties(
        &self,
        identifying: &Properties,
        kind: EntityKind,
        _opts: FetchOptions,
    ) -> Result<Properties, ProviderError> {
        if !self.supports_entity(kind) {
            return Err(ProviderError::UnsupportedEntity { kind });
        }
        Ok(self
            .properties
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| identifying.clone()))
    }

    fn entity_name(&self, _kind: EntityKind, props: &Properties) -> String {
        props
            .str_of("name")
            .or_else(|| props.str_of(cwn_core::PROP_UPSTREAM_ID))
            .unwrap_or("unknown")
            .to_owned()
    }

    async fn register_entity(
        &self,
        kind: EntityKind,
        props: &Properties,
    ) -> Result<Properties, ProviderError> {
        if self.fail_register {
            return Err(ProviderError::Other("registration refused".to_owned()));
        }
        self.registered.lock().expect("registered lock").push(kind);
        let mut out = props.clone();
        out.insert("webhook_id", 4242i64);
        Ok(out)
    }

    async fn deregister_entity(
        &self,
        kind: EntityKind,
        _props: &Properties,
    ) -> Result<(), ProviderError> {
        self.deregistered
            .lock()
            .expect("deregistered lock")
            .push(kind);
        Ok(())
    }
}
