// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Artifact ingester.
//!
//! Filters an artifact's versions by tag matcher, retention window, and
//! signature-object tags, then runs each survivor through a signature
//! verifier. The retention cutoff is computed per call against the
//! current wall clock.

use crate::{IngestError, IngestResult, Ingester};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use cwn_core::{ArtifactIngestSpec, CheckpointV1, Entity};
use cwn_provider::{ArtifactVersionInfo, Provider};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

// ---------------------------------------------------------------------------
// Params + tag matching
// ---------------------------------------------------------------------------

/// Rule-instance parameters accepted by the artifact ingester.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArtifactParams {
    /// Artifact name; defaults to the entity's `name` property.
    #[serde(default)]
    pub name: Option<String>,
    /// Versions must carry every listed tag. Exclusive with
    /// `tag_regex`.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Versions must carry a tag matching this pattern. Exclusive with
    /// `tags`.
    #[serde(default)]
    pub tag_regex: Option<String>,
}

/// Compiled tag predicate: an exclusive-or of a tag list and a regex.
#[derive(Debug)]
pub enum TagMatcher {
    /// Match every version.
    All,
    /// Every listed tag must be present.
    Tags(Vec<String>),
    /// Some tag must match the pattern.
    Pattern(Regex),
}

impl TagMatcher {
    /// Build the matcher from rule params.
    ///
    /// # Errors
    ///
    /// [`IngestError::Config`] when both `tags` and `tag_regex` are
    /// supplied, or the regex does not compile.
    pub fn from_params(params: &ArtifactParams) -> Result<Self, IngestError> {
        match (&params.tags[..], &params.tag_regex) {
            ([], None) => Ok(Self::All),
            (tags, None) => Ok(Self::Tags(tags.to_vec())),
            ([], Some(pattern)) => Regex::new(pattern)
                .map(Self::Pattern)
                .map_err(|e| IngestError::Config(format!("bad tag_regex: {e}"))),
            (_, Some(_)) => Err(IngestError::Config(
                "tags and tag_regex are mutually exclusive".to_owned(),
            )),
        }
    }

    /// Whether a version's tags satisfy this matcher.
    #[must_use]
    pub fn matches(&self, tags: &[String]) -> bool {
        match self {
            Self::All => true,
            Self::Tags(required) => required.iter().all(|t| tags.contains(t)),
            Self::Pattern(regex) => tags.iter().any(|t| regex.is_match(t)),
        }
    }
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Raw evidence reported by a signature verifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureEvidence {
    /// A signature object exists for the version.
    pub is_signed: bool,
    /// The signature verified against the configured trust root.
    pub is_verified: bool,
    /// Source repository recorded in the certificate.
    pub repository: Option<String>,
    /// Branch recorded in the certificate.
    pub branch: Option<String>,
    /// Certificate issuer.
    pub cert_issuer: Option<String>,
    /// Build runner environment recorded in the certificate.
    pub runner_environment: Option<String>,
    /// `BuildSignerURI` certificate extension.
    pub build_signer_uri: Option<String>,
    /// Subject Alternative Name of the certificate.
    pub subject_alternative_name: Option<String>,
}

/// Verifies one artifact version's signature.
#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    /// Verify `version` of `image`.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError`] when verification cannot be attempted at
    /// all; an unverifiable signature is evidence, not an error.
    async fn verify(
        &self,
        image: &str,
        version: &ArtifactVersionInfo,
    ) -> Result<SignatureEvidence, IngestError>;
}

/// Default verifier: detect a cosign-style `.sig` companion tag via the
/// provider's OCI capability. Full certificate verification is a
/// provider-SDK concern; this reports presence only.
struct SigTagVerifier {
    provider: Arc<dyn Provider>,
}

#[async_trait]
impl SignatureVerifier for SigTagVerifier {
    async fn verify(
        &self,
        image: &str,
        version: &ArtifactVersionInfo,
    ) -> Result<SignatureEvidence, IngestError> {
        let oci = self
            .provider
            .oci()
            .ok_or_else(|| IngestError::Config("provider has no OCI capability".to_owned()))?;
        let tags = oci.list_tags(image).await?;
        let needle = version
            .digest
            .as_deref()
            .unwrap_or(&version.id)
            .replace(':', "-");
        let is_signed = tags.iter().any(|t| t == &format!("{needle}.sig"));
        Ok(SignatureEvidence {
            is_signed,
            ..SignatureEvidence::default()
        })
    }
}

/// Signer identity: `BuildSignerURI` trimmed at `@`, falling back to the
/// Subject Alternative Name.
#[must_use]
pub fn signer_identity(evidence: &SignatureEvidence) -> Option<String> {
    if let Some(uri) = &evidence.build_signer_uri {
        let trimmed = uri.split('@').next().unwrap_or(uri);
        return Some(trimmed.to_owned());
    }
    evidence.subject_alternative_name.clone()
}

/// Per-version verification output handed to the evaluator.
#[derive(Debug, Clone, Serialize)]
pub struct VersionVerification {
    /// A signature object exists.
    pub is_signed: bool,
    /// The signature verified.
    pub is_verified: bool,
    /// Source repository, when recorded.
    pub repository: Option<String>,
    /// Branch, when recorded.
    pub branch: Option<String>,
    /// Derived signer identity.
    pub signer_identity: Option<String>,
    /// Build runner environment, when recorded.
    pub runner_environment: Option<String>,
    /// Certificate issuer, when recorded.
    pub cert_issuer: Option<String>,
}

impl VersionVerification {
    fn from_evidence(evidence: &SignatureEvidence) -> Self {
        Self {
            is_signed: evidence.is_signed,
            is_verified: evidence.is_verified,
            repository: evidence.repository.clone(),
            branch: evidence.branch.clone(),
            signer_identity: signer_identity(evidence),
            runner_environment: evidence.runner_environment.clone(),
            cert_issuer: evidence.cert_issuer.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Ingester
// ---------------------------------------------------------------------------

/// The Artifact ingester.
pub struct ArtifactIngester {
    spec: ArtifactIngestSpec,
    provider: Arc<dyn Provider>,
    retention_days: u32,
    verifier: Arc<dyn SignatureVerifier>,
}

impl ArtifactIngester {
    /// Create an artifact ingester with the default `.sig`-tag verifier.
    #[must_use]
    pub fn new(spec: ArtifactIngestSpec, provider: Arc<dyn Provider>, retention_days: u32) -> Self {
        let verifier = Arc::new(SigTagVerifier {
            provider: Arc::clone(&provider),
        });
        Self {
            spec,
            provider,
            retention_days,
            verifier,
        }
    }

    /// Replace the signature verifier (tests, alternative trust roots).
    #[must_use]
    pub fn with_verifier(mut self, verifier: Arc<dyn SignatureVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// List the artifact's versions.
    ///
    /// The forge package registry is preferred; providers without one
    /// fall back to walking OCI tags, resolving each tag's digest and
    /// reading the creation time from the standard manifest annotation.
    async fn list_versions(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Vec<ArtifactVersionInfo>, IngestError> {
        if let Some(forge) = self.provider.forge() {
            return Ok(forge.get_package_versions(owner, name).await?);
        }

        let oci = self.provider.oci().ok_or_else(|| {
            IngestError::Config("provider has neither forge nor OCI capability".to_owned())
        })?;
        let image = format!("{owner}/{name}");
        let mut versions = Vec::new();
        for tag in oci.list_tags(&image).await? {
            let digest = oci.get_digest(&image, &tag).await?;
            let manifest = oci.get_manifest(&image, &tag).await?;
            let created_at = manifest
                .get("annotations")
                .and_then(|a| a.get("org.opencontainers.image.created"))
                .and_then(|v| v.as_str())
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map_or_else(Utc::now, |dt| dt.with_timezone(&Utc));
            versions.push(ArtifactVersionInfo {
                id: tag.clone(),
                tags: vec![tag],
                created_at,
                digest: Some(digest),
            });
        }
        Ok(versions)
    }

    /// Apply the tag matcher, retention window, and `.sig` skip rules.
    fn applicable_versions(
        &self,
        versions: Vec<ArtifactVersionInfo>,
        matcher: &TagMatcher,
    ) -> Vec<ArtifactVersionInfo> {
        // Per-call cutoff: a long-lived process must not freeze its
        // retention window at startup.
        let cutoff = Utc::now() - Duration::days(i64::from(self.retention_days));
        versions
            .into_iter()
            .filter(|v| v.created_at >= cutoff)
            .filter(|v| !v.tags.iter().any(|t| t.ends_with(".sig")))
            .filter(|v| matcher.matches(&v.tags))
            .collect()
    }
}

#[async_trait]
impl Ingester for ArtifactIngester {
    async fn ingest(
        &self,
        entity: &Entity,
        params: &serde_json::Value,
    ) -> Result<IngestResult, IngestError> {
        let params: ArtifactParams = if params.is_null() {
            ArtifactParams::default()
        } else {
            serde_json::from_value(params.clone())
                .map_err(|e| IngestError::Config(format!("bad artifact params: {e}")))?
        };
        let matcher = TagMatcher::from_params(&params)?;

        let owner = entity
            .properties
            .str_of("owner")
            .ok_or_else(|| IngestError::Config("entity has no owner property".to_owned()))?;
        let name = params
            .name
            .as_deref()
            .or_else(|| entity.properties.str_of("name"))
            .ok_or_else(|| IngestError::Config("artifact has no name".to_owned()))?;

        let versions = self.list_versions(owner, name).await?;
        let applicable = self.applicable_versions(versions, &matcher);
        debug!(
            target: "cwn.ingest",
            artifact = name,
            applicable = applicable.len(),
            "filtered artifact versions"
        );

        if applicable.is_empty() {
            return Err(IngestError::Failed(
                "no applicable artifact versions".to_owned(),
            ));
        }

        let image = format!("{owner}/{name}");
        let mut results = Vec::with_capacity(applicable.len());
        for version in &applicable {
            let evidence = self.verifier.verify(&image, version).await?;
            results.push(serde_json::json!({
                "id": version.id,
                "tags": version.tags,
                "created_at": version.created_at,
                "verification": VersionVerification::from_evidence(&evidence),
            }));
        }

        Ok(IngestResult {
            object: Some(serde_json::Value::Array(results)),
            fs: None,
            checkpoint: Some(CheckpointV1::now().seal()),
        })
    }

    fn ingest_type(&self) -> &'static str {
        "artifact"
    }

    fn config(&self) -> Option<serde_json::Value> {
        serde_json::to_value(self.spec).ok()
    }
}
