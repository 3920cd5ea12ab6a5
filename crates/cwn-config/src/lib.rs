// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! cwn-config
#![deny(unsafe_code)]
#![warn(missing_docs)]

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory-level issues that do not prevent operation but deserve
/// attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// The executor timeout is unusually large.
    LargeTimeout {
        /// Timeout value in seconds.
        secs: u64,
    },
    /// The lease TTL is shorter than a typical single-rule evaluation.
    ShortLeaseTtl {
        /// TTL value in seconds.
        secs: u64,
    },
    /// The clone limits are permissive enough to admit very large
    /// repositories.
    PermissiveCloneLimits {
        /// Configured byte limit.
        bytes: u64,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::LargeTimeout { secs } => {
                write!(f, "executor timeout is unusually large ({secs}s)")
            }
            ConfigWarning::ShortLeaseTtl { secs } => {
                write!(f, "lease TTL ({secs}s) is shorter than a typical rule evaluation")
            }
            ConfigWarning::PermissiveCloneLimits { bytes } => {
                write!(f, "clone byte limit ({bytes}) admits very large repositories")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Ingest-side limits.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(default)]
pub struct IngestLimits {
    /// Hard cap on REST response bodies, in bytes.
    pub rest_max_body_bytes: u64,
    /// Maximum number of files accepted from one clone.
    pub clone_max_files: usize,
    /// Maximum total bytes accepted from one clone.
    pub clone_max_bytes: u64,
    /// Per-ingester call timeout, in seconds.
    pub timeout_secs: u64,
}

impl Default for IngestLimits {
    fn default() -> Self {
        Self {
            rest_max_body_bytes: 1024 * 1024,
            clone_max_files: 100_000,
            clone_max_bytes: 512 * 1024 * 1024,
            timeout_secs: 60,
        }
    }
}

/// Executor-side timing knobs.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Whole-entity evaluation timeout, in seconds. Bounds every
    /// ingester call-level timeout from above.
    pub timeout_secs: u64,
    /// Per-entity lease TTL, in seconds.
    pub lease_ttl_secs: u64,
    /// Detached cleanup budget (e.g. webhook deregistration on partial
    /// failure), in seconds.
    pub cleanup_timeout_secs: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 600,
            lease_ttl_secs: 120,
            cleanup_timeout_secs: 30,
        }
    }
}

/// Artifact-evaluation knobs.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Versions older than this many days are skipped. The cutoff is
    /// computed per call against the current wall clock.
    pub retention_days: u32,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        // Roughly six months.
        Self { retention_days: 183 }
    }
}

/// Top-level runtime configuration for the Chainwarden engine.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Log level override (e.g. `"debug"`, `"info"`, `"warn"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Ingest-side limits.
    pub ingest: IngestLimits,

    /// Executor timing.
    pub executor: ExecutorConfig,

    /// Artifact filtering.
    pub artifact: ArtifactConfig,
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::FileNotFound`] if the path does not exist,
    /// [`ConfigError::ParseError`] if it is not valid TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        Self::from_toml(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// [`ConfigError::ParseError`] if the input is not valid TOML.
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|e| ConfigError::ParseError {
            reason: e.to_string(),
        })
    }

    /// Validate semantic constraints.
    ///
    /// # Errors
    ///
    /// [`ConfigError::ValidationError`] listing every violated
    /// constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut reasons = Vec::new();

        if self.ingest.rest_max_body_bytes == 0 {
            reasons.push("ingest.rest_max_body_bytes must be positive".to_owned());
        }
        if self.ingest.clone_max_files == 0 {
            reasons.push("ingest.clone_max_files must be positive".to_owned());
        }
        if self.ingest.timeout_secs == 0 {
            reasons.push("ingest.timeout_secs must be positive".to_owned());
        }
        if self.executor.timeout_secs < self.ingest.timeout_secs {
            reasons.push(
                "executor.timeout_secs must bound ingest.timeout_secs from above".to_owned(),
            );
        }
        if self.executor.lease_ttl_secs == 0 {
            reasons.push("executor.lease_ttl_secs must be positive".to_owned());
        }
        if self.artifact.retention_days == 0 {
            reasons.push("artifact.retention_days must be positive".to_owned());
        }

        if reasons.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ValidationError { reasons })
        }
    }

    /// Advisory warnings for working-but-questionable settings.
    #[must_use]
    pub fn warnings(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        if self.executor.timeout_secs > 3600 {
            warnings.push(ConfigWarning::LargeTimeout {
                secs: self.executor.timeout_secs,
            });
        }
        if self.executor.lease_ttl_secs < 10 {
            warnings.push(ConfigWarning::ShortLeaseTtl {
                secs: self.executor.lease_ttl_secs,
            });
        }
        if self.ingest.clone_max_bytes > 4 * 1024 * 1024 * 1024 {
            warnings.push(ConfigWarning::PermissiveCloneLimits {
                bytes: self.ingest.clone_max_bytes,
            });
        }
        warnings
    }

    /// Merge an overlay on top of `self`, field by field.
    ///
    /// Scalar sections are replaced wholesale when the overlay differs
    /// from the defaults; `log_level` is taken from the overlay when set.
    #[must_use]
    pub fn merged_with(mut self, overlay: Self) -> Self {
        if overlay.log_level.is_some() {
            self.log_level = overlay.log_level;
        }
        if overlay.ingest != IngestLimits::default() {
            self.ingest = overlay.ingest;
        }
        if overlay.executor != ExecutorConfig::default() {
            self.executor = overlay.executor;
        }
        if overlay.artifact != ArtifactConfig::default() {
            self.artifact = overlay.artifact;
        }
        self
    }
}
