// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! cwn-fs
#![deny(unsafe_code)]
#![warn(missing_docs)]

use globset::GlobSet;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Default cap on the number of files accepted into one view.
pub const DEFAULT_MAX_FILES: usize = 100_000;

/// Default cap on the total decoded bytes accepted into one view.
pub const DEFAULT_MAX_TOTAL_BYTES: u64 = 512 * 1024 * 1024;

/// Errors building an in-memory filesystem view.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FsError {
    /// The file-count limit was exceeded.
    #[error("too many files: limit is {limit}")]
    TooManyFiles {
        /// The enforced file-count limit.
        limit: usize,
    },

    /// The total-bytes limit was exceeded.
    #[error("repository too large: limit is {limit} bytes")]
    TooLarge {
        /// The enforced total-byte limit.
        limit: u64,
    },

    /// The path escapes the view root or is otherwise unusable.
    #[error("invalid path: {path}")]
    InvalidPath {
        /// The rejected path.
        path: String,
    },
}

/// Limits enforced while populating a [`MemFs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsLimits {
    /// Maximum number of files.
    pub max_files: usize,
    /// Maximum total bytes across all files.
    pub max_total_bytes: u64,
}

impl Default for FsLimits {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
        }
    }
}

/// A mutable in-memory filesystem being populated by a clone.
///
/// Paths are `/`-separated, relative, and normalized: a leading `./` is
/// stripped and any `..` component is rejected — evaluators never see a
/// host path.
#[derive(Debug, Default)]
pub struct MemFs {
    limits: FsLimits,
    files: BTreeMap<String, Vec<u8>>,
    total_bytes: u64,
}

impl MemFs {
    /// Create an empty filesystem with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(FsLimits::default())
    }

    /// Create an empty filesystem enforcing `limits`.
    #[must_use]
    pub fn with_limits(limits: FsLimits) -> Self {
        Self {
            limits,
            files: BTreeMap::new(),
            total_bytes: 0,
        }
    }

    /// Insert a file, replacing any previous content at the same path.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::InvalidPath`] for absolute or escaping paths,
    /// [`FsError::TooManyFiles`] / [`FsError::TooLarge`] when a limit
    /// would be exceeded.
    pub fn insert(&mut self, path: &str, contents: impl Into<Vec<u8>>) -> Result<(), FsError> {
        let path = normalize(path)?;
        let contents = contents.into();

        let replaced = self.files.get(&path).map_or(0, |f| f.len() as u64);
        let new_total = self.total_bytes - replaced + contents.len() as u64;
        if new_total > self.limits.max_total_bytes {
            return Err(FsError::TooLarge {
                limit: self.limits.max_total_bytes,
            });
        }
        if !self.files.contains_key(&path) && self.files.len() >= self.limits.max_files {
            return Err(FsError::TooManyFiles {
                limit: self.limits.max_files,
            });
        }

        self.total_bytes = new_total;
        self.files.insert(path, contents);
        Ok(())
    }

    /// Freeze into a read-only, cheaply-cloneable [`FsView`].
    #[must_use]
    pub fn freeze(self) -> FsView {
        FsView {
            inner: Arc::new(self.files),
        }
    }
}

/// A read-only view over a populated in-memory filesystem.
///
/// Cloning is cheap; all clones share the same underlying tree.
#[derive(Debug, Clone, Default)]
pub struct FsView {
    inner: Arc<BTreeMap<String, Vec<u8>>>,
}

impl FsView {
    /// Read a file's bytes.
    #[must_use]
    pub fn read(&self, path: &str) -> Option<&[u8]> {
        let path = normalize(path).ok()?;
        self.inner.get(&path).map(Vec::as_slice)
    }

    /// Read a file as UTF-8, if it exists and decodes.
    #[must_use]
    pub fn read_to_string(&self, path: &str) -> Option<String> {
        self.read(path)
            .and_then(|b| std::str::from_utf8(b).ok().map(str::to_owned))
    }

    /// Whether a file exists at `path`.
    #[must_use]
    pub fn exists(&self, path: &str) -> bool {
        self.read(path).is_some()
    }

    /// Number of files in the view.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Total bytes across all files in the view.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.inner.values().map(|f| f.len() as u64).sum()
    }

    /// Whether the view fits within `limits`.
    #[must_use]
    pub fn within(&self, limits: &FsLimits) -> bool {
        self.len() <= limits.max_files && self.total_bytes() <= limits.max_total_bytes
    }

    /// Whether the view holds no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterate over `(path, contents)` in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<u8>)> {
        self.inner.iter()
    }

    /// All paths, in sorted order.
    #[must_use]
    pub fn paths(&self) -> Vec<&str> {
        self.inner.keys().map(String::as_str).collect()
    }

    /// Paths matched by a compiled glob set, in sorted order.
    #[must_use]
    pub fn matching(&self, globs: &GlobSet) -> Vec<&str> {
        self.inner
            .keys()
            .filter(|p| globs.is_match(p.as_str()))
            .map(String::as_str)
            .collect()
    }
}

/// Normalize a relative path: strip a leading `./`, reject absolute
/// paths and any `..` component.
fn normalize(path: &str) -> Result<String, FsError> {
    let trimmed = path.strip_prefix("./").unwrap_or(path);
    if trimmed.is_empty()
        || trimmed.starts_with('/')
        || trimmed.split('/').any(|c| c == "..")
    {
        return Err(FsError::InvalidPath {
            path: path.to_owned(),
        });
    }
    Ok(trimmed.to_owned())
}
