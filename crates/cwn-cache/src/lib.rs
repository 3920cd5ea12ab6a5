// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! cwn-cache
#![deny(unsafe_code)]
#![warn(missing_docs)]

use cwn_core::{canonical_json, Entity};
use sha2::{Digest, Sha512};
use std::collections::HashMap;
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Fingerprint
// ---------------------------------------------------------------------------

/// Errors while computing a cache fingerprint.
///
/// Callers bypass the cache on error — evaluation still runs.
#[derive(Debug, thiserror::Error)]
pub enum FingerprintError {
    /// A component could not be canonicalized to JSON.
    #[error("building cache key: {0}")]
    Canonicalize(#[from] cwn_core::ContractError),
}

/// A SHA-512 cache key over canonicalized ingest inputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// The hex digest.
    #[must_use]
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the fingerprint of one ingest call.
///
/// Hashed in order: the ingester type tag; the canonical JSON of the
/// ingester config when present; the canonical JSON of the entity
/// payload; the canonical JSON of the rule params when present.
/// Identical canonical inputs always yield the same key.
///
/// # Errors
///
/// Returns [`FingerprintError`] when a component cannot be
/// canonicalized; the caller must bypass the cache, never guess a key.
pub fn fingerprint(
    ingest_type: &str,
    config: Option<&serde_json::Value>,
    entity: &Entity,
    params: Option<&serde_json::Value>,
) -> Result<Fingerprint, FingerprintError> {
    let mut hasher = Sha512::new();
    hasher.update(ingest_type.as_bytes());
    if let Some(config) = config {
        hasher.update(canonical_json(config)?.as_bytes());
    }
    hasher.update(canonical_json(&entity.fingerprint_payload())?.as_bytes());
    if let Some(params) = params {
        hasher.update(canonical_json(params)?.as_bytes());
    }
    Ok(Fingerprint(format!("{:x}", hasher.finalize())))
}

// ---------------------------------------------------------------------------
// Caches
// ---------------------------------------------------------------------------

/// A cache of ingest results scoped to one entity evaluation.
///
/// `get` after a `set` with the same key returns the stored value —
/// except for [`NoopCache`], which stores nothing by design.
pub trait IngestCache<V: Clone + Send + Sync>: Send + Sync {
    /// Look up a previously stored value.
    fn get(&self, key: &Fingerprint) -> Option<V>;

    /// Store a value under `key`.
    fn set(&self, key: Fingerprint, value: V);
}

/// Concurrency-safe keyed cache for one entity evaluation.
///
/// Writes are serialized by the sequential rule loop in practice, but
/// the map is safe for concurrent use regardless.
#[derive(Debug)]
pub struct KeyedCache<V> {
    inner: Mutex<HashMap<String, V>>,
}

impl<V> KeyedCache<V> {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache lock poisoned").len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V> Default for KeyedCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send + Sync> IngestCache<V> for KeyedCache<V> {
    fn get(&self, key: &Fingerprint) -> Option<V> {
        self.inner
            .lock()
            .expect("cache lock poisoned")
            .get(key.as_hex())
            .cloned()
    }

    fn set(&self, key: Fingerprint, value: V) {
        self.inner
            .lock()
            .expect("cache lock poisoned")
            .insert(key.0, value);
    }
}

/// A cache that never stores.
///
/// Used for artifact evaluations, where successive versions can look
/// identical upstream while meaning different things.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl NoopCache {
    /// Create the noop cache.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl<V: Clone + Send + Sync> IngestCache<V> for NoopCache {
    fn get(&self, _key: &Fingerprint) -> Option<V> {
        None
    }

    fn set(&self, _key: Fingerprint, _value: V) {}
}
