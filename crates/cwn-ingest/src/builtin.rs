// SPDX-License-Identifier: MIT OR Apache-2.0

//! The built-in ingester.
//!
//! Resolves a method name against an explicit registry of host-provided
//! functions — no reflection. Before invoking, every dotted parameter
//! path must deep-compare equal against the entity; a mismatch makes the
//! rule inapplicable rather than failed.

use crate::{IngestError, IngestResult, Ingester};
use async_trait::async_trait;
use cwn_core::{BuiltinIngestSpec, CheckpointV1, Entity};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A host-provided built-in method.
pub type BuiltinFn = Arc<dyn Fn(&Entity, &Value) -> Result<Value, String> + Send + Sync>;

/// Fixed registry of host-provided functions.
#[derive(Default)]
pub struct BuiltinRegistry {
    methods: HashMap<String, BuiltinFn>,
}

impl BuiltinRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a method, replacing any previous entry under `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, method: F)
    where
        F: Fn(&Entity, &Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Arc::new(method));
    }

    /// Look up a method by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<BuiltinFn> {
        self.methods.get(name).cloned()
    }

    /// Sorted method names, for diagnostics.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut v: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        v.sort_unstable();
        v
    }
}

/// The built-in ingester.
pub struct BuiltinIngester {
    spec: BuiltinIngestSpec,
    registry: Arc<BuiltinRegistry>,
}

impl BuiltinIngester {
    /// Create a built-in ingester over `registry`.
    #[must_use]
    pub fn new(spec: BuiltinIngestSpec, registry: Arc<BuiltinRegistry>) -> Self {
        Self { spec, registry }
    }
}

#[async_trait]
impl Ingester for BuiltinIngester {
    async fn ingest(
        &self,
        entity: &Entity,
        params: &Value,
    ) -> Result<IngestResult, IngestError> {
        let method = self.registry.get(&self.spec.method).ok_or_else(|| {
            IngestError::Other(format!("cannot get method: {}", self.spec.method))
        })?;

        if !entity_matches_params(entity, params) {
            return Err(IngestError::Inapplicable(
                "entity does not match rule parameters".to_owned(),
            ));
        }

        let object = method(entity, params)
            .map_err(|e| IngestError::Other(format!("rule method: {e}")))?;

        Ok(IngestResult {
            object: Some(object),
            fs: None,
            checkpoint: Some(CheckpointV1::now().seal()),
        })
    }

    fn ingest_type(&self) -> &'static str {
        "builtin"
    }

    fn config(&self) -> Option<Value> {
        serde_json::to_value(&self.spec).ok()
    }
}

/// Deep-compare every dotted parameter path against the entity.
///
/// Each leaf of `params` is read back from the entity's JSON projection
/// via the same dotted path; any missing path or unequal value means the
/// rule does not apply to this entity.
#[must_use]
pub fn entity_matches_params(entity: &Entity, params: &Value) -> bool {
    let entity_json = serde_json::json!({
        "id": entity.id,
        "upstream_id": entity.upstream_id,
        "kind": entity.kind.as_str(),
        "provider_id": entity.provider_id,
        "properties": entity.properties.to_json_values(),
    });

    let mut leaves = Vec::new();
    collect_leaves("", params, &mut leaves);

    leaves.into_iter().all(|(path, expected)| {
        let selector = format!("$.{path}");
        match jsonpath_lib::select(&entity_json, &selector) {
            Ok(found) => found.first().is_some_and(|v| *v == expected),
            Err(_) => false,
        }
    })
}

/// Flatten a JSON object into dotted leaf paths.
fn collect_leaves<'v>(prefix: &str, value: &'v Value, out: &mut Vec<(String, &'v Value)>) {
    match value {
        Value::Object(map) => {
            for (key, inner) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                collect_leaves(&path, inner, out);
            }
        }
        _ if prefix.is_empty() => {}
        _ => out.push((prefix.to_owned(), value)),
    }
}
