// SPDX-License-Identifier: MIT OR Apache-2.0

//! The rule-engine cache.
//!
//! Built at the start of each entity evaluation from the project
//! hierarchy, so rule-type updates are picked up promptly. A miss on
//! [`RuleEngineCache::get_rule_engine`] queries the store exactly once;
//! persistent absence is an unknown rule type.

use crate::{EngineError, RuleTypeEngine};
use cwn_core::EntityKind;
use cwn_ingest::{BuiltinRegistry, IngesterLimits};
use cwn_provider::Provider;
use cwn_store::RuleTypeStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

/// Per-evaluation cache of constructed [`RuleTypeEngine`]s.
pub struct RuleEngineCache {
    engines: Mutex<HashMap<Uuid, Arc<RuleTypeEngine>>>,
    names: Mutex<HashMap<String, Uuid>>,
    store: Arc<dyn RuleTypeStore>,
    provider: Arc<dyn Provider>,
    registry: Arc<BuiltinRegistry>,
    limits: IngesterLimits,
}

impl RuleEngineCache {
    /// Create an empty cache wired to its collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn RuleTypeStore>,
        provider: Arc<dyn Provider>,
        registry: Arc<BuiltinRegistry>,
        limits: IngesterLimits,
    ) -> Self {
        Self {
            engines: Mutex::new(HashMap::new()),
            names: Mutex::new(HashMap::new()),
            store,
            provider,
            registry,
            limits,
        }
    }

    /// Eagerly construct an engine for every rule type used in the
    /// hierarchy for this entity variant.
    ///
    /// `hierarchy` is nearest-project-first; when two projects define
    /// the same rule-type name, the nearer one wins the name binding.
    ///
    /// # Errors
    ///
    /// Any engine construction failure is fatal to population — rule
    /// types must be buildable in isolation.
    pub async fn populate(
        &self,
        kind: EntityKind,
        hierarchy: &[Uuid],
    ) -> Result<(), EngineError> {
        let mut rule_types = self
            .store
            .rule_types_in_hierarchy(kind, hierarchy)
            .await?;
        rule_types.sort_by_key(|rt| {
            hierarchy
                .iter()
                .position(|p| *p == rt.project_id)
                .unwrap_or(usize::MAX)
        });
        debug!(
            target: "cwn.engine",
            kind = %kind,
            rule_types = rule_types.len(),
            "populating rule-engine cache"
        );

        for rule_type in rule_types {
            let id = rule_type.id;
            let name = rule_type.name.clone();
            let engine = RuleTypeEngine::new(
                rule_type,
                Arc::clone(&self.provider),
                Arc::clone(&self.registry),
                self.limits,
            )?;
            self.engines
                .lock()
                .expect("engines lock poisoned")
                .insert(id, Arc::new(engine));
            self.names
                .lock()
                .expect("names lock poisoned")
                .entry(name)
                .or_insert(id);
        }
        Ok(())
    }

    /// Resolve an engine by rule-type id, constructing on miss.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownRuleType`] when the store has no such rule
    /// type either.
    pub async fn get_rule_engine(&self, id: Uuid) -> Result<Arc<RuleTypeEngine>, EngineError> {
        if let Some(engine) = self.engines.lock().expect("engines lock poisoned").get(&id) {
            return Ok(Arc::clone(engine));
        }

        let rule_type = self
            .store
            .rule_type_by_id(id)
            .await?
            .ok_or(EngineError::UnknownRuleType { id })?;
        let name = rule_type.name.clone();
        let engine = Arc::new(RuleTypeEngine::new(
            rule_type,
            Arc::clone(&self.provider),
            Arc::clone(&self.registry),
            self.limits,
        )?);

        let mut engines = self.engines.lock().expect("engines lock poisoned");
        // A concurrent miss may have inserted first; keep the existing
        // engine so callers share one instance.
        let entry = engines.entry(id).or_insert_with(|| Arc::clone(&engine));
        let shared = Arc::clone(entry);
        drop(engines);
        self.names
            .lock()
            .expect("names lock poisoned")
            .entry(name)
            .or_insert(id);
        Ok(shared)
    }

    /// Resolve an engine by rule-type name, as profiles reference them.
    #[must_use]
    pub fn engine_by_name(&self, name: &str) -> Option<Arc<RuleTypeEngine>> {
        let id = *self.names.lock().expect("names lock poisoned").get(name)?;
        self.engines
            .lock()
            .expect("engines lock poisoned")
            .get(&id)
            .map(Arc::clone)
    }

    /// Number of constructed engines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.engines.lock().expect("engines lock poisoned").len()
    }

    /// Whether the cache holds no engines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
