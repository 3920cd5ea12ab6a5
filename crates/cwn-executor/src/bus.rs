// SPDX-License-Identifier: MIT OR Apache-2.0

//! Topic-keyed broadcast bus for entity events.
//!
//! Payloads cross the bus as canonical JSON; the envelope schema is
//! versioned and consumers reject versions they do not understand.

use cwn_core::{canonical_json, EntityEvent, EntityKind, ENVELOPE_VERSION};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Topic the executor consumes entity events on.
pub const TOPIC_ENTITY_EVENT: &str = "internal.entity.event";

/// Topic the entity creator publishes freshly registered repositories
/// on.
pub const TOPIC_REPO_INIT: &str = "reconcile.repo.init";

/// Per-topic channel capacity.
const TOPIC_CAPACITY: usize = 256;

/// Errors decoding a bus message.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// The payload is not valid JSON for the envelope.
    #[error("malformed bus message: {0}")]
    Malformed(String),

    /// The envelope version is not supported.
    #[error("unsupported envelope version: {0}")]
    UnsupportedVersion(String),
}

/// Decode and version-check one bus payload.
///
/// # Errors
///
/// [`BusError`] for malformed payloads and unknown envelope versions.
pub fn decode_event(payload: &str) -> Result<EntityEvent, BusError> {
    let event: EntityEvent =
        serde_json::from_str(payload).map_err(|e| BusError::Malformed(e.to_string()))?;
    if event.version != ENVELOPE_VERSION {
        return Err(BusError::UnsupportedVersion(event.version));
    }
    Ok(event)
}

/// Shared statistics counters for a [`MessageBus`].
#[derive(Debug, Default)]
struct StatsInner {
    total_published: AtomicU64,
    dropped_messages: AtomicU64,
}

/// A snapshot of bus statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusStats {
    /// Messages published across all topics.
    pub total_published: u64,
    /// Messages dropped because no subscriber was listening.
    pub dropped_messages: u64,
}

/// Topic-keyed broadcast bus carrying canonical-JSON payloads.
#[derive(Default)]
pub struct MessageBus {
    topics: Mutex<HashMap<String, broadcast::Sender<String>>>,
    stats: Arc<StatsInner>,
}

impl MessageBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<String> {
        let mut topics = self.topics.lock().expect("bus lock poisoned");
        topics
            .entry(topic.to_owned())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .clone()
    }

    /// Publish an entity event to `topic` as canonical JSON.
    ///
    /// If no subscribers are listening the message is dropped and
    /// counted.
    ///
    /// # Errors
    ///
    /// Returns the serialization error when the event cannot be
    /// canonicalized.
    pub fn publish(&self, topic: &str, event: &EntityEvent) -> Result<(), cwn_core::ContractError> {
        let payload = canonical_json(event)?;
        self.stats.total_published.fetch_add(1, Ordering::Relaxed);
        if self.sender(topic).send(payload).is_err() {
            self.stats.dropped_messages.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Subscribe to future messages on `topic`.
    #[must_use]
    pub fn subscribe(&self, topic: &str) -> Subscription {
        Subscription {
            rx: self.sender(topic).subscribe(),
            filter: None,
        }
    }

    /// Subscribe to `topic`, delivering only events the filter accepts.
    #[must_use]
    pub fn subscribe_filtered(&self, topic: &str, filter: EventFilter) -> Subscription {
        Subscription {
            rx: self.sender(topic).subscribe(),
            filter: Some(filter),
        }
    }

    /// Return a snapshot of the current bus statistics.
    #[must_use]
    pub fn stats(&self) -> BusStats {
        BusStats {
            total_published: self.stats.total_published.load(Ordering::Relaxed),
            dropped_messages: self.stats.dropped_messages.load(Ordering::Relaxed),
        }
    }
}

/// Predicate narrowing a subscription to relevant events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Entity variants to accept; empty accepts all.
    pub kinds: Vec<EntityKind>,
    /// Restrict to one project, when set.
    pub project_id: Option<Uuid>,
}

impl EventFilter {
    /// Whether `event` passes this filter.
    #[must_use]
    pub fn accepts(&self, event: &EntityEvent) -> bool {
        if !self.kinds.is_empty() && !self.kinds.contains(&event.entity.kind) {
            return false;
        }
        if let Some(project_id) = self.project_id {
            if event.project_id != project_id {
                return false;
            }
        }
        true
    }
}

/// A handle receiving one topic's messages.
pub struct Subscription {
    rx: broadcast::Receiver<String>,
    filter: Option<EventFilter>,
}

impl Subscription {
    /// Receive and decode the next event.
    ///
    /// Filtered-out events are skipped silently. Returns `None` when the
    /// bus is gone; decode failures surface as errors so consumers can
    /// count them.
    pub async fn recv(&mut self) -> Option<Result<EntityEvent, BusError>> {
        loop {
            match self.rx.recv().await {
                Ok(payload) => match decode_event(&payload) {
                    Ok(event) => {
                        if self.filter.as_ref().is_none_or(|f| f.accepts(&event)) {
                            return Some(Ok(event));
                        }
                    }
                    Err(e) => return Some(Err(e)),
                },
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
