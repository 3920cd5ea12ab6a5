// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! cwn-telemetry
#![deny(unsafe_code)]
#![warn(missing_docs)]

use cwn_core::RuleStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Initialize the process-wide tracing subscriber.
///
/// `level` overrides `RUST_LOG`; repeated calls are harmless — only the
/// first subscriber wins.
pub fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::from_default_env(),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

// ---------------------------------------------------------------------------
// EvaluationMetrics
// ---------------------------------------------------------------------------

/// Metrics captured for a single entity evaluation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EvaluationMetrics {
    /// Entity variant that was evaluated.
    pub entity_kind: String,
    /// Provider instance the evaluation ran through.
    pub provider_id: String,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Number of profiles considered.
    pub profiles_seen: u64,
    /// Number of profiles short-circuited by a selector.
    pub profiles_skipped: u64,
    /// Number of rules evaluated.
    pub rules_evaluated: u64,
    /// Per-status rule counts (deterministic ordering).
    pub status_counts: BTreeMap<String, u64>,
    /// Ingest-cache hits.
    pub cache_hits: u64,
    /// Times fingerprinting failed and the cache was bypassed.
    pub fingerprint_bypasses: u64,
}

impl EvaluationMetrics {
    /// Count one rule verdict.
    pub fn record_status(&mut self, status: RuleStatus) {
        self.rules_evaluated += 1;
        *self
            .status_counts
            .entry(status.as_str().to_owned())
            .or_insert(0) += 1;
    }
}

// ---------------------------------------------------------------------------
// MetricsSummary
// ---------------------------------------------------------------------------

/// Aggregated statistics across multiple entity evaluations.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetricsSummary {
    /// Number of evaluations recorded.
    pub count: usize,
    /// Mean duration in milliseconds.
    pub mean_duration_ms: f64,
    /// Median (p50) duration in milliseconds.
    pub p50_duration_ms: f64,
    /// 99th-percentile duration in milliseconds.
    pub p99_duration_ms: f64,
    /// Total rules evaluated across all runs.
    pub total_rules: u64,
    /// Per-status rule counts across all runs.
    pub status_counts: BTreeMap<String, u64>,
    /// Total fingerprint bypasses across all runs.
    pub fingerprint_bypasses: u64,
    /// Per-entity-kind evaluation counts.
    pub kind_counts: BTreeMap<String, usize>,
}

/// Compute a percentile value from a **sorted** slice.
fn percentile(sorted: &[u64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0] as f64;
    }
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;
    sorted[lower] as f64 * (1.0 - frac) + sorted[upper] as f64 * frac
}

// ---------------------------------------------------------------------------
// MetricsCollector
// ---------------------------------------------------------------------------

/// Thread-safe collector for evaluation metrics.
///
/// Clone freely; all clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    inner: Arc<Mutex<Vec<EvaluationMetrics>>>,
}

impl MetricsCollector {
    /// Create a new, empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed evaluation's metrics.
    pub fn record(&self, metrics: EvaluationMetrics) {
        info!(
            target: "cwn.telemetry",
            entity_kind = %metrics.entity_kind,
            provider_id = %metrics.provider_id,
            duration_ms = metrics.duration_ms,
            rules = metrics.rules_evaluated,
            "evaluation recorded"
        );
        let mut data = self.inner.lock().expect("metrics lock poisoned");
        data.push(metrics);
    }

    /// Return all recorded evaluations.
    #[must_use]
    pub fn runs(&self) -> Vec<EvaluationMetrics> {
        self.inner.lock().expect("metrics lock poisoned").clone()
    }

    /// Number of evaluations recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("metrics lock poisoned").len()
    }

    /// Whether the collector has no recorded evaluations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Compute an aggregated summary of all recorded evaluations.
    #[must_use]
    pub fn summary(&self) -> MetricsSummary {
        let data = self.inner.lock().expect("metrics lock poisoned");
        if data.is_empty() {
            return MetricsSummary::default();
        }

        let count = data.len();
        let mut durations: Vec<u64> = data.iter().map(|r| r.duration_ms).collect();
        durations.sort_unstable();

        let total_duration: u64 = durations.iter().sum();
        let mut status_counts: BTreeMap<String, u64> = BTreeMap::new();
        let mut kind_counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut total_rules = 0;
        let mut fingerprint_bypasses = 0;
        for run in data.iter() {
            total_rules += run.rules_evaluated;
            fingerprint_bypasses += run.fingerprint_bypasses;
            for (status, n) in &run.status_counts {
                *status_counts.entry(status.clone()).or_insert(0) += n;
            }
            *kind_counts.entry(run.entity_kind.clone()).or_insert(0) += 1;
        }

        MetricsSummary {
            count,
            mean_duration_ms: total_duration as f64 / count as f64,
            p50_duration_ms: percentile(&durations, 50.0),
            p99_duration_ms: percentile(&durations, 99.0),
            total_rules,
            status_counts,
            fingerprint_bypasses,
            kind_counts,
        }
    }
}
