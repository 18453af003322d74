//! Prometheus metrics for lotwise.
//!
//! Covers:
//! - Risk gate classifications
//! - Sizing outcomes
//! - Batch placement status and latency
//! - Suggestion lifecycle transitions
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A registration failure means a
//! duplicate metric name, which must crash at startup. These panics only
//! happen during static initialization, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_gauge, CounterVec, Encoder,
    HistogramVec, IntGauge, TextEncoder,
};

use crate::error::{TelemetryError, TelemetryResult};

/// Risk gate classifications.
/// Labels: check (movement/volatility/combined), level (normal/warning/block)
pub static GATE_CLASSIFICATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "lotwise_gate_classifications_total",
        "Risk gate classifications by check and level",
        &["check", "level"]
    )
    .unwrap()
});

/// Sizing outcomes.
/// Labels: outcome (sized/insufficient_data/margin_insufficient/skipped), source
pub static SIZING_OUTCOMES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "lotwise_sizing_outcomes_total",
        "Position sizing outcomes",
        &["outcome", "source"]
    )
    .unwrap()
});

/// Recommended lot counts.
pub static RECOMMENDED_LOTS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "lotwise_recommended_lots",
        "Recommended lots per sizing evaluation",
        &["source"],
        vec![1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 200.0, 500.0]
    )
    .unwrap()
});

/// Batches by final status.
pub static BATCHES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "lotwise_batches_total",
        "Order batches by final status",
        &["status"]
    )
    .unwrap()
});

/// Placement latency per leg attempt in milliseconds.
pub static PLACEMENT_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "lotwise_placement_latency_ms",
        "Order placement latency in milliseconds",
        &["outcome"],
        vec![5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0]
    )
    .unwrap()
});

/// Placement retries under a backoff policy.
pub static PLACEMENT_RETRIES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "lotwise_placement_retries_total",
        "Transient placement failures retried",
        &["instrument"]
    )
    .unwrap()
});

/// Lifecycle transitions.
pub static TRANSITIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "lotwise_transitions_total",
        "Suggestion lifecycle transitions",
        &["from", "to"]
    )
    .unwrap()
});

/// Rejected lifecycle operations.
/// Labels: reason (expired/invalid_transition/conflict/in_progress)
pub static LIFECYCLE_REJECTIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "lotwise_lifecycle_rejections_total",
        "Lifecycle operations rejected",
        &["reason"]
    )
    .unwrap()
});

/// Execution runs currently in progress.
pub static EXECUTIONS_IN_PROGRESS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "lotwise_executions_in_progress",
        "Execution runs currently in progress"
    )
    .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Record a gate classification.
    pub fn gate_classified(check: &str, level: &str) {
        GATE_CLASSIFICATIONS_TOTAL
            .with_label_values(&[check, level])
            .inc();
    }

    /// Record a sizing outcome.
    pub fn sizing_outcome(outcome: &str, source: &str) {
        SIZING_OUTCOMES_TOTAL
            .with_label_values(&[outcome, source])
            .inc();
    }

    pub fn recommended_lots(source: &str, lots: u32) {
        RECOMMENDED_LOTS
            .with_label_values(&[source])
            .observe(f64::from(lots));
    }

    /// Record a batch reaching its final status.
    pub fn batch_finished(status: &str) {
        BATCHES_TOTAL.with_label_values(&[status]).inc();
    }

    /// Record placement latency.
    pub fn placement_latency(outcome: &str, latency_ms: f64) {
        PLACEMENT_LATENCY_MS
            .with_label_values(&[outcome])
            .observe(latency_ms);
    }

    pub fn placement_retried(instrument: &str) {
        PLACEMENT_RETRIES_TOTAL.with_label_values(&[instrument]).inc();
    }

    /// Record a lifecycle transition.
    pub fn transition(from: &str, to: &str) {
        TRANSITIONS_TOTAL.with_label_values(&[from, to]).inc();
    }

    pub fn lifecycle_rejected(reason: &str) {
        LIFECYCLE_REJECTIONS_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn execution_started() {
        EXECUTIONS_IN_PROGRESS.inc();
    }

    pub fn execution_finished() {
        EXECUTIONS_IN_PROGRESS.dec();
    }

    /// Render the default registry in the Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&prometheus::gather(), &mut buffer)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}
