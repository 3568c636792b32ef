//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `generated_secret_reconciliations_total` - Total number of reconciliations
//! - `generated_secret_reconciliation_errors_total` - Total number of reconciliation errors
//! - `generated_secret_reconciliation_duration_seconds` - Duration of reconciliation operations
//! - `generated_secret_secrets_created_total` - Secret copies created
//! - `generated_secret_secrets_updated_total` - Secret copies updated in place
//! - `generated_secret_secrets_deleted_total` - Secret copies deleted during cleanup or pruning
//! - `generated_secret_drift_detected_total` - Copies found modified out-of-band
//! - `generated_secret_generation_failures_total` - Failed payload generations
//! - `generated_secret_write_conflicts_total` - Conflicts hit by refetch-and-retry writes

use anyhow::Result;
use prometheus::{Encoder, Histogram, IntCounter, Registry, TextEncoder};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "generated_secret_reconciliations_total",
        "Total number of reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "generated_secret_reconciliation_errors_total",
        "Total number of reconciliation errors",
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "generated_secret_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static SECRETS_CREATED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "generated_secret_secrets_created_total",
        "Total number of secret copies created",
    )
    .expect("Failed to create SECRETS_CREATED_TOTAL metric - this should never happen")
});

static SECRETS_UPDATED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "generated_secret_secrets_updated_total",
        "Total number of secret copies updated in place",
    )
    .expect("Failed to create SECRETS_UPDATED_TOTAL metric - this should never happen")
});

static SECRETS_DELETED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "generated_secret_secrets_deleted_total",
        "Total number of secret copies deleted",
    )
    .expect("Failed to create SECRETS_DELETED_TOTAL metric - this should never happen")
});

static DRIFT_DETECTED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "generated_secret_drift_detected_total",
        "Total number of secret copies found modified outside the controller",
    )
    .expect("Failed to create DRIFT_DETECTED_TOTAL metric - this should never happen")
});

static GENERATION_FAILURES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "generated_secret_generation_failures_total",
        "Total number of failed payload generations",
    )
    .expect("Failed to create GENERATION_FAILURES_TOTAL metric - this should never happen")
});

static WRITE_CONFLICTS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "generated_secret_write_conflicts_total",
        "Total number of optimistic concurrency conflicts on retried writes",
    )
    .expect("Failed to create WRITE_CONFLICTS_TOTAL metric - this should never happen")
});

pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(SECRETS_CREATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SECRETS_UPDATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SECRETS_DELETED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DRIFT_DETECTED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(GENERATION_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(WRITE_CONFLICTS_TOTAL.clone()))?;

    Ok(())
}

/// Render the registry in the Prometheus text exposition format
pub fn gather_text() -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_secrets_created() {
    SECRETS_CREATED_TOTAL.inc();
}

pub fn increment_secrets_updated() {
    SECRETS_UPDATED_TOTAL.inc();
}

pub fn increment_secrets_deleted() {
    SECRETS_DELETED_TOTAL.inc();
}

pub fn increment_drift_detected() {
    DRIFT_DETECTED_TOTAL.inc();
}

pub fn increment_generation_failures() {
    GENERATION_FAILURES_TOTAL.inc();
}

pub fn increment_write_conflicts() {
    WRITE_CONFLICTS_TOTAL.inc();
}
