//! Prometheus metrics for the Nonce Service.

use once_cell::sync::Lazy;
use prometheus::{register_counter_vec, register_int_counter, CounterVec, IntCounter};

/// Nonces issued counter.
pub static NONCES_ISSUED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "nonce_service_nonces_issued_total",
        "Total number of nonces issued"
    )
    .expect("Failed to register nonces_issued metric")
});

/// Verifications counter, labelled by outcome.
pub static VERIFICATIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "nonce_service_verifications_total",
        "Total number of nonce verifications",
        &["outcome"]
    )
    .expect("Failed to register verifications metric")
});

/// Configuration changes counter.
pub static CONFIG_CHANGES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "nonce_service_config_changes_total",
        "Total number of configuration changes",
        &["operation"]
    )
    .expect("Failed to register config_changes metric")
});

/// Record a nonce issuance.
pub fn record_nonce_issued() {
    NONCES_ISSUED.inc();
}

/// Record a verification outcome.
pub fn record_verification(outcome: &str) {
    VERIFICATIONS.with_label_values(&[outcome]).inc();
}

/// Record a configuration change (`configure` or `reset`).
pub fn record_config_change(operation: &str) {
    CONFIG_CHANGES.with_label_values(&[operation]).inc();
}
