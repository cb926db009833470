//! Property-based tests for observability.
//!
//! Every issuance, verification and configuration change is counted.

use nonce_service::metrics::{CONFIG_CHANGES, NONCES_ISSUED, VERIFICATIONS};
use nonce_service::{ManualClock, NonceSecret, NonceService};
use proptest::prelude::*;
use std::sync::Arc;
use test_utils::fixtures::{TEST_SECRET, WINDOW_ALIGNED_EPOCH};

/// Generate arbitrary verification outcomes.
fn arb_outcome() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("fresh".to_string()),
        Just("stale".to_string()),
        Just("invalid".to_string()),
    ]
}

fn service() -> NonceService {
    NonceService::builder(NonceSecret::new(TEST_SECRET.to_vec()).unwrap())
        .clock(Arc::new(ManualClock::new(WINDOW_ALIGNED_EPOCH)))
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Recording metrics never panics.
    #[test]
    fn prop_metrics_record_without_panic(outcome in arb_outcome()) {
        nonce_service::metrics::record_nonce_issued();
        nonce_service::metrics::record_verification(&outcome);
        nonce_service::metrics::record_config_change("configure");
    }

    /// Counters only grow.
    #[test]
    fn prop_counters_increment(outcome in arb_outcome()) {
        let before = VERIFICATIONS.with_label_values(&[outcome.as_str()]).get();
        nonce_service::metrics::record_verification(&outcome);
        let after = VERIFICATIONS.with_label_values(&[outcome.as_str()]).get();
        prop_assert!(after > before);
    }
}

#[test]
fn test_service_operations_are_counted() {
    let service = service();

    let issued_before = NONCES_ISSUED.get();
    let invalid_before = VERIFICATIONS.with_label_values(&["invalid"]).get();
    let resets_before = CONFIG_CHANGES.with_label_values(&["reset"]).get();

    let token = service.issue("save", "user-1").unwrap();
    service.verify(Some(token.as_str()), "other", "user-1");
    service.reset();

    assert!(NONCES_ISSUED.get() > issued_before);
    assert!(VERIFICATIONS.with_label_values(&["invalid"]).get() > invalid_before);
    assert!(CONFIG_CHANGES.with_label_values(&["reset"]).get() > resets_before);
}

#[test]
fn test_tracing_init_is_tolerant() {
    let config = rust_common::TracingConfig::default().with_log_level("debug");
    rust_common::init_tracing(&config);
    // A second installation is refused rather than panicking.
    assert!(!rust_common::init_tracing(&config));

    let service = service();
    assert!(service.issue("save", "user-1").is_ok());
}
