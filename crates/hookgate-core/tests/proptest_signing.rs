// crates/hookgate-core/tests/proptest_signing.rs
// ============================================================================
// Module: Signing and Enrichment Property-Based Tests
// Description: Property tests for verifier tolerance and score monotonicity.
// Purpose: Hold the tolerance and monotonicity guarantees across wide inputs.
// ============================================================================

//! Property-based tests for verification and enrichment invariants.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use hookgate_core::WEBHOOK_TOLERANCE_SECS;
use hookgate_core::WebhookEnvelope;
use hookgate_core::confidence_score;
use hookgate_core::sign_body;
use hookgate_core::verify;
use proptest::prelude::*;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

const TOLERANCE: i64 = 300;

fn payload_strategy() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map("[a-z]{1,6}", any::<i64>(), 0 .. 12).prop_map(|map| {
        let mut object = Map::new();
        for (key, value) in map {
            object.insert(key, json!(value));
        }
        object
    })
}

fn source_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1,8}\\.example".prop_map(|host| format!("https://{host}/page")),
        Just("https://github.com/acme".to_string()),
        Just("https://www.linkedin.com/company/acme".to_string()),
        Just("internal".to_string()),
    ]
}

proptest! {
    #[test]
    fn verify_accepts_within_tolerance(
        secret in "[A-Za-z0-9]{1,48}",
        timestamp in 0i64 .. 4_000_000_000,
        skew in -TOLERANCE ..= TOLERANCE,
        amount in any::<i64>(),
    ) {
        let body = json!({"event": "mcp.tool.execute", "data": {"amount": amount}});
        let signature = sign_body(&secret, timestamp, &body).unwrap();
        let envelope = WebhookEnvelope::new(body, timestamp, signature);
        let outcome = verify(&envelope, &secret, WEBHOOK_TOLERANCE_SECS, timestamp + skew);
        prop_assert!(outcome.valid);
    }

    #[test]
    fn verify_rejects_outside_tolerance_even_when_signed(
        secret in "[A-Za-z0-9]{1,48}",
        timestamp in 0i64 .. 4_000_000_000,
        extra in 1i64 .. 1_000_000,
        future in any::<bool>(),
    ) {
        let body = json!({"event": "mcp.session.created", "data": {}});
        let signature = sign_body(&secret, timestamp, &body).unwrap();
        let envelope = WebhookEnvelope::new(body, timestamp, signature);
        let skew = TOLERANCE + extra;
        let now = if future { timestamp + skew } else { timestamp - skew };
        let outcome = verify(&envelope, &secret, WEBHOOK_TOLERANCE_SECS, now);
        prop_assert!(!outcome.valid);
        prop_assert!(outcome.reason.is_some_and(|reason| reason.is_expired()));
    }

    #[test]
    fn distinct_bodies_never_share_signature(
        a in any::<i64>(),
        b in any::<i64>(),
    ) {
        prop_assume!(a != b);
        let first = sign_body("secret", 10, &json!({"data": {"v": a}})).unwrap();
        let second = sign_body("secret", 10, &json!({"data": {"v": b}})).unwrap();
        prop_assert_ne!(first, second);
    }

    #[test]
    fn more_sources_never_lower_the_score(
        payload in payload_strategy(),
        sources in prop::collection::vec(source_strategy(), 0 .. 6),
        extra in prop::collection::vec(source_strategy(), 1 .. 4),
    ) {
        let base = confidence_score(&payload, &sources);
        let mut larger = sources.clone();
        larger.extend(extra);
        prop_assert!(confidence_score(&payload, &larger) >= base);
    }

    #[test]
    fn unrelated_larger_source_sets_never_score_lower(
        payload in payload_strategy(),
        smaller in prop::collection::vec(source_strategy(), 0 .. 4),
        larger in prop::collection::vec(source_strategy(), 4 .. 8),
    ) {
        prop_assert!(
            confidence_score(&payload, &larger) >= confidence_score(&payload, &smaller)
        );
        prop_assert!(confidence_score(&payload, &larger) <= 100);
    }
}
