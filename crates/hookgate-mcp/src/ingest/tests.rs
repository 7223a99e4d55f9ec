// crates/hookgate-mcp/src/ingest/tests.rs
// ============================================================================
// Module: Webhook Ingestion Tests
// Description: Unit tests for the inbound verify/replay/enrich pipeline.
// Purpose: Validate status mapping, handler enrichment, and audit records.
// Dependencies: hookgate-mcp, hookgate-core
// ============================================================================

//! ## Overview
//! Signs request bodies with the shared secret at a fixed clock and feeds them
//! to the ingestor, asserting the HTTP-facing response and the audit trail.

// ============================================================================
// SECTION: Lint Configuration
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use hookgate_core::FixedClock;
use hookgate_core::MemoryAuditSink;
use hookgate_core::ReplayGuardConfig;
use hookgate_core::sign_body;
use serde_json::Value;
use serde_json::json;

use super::InboundRequest;
use super::WebhookIngestor;
use super::source_domain;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

const SECRET: &str = "whsec_test";
const NOW: i64 = 1_700_000_000;

fn ingestor() -> (WebhookIngestor, Arc<MemoryAuditSink>) {
    let (ingestor, _clock, audit) = ingestor_with_clock();
    (ingestor, audit)
}

fn ingestor_with_clock() -> (WebhookIngestor, Arc<FixedClock>, Arc<MemoryAuditSink>) {
    let audit = Arc::new(MemoryAuditSink::new());
    let clock = Arc::new(FixedClock::new(NOW));
    let ingestor =
        WebhookIngestor::new(SECRET, ReplayGuardConfig::default(), clock.clone(), audit.clone());
    (ingestor, clock, audit)
}

/// Signed body plus header values.
struct Signed {
    body: Vec<u8>,
    signature: String,
    timestamp: String,
}

fn signed(body: &Value, timestamp: i64) -> Signed {
    Signed {
        body: serde_json::to_vec(body).unwrap(),
        signature: sign_body(SECRET, timestamp, body).unwrap(),
        timestamp: timestamp.to_string(),
    }
}

fn request<'a>(signed: &'a Signed, referer: Option<&'a str>) -> InboundRequest<'a> {
    InboundRequest {
        body: &signed.body,
        signature: Some(&signed.signature),
        timestamp: Some(&signed.timestamp),
        referer,
        origin: None,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn tool_execution_is_enriched_with_tool_and_session_sources() {
    let (ingestor, audit) = ingestor();
    let body = json!({
        "event": "mcp.tool.execute",
        "data": {
            "toolName": "update_cell",
            "sessionId": "s1",
            "parameters": {"rowIndex": 2, "columnId": "name", "value": "x"}
        }
    });
    let delivery = signed(&body, NOW - 10);

    let response = ingestor.ingest(&request(&delivery, Some("https://app.example.com/grid")));

    assert_eq!(response.status, 200);
    assert_eq!(response.body["message"], "Webhook processed successfully");
    let enriched = &response.body["enriched_data"];
    assert_eq!(enriched["sources"], json!(["app.example.com/tool/update_cell"]));
    assert_eq!(enriched["payload"]["columnId"], "name");
    assert_eq!(enriched["metadata"]["additionalSources"], json!(["Session: s1"]));
    assert!(enriched["recordId"].as_str().unwrap().starts_with("sr_"));
    assert!(response.body["processing_time_ms"].is_u64());

    let events = audit.events_named("webhook_ingest");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["outcome"], "accepted");
    assert_eq!(events[0]["webhook_event"], "mcp.tool.execute");
    let fingerprint = events[0]["signature_fingerprint"].as_str().unwrap();
    assert_ne!(fingerprint, delivery.signature);
}

#[test]
fn replayed_signature_is_an_idempotent_success() {
    let (ingestor, audit) = ingestor();
    let delivery = signed(&json!({"event": "mcp.session.completed", "data": {}}), NOW);

    assert_eq!(ingestor.ingest(&request(&delivery, None)).status, 200);
    let replay = ingestor.ingest(&request(&delivery, None));

    assert_eq!(replay.status, 200);
    assert_eq!(replay.body, json!({"message": "Webhook already processed"}));
    assert_eq!(audit.events_named("webhook_ingest")[1]["outcome"], "duplicate");
}

#[test]
fn future_dated_delivery_stays_deduplicated_while_it_can_verify() {
    let (ingestor, clock, audit) = ingestor_with_clock();
    let delivery = signed(
        &json!({"event": "mcp.session.created", "data": {"sessionId": "s1"}}),
        NOW + 299,
    );

    assert_eq!(ingestor.ingest(&request(&delivery, None)).status, 200);
    clock.advance(350);
    let replay = ingestor.ingest(&request(&delivery, None));
    assert_eq!(replay.status, 200);
    assert_eq!(replay.body, json!({"message": "Webhook already processed"}));

    clock.advance(249);
    let last_valid_second = ingestor.ingest(&request(&delivery, None));
    assert_eq!(last_valid_second.body["message"], "Webhook already processed");
    clock.advance(1);
    assert_eq!(ingestor.ingest(&request(&delivery, None)).status, 401);

    let outcomes: Vec<Value> =
        audit.events_named("webhook_ingest").iter().map(|event| event["outcome"].clone()).collect();
    assert_eq!(Value::Array(outcomes), json!(["accepted", "duplicate", "duplicate", "rejected"]));
}

#[test]
fn forged_signature_is_rejected_without_consuming_the_replay_slot() {
    let (ingestor, audit) = ingestor();
    let body = json!({"event": "mcp.session.completed", "data": {"sessionId": "s1"}});
    let genuine = signed(&body, NOW);
    let forged = Signed {
        body: genuine.body.clone(),
        signature: sign_body("wrong-secret", NOW, &body).unwrap(),
        timestamp: genuine.timestamp.clone(),
    };

    let rejected = ingestor.ingest(&request(&forged, None));
    assert_eq!(rejected.status, 401);
    assert_eq!(rejected.body, json!({"error": "Invalid webhook signature"}));
    assert_eq!(ingestor.ingest(&request(&genuine, None)).status, 200);

    let events = audit.events_named("webhook_ingest");
    assert_eq!(events[0]["reason"], "signature_mismatch");
    assert_eq!(events[0]["outcome"], "rejected");
}

#[test]
fn stale_and_future_timestamps_are_rejected_as_expired() {
    let (ingestor, audit) = ingestor();
    let body = json!({"event": "mcp.session.completed", "data": {}});

    for timestamp in [NOW - 301, NOW + 301] {
        let delivery = signed(&body, timestamp);
        let response = ingestor.ingest(&request(&delivery, None));
        assert_eq!(response.status, 401);
        assert_eq!(response.body["error"], "Invalid webhook signature");
    }
    for event in audit.events_named("webhook_ingest") {
        assert_eq!(event["reason"], "timestamp_out_of_tolerance");
    }
}

#[test]
fn missing_headers_are_unauthenticated() {
    let (ingestor, audit) = ingestor();
    let response = ingestor.ingest(&InboundRequest {
        body: br#"{"event":"mcp.session.completed","data":{}}"#,
        ..InboundRequest::default()
    });

    assert_eq!(response.status, 401);
    let events = audit.events_named("webhook_ingest");
    assert_eq!(events[0]["reason"], "missing_signature");
    assert!(events[0]["signature_fingerprint"].is_null());
}

#[test]
fn unknown_event_is_a_client_error() {
    let (ingestor, audit) = ingestor();
    let delivery = signed(&json!({"event": "mcp.other", "data": {}}), NOW);

    let response = ingestor.ingest(&request(&delivery, None));

    assert_eq!(response.status, 400);
    assert_eq!(response.body, json!({"message": "Unhandled event type: mcp.other"}));
    assert_eq!(audit.events_named("webhook_ingest")[0]["outcome"], "unknown_event");
}

#[test]
fn malformed_payload_after_verification_is_a_client_error() {
    let (ingestor, _audit) = ingestor();
    let delivery = signed(
        &json!({"event": "mcp.tool.execute", "data": {"toolName": "x", "parameters": "oops"}}),
        NOW,
    );

    let response = ingestor.ingest(&request(&delivery, None));

    assert_eq!(response.status, 400);
    assert_eq!(response.body, json!({"error": "Malformed webhook payload"}));
}

#[test]
fn resource_update_wraps_string_content() {
    let (ingestor, _audit) = ingestor();
    let delivery = signed(
        &json!({
            "event": "mcp.resource.update",
            "data": {"resourceId": "data_schema", "content": "hello"}
        }),
        NOW,
    );

    let response = ingestor.ingest(&request(&delivery, Some("https://crm.example.org/")));

    let enriched = &response.body["enriched_data"];
    assert_eq!(enriched["payload"], json!({"content": "hello"}));
    assert_eq!(enriched["sources"], json!(["crm.example.org/resource/data_schema"]));
    assert_eq!(enriched["metadata"]["additionalDetails"], "Resource type: unknown");
}

#[test]
fn session_created_merges_context_with_fixed_confidence() {
    let (ingestor, _audit) = ingestor();
    let body = json!({
        "event": "mcp.session.created",
        "data": {"sessionId": "s9", "userId": "u1", "contextData": {"workspace": "w1"}}
    });
    let delivery = signed(&body, NOW);
    let origin_only = InboundRequest {
        origin: Some("https://agent.example.net"),
        ..request(&delivery, None)
    };

    let response = ingestor.ingest(&origin_only);

    let enriched = &response.body["enriched_data"];
    assert_eq!(enriched["confidenceScore"], 90);
    assert_eq!(enriched["payload"], json!({"sessionId": "s9", "userId": "u1", "workspace": "w1"}));
    assert_eq!(enriched["sources"], json!(["agent.example.net/session/s9"]));
    let details = enriched["metadata"]["additionalDetails"].as_str().unwrap();
    assert!(details.starts_with("Session started at 2023-11-14T22:13:20"));
}

#[test]
fn session_completed_reports_duration() {
    let (ingestor, _audit) = ingestor();
    let delivery = signed(
        &json!({
            "event": "mcp.session.completed",
            "data": {"sessionId": "s9", "stats": {"durationMs": 500}}
        }),
        NOW,
    );

    let response = ingestor.ingest(&request(&delivery, None));

    let enriched = &response.body["enriched_data"];
    assert_eq!(enriched["confidenceScore"], 95);
    assert_eq!(enriched["sources"], json!(["unknown/session/s9/completed"]));
    assert_eq!(enriched["payload"]["stats"], json!({"durationMs": 500}));
    assert_eq!(enriched["metadata"]["additionalDetails"], "Session duration: 500ms");
}

#[test]
fn source_domain_prefers_referer_then_origin() {
    assert_eq!(source_domain(Some("https://a.example/x"), Some("https://b.example")), "a.example");
    assert_eq!(source_domain(Some("not a url"), Some("https://b.example")), "b.example");
    assert_eq!(source_domain(None, None), "unknown");
}
