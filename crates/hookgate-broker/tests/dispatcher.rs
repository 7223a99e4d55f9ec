// crates/hookgate-broker/tests/dispatcher.rs
// ============================================================================
// Module: Webhook Dispatcher HTTP Tests
// Description: End-to-end delivery against local HTTP receivers.
// Purpose: Verify wire headers, signatures, and partial-failure fan-out.
// Dependencies: hookgate-broker, hookgate-core, tiny_http, tokio, url
// ============================================================================
//! ## Overview
//! Spins up `tiny_http` receivers on ephemeral ports and checks that what
//! arrives on the wire verifies with the destination secret.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::net::TcpListener;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use hookgate_broker::HttpTransport;
use hookgate_broker::WebhookDispatcher;
use hookgate_core::SystemClock;
use hookgate_core::WEBHOOK_TOLERANCE_SECS;
use hookgate_core::WebhookEnvelope;
use hookgate_core::WebhookEvent;
use hookgate_core::verify;
use serde_json::json;
use tiny_http::Response;
use tiny_http::Server;
use url::Url;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// One request as seen by a receiver.
struct Captured {
    signature: Option<String>,
    timestamp: Option<String>,
    content_type: Option<String>,
    body: Vec<u8>,
}

fn header(request: &tiny_http::Request, name: &str) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|header| header.field.as_str().as_str().eq_ignore_ascii_case(name))
        .map(|header| header.value.as_str().to_string())
}

/// Starts a receiver answering `status` to `count` requests.
fn receiver(status: u16, count: usize) -> (Url, JoinHandle<Vec<Captured>>) {
    let server = Server::http("127.0.0.1:0").expect("http server");
    let url = Url::parse(&format!("http://{}/hook", server.server_addr())).expect("url");
    let handle = std::thread::spawn(move || {
        let mut captured = Vec::new();
        for _ in 0 .. count {
            let Ok(mut request) = server.recv() else {
                break;
            };
            let mut body = Vec::new();
            request.as_reader().read_to_end(&mut body).expect("read body");
            captured.push(Captured {
                signature: header(&request, "x-webhook-signature"),
                timestamp: header(&request, "x-webhook-timestamp"),
                content_type: header(&request, "content-type"),
                body,
            });
            request.respond(Response::empty(status)).expect("respond");
        }
        captured
    });
    (url, handle)
}

/// Returns a loopback URL with nothing listening.
fn closed_url() -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    Url::parse(&format!("http://{addr}/hook")).expect("url")
}

fn dispatcher() -> WebhookDispatcher {
    let transport = HttpTransport::new(Duration::from_secs(2), "hookgate-test").expect("transport");
    WebhookDispatcher::builder()
        .transport(Arc::new(transport))
        .clock(Arc::new(SystemClock))
        .timeout(Duration::from_secs(3))
        .build()
        .expect("dispatcher")
}

fn assert_verifies(captured: &Captured, secret: &str) {
    assert_eq!(captured.content_type.as_deref(), Some("application/json"));
    let envelope = WebhookEnvelope::from_http(
        &captured.body,
        captured.signature.as_deref(),
        captured.timestamp.as_deref(),
    )
    .expect("envelope");
    let now = envelope.timestamp_seconds;
    assert!(verify(&envelope, secret, WEBHOOK_TOLERANCE_SECS, now).valid);
    assert!(!verify(&envelope, "wrong-secret", WEBHOOK_TOLERANCE_SECS, now).valid);
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn broadcast_reaches_live_receivers_despite_unreachable_one() {
    let (first_url, first) = receiver(200, 1);
    let (second_url, second) = receiver(202, 1);
    let dispatcher = dispatcher();
    let registry = dispatcher.registry();
    registry.add_destination("alpha", first_url, "secret-alpha").unwrap();
    registry.add_destination("beta", second_url, "secret-beta").unwrap();
    registry.add_destination("gamma", closed_url(), "secret-gamma").unwrap();

    let event = WebhookEvent::new("mcp.session.created", json!({"sessionId": "s-1"}));
    let report = dispatcher.broadcast(&event).await;

    assert_eq!(report.delivered.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].destination_id, "gamma");
    assert_eq!(report.delivered[1].status, 202);

    let first = first.join().expect("alpha thread");
    let second = second.join().expect("beta thread");
    assert_verifies(&first[0], "secret-alpha");
    assert_verifies(&second[0], "secret-beta");
    let body: serde_json::Value = serde_json::from_slice(&first[0].body).unwrap();
    assert_eq!(body["event"], "mcp.session.created");
    assert_eq!(body["data"]["sessionId"], "s-1");
    assert_eq!(body["id"], report.delivered[0].delivery_id.as_str());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn non_success_status_is_a_failure() {
    let (url, handle) = receiver(500, 1);
    let dispatcher = dispatcher();
    dispatcher.registry().add_destination("flaky", url, "s").unwrap();

    let report = dispatcher.broadcast(&WebhookEvent::new("mcp.tool.execute", json!({}))).await;

    assert!(report.delivered.is_empty());
    assert!(report.failed[0].error.contains("500"));
    assert!(dispatcher.registry().get("flaky").is_some());
    handle.join().expect("receiver thread");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn same_event_twice_is_never_bit_identical() {
    let (url, handle) = receiver(200, 2);
    let dispatcher = dispatcher();
    dispatcher.registry().add_destination("dest", url, "s").unwrap();
    let event = WebhookEvent::new("mcp.resource.update", json!({"resource": "sheet"}));

    dispatcher.send_to_destination("dest", &event).await.unwrap();
    dispatcher.send_to_destination("dest", &event).await.unwrap();

    let captured = handle.join().expect("receiver thread");
    assert_eq!(captured.len(), 2);
    assert_ne!(captured[0].body, captured[1].body);
    assert_ne!(captured[0].signature, captured[1].signature);
}
