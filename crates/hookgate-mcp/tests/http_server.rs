// crates/hookgate-mcp/tests/http_server.rs
// ============================================================================
// Module: Hookgate Server HTTP Tests
// Description: End-to-end tests over a real listener and loopback receivers.
// Purpose: Validate routes, JSON-RPC sessions, and signed lifecycle deliveries.
// Dependencies: hookgate-mcp, hookgate-config, hookgate-core, reqwest, tiny_http
// ============================================================================
//! ## Overview
//! Each test binds the server on an ephemeral port, drives it with reqwest,
//! and observes outbound deliveries on `tiny_http` receivers.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::sync::Arc;
use std::thread::JoinHandle;

use hookgate_config::HookgateConfig;
use hookgate_core::MemoryAuditSink;
use hookgate_core::WEBHOOK_TOLERANCE_SECS;
use hookgate_core::WebhookEnvelope;
use hookgate_core::sign_body;
use hookgate_core::verify;
use hookgate_mcp::McpHandle;
use hookgate_mcp::McpServer;
use hookgate_mcp::McpServerError;
use serde_json::Value;
use serde_json::json;
use tiny_http::Response;
use tiny_http::Server;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const INBOUND_SECRET: &str = "inbound-secret";
const OBSERVER_SECRET: &str = "observer-secret";

/// One delivery as seen by a receiver.
struct Captured {
    envelope: WebhookEnvelope,
}

fn header(request: &tiny_http::Request, name: &str) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|header| header.field.as_str().as_str().eq_ignore_ascii_case(name))
        .map(|header| header.value.as_str().to_string())
}

/// Starts a receiver accepting `count` deliveries.
fn receiver(count: usize) -> (String, JoinHandle<Vec<Captured>>) {
    let server = Server::http("127.0.0.1:0").expect("http server");
    let url = format!("http://{}/hook", server.server_addr());
    let handle = std::thread::spawn(move || {
        let mut captured = Vec::new();
        for _ in 0 .. count {
            let Ok(mut request) = server.recv() else {
                break;
            };
            let mut body = Vec::new();
            request.as_reader().read_to_end(&mut body).expect("read body");
            let envelope = WebhookEnvelope::from_http(
                &body,
                header(&request, "x-webhook-signature").as_deref(),
                header(&request, "x-webhook-timestamp").as_deref(),
            )
            .expect("envelope");
            captured.push(Captured {
                envelope,
            });
            request.respond(Response::empty(200)).expect("respond");
        }
        captured
    });
    (url, handle)
}

fn verifies(captured: &Captured, secret: &str) -> bool {
    let now = captured.envelope.timestamp_seconds;
    verify(&captured.envelope, secret, WEBHOOK_TOLERANCE_SECS, now).valid
}

/// Running server under test.
struct Running {
    base: String,
    client: reqwest::Client,
    handle: McpHandle,
    audit: Arc<MemoryAuditSink>,
    shutdown: oneshot::Sender<()>,
    task: tokio::task::JoinHandle<Result<usize, McpServerError>>,
}

impl Running {
    async fn post(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client.post(format!("{}{path}", self.base)).json(body).send().await.expect("post")
    }

    async fn rpc(&self, session: Option<&str>, method: &str, params: Value) -> (u16, Value) {
        let mut request = self.client.post(format!("{}/rpc", self.base)).json(&json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        }));
        if let Some(session) = session {
            request = request.header("mcp-session-id", session);
        }
        let response = request.send().await.expect("rpc");
        let status = response.status().as_u16();
        (status, response.json().await.expect("rpc json"))
    }

    async fn stop(self) -> usize {
        self.shutdown.send(()).expect("signal shutdown");
        self.task.await.expect("join").expect("serve")
    }
}

fn config(transport: &str, destination: Option<&str>) -> HookgateConfig {
    let mut toml = format!(
        "[server]\ntransport = \"{transport}\"\nbind = \"127.0.0.1:0\"\n\n[webhook]\nsecret = \
         \"{INBOUND_SECRET}\"\n\n[delivery]\ntimeout_ms = 2000\n\n[audit]\nsink = \"none\"\n"
    );
    if let Some(url) = destination {
        toml.push_str(&format!(
            "\n[[destinations]]\nid = \"observer\"\ncallback_url = \"{url}\"\nsecret = \
             \"{OBSERVER_SECRET}\"\n"
        ));
    }
    HookgateConfig::from_toml(&toml).expect("config")
}

async fn start(config: &HookgateConfig) -> Running {
    let audit = Arc::new(MemoryAuditSink::new());
    let server = McpServer::from_config_with_audit(config, audit.clone()).expect("server");
    let handle = server.handle().clone();
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let base = format!("http://{}", listener.local_addr().expect("addr"));
    let (shutdown, signal) = oneshot::channel::<()>();
    let task = tokio::spawn(server.serve_until(listener, async move {
        let _ = signal.await;
    }));
    Running {
        base,
        client: reqwest::Client::new(),
        handle,
        audit,
        shutdown,
        task,
    }
}

fn now() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn inbound_webhooks_are_verified_deduplicated_and_enriched() {
    let server = start(&config("http", None)).await;

    let health = server.client.get(format!("{}/health", server.base)).send().await.unwrap();
    assert_eq!(health.status().as_u16(), 200);
    assert_eq!(health.json::<Value>().await.unwrap(), json!({"status": "ok"}));

    let body = json!({
        "event": "mcp.tool.execute",
        "data": {"toolName": "update_cell", "sessionId": "s1", "parameters": {"rowIndex": 1}}
    });
    let timestamp = now();
    let signature = sign_body(INBOUND_SECRET, timestamp, &body).unwrap();
    let send = |signature: String| {
        server
            .client
            .post(format!("{}/webhooks/mcp", server.base))
            .header("x-webhook-signature", signature)
            .header("x-webhook-timestamp", timestamp.to_string())
            .header("referer", "https://agent.example.com/session")
            .json(&body)
            .send()
    };

    let accepted = send(signature.clone()).await.unwrap();
    assert_eq!(accepted.status().as_u16(), 200);
    let accepted: Value = accepted.json().await.unwrap();
    assert_eq!(accepted["message"], "Webhook processed successfully");
    assert_eq!(
        accepted["enriched_data"]["sources"],
        json!(["agent.example.com/tool/update_cell"])
    );

    let replay = send(signature).await.unwrap();
    assert_eq!(replay.status().as_u16(), 200);
    assert_eq!(replay.json::<Value>().await.unwrap()["message"], "Webhook already processed");

    let forged = send("00".repeat(32)).await.unwrap();
    assert_eq!(forged.status().as_u16(), 401);

    let unknown = json!({"event": "mcp.unknown", "data": {}});
    let response = server
        .client
        .post(format!("{}/webhooks/mcp", server.base))
        .header("x-webhook-signature", sign_body(INBOUND_SECRET, timestamp, &unknown).unwrap())
        .header("x-webhook-timestamp", timestamp.to_string())
        .json(&unknown)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let outcomes: Vec<String> = server
        .audit
        .events_named("webhook_ingest")
        .iter()
        .map(|event| event["outcome"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(outcomes, vec!["accepted", "duplicate", "rejected", "unknown_event"]);
    assert_eq!(server.stop().await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn registration_validates_and_sends_a_signed_test_delivery() {
    let server = start(&config("http", None)).await;
    let (url, received) = receiver(1);

    let missing = server.post("/webhooks/register", &json!({"callbackUrl": url})).await;
    assert_eq!(missing.status().as_u16(), 400);
    assert_eq!(missing.json::<Value>().await.unwrap()["error"], "Missing required fields");

    let bad_scheme = server
        .post(
            "/webhooks/register",
            &json!({"callbackUrl": "ftp://example.com/x", "destinationId": "crm"}),
        )
        .await;
    assert_eq!(bad_scheme.status().as_u16(), 400);

    let registered = server
        .post(
            "/webhooks/register",
            &json!({"callbackUrl": url, "destinationId": "crm", "clientSecret": "crm-secret"}),
        )
        .await;
    assert_eq!(registered.status().as_u16(), 200);
    assert_eq!(registered.json::<Value>().await.unwrap()["success"], true);

    let captured = received.join().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].envelope.event(), Some("mcp.webhook.registered"));
    assert!(verifies(&captured[0], "crm-secret"));
    assert!(!verifies(&captured[0], INBOUND_SECRET));
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn registration_without_client_secret_uses_the_inbound_secret() {
    let server = start(&config("http", None)).await;
    let (url, received) = receiver(1);

    let registered = server
        .post("/webhooks/register", &json!({"callbackUrl": url, "destinationId": "crm"}))
        .await;
    assert_eq!(registered.status().as_u16(), 200);

    let captured = received.join().unwrap();
    assert!(verifies(&captured[0], INBOUND_SECRET));
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn session_lifecycle_and_tool_calls_broadcast_in_order() {
    let (url, received) = receiver(3);
    let server = start(&config("http", Some(&url))).await;

    let (status, initialized) = server.rpc(None, "initialize", json!({})).await;
    assert_eq!(status, 200);
    let result = &initialized["result"];
    let session_id = result["sessionId"].as_str().unwrap().to_string();
    assert_eq!(result["tools"].as_array().unwrap().len(), 9);
    assert_eq!(result["resources"][0]["id"], "data_schema");
    assert_eq!(result["prompts"].as_array().unwrap().len(), 4);

    let (status, called) = server
        .rpc(
            Some(&session_id),
            "tools/call",
            json!({
                "name": "update_cell",
                "arguments": {"rowIndex": 2, "columnId": "name", "value": "x"}
            }),
        )
        .await;
    assert_eq!(status, 200);
    let content = &called["result"]["content"][0];
    assert_eq!(content["type"], "json");
    assert_eq!(content["json"]["rowIndex"], 2);

    let (status, unknown) =
        server.rpc(Some(&session_id), "tools/call", json!({"name": "nope"})).await;
    assert_eq!(status, 400);
    assert_eq!(unknown["error"]["code"], -32601);

    let (status, invalid) = server
        .rpc(Some(&session_id), "tools/call", json!({"name": "update_cell", "arguments": {}}))
        .await;
    assert_eq!(status, 400);
    assert_eq!(invalid["error"]["code"], -32602);

    let (_, closed) = server
        .rpc(Some(&session_id), "session/close", json!({"stats": {"durationMs": 500}}))
        .await;
    assert_eq!(closed["result"]["transition"], "completed");
    let (_, again) = server.rpc(Some(&session_id), "session/close", json!({})).await;
    assert_eq!(again["result"]["transition"], "already_completed");

    let captured = received.join().unwrap();
    let events: Vec<&str> =
        captured.iter().map(|delivery| delivery.envelope.event().unwrap()).collect();
    assert_eq!(events, vec!["mcp.session.created", "mcp.tool.execute", "mcp.session.completed"]);
    assert!(captured.iter().all(|delivery| verifies(delivery, OBSERVER_SECRET)));
    assert_eq!(captured[1].envelope.data()["parameters"]["columnId"], "name");
    assert_eq!(captured[2].envelope.data()["stats"], json!({"durationMs": 500}));
    assert_eq!(server.stop().await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn prompts_resources_and_inhabitation_over_rpc() {
    let server = start(&config("http", None)).await;

    let inhabit = json!({"name": "inhabit", "arguments": {"targetId": "A"}});
    let (_, first) = server.rpc(None, "prompts/get", inhabit).await;
    assert_eq!(first["result"]["accepted"], true);
    assert!(server.handle.is_inhabited("A"));
    let (_, second) = server
        .rpc(
            None,
            "prompts/get",
            json!({"name": "inhabit", "arguments": {"targetId": "A", "context": {"by": "b"}}}),
        )
        .await;
    assert_eq!(second["result"]["accepted"], false);
    let release = json!({"name": "release", "arguments": {"targetId": "A"}});
    let (_, released) = server.rpc(None, "prompts/get", release).await;
    assert_eq!(released["result"]["released"], true);
    assert!(!server.handle.is_inhabited("A"));

    let (_, report) = server
        .rpc(
            None,
            "prompts/get",
            json!({"name": "generate_report", "arguments": {"data": "x", "reportType": "sales"}}),
        )
        .await;
    let text = report["result"]["messages"][0]["content"]["text"].as_str().unwrap();
    assert!(text.starts_with("Generate a sales report"));

    let (_, schema) = server.rpc(None, "resources/read", json!({"id": "data_schema"})).await;
    let content: Value =
        serde_json::from_str(schema["result"]["contents"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(content["tables"][1]["name"], "Deals");
    let (status, missing) = server.rpc(None, "resources/read", json!({"id": "nope"})).await;
    assert_eq!(status, 200);
    assert_eq!(missing["error"]["code"], -32004);

    let (status, unknown) = server.rpc(None, "no/such", json!({})).await;
    assert_eq!(status, 400);
    assert_eq!(unknown["error"]["code"], -32601);
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sse_transport_frames_one_event_per_request() {
    let server = start(&config("sse", None)).await;

    let response = server
        .client
        .post(format!("{}/rpc", server.base))
        .json(&json!({"jsonrpc": "2.0", "id": 7, "method": "tools/list"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/event-stream"));
    let text = response.text().await.unwrap();
    let data = text.lines().find_map(|line| line.strip_prefix("data: ")).unwrap();
    let payload: Value = serde_json::from_str(data).unwrap();
    assert_eq!(payload["id"], 7);
    assert_eq!(payload["result"]["tools"].as_array().unwrap().len(), 9);
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_completes_open_sessions() {
    let server = start(&config("http", None)).await;
    let (_, first) = server.rpc(None, "initialize", json!({})).await;
    let (_, _second) = server.rpc(None, "initialize", json!({})).await;
    let first_id = first["result"]["sessionId"].as_str().unwrap().to_string();
    server.rpc(Some(&first_id), "session/close", json!({})).await;

    assert_eq!(server.stop().await, 1);
}
