// crates/hookgate-mcp/src/server.rs
// ============================================================================
// Module: Hookgate Server
// Description: HTTP routes for webhooks, registration, and JSON-RPC sessions.
// Purpose: Expose the MCP service and webhook pipeline over axum.
// Dependencies: axum, hookgate-broker, hookgate-config, hookgate-core, tokio
// ============================================================================

//! ## Overview
//! [`McpServer`] assembles the runtime from [`HookgateConfig`]: the audit
//! sink, the outbound [`WebhookDispatcher`] with its pre-registered
//! destinations, the inbound [`WebhookIngestor`], and the [`McpService`]
//! actor. It serves four routes:
//!
//! | Route | Handler |
//! |-------|---------|
//! | `POST /webhooks/mcp` | inbound webhook pipeline |
//! | `POST /webhooks/register` | destination registration with a test delivery |
//! | `POST /rpc` | JSON-RPC session transport (plain JSON or SSE framing) |
//! | `GET /health` | liveness |
//!
//! Security posture: every request body is untrusted and size-capped.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::response::Sse;
use axum::response::sse::Event;
use axum::routing::get;
use axum::routing::post;
use hookgate_broker::DestinationRegistry;
use hookgate_broker::EventPublisher;
use hookgate_broker::HttpTransport;
use hookgate_broker::WebhookDispatcher;
use hookgate_config::AuditConfig;
use hookgate_config::AuditSinkKind;
use hookgate_config::ConfigError;
use hookgate_config::HookgateConfig;
use hookgate_config::ServerTransport;
use hookgate_config::validate_callback_url;
use hookgate_config::validate_destination_id;
use hookgate_core::AuditSink;
use hookgate_core::Clock;
use hookgate_core::FileAuditSink;
use hookgate_core::NoopAuditSink;
use hookgate_core::ReplayGuardConfig;
use hookgate_core::StderrAuditSink;
use hookgate_core::SystemClock;
use hookgate_core::WEBHOOK_TOLERANCE_SECS;
use hookgate_core::WebhookEvent;
use hookgate_core::envelope::SIGNATURE_HEADER;
use hookgate_core::envelope::TIMESTAMP_HEADER;
use hookgate_core::event_names;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_stream::wrappers::ReceiverStream;

use crate::catalog::builtin_prompts;
use crate::catalog::builtin_resources;
use crate::catalog::render_prompt;
use crate::ingest::InboundRequest;
use crate::ingest::WebhookIngestor;
use crate::service::DEFAULT_REQUEST_TIMEOUT;
use crate::service::McpHandle;
use crate::service::McpService;
use crate::service::ServiceError;
use crate::tools::ToolError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header carrying the session id.
pub const SESSION_HEADER: &str = "mcp-session-id";
/// Server name advertised by `initialize`.
const SERVER_NAME: &str = "hookgate";
/// Serialized fallback when a JSON-RPC response cannot be encoded.
const SERIALIZATION_FALLBACK: &str =
    "{\"jsonrpc\":\"2.0\",\"id\":null,\"error\":{\"code\":-32060,\"message\":\"serialization \
     failed\"}}";

// ============================================================================
// SECTION: Server
// ============================================================================

/// Assembled Hookgate server.
pub struct McpServer {
    /// Shared handler state.
    state: Arc<ServerState>,
    /// Address to bind.
    bind: SocketAddr,
    /// Request body cap.
    max_body_bytes: usize,
}

impl McpServer {
    /// Builds a server with the audit sink named in the configuration.
    ///
    /// Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError`] when the configuration cannot be realized.
    pub fn from_config(config: &HookgateConfig) -> Result<Self, McpServerError> {
        let audit = build_audit_sink(&config.audit)?;
        Self::from_config_with_audit(config, audit)
    }

    /// Builds a server that records to `audit`.
    ///
    /// Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError`] when the configuration cannot be realized.
    pub fn from_config_with_audit(
        config: &HookgateConfig,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, McpServerError> {
        let config_error = |err: ConfigError| McpServerError::Config(err.to_string());
        config.validate().map_err(config_error)?;
        tokio::runtime::Handle::try_current()
            .map_err(|_| McpServerError::Init("tokio runtime required".to_string()))?;
        let bind = config.server.bind_addr().map_err(config_error)?;
        let secret = config.webhook.resolve_secret().map_err(config_error)?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let registry = Arc::new(DestinationRegistry::new());
        for destination in &config.destinations {
            let url = validate_callback_url(
                &destination.callback_url,
                config.delivery.allow_insecure_http,
            )
            .map_err(config_error)?;
            let secret = destination.resolve_secret().map_err(config_error)?;
            registry
                .add_destination(destination.id.clone(), url, secret)
                .map_err(|err| McpServerError::Init(err.to_string()))?;
        }

        let timeout = Duration::from_millis(config.delivery.timeout_ms);
        let transport = HttpTransport::new(timeout, &config.delivery.user_agent)
            .map_err(|err| McpServerError::Init(err.to_string()))?;
        let dispatcher = Arc::new(
            WebhookDispatcher::builder()
                .registry(registry)
                .transport(Arc::new(transport))
                .clock(Arc::clone(&clock))
                .audit(Arc::clone(&audit))
                .timeout(timeout)
                .build()
                .map_err(|err| McpServerError::Init(err.to_string()))?,
        );
        let publisher: Arc<dyn EventPublisher> = dispatcher.clone();

        let service = McpService::with_builtin_tools(&publisher, &clock, &audit)
            .map_err(|err| McpServerError::Init(err.to_string()))?;
        let handle = service.spawn(DEFAULT_REQUEST_TIMEOUT.saturating_add(timeout));
        let ingestor = WebhookIngestor::new(
            secret,
            ReplayGuardConfig {
                window_seconds: WEBHOOK_TOLERANCE_SECS,
                max_entries: config.webhook.replay_max_entries,
            },
            Arc::clone(&clock),
            audit,
        );

        Ok(Self {
            state: Arc::new(ServerState {
                handle,
                ingestor,
                dispatcher,
                clock,
                transport: config.server.transport,
                allow_insecure_http: config.delivery.allow_insecure_http,
            }),
            bind,
            max_body_bytes: config.server.max_body_bytes,
        })
    }

    /// Returns the service handle.
    #[must_use]
    pub fn handle(&self) -> &McpHandle {
        &self.state.handle
    }

    /// Returns the outbound dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<WebhookDispatcher> {
        &self.state.dispatcher
    }

    /// Returns the configured bind address.
    #[must_use]
    pub const fn bind_addr(&self) -> SocketAddr {
        self.bind
    }

    /// Builds the axum router.
    #[must_use]
    pub fn router(&self) -> Router {
        let rpc = match self.state.transport {
            ServerTransport::Http => post(handle_http),
            ServerTransport::Sse => post(handle_sse),
        };
        Router::new()
            .route("/webhooks/mcp", post(handle_webhook))
            .route("/webhooks/register", post(handle_register))
            .route("/rpc", rpc)
            .route("/health", get(handle_health))
            .layer(DefaultBodyLimit::max(self.max_body_bytes))
            .with_state(Arc::clone(&self.state))
    }

    /// Binds the configured address and serves until the process exits.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError::Transport`] when binding or serving fails.
    pub async fn serve(self) -> Result<usize, McpServerError> {
        let listener = TcpListener::bind(self.bind)
            .await
            .map_err(|_| McpServerError::Transport("http bind failed".to_string()))?;
        self.serve_until(listener, std::future::pending()).await
    }

    /// Serves on `listener` until `shutdown` resolves, then shuts the service
    /// down and returns how many open sessions were completed.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError::Transport`] when serving fails.
    pub async fn serve_until<F>(
        self,
        listener: TcpListener,
        shutdown: F,
    ) -> Result<usize, McpServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|_| McpServerError::Transport("http server failed".to_string()))?;
        self.state
            .handle
            .shutdown()
            .await
            .map_err(|err| McpServerError::Transport(err.to_string()))
    }
}

/// Builds the audit sink selected by configuration.
///
/// # Errors
///
/// Returns [`McpServerError`] when the file sink cannot be opened.
pub fn build_audit_sink(config: &AuditConfig) -> Result<Arc<dyn AuditSink>, McpServerError> {
    match config.sink {
        AuditSinkKind::Stderr => Ok(Arc::new(StderrAuditSink)),
        AuditSinkKind::None => Ok(Arc::new(NoopAuditSink)),
        AuditSinkKind::File => {
            let path = config
                .path
                .as_deref()
                .ok_or_else(|| McpServerError::Config("audit.path required".to_string()))?;
            let sink = FileAuditSink::new(Path::new(path))
                .map_err(|err| McpServerError::Init(format!("audit log open failed: {err}")))?;
            Ok(Arc::new(sink))
        }
    }
}

/// Shared server state for handlers.
struct ServerState {
    /// MCP service handle.
    handle: McpHandle,
    /// Inbound webhook pipeline.
    ingestor: WebhookIngestor,
    /// Outbound dispatcher.
    dispatcher: Arc<WebhookDispatcher>,
    /// Clock for event timestamps.
    clock: Arc<dyn Clock>,
    /// Session transport framing.
    transport: ServerTransport,
    /// Allow `http://` registration callbacks.
    allow_insecure_http: bool,
}

// ============================================================================
// SECTION: Webhook Routes
// ============================================================================

/// Returns a header value as text.
fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Builds a JSON response.
fn json_response(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

/// Handles inbound webhook deliveries.
async fn handle_webhook(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Response {
    let response = state.ingestor.ingest(&InboundRequest {
        body: &bytes,
        signature: header_value(&headers, SIGNATURE_HEADER),
        timestamp: header_value(&headers, TIMESTAMP_HEADER),
        referer: header_value(&headers, "referer"),
        origin: header_value(&headers, "origin"),
    });
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    json_response(status, response.body)
}

/// Webhook registration request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    /// Callback URL.
    #[serde(default)]
    callback_url: Option<String>,
    /// Destination id.
    #[serde(default)]
    destination_id: Option<String>,
    /// Shared secret; defaults to the inbound secret.
    #[serde(default)]
    client_secret: Option<String>,
}

/// Handles destination registration.
async fn handle_register(State(state): State<Arc<ServerState>>, bytes: Bytes) -> Response {
    let Ok(request) = serde_json::from_slice::<RegisterRequest>(&bytes) else {
        return json_response(
            StatusCode::BAD_REQUEST,
            json!({"error": "Invalid registration payload"}),
        );
    };
    let present = |value: Option<String>| value.filter(|value| !value.trim().is_empty());
    let (Some(callback_url), Some(destination_id)) =
        (present(request.callback_url), present(request.destination_id))
    else {
        return json_response(
            StatusCode::BAD_REQUEST,
            json!({"error": "Missing required fields"}),
        );
    };
    let url = match validate_destination_id(&destination_id)
        .and_then(|()| validate_callback_url(&callback_url, state.allow_insecure_http))
    {
        Ok(url) => url,
        Err(err) => {
            return json_response(StatusCode::BAD_REQUEST, json!({"error": err.to_string()}));
        }
    };
    let secret = present(request.client_secret)
        .unwrap_or_else(|| state.ingestor.secret().to_string());
    if state.dispatcher.registry().add_destination(destination_id.clone(), url, secret).is_err() {
        return json_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"error": "Error registering webhook"}),
        );
    }

    let event = WebhookEvent::new(
        event_names::WEBHOOK_REGISTERED,
        json!({
            "message": "Webhook registration successful",
            "timestamp": state.clock.now_rfc3339(),
        }),
    );
    // Test delivery outcome is audited by the dispatcher only.
    let _ = state.dispatcher.send_to_destination(&destination_id, &event).await;

    json_response(
        StatusCode::OK,
        json!({"success": true, "message": "Webhook registered successfully"}),
    )
}

/// Liveness probe.
async fn handle_health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

// ============================================================================
// SECTION: JSON-RPC Transport
// ============================================================================

/// Handles JSON-RPC requests with plain JSON responses.
async fn handle_http(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Response {
    let reply = parse_request(&state, &headers, &bytes).await;
    let mut response = (reply.status, Json(reply.response)).into_response();
    attach_session(&mut response, reply.session_id.as_deref());
    response
}

/// Handles JSON-RPC requests with one server-sent event per response.
async fn handle_sse(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Response {
    let reply = parse_request(&state, &headers, &bytes).await;
    let (tx, rx) = tokio::sync::mpsc::channel::<Result<Event, Infallible>>(1);
    let payload = serde_json::to_string(&reply.response)
        .unwrap_or_else(|_| SERIALIZATION_FALLBACK.to_string());
    let _ = tx.send(Ok(Event::default().data(payload))).await;
    let mut response = (reply.status, Sse::new(ReceiverStream::new(rx))).into_response();
    attach_session(&mut response, reply.session_id.as_deref());
    response
}

/// Echoes the session id header when known.
fn attach_session(response: &mut Response, session_id: Option<&str>) {
    if let Some(value) = session_id.and_then(|id| HeaderValue::from_str(id).ok()) {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
}

/// Incoming JSON-RPC request payload.
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    /// JSON-RPC protocol version.
    jsonrpc: String,
    /// Request identifier.
    id: Value,
    /// Method name.
    method: String,
    /// Optional parameters payload.
    params: Option<Value>,
}

/// JSON-RPC response envelope.
#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    /// JSON-RPC protocol version.
    jsonrpc: &'static str,
    /// Request identifier.
    id: Value,
    /// Successful result payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    /// Error payload when the request fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

/// JSON-RPC error payload.
#[derive(Debug, Serialize)]
struct JsonRpcError {
    /// Error code.
    code: i64,
    /// Human-readable error message.
    message: String,
}

/// Dispatch result ready for framing.
struct RpcReply {
    /// HTTP status.
    status: StatusCode,
    /// Session id to echo.
    session_id: Option<String>,
    /// JSON-RPC envelope.
    response: JsonRpcResponse,
}

/// Failure of a JSON-RPC method.
#[derive(Debug)]
struct RpcFailure {
    /// HTTP status.
    status: StatusCode,
    /// JSON-RPC error code.
    code: i64,
    /// Error message.
    message: String,
}

impl RpcFailure {
    /// Builds a failure.
    fn new(status: StatusCode, code: i64, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    /// Invalid parameters (-32602).
    fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, -32602, message)
    }

    /// Unknown resource or prompt (-32004).
    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, -32004, message)
    }
}

impl From<ToolError> for RpcFailure {
    fn from(error: ToolError) -> Self {
        match error {
            ToolError::UnknownTool(_) => {
                Self::new(StatusCode::BAD_REQUEST, -32601, "unknown tool")
            }
            ToolError::InvalidParams(message) => Self::invalid_params(message),
            err @ ToolError::ExecutionFailed {
                ..
            } => Self::new(StatusCode::OK, -32010, err.to_string()),
            err @ ToolError::DuplicateTool(_) => Self::new(StatusCode::OK, -32050, err.to_string()),
        }
    }
}

impl From<ServiceError> for RpcFailure {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::Tool(err) => err.into(),
            other => Self::new(StatusCode::OK, -32050, other.to_string()),
        }
    }
}

/// Serializes a method result.
fn to_result<T: Serialize>(value: &T) -> Result<Value, RpcFailure> {
    serde_json::to_value(value)
        .map_err(|_| RpcFailure::new(StatusCode::OK, -32060, "serialization failed"))
}

/// Parses a JSON-RPC payload and dispatches it.
async fn parse_request(state: &ServerState, headers: &HeaderMap, bytes: &Bytes) -> RpcReply {
    let session_id = header_value(headers, SESSION_HEADER).map(str::to_string);
    match serde_json::from_slice::<JsonRpcRequest>(bytes.as_ref()) {
        Ok(request) => handle_request(state, session_id, request).await,
        Err(_) => reply(
            Value::Null,
            session_id,
            Err(RpcFailure::new(StatusCode::BAD_REQUEST, -32600, "invalid json-rpc request")),
        ),
    }
}

/// Dispatches a JSON-RPC request to the service.
async fn handle_request(
    state: &ServerState,
    session_id: Option<String>,
    request: JsonRpcRequest,
) -> RpcReply {
    if request.jsonrpc != "2.0" {
        let failure = RpcFailure::new(StatusCode::BAD_REQUEST, -32600, "invalid json-rpc version");
        return reply(request.id, session_id, Err(failure));
    }
    let params = request.params.unwrap_or(Value::Null);
    let result = match request.method.as_str() {
        "initialize" => initialize(state).await,
        "tools/list" => {
            to_result(&state.handle.tool_definitions()).map(|tools| json!({"tools": tools}))
        }
        "tools/call" => call_tool(state, session_id.as_deref(), params).await,
        "resources/list" => Ok(json!({"resources": resource_summaries()})),
        "resources/read" => read_resource(params),
        "prompts/list" => to_result(&builtin_prompts()).map(|prompts| json!({"prompts": prompts})),
        "prompts/get" => get_prompt(state, params).await,
        "session/close" => close_session(state, session_id.as_deref(), params).await,
        _ => Err(RpcFailure::new(StatusCode::BAD_REQUEST, -32601, "method not found")),
    };
    let session_id = result
        .as_ref()
        .ok()
        .and_then(|value| value.get("sessionId"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or(session_id);
    reply(request.id, session_id, result)
}

/// Wraps a method result into a reply.
fn reply(id: Value, session_id: Option<String>, result: Result<Value, RpcFailure>) -> RpcReply {
    match result {
        Ok(value) => RpcReply {
            status: StatusCode::OK,
            session_id,
            response: JsonRpcResponse {
                jsonrpc: "2.0",
                id,
                result: Some(value),
                error: None,
            },
        },
        Err(failure) => RpcReply {
            status: failure.status,
            session_id,
            response: JsonRpcResponse {
                jsonrpc: "2.0",
                id,
                result: None,
                error: Some(JsonRpcError {
                    code: failure.code,
                    message: failure.message,
                }),
            },
        },
    }
}

// ============================================================================
// SECTION: JSON-RPC Methods
// ============================================================================

/// Opens a session and advertises tools, resources, and prompts.
async fn initialize(state: &ServerState) -> Result<Value, RpcFailure> {
    let session_id = state.handle.start_session().await?;
    Ok(json!({
        "sessionId": session_id,
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION"),
        },
        "tools": to_result(&state.handle.tool_definitions())?,
        "resources": resource_summaries(),
        "prompts": to_result(&builtin_prompts())?,
    }))
}

/// Tool call parameters.
#[derive(Debug, Deserialize)]
struct ToolCallParams {
    /// Tool name.
    name: String,
    /// Raw JSON arguments.
    #[serde(default)]
    arguments: Value,
}

/// Tool call response payload.
#[derive(Debug, Serialize)]
struct ToolCallResult {
    /// Tool output content.
    content: Vec<ToolContent>,
}

/// Tool output payloads for JSON-RPC responses.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ToolContent {
    /// JSON tool output.
    Json {
        /// JSON payload.
        json: Value,
    },
}

/// Executes a tool.
async fn call_tool(
    state: &ServerState,
    session_id: Option<&str>,
    params: Value,
) -> Result<Value, RpcFailure> {
    let call = serde_json::from_value::<ToolCallParams>(params)
        .map_err(|_| RpcFailure::invalid_params("invalid tool params"))?;
    let result = state.handle.call_tool(session_id, &call.name, call.arguments).await?;
    to_result(&ToolCallResult {
        content: vec![ToolContent::Json {
            json: result,
        }],
    })
}

/// Lists resources without their content.
fn resource_summaries() -> Vec<Value> {
    builtin_resources()
        .into_iter()
        .map(|resource| {
            json!({
                "id": resource.id,
                "type": resource.kind,
                "mimeType": resource.mime_type,
            })
        })
        .collect()
}

/// Resource read parameters.
#[derive(Debug, Deserialize)]
struct ResourceReadParams {
    /// Resource id.
    id: String,
}

/// Returns one resource with its content.
fn read_resource(params: Value) -> Result<Value, RpcFailure> {
    let read = serde_json::from_value::<ResourceReadParams>(params)
        .map_err(|_| RpcFailure::invalid_params("invalid resource params"))?;
    let resource = builtin_resources()
        .into_iter()
        .find(|resource| resource.id == read.id)
        .ok_or_else(|| RpcFailure::not_found(format!("unknown resource: {}", read.id)))?;
    Ok(json!({
        "contents": [{
            "id": resource.id,
            "mimeType": resource.mime_type,
            "text": resource.content,
        }],
    }))
}

/// Prompt request parameters.
#[derive(Debug, Deserialize)]
struct PromptGetParams {
    /// Prompt id.
    name: String,
    /// Prompt arguments.
    #[serde(default)]
    arguments: Value,
}

/// Resolves a prompt. `inhabit` and `release` act on the claim set.
async fn get_prompt(state: &ServerState, params: Value) -> Result<Value, RpcFailure> {
    let request = serde_json::from_value::<PromptGetParams>(params)
        .map_err(|_| RpcFailure::invalid_params("invalid prompt params"))?;
    let prompt = builtin_prompts()
        .into_iter()
        .find(|prompt| prompt.id == request.name)
        .ok_or_else(|| RpcFailure::not_found(format!("unknown prompt: {}", request.name)))?;
    let mut arguments = prompt.validate(request.arguments)?;
    let target_id =
        arguments.get("targetId").and_then(Value::as_str).unwrap_or_default().to_string();
    match prompt.id.as_str() {
        "inhabit" => {
            let context = arguments.remove("context").unwrap_or_else(|| json!({}));
            let accepted = state.handle.inhabit(&target_id, context).await?;
            Ok(json!({"targetId": target_id, "accepted": accepted}))
        }
        "release" => {
            let released = state.handle.release(&target_id).await?;
            Ok(json!({"targetId": target_id, "released": released}))
        }
        id => {
            let text = render_prompt(id, &arguments)
                .ok_or_else(|| RpcFailure::not_found(format!("unknown prompt: {id}")))?;
            Ok(json!({
                "messages": [{
                    "role": "user",
                    "content": {"type": "text", "text": text},
                }],
            }))
        }
    }
}

/// Session close parameters.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionCloseParams {
    /// Session id when not supplied by header.
    #[serde(default)]
    session_id: Option<String>,
    /// Aggregate statistics.
    #[serde(default)]
    stats: Option<Value>,
}

/// Completes a session.
async fn close_session(
    state: &ServerState,
    header_session: Option<&str>,
    params: Value,
) -> Result<Value, RpcFailure> {
    let close = if params.is_null() {
        SessionCloseParams::default()
    } else {
        serde_json::from_value::<SessionCloseParams>(params)
            .map_err(|_| RpcFailure::invalid_params("invalid session params"))?
    };
    let session_id = header_session
        .map(str::to_string)
        .or(close.session_id)
        .ok_or_else(|| RpcFailure::invalid_params("missing session id"))?;
    let stats = close.stats.unwrap_or_else(|| json!({}));
    let transition = state.handle.end_session(&session_id, stats).await?;
    Ok(json!({"sessionId": session_id, "transition": transition.label()}))
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Server assembly and transport errors.
#[derive(Debug, thiserror::Error)]
pub enum McpServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}
