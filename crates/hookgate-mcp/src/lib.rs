// crates/hookgate-mcp/src/lib.rs
// ============================================================================
// Module: Hookgate MCP Library
// Description: Tool gateway, session lifecycle, inhabitation, and HTTP server.
// Purpose: Run the agent-facing protocol and the inbound webhook endpoint.
// Dependencies: axum, hookgate-broker, hookgate-config, hookgate-core, tokio
// ============================================================================

//! ## Overview
//! Hookgate MCP hosts the agent session protocol. The [`McpService`] actor
//! owns the [`ToolGateway`], [`SessionManager`], and [`InhabitationRegistry`];
//! transports reach it through a cloneable [`McpHandle`]. The [`McpServer`]
//! exposes the service as JSON-RPC over HTTP next to the inbound
//! [`WebhookIngestor`] and the destination registration endpoint.
//!
//! Invariants:
//! - Tool parameters are validated against declared definitions before execution.
//! - Sessions are immutable once completed; repeated closes are no-ops.
//! - At most one claim exists per target id.
//!
//! Security posture: agent input and inbound webhooks are untrusted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod catalog;
pub mod ingest;
pub mod inhabitation;
pub mod server;
pub mod service;
pub mod session;
pub mod tools;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use catalog::PromptDescriptor;
pub use catalog::ResourceDescriptor;
pub use catalog::register_builtin_tools;
pub use ingest::InboundRequest;
pub use ingest::IngestError;
pub use ingest::IngestResponse;
pub use ingest::WebhookIngestor;
pub use inhabitation::ClaimSnapshot;
pub use inhabitation::InhabitationClaim;
pub use inhabitation::InhabitationRegistry;
pub use server::McpServer;
pub use server::McpServerError;
pub use server::SESSION_HEADER;
pub use server::build_audit_sink;
pub use service::McpHandle;
pub use service::McpService;
pub use service::ServiceError;
pub use service::SessionMessage;
pub use session::Session;
pub use session::SessionManager;
pub use session::SessionTransition;
pub use tools::NotifyingTool;
pub use tools::ParamType;
pub use tools::ParameterSpec;
pub use tools::Tool;
pub use tools::ToolDefinition;
pub use tools::ToolError;
pub use tools::ToolGateway;
