// crates/hookgate-core/src/audit.rs
// ============================================================================
// Module: Hookgate Audit Logging
// Description: Structured audit events for ingestion, delivery, and sessions.
// Purpose: Emit redacted JSON-line audit records without a logging framework.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every security-relevant decision in the pipeline is recorded as one JSON
//! line through an [`AuditSink`]. Deployments pick stderr, an append-only file,
//! or nothing; tests capture events in memory.
//!
//! Security posture: events never carry secrets or raw signatures. Signatures
//! appear only as the short fingerprint produced by
//! [`crate::signing::signature_fingerprint`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Milliseconds since the unix epoch.
fn timestamp_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// ============================================================================
// SECTION: Event Types
// ============================================================================

/// Inbound webhook decision.
#[derive(Debug, Clone, Serialize)]
pub struct IngestAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Webhook event name when the body carried one.
    pub webhook_event: Option<String>,
    /// Decision label (`accepted`, `rejected`, `duplicate`, `unknown_event`, ...).
    pub outcome: &'static str,
    /// Failure reason label when rejected.
    pub reason: Option<&'static str>,
    /// Signature fingerprint when a signature was supplied.
    pub signature_fingerprint: Option<String>,
    /// HTTP status returned to the caller.
    pub status: u16,
    /// Handler processing time in milliseconds.
    pub processing_time_ms: u64,
}

/// Inputs required to construct an ingest audit event.
pub struct IngestAuditEventParams {
    /// Webhook event name when the body carried one.
    pub webhook_event: Option<String>,
    /// Decision label.
    pub outcome: &'static str,
    /// Failure reason label when rejected.
    pub reason: Option<&'static str>,
    /// Signature fingerprint when a signature was supplied.
    pub signature_fingerprint: Option<String>,
    /// HTTP status returned to the caller.
    pub status: u16,
    /// Handler processing time in milliseconds.
    pub processing_time_ms: u64,
}

impl IngestAuditEvent {
    /// Creates a new ingest audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: IngestAuditEventParams) -> Self {
        Self {
            event: "webhook_ingest",
            timestamp_ms: timestamp_ms(),
            webhook_event: params.webhook_event,
            outcome: params.outcome,
            reason: params.reason,
            signature_fingerprint: params.signature_fingerprint,
            status: params.status,
            processing_time_ms: params.processing_time_ms,
        }
    }
}

/// Outbound delivery attempt.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Destination identifier.
    pub destination_id: String,
    /// Webhook event name.
    pub webhook_event: String,
    /// Delivery identifier embedded in the body.
    pub delivery_id: Option<String>,
    /// HTTP status returned by the destination.
    pub status: Option<u16>,
    /// `delivered` or `failed`.
    pub outcome: &'static str,
    /// Error description on failure.
    pub error: Option<String>,
}

/// Inputs required to construct a delivery audit event.
pub struct DeliveryAuditEventParams {
    /// Destination identifier.
    pub destination_id: String,
    /// Webhook event name.
    pub webhook_event: String,
    /// Delivery identifier embedded in the body.
    pub delivery_id: Option<String>,
    /// HTTP status returned by the destination.
    pub status: Option<u16>,
    /// Error description on failure; `None` means delivered.
    pub error: Option<String>,
}

impl DeliveryAuditEvent {
    /// Creates a new delivery audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: DeliveryAuditEventParams) -> Self {
        Self {
            event: "webhook_delivery",
            timestamp_ms: timestamp_ms(),
            destination_id: params.destination_id,
            webhook_event: params.webhook_event,
            delivery_id: params.delivery_id,
            status: params.status,
            outcome: if params.error.is_some() { "failed" } else { "delivered" },
            error: params.error,
        }
    }
}

/// Tool invocation outcome.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Session identifier when known.
    pub session_id: Option<String>,
    /// Tool name.
    pub tool: String,
    /// `ok` or `error`.
    pub outcome: &'static str,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
}

impl ToolCallAuditEvent {
    /// Creates a new tool call audit event.
    #[must_use]
    pub fn new(session_id: Option<String>, tool: String, error_kind: Option<&'static str>) -> Self {
        Self {
            event: "tool_call",
            timestamp_ms: timestamp_ms(),
            session_id,
            tool,
            outcome: if error_kind.is_some() { "error" } else { "ok" },
            error_kind,
        }
    }
}

/// Session state transition.
#[derive(Debug, Clone, Serialize)]
pub struct SessionAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Session identifier.
    pub session_id: String,
    /// Transition label (`created`, `completed`, `ignored`).
    pub transition: &'static str,
}

impl SessionAuditEvent {
    /// Creates a new session audit event.
    #[must_use]
    pub fn new(session_id: String, transition: &'static str) -> Self {
        Self {
            event: "session_lifecycle",
            timestamp_ms: timestamp_ms(),
            session_id,
            transition,
        }
    }
}

/// Inhabitation claim attempt.
#[derive(Debug, Clone, Serialize)]
pub struct InhabitationAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Target identifier.
    pub target_id: String,
    /// `inhabit` or `release`.
    pub action: &'static str,
    /// Whether the claim set changed.
    pub accepted: bool,
}

impl InhabitationAuditEvent {
    /// Creates a new inhabitation audit event.
    #[must_use]
    pub fn new(target_id: String, action: &'static str, accepted: bool) -> Self {
        Self {
            event: "inhabitation",
            timestamp_ms: timestamp_ms(),
            target_id,
            action,
            accepted,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for hookgate events.
pub trait AuditSink: Send + Sync {
    /// Record an inbound webhook decision.
    fn record_ingest(&self, event: &IngestAuditEvent);

    /// Record an outbound delivery attempt.
    fn record_delivery(&self, _event: &DeliveryAuditEvent) {}

    /// Record a tool invocation.
    fn record_tool_call(&self, _event: &ToolCallAuditEvent) {}

    /// Record a session transition.
    fn record_session(&self, _event: &SessionAuditEvent) {}

    /// Record an inhabitation attempt.
    fn record_inhabitation(&self, _event: &InhabitationAuditEvent) {}
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Writes one JSON line for `event`, ignoring serialization and I/O errors.
fn write_line<W: Write, T: Serialize>(writer: &mut W, event: &T) {
    if let Ok(payload) = serde_json::to_string(event) {
        let _ = writeln!(writer, "{payload}");
        let _ = writer.flush();
    }
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn record_ingest(&self, event: &IngestAuditEvent) {
        write_line(&mut io::stderr(), event);
    }

    fn record_delivery(&self, event: &DeliveryAuditEvent) {
        write_line(&mut io::stderr(), event);
    }

    fn record_tool_call(&self, event: &ToolCallAuditEvent) {
        write_line(&mut io::stderr(), event);
    }

    fn record_session(&self, event: &SessionAuditEvent) {
        write_line(&mut io::stderr(), event);
    }

    fn record_inhabitation(&self, event: &InhabitationAuditEvent) {
        write_line(&mut io::stderr(), event);
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends one event under the file lock.
    fn append<T: Serialize>(&self, event: &T) {
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        write_line(&mut *file, event);
    }
}

impl AuditSink for FileAuditSink {
    fn record_ingest(&self, event: &IngestAuditEvent) {
        self.append(event);
    }

    fn record_delivery(&self, event: &DeliveryAuditEvent) {
        self.append(event);
    }

    fn record_tool_call(&self, event: &ToolCallAuditEvent) {
        self.append(event);
    }

    fn record_session(&self, event: &SessionAuditEvent) {
        self.append(event);
    }

    fn record_inhabitation(&self, event: &InhabitationAuditEvent) {
        self.append(event);
    }
}

/// Audit sink that keeps events in memory for inspection.
#[derive(Default)]
pub struct MemoryAuditSink {
    /// Captured events as JSON values.
    events: Mutex<Vec<Value>>,
}

impl MemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every captured event in order.
    #[must_use]
    pub fn events(&self) -> Vec<Value> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Returns captured events whose `event` field equals `name`.
    #[must_use]
    pub fn events_named(&self, name: &str) -> Vec<Value> {
        self.events()
            .into_iter()
            .filter(|event| event.get("event").and_then(Value::as_str) == Some(name))
            .collect()
    }

    /// Captures one event.
    fn push<T: Serialize>(&self, event: &T) {
        if let Ok(value) = serde_json::to_value(event) {
            self.events.lock().unwrap_or_else(PoisonError::into_inner).push(value);
        }
    }
}

impl AuditSink for MemoryAuditSink {
    fn record_ingest(&self, event: &IngestAuditEvent) {
        self.push(event);
    }

    fn record_delivery(&self, event: &DeliveryAuditEvent) {
        self.push(event);
    }

    fn record_tool_call(&self, event: &ToolCallAuditEvent) {
        self.push(event);
    }

    fn record_session(&self, event: &SessionAuditEvent) {
        self.push(event);
    }

    fn record_inhabitation(&self, event: &InhabitationAuditEvent) {
        self.push(event);
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record_ingest(&self, _event: &IngestAuditEvent) {}
}

// ============================================================================
// SECTION: Tests
// ============================================================================
