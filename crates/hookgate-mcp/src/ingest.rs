// crates/hookgate-mcp/src/ingest.rs
// ============================================================================
// Module: Webhook Ingestion
// Description: Verify, deduplicate, and enrich inbound webhook deliveries.
// Purpose: Turn an untrusted HTTP delivery into a status code and JSON body.
// Dependencies: hookgate-core, serde_json, url
// ============================================================================

//! ## Overview
//! [`WebhookIngestor::ingest`] runs the inbound pipeline in a fixed order:
//! reassemble and verify the envelope, reject replays, then dispatch on the
//! event name to a handler that enriches its payload. The transport layer
//! only copies headers into an [`InboundRequest`] and writes the returned
//! [`IngestResponse`].
//!
//! Every decision is recorded to the audit sink. Signatures appear there only
//! as fingerprints.
//!
//! Security posture: the body and all headers are untrusted until the
//! signature verifies. Error bodies never carry internal details.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Instant;

use hookgate_core::AuditSink;
use hookgate_core::Clock;
use hookgate_core::EnrichedRecord;
use hookgate_core::Enricher;
use hookgate_core::EnrichmentOptions;
use hookgate_core::IngestAuditEvent;
use hookgate_core::IngestAuditEventParams;
use hookgate_core::ReplayGuard;
use hookgate_core::ReplayGuardConfig;
use hookgate_core::SignatureVerifier;
use hookgate_core::VerifyFailure;
use hookgate_core::WebhookEnvelope;
use hookgate_core::event_names;
use hookgate_core::signing::signature_fingerprint;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Placeholder for absent provenance fields.
const UNKNOWN: &str = "unknown";
/// Fixed confidence for session creation events.
const SESSION_CREATED_SCORE: u8 = 90;
/// Fixed confidence for session completion events.
const SESSION_COMPLETED_SCORE: u8 = 95;

// ============================================================================
// SECTION: Request / Response
// ============================================================================

/// Raw inbound delivery as seen by the transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct InboundRequest<'a> {
    /// Raw request body.
    pub body: &'a [u8],
    /// `x-webhook-signature` header.
    pub signature: Option<&'a str>,
    /// `x-webhook-timestamp` header.
    pub timestamp: Option<&'a str>,
    /// `referer` header.
    pub referer: Option<&'a str>,
    /// `origin` header.
    pub origin: Option<&'a str>,
}

/// Status and JSON body to return to the sender.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestResponse {
    /// HTTP status code.
    pub status: u16,
    /// JSON response body.
    pub body: Value,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Inbound pipeline failures.
///
/// # Invariants
/// - Variants map to stable HTTP statuses via [`IngestError::status`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    /// Missing, malformed, or mismatched signature.
    #[error("invalid webhook signature: {0}")]
    InvalidSignature(VerifyFailure),
    /// Timestamp outside the tolerance window.
    #[error("webhook timestamp expired ({skew_seconds}s skew)")]
    ExpiredTimestamp {
        /// Absolute skew in seconds.
        skew_seconds: u64,
    },
    /// Signature already accepted within the window.
    #[error("duplicate delivery")]
    DuplicateDelivery,
    /// Authentic delivery with an unrecognized event name.
    #[error("unhandled event type: {0}")]
    UnknownEventType(String),
    /// Authentic delivery whose payload does not have the expected shape.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    /// Handler failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IngestError {
    /// Returns the HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::InvalidSignature(_)
            | Self::ExpiredTimestamp {
                ..
            } => 401,
            Self::DuplicateDelivery => 200,
            Self::UnknownEventType(_) | Self::MalformedPayload(_) => 400,
            Self::Internal(_) => 500,
        }
    }

    /// Returns the caller-facing JSON body.
    #[must_use]
    pub fn body(&self) -> Value {
        match self {
            Self::InvalidSignature(_)
            | Self::ExpiredTimestamp {
                ..
            } => json!({"error": "Invalid webhook signature"}),
            Self::DuplicateDelivery => json!({"message": "Webhook already processed"}),
            Self::UnknownEventType(event) => {
                json!({"message": format!("Unhandled event type: {event}")})
            }
            Self::MalformedPayload(_) => json!({"error": "Malformed webhook payload"}),
            Self::Internal(_) => json!({"error": "Error processing webhook"}),
        }
    }

    /// Returns the audit outcome label.
    #[must_use]
    pub const fn outcome(&self) -> &'static str {
        match self {
            Self::InvalidSignature(_)
            | Self::ExpiredTimestamp {
                ..
            } => "rejected",
            Self::DuplicateDelivery => "duplicate",
            Self::UnknownEventType(_) => "unknown_event",
            Self::MalformedPayload(_) => "malformed",
            Self::Internal(_) => "error",
        }
    }

    /// Returns the audit reason label.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::InvalidSignature(failure) => failure.label(),
            Self::ExpiredTimestamp {
                ..
            } => "timestamp_out_of_tolerance",
            Self::DuplicateDelivery => "duplicate_signature",
            Self::UnknownEventType(_) => "unknown_event_type",
            Self::MalformedPayload(_) => "malformed_payload",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<VerifyFailure> for IngestError {
    fn from(failure: VerifyFailure) -> Self {
        match failure {
            VerifyFailure::TimestampOutOfTolerance {
                skew_seconds,
            } => Self::ExpiredTimestamp {
                skew_seconds,
            },
            other => Self::InvalidSignature(other),
        }
    }
}

// ============================================================================
// SECTION: Ingestor
// ============================================================================

/// Inbound webhook pipeline bound to one shared secret.
pub struct WebhookIngestor {
    /// Signature verifier with the protocol tolerance.
    verifier: SignatureVerifier,
    /// Accepted-signature memory.
    replay: ReplayGuard,
    /// Payload enricher.
    enricher: Enricher,
    /// Shared inbound secret.
    secret: String,
    /// Clock for handler timestamps.
    clock: Arc<dyn Clock>,
    /// Decision audit sink.
    audit: Arc<dyn AuditSink>,
}

impl WebhookIngestor {
    /// Creates an ingestor for `secret`.
    #[must_use]
    pub fn new(
        secret: impl Into<String>,
        replay: ReplayGuardConfig,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            verifier: SignatureVerifier::new(Arc::clone(&clock)),
            replay: ReplayGuard::new(replay, Arc::clone(&clock)),
            enricher: Enricher::new(Arc::clone(&clock)),
            secret: secret.into(),
            clock,
            audit,
        }
    }

    /// Returns the shared inbound secret.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Runs the pipeline and returns the response for the sender.
    #[must_use]
    pub fn ingest(&self, request: &InboundRequest<'_>) -> IngestResponse {
        let started = Instant::now();
        let mut webhook_event = None;
        let result = self.process(request, &mut webhook_event);
        let processing_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let (response, outcome, reason) = match result {
            Ok(enriched) => (
                IngestResponse {
                    status: 200,
                    body: json!({
                        "message": "Webhook processed successfully",
                        "enriched_data": enriched,
                        "processing_time_ms": processing_time_ms,
                    }),
                },
                "accepted",
                None,
            ),
            Err(err) => (
                IngestResponse {
                    status: err.status(),
                    body: err.body(),
                },
                err.outcome(),
                Some(err.reason()),
            ),
        };
        self.audit.record_ingest(&IngestAuditEvent::new(IngestAuditEventParams {
            webhook_event,
            outcome,
            reason,
            signature_fingerprint: request.signature.map(signature_fingerprint),
            status: response.status,
            processing_time_ms,
        }));
        response
    }

    /// Verifies, deduplicates, and dispatches one delivery.
    fn process(
        &self,
        request: &InboundRequest<'_>,
        webhook_event: &mut Option<String>,
    ) -> Result<Value, IngestError> {
        let envelope =
            WebhookEnvelope::from_http(request.body, request.signature, request.timestamp)?;
        *webhook_event = envelope.event().map(str::to_string);
        self.verifier.verify(&envelope, &self.secret).into_result()?;

        if self.replay.check_and_remember_at(&envelope.signature_hex, envelope.timestamp_seconds) {
            return Err(IngestError::DuplicateDelivery);
        }

        let event = envelope
            .event()
            .ok_or_else(|| IngestError::MalformedPayload("missing event".to_string()))?;
        let domain = source_domain(request.referer, request.origin);
        let data = envelope.data();
        let record = match event {
            event_names::TOOL_EXECUTE => self.tool_execution(data, &domain)?,
            event_names::RESOURCE_UPDATE => self.resource_update(data, &domain)?,
            event_names::SESSION_CREATED => self.session_created(data, &domain)?,
            event_names::SESSION_COMPLETED => self.session_completed(data, &domain),
            other => return Err(IngestError::UnknownEventType(other.to_string())),
        };
        serde_json::to_value(record).map_err(|err| IngestError::Internal(err.to_string()))
    }

    // ------------------------------------------------------------------------
    // Handlers
    // ------------------------------------------------------------------------

    /// Enriches the parameters of a remote tool execution.
    fn tool_execution(&self, data: &Value, domain: &str) -> Result<EnrichedRecord, IngestError> {
        let tool_name = text_or_unknown(data, "toolName");
        let session_id = text_or_unknown(data, "sessionId");
        let parameters = object_field(data, "parameters")?;
        Ok(self.enricher.enrich(
            parameters,
            vec![format!("{domain}/tool/{tool_name}")],
            EnrichmentOptions::default().additional_sources(vec![format!("Session: {session_id}")]),
        ))
    }

    /// Enriches updated resource content.
    fn resource_update(&self, data: &Value, domain: &str) -> Result<EnrichedRecord, IngestError> {
        let resource_id = text_or_unknown(data, "resourceId");
        let content_type = text_or_unknown(data, "contentType");
        let content = match data.get("content") {
            Some(Value::String(text)) => {
                let mut wrapped = Map::new();
                wrapped.insert("content".to_string(), Value::String(text.clone()));
                wrapped
            }
            _ => object_field(data, "content")?,
        };
        let sources = vec![format!("{domain}/resource/{resource_id}")];
        let options =
            EnrichmentOptions::default().details(format!("Resource type: {content_type}"));
        Ok(self.enricher.enrich(content, sources, options))
    }

    /// Enriches a remote session creation.
    fn session_created(&self, data: &Value, domain: &str) -> Result<EnrichedRecord, IngestError> {
        let session_id = text_or_unknown(data, "sessionId");
        let mut payload = Map::new();
        for key in ["sessionId", "userId"] {
            if let Some(value) = data.get(key).filter(|value| !value.is_null()) {
                payload.insert(key.to_string(), value.clone());
            }
        }
        payload.extend(object_field(data, "contextData")?);
        let options = EnrichmentOptions::with_score(SESSION_CREATED_SCORE)
            .details(format!("Session started at {}", self.clock.now_rfc3339()));
        let sources = vec![format!("{domain}/session/{session_id}")];
        Ok(self.enricher.enrich(payload, sources, options))
    }

    /// Enriches a remote session completion.
    fn session_completed(&self, data: &Value, domain: &str) -> EnrichedRecord {
        let session_id = text_or_unknown(data, "sessionId");
        let stats = data
            .get("stats")
            .filter(|stats| !stats.is_null())
            .cloned()
            .unwrap_or_else(|| json!({}));
        let duration = stats
            .get("durationMs")
            .filter(|value| !value.is_null())
            .map_or_else(|| UNKNOWN.to_string(), value_text);
        let mut payload = Map::new();
        payload.insert("sessionId".to_string(), data.get("sessionId").cloned().unwrap_or_default());
        payload.insert("stats".to_string(), stats);
        payload.insert("completedAt".to_string(), Value::String(self.clock.now_rfc3339()));
        let options = EnrichmentOptions::with_score(SESSION_COMPLETED_SCORE)
            .details(format!("Session duration: {duration}ms"));
        let sources = vec![format!("{domain}/session/{session_id}/completed")];
        self.enricher.enrich(payload, sources, options)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the host of `referer`, else of `origin`, else `unknown`.
#[must_use]
pub fn source_domain(referer: Option<&str>, origin: Option<&str>) -> String {
    [referer, origin]
        .into_iter()
        .flatten()
        .find_map(|raw| Url::parse(raw).ok()?.host_str().map(str::to_string))
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Renders a scalar field for provenance strings, or `unknown`.
fn text_or_unknown(data: &Value, key: &str) -> String {
    data.get(key)
        .filter(|value| !value.is_null())
        .map_or_else(|| UNKNOWN.to_string(), value_text)
}

/// Renders a JSON value without quoting strings.
fn value_text(value: &Value) -> String {
    value.as_str().map_or_else(|| value.to_string(), str::to_string)
}

/// Returns an object field, treating absent or `null` as empty.
fn object_field(data: &Value, key: &str) -> Result<Map<String, Value>, IngestError> {
    match data.get(key) {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(object)) => Ok(object.clone()),
        Some(_) => Err(IngestError::MalformedPayload(format!("{key} must be an object"))),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
