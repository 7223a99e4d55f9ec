// crates/hookgate-core/src/envelope.rs
// ============================================================================
// Module: Webhook Envelope
// Description: Wire types for signed webhook events.
// Purpose: Describe the event payload and the signed envelope around it.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A [`WebhookEvent`] is the logical `{event, data}` pair produced by the
//! domain. On the wire it travels as a JSON body plus two headers carrying the
//! signature and unix timestamp; [`WebhookEnvelope`] reassembles those parts
//! on the receiving side.
//!
//! The signature covers `"{timestamp}." ++ JCS(body)`, where `body` is the
//! whole parsed JSON body. Re-canonicalizing on receipt makes verification
//! independent of key order and whitespace introduced in transit.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::signing::VerifyFailure;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Protocol-level verification tolerance in seconds (5 minutes).
pub const WEBHOOK_TOLERANCE_SECS: u64 = 300;
/// Header carrying the hex HMAC-SHA256 signature.
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";
/// Header carrying the unix timestamp (seconds) bound into the signature.
pub const TIMESTAMP_HEADER: &str = "x-webhook-timestamp";
/// Maximum accepted signature header length.
const MAX_SIGNATURE_LEN: usize = 256;

/// Event names used on the wire.
pub mod event_names {
    /// A tool was executed through the gateway.
    pub const TOOL_EXECUTE: &str = "mcp.tool.execute";
    /// An external resource changed.
    pub const RESOURCE_UPDATE: &str = "mcp.resource.update";
    /// An agent session started.
    pub const SESSION_CREATED: &str = "mcp.session.created";
    /// An agent session completed.
    pub const SESSION_COMPLETED: &str = "mcp.session.completed";
    /// A destination was registered (test delivery).
    pub const WEBHOOK_REGISTERED: &str = "mcp.webhook.registered";
}

// ============================================================================
// SECTION: Webhook Event
// ============================================================================

/// Logical domain event fanned out to destinations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Event name (for example `mcp.tool.execute`).
    pub event: String,
    /// Event payload.
    #[serde(default)]
    pub data: Value,
}

impl WebhookEvent {
    /// Creates a new event.
    #[must_use]
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Builds the JSON body for a delivery carrying `delivery_id`.
    #[must_use]
    pub fn to_body(&self, delivery_id: &str) -> Value {
        serde_json::json!({
            "id": delivery_id,
            "event": self.event,
            "data": self.data,
        })
    }
}

// ============================================================================
// SECTION: Webhook Envelope
// ============================================================================

/// Signed inbound envelope reassembled from body and headers.
///
/// # Invariants
/// - `signature_hex` is the HMAC over `timestamp_seconds` and the canonical body.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEnvelope {
    /// Parsed JSON body (`{event, data}` plus an optional delivery `id`).
    pub body: Value,
    /// Unix timestamp bound into the signature.
    pub timestamp_seconds: i64,
    /// Lowercase or uppercase hex HMAC-SHA256 signature.
    pub signature_hex: String,
}

impl WebhookEnvelope {
    /// Creates an envelope from already-parsed parts.
    #[must_use]
    pub fn new(body: Value, timestamp_seconds: i64, signature_hex: impl Into<String>) -> Self {
        Self {
            body,
            timestamp_seconds,
            signature_hex: signature_hex.into(),
        }
    }

    /// Reassembles an envelope from a raw HTTP body and header values.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyFailure`] when a header is missing or the body is not JSON.
    pub fn from_http(
        body: &[u8],
        signature: Option<&str>,
        timestamp: Option<&str>,
    ) -> Result<Self, VerifyFailure> {
        let signature = signature
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(VerifyFailure::MissingSignature)?;
        if signature.len() > MAX_SIGNATURE_LEN {
            return Err(VerifyFailure::MalformedSignature);
        }
        let timestamp = timestamp
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(VerifyFailure::MissingTimestamp)?;
        let timestamp_seconds =
            timestamp.parse::<i64>().map_err(|_| VerifyFailure::MalformedTimestamp)?;
        let body = serde_json::from_slice::<Value>(body)
            .map_err(|err| VerifyFailure::MalformedBody(err.to_string()))?;
        Ok(Self::new(body, timestamp_seconds, signature))
    }

    /// Returns the event name when the body carries a string `event` field.
    #[must_use]
    pub fn event(&self) -> Option<&str> {
        self.body.get("event").and_then(Value::as_str)
    }

    /// Returns the event payload, or `Null` when absent.
    #[must_use]
    pub fn data(&self) -> &Value {
        self.body.get("data").unwrap_or(&Value::Null)
    }

    /// Returns the sender-assigned delivery id when present.
    #[must_use]
    pub fn delivery_id(&self) -> Option<&str> {
        self.body.get("id").and_then(Value::as_str)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions."
    )]

    use serde_json::json;

    use super::WebhookEnvelope;
    use super::WebhookEvent;
    use crate::signing::VerifyFailure;

    #[test]
    fn from_http_requires_both_headers() {
        let body = br#"{"event":"x","data":{}}"#;
        assert_eq!(
            WebhookEnvelope::from_http(body, None, Some("1")),
            Err(VerifyFailure::MissingSignature)
        );
        assert_eq!(
            WebhookEnvelope::from_http(body, Some("ab"), Some("  ")),
            Err(VerifyFailure::MissingTimestamp)
        );
        assert_eq!(
            WebhookEnvelope::from_http(body, Some("ab"), Some("yesterday")),
            Err(VerifyFailure::MalformedTimestamp)
        );
    }

    #[test]
    fn from_http_rejects_non_json_body() {
        let result = WebhookEnvelope::from_http(b"not json", Some("ab"), Some("10"));
        assert!(matches!(result, Err(VerifyFailure::MalformedBody(_))));
    }

    #[test]
    fn accessors_read_event_data_and_id() {
        let event = WebhookEvent::new("mcp.resource.update", json!({"resourceId": "r1"}));
        let envelope = WebhookEnvelope::new(event.to_body("wh_1"), 10, "ab");
        assert_eq!(envelope.event(), Some("mcp.resource.update"));
        assert_eq!(envelope.data()["resourceId"], "r1");
        assert_eq!(envelope.delivery_id(), Some("wh_1"));

        let bare = WebhookEnvelope::new(json!({"event": 5}), 10, "ab");
        assert_eq!(bare.event(), None);
        assert!(bare.data().is_null());
    }
}
