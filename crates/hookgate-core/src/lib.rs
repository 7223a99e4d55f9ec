// crates/hookgate-core/src/lib.rs
// ============================================================================
// Module: Hookgate Core Library
// Description: Webhook envelope verification, replay protection, and enrichment.
// Purpose: Provide the transport-free security and provenance primitives.
// Dependencies: hmac, sha2, subtle, serde_jcs, time
// ============================================================================

//! ## Overview
//! Hookgate Core owns the pieces of the webhook pipeline that carry real
//! correctness constraints: HMAC signing and verification over canonical JSON,
//! the time-evicting replay guard, and the deterministic enrichment engine.
//! Nothing in this crate performs I/O except the audit sinks.
//!
//! Invariants:
//! - Verification never panics on malformed input; it returns a structured reason.
//! - Signatures are compared in constant time.
//! - Confidence scores are a pure function of sources and payload.
//!
//! Security posture: every inbound envelope is untrusted until verified.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod clock;
pub mod enrichment;
pub mod envelope;
pub mod replay;
pub mod signing;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditSink;
pub use audit::DeliveryAuditEvent;
pub use audit::DeliveryAuditEventParams;
pub use audit::FileAuditSink;
pub use audit::IngestAuditEvent;
pub use audit::IngestAuditEventParams;
pub use audit::InhabitationAuditEvent;
pub use audit::MemoryAuditSink;
pub use audit::NoopAuditSink;
pub use audit::SessionAuditEvent;
pub use audit::StderrAuditSink;
pub use audit::ToolCallAuditEvent;
pub use clock::Clock;
pub use clock::FixedClock;
pub use clock::SystemClock;
pub use enrichment::EnrichError;
pub use enrichment::EnrichedRecord;
pub use enrichment::Enricher;
pub use enrichment::EnrichmentMetadata;
pub use enrichment::EnrichmentOptions;
pub use enrichment::confidence_score;
pub use envelope::WEBHOOK_TOLERANCE_SECS;
pub use envelope::WebhookEnvelope;
pub use envelope::WebhookEvent;
pub use envelope::event_names;
pub use replay::ReplayGuard;
pub use replay::ReplayGuardConfig;
pub use signing::SignatureVerifier;
pub use signing::SignedDelivery;
pub use signing::SigningError;
pub use signing::VerificationOutcome;
pub use signing::VerifyFailure;
pub use signing::constant_time_eq;
pub use signing::generate_secret;
pub use signing::sign_body;
pub use signing::sign_event;
pub use signing::verify;
