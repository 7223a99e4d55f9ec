// crates/hookgate-core/src/signing.rs
// ============================================================================
// Module: Webhook Signing
// Description: HMAC-SHA256 signing and verification over canonical JSON.
// Purpose: Authenticate webhook envelopes and bound their freshness.
// Dependencies: hmac, sha2, subtle, serde_jcs, hex, rand
// ============================================================================

//! ## Overview
//! Signatures are HMAC-SHA256 over `"{timestamp}." ++ JCS(body)` keyed by the
//! destination's shared secret, hex encoded. Verification first bounds the
//! timestamp skew, then recomputes the MAC and compares it in constant time.
//!
//! Invariants:
//! - [`verify`] never panics; malformed input yields `valid == false` with a reason.
//! - Expired timestamps are rejected regardless of signature correctness.
//!
//! Security posture: secrets never appear in errors or audit output; see
//! [`signature_fingerprint`] for a log-safe handle.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use hmac::Hmac;
use hmac::Mac;
use rand::RngCore;
use rand::rngs::OsRng;
use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::clock::Clock;
use crate::envelope::WEBHOOK_TOLERANCE_SECS;
use crate::envelope::WebhookEnvelope;
use crate::envelope::WebhookEvent;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// HMAC-SHA256 keyed hasher.
type HmacSha256 = Hmac<Sha256>;

/// Default secret length in bytes for [`generate_secret`].
pub const DEFAULT_SECRET_BYTES: usize = 32;
/// Length of a hex-encoded HMAC-SHA256 digest.
const SIGNATURE_HEX_LEN: usize = 64;
/// Number of hex characters kept in a signature fingerprint.
const FINGERPRINT_LEN: usize = 12;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while producing a signature.
#[derive(Debug, Error)]
pub enum SigningError {
    /// JSON canonicalization failed.
    #[error("failed to canonicalize body: {0}")]
    Canonicalization(String),
    /// The secret could not be used as an HMAC key.
    #[error("invalid signing key")]
    InvalidKey,
}

/// Structured reasons an envelope failed verification.
///
/// # Invariants
/// - Variants are stable for programmatic handling and audit labels.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyFailure {
    /// No signature header was supplied.
    #[error("missing signature")]
    MissingSignature,
    /// No timestamp header was supplied.
    #[error("missing timestamp")]
    MissingTimestamp,
    /// The timestamp was not an integer.
    #[error("malformed timestamp")]
    MalformedTimestamp,
    /// The signature was not a hex digest of the expected length.
    #[error("malformed signature")]
    MalformedSignature,
    /// The body was not valid JSON.
    #[error("malformed body: {0}")]
    MalformedBody(String),
    /// The body could not be canonicalized.
    #[error("canonicalization failed: {0}")]
    Canonicalization(String),
    /// The timestamp lies outside the tolerance window.
    #[error("timestamp out of tolerance")]
    TimestampOutOfTolerance {
        /// Absolute skew between the envelope and the verifier clock.
        skew_seconds: u64,
    },
    /// The recomputed signature did not match.
    #[error("signature mismatch")]
    SignatureMismatch,
}

impl VerifyFailure {
    /// Returns a stable label for logs and audit events.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::MissingSignature => "missing_signature",
            Self::MissingTimestamp => "missing_timestamp",
            Self::MalformedTimestamp => "malformed_timestamp",
            Self::MalformedSignature => "malformed_signature",
            Self::MalformedBody(_) => "malformed_body",
            Self::Canonicalization(_) => "canonicalization",
            Self::TimestampOutOfTolerance {
                ..
            } => "timestamp_out_of_tolerance",
            Self::SignatureMismatch => "signature_mismatch",
        }
    }

    /// Returns true when the failure is an expired or future-dated timestamp.
    #[must_use]
    pub const fn is_expired(&self) -> bool {
        matches!(self, Self::TimestampOutOfTolerance { .. })
    }
}

// ============================================================================
// SECTION: Verification Outcome
// ============================================================================

/// Result of verifying an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationOutcome {
    /// Whether the envelope is authentic and fresh.
    pub valid: bool,
    /// Failure reason when `valid` is false.
    pub reason: Option<VerifyFailure>,
}

impl VerificationOutcome {
    /// Builds a successful outcome.
    #[must_use]
    pub const fn accepted() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    /// Builds a failed outcome.
    #[must_use]
    pub const fn rejected(reason: VerifyFailure) -> Self {
        Self {
            valid: false,
            reason: Some(reason),
        }
    }

    /// Converts the outcome into a `Result`.
    ///
    /// # Errors
    ///
    /// Returns the failure reason when the envelope was rejected.
    pub fn into_result(self) -> Result<(), VerifyFailure> {
        match self.reason {
            None if self.valid => Ok(()),
            Some(reason) => Err(reason),
            None => Err(VerifyFailure::SignatureMismatch),
        }
    }
}

// ============================================================================
// SECTION: Signing
// ============================================================================

/// Signed outbound delivery ready for transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedDelivery {
    /// Delivery identifier embedded in the body.
    pub delivery_id: String,
    /// Canonical JSON body bytes.
    pub body: Vec<u8>,
    /// Unix timestamp bound into the signature.
    pub timestamp_seconds: i64,
    /// Hex HMAC-SHA256 signature.
    pub signature_hex: String,
}

/// Returns RFC 8785 canonical bytes for a JSON body.
///
/// # Errors
///
/// Returns [`SigningError::Canonicalization`] when serialization fails.
pub fn canonical_body_bytes(body: &Value) -> Result<Vec<u8>, SigningError> {
    serde_jcs::to_vec(body).map_err(|err| SigningError::Canonicalization(err.to_string()))
}

/// Computes the raw MAC over `"{timestamp}." ++ canonical`.
fn compute_mac(
    secret: &str,
    timestamp_seconds: i64,
    canonical: &[u8],
) -> Result<Vec<u8>, SigningError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SigningError::InvalidKey)?;
    mac.update(timestamp_seconds.to_string().as_bytes());
    mac.update(b".");
    mac.update(canonical);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Signs a JSON body for the given timestamp and returns the hex signature.
///
/// # Errors
///
/// Returns [`SigningError`] when canonicalization fails.
pub fn sign_body(
    secret: &str,
    timestamp_seconds: i64,
    body: &Value,
) -> Result<String, SigningError> {
    let canonical = canonical_body_bytes(body)?;
    Ok(hex::encode(compute_mac(secret, timestamp_seconds, &canonical)?))
}

/// Signs an event for delivery with a fresh delivery id.
///
/// # Errors
///
/// Returns [`SigningError`] when canonicalization fails.
pub fn sign_event(
    secret: &str,
    event: &WebhookEvent,
    timestamp_seconds: i64,
) -> Result<SignedDelivery, SigningError> {
    let delivery_id = new_delivery_id();
    let canonical = canonical_body_bytes(&event.to_body(&delivery_id))?;
    let signature = compute_mac(secret, timestamp_seconds, &canonical)?;
    Ok(SignedDelivery {
        delivery_id,
        body: canonical,
        timestamp_seconds,
        signature_hex: hex::encode(signature),
    })
}

/// Returns a random delivery identifier (`wh_` + 16 hex chars).
#[must_use]
pub fn new_delivery_id() -> String {
    let mut bytes = [0u8; 8];
    OsRng.fill_bytes(&mut bytes);
    format!("wh_{}", hex::encode(bytes))
}

/// Generates a random hex-encoded shared secret of `bytes` random bytes.
#[must_use]
pub fn generate_secret(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes.max(1)];
    OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Returns a short SHA-256 fingerprint of a signature for logs.
#[must_use]
pub fn signature_fingerprint(signature_hex: &str) -> String {
    let digest = Sha256::digest(signature_hex.as_bytes());
    let mut encoded = hex::encode(digest);
    encoded.truncate(FINGERPRINT_LEN);
    encoded
}

// ============================================================================
// SECTION: Verification
// ============================================================================

/// Compares two byte slices in constant time.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Verifies an envelope against `secret` at time `now_seconds`.
#[must_use]
pub fn verify(
    envelope: &WebhookEnvelope,
    secret: &str,
    tolerance_seconds: u64,
    now_seconds: i64,
) -> VerificationOutcome {
    let skew_seconds = now_seconds.abs_diff(envelope.timestamp_seconds);
    if skew_seconds > tolerance_seconds {
        return VerificationOutcome::rejected(VerifyFailure::TimestampOutOfTolerance {
            skew_seconds,
        });
    }
    let provided = envelope.signature_hex.trim();
    if provided.len() != SIGNATURE_HEX_LEN {
        return VerificationOutcome::rejected(VerifyFailure::MalformedSignature);
    }
    let Ok(provided) = hex::decode(provided) else {
        return VerificationOutcome::rejected(VerifyFailure::MalformedSignature);
    };
    let canonical = match canonical_body_bytes(&envelope.body) {
        Ok(bytes) => bytes,
        Err(err) => {
            return VerificationOutcome::rejected(VerifyFailure::Canonicalization(err.to_string()));
        }
    };
    let Ok(expected) = compute_mac(secret, envelope.timestamp_seconds, &canonical) else {
        return VerificationOutcome::rejected(VerifyFailure::SignatureMismatch);
    };
    if constant_time_eq(&expected, &provided) {
        VerificationOutcome::accepted()
    } else {
        VerificationOutcome::rejected(VerifyFailure::SignatureMismatch)
    }
}

/// Verifier bound to a clock and tolerance window.
#[derive(Clone)]
pub struct SignatureVerifier {
    /// Maximum tolerated clock skew in seconds.
    tolerance_seconds: u64,
    /// Clock used to read "now".
    clock: Arc<dyn Clock>,
}

impl SignatureVerifier {
    /// Creates a verifier with the protocol tolerance (300 seconds).
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_tolerance(clock, WEBHOOK_TOLERANCE_SECS)
    }

    /// Creates a verifier with an explicit tolerance.
    #[must_use]
    pub fn with_tolerance(clock: Arc<dyn Clock>, tolerance_seconds: u64) -> Self {
        Self {
            tolerance_seconds,
            clock,
        }
    }

    /// Returns the configured tolerance in seconds.
    #[must_use]
    pub const fn tolerance_seconds(&self) -> u64 {
        self.tolerance_seconds
    }

    /// Verifies an envelope against `secret` using the bound clock.
    #[must_use]
    pub fn verify(&self, envelope: &WebhookEnvelope, secret: &str) -> VerificationOutcome {
        verify(envelope, secret, self.tolerance_seconds, self.clock.now_unix_seconds())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
