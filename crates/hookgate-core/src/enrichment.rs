// crates/hookgate-core/src/enrichment.rs
// ============================================================================
// Module: Enrichment Engine
// Description: Provenance and confidence metadata for arbitrary payloads.
// Purpose: Attach sources and a deterministic confidence score to records.
// Dependencies: serde, serde_json, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! [`Enricher::enrich`] wraps a JSON object with the sources that produced it,
//! a confidence score in `0..=100`, and a timestamped metadata block. The score
//! is computed by [`confidence_score`], a pure function of the payload and
//! sources: identical inputs always score identically, and adding sources never
//! lowers the score.
//!
//! Scoring rule:
//! - Base 45.
//! - Sources add 15, 10, then 5 (diminishing), plus 10 when any source is a
//!   high-quality registry; the source component is capped at 30.
//! - Payload density adds 0 for an empty payload, 10 for a single field, and
//!   5 per additional field up to 25.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

use crate::clock::Clock;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Score every record starts from.
const BASE_SCORE: u8 = 45;
/// Points added per source, by position; later sources add nothing.
const SOURCE_WEIGHTS: [u8; 3] = [15, 10, 5];
/// Bonus when any source is a high-quality registry.
const HIGH_QUALITY_BONUS: u8 = 10;
/// Cap on the combined source component.
const MAX_SOURCE_POINTS: u8 = 30;
/// Density points for a single-field payload.
const SINGLE_FIELD_POINTS: u8 = 10;
/// Density points per field beyond the first.
const EXTRA_FIELD_POINTS: usize = 5;
/// Cap on the density component.
const MAX_DENSITY_POINTS: u8 = 25;
/// Upper bound for any confidence score.
pub const MAX_CONFIDENCE: u8 = 100;
/// Domains treated as high-quality provenance.
const HIGH_QUALITY_DOMAINS: [&str; 4] = ["linkedin.com", "crunchbase.com", "sec.gov", "github.com"];
/// Hex characters kept in a record id.
const RECORD_ID_HEX_LEN: usize = 8;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Caller-supplied enrichment overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichmentOptions {
    /// Fixed score to use instead of the computed one (clamped to 100).
    pub default_confidence_score: Option<u8>,
    /// Opaque pass-through sources.
    pub additional_sources: Option<Vec<String>>,
    /// Opaque pass-through details.
    pub additional_details: Option<String>,
}

impl EnrichmentOptions {
    /// Options with a fixed confidence score.
    #[must_use]
    pub fn with_score(score: u8) -> Self {
        Self {
            default_confidence_score: Some(score),
            ..Self::default()
        }
    }

    /// Sets pass-through details.
    #[must_use]
    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.additional_details = Some(details.into());
        self
    }

    /// Sets pass-through sources.
    #[must_use]
    pub fn additional_sources(mut self, sources: Vec<String>) -> Self {
        self.additional_sources = Some(sources);
        self
    }
}

/// Metadata block attached to an enriched record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentMetadata {
    /// RFC 3339 time the record was enriched.
    #[serde(rename = "enrichedAtISO8601")]
    pub enriched_at: String,
    /// Opaque pass-through sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_sources: Option<Vec<String>>,
    /// Opaque pass-through details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_details: Option<String>,
}

/// Payload wrapped with provenance and confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedRecord {
    /// Stable id derived from the payload (`sr_` + 8 hex chars).
    pub record_id: String,
    /// Enriched payload.
    pub payload: Map<String, Value>,
    /// Sources that produced the payload.
    pub sources: Vec<String>,
    /// Confidence score in `0..=100`.
    pub confidence_score: u8,
    /// Enrichment metadata.
    pub metadata: EnrichmentMetadata,
}

/// Errors raised by field-level updates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnrichError {
    /// The field name was empty.
    #[error("field name must not be empty")]
    EmptyField,
}

// ============================================================================
// SECTION: Scoring
// ============================================================================

/// Returns true when a source names a high-quality registry.
fn is_high_quality(source: &str) -> bool {
    let lowered = source.to_ascii_lowercase();
    HIGH_QUALITY_DOMAINS.iter().any(|domain| lowered.contains(domain))
}

/// Source component of the score.
fn source_points(sources: &[String]) -> u8 {
    let counted: u8 = SOURCE_WEIGHTS.iter().take(sources.len()).sum();
    let bonus = if sources.iter().any(|source| is_high_quality(source)) {
        HIGH_QUALITY_BONUS
    } else {
        0
    };
    counted.saturating_add(bonus).min(MAX_SOURCE_POINTS)
}

/// Density component of the score.
fn density_points(payload: &Map<String, Value>) -> u8 {
    match payload.len() {
        0 => 0,
        1 => SINGLE_FIELD_POINTS,
        fields => {
            let extra = (fields - 1).saturating_mul(EXTRA_FIELD_POINTS);
            let extra = u8::try_from(extra).unwrap_or(MAX_DENSITY_POINTS);
            SINGLE_FIELD_POINTS.saturating_add(extra).min(MAX_DENSITY_POINTS)
        }
    }
}

/// Computes the default confidence score for a payload and its sources.
#[must_use]
pub fn confidence_score(payload: &Map<String, Value>, sources: &[String]) -> u8 {
    BASE_SCORE
        .saturating_add(source_points(sources))
        .saturating_add(density_points(payload))
        .min(MAX_CONFIDENCE)
}

/// Derives the stable record id for a payload.
#[must_use]
pub fn record_id(payload: &Map<String, Value>) -> String {
    let bytes = serde_jcs::to_vec(payload)
        .or_else(|_| serde_json::to_vec(payload))
        .unwrap_or_default();
    let mut digest = hex::encode(Sha256::digest(&bytes));
    digest.truncate(RECORD_ID_HEX_LEN);
    format!("sr_{digest}")
}

// ============================================================================
// SECTION: Enricher
// ============================================================================

/// Enrichment engine bound to a clock for metadata timestamps.
#[derive(Clone)]
pub struct Enricher {
    /// Clock used for `enrichedAtISO8601`.
    clock: Arc<dyn Clock>,
}

impl Enricher {
    /// Creates an enricher reading time from `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
        }
    }

    /// Wraps `payload` with provenance and a confidence score.
    #[must_use]
    pub fn enrich(
        &self,
        payload: Map<String, Value>,
        sources: Vec<String>,
        options: EnrichmentOptions,
    ) -> EnrichedRecord {
        let confidence_score = options.default_confidence_score.map_or_else(
            || confidence_score(&payload, &sources),
            |score| score.min(MAX_CONFIDENCE),
        );
        EnrichedRecord {
            record_id: record_id(&payload),
            payload,
            sources,
            confidence_score,
            metadata: EnrichmentMetadata {
                enriched_at: self.clock.now_rfc3339(),
                additional_sources: options.additional_sources,
                additional_details: options.additional_details,
            },
        }
    }

    /// Sets one payload field, merges new sources, and rescores the record.
    ///
    /// Sources are deduplicated preserving first-seen order. `details`
    /// replaces the existing details only when provided.
    ///
    /// # Errors
    ///
    /// Returns [`EnrichError::EmptyField`] when `field` is blank.
    pub fn update_field(
        &self,
        record: &EnrichedRecord,
        field: &str,
        value: Value,
        sources: &[String],
        details: Option<String>,
    ) -> Result<EnrichedRecord, EnrichError> {
        if field.trim().is_empty() {
            return Err(EnrichError::EmptyField);
        }
        let mut payload = record.payload.clone();
        payload.insert(field.to_string(), value);

        let mut merged = record.sources.clone();
        for source in sources {
            if !merged.contains(source) {
                merged.push(source.clone());
            }
        }

        Ok(EnrichedRecord {
            record_id: record_id(&payload),
            confidence_score: confidence_score(&payload, &merged),
            payload,
            sources: merged,
            metadata: EnrichmentMetadata {
                enriched_at: self.clock.now_rfc3339(),
                additional_sources: record.metadata.additional_sources.clone(),
                additional_details: details.or_else(|| record.metadata.additional_details.clone()),
            },
        })
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
