// crates/hookgate-mcp/src/inhabitation.rs
// ============================================================================
// Module: Inhabitation Protocol
// Description: Exclusive, non-blocking claims over UI-addressable targets.
// Purpose: Keep the authoritative set of inhabited targets.
// Dependencies: hookgate-core, tokio
// ============================================================================

//! ## Overview
//! The registry is a mutual-exclusion register keyed by target id. A claim
//! either succeeds immediately or returns `false`; nobody waits. Mutation goes
//! through [`InhabitationRegistry::inhabit`] and
//! [`InhabitationRegistry::release`] only.
//!
//! Every mutation publishes a snapshot of the claimed ids on a watch channel.
//! UI-facing caches subscribe and mirror the set without owning it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use hookgate_core::AuditSink;
use hookgate_core::InhabitationAuditEvent;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Active claim over a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InhabitationClaim {
    /// Claimed target id.
    pub target_id: String,
    /// Caller-supplied context.
    pub context: Value,
}

/// Snapshot of claimed target ids.
pub type ClaimSnapshot = BTreeSet<String>;

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Authoritative claim set.
pub struct InhabitationRegistry {
    /// Claims keyed by target id.
    claims: Mutex<BTreeMap<String, Value>>,
    /// Snapshot publisher for mirrors.
    snapshots: watch::Sender<ClaimSnapshot>,
    /// Audit sink for claim decisions.
    audit: Arc<dyn AuditSink>,
}

impl InhabitationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(audit: Arc<dyn AuditSink>) -> Self {
        let (snapshots, _) = watch::channel(ClaimSnapshot::new());
        Self {
            claims: Mutex::new(BTreeMap::new()),
            snapshots,
            audit,
        }
    }

    /// Claims `target_id`. Returns false without side effects when it is
    /// already claimed or blank.
    pub fn inhabit(&self, target_id: &str, context: Value) -> bool {
        let accepted = if target_id.trim().is_empty() {
            false
        } else {
            let mut claims = self.claims.lock().unwrap_or_else(PoisonError::into_inner);
            if claims.contains_key(target_id) {
                false
            } else {
                claims.insert(target_id.to_string(), context);
                self.snapshots.send_replace(claims.keys().cloned().collect());
                true
            }
        };
        self.audit.record_inhabitation(&InhabitationAuditEvent::new(
            target_id.to_string(),
            "inhabit",
            accepted,
        ));
        accepted
    }

    /// Releases `target_id`. Returns whether a claim existed.
    pub fn release(&self, target_id: &str) -> bool {
        let released = {
            let mut claims = self.claims.lock().unwrap_or_else(PoisonError::into_inner);
            let existed = claims.remove(target_id).is_some();
            if existed {
                self.snapshots.send_replace(claims.keys().cloned().collect());
            }
            existed
        };
        self.audit.record_inhabitation(&InhabitationAuditEvent::new(
            target_id.to_string(),
            "release",
            released,
        ));
        released
    }

    /// Returns true when `target_id` is claimed.
    #[must_use]
    pub fn is_inhabited(&self, target_id: &str) -> bool {
        self.claims.lock().unwrap_or_else(PoisonError::into_inner).contains_key(target_id)
    }

    /// Returns every active claim ordered by target id.
    #[must_use]
    pub fn claims(&self) -> Vec<InhabitationClaim> {
        let claims = self.claims.lock().unwrap_or_else(PoisonError::into_inner);
        claims
            .iter()
            .map(|(target_id, context)| InhabitationClaim {
                target_id: target_id.clone(),
                context: context.clone(),
            })
            .collect()
    }

    /// Subscribes to claim-set snapshots.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ClaimSnapshot> {
        self.snapshots.subscribe()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
