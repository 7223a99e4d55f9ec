// crates/hookgate-core/src/replay.rs
// ============================================================================
// Module: Replay Guard
// Description: Bounded, time-evicting set of accepted signatures.
// Purpose: Reject webhook envelopes that were already accepted.
// Dependencies: std
// ============================================================================

//! ## Overview
//! A signature is bound to its timestamp and body, so signature identity is
//! enough to detect a replayed delivery. Each entry expires one window after
//! the later of its arrival and its envelope timestamp, so a future-dated
//! envelope stays remembered for as long as it can still pass the freshness
//! check. Expired entries are pruned lazily on every access.
//!
//! Invariants:
//! - A remembered signature reports duplicate until its envelope can no longer
//!   verify.
//! - The set never holds more than `max_entries` signatures; when full, the
//!   oldest entry is evicted first.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use crate::clock::Clock;
use crate::envelope::WEBHOOK_TOLERANCE_SECS;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Default cap on remembered signatures.
pub const DEFAULT_REPLAY_MAX_ENTRIES: usize = 10_000;

/// Replay guard sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayGuardConfig {
    /// Eviction horizon in seconds.
    pub window_seconds: u64,
    /// Maximum number of remembered signatures.
    pub max_entries: usize,
}

impl Default for ReplayGuardConfig {
    fn default() -> Self {
        Self {
            window_seconds: WEBHOOK_TOLERANCE_SECS,
            max_entries: DEFAULT_REPLAY_MAX_ENTRIES,
        }
    }
}

// ============================================================================
// SECTION: Replay Guard
// ============================================================================

/// Mutable replay state guarded by a single mutex.
#[derive(Debug, Default)]
struct ReplayState {
    /// Signature to expiry unix seconds.
    seen: HashMap<String, i64>,
    /// Insertion order with expiry, for eviction.
    order: VecDeque<(i64, String)>,
}

impl ReplayState {
    /// Drops expired entries from the front, then trims to capacity.
    ///
    /// Expiries are not monotonic in insertion order; an unexpired front entry
    /// only delays pruning of later ones, it never drops a live entry early.
    fn prune(&mut self, now: i64, max_entries: usize) {
        while let Some((expires_at, _)) = self.order.front() {
            if now <= *expires_at && self.order.len() <= max_entries {
                break;
            }
            if let Some((_, signature)) = self.order.pop_front() {
                self.seen.remove(&signature);
            }
        }
    }
}

/// Time-evicting set of accepted signatures.
pub struct ReplayGuard {
    /// Sizing configuration.
    config: ReplayGuardConfig,
    /// Clock used for eviction.
    clock: Arc<dyn Clock>,
    /// Guarded state.
    state: Mutex<ReplayState>,
}

impl ReplayGuard {
    /// Creates a guard with the given sizing.
    #[must_use]
    pub fn new(config: ReplayGuardConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            state: Mutex::new(ReplayState::default()),
        }
    }

    /// Returns true when `signature_hex` was accepted within the window.
    #[must_use]
    pub fn is_duplicate(&self, signature_hex: &str) -> bool {
        let key = normalize(signature_hex);
        let now = self.clock.now_unix_seconds();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.prune(now, self.config.max_entries);
        state.seen.contains_key(&key)
    }

    /// Remembers `signature_hex` as accepted now.
    pub fn remember(&self, signature_hex: &str) {
        let _ = self.check_and_remember(signature_hex);
    }

    /// Atomically checks and remembers a signature stamped with the current time.
    ///
    /// Returns true when the signature is a duplicate. First-seen signatures
    /// are recorded and return false.
    #[must_use]
    pub fn check_and_remember(&self, signature_hex: &str) -> bool {
        let now = self.clock.now_unix_seconds();
        self.check_and_remember_at(signature_hex, now)
    }

    /// Atomically checks and remembers a signature whose envelope carries
    /// `timestamp_seconds`.
    ///
    /// The entry is kept until one window past the later of now and
    /// `timestamp_seconds`.
    #[must_use]
    pub fn check_and_remember_at(&self, signature_hex: &str, timestamp_seconds: i64) -> bool {
        let key = normalize(signature_hex);
        let now = self.clock.now_unix_seconds();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.prune(now, self.config.max_entries);
        if state.seen.contains_key(&key) {
            return true;
        }
        if self.config.max_entries == 0 {
            return false;
        }
        if state.order.len() >= self.config.max_entries
            && let Some((_, oldest)) = state.order.pop_front()
        {
            state.seen.remove(&oldest);
        }
        let window = i64::try_from(self.config.window_seconds).unwrap_or(i64::MAX);
        let expires_at = now.max(timestamp_seconds).saturating_add(window);
        state.seen.insert(key.clone(), expires_at);
        state.order.push_back((expires_at, key));
        false
    }

    /// Returns the number of remembered signatures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).seen.len()
    }

    /// Returns true when nothing is remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Hex signatures are case-insensitive.
fn normalize(signature_hex: &str) -> String {
    signature_hex.trim().to_ascii_lowercase()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
