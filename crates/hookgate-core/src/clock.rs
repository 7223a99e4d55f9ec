// crates/hookgate-core/src/clock.rs
// ============================================================================
// Module: Hookgate Clock
// Description: Wall-clock abstraction for verification and enrichment.
// Purpose: Allow deterministic time in tests without touching global state.
// Dependencies: time
// ============================================================================

//! ## Overview
//! Verification tolerance, replay eviction, and enrichment timestamps all read
//! the current time through [`Clock`]. Production code uses [`SystemClock`];
//! tests pin time with [`FixedClock`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Clock Trait
// ============================================================================

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    /// Returns the current UTC time.
    fn now(&self) -> OffsetDateTime;

    /// Returns the current time as unix seconds.
    fn now_unix_seconds(&self) -> i64 {
        self.now().unix_timestamp()
    }

    /// Returns the current time formatted as RFC 3339 (ISO 8601).
    fn now_rfc3339(&self) -> String {
        format_rfc3339(self.now())
    }
}

/// Clock backed by the operating system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Clock pinned to a settable unix timestamp.
///
/// # Invariants
/// - Reads and writes are atomic; the clock may be shared across threads.
#[derive(Debug)]
pub struct FixedClock {
    /// Current time in unix seconds.
    seconds: AtomicI64,
}

impl FixedClock {
    /// Creates a clock pinned at `seconds` since the unix epoch.
    #[must_use]
    pub const fn new(seconds: i64) -> Self {
        Self {
            seconds: AtomicI64::new(seconds),
        }
    }

    /// Moves the clock to an absolute unix timestamp.
    pub fn set(&self, seconds: i64) {
        self.seconds.store(seconds, Ordering::SeqCst);
    }

    /// Advances the clock by `delta` seconds (negative values rewind).
    pub fn advance(&self, delta: i64) {
        self.seconds.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(self.seconds.load(Ordering::SeqCst))
            .unwrap_or(OffsetDateTime::UNIX_EPOCH)
    }

    fn now_unix_seconds(&self) -> i64 {
        self.seconds.load(Ordering::SeqCst)
    }
}

// ============================================================================
// SECTION: Formatting
// ============================================================================

/// Formats a timestamp as RFC 3339, falling back to unix seconds.
#[must_use]
pub fn format_rfc3339(value: OffsetDateTime) -> String {
    value.format(&Rfc3339).unwrap_or_else(|_| value.unix_timestamp().to_string())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
