// crates/hookgate-mcp/src/session.rs
// ============================================================================
// Module: Session Manager
// Description: Agent session lifecycle with lifecycle broadcasts.
// Purpose: Track sessions from creation to completion.
// Dependencies: hookgate-broker, hookgate-core, rand, time
// ============================================================================

//! ## Overview
//! Sessions move `none -> created -> completed` and are immutable once
//! completed. Each forward transition publishes `mcp.session.created` or
//! `mcp.session.completed`. Repeated starts and closes of unknown or completed
//! sessions are no-ops reported through [`SessionTransition`], never errors,
//! because upstream retries may duplicate lifecycle signals.
//!
//! Open sessions are bounded. Each start first completes sessions idle past
//! [`SESSION_IDLE_TTL_SECS`], then the oldest open sessions beyond
//! [`MAX_OPEN_SESSIONS`]. Swept sessions complete with `{"reason": ...}` stats
//! and broadcast like any other close.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use hookgate_broker::EventPublisher;
use hookgate_core::AuditSink;
use hookgate_core::Clock;
use hookgate_core::SessionAuditEvent;
use hookgate_core::WebhookEvent;
use hookgate_core::clock::format_rfc3339;
use hookgate_core::event_names;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Completed sessions retained for idempotent close detection.
const COMPLETED_RETENTION: usize = 4_096;

/// Maximum number of open sessions; the oldest is completed past this.
pub const MAX_OPEN_SESSIONS: usize = 4_096;

/// Seconds after creation at which an open session is completed as idle.
pub const SESSION_IDLE_TTL_SECS: i64 = 24 * 60 * 60;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Session record.
///
/// # Invariants
/// - `completed_at` is set at most once; the record never changes afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Session identifier.
    pub id: String,
    /// Creation time.
    pub created_at: OffsetDateTime,
    /// Completion time once closed.
    pub completed_at: Option<OffsetDateTime>,
    /// Aggregate statistics supplied at close.
    pub stats: Option<Value>,
}

impl Session {
    /// Returns true once the session is completed.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// Result of a lifecycle call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionTransition {
    /// `none -> created`.
    Created,
    /// Start on an already-known session; nothing changed.
    AlreadyActive,
    /// `created -> completed`.
    Completed,
    /// Close on a completed session; nothing changed.
    AlreadyCompleted,
    /// Close on an unknown session; nothing changed.
    Unknown,
}

impl SessionTransition {
    /// Returns the stable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::AlreadyActive => "already_active",
            Self::Completed => "completed",
            Self::AlreadyCompleted => "already_completed",
            Self::Unknown => "unknown",
        }
    }
}

/// Returns a random session identifier (`mcp_` + 32 hex chars).
#[must_use]
pub fn new_session_id() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    format!("mcp_{}", hex::encode(bytes))
}

// ============================================================================
// SECTION: Session Manager
// ============================================================================

/// Mutable session state.
#[derive(Default)]
struct SessionTable {
    /// Sessions keyed by id.
    sessions: BTreeMap<String, Session>,
    /// Completed session ids, oldest first.
    completed: VecDeque<String>,
    /// Session ids in creation order; completed ids are skipped lazily.
    open: VecDeque<String>,
    /// Number of sessions not yet completed.
    open_count: usize,
}

impl SessionTable {
    /// Completes `session_id` if it is open.
    fn complete(
        &mut self,
        session_id: &str,
        now: OffsetDateTime,
        stats: &Value,
    ) -> SessionTransition {
        let transition = match self.sessions.get_mut(session_id) {
            None => SessionTransition::Unknown,
            Some(session) if session.is_completed() => SessionTransition::AlreadyCompleted,
            Some(session) => {
                session.completed_at = Some(now);
                session.stats = Some(stats.clone());
                SessionTransition::Completed
            }
        };
        if transition == SessionTransition::Completed {
            self.open_count = self.open_count.saturating_sub(1);
            self.completed.push_back(session_id.to_string());
            while self.completed.len() > COMPLETED_RETENTION {
                if let Some(evicted) = self.completed.pop_front() {
                    self.sessions.remove(&evicted);
                }
            }
        }
        transition
    }

    /// Completes idle sessions and makes room for one more open session.
    fn sweep(&mut self, now: OffsetDateTime) -> Vec<(String, Value)> {
        let idle_cutoff = now - time::Duration::seconds(SESSION_IDLE_TTL_SECS);
        let mut swept = Vec::new();
        while let Some(front) = self.open.front() {
            let reason = match self.sessions.get(front) {
                Some(session) if !session.is_completed() => {
                    if session.created_at <= idle_cutoff {
                        Some("idle")
                    } else if self.open_count >= MAX_OPEN_SESSIONS {
                        Some("capacity")
                    } else {
                        break;
                    }
                }
                _ => None,
            };
            let Some(session_id) = self.open.pop_front() else {
                break;
            };
            if let Some(reason) = reason {
                let stats = json!({"reason": reason});
                if self.complete(&session_id, now, &stats) == SessionTransition::Completed {
                    swept.push((session_id, stats));
                }
            }
        }
        swept
    }
}

/// Owner of session records.
pub struct SessionManager {
    /// Session table.
    table: Mutex<SessionTable>,
    /// Lifecycle event publisher.
    publisher: Arc<dyn EventPublisher>,
    /// Clock for timestamps.
    clock: Arc<dyn Clock>,
    /// Audit sink for transitions.
    audit: Arc<dyn AuditSink>,
}

impl SessionManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new(
        publisher: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            table: Mutex::new(SessionTable::default()),
            publisher,
            clock,
            audit,
        }
    }

    /// Creates a session under `session_id` and broadcasts its creation.
    pub async fn on_session_start(&self, session_id: &str) -> SessionTransition {
        let now = self.clock.now();
        let (transition, swept) = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            let swept = table.sweep(now);
            let transition = match table.sessions.get(session_id) {
                Some(session) if session.is_completed() => SessionTransition::AlreadyCompleted,
                Some(_) => SessionTransition::AlreadyActive,
                None => {
                    table.sessions.insert(
                    session_id.to_string(),
                        Session {
                            id: session_id.to_string(),
                            created_at: now,
                            completed_at: None,
                            stats: None,
                        },
                    );
                    table.open.push_back(session_id.to_string());
                    table.open_count += 1;
                    SessionTransition::Created
                }
            };
            (transition, swept)
        };
        for (swept_id, stats) in swept {
            self.record(&swept_id, SessionTransition::Completed);
            self.publish_completed(&swept_id, stats, now).await;
        }
        self.record(session_id, transition);
        if transition == SessionTransition::Created {
            let event = WebhookEvent::new(
                event_names::SESSION_CREATED,
                json!({
                    "sessionId": session_id,
                    "timestamp": format_rfc3339(now),
                }),
            );
            self.publisher.publish(event).await;
        }
        transition
    }

    /// Completes a session with `stats` and broadcasts its completion.
    pub async fn on_session_end(&self, session_id: &str, stats: Value) -> SessionTransition {
        let now = self.clock.now();
        let transition = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            table.complete(session_id, now, &stats)
        };
        self.record(session_id, transition);
        if transition == SessionTransition::Completed {
            self.publish_completed(session_id, stats, now).await;
        }
        transition
    }

    /// Broadcasts `mcp.session.completed`.
    async fn publish_completed(&self, session_id: &str, stats: Value, now: OffsetDateTime) {
        let event = WebhookEvent::new(
            event_names::SESSION_COMPLETED,
            json!({
                "sessionId": session_id,
                "stats": stats,
                "timestamp": format_rfc3339(now),
            }),
        );
        self.publisher.publish(event).await;
    }

    /// Records a lifecycle call to the audit sink.
    fn record(&self, session_id: &str, transition: SessionTransition) {
        let event = SessionAuditEvent::new(session_id.to_string(), transition.label());
        self.audit.record_session(&event);
    }

    /// Returns a copy of the session record.
    #[must_use]
    pub fn get(&self, session_id: &str) -> Option<Session> {
        let table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        table.sessions.get(session_id).cloned()
    }

    /// Returns open (not completed) sessions ordered by id.
    #[must_use]
    pub fn open_sessions(&self) -> Vec<Session> {
        let table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        table.sessions.values().filter(|session| !session.is_completed()).cloned().collect()
    }

    /// Returns session duration in milliseconds as seen by the manager clock.
    #[must_use]
    pub fn elapsed_ms(&self, session: &Session) -> i128 {
        (self.clock.now() - session.created_at).whole_milliseconds()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
