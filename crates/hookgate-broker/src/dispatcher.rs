// crates/hookgate-broker/src/dispatcher.rs
// ============================================================================
// Module: Webhook Dispatcher
// Description: Signs and fans out events to registered destinations.
// Purpose: Deliver every event to every destination with isolated failures.
// Dependencies: hookgate-core, tokio
// ============================================================================

//! ## Overview
//! Each delivery is signed at send time with the destination's secret, a
//! fresh timestamp, and a fresh delivery id, so two deliveries of the same
//! data are never bit-identical on the wire.
//!
//! [`WebhookDispatcher::broadcast`] spawns one task per destination and bounds
//! each with its own timeout. A failed or slow destination is reported in the
//! [`BroadcastReport`] and never affects its siblings. Non-2xx responses count
//! as failures. There is no retry.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hookgate_core::AuditSink;
use hookgate_core::Clock;
use hookgate_core::DeliveryAuditEvent;
use hookgate_core::DeliveryAuditEventParams;
use hookgate_core::NoopAuditSink;
use hookgate_core::SystemClock;
use hookgate_core::WebhookEvent;
use hookgate_core::sign_event;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinSet;
use url::Url;

use crate::publisher::EventPublisher;
use crate::registry::Destination;
use crate::registry::DestinationRegistry;
use crate::transport::DeliveryTransport;
use crate::transport::OutboundRequest;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default per-delivery timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
/// Destination label used for one-off deliveries.
const ADHOC_DESTINATION: &str = "adhoc";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by single-destination deliveries.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// No destination is registered under the id.
    #[error("unknown destination: {0}")]
    UnknownDestination(String),
    /// The event could not be signed.
    #[error("signing failed: {0}")]
    Signing(String),
    /// The destination could not be reached.
    #[error("destination {destination} unreachable: {message}")]
    Unreachable {
        /// Destination identifier.
        destination: String,
        /// Transport error description.
        message: String,
    },
    /// The destination answered with a non-2xx status.
    #[error("destination {destination} returned status {status}")]
    Rejected {
        /// Destination identifier.
        destination: String,
        /// HTTP status code.
        status: u16,
    },
    /// The delivery did not complete within the timeout.
    #[error("destination {destination} timed out after {timeout_ms}ms")]
    TimedOut {
        /// Destination identifier.
        destination: String,
        /// Timeout in milliseconds.
        timeout_ms: u128,
    },
    /// The dispatcher was built without a transport.
    #[error("dispatcher transport is not configured")]
    MissingTransport,
}

// ============================================================================
// SECTION: Reports
// ============================================================================

/// Successful delivery record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReceipt {
    /// Destination identifier.
    pub destination_id: String,
    /// Delivery identifier embedded in the body.
    pub delivery_id: String,
    /// HTTP status returned by the destination.
    pub status: u16,
    /// Unix timestamp bound into the signature.
    pub timestamp_seconds: i64,
}

/// Failed delivery record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryFailure {
    /// Destination identifier.
    pub destination_id: String,
    /// Error description.
    pub error: String,
}

/// Aggregate result of a broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    /// Successful deliveries ordered by destination id.
    pub delivered: Vec<DeliveryReceipt>,
    /// Failed deliveries ordered by destination id.
    pub failed: Vec<DeliveryFailure>,
}

impl BroadcastReport {
    /// Returns true when every attempted delivery succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Records one delivery outcome.
    fn push(&mut self, destination_id: String, result: Result<DeliveryReceipt, DeliveryError>) {
        match result {
            Ok(receipt) => self.delivered.push(receipt),
            Err(err) => self.failed.push(DeliveryFailure {
                destination_id,
                error: err.to_string(),
            }),
        }
    }

    /// Orders both lists by destination id.
    fn sort(&mut self) {
        self.delivered.sort_by(|a, b| a.destination_id.cmp(&b.destination_id));
        self.failed.sort_by(|a, b| a.destination_id.cmp(&b.destination_id));
    }
}

// ============================================================================
// SECTION: Delivery Context
// ============================================================================

/// Shared handles needed by one delivery task.
#[derive(Clone)]
struct DeliveryContext {
    /// Network transport.
    transport: Arc<dyn DeliveryTransport>,
    /// Clock for signature timestamps.
    clock: Arc<dyn Clock>,
    /// Audit sink for delivery records.
    audit: Arc<dyn AuditSink>,
    /// Per-delivery timeout.
    timeout: Duration,
}

impl DeliveryContext {
    /// Signs and posts one event to `url`, labelled `destination_id`.
    async fn deliver(
        &self,
        destination_id: &str,
        url: &Url,
        secret: &str,
        event: &WebhookEvent,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        let timestamp_seconds = self.clock.now_unix_seconds();
        let signed = sign_event(secret, event, timestamp_seconds)
            .map_err(|err| DeliveryError::Signing(err.to_string()))?;
        let request = OutboundRequest {
            url: url.clone(),
            body: signed.body,
            signature_hex: signed.signature_hex,
            timestamp_seconds,
        };
        let outcome = tokio::time::timeout(self.timeout, self.transport.post(&request)).await;
        let result = match outcome {
            Err(_) => Err(DeliveryError::TimedOut {
                destination: destination_id.to_string(),
                timeout_ms: self.timeout.as_millis(),
            }),
            Ok(Err(err)) => Err(DeliveryError::Unreachable {
                destination: destination_id.to_string(),
                message: err.to_string(),
            }),
            Ok(Ok(status)) if (200 .. 300).contains(&status) => Ok(DeliveryReceipt {
                destination_id: destination_id.to_string(),
                delivery_id: signed.delivery_id.clone(),
                status,
                timestamp_seconds,
            }),
            Ok(Ok(status)) => Err(DeliveryError::Rejected {
                destination: destination_id.to_string(),
                status,
            }),
        };
        self.audit.record_delivery(&DeliveryAuditEvent::new(DeliveryAuditEventParams {
            destination_id: destination_id.to_string(),
            webhook_event: event.event.clone(),
            delivery_id: Some(signed.delivery_id),
            status: match &result {
                Ok(receipt) => Some(receipt.status),
                Err(DeliveryError::Rejected {
                    status, ..
                }) => Some(*status),
                Err(_) => None,
            },
            error: result.as_ref().err().map(ToString::to_string),
        }));
        result
    }

    /// Delivers to a registered destination.
    async fn deliver_to(
        &self,
        destination: &Destination,
        event: &WebhookEvent,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        self.deliver(destination.id(), destination.callback_url(), destination.secret(), event)
            .await
    }
}

// ============================================================================
// SECTION: Dispatcher
// ============================================================================

/// Builder for a [`WebhookDispatcher`].
#[derive(Default)]
pub struct WebhookDispatcherBuilder {
    /// Destination registry (defaults to empty).
    registry: Option<Arc<DestinationRegistry>>,
    /// Network transport (required).
    transport: Option<Arc<dyn DeliveryTransport>>,
    /// Clock (defaults to system time).
    clock: Option<Arc<dyn Clock>>,
    /// Audit sink (defaults to no-op).
    audit: Option<Arc<dyn AuditSink>>,
    /// Per-delivery timeout (defaults to five seconds).
    timeout: Option<Duration>,
}

impl WebhookDispatcherBuilder {
    /// Uses an existing registry.
    #[must_use]
    pub fn registry(mut self, registry: Arc<DestinationRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Sets the network transport.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn DeliveryTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the clock used for signature timestamps.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the audit sink.
    #[must_use]
    pub fn audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Sets the per-delivery timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the dispatcher.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::MissingTransport`] when no transport is set.
    pub fn build(self) -> Result<WebhookDispatcher, DeliveryError> {
        Ok(WebhookDispatcher {
            registry: self.registry.unwrap_or_default(),
            context: DeliveryContext {
                transport: self.transport.ok_or(DeliveryError::MissingTransport)?,
                clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
                audit: self.audit.unwrap_or_else(|| Arc::new(NoopAuditSink)),
                timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            },
        })
    }
}

/// Signs and delivers events to registered destinations.
pub struct WebhookDispatcher {
    /// Destination registry.
    registry: Arc<DestinationRegistry>,
    /// Shared delivery handles.
    context: DeliveryContext,
}

impl WebhookDispatcher {
    /// Returns a builder.
    #[must_use]
    pub fn builder() -> WebhookDispatcherBuilder {
        WebhookDispatcherBuilder::default()
    }

    /// Returns the destination registry.
    #[must_use]
    pub const fn registry(&self) -> &Arc<DestinationRegistry> {
        &self.registry
    }

    /// Signs `event` for one registered destination and delivers it.
    ///
    /// Failures propagate to the caller; the destination stays registered.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError`] when the destination is unknown or delivery fails.
    pub async fn send_to_destination(
        &self,
        destination_id: &str,
        event: &WebhookEvent,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        let destination = self
            .registry
            .get(destination_id)
            .ok_or_else(|| DeliveryError::UnknownDestination(destination_id.to_string()))?;
        self.context.deliver_to(&destination, event).await
    }

    /// Delivers `event` to an unregistered URL without touching the registry.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError`] when delivery fails.
    pub async fn send_signed(
        &self,
        url: &Url,
        secret: &str,
        event: &WebhookEvent,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        self.context.deliver(ADHOC_DESTINATION, url, secret, event).await
    }

    /// Delivers `event` to every registered destination concurrently.
    pub async fn broadcast(&self, event: &WebhookEvent) -> BroadcastReport {
        let mut tasks = JoinSet::new();
        let mut labels = HashMap::new();
        for destination in self.registry.snapshot() {
            let context = self.context.clone();
            let event = event.clone();
            let id = destination.id().to_string();
            let handle = tasks.spawn(async move { context.deliver_to(&destination, &event).await });
            labels.insert(handle.id(), id);
        }

        let mut report = BroadcastReport::default();
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((task_id, result)) => {
                    let id = labels.remove(&task_id).unwrap_or_default();
                    report.push(id, result);
                }
                Err(err) => {
                    let id = labels.remove(&err.id()).unwrap_or_default();
                    report.failed.push(DeliveryFailure {
                        destination_id: id,
                        error: format!("delivery task failed: {err}"),
                    });
                }
            }
        }
        report.sort();
        report
    }
}

#[async_trait]
impl EventPublisher for WebhookDispatcher {
    async fn publish(&self, event: WebhookEvent) -> BroadcastReport {
        self.broadcast(&event).await
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
