// crates/hookgate-broker/src/publisher.rs
// ============================================================================
// Module: Event Publishers
// Description: Trait seam between event producers and outbound delivery.
// Purpose: Let tools and sessions emit events without owning the dispatcher.
// Dependencies: async-trait, tokio
// ============================================================================

//! ## Overview
//! Producers hold an `Arc<dyn EventPublisher>`. In production that is the
//! [`crate::WebhookDispatcher`]; [`ChannelPublisher`] forwards events to an
//! in-process channel for local observers, and [`NoopPublisher`] drops them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use hookgate_core::WebhookEvent;
use tokio::sync::mpsc;

use crate::dispatcher::BroadcastReport;
use crate::dispatcher::DeliveryFailure;

// ============================================================================
// SECTION: Publisher Trait
// ============================================================================

/// Publishes domain events to every interested destination.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes `event`. Never fails; per-destination failures are reported.
    async fn publish(&self, event: WebhookEvent) -> BroadcastReport;
}

// ============================================================================
// SECTION: Implementations
// ============================================================================

/// Publisher forwarding events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    /// Channel sender.
    sender: mpsc::UnboundedSender<WebhookEvent>,
}

impl ChannelPublisher {
    /// Creates a publisher and the receiver observing its events.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WebhookEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender,
            },
            receiver,
        )
    }
}

#[async_trait]
impl EventPublisher for ChannelPublisher {
    async fn publish(&self, event: WebhookEvent) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        if self.sender.send(event).is_err() {
            report.failed.push(DeliveryFailure {
                destination_id: "channel".to_string(),
                error: "receiver dropped".to_string(),
            });
        }
        report
    }
}

/// Publisher that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

#[async_trait]
impl EventPublisher for NoopPublisher {
    async fn publish(&self, _event: WebhookEvent) -> BroadcastReport {
        BroadcastReport::default()
    }
}
