// crates/hookgate-broker/src/lib.rs
// ============================================================================
// Module: Hookgate Broker Library
// Description: Destination registry and signed webhook fan-out.
// Purpose: Deliver domain events to every registered destination.
// Dependencies: hookgate-core, reqwest, tokio, url
// ============================================================================

//! ## Overview
//! Hookgate Broker owns outbound delivery. The [`DestinationRegistry`] holds
//! named callback endpoints with their shared secrets; the
//! [`WebhookDispatcher`] signs each delivery with a fresh timestamp and
//! delivery id and posts it through a [`DeliveryTransport`].
//!
//! Invariants:
//! - A broadcast never fails as a whole; per-destination errors are isolated
//!   into a [`BroadcastReport`].
//! - Delivery failures never remove a destination.
//! - Each delivery is bounded by its own timeout.
//!
//! Security posture: callback URLs are external systems; secrets never leave
//! the process except as HMAC signatures.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod dispatcher;
pub mod publisher;
pub mod registry;
pub mod transport;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use dispatcher::BroadcastReport;
pub use dispatcher::DeliveryError;
pub use dispatcher::DeliveryFailure;
pub use dispatcher::DeliveryReceipt;
pub use dispatcher::WebhookDispatcher;
pub use dispatcher::WebhookDispatcherBuilder;
pub use publisher::ChannelPublisher;
pub use publisher::EventPublisher;
pub use publisher::NoopPublisher;
pub use registry::Destination;
pub use registry::DestinationRegistry;
pub use registry::RegistryError;
pub use transport::DeliveryTransport;
pub use transport::HttpTransport;
pub use transport::OutboundRequest;
pub use transport::TransportError;
