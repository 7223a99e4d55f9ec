// crates/hookgate-broker/src/transport.rs
// ============================================================================
// Module: Delivery Transport
// Description: HTTP POST transport for signed webhook deliveries.
// Purpose: Isolate network I/O behind a trait the dispatcher can swap.
// Dependencies: async-trait, reqwest, url
// ============================================================================

//! ## Overview
//! [`DeliveryTransport`] posts one signed body and reports the HTTP status.
//! [`HttpTransport`] is the reqwest-backed implementation; tests may plug in
//! their own transport to simulate slow or failing destinations.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use hookgate_core::envelope::SIGNATURE_HEADER;
use hookgate_core::envelope::TIMESTAMP_HEADER;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Types
// ============================================================================

/// One signed delivery ready for the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    /// Callback URL.
    pub url: Url,
    /// Canonical JSON body bytes.
    pub body: Vec<u8>,
    /// Hex HMAC-SHA256 signature.
    pub signature_hex: String,
    /// Unix timestamp bound into the signature.
    pub timestamp_seconds: i64,
}

/// Transport-level delivery failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The HTTP client could not be constructed.
    #[error("http client unavailable: {0}")]
    Client(String),
    /// The request could not be sent or no response arrived.
    #[error("request failed: {0}")]
    Request(String),
}

// ============================================================================
// SECTION: Transport Trait
// ============================================================================

/// Posts signed deliveries to callback URLs.
#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    /// Posts the request and returns the HTTP status code.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when no HTTP response was received.
    async fn post(&self, request: &OutboundRequest) -> Result<u16, TransportError>;
}

// ============================================================================
// SECTION: HTTP Transport
// ============================================================================

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// Shared HTTP client.
    client: Client,
}

impl HttpTransport {
    /// Builds a transport with a request timeout and user agent.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Client`] when the client cannot be built.
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|err| TransportError::Client(err.to_string()))?;
        Ok(Self {
            client,
        })
    }
}

#[async_trait]
impl DeliveryTransport for HttpTransport {
    async fn post(&self, request: &OutboundRequest) -> Result<u16, TransportError> {
        let response = self
            .client
            .post(request.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, request.signature_hex.as_str())
            .header(TIMESTAMP_HEADER, request.timestamp_seconds.to_string())
            .body(request.body.clone())
            .send()
            .await
            .map_err(|err| TransportError::Request(err.to_string()))?;
        Ok(response.status().as_u16())
    }
}
