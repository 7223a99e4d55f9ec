// crates/hookgate-broker/src/registry.rs
// ============================================================================
// Module: Destination Registry
// Description: Named delivery endpoints with per-destination secrets.
// Purpose: Own destination records for the lifetime of the process.
// Dependencies: url, thiserror
// ============================================================================

//! ## Overview
//! The registry is the exclusive owner of [`Destination`] records. Adding a
//! destination with an existing id overwrites it; readers receive `Arc`
//! snapshots so deliveries in flight are unaffected by later upserts.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;

use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when registering destinations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Destination id was empty.
    #[error("destination id must not be empty")]
    EmptyId,
    /// Destination secret was empty.
    #[error("destination secret must not be empty")]
    EmptySecret,
}

// ============================================================================
// SECTION: Destination
// ============================================================================

/// Registered delivery endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct Destination {
    /// Destination identifier.
    id: String,
    /// Callback URL receiving deliveries.
    callback_url: Url,
    /// Shared HMAC secret.
    secret: String,
}

impl Destination {
    /// Returns the destination id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the callback URL.
    #[must_use]
    pub const fn callback_url(&self) -> &Url {
        &self.callback_url
    }

    /// Returns the shared secret.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Destination")
            .field("id", &self.id)
            .field("callback_url", &self.callback_url.as_str())
            .field("secret", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Thread-safe map of destinations keyed by id.
#[derive(Debug, Default)]
pub struct DestinationRegistry {
    /// Destinations ordered by id.
    destinations: RwLock<BTreeMap<String, Arc<Destination>>>,
}

impl DestinationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a destination. Returns true when an existing entry
    /// was overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the id or secret is empty.
    pub fn add_destination(
        &self,
        id: impl Into<String>,
        callback_url: Url,
        secret: impl Into<String>,
    ) -> Result<bool, RegistryError> {
        let id = id.into();
        let secret = secret.into();
        if id.trim().is_empty() {
            return Err(RegistryError::EmptyId);
        }
        if secret.is_empty() {
            return Err(RegistryError::EmptySecret);
        }
        let destination = Arc::new(Destination {
            id: id.clone(),
            callback_url,
            secret,
        });
        let mut guard = self.destinations.write().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.insert(id, destination).is_some())
    }

    /// Removes a destination. Returns true when it existed.
    pub fn remove_destination(&self, id: &str) -> bool {
        self.destinations.write().unwrap_or_else(PoisonError::into_inner).remove(id).is_some()
    }

    /// Returns the destination registered under `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<Destination>> {
        self.destinations.read().unwrap_or_else(PoisonError::into_inner).get(id).cloned()
    }

    /// Returns every destination ordered by id.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<Destination>> {
        let guard = self.destinations.read().unwrap_or_else(PoisonError::into_inner);
        guard.values().cloned().collect()
    }

    /// Returns the number of registered destinations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.destinations.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true when no destinations are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions."
    )]

    use url::Url;

    use super::DestinationRegistry;
    use super::RegistryError;

    fn url(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    #[test]
    fn add_is_an_upsert_by_id() {
        let registry = DestinationRegistry::new();
        assert!(!registry.add_destination("crm", url("https://a.example.com"), "s1").unwrap());
        assert!(registry.add_destination("crm", url("https://b.example.com"), "s2").unwrap());
        assert_eq!(registry.len(), 1);
        let current = registry.get("crm").unwrap();
        assert_eq!(current.callback_url().host_str(), Some("b.example.com"));
        assert_eq!(current.secret(), "s2");
    }

    #[test]
    fn remove_reports_presence() {
        let registry = DestinationRegistry::new();
        registry.add_destination("a", url("https://a.example.com"), "s").unwrap();
        assert!(registry.remove_destination("a"));
        assert!(!registry.remove_destination("a"));
        assert!(registry.is_empty());
    }

    #[test]
    fn rejects_empty_fields_and_redacts_debug() {
        let registry = DestinationRegistry::new();
        assert_eq!(
            registry.add_destination(" ", url("https://a.example.com"), "s"),
            Err(RegistryError::EmptyId)
        );
        assert_eq!(
            registry.add_destination("a", url("https://a.example.com"), ""),
            Err(RegistryError::EmptySecret)
        );
        registry.add_destination("a", url("https://a.example.com"), "topsecret").unwrap();
        let rendered = format!("{:?}", registry.get("a").unwrap());
        assert!(!rendered.contains("topsecret"));
    }
}
