// crates/hookgate-config/src/lib.rs
// ============================================================================
// Module: Hookgate Config Library
// Description: Canonical configuration model and validation.
// Purpose: Single source of truth for hookgate.toml semantics.
// Dependencies: hookgate-core, serde, toml, url
// ============================================================================

//! ## Overview
//! `hookgate-config` defines the configuration model for the Hookgate server
//! and validates it fail-closed: a config that loads is safe to serve with.
//!
//! Security posture: config inputs are untrusted; secrets may be supplied by
//! environment variable so they stay out of checked-in files.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
