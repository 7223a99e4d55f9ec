// crates/hookgate-cli/src/lib.rs
// ============================================================================
// Module: Hookgate CLI Library
// Description: Shared helpers for the `hookgate` binary.
// Purpose: Expose the message catalog to the binary and its tests.
// Dependencies: Standard library.
// ============================================================================

//! ## Overview
//! Library half of the `hookgate` CLI. The binary lives in `main.rs`; this
//! crate only carries the [`i18n`] message catalog and its [`t!`] macro.

pub mod i18n;
