// crates/hookgate-cli/src/i18n.rs
// ============================================================================
// Module: CLI Message Catalog
// Description: Keyed user-facing strings with named placeholder substitution.
// Purpose: Keep every CLI message in one table so wording stays consistent.
// Dependencies: Standard library collections.
// ============================================================================

//! ## Overview
//! All runtime output of the `hookgate` binary is routed through the
//! [`t!`](crate::t) macro, which looks a key up in the catalog and replaces
//! `{name}` placeholders with the supplied arguments.
//!
//! ## Invariants
//! - The catalog is built once and read-only thereafter.
//! - Missing keys render as the key itself.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::OnceLock;

// ============================================================================
// SECTION: Types
// ============================================================================

/// A formatted message argument captured by the [`macro@crate::t`] macro.
#[derive(Clone)]
pub struct MessageArg {
    /// Placeholder name without braces (for example, `path`).
    pub key: &'static str,
    /// Preformatted value substituted for the placeholder.
    pub value: String,
}

impl MessageArg {
    /// Constructs a new [`MessageArg`] from a key and displayable value.
    pub fn new(key: &'static str, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Catalog entries.
const CATALOG: &[(&str, &str)] = &[
    ("main.version", "hookgate {version}"),
    ("output.stream.stdout", "stdout"),
    ("output.stream.stderr", "stderr"),
    ("output.stream.unknown", "output"),
    ("output.write_failed", "Failed to write to {stream}: {error}"),
    ("config.load_failed", "Failed to load config: {error}"),
    ("config.validate.ok", "Config valid."),
    ("serve.config.load_failed", "Failed to load config: {error}"),
    ("serve.init_failed", "Failed to initialize server: {error}"),
    ("serve.bind_failed", "Failed to bind {bind}: {error}"),
    ("serve.listening", "Hookgate listening on {bind} ({transport})"),
    ("serve.failed", "Server failed: {error}"),
    ("serve.stopped", "Server stopped; completed {count} open session(s)."),
    ("secret.bytes_invalid", "--bytes must be between 1 and {max} (got {bytes})."),
    ("sign.secret_missing", "Provide --secret or --secret-env."),
    ("sign.secret_env_missing", "Environment variable {env} is not set."),
    ("sign.data_invalid", "--data must be a JSON value: {error}"),
    ("sign.failed", "Failed to sign payload: {error}"),
    ("sign.header", "{name}: {value}"),
];

/// Returns the message catalog.
fn catalog() -> &'static HashMap<&'static str, &'static str> {
    static CATALOG_MAP: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    CATALOG_MAP.get_or_init(|| CATALOG.iter().copied().collect())
}

// ============================================================================
// SECTION: Translation
// ============================================================================

/// Renders `key` with `args` substituted into its placeholders.
#[must_use]
pub fn translate(key: &str, args: Vec<MessageArg>) -> String {
    let template = catalog().get(key).copied().unwrap_or(key);
    let mut result = template.to_string();
    for arg in args {
        let placeholder = format!("{{{}}}", arg.key);
        result = result.replace(&placeholder, &arg.value);
    }
    result
}

// ============================================================================
// SECTION: Macro
// ============================================================================

/// Formats a catalog message from a key and named arguments.
///
/// # Arguments
///
/// - `$key` must match a catalog entry.
/// - Named arguments are substituted into `{placeholder}` positions.
#[macro_export]
macro_rules! t {
    ($key:literal $(, $name:ident = $value:expr )* $(,)?) => {{
        let args = ::std::vec![
            $(
                $crate::i18n::MessageArg::new(stringify!($name), $value.to_string()),
            )*
        ];
        $crate::i18n::translate($key, args)
    }};
}

// ============================================================================
// SECTION: Tests
// ============================================================================
