// crates/hookgate-config/src/config.rs
// ============================================================================
// Module: Hookgate Configuration
// Description: Configuration loading and validation for Hookgate.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: hookgate-core, serde, toml, url
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing or invalid configuration fails closed.
//!
//! Path resolution order: explicit path, then `HOOKGATE_CONFIG`, then
//! `./hookgate.toml`. Secrets may be inline or named by environment variable;
//! [`WebhookConfig::resolve_secret`] and [`DestinationConfig::resolve_secret`]
//! perform the lookup at startup.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use hookgate_core::replay::DEFAULT_REPLAY_MAX_ENTRIES;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use url::Host;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "hookgate.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "HOOKGATE_CONFIG";
/// Environment variable holding the inbound webhook secret by default.
pub const DEFAULT_SECRET_ENV: &str = "HOOKGATE_WEBHOOK_SECRET";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default bind address for the HTTP server.
const DEFAULT_BIND: &str = "127.0.0.1:8787";
/// Default maximum request body size in bytes.
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
/// Maximum allowed request body size in bytes.
pub(crate) const MAX_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;
/// Maximum number of remembered replay signatures.
pub(crate) const MAX_REPLAY_ENTRIES: usize = 1_000_000;
/// Default per-delivery timeout in milliseconds.
pub const DEFAULT_DELIVERY_TIMEOUT_MS: u64 = 5_000;
/// Minimum per-delivery timeout in milliseconds.
pub(crate) const MIN_DELIVERY_TIMEOUT_MS: u64 = 100;
/// Maximum per-delivery timeout in milliseconds.
pub(crate) const MAX_DELIVERY_TIMEOUT_MS: u64 = 30_000;
/// Default user agent for outbound deliveries.
pub const DEFAULT_USER_AGENT: &str = concat!("hookgate/", env!("CARGO_PKG_VERSION"));
/// Maximum user agent length.
pub(crate) const MAX_USER_AGENT_LENGTH: usize = 256;
/// Maximum secret length in bytes.
pub(crate) const MAX_SECRET_LENGTH: usize = 1024;
/// Maximum destination identifier length.
pub(crate) const MAX_DESTINATION_ID_LENGTH: usize = 128;
/// Maximum number of pre-registered destinations.
pub(crate) const MAX_DESTINATIONS: usize = 256;
/// Maximum callback URL length.
pub(crate) const MAX_CALLBACK_URL_LENGTH: usize = 2048;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Hookgate server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HookgateConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Inbound webhook configuration.
    #[serde(default)]
    pub webhook: WebhookConfig,
    /// Outbound delivery configuration.
    #[serde(default)]
    pub delivery: DeliveryConfig,
    /// Audit logging configuration.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Destinations registered at startup.
    #[serde(default)]
    pub destinations: Vec<DestinationConfig>,
}

impl HookgateConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.webhook.validate()?;
        self.delivery.validate()?;
        self.audit.validate()?;
        if self.destinations.len() > MAX_DESTINATIONS {
            return Err(ConfigError::Invalid("too many destinations".to_string()));
        }
        let mut seen = BTreeSet::new();
        for destination in &self.destinations {
            destination.validate(self.delivery.allow_insecure_http)?;
            if !seen.insert(destination.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate destination id: {}",
                    destination.id
                )));
            }
        }
        Ok(())
    }
}

/// Server transport selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServerTransport {
    /// Plain JSON-RPC responses.
    #[default]
    Http,
    /// JSON-RPC responses framed as server-sent events.
    Sse,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Response framing for the session transport.
    #[serde(default)]
    pub transport: ServerTransport,
    /// Socket address to bind.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: ServerTransport::default(),
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerConfig {
    /// Returns the parsed bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the bind address is not a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid("invalid bind address".to_string()))
    }

    /// Validates server configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_body_bytes must be greater than zero".to_string(),
            ));
        }
        if self.max_body_bytes > MAX_MAX_BODY_BYTES {
            return Err(ConfigError::Invalid("max_body_bytes exceeds limit".to_string()));
        }
        Ok(())
    }
}

/// Inbound webhook configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    /// Inline shared secret.
    #[serde(default)]
    pub secret: Option<String>,
    /// Environment variable holding the shared secret.
    #[serde(default)]
    pub secret_env: Option<String>,
    /// Maximum remembered signatures in the replay set.
    #[serde(default = "default_replay_max_entries")]
    pub replay_max_entries: usize,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret: None,
            secret_env: None,
            replay_max_entries: default_replay_max_entries(),
        }
    }
}

impl WebhookConfig {
    /// Resolves the inbound secret from config or the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when no secret is available.
    pub fn resolve_secret(&self) -> Result<String, ConfigError> {
        self.resolve_secret_with(|name| env::var(name).ok())
    }

    /// Resolves the inbound secret using `lookup` for environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when no secret is available.
    pub fn resolve_secret_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<String, ConfigError> {
        let env_name = self.secret_env.as_deref().unwrap_or(DEFAULT_SECRET_ENV);
        resolve_secret_value("webhook", self.secret.as_deref(), env_name, lookup)
    }

    /// Validates webhook configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_secret_fields("webhook", self.secret.as_deref(), self.secret_env.as_deref())?;
        if self.replay_max_entries == 0 || self.replay_max_entries > MAX_REPLAY_ENTRIES {
            return Err(ConfigError::Invalid(format!(
                "webhook.replay_max_entries must be between 1 and {MAX_REPLAY_ENTRIES}"
            )));
        }
        Ok(())
    }
}

/// Outbound delivery configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    /// Per-delivery timeout in milliseconds.
    #[serde(default = "default_delivery_timeout_ms")]
    pub timeout_ms: u64,
    /// User agent sent with every delivery.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Allow `http://` callbacks to non-loopback hosts.
    #[serde(default)]
    pub allow_insecure_http: bool,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_delivery_timeout_ms(),
            user_agent: default_user_agent(),
            allow_insecure_http: false,
        }
    }
}

impl DeliveryConfig {
    /// Validates delivery configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_DELIVERY_TIMEOUT_MS ..= MAX_DELIVERY_TIMEOUT_MS).contains(&self.timeout_ms) {
            return Err(ConfigError::Invalid(format!(
                "delivery.timeout_ms must be between {MIN_DELIVERY_TIMEOUT_MS} and \
                 {MAX_DELIVERY_TIMEOUT_MS}"
            )));
        }
        let agent = self.user_agent.trim();
        if agent.is_empty() || agent.len() > MAX_USER_AGENT_LENGTH {
            return Err(ConfigError::Invalid("delivery.user_agent is invalid".to_string()));
        }
        Ok(())
    }
}

/// Audit sink selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// Append-only JSON lines file.
    File,
    /// Discard audit events.
    None,
}

/// Audit logging configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditConfig {
    /// Sink selection.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// File path for the file sink.
    #[serde(default)]
    pub path: Option<String>,
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, self.path.as_deref()) {
            (AuditSinkKind::File, Some(path)) => validate_path_string("audit.path", path),
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("audit.path is required for file sink".to_string()))
            }
            (_, Some(_)) => {
                Err(ConfigError::Invalid("audit.path is only valid for file sink".to_string()))
            }
            (_, None) => Ok(()),
        }
    }
}

/// Destination registered at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct DestinationConfig {
    /// Destination identifier.
    pub id: String,
    /// Callback URL receiving deliveries.
    pub callback_url: String,
    /// Inline shared secret.
    #[serde(default)]
    pub secret: Option<String>,
    /// Environment variable holding the shared secret.
    #[serde(default)]
    pub secret_env: Option<String>,
}

impl DestinationConfig {
    /// Resolves the destination secret from config or the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when no secret is available.
    pub fn resolve_secret(&self) -> Result<String, ConfigError> {
        self.resolve_secret_with(|name| env::var(name).ok())
    }

    /// Resolves the destination secret using `lookup` for environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when no secret is available.
    pub fn resolve_secret_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<String, ConfigError> {
        let field = format!("destinations.{}", self.id);
        let env_name = self.secret_env.as_deref().unwrap_or_default();
        resolve_secret_value(&field, self.secret.as_deref(), env_name, lookup)
    }

    /// Validates destination configuration.
    fn validate(&self, allow_insecure_http: bool) -> Result<(), ConfigError> {
        validate_destination_id(&self.id)?;
        validate_callback_url(&self.callback_url, allow_insecure_http)?;
        let field = format!("destinations.{}", self.id);
        validate_secret_fields(&field, self.secret.as_deref(), self.secret_env.as_deref())?;
        if self.secret.is_none() && self.secret_env.is_none() {
            return Err(ConfigError::Invalid(format!("{field} requires secret or secret_env")));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Shared Validation
// ============================================================================

/// Validates a destination identifier.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] when the id is empty, too long, or
/// contains characters outside `[A-Za-z0-9._:-]`.
pub fn validate_destination_id(id: &str) -> Result<(), ConfigError> {
    if id.trim().is_empty() {
        return Err(ConfigError::Invalid("destination id must be non-empty".to_string()));
    }
    if id.len() > MAX_DESTINATION_ID_LENGTH {
        return Err(ConfigError::Invalid("destination id exceeds max length".to_string()));
    }
    if !id.chars().all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | ':')) {
        return Err(ConfigError::Invalid(format!("destination id has invalid characters: {id}")));
    }
    Ok(())
}

/// Parses and checks a callback URL.
///
/// `https` is always allowed; `http` is allowed for loopback hosts or when
/// `allow_insecure_http` is set.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] when the URL is unusable for delivery.
pub fn validate_callback_url(raw: &str, allow_insecure_http: bool) -> Result<Url, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_CALLBACK_URL_LENGTH {
        return Err(ConfigError::Invalid("callback url is empty or too long".to_string()));
    }
    let url = Url::parse(trimmed)
        .map_err(|err| ConfigError::Invalid(format!("callback url is invalid: {err}")))?;
    match url.scheme() {
        "https" => {}
        "http" if allow_insecure_http || is_loopback(&url) => {}
        "http" => {
            return Err(ConfigError::Invalid(
                "callback url uses http:// without allow_insecure_http".to_string(),
            ));
        }
        other => {
            return Err(ConfigError::Invalid(format!("callback url scheme not allowed: {other}")));
        }
    }
    if url.host().is_none() {
        return Err(ConfigError::Invalid("callback url must include a host".to_string()));
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(ConfigError::Invalid("callback url must not embed credentials".to_string()));
    }
    Ok(url)
}

/// Returns true when the URL host is a loopback address or `localhost`.
fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(addr)) => addr.is_loopback(),
        Some(Host::Ipv6(addr)) => addr.is_loopback(),
        None => false,
    }
}

/// Validates inline secret and env var name fields.
fn validate_secret_fields(
    field: &str,
    secret: Option<&str>,
    secret_env: Option<&str>,
) -> Result<(), ConfigError> {
    if secret.is_some() && secret_env.is_some() {
        return Err(ConfigError::Invalid(format!(
            "{field} sets both secret and secret_env"
        )));
    }
    if let Some(secret) = secret
        && (secret.is_empty() || secret.len() > MAX_SECRET_LENGTH)
    {
        return Err(ConfigError::Invalid(format!("{field}.secret length is invalid")));
    }
    if let Some(name) = secret_env
        && (name.trim().is_empty()
            || !name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_'))
    {
        return Err(ConfigError::Invalid(format!("{field}.secret_env is not a variable name")));
    }
    Ok(())
}

/// Picks the inline secret, else looks up `env_name`.
fn resolve_secret_value(
    field: &str,
    inline: Option<&str>,
    env_name: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String, ConfigError> {
    if let Some(secret) = inline {
        return Ok(secret.to_string());
    }
    if env_name.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} secret is not configured")));
    }
    match lookup(env_name) {
        Some(value) if !value.is_empty() && value.len() <= MAX_SECRET_LENGTH => Ok(value),
        Some(_) => Err(ConfigError::Invalid(format!("{field} secret from {env_name} is invalid"))),
        None => Err(ConfigError::Invalid(format!("{field} secret env var {env_name} is not set"))),
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Default bind address.
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

/// Default maximum request body size.
const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Default replay set capacity.
const fn default_replay_max_entries() -> usize {
    DEFAULT_REPLAY_MAX_ENTRIES
}

/// Default delivery timeout.
const fn default_delivery_timeout_ms() -> u64 {
    DEFAULT_DELIVERY_TIMEOUT_MS
}

/// Default user agent.
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    validate_path(Path::new(trimmed))
        .map_err(|_| ConfigError::Invalid(format!("{field} exceeds path limits")))
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

    use super::validate_callback_url;
    use super::validate_destination_id;
    use super::validate_path_string;

    #[test]
    fn callback_url_allows_https_and_loopback_http() {
        assert!(validate_callback_url("https://hooks.example.com/in", false).is_ok());
        assert!(validate_callback_url("http://127.0.0.1:9000/in", false).is_ok());
        assert!(validate_callback_url("http://localhost/in", false).is_ok());
        assert!(validate_callback_url("http://[::1]:8080/", false).is_ok());
    }

    #[test]
    fn callback_url_rejects_insecure_and_odd_schemes() {
        let err = validate_callback_url("http://hooks.example.com/in", false).unwrap_err();
        assert!(err.to_string().contains("allow_insecure_http"));
        assert!(validate_callback_url("http://hooks.example.com/in", true).is_ok());
        assert!(validate_callback_url("ftp://hooks.example.com/", true).is_err());
        assert!(validate_callback_url("https://user:pw@hooks.example.com/", false).is_err());
        assert!(validate_callback_url("not a url", false).is_err());
    }

    #[test]
    fn destination_id_charset_is_restricted() {
        assert!(validate_destination_id("crm-prod_1").is_ok());
        assert!(validate_destination_id("").is_err());
        assert!(validate_destination_id("has space").is_err());
        assert!(validate_destination_id(&"a".repeat(129)).is_err());
    }

    #[test]
    fn path_string_rejects_blank() {
        let err = validate_path_string("audit.path", "  ").unwrap_err();
        assert!(err.to_string().contains("audit.path"));
    }
}
