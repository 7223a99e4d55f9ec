//! Config load validation tests for hookgate-config.
// crates/hookgate-config/tests/load_validation.rs
// =============================================================================
// Module: Config Load Validation Tests
// Description: Validate config loading guards, defaults, and secret lookup.
// Purpose: Ensure config input handling is strict and fail-closed.
// =============================================================================

use std::io::Write;
use std::path::Path;

use hookgate_config::AuditSinkKind;
use hookgate_config::ConfigError;
use hookgate_config::HookgateConfig;
use hookgate_config::ServerTransport;
use tempfile::NamedTempFile;

type TestResult = Result<(), String>;

fn assert_invalid(result: Result<HookgateConfig, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config load".to_string()),
    }
}

fn write_config(contents: &str) -> Result<NamedTempFile, String> {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(contents.as_bytes()).map_err(|err| err.to_string())?;
    Ok(file)
}

// ============================================================================
// SECTION: Load Guards
// ============================================================================

#[test]
fn load_rejects_path_component_too_long() -> TestResult {
    let long_component = "a".repeat(300);
    let path = Path::new(&long_component);
    assert_invalid(HookgateConfig::load(Some(path)), "config path component too long")
}

#[test]
fn load_rejects_oversized_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    let payload = vec![b'#'; 1_048_577];
    file.write_all(&payload).map_err(|err| err.to_string())?;
    assert_invalid(HookgateConfig::load(Some(file.path())), "config file exceeds size limit")
}

#[test]
fn load_rejects_non_utf8_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(&[0xFF, 0xFE, 0xFF]).map_err(|err| err.to_string())?;
    assert_invalid(HookgateConfig::load(Some(file.path())), "utf-8")
}

#[test]
fn load_reports_missing_file_as_io() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let missing = dir.path().join("absent.toml");
    match HookgateConfig::load(Some(&missing)) {
        Err(ConfigError::Io(_)) => Ok(()),
        Err(other) => Err(format!("expected io error, got {other}")),
        Ok(_) => Err("expected io error".to_string()),
    }
}

// ============================================================================
// SECTION: Defaults and Sections
// ============================================================================

#[test]
fn empty_file_uses_defaults() -> TestResult {
    let file = write_config("")?;
    let config = HookgateConfig::load(Some(file.path())).map_err(|err| err.to_string())?;
    if config.server.transport != ServerTransport::Http
        || config.delivery.timeout_ms != 5_000
        || config.audit.sink != AuditSinkKind::Stderr
        || !config.destinations.is_empty()
    {
        return Err("unexpected defaults".to_string());
    }
    Ok(())
}

#[test]
fn full_config_round_trips_sections() -> TestResult {
    let file = write_config(
        r#"
[server]
transport = "sse"
bind = "127.0.0.1:9100"
max_body_bytes = 65536

[webhook]
secret_env = "MY_INBOUND_SECRET"
replay_max_entries = 500

[delivery]
timeout_ms = 2500
user_agent = "acme-hooks/1.0"

[audit]
sink = "file"
path = "./audit.jsonl"

[[destinations]]
id = "crm"
callback_url = "https://crm.example.com/hooks"
secret = "crm-secret"

[[destinations]]
id = "local"
callback_url = "http://127.0.0.1:7000/in"
secret_env = "LOCAL_DEST_SECRET"
"#,
    )?;
    let config = HookgateConfig::load(Some(file.path())).map_err(|err| err.to_string())?;
    if config.server.transport != ServerTransport::Sse || config.destinations.len() != 2 {
        return Err("sections not parsed".to_string());
    }
    let inbound = config
        .webhook
        .resolve_secret_with(|name| (name == "MY_INBOUND_SECRET").then(|| "s3cr3t".to_string()))
        .map_err(|err| err.to_string())?;
    if inbound != "s3cr3t" {
        return Err(format!("unexpected inbound secret {inbound}"));
    }
    match config.destinations[1].resolve_secret_with(|_| None) {
        Err(err) if err.to_string().contains("LOCAL_DEST_SECRET") => Ok(()),
        Err(err) => Err(format!("unexpected error {err}")),
        Ok(_) => Err("missing env var must fail".to_string()),
    }
}

// ============================================================================
// SECTION: Validation Failures
// ============================================================================

#[test]
fn rejects_timeout_out_of_range() -> TestResult {
    assert_invalid(HookgateConfig::from_toml("[delivery]\ntimeout_ms = 50\n"), "timeout_ms")?;
    assert_invalid(HookgateConfig::from_toml("[delivery]\ntimeout_ms = 30001\n"), "timeout_ms")
}

#[test]
fn rejects_bad_bind_and_unknown_transport() -> TestResult {
    assert_invalid(HookgateConfig::from_toml("[server]\nbind = \"nowhere\"\n"), "bind")?;
    assert_invalid(HookgateConfig::from_toml("[server]\ntransport = \"stdio\"\n"), "parse")
}

#[test]
fn rejects_duplicate_and_insecure_destinations() -> TestResult {
    let duplicate = r#"
[[destinations]]
id = "a"
callback_url = "https://a.example.com"
secret = "x"

[[destinations]]
id = "a"
callback_url = "https://b.example.com"
secret = "y"
"#;
    assert_invalid(HookgateConfig::from_toml(duplicate), "duplicate destination id")?;

    let insecure = r#"
[[destinations]]
id = "a"
callback_url = "http://a.example.com"
secret = "x"
"#;
    assert_invalid(HookgateConfig::from_toml(insecure), "allow_insecure_http")?;
    let opted_in = format!("[delivery]\nallow_insecure_http = true\n{insecure}");
    HookgateConfig::from_toml(&opted_in).map(|_| ()).map_err(|err| err.to_string())
}

#[test]
fn rejects_destination_without_secret() -> TestResult {
    let config = r#"
[[destinations]]
id = "a"
callback_url = "https://a.example.com"
"#;
    assert_invalid(HookgateConfig::from_toml(config), "requires secret or secret_env")
}

#[test]
fn rejects_file_sink_without_path() -> TestResult {
    assert_invalid(HookgateConfig::from_toml("[audit]\nsink = \"file\"\n"), "audit.path")?;
    assert_invalid(
        HookgateConfig::from_toml("[audit]\nsink = \"none\"\npath = \"x.log\"\n"),
        "only valid for file sink",
    )
}

#[test]
fn rejects_conflicting_secret_fields() -> TestResult {
    assert_invalid(
        HookgateConfig::from_toml("[webhook]\nsecret = \"a\"\nsecret_env = \"B\"\n"),
        "both secret and secret_env",
    )
}
