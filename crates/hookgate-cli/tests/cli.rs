// crates/hookgate-cli/tests/cli.rs
// ============================================================================
// Module: CLI Command Tests
// Description: Integration tests that run the `hookgate` binary.
// Purpose: Validate offline commands and fail-closed config handling.
// Dependencies: hookgate-cli binary, hookgate-core, tempfile
// ============================================================================
//! ## Overview
//! Spawns the compiled binary and checks exit status and output for the
//! config, secret, and sign commands.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::process::Output;

use hookgate_core::WEBHOOK_TOLERANCE_SECS;
use hookgate_core::WebhookEnvelope;
use hookgate_core::verify;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn hookgate_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_hookgate"))
}

fn run(args: &[&str]) -> Output {
    Command::new(hookgate_bin()).args(args).output().expect("run hookgate")
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).expect("utf-8 stdout")
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn version_flag_prints_the_package_version() {
    let output = run(&["--version"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), format!("hookgate {}", env!("CARGO_PKG_VERSION")));
}

#[test]
fn secret_generate_emits_hex_of_the_requested_size() {
    let output = run(&["secret", "generate", "--bytes", "16"]);
    assert!(output.status.success());
    let secret = stdout(&output).trim().to_string();
    assert_eq!(secret.len(), 32);
    assert!(secret.chars().all(|ch| ch.is_ascii_hexdigit()));

    let again = stdout(&run(&["secret", "generate", "--bytes", "16"]));
    assert_ne!(again.trim(), secret);
}

#[test]
fn secret_generate_rejects_zero_bytes() {
    let output = run(&["secret", "generate", "--bytes", "0"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--bytes must be between 1 and 512"));
}

#[test]
fn config_validate_accepts_valid_and_rejects_invalid_files() {
    let dir = tempfile::tempdir().expect("temp dir");
    let valid = dir.path().join("hookgate.toml");
    fs::write(
        &valid,
        "[server]\nbind = \"127.0.0.1:8787\"\n\n[webhook]\nsecret = \"whsec\"\n\n[[destinations]]\n\
         id = \"crm\"\ncallback_url = \"https://crm.example.com/hook\"\nsecret = \"s\"\n",
    )
    .expect("write config");
    let output = run(&["config", "validate", "--config", valid.to_str().unwrap()]);
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), "Config valid.");

    let invalid = dir.path().join("invalid.toml");
    fs::write(&invalid, "[delivery]\ntimeout_ms = 5\n").expect("write config");
    let output = run(&["config", "validate", "--config", invalid.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).starts_with("Failed to load config"));
}

#[test]
fn sign_prints_headers_that_verify() {
    let output = run(&[
        "sign",
        "--secret",
        "whsec_cli",
        "--event",
        "mcp.tool.execute",
        "--data",
        r#"{"toolName":"update_cell","parameters":{"rowIndex":1}}"#,
        "--timestamp",
        "1700000000",
    ]);
    assert!(output.status.success());
    let text = stdout(&output);
    let (headers, body) = text.split_once("\n\n").unwrap();
    let header = |name: &str| {
        headers
            .lines()
            .find_map(|line| line.strip_prefix(&format!("{name}: ")))
            .map(str::to_string)
    };
    assert_eq!(header("x-webhook-timestamp").as_deref(), Some("1700000000"));

    let envelope = WebhookEnvelope::from_http(
        body.trim_end().as_bytes(),
        header("x-webhook-signature").as_deref(),
        header("x-webhook-timestamp").as_deref(),
    )
    .unwrap();
    assert_eq!(envelope.event(), Some("mcp.tool.execute"));
    assert!(envelope.delivery_id().unwrap().starts_with("wh_"));
    assert!(verify(&envelope, "whsec_cli", WEBHOOK_TOLERANCE_SECS, 1_700_000_000).valid);
}

#[test]
fn sign_without_a_secret_fails() {
    let output = run(&["sign", "--event", "mcp.tool.execute"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Provide --secret"));
}
