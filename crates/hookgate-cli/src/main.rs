// crates/hookgate-cli/src/main.rs
// ============================================================================
// Module: Hookgate CLI Entry Point
// Description: Command dispatcher for the Hookgate server and signing tools.
// Purpose: Run the server and provide offline secret and signature helpers.
// Dependencies: clap, hookgate-config, hookgate-core, hookgate-mcp, tokio
// ============================================================================

//! ## Overview
//! The `hookgate` binary starts the webhook/session server and offers small
//! offline utilities: configuration validation, shared-secret generation, and
//! signing a test delivery. All user-facing strings are routed through the
//! message catalog. Security posture: secrets are read from flags or the
//! environment and never echoed back, except by `secret generate`.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use hookgate_cli::t;
use hookgate_config::HookgateConfig;
use hookgate_config::ServerTransport;
use hookgate_core::Clock;
use hookgate_core::SignedDelivery;
use hookgate_core::SystemClock;
use hookgate_core::WebhookEvent;
use hookgate_core::envelope::SIGNATURE_HEADER;
use hookgate_core::envelope::TIMESTAMP_HEADER;
use hookgate_core::generate_secret;
use hookgate_core::sign_event;
use hookgate_core::signing::DEFAULT_SECRET_BYTES;
use hookgate_mcp::McpServer;
use serde_json::Value;
use thiserror::Error;
use tokio::net::TcpListener;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Largest secret `secret generate` will emit; hex doubles it to the config cap.
const MAX_SECRET_BYTES: usize = 512;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "hookgate", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the Hookgate server.
    Serve(ServeCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Shared-secret utilities.
    Secret {
        /// Selected secret subcommand.
        #[command(subcommand)]
        command: SecretCommand,
    },
    /// Sign a test delivery and print its headers and body.
    Sign(SignCommand),
}

/// Configuration for the `serve` command.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Optional config file path (defaults to hookgate.toml or `HOOKGATE_CONFIG`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a configuration file.
    Validate(ConfigValidateCommand),
}

/// Arguments for config validation.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Optional config file path (defaults to hookgate.toml or `HOOKGATE_CONFIG`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Secret subcommands.
#[derive(Subcommand, Debug)]
enum SecretCommand {
    /// Generate a random hex secret.
    Generate(SecretGenerateCommand),
}

/// Arguments for secret generation.
#[derive(Args, Debug)]
struct SecretGenerateCommand {
    /// Number of random bytes (the hex output is twice as long).
    #[arg(long, value_name = "N", default_value_t = DEFAULT_SECRET_BYTES)]
    bytes: usize,
}

/// Arguments for signing a test delivery.
#[derive(Args, Debug)]
struct SignCommand {
    /// Shared secret used for the signature.
    #[arg(long, value_name = "SECRET", conflicts_with = "secret_env")]
    secret: Option<String>,
    /// Environment variable holding the shared secret.
    #[arg(long, value_name = "VAR")]
    secret_env: Option<String>,
    /// Event name placed in the body.
    #[arg(long, value_name = "EVENT")]
    event: String,
    /// JSON value placed under `data`.
    #[arg(long, value_name = "JSON", default_value = "{}")]
    data: String,
    /// Unix timestamp bound into the signature (defaults to now).
    #[arg(long, value_name = "UNIX_SECONDS", allow_negative_numbers = true)]
    timestamp: Option<i64>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error carrying a catalog message.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a rendered message.
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();

    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&t!("main.version", version = version))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        Cli::command()
            .print_help()
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    };

    match command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::Config {
            command,
        } => command_config(command),
        Commands::Secret {
            command,
        } => command_secret(command),
        Commands::Sign(command) => command_sign(&command),
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let config = HookgateConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(t!("serve.config.load_failed", error = err)))?;
    let server = McpServer::from_config(&config)
        .map_err(|err| CliError::new(t!("serve.init_failed", error = err)))?;
    let bind = server.bind_addr();
    let listener = TcpListener::bind(bind)
        .await
        .map_err(|err| CliError::new(t!("serve.bind_failed", bind = bind, error = err)))?;
    let local = listener.local_addr().unwrap_or(bind);
    write_stderr_line(&t!(
        "serve.listening",
        bind = local,
        transport = transport_label(config.server.transport)
    ))
    .map_err(|err| CliError::new(output_error("stderr", &err)))?;

    let completed = server
        .serve_until(listener, shutdown_signal())
        .await
        .map_err(|err| CliError::new(t!("serve.failed", error = err)))?;
    write_stderr_line(&t!("serve.stopped", count = completed))
        .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Resolves on Ctrl-C. A failed signal install never triggers shutdown.
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Returns the display label for a transport.
const fn transport_label(transport: ServerTransport) -> &'static str {
    match transport {
        ServerTransport::Http => "http",
        ServerTransport::Sse => "sse",
    }
}

// ============================================================================
// SECTION: Config Command
// ============================================================================

/// Executes config subcommands.
fn command_config(command: ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate(command) => {
            HookgateConfig::load(command.config.as_deref())
                .map_err(|err| CliError::new(t!("config.load_failed", error = err)))?;
            write_stdout_line(&t!("config.validate.ok"))
                .map_err(|err| CliError::new(output_error("stdout", &err)))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ============================================================================
// SECTION: Secret Command
// ============================================================================

/// Executes secret subcommands.
fn command_secret(command: SecretCommand) -> CliResult<ExitCode> {
    match command {
        SecretCommand::Generate(command) => {
            let bytes = validate_secret_bytes(command.bytes)?;
            write_stdout_line(&generate_secret(bytes))
                .map_err(|err| CliError::new(output_error("stdout", &err)))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Checks the requested secret size.
fn validate_secret_bytes(bytes: usize) -> CliResult<usize> {
    if bytes == 0 || bytes > MAX_SECRET_BYTES {
        return Err(CliError::new(t!(
            "secret.bytes_invalid",
            max = MAX_SECRET_BYTES,
            bytes = bytes
        )));
    }
    Ok(bytes)
}

// ============================================================================
// SECTION: Sign Command
// ============================================================================

/// Executes the `sign` command.
fn command_sign(command: &SignCommand) -> CliResult<ExitCode> {
    let secret = resolve_sign_secret(
        command.secret.as_deref(),
        command.secret_env.as_deref(),
        |name| std::env::var(name).ok(),
    )?;
    let data: Value = serde_json::from_str(&command.data)
        .map_err(|err| CliError::new(t!("sign.data_invalid", error = err)))?;
    let timestamp = command.timestamp.unwrap_or_else(|| SystemClock.now_unix_seconds());
    let signed = sign_event(&secret, &WebhookEvent::new(command.event.as_str(), data), timestamp)
        .map_err(|err| CliError::new(t!("sign.failed", error = err)))?;
    write_stdout_line(&render_signed(&signed))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Picks the signing secret from the flag or the named environment variable.
fn resolve_sign_secret(
    secret: Option<&str>,
    secret_env: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
) -> CliResult<String> {
    match (secret, secret_env) {
        (Some(secret), _) if !secret.is_empty() => Ok(secret.to_string()),
        (_, Some(env)) => lookup(env)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| CliError::new(t!("sign.secret_env_missing", env = env))),
        _ => Err(CliError::new(t!("sign.secret_missing"))),
    }
}

/// Renders headers, a blank line, then the canonical body.
fn render_signed(signed: &SignedDelivery) -> String {
    let headers = [
        (SIGNATURE_HEADER, signed.signature_hex.clone()),
        (TIMESTAMP_HEADER, signed.timestamp_seconds.to_string()),
        ("content-type", "application/json".to_string()),
    ];
    let mut output = String::new();
    for (name, value) in headers {
        output.push_str(&t!("sign.header", name = name, value = value));
        output.push('\n');
    }
    output.push('\n');
    output.push_str(&String::from_utf8_lossy(&signed.body));
    output
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    let stream_label = match stream {
        "stdout" => t!("output.stream.stdout"),
        "stderr" => t!("output.stream.stderr"),
        _ => t!("output.stream.unknown"),
    };
    t!("output.write_failed", stream = stream_label, error = error)
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
