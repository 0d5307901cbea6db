// crates/container-gate-cli/src/main.rs
// ============================================================================
// Module: Container Gate CLI Entry Point
// Description: Command dispatcher for the plugin server and offline checks.
// Purpose: Run the authorization plugin and validate its inputs.
// Dependencies: clap, container-gate-cli, container-gate-config, thiserror, tokio.
// ============================================================================

//! ## Overview
//! `container-gate serve` runs the authorization plugin on its Unix socket.
//! `policy check` and `config validate` exercise the same loaders offline so
//! operators can test changes before deploying them.
//!
//! Security posture: inputs are untrusted; files are read with size limits.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use container_gate_cli::bootstrap::build_gate;
use container_gate_cli::bootstrap::plugin_server;
use container_gate_cli::policy_check::DENY_EXIT_CODE;
use container_gate_cli::policy_check::MAX_CHECK_BODY_BYTES;
use container_gate_cli::policy_check::check_body;
use container_gate_config::ContainerGateConfig;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "container-gate", version, disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the authorization plugin server.
    Serve(ServeCommand),
    /// Container policy utilities.
    Policy {
        /// Selected policy subcommand.
        #[command(subcommand)]
        command: PolicyCommand,
    },
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Configuration for the `serve` command.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Optional config file path (defaults to container-gate.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Policy subcommands.
#[derive(Subcommand, Debug)]
enum PolicyCommand {
    /// Evaluate a creation body against a policy table.
    Check(PolicyCheckCommand),
}

/// Arguments for `policy check`.
#[derive(Args, Debug)]
struct PolicyCheckCommand {
    /// Path to the CSV policy table.
    #[arg(long, value_name = "PATH")]
    policy: PathBuf,
    /// Inline JSON creation body.
    #[arg(
        long,
        value_name = "JSON",
        conflicts_with = "body_file",
        required_unless_present = "body_file"
    )]
    body: Option<String>,
    /// File holding the JSON creation body.
    #[arg(long, value_name = "PATH")]
    body_file: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a Container Gate configuration file.
    Validate(ConfigValidateCommand),
}

/// Arguments for `config validate`.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Optional config file path (defaults to container-gate.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for operator-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
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
    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run(cli: Cli) -> CliResult<ExitCode> {
    match cli.command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::Policy {
            command: PolicyCommand::Check(command),
        } => command_policy_check(&command),
        Commands::Config {
            command: ConfigCommand::Validate(command),
        } => command_config_validate(&command),
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let config = ContainerGateConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    let gate = build_gate(&config, |name| std::env::var(name).ok())
        .map_err(|err| CliError::new(format!("failed to start: {err}")))?;
    gate.reconcile()
        .await
        .map_err(|err| CliError::new(format!("initial reconciliation failed: {err}")))?;
    let server = plugin_server(&config, gate);
    write_stderr_line(&format!("container-gate listening on {}", server.socket_path().display()))
        .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    server
        .serve_with_shutdown(shutdown_signal())
        .await
        .map_err(|err| CliError::new(format!("plugin server failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

/// Resolves when the process is asked to stop.
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

// ============================================================================
// SECTION: Policy Command
// ============================================================================

/// Executes the `policy check` command.
fn command_policy_check(command: &PolicyCheckCommand) -> CliResult<ExitCode> {
    let body = match (&command.body, &command.body_file) {
        (Some(body), _) => body.clone(),
        (None, Some(path)) => read_text_with_limit(path, MAX_CHECK_BODY_BYTES)?,
        (None, None) => {
            return Err(CliError::new("a --body or --body-file is required".to_string()));
        }
    };
    let report = check_body(&command.policy, &body)
        .map_err(|err| CliError::new(format!("failed to load policy: {err}")))?;
    let payload = serde_json::to_string(&report)
        .map_err(|err| CliError::new(format!("failed to render verdict: {err}")))?;
    write_stdout_line(&payload).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    if report.allowed { Ok(ExitCode::SUCCESS) } else { Ok(ExitCode::from(DENY_EXIT_CODE)) }
}

// ============================================================================
// SECTION: Config Command
// ============================================================================

/// Executes the `config validate` command.
fn command_config_validate(command: &ConfigValidateCommand) -> CliResult<ExitCode> {
    let _config = ContainerGateConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    write_stdout_line("ok").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Input Helpers
// ============================================================================

/// Errors returned by bounded file reads.
#[derive(Debug)]
enum ReadLimitError {
    /// File I/O failure.
    Io(std::io::Error),
    /// File size exceeds the configured limit.
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

/// Reads a file from disk while enforcing a hard size limit.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let size = file.metadata().map_err(ReadLimitError::Io)?.len();
    let limit = u64::try_from(max_bytes).map_err(|_| ReadLimitError::TooLarge {
        size,
        limit: max_bytes,
    })?;
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }
    let mut bytes = Vec::new();
    file.take(limit.saturating_add(1)).read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        return Err(ReadLimitError::TooLarge {
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

/// Reads a UTF-8 text file with a size limit.
fn read_text_with_limit(path: &Path, max_bytes: usize) -> CliResult<String> {
    let bytes = read_bytes_with_limit(path, max_bytes).map_err(|err| match err {
        ReadLimitError::Io(err) => CliError::new(format!("{}: {err}", path.display())),
        ReadLimitError::TooLarge {
            size,
            limit,
        } => CliError::new(format!("{}: {size} bytes exceeds limit {limit}", path.display())),
    })?;
    String::from_utf8(bytes)
        .map_err(|_| CliError::new(format!("{}: must be utf-8", path.display())))
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
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
