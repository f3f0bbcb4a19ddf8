// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use locust_service_api::CloudEvent;
use locust_service_core::RunOutcome;
use schemars::schema_for;
use tracing::{error, info, warn};

use crate::config;

type LogInitFn = fn(
    &config::LogConfig,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>, Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "locust-service.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Receives Keptn events over HTTP and runs load tests
    Serve,
    /// Handles a single test.triggered CloudEvent read from a JSON file
    Run {
        /// Path to the CloudEvent JSON file
        #[arg(short, long)]
        event: PathBuf,
    },
    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate a default config file and print it to stdout
    Default,
    /// Generate a JSON schema for the config and print it to stdout
    Schema,
}

/// Loads configuration and logging, exiting the process on failure.
// Allow eprintln before logging is initialized (CLI output)
#[allow(clippy::disallowed_macros)]
fn bootstrap(
    config_path: &str,
    init_logging: LogInitFn,
) -> (config::Config, Option<tracing_appender::non_blocking::WorkerGuard>) {
    let config_result = match config::load(config_path) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        },
    };

    let guard = match init_logging(&config_result.config.log) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            std::process::exit(1);
        },
    };

    if let Some(missing_file) = &config_result.file_missing {
        warn!(config_path = %missing_file, "Config file not found, using defaults");
    }

    (config_result.config, guard)
}

/// Log server startup information
fn log_startup_info(config: &config::Config) {
    info!(
        address = %config.server.address,
        service = %config.service.name,
        configuration_service = %config.keptn.configuration_service_url,
        event_broker = %config.keptn.event_broker_url,
        local_resources = ?config.resources.local_dir,
        command = %config.runner.command,
        secrets = ?config.secrets.backend,
        console_level = ?config.log.console_level,
        "Starting locust service"
    );
}

/// Handle the "serve" command - start the server
/// Exits the process on error with status code 1
async fn handle_serve_command(config_path: &str, init_logging: LogInitFn) {
    let (config, _log_guard) = bootstrap(config_path, init_logging);
    log_startup_info(&config);

    if let Err(e) = crate::server::start_server(&config).await {
        error!(error = %e, "Failed to start server");
        std::process::exit(1);
    }
}

async fn run_event_file(config: &config::Config, path: &Path) -> anyhow::Result<RunOutcome> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read event file {}", path.display()))?;
    let event: CloudEvent =
        serde_json::from_str(&content).context("event file is not a CloudEvent")?;
    let trigger = event.into_trigger()?;

    let runner = crate::worker::build_runner(config)?;
    Ok(runner.handle(trigger).await?)
}

/// Handle the "run" command - process one event and exit
/// Exits with status code 1 if the run could not be started or reported
async fn handle_run_command(config_path: &str, event_path: &Path, init_logging: LogInitFn) {
    let (config, log_guard) = bootstrap(config_path, init_logging);

    match run_event_file(&config, event_path).await {
        Ok(outcome) => {
            info!(
                status = outcome.status.as_str(),
                result = outcome.result.as_str(),
                message = %outcome.message,
                "Run reported"
            );
        },
        Err(e) => {
            error!(error = %e, "Run failed");
            drop(log_guard);
            std::process::exit(1);
        },
    }
}

/// Handle the "config default" command - print default config to stdout
// Allow println for CLI output to stdout (intentional)
#[allow(clippy::disallowed_macros)]
fn handle_config_default_command() {
    match config::generate_default() {
        Ok(toml_string) => {
            println!("# Default locust-service configuration file");
            println!("{toml_string}");
        },
        Err(e) => {
            eprintln!("Failed to generate default config: {e}");
            std::process::exit(1);
        },
    }
}

/// Handle the "config schema" command - print JSON schema to stdout
// Allow println for CLI output to stdout (intentional)
#[allow(clippy::disallowed_macros)]
fn handle_config_schema_command() {
    let schema = schema_for!(config::Config);
    match serde_json::to_string_pretty(&schema) {
        Ok(json) => {
            println!("{json}");
        },
        Err(e) => {
            eprintln!("Failed to generate config schema: {e}");
            std::process::exit(1);
        },
    }
}

/// Handle CLI commands
pub async fn handle_command(cli: &Cli, init_logging: LogInitFn) {
    match cli.command.as_ref().unwrap_or(&Commands::Serve) {
        Commands::Serve => {
            handle_serve_command(&cli.config, init_logging).await;
        },
        Commands::Run { event } => {
            handle_run_command(&cli.config, event, init_logging).await;
        },
        Commands::Config(ConfigCommands::Default) => {
            handle_config_default_command();
        },
        Commands::Config(ConfigCommands::Schema) => {
            handle_config_schema_command();
        },
    }
}
