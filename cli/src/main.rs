// Copyright (c) 2026 CodeVald Contributors
// SPDX-License-Identifier: AGPL-3.0

//! # agentconf
//!
//! Operator CLI for the agent configuration engine.
//!
//! ## Commands
//!
//! - `agentconf validate|import|export|get|list|delete|clone|history` - Agent configurations
//! - `agentconf config show|validate|generate` - Engine configuration
//! - `agentconf migrate [--dry-run]` - Apply database migrations
//!
//! Storage is selected by the engine configuration. With the default
//! in-memory backend every invocation starts from an empty store; set
//! `AGENTCONF_DATABASE_URL` (or `spec.storage`) to persist across runs.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;

use agentconf_cli::commands::{self, ConfigCommand, ConfigurationCommand, MigrateCommand};

/// agentconf - Declarative agent configuration engine
#[derive(Parser)]
#[command(name = "agentconf")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to engine configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "AGENTCONF_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "AGENTCONF_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Log output format
    #[arg(long, global = true, env = "AGENTCONF_LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Compact,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Configuration(ConfigurationCommand),

    /// Engine configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Apply database migrations
    #[command(name = "migrate")]
    Migrate {
        #[command(flatten)]
        command: MigrateCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.log_format)?;

    match cli.command {
        Some(Commands::Configuration(command)) => {
            commands::configuration::handle_command(command, cli.config).await
        }
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        Some(Commands::Migrate { command }) => commands::migrate::execute(command, cli.config).await,
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }

    Ok(())
}
