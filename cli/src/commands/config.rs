// Copyright (c) 2026 CodeVald Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Engine configuration commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use agentconf_core::domain::engine_config::{EngineConfigManifest, StorageSettings};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current engine configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate engine configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Write the default engine configuration
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./agentconf.yaml")]
        output: PathBuf,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
        ConfigCommand::Generate { output } => generate(output),
    }
}

fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = EngineConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        match &config_override {
            Some(path) => println!("  1. --config flag: {}", path.display()),
            None => println!("  1. --config flag: {}", "(not set)".dimmed()),
        }
        println!(
            "  2. AGENTCONF_CONFIG_PATH: {}",
            std::env::var("AGENTCONF_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./agentconf.yaml");
        println!("  4. ~/.agentconf/config.yaml");
        println!("  5. /etc/agentconf/config.yaml");
        println!();
    }

    let spec = &config.spec;
    println!("{} {}", "Engine:".bold(), config.metadata.name);
    println!();

    println!("{}", "Storage:".bold());
    match &spec.storage {
        StorageSettings::InMemory => println!("  Backend: in_memory"),
        StorageSettings::Postgres { max_connections, .. } => {
            println!("  Backend: postgres");
            println!("  Connection string: {}", "(set)".dimmed());
            println!("  Max connections: {}", max_connections);
        }
    }
    println!();

    println!("{}", "Cache:".bold());
    println!("  Enabled: {}", spec.cache.enabled);
    println!("  TTL: {:?}", spec.cache.ttl);
    println!("  Capacity: {}", spec.cache.capacity);
    println!();

    println!("{}", "Validation:".bold());
    println!("  Agent types: {}", spec.validation.supported_agent_types.join(", "));
    if !spec.validation.disabled_agent_types.is_empty() {
        println!("  Disabled: {}", spec.validation.disabled_agent_types.join(", "));
    }
    println!(
        "  Strategies: {}",
        spec.validation
            .supported_strategies
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!();

    println!("{}", "Node capacity:".bold());
    println!("  CPU cores: {}", spec.node.cpu_cores);
    println!("  Memory: {} GiB", spec.node.memory_gb);
    println!("  Disk: {} GiB", spec.node.disk_gb);

    Ok(())
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating engine configuration...");

    let config = EngineConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());
    Ok(())
}

fn generate(output: PathBuf) -> Result<()> {
    EngineConfigManifest::default()
        .to_yaml_file(&output)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );
    Ok(())
}
