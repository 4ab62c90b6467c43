// Copyright (c) 2026 CodeVald Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Agent configuration commands
//!
//! Commands: validate, import, export, get, list, delete, clone, history

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use agentconf_core::application::repository_factory::build_configuration_service;
use agentconf_core::application::{ConfigurationError, ConfigurationService, ExportFormat};
use agentconf_core::domain::configuration::{AgentConfiguration, ConfigurationId};
use agentconf_core::domain::engine_config::EngineConfigManifest;
use agentconf_core::domain::repository::{ListFilter, SortSpec};
use agentconf_core::domain::validation::ValidationErrors;
use agentconf_core::infrastructure::TracingNotifier;

#[derive(Subcommand)]
pub enum ConfigurationCommand {
    /// Validate an agent configuration file without storing it
    Validate {
        /// Path to configuration document (.json, .yaml or .yml)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Document format (default: from file extension)
        #[arg(long)]
        format: Option<ExportFormat>,
    },

    /// Import an agent configuration file under a new identity
    Import {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Document format (default: from file extension)
        #[arg(long)]
        format: Option<ExportFormat>,

        /// Recorded as the configuration's creator
        #[arg(long, env = "AGENTCONF_ACTOR")]
        actor: Option<String>,
    },

    /// Export a stored configuration
    Export {
        #[arg(value_name = "ID")]
        id: String,

        #[arg(long, default_value = "yaml")]
        format: ExportFormat,

        /// Write to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show a stored configuration
    Get {
        #[arg(value_name = "ID")]
        id: String,
    },

    /// List stored configurations
    List {
        /// Only this agent type
        #[arg(long)]
        agent_type: Option<String>,

        /// Required label, repeatable (key=value)
        #[arg(long = "label", value_name = "KEY=VALUE", value_parser = parse_label)]
        labels: Vec<(String, String)>,

        /// Sort field and order, e.g. name:asc (default: created_at:desc)
        #[arg(long, value_parser = parse_sort)]
        sort: Option<SortSpec>,

        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Maximum rows (0 = unlimited)
        #[arg(long, default_value_t = 0)]
        limit: usize,
    },

    /// Delete a stored configuration and its history
    Delete {
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Copy a configuration under a new identity and name
    Clone {
        #[arg(value_name = "ID")]
        id: String,

        #[arg(value_name = "NAME")]
        name: String,
    },

    /// Show the stored revisions of a configuration, newest first
    History {
        #[arg(value_name = "ID")]
        id: String,
    },
}

pub async fn handle_command(command: ConfigurationCommand, config_path: Option<PathBuf>) -> Result<()> {
    let service = connect(config_path).await?;

    match command {
        ConfigurationCommand::Validate { file, format } => validate(&service, &file, format),
        ConfigurationCommand::Import { file, format, actor } => {
            import(&service, &file, format, actor.as_deref()).await
        }
        ConfigurationCommand::Export { id, format, output } => {
            export(&service, &id.into(), format, output).await
        }
        ConfigurationCommand::Get { id } => get(&service, &id.into()).await,
        ConfigurationCommand::List {
            agent_type,
            labels,
            sort,
            offset,
            limit,
        } => {
            let filter = ListFilter {
                agent_type,
                labels: labels.into_iter().collect(),
                sort,
                offset,
                limit,
                ..Default::default()
            };
            list(&service, &filter).await
        }
        ConfigurationCommand::Delete { id } => delete(&service, &id.into()).await,
        ConfigurationCommand::Clone { id, name } => clone(&service, &id.into(), &name).await,
        ConfigurationCommand::History { id } => history(&service, &id.into()).await,
    }
}

async fn connect(config_path: Option<PathBuf>) -> Result<Arc<ConfigurationService>> {
    let manifest = EngineConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;
    manifest
        .validate()
        .context("Configuration validation failed")?;

    let service = build_configuration_service(&manifest, Arc::new(TracingNotifier))
        .await
        .context("Failed to initialize configuration service")?;
    Ok(Arc::new(service))
}

/// Explicit format wins, then the file extension. Unknown extensions read as JSON.
pub fn detect_format(path: &Path, explicit: Option<ExportFormat>) -> ExportFormat {
    if let Some(format) = explicit {
        return format;
    }
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| ext.parse().ok())
        .unwrap_or_default()
}

pub fn parse_label(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("invalid label '{}': expected KEY=VALUE", raw)),
    }
}

pub fn parse_sort(raw: &str) -> Result<SortSpec, String> {
    let (field, order) = raw.split_once(':').unwrap_or((raw, "asc"));
    Ok(SortSpec {
        field: field.parse()?,
        order: order.parse()?,
    })
}

fn read_document(path: &Path, format: ExportFormat) -> Result<AgentConfiguration> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config = match format {
        ExportFormat::Json => AgentConfiguration::from_json(&data)
            .with_context(|| format!("Failed to parse {} as JSON", path.display()))?,
        ExportFormat::Yaml => AgentConfiguration::from_yaml(&data)
            .with_context(|| format!("Failed to parse {} as YAML", path.display()))?,
    };
    Ok(config)
}

fn print_violations(errors: &ValidationErrors) {
    for error in errors {
        println!(
            "  {} {}: {} (value: '{}')",
            "✗".red(),
            error.field.bold(),
            error.message,
            error.value
        );
    }
}

/// Prints validation detail before handing the error back to `main`.
fn report(err: ConfigurationError) -> anyhow::Error {
    if let Some(errors) = err.validation_errors() {
        println!("{}", format!("{} violation(s):", errors.len()).red());
        print_violations(errors);
    }
    err.into()
}

fn validate(service: &ConfigurationService, file: &Path, format: Option<ExportFormat>) -> Result<()> {
    let config = read_document(file, detect_format(file, format))?;

    match service.validate_configuration(&config) {
        Ok(()) => {
            println!("{}", format!("✓ {} is valid", file.display()).green());
            Ok(())
        }
        Err(e) => Err(report(e)).context(format!("{} is invalid", file.display())),
    }
}

async fn import(
    service: &ConfigurationService,
    file: &Path,
    format: Option<ExportFormat>,
    actor: Option<&str>,
) -> Result<()> {
    let format = detect_format(file, format);
    let data = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let config = service
        .import_configuration_as(&data, format, actor)
        .await
        .map_err(report)?;

    println!(
        "{}",
        format!("✓ Imported '{}' as {}", config.name, config.id).green()
    );
    Ok(())
}

async fn export(
    service: &ConfigurationService,
    id: &ConfigurationId,
    format: ExportFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    let document = service.export_configuration(id, format).await?;

    match output {
        Some(path) => {
            std::fs::write(&path, document)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{}", format!("✓ Exported {} to {}", id, path.display()).green());
        }
        None => println!("{}", document),
    }
    Ok(())
}

async fn get(service: &ConfigurationService, id: &ConfigurationId) -> Result<()> {
    let config = service.get_configuration(id).await?;

    println!("{}", config.name.bold());
    println!("  ID: {}", config.id);
    println!("  Type: {}", config.agent_type);
    println!("  Version: {} (revision {})", config.version, config.revision);
    if !config.description.is_empty() {
        println!("  Description: {}", config.description);
    }
    if let Some(created_at) = config.created_at {
        println!("  Created: {}", created_at.to_rfc3339());
    }
    if let Some(created_by) = &config.created_by {
        println!("  Created by: {}", created_by);
    }
    if let Some(updated_at) = config.updated_at {
        println!("  Updated: {}", updated_at.to_rfc3339());
    }
    if !config.labels.is_empty() {
        println!("  Labels: {}", format_labels(&config.labels));
    }
    println!(
        "  Deployment: {} x{}",
        config.deployment_config.strategy, config.deployment_config.replicas
    );
    Ok(())
}

fn format_labels(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

async fn list(service: &ConfigurationService, filter: &ListFilter) -> Result<()> {
    let configs = service.list_configurations(filter).await?;

    if configs.is_empty() {
        println!("{}", "No configurations found".yellow());
        return Ok(());
    }

    println!("{} configurations found:", configs.len());
    println!("{:<38} {:<24} {:<12} {:<10} LABELS", "ID", "NAME", "TYPE", "VERSION");
    for config in configs {
        println!(
            "{:<38} {:<24} {:<12} {:<10} {}",
            config.id,
            config.name.bold(),
            config.agent_type,
            config.version,
            format_labels(&config.labels)
        );
    }
    Ok(())
}

async fn delete(service: &ConfigurationService, id: &ConfigurationId) -> Result<()> {
    service.delete_configuration(id).await?;
    println!("{}", format!("✓ Deleted {}", id).green());
    Ok(())
}

async fn clone(service: &ConfigurationService, id: &ConfigurationId, name: &str) -> Result<()> {
    let clone = service.clone_configuration(id, name).await.map_err(report)?;
    println!("{}", format!("✓ Cloned {} to '{}' ({})", id, clone.name, clone.id).green());
    Ok(())
}

async fn history(service: &ConfigurationService, id: &ConfigurationId) -> Result<()> {
    let versions = service.get_configuration_versions(id).await?;
    if versions.is_empty() {
        bail!("No history for configuration {}", id);
    }

    println!("{:<10} {:<10} {:<26} NAME", "REVISION", "VERSION", "UPDATED");
    for version in versions {
        println!(
            "{:<10} {:<10} {:<26} {}",
            version.revision,
            version.version,
            version
                .updated_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "-".to_string()),
            version.name
        );
    }
    Ok(())
}
