// Copyright (c) 2026 CodeVald Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Database Migrate Command
//!
//! `agentconf migrate` brings the PostgreSQL schema in line with this
//! release.
//!
//! # Usage
//!
//! ```bash
//! # Apply all pending migrations
//! agentconf migrate
//!
//! # Preview migrations without applying
//! agentconf migrate --dry-run
//! ```
//!
//! The connection string comes from `spec.storage` or
//! `AGENTCONF_DATABASE_URL`.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use sqlx::postgres::PgPoolOptions;
use std::path::PathBuf;

use agentconf_core::domain::engine_config::{EngineConfigManifest, StorageSettings};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

#[derive(Args)]
pub struct MigrateCommand {
    /// Perform a dry run without applying changes
    #[arg(long)]
    dry_run: bool,
}

pub async fn execute(cmd: MigrateCommand, config_path: Option<PathBuf>) -> Result<()> {
    println!("{}", "agentconf migrate".bold().green());

    let manifest = EngineConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;
    let StorageSettings::Postgres {
        connection_string, ..
    } = &manifest.spec.storage
    else {
        bail!("Storage backend is in_memory. Set AGENTCONF_DATABASE_URL or spec.storage to migrate.");
    };

    println!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(connection_string)
        .await
        .context("Failed to connect to database")?;

    let applied_count = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success")
        .fetch_all(&pool)
        .await
        .map(|rows| rows.len())
        .unwrap_or(0);
    let total_migrations = MIGRATOR.iter().count();

    println!(
        "Migration status: {} applied, {} total available.",
        applied_count, total_migrations
    );

    if applied_count >= total_migrations {
        println!("{}", "✓ Database is up to date.".green());
        return Ok(());
    }

    if cmd.dry_run {
        println!("Pending migrations found (Dry Run):");
        for migration in MIGRATOR.iter().skip(applied_count) {
            println!(" - {} {}", migration.version, migration.description);
        }
        println!("Skipping application due to --dry-run");
        return Ok(());
    }

    println!("Applying pending migrations...");
    MIGRATOR.run(&pool).await.context("Failed to apply migrations")?;
    println!("{}", "✓ Database updated successfully.".green());
    Ok(())
}
