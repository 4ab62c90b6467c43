// Copyright (c) 2026 CodeVald Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for agentconf CLI

pub mod config;
pub mod configuration;
pub mod migrate;

pub use self::config::ConfigCommand;
pub use self::configuration::ConfigurationCommand;
pub use self::migrate::MigrateCommand;
