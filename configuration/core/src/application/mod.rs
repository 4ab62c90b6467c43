// Copyright (c) 2026 CodeVald Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod configuration_service;
pub mod repository_factory;

pub use configuration_service::{ConfigurationError, ConfigurationService, ExportFormat};
