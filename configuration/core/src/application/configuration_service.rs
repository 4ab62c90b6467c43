// Copyright (c) 2026 CodeVald Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Configuration Service - Application Layer
//!
//! Orchestrates the configuration lifecycle:
//! validate → persist → cache → notify.
//!
//! # Locking
//!
//! Each configuration identity has its own `tokio::sync::RwLock<()>`. Reads
//! take the shared side; create, update and delete hold the exclusive side
//! across the whole persist-cache-notify sequence. Operations on different
//! configurations never contend. Lost updates between processes are caught by
//! the repository's revision check instead.
//!
//! Lock entries live in the map only while some operation holds them; the
//! last holder evicts the entry, so probing unknown ids leaves nothing behind.
//!
//! # Failure semantics
//!
//! - Validation and compatibility failures abort before anything is persisted.
//! - Repository failures are wrapped with the operation that failed.
//! - Notification failures are logged and swallowed.
//! - The cache is advisory and cannot fail an operation.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::domain::cache::{ConfigurationCache, DEFAULT_CACHE_TTL};
use crate::domain::configuration::{AgentConfiguration, ConfigurationId, INITIAL_VERSION};
use crate::domain::notification::ConfigurationNotifier;
use crate::domain::repository::{ConfigurationRepository, ListFilter, RepositoryError};
use crate::domain::runtime::AgentRuntime;
use crate::domain::validation::{ConfigurationValidator, ValidationErrors};

/// Serialization format for export and import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Json,
    Yaml,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(format!("unsupported format: {other} (expected json or yaml)")),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Yaml => f.write_str("yaml"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Configuration validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Configuration is not compatible with this engine: {0}")]
    Compatibility(ValidationErrors),

    #[error("Requested resources are not available: {0}")]
    ResourceUnavailable(ValidationErrors),

    #[error("Configuration not found: {0}")]
    NotFound(ConfigurationId),

    #[error("Configuration {id} was modified concurrently (expected revision {expected}, found {actual})")]
    Conflict {
        id: ConfigurationId,
        expected: u64,
        actual: u64,
    },

    #[error("Failed to {operation} configuration: {source}")]
    Persistence {
        operation: &'static str,
        #[source]
        source: RepositoryError,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Agent runtime error: {0}")]
    Runtime(String),
}

impl ConfigurationError {
    fn from_repository(operation: &'static str, id: &ConfigurationId, err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(_) => Self::NotFound(id.clone()),
            RepositoryError::Conflict {
                expected, actual, ..
            } => Self::Conflict {
                id: id.clone(),
                expected,
                actual,
            },
            source => Self::Persistence { operation, source },
        }
    }

    /// Violations carried by validation-type failures.
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation(errors)
            | Self::Compatibility(errors)
            | Self::ResourceUnavailable(errors) => Some(errors),
            _ => None,
        }
    }
}

pub struct ConfigurationService {
    repository: Arc<dyn ConfigurationRepository>,
    validator: Arc<dyn ConfigurationValidator>,
    cache: Arc<dyn ConfigurationCache>,
    notifier: Arc<dyn ConfigurationNotifier>,
    runtime: Option<Arc<dyn AgentRuntime>>,
    cache_ttl: Duration,
    locks: DashMap<ConfigurationId, Arc<RwLock<()>>>,
}

impl ConfigurationService {
    pub fn new(
        repository: Arc<dyn ConfigurationRepository>,
        validator: Arc<dyn ConfigurationValidator>,
        cache: Arc<dyn ConfigurationCache>,
        notifier: Arc<dyn ConfigurationNotifier>,
    ) -> Self {
        Self {
            repository,
            validator,
            cache,
            notifier,
            runtime: None,
            cache_ttl: DEFAULT_CACHE_TTL,
            locks: DashMap::new(),
        }
    }

    pub fn with_runtime(mut self, runtime: Arc<dyn AgentRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    fn partition(&self, id: &ConfigurationId) -> Partition<'_> {
        let lock = self.locks.entry(id.clone()).or_default().clone();
        Partition {
            locks: &self.locks,
            id: id.clone(),
            lock,
        }
    }

    /// `validate` then `validate_compatibility`, stopping at the first failing pass.
    fn check(&self, config: &AgentConfiguration) -> Result<(), ConfigurationError> {
        if let Err(errors) = self.validator.validate(config) {
            record_validation_failure("validate");
            warn!(name = %config.name, errors = errors.len(), "Configuration rejected: {}", errors);
            return Err(ConfigurationError::Validation(errors));
        }
        if let Err(errors) = self.validator.validate_compatibility(config) {
            record_validation_failure("compatibility");
            warn!(name = %config.name, errors = errors.len(), "Configuration incompatible: {}", errors);
            return Err(ConfigurationError::Compatibility(errors));
        }
        Ok(())
    }

    async fn cache_all(&self, configs: &[AgentConfiguration]) {
        for config in configs {
            self.cache.set(&config.id, config, self.cache_ttl).await;
        }
    }

    pub async fn create_configuration(
        &self,
        config: AgentConfiguration,
    ) -> Result<AgentConfiguration, ConfigurationError> {
        self.create_configuration_as(config, None).await
    }

    /// Create on behalf of `actor`, recorded as `created_by`.
    pub async fn create_configuration_as(
        &self,
        mut config: AgentConfiguration,
        actor: Option<&str>,
    ) -> Result<AgentConfiguration, ConfigurationError> {
        if config.id.is_empty() {
            config.id = ConfigurationId::new();
        }
        if config.version.is_empty() {
            config.version = INITIAL_VERSION.to_string();
        }
        let now = Utc::now();
        config.revision = 0;
        config.created_at = Some(now);
        config.updated_at = Some(now);
        config.created_by = actor.map(str::to_string);

        self.check(&config)?;

        let partition = self.partition(&config.id);
        let _guard = partition.lock.write().await;

        self.repository
            .store(&config)
            .await
            .map_err(|e| ConfigurationError::from_repository("store", &config.id, e))?;

        self.cache.set(&config.id, &config, self.cache_ttl).await;

        if let Err(e) = self.notifier.notify_created(&config).await {
            warn!(configuration_id = %config.id, "Failed to send creation notification: {}", e);
        }

        metrics::counter!("agentconf_configurations_created_total").increment(1);
        info!(
            configuration_id = %config.id,
            name = %config.name,
            agent_type = %config.agent_type,
            "Created configuration"
        );
        Ok(config)
    }

    /// Cache-first read-through.
    pub async fn get_configuration(
        &self,
        id: &ConfigurationId,
    ) -> Result<AgentConfiguration, ConfigurationError> {
        let partition = self.partition(id);
        let _guard = partition.lock.read().await;

        if let Some(config) = self.cache.get(id).await {
            metrics::counter!("agentconf_cache_hits_total").increment(1);
            debug!(configuration_id = %id, "Cache hit");
            return Ok(config);
        }
        metrics::counter!("agentconf_cache_misses_total").increment(1);
        debug!(configuration_id = %id, "Cache miss");

        let config = self
            .repository
            .get(id)
            .await
            .map_err(|e| ConfigurationError::from_repository("get", id, e))?;

        self.cache.set(id, &config, self.cache_ttl).await;
        Ok(config)
    }

    /// Replace a stored configuration. `config.revision` must be the revision
    /// the caller read; `created_at` and `created_by` are restored from the
    /// stored version.
    pub async fn update_configuration(
        &self,
        mut config: AgentConfiguration,
    ) -> Result<AgentConfiguration, ConfigurationError> {
        if config.id.is_empty() {
            return Err(ConfigurationError::NotFound(config.id));
        }

        let partition = self.partition(&config.id);
        let _guard = partition.lock.write().await;

        let old = self
            .repository
            .get(&config.id)
            .await
            .map_err(|e| ConfigurationError::from_repository("load", &config.id, e))?;

        config.created_at = old.created_at;
        config.created_by = old.created_by.clone();
        config.updated_at = Some(Utc::now());

        self.check(&config)?;

        self.repository
            .update(&mut config)
            .await
            .map_err(|e| ConfigurationError::from_repository("update", &config.id, e))?;

        self.cache.set(&config.id, &config, self.cache_ttl).await;

        if let Err(e) = self.notifier.notify_updated(&old, &config).await {
            warn!(configuration_id = %config.id, "Failed to send update notification: {}", e);
        }

        metrics::counter!("agentconf_configurations_updated_total").increment(1);
        info!(
            configuration_id = %config.id,
            revision = config.revision,
            "Updated configuration"
        );
        Ok(config)
    }

    pub async fn delete_configuration(&self, id: &ConfigurationId) -> Result<(), ConfigurationError> {
        let partition = self.partition(id);
        let _guard = partition.lock.write().await;

        self.repository
            .delete(id)
            .await
            .map_err(|e| ConfigurationError::from_repository("delete", id, e))?;
        self.cache.delete(id).await;

        if let Err(e) = self.notifier.notify_deleted(id).await {
            warn!(configuration_id = %id, "Failed to send deletion notification: {}", e);
        }

        metrics::counter!("agentconf_configurations_deleted_total").increment(1);
        info!(configuration_id = %id, "Deleted configuration");
        Ok(())
    }

    pub async fn list_configurations(
        &self,
        filter: &ListFilter,
    ) -> Result<Vec<AgentConfiguration>, ConfigurationError> {
        let configs = self
            .repository
            .list(filter)
            .await
            .map_err(|source| ConfigurationError::Persistence {
                operation: "list",
                source,
            })?;
        self.cache_all(&configs).await;
        Ok(configs)
    }

    /// Stored snapshots, newest first.
    pub async fn get_configuration_versions(
        &self,
        id: &ConfigurationId,
    ) -> Result<Vec<AgentConfiguration>, ConfigurationError> {
        let partition = self.partition(id);
        let _guard = partition.lock.read().await;

        self.repository
            .get_versions(id)
            .await
            .map_err(|e| ConfigurationError::from_repository("get versions of", id, e))
    }

    pub async fn get_configurations_by_labels(
        &self,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<AgentConfiguration>, ConfigurationError> {
        let configs = self
            .repository
            .get_by_labels(labels)
            .await
            .map_err(|source| ConfigurationError::Persistence {
                operation: "query",
                source,
            })?;
        self.cache_all(&configs).await;
        Ok(configs)
    }

    /// Check resource availability and hand the configuration to the agent
    /// runtime, when one is wired.
    pub async fn apply_configuration(
        &self,
        agent_id: &str,
        config_id: &ConfigurationId,
    ) -> Result<(), ConfigurationError> {
        let config = self.get_configuration(config_id).await?;

        if let Err(errors) = self.validator.validate_resources(&config).await {
            record_validation_failure("resources");
            warn!(configuration_id = %config_id, agent_id, "Resources unavailable: {}", errors);
            return Err(ConfigurationError::ResourceUnavailable(errors));
        }

        if let Some(runtime) = &self.runtime {
            runtime
                .apply(agent_id, &config)
                .await
                .map_err(|e| ConfigurationError::Runtime(e.to_string()))?;
        }

        if let Err(e) = self.notifier.notify_applied(agent_id, config_id).await {
            warn!(configuration_id = %config_id, agent_id, "Failed to send apply notification: {}", e);
        }

        metrics::counter!("agentconf_configurations_applied_total").increment(1);
        info!(configuration_id = %config_id, agent_id, "Applied configuration");
        Ok(())
    }

    /// Run the structural and compatibility passes without persisting.
    /// Violations from both passes are reported together.
    pub fn validate_configuration(&self, config: &AgentConfiguration) -> Result<(), ConfigurationError> {
        let structural = self.validator.validate(config);
        let compatibility = self.validator.validate_compatibility(config);

        match (structural, compatibility) {
            (Ok(()), Ok(())) => Ok(()),
            (Ok(()), Err(errors)) => {
                record_validation_failure("compatibility");
                Err(ConfigurationError::Compatibility(errors))
            }
            (Err(mut errors), rest) => {
                record_validation_failure("validate");
                if let Err(more) = rest {
                    errors.extend(more);
                }
                Err(ConfigurationError::Validation(errors))
            }
        }
    }

    /// Copy `source_id` under a new identity and name, version reset.
    pub async fn clone_configuration(
        &self,
        source_id: &ConfigurationId,
        name: &str,
    ) -> Result<AgentConfiguration, ConfigurationError> {
        let source = self.get_configuration(source_id).await?;

        let mut clone = source;
        clone.id = ConfigurationId::new();
        clone.name = name.to_string();
        clone.version = INITIAL_VERSION.to_string();
        clone.revision = 0;
        clone.created_at = None;
        clone.updated_at = None;
        clone.created_by = None;

        self.create_configuration(clone).await
    }

    pub async fn export_configuration(
        &self,
        id: &ConfigurationId,
        format: ExportFormat,
    ) -> Result<String, ConfigurationError> {
        let config = self.get_configuration(id).await?;
        match format {
            ExportFormat::Json => config
                .to_json()
                .map_err(|e| ConfigurationError::Serialization(e.to_string())),
            ExportFormat::Yaml => config
                .to_yaml()
                .map_err(|e| ConfigurationError::Serialization(e.to_string())),
        }
    }

    /// Parse and create. A fresh identity is always minted.
    pub async fn import_configuration(
        &self,
        data: &str,
        format: ExportFormat,
    ) -> Result<AgentConfiguration, ConfigurationError> {
        self.import_configuration_as(data, format, None).await
    }

    pub async fn import_configuration_as(
        &self,
        data: &str,
        format: ExportFormat,
        actor: Option<&str>,
    ) -> Result<AgentConfiguration, ConfigurationError> {
        let mut config = match format {
            ExportFormat::Json => AgentConfiguration::from_json(data)
                .map_err(|e| ConfigurationError::Serialization(e.to_string()))?,
            ExportFormat::Yaml => AgentConfiguration::from_yaml(data)
                .map_err(|e| ConfigurationError::Serialization(e.to_string()))?,
        };

        config.id = ConfigurationId::new();
        config.revision = 0;

        self.create_configuration_as(config, actor).await
    }
}

/// Handle on one identity's lock. Dropping the last handle evicts the entry.
struct Partition<'a> {
    locks: &'a DashMap<ConfigurationId, Arc<RwLock<()>>>,
    id: ConfigurationId,
    lock: Arc<RwLock<()>>,
}

impl Drop for Partition<'_> {
    fn drop(&mut self) {
        // One reference in the map, one here.
        self.locks
            .remove_if(&self.id, |_, lock| Arc::strong_count(lock) <= 2);
    }
}

fn record_validation_failure(stage: &'static str) {
    metrics::counter!("agentconf_validation_failures_total", "stage" => stage).increment(1);
}
