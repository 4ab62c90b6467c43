// Copyright (c) 2026 CodeVald Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Repository Factory - Application Layer
//!
//! Creates concrete repository, cache, validator and notifier
//! implementations from engine configuration, keeping the domain layer free
//! of infrastructure choices.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Wire `ConfigurationService` collaborators from `EngineConfigManifest`

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::application::configuration_service::ConfigurationService;
use crate::domain::cache::ConfigurationCache;
use crate::domain::engine_config::{CacheSettings, EngineConfigManifest, EngineConfigSpec, EventSettings};
use crate::domain::notification::ConfigurationNotifier;
use crate::domain::repository::{ConfigurationRepository, StorageBackend};
use crate::domain::validation::{ConfigurationValidator, DefaultValidator};
use crate::infrastructure::cache::{InMemoryConfigurationCache, NoopConfigurationCache};
use crate::infrastructure::db::Database;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::notifier::EventBusNotifier;
use crate::infrastructure::repositories::{
    InMemoryConfigurationRepository, PostgresConfigurationRepository,
};
use crate::infrastructure::resource_checker::NodeCapacityChecker;

/// Creates a ConfigurationRepository implementation based on the configured backend
pub async fn create_configuration_repository(
    backend: &StorageBackend,
) -> Result<Arc<dyn ConfigurationRepository>> {
    match backend {
        StorageBackend::InMemory => {
            info!("Using in-memory configuration repository");
            Ok(Arc::new(InMemoryConfigurationRepository::new()))
        }
        StorageBackend::PostgreSQL(config) => {
            info!("Using PostgreSQL configuration repository");
            let db = Database::new(config)
                .await
                .context("Failed to initialise PostgreSQL storage backend")?;
            Ok(Arc::new(PostgresConfigurationRepository::new(db.get_pool().clone())))
        }
    }
}

pub fn create_configuration_cache(settings: &CacheSettings) -> Arc<dyn ConfigurationCache> {
    if settings.enabled {
        Arc::new(InMemoryConfigurationCache::new(settings.capacity))
    } else {
        Arc::new(NoopConfigurationCache)
    }
}

/// Validator with the configured policy and a node capacity resource checker
pub fn create_validator(spec: &EngineConfigSpec) -> Arc<dyn ConfigurationValidator> {
    Arc::new(
        DefaultValidator::new(spec.validation.clone())
            .with_resource_checker(Arc::new(NodeCapacityChecker::new(spec.node.clone()))),
    )
}

/// Event bus plus a notifier publishing onto it
pub fn create_event_notifier(settings: &EventSettings) -> (Arc<dyn ConfigurationNotifier>, EventBus) {
    let event_bus = EventBus::new(settings.capacity);
    let notifier: Arc<dyn ConfigurationNotifier> = Arc::new(EventBusNotifier::new(event_bus.clone()));
    (notifier, event_bus)
}

/// Builds a service from engine configuration and the given notifier
pub async fn build_configuration_service(
    manifest: &EngineConfigManifest,
    notifier: Arc<dyn ConfigurationNotifier>,
) -> Result<ConfigurationService> {
    let spec = &manifest.spec;
    let repository = create_configuration_repository(&spec.storage.to_backend()).await?;

    Ok(ConfigurationService::new(
        repository,
        create_validator(spec),
        create_configuration_cache(&spec.cache),
        notifier,
    )
    .with_cache_ttl(spec.cache.ttl))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::configuration::AgentConfiguration;

    #[tokio::test]
    async fn test_build_in_memory_service() {
        let manifest = EngineConfigManifest::default();
        let (notifier, event_bus) = create_event_notifier(&manifest.spec.events);
        let mut events = event_bus.subscribe();

        let service = build_configuration_service(&manifest, notifier).await.unwrap();
        let created = service
            .create_configuration(AgentConfiguration::new("factory", "worker"))
            .await
            .unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(event.configuration_id(), &created.id);
    }

    #[tokio::test]
    async fn test_disabled_cache_is_noop() {
        let settings = CacheSettings {
            enabled: false,
            ..Default::default()
        };
        let cache = create_configuration_cache(&settings);
        let mut config = AgentConfiguration::new("c", "worker");
        config.id = crate::domain::configuration::ConfigurationId::new();
        cache.set(&config.id, &config, settings.ttl).await;
        assert!(cache.get(&config.id).await.is_none());
    }
}
