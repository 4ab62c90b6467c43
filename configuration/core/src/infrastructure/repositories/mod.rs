// Copyright (c) 2026 CodeVald Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of `ConfigurationRepository`.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Persist and retrieve agent configurations
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! - **PostgresConfigurationRepository** - JSONB document store with version
//!   history, for production
//! - **InMemoryConfigurationRepository** - lock-guarded `HashMap`, for
//!   development and tests. Values are cloned on every read and write so
//!   callers never share state with the store.

pub mod postgres_configuration;

pub use postgres_configuration::PostgresConfigurationRepository;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::configuration::{AgentConfiguration, ConfigurationId};
use crate::domain::repository::{
    ConfigurationRepository, ListFilter, RepositoryError, SortField, SortOrder, SortSpec,
};

struct StoredConfiguration {
    current: AgentConfiguration,
    /// Oldest first
    history: Vec<AgentConfiguration>,
}

#[derive(Clone, Default)]
pub struct InMemoryConfigurationRepository {
    configurations: Arc<RwLock<HashMap<ConfigurationId, StoredConfiguration>>>,
}

impl InMemoryConfigurationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.configurations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.configurations.read().is_empty()
    }
}

#[async_trait]
impl ConfigurationRepository for InMemoryConfigurationRepository {
    async fn store(&self, config: &AgentConfiguration) -> Result<(), RepositoryError> {
        let mut configurations = self.configurations.write();
        if configurations.contains_key(&config.id) {
            return Err(RepositoryError::AlreadyExists(config.id.to_string()));
        }
        configurations.insert(
            config.id.clone(),
            StoredConfiguration {
                current: config.clone(),
                history: vec![config.clone()],
            },
        );
        Ok(())
    }

    async fn get(&self, id: &ConfigurationId) -> Result<AgentConfiguration, RepositoryError> {
        self.configurations
            .read()
            .get(id)
            .map(|stored| stored.current.clone())
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn update(&self, config: &mut AgentConfiguration) -> Result<(), RepositoryError> {
        let mut configurations = self.configurations.write();
        let stored = configurations
            .get_mut(&config.id)
            .ok_or_else(|| RepositoryError::NotFound(config.id.to_string()))?;

        if stored.current.revision != config.revision {
            return Err(RepositoryError::Conflict {
                id: config.id.to_string(),
                expected: config.revision,
                actual: stored.current.revision,
            });
        }

        config.revision += 1;
        stored.current = config.clone();
        stored.history.push(config.clone());
        Ok(())
    }

    async fn delete(&self, id: &ConfigurationId) -> Result<(), RepositoryError> {
        self.configurations
            .write()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<AgentConfiguration>, RepositoryError> {
        let mut matching: Vec<AgentConfiguration> = self
            .configurations
            .read()
            .values()
            .filter(|stored| filter.matches(&stored.current))
            .map(|stored| stored.current.clone())
            .collect();

        sort_configurations(&mut matching, filter.sort_spec());
        Ok(paginate(matching, filter.offset, filter.limit))
    }

    async fn get_versions(
        &self,
        id: &ConfigurationId,
    ) -> Result<Vec<AgentConfiguration>, RepositoryError> {
        Ok(self
            .configurations
            .read()
            .get(id)
            .map(|stored| stored.history.iter().rev().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_by_labels(
        &self,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<AgentConfiguration>, RepositoryError> {
        let filter = ListFilter {
            labels: labels.clone(),
            ..Default::default()
        };
        self.list(&filter).await
    }
}

/// Stable sort by the requested field, ties broken by id.
pub fn sort_configurations(configs: &mut [AgentConfiguration], spec: SortSpec) {
    configs.sort_by(|a, b| {
        let ordering = match spec.field {
            SortField::Name => a.name.cmp(&b.name),
            SortField::AgentType => a.agent_type.cmp(&b.agent_type),
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        }
        .then_with(|| a.id.cmp(&b.id));

        match spec.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

/// `limit == 0` returns everything after `offset`.
pub fn paginate<T>(items: Vec<T>, offset: usize, limit: usize) -> Vec<T> {
    let iter = items.into_iter().skip(offset);
    if limit == 0 {
        iter.collect()
    } else {
        iter.take(limit).collect()
    }
}
