// Copyright (c) 2026 CodeVald Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Configuration Repository Interface
//!
//! Persistence contract for the `AgentConfiguration` aggregate, implemented in
//! `crate::infrastructure::repositories`.
//!
//! | Implementation | Backend |
//! |----------------|---------|
//! | `InMemoryConfigurationRepository` | `HashMap` behind a lock, development and tests |
//! | `PostgresConfigurationRepository` | JSONB document store, production |
//!
//! ## Concurrency
//!
//! Every configuration carries a `revision`. `update` succeeds only when the
//! caller's revision matches the stored one, then increments it. A stale
//! writer receives `RepositoryError::Conflict` instead of silently
//! overwriting a concurrent change.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::configuration::{AgentConfiguration, ConfigurationId};

/// Storage backend enum for pluggable persistence
#[derive(Debug, Clone, PartialEq)]
pub enum StorageBackend {
    InMemory,
    PostgreSQL(PostgresConfig),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostgresConfig {
    pub connection_string: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Name,
    AgentType,
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl std::str::FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(Self::Name),
            "agent_type" => Ok(Self::AgentType),
            "created_at" => Ok(Self::CreatedAt),
            "updated_at" => Ok(Self::UpdatedAt),
            other => Err(format!("unknown sort field: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(format!("unknown sort order: {other}")),
        }
    }
}

/// Sort specification. An explicit field without an order sorts ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: SortField,
    #[serde(default)]
    pub order: SortOrder,
}

impl SortSpec {
    /// Newest first; applied when a filter carries no sort.
    pub const NEWEST_FIRST: SortSpec = SortSpec {
        field: SortField::CreatedAt,
        order: SortOrder::Desc,
    };

    pub fn asc(field: SortField) -> Self {
        Self {
            field,
            order: SortOrder::Asc,
        }
    }

    pub fn desc(field: SortField) -> Self {
        Self {
            field,
            order: SortOrder::Desc,
        }
    }
}

/// Filter, sort and pagination for `list`.
///
/// Filters apply first, then sorting, then `offset`/`limit`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,

    /// Every entry must be present with an equal value
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Inclusive lower bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_after: Option<DateTime<Utc>>,

    /// Inclusive upper bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_before: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortSpec>,

    #[serde(default)]
    pub offset: usize,

    /// 0 means unlimited
    #[serde(default)]
    pub limit: usize,
}

impl ListFilter {
    pub fn matches(&self, config: &AgentConfiguration) -> bool {
        if let Some(agent_type) = &self.agent_type {
            if &config.agent_type != agent_type {
                return false;
            }
        }
        if !config.matches_labels(&self.labels) {
            return false;
        }
        if let Some(after) = self.created_after {
            if config.created_at.is_none_or(|at| at < after) {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if config.created_at.is_none_or(|at| at > before) {
                return false;
            }
        }
        true
    }

    pub fn sort_spec(&self) -> SortSpec {
        self.sort.unwrap_or(SortSpec::NEWEST_FIRST)
    }
}

/// Repository interface for AgentConfiguration aggregates
#[async_trait]
pub trait ConfigurationRepository: Send + Sync {
    /// Insert a new configuration. Fails with `AlreadyExists` on a taken id.
    async fn store(&self, config: &AgentConfiguration) -> Result<(), RepositoryError>;

    async fn get(&self, id: &ConfigurationId) -> Result<AgentConfiguration, RepositoryError>;

    /// Replace an existing configuration when `config.revision` matches the
    /// stored revision. On success `config.revision` is advanced.
    async fn update(&self, config: &mut AgentConfiguration) -> Result<(), RepositoryError>;

    /// Remove the configuration and its version history.
    async fn delete(&self, id: &ConfigurationId) -> Result<(), RepositoryError>;

    async fn list(&self, filter: &ListFilter) -> Result<Vec<AgentConfiguration>, RepositoryError>;

    /// Stored snapshots for one identity, newest first. Empty for unknown ids.
    async fn get_versions(
        &self,
        id: &ConfigurationId,
    ) -> Result<Vec<AgentConfiguration>, RepositoryError>;

    /// Every configuration carrying all given labels, newest first.
    async fn get_by_labels(
        &self,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<AgentConfiguration>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Entity already exists: {0}")]
    AlreadyExists(String),

    #[error("Revision conflict on {id}: expected {expected}, found {actual}")]
    Conflict {
        id: String,
        expected: u64,
        actual: u64,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_filter_bounds_are_inclusive() {
        let now = Utc::now();
        let mut config = AgentConfiguration::new("w", "worker");
        config.created_at = Some(now);

        let filter = ListFilter {
            created_after: Some(now),
            created_before: Some(now),
            ..Default::default()
        };
        assert!(filter.matches(&config));

        let later = ListFilter {
            created_after: Some(now + Duration::seconds(1)),
            ..Default::default()
        };
        assert!(!later.matches(&config));
    }

    #[test]
    fn test_filter_agent_type_and_labels() {
        let config = AgentConfiguration::new("w", "worker").with_label("env", "prod");

        let mut filter = ListFilter {
            agent_type: Some("worker".to_string()),
            ..Default::default()
        };
        filter.labels.insert("env".to_string(), "prod".to_string());
        assert!(filter.matches(&config));

        filter.agent_type = Some("monitor".to_string());
        assert!(!filter.matches(&config));
    }

    #[test]
    fn test_default_sort_is_newest_first() {
        assert_eq!(ListFilter::default().sort_spec(), SortSpec::NEWEST_FIRST);
        let spec: SortSpec = serde_json::from_str(r#"{"field":"name"}"#).unwrap();
        assert_eq!(spec, SortSpec::asc(SortField::Name));
    }
}
