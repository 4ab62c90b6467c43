// Copyright (c) 2026 CodeVald Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Configuration Repository
//!
//! Document-store `ConfigurationRepository` over two tables:
//!
//! - `agent_configurations`: one row per identity. The full configuration is
//!   kept as a JSONB `document`; `agent_type`, `labels` and `created_at` are
//!   projected into indexed columns for filtering.
//! - `agent_configuration_versions`: append-only snapshots, removed with the
//!   parent row (`ON DELETE CASCADE`).
//!
//! Schema lives in `cli/migrations`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, Postgres};
use sqlx::{QueryBuilder, Row};

use crate::domain::configuration::{AgentConfiguration, ConfigurationId};
use crate::domain::repository::{
    ConfigurationRepository, ListFilter, RepositoryError, SortField, SortOrder, SortSpec,
};

pub struct PostgresConfigurationRepository {
    pool: PgPool,
}

impl PostgresConfigurationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn decode(document: serde_json::Value) -> Result<AgentConfiguration, RepositoryError> {
        serde_json::from_value(document).map_err(|e| {
            RepositoryError::Serialization(format!("Failed to deserialize configuration: {}", e))
        })
    }
}

fn labels_json(config: &AgentConfiguration) -> Result<serde_json::Value, RepositoryError> {
    Ok(serde_json::to_value(&config.labels)?)
}

fn sort_column(field: SortField) -> &'static str {
    match field {
        SortField::Name => "name",
        SortField::AgentType => "agent_type",
        SortField::CreatedAt => "created_at",
        SortField::UpdatedAt => "updated_at",
    }
}

/// Orders the way `sort_configurations` does: text byte-wise, a missing
/// timestamp before any present one, ties broken by id.
fn order_by_clause(sort: SortSpec) -> String {
    let (direction, nulls) = match sort.order {
        SortOrder::Asc => ("ASC", "NULLS FIRST"),
        SortOrder::Desc => ("DESC", "NULLS LAST"),
    };
    let column = sort_column(sort.field);
    let key = match sort.field {
        SortField::Name | SortField::AgentType => format!("{column} COLLATE \"C\" {direction}"),
        SortField::CreatedAt | SortField::UpdatedAt => format!("{column} {direction} {nulls}"),
    };
    format!(" ORDER BY {key}, id COLLATE \"C\" {direction}")
}

#[async_trait]
impl ConfigurationRepository for PostgresConfigurationRepository {
    async fn store(&self, config: &AgentConfiguration) -> Result<(), RepositoryError> {
        let document = serde_json::to_value(config)?;
        let labels = labels_json(config)?;

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO agent_configurations (
                id, name, agent_type, version, revision,
                labels, document, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(config.id.as_str())
        .bind(&config.name)
        .bind(&config.agent_type)
        .bind(&config.version)
        .bind(config.revision as i64)
        .bind(&labels)
        .bind(&document)
        .bind(config.created_at)
        .bind(config.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to store configuration: {}", e)))?;

        if inserted.rows_affected() == 0 {
            return Err(RepositoryError::AlreadyExists(config.id.to_string()));
        }

        sqlx::query(
            r#"
            INSERT INTO agent_configuration_versions (configuration_id, revision, version, document)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(config.id.as_str())
        .bind(config.revision as i64)
        .bind(&config.version)
        .bind(&document)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to record version: {}", e)))?;

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: &ConfigurationId) -> Result<AgentConfiguration, RepositoryError> {
        let row = sqlx::query("SELECT document FROM agent_configurations WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        match row {
            Some(row) => Self::decode(row.try_get("document")?),
            None => Err(RepositoryError::NotFound(id.to_string())),
        }
    }

    async fn update(&self, config: &mut AgentConfiguration) -> Result<(), RepositoryError> {
        let expected = config.revision;
        let mut next = config.clone();
        next.revision = expected + 1;

        let document = serde_json::to_value(&next)?;
        let labels = labels_json(&next)?;

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE agent_configurations
            SET name = $3,
                agent_type = $4,
                version = $5,
                revision = $6,
                labels = $7,
                document = $8,
                updated_at = $9
            WHERE id = $1 AND revision = $2
            "#,
        )
        .bind(next.id.as_str())
        .bind(expected as i64)
        .bind(&next.name)
        .bind(&next.agent_type)
        .bind(&next.version)
        .bind(next.revision as i64)
        .bind(&labels)
        .bind(&document)
        .bind(next.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to update configuration: {}", e)))?;

        if updated.rows_affected() == 0 {
            let current = sqlx::query("SELECT revision FROM agent_configurations WHERE id = $1")
                .bind(next.id.as_str())
                .fetch_optional(&mut *tx)
                .await?;

            return match current {
                Some(row) => {
                    let actual: i64 = row.try_get("revision")?;
                    Err(RepositoryError::Conflict {
                        id: next.id.to_string(),
                        expected,
                        actual: actual as u64,
                    })
                }
                None => Err(RepositoryError::NotFound(next.id.to_string())),
            };
        }

        sqlx::query(
            r#"
            INSERT INTO agent_configuration_versions (configuration_id, revision, version, document)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(next.id.as_str())
        .bind(next.revision as i64)
        .bind(&next.version)
        .bind(&document)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to record version: {}", e)))?;

        tx.commit().await?;
        config.revision = next.revision;
        Ok(())
    }

    async fn delete(&self, id: &ConfigurationId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM agent_configurations WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(format!("Failed to delete configuration: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<AgentConfiguration>, RepositoryError> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT document FROM agent_configurations WHERE TRUE");

        if let Some(agent_type) = &filter.agent_type {
            query.push(" AND agent_type = ").push_bind(agent_type.clone());
        }
        if !filter.labels.is_empty() {
            let labels = serde_json::to_value(&filter.labels)?;
            query.push(" AND labels @> ").push_bind(labels);
        }
        if let Some(after) = filter.created_after {
            query.push(" AND created_at >= ").push_bind(after);
        }
        if let Some(before) = filter.created_before {
            query.push(" AND created_at <= ").push_bind(before);
        }

        query.push(order_by_clause(filter.sort_spec()));

        if filter.limit > 0 {
            query.push(" LIMIT ").push_bind(filter.limit as i64);
        }
        if filter.offset > 0 {
            query.push(" OFFSET ").push_bind(filter.offset as i64);
        }

        let rows = query
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        rows.into_iter()
            .map(|row| Self::decode(row.try_get("document")?))
            .collect()
    }

    async fn get_versions(
        &self,
        id: &ConfigurationId,
    ) -> Result<Vec<AgentConfiguration>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT document
            FROM agent_configuration_versions
            WHERE configuration_id = $1
            ORDER BY revision DESC, recorded_at DESC
            "#,
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        rows.into_iter()
            .map(|row| Self::decode(row.try_get("document")?))
            .collect()
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_columns_are_fixed_identifiers() {
        assert_eq!(sort_column(SortField::Name), "name");
        assert_eq!(sort_column(SortField::AgentType), "agent_type");
        assert_eq!(sort_column(SortField::CreatedAt), "created_at");
        assert_eq!(sort_column(SortField::UpdatedAt), "updated_at");
    }

    #[test]
    fn test_order_by_matches_in_memory_ordering() {
        assert_eq!(
            order_by_clause(SortSpec::NEWEST_FIRST),
            " ORDER BY created_at DESC NULLS LAST, id COLLATE \"C\" DESC"
        );
        assert_eq!(
            order_by_clause(SortSpec::asc(SortField::UpdatedAt)),
            " ORDER BY updated_at ASC NULLS FIRST, id COLLATE \"C\" ASC"
        );
        assert_eq!(
            order_by_clause(SortSpec::asc(SortField::Name)),
            " ORDER BY name COLLATE \"C\" ASC, id COLLATE \"C\" ASC"
        );
        assert_eq!(
            order_by_clause(SortSpec::desc(SortField::AgentType)),
            " ORDER BY agent_type COLLATE \"C\" DESC, id COLLATE \"C\" DESC"
        );
    }

    #[test]
    fn test_labels_projection_is_a_json_object() {
        let config = AgentConfiguration::new("w", "worker").with_label("env", "prod");
        let labels = labels_json(&config).unwrap();
        assert_eq!(labels, serde_json::json!({ "env": "prod" }));
    }
}
