// Copyright (c) 2026 CodeVald Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Configuration cache contract
//!
//! The cache is advisory: the service reads it before the repository and
//! repopulates it after every repository round-trip. Operations cannot fail;
//! a broken cache only costs repository reads.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::configuration::{AgentConfiguration, ConfigurationId};

/// Default time-to-live for cached configurations.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

#[async_trait]
pub trait ConfigurationCache: Send + Sync {
    /// `None` on miss or expiry
    async fn get(&self, id: &ConfigurationId) -> Option<AgentConfiguration>;

    async fn set(&self, id: &ConfigurationId, config: &AgentConfiguration, ttl: Duration);

    async fn delete(&self, id: &ConfigurationId);

    async fn clear(&self);
}
