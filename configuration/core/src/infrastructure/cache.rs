// Copyright (c) 2026 CodeVald Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Configuration cache implementations
//!
//! `InMemoryConfigurationCache` keeps up to `capacity` entries, evicting the
//! least recently used. Each entry carries its own deadline; expired entries
//! are dropped lazily when read.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use crate::domain::cache::ConfigurationCache;
use crate::domain::configuration::{AgentConfiguration, ConfigurationId};

struct CacheEntry {
    config: AgentConfiguration,
    expires_at: Instant,
}

pub struct InMemoryConfigurationCache {
    entries: Mutex<LruCache<ConfigurationId, CacheEntry>>,
}

impl InMemoryConfigurationCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Entries currently held, including expired ones not yet read.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl ConfigurationCache for InMemoryConfigurationCache {
    async fn get(&self, id: &ConfigurationId) -> Option<AgentConfiguration> {
        let mut entries = self.entries.lock();
        let expired = match entries.get(id) {
            Some(entry) if entry.expires_at > Instant::now() => return Some(entry.config.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            debug!(configuration_id = %id, "Dropping expired cache entry");
            entries.pop(id);
        }
        None
    }

    async fn set(&self, id: &ConfigurationId, config: &AgentConfiguration, ttl: Duration) {
        // Unrepresentable deadline: cache nothing, including any older entry.
        let Some(expires_at) = Instant::now().checked_add(ttl) else {
            self.entries.lock().pop(id);
            return;
        };
        self.entries.lock().put(
            id.clone(),
            CacheEntry {
                config: config.clone(),
                expires_at,
            },
        );
    }

    async fn delete(&self, id: &ConfigurationId) {
        self.entries.lock().pop(id);
    }

    async fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// Cache that never holds anything. Used when caching is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopConfigurationCache;

#[async_trait]
impl ConfigurationCache for NoopConfigurationCache {
    async fn get(&self, _id: &ConfigurationId) -> Option<AgentConfiguration> {
        None
    }

    async fn set(&self, _id: &ConfigurationId, _config: &AgentConfiguration, _ttl: Duration) {}

    async fn delete(&self, _id: &ConfigurationId) {}

    async fn clear(&self) {}
}
