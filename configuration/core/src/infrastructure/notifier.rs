// Copyright (c) 2026 CodeVald Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Notifier implementations
//!
//! - `EventBusNotifier` publishes `ConfigurationEvent`s on the in-process
//!   `EventBus`.
//! - `TracingNotifier` emits one structured log line per change.

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use crate::domain::configuration::{AgentConfiguration, ConfigurationId};
use crate::domain::events::ConfigurationEvent;
use crate::domain::notification::{ConfigurationNotifier, NotificationError};
use crate::infrastructure::event_bus::EventBus;

#[derive(Clone)]
pub struct EventBusNotifier {
    event_bus: EventBus,
}

impl EventBusNotifier {
    pub fn new(event_bus: EventBus) -> Self {
        Self { event_bus }
    }
}

#[async_trait]
impl ConfigurationNotifier for EventBusNotifier {
    async fn notify_created(&self, config: &AgentConfiguration) -> Result<(), NotificationError> {
        self.event_bus.publish(ConfigurationEvent::created(config));
        Ok(())
    }

    async fn notify_updated(
        &self,
        old: &AgentConfiguration,
        new: &AgentConfiguration,
    ) -> Result<(), NotificationError> {
        self.event_bus.publish(ConfigurationEvent::updated(old, new));
        Ok(())
    }

    async fn notify_deleted(&self, id: &ConfigurationId) -> Result<(), NotificationError> {
        self.event_bus.publish(ConfigurationEvent::ConfigurationDeleted {
            configuration_id: id.clone(),
            deleted_at: Utc::now(),
        });
        Ok(())
    }

    async fn notify_applied(
        &self,
        agent_id: &str,
        config_id: &ConfigurationId,
    ) -> Result<(), NotificationError> {
        self.event_bus.publish(ConfigurationEvent::ConfigurationApplied {
            agent_id: agent_id.to_string(),
            configuration_id: config_id.clone(),
            applied_at: Utc::now(),
        });
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl ConfigurationNotifier for TracingNotifier {
    async fn notify_created(&self, config: &AgentConfiguration) -> Result<(), NotificationError> {
        info!(
            configuration_id = %config.id,
            name = %config.name,
            agent_type = %config.agent_type,
            version = %config.version,
            "Configuration created"
        );
        Ok(())
    }

    async fn notify_updated(
        &self,
        old: &AgentConfiguration,
        new: &AgentConfiguration,
    ) -> Result<(), NotificationError> {
        info!(
            configuration_id = %new.id,
            old_version = %old.version,
            new_version = %new.version,
            revision = new.revision,
            "Configuration updated"
        );
        Ok(())
    }

    async fn notify_deleted(&self, id: &ConfigurationId) -> Result<(), NotificationError> {
        info!(configuration_id = %id, "Configuration deleted");
        Ok(())
    }

    async fn notify_applied(
        &self,
        agent_id: &str,
        config_id: &ConfigurationId,
    ) -> Result<(), NotificationError> {
        info!(agent_id = %agent_id, configuration_id = %config_id, "Configuration applied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus_notifier_publishes_update_pair() {
        let bus = EventBus::new(8);
        let mut receiver = bus.subscribe();
        let notifier = EventBusNotifier::new(bus);

        let mut old = AgentConfiguration::new("w", "worker");
        old.id = ConfigurationId::new();
        old.version = "1.0.0".to_string();
        let mut new = old.clone();
        new.version = "1.1.0".to_string();
        new.revision = 1;

        notifier.notify_updated(&old, &new).await.unwrap();

        match receiver.recv().await.unwrap() {
            ConfigurationEvent::ConfigurationUpdated {
                old_version,
                new_version,
                old_revision,
                new_revision,
                ..
            } => {
                assert_eq!(old_version, "1.0.0");
                assert_eq!(new_version, "1.1.0");
                assert_eq!((old_revision, new_revision), (0, 1));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_notifiers_succeed_without_listeners() {
        let id = ConfigurationId::new();
        assert!(EventBusNotifier::new(EventBus::new(1)).notify_deleted(&id).await.is_ok());
        assert!(TracingNotifier.notify_applied("agent-1", &id).await.is_ok());
    }
}
