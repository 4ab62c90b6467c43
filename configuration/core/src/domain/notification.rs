// Copyright (c) 2026 CodeVald Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Configuration change notification contract
//!
//! The service notifies after every successful mutation. Failures are
//! logged by the caller and never roll back the mutation.

use async_trait::async_trait;

use crate::domain::configuration::{AgentConfiguration, ConfigurationId};

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait ConfigurationNotifier: Send + Sync {
    async fn notify_created(&self, config: &AgentConfiguration) -> Result<(), NotificationError>;

    async fn notify_updated(
        &self,
        old: &AgentConfiguration,
        new: &AgentConfiguration,
    ) -> Result<(), NotificationError>;

    async fn notify_deleted(&self, id: &ConfigurationId) -> Result<(), NotificationError>;

    async fn notify_applied(
        &self,
        agent_id: &str,
        config_id: &ConfigurationId,
    ) -> Result<(), NotificationError>;
}
