// Copyright (c) 2026 CodeVald Contributors
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::configuration::{AgentConfiguration, ConfigurationId};

/// Configuration lifecycle events, published after a mutation has been
/// persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConfigurationEvent {
    ConfigurationCreated {
        configuration_id: ConfigurationId,
        name: String,
        agent_type: String,
        version: String,
        created_at: DateTime<Utc>,
    },
    ConfigurationUpdated {
        configuration_id: ConfigurationId,
        old_version: String,
        new_version: String,
        old_revision: u64,
        new_revision: u64,
        updated_at: DateTime<Utc>,
    },
    ConfigurationDeleted {
        configuration_id: ConfigurationId,
        deleted_at: DateTime<Utc>,
    },
    ConfigurationApplied {
        agent_id: String,
        configuration_id: ConfigurationId,
        applied_at: DateTime<Utc>,
    },
}

impl ConfigurationEvent {
    pub fn created(config: &AgentConfiguration) -> Self {
        Self::ConfigurationCreated {
            configuration_id: config.id.clone(),
            name: config.name.clone(),
            agent_type: config.agent_type.clone(),
            version: config.version.clone(),
            created_at: config.created_at.unwrap_or_else(Utc::now),
        }
    }

    pub fn updated(old: &AgentConfiguration, new: &AgentConfiguration) -> Self {
        Self::ConfigurationUpdated {
            configuration_id: new.id.clone(),
            old_version: old.version.clone(),
            new_version: new.version.clone(),
            old_revision: old.revision,
            new_revision: new.revision,
            updated_at: new.updated_at.unwrap_or_else(Utc::now),
        }
    }

    pub fn configuration_id(&self) -> &ConfigurationId {
        match self {
            Self::ConfigurationCreated { configuration_id, .. }
            | Self::ConfigurationUpdated { configuration_id, .. }
            | Self::ConfigurationDeleted { configuration_id, .. }
            | Self::ConfigurationApplied { configuration_id, .. } => configuration_id,
        }
    }
}
