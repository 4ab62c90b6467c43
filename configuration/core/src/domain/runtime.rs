// Copyright (c) 2026 CodeVald Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Agent runtime hand-off
//!
//! `apply_configuration` passes a validated configuration to whatever runs
//! the agents. The engine itself never starts, stops or places workloads.

use async_trait::async_trait;

use crate::domain::configuration::AgentConfiguration;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Runtime rejected configuration: {0}")]
    Rejected(String),

    #[error("Runtime unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait AgentRuntime: Send + Sync {
    async fn apply(&self, agent_id: &str, config: &AgentConfiguration) -> Result<(), RuntimeError>;
}
