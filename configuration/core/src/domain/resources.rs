// Copyright (c) 2026 CodeVald Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Resource availability contract
//!
//! The validator asks a `ResourceChecker` whether a requested quantity could
//! be satisfied. Nothing is reserved: a positive answer is advisory only.

use async_trait::async_trait;

/// Answers availability questions for requested resource quantities.
///
/// `Err` carries a human-readable reason.
#[async_trait]
pub trait ResourceChecker: Send + Sync {
    async fn check_cpu_availability(&self, cpu: &str) -> Result<(), String>;

    async fn check_memory_availability(&self, memory: &str) -> Result<(), String>;

    async fn check_storage_availability(&self, storage: &str) -> Result<(), String>;
}
