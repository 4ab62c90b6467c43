// Copyright (c) 2026 CodeVald Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Node capacity resource checker
//!
//! Compares a single request against the capacity declared for the node in
//! engine configuration. Nothing is tracked or reserved between calls.

use async_trait::async_trait;

use crate::domain::engine_config::NodeCapacity;
use crate::domain::quantity::Quantity;
use crate::domain::resources::ResourceChecker;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Debug, Clone)]
pub struct NodeCapacityChecker {
    capacity: NodeCapacity,
}

impl NodeCapacityChecker {
    pub fn new(capacity: NodeCapacity) -> Self {
        Self { capacity }
    }
}

fn check(requested: f64, available: f64, raw: &str, unit: &str) -> Result<(), String> {
    if requested > available {
        Err(format!("requested {raw} exceeds node capacity of {available} {unit}"))
    } else {
        Ok(())
    }
}

#[async_trait]
impl ResourceChecker for NodeCapacityChecker {
    async fn check_cpu_availability(&self, cpu: &str) -> Result<(), String> {
        let millis = Quantity::parse_cpu(cpu)
            .map_err(|e| e.to_string())?
            .magnitude();
        check(millis, self.capacity.cpu_cores as f64 * 1000.0, cpu, "millicores")
    }

    async fn check_memory_availability(&self, memory: &str) -> Result<(), String> {
        let bytes = Quantity::parse_memory(memory)
            .map_err(|e| e.to_string())?
            .magnitude();
        check(bytes, self.capacity.memory_gb as f64 * GIB, memory, "bytes")
    }

    async fn check_storage_availability(&self, storage: &str) -> Result<(), String> {
        let bytes = Quantity::parse_storage(storage)
            .map_err(|e| e.to_string())?
            .magnitude();
        check(bytes, self.capacity.disk_gb as f64 * GIB, storage, "bytes")
    }
}
