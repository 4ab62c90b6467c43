// Copyright (c) 2026 CodeVald Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod repositories;
pub mod cache;
pub mod db;
pub mod event_bus;
pub mod notifier;
pub mod resource_checker;

pub use cache::{InMemoryConfigurationCache, NoopConfigurationCache};
pub use event_bus::{EventBus, EventBusError};
pub use notifier::{EventBusNotifier, TracingNotifier};
pub use resource_checker::NodeCapacityChecker;
