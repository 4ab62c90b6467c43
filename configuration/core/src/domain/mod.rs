// Copyright (c) 2026 CodeVald Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Domain layer
//!
//! Configuration aggregate, resource grammar, validation rules and the
//! capability traits (repository, cache, notifier, resource checker, runtime)
//! that the application layer composes.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure types and contracts, no infrastructure dependencies

pub mod configuration;
pub mod quantity;
pub mod validation;
pub mod repository;
pub mod cache;
pub mod notification;
pub mod resources;
pub mod runtime;
pub mod events;
pub mod engine_config;
