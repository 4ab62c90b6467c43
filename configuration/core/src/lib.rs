// Copyright (c) 2026 CodeVald Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Agent configuration engine
//!
//! Declarative, versioned specifications for worker agents: a resource
//! grammar modeled on container-orchestration conventions, an aggregating
//! validation pipeline, and a cache-backed, notification-emitting service over
//! pluggable storage.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Validate and persist agent configuration intent

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
