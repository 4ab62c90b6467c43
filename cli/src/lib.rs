// Copyright (c) 2026 CodeVald Contributors
// SPDX-License-Identifier: AGPL-3.0
//! agentconf CLI library - exposes testable components
//!
//! # Architecture
//!
//! - **Layer:** Interface / Presentation Layer
//! - **Purpose:** Command parsing and rendering over `agentconf_core`

pub mod commands;
