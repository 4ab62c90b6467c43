// Copyright (c) 2026 CodeVald Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Resource quantity grammar
//!
//! CPU quantities are decimals with an optional `m` (milli) suffix:
//! `"100m"`, `"0.5"`, `"2"`. Memory and storage quantities are decimals with an
//! optional binary (`Ki`..`Ei`) or decimal (`K`..`E`) suffix: `"128Mi"`,
//! `"10Gi"`, `"500M"`.
//!
//! Quantities are parsed on demand and never cached in pre-parsed form.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static CPU_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+(\.\d+)?)(m)?$").unwrap_or_else(|e| panic!("invalid cpu pattern: {e}"))
});

static MEMORY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+(\.\d+)?)(Ki|Mi|Gi|Ti|Pi|Ei|K|M|G|T|P|E)?$")
        .unwrap_or_else(|e| panic!("invalid memory pattern: {e}"))
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("invalid CPU format: {0:?}")]
    InvalidCpu(String),

    #[error("invalid memory format: {0:?}")]
    InvalidMemory(String),

    #[error("invalid storage format: {0:?}")]
    InvalidStorage(String),

    #[error("must be a non-negative integer or a percentage between 0% and 100%: {0:?}")]
    InvalidIntOrPercent(String),
}

/// The resource dimension a quantity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityKind {
    Cpu,
    Memory,
    Storage,
}

/// A parsed quantity, normalised to millicores (CPU) or bytes (memory, storage).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantity(f64);

impl Quantity {
    pub fn parse_cpu(s: &str) -> Result<Self, QuantityError> {
        let caps = CPU_PATTERN
            .captures(s)
            .ok_or_else(|| QuantityError::InvalidCpu(s.to_string()))?;
        let number: f64 = caps[1]
            .parse()
            .map_err(|_| QuantityError::InvalidCpu(s.to_string()))?;
        let millis = if caps.get(3).is_some() {
            number
        } else {
            number * 1000.0
        };
        Ok(Self(millis))
    }

    pub fn parse_memory(s: &str) -> Result<Self, QuantityError> {
        parse_bytes(s)
            .map(Self)
            .ok_or_else(|| QuantityError::InvalidMemory(s.to_string()))
    }

    /// Storage shares the memory grammar.
    pub fn parse_storage(s: &str) -> Result<Self, QuantityError> {
        parse_bytes(s)
            .map(Self)
            .ok_or_else(|| QuantityError::InvalidStorage(s.to_string()))
    }

    pub fn parse(kind: QuantityKind, s: &str) -> Result<Self, QuantityError> {
        match kind {
            QuantityKind::Cpu => Self::parse_cpu(s),
            QuantityKind::Memory => Self::parse_memory(s),
            QuantityKind::Storage => Self::parse_storage(s),
        }
    }

    /// Normalised magnitude, comparable between quantities of the same kind.
    pub fn magnitude(&self) -> f64 {
        self.0
    }
}

fn parse_bytes(s: &str) -> Option<f64> {
    let caps = MEMORY_PATTERN.captures(s)?;
    let number: f64 = caps[1].parse().ok()?;
    let multiplier = match caps.get(3).map(|m| m.as_str()) {
        None => 1.0,
        Some("K") => 1e3,
        Some("M") => 1e6,
        Some("G") => 1e9,
        Some("T") => 1e12,
        Some("P") => 1e15,
        Some("E") => 1e18,
        Some("Ki") => 1024f64,
        Some("Mi") => 1024f64.powi(2),
        Some("Gi") => 1024f64.powi(3),
        Some("Ti") => 1024f64.powi(4),
        Some("Pi") => 1024f64.powi(5),
        Some("Ei") => 1024f64.powi(6),
        Some(_) => return None,
    };
    Some(number * multiplier)
}

/// Parsed int-or-percent value (rolling-update surge/unavailability).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntOrPercent {
    Int(u32),
    Percent(u8),
}

impl IntOrPercent {
    pub fn parse(s: &str) -> Result<Self, QuantityError> {
        let invalid = || QuantityError::InvalidIntOrPercent(s.to_string());

        if let Some(digits) = s.strip_suffix('%') {
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            let pct: u32 = digits.parse().map_err(|_| invalid())?;
            if pct > 100 {
                return Err(invalid());
            }
            return Ok(Self::Percent(pct as u8));
        }

        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        s.parse().map(Self::Int).map_err(|_| invalid())
    }
}
