// Copyright (c) 2026 CodeVald Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Configuration validation
//!
//! Three passes, each aggregating every violation it finds:
//!
//! 1. [`ConfigurationValidator::validate`]: structural rules on identity,
//!    base limits, runtime policies, deployment and labels.
//! 2. [`ConfigurationValidator::validate_compatibility`]: what this engine
//!    currently accepts (enabled agent types, supported strategies) and the
//!    resource quantity grammar.
//! 3. [`ConfigurationValidator::validate_resources`]: asks the wired
//!    [`ResourceChecker`] whether the requested quantities are available.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::configuration::{
    AgentConfiguration, Affinity, BaseConfig, DeploymentConfiguration, DeploymentStrategy,
    HealthCheckConfig, LoggingConfig, MetricsConfig, NodeSelectorTerm, PodAffinity,
    PodAffinityTerm, ResourceList, RestartPolicy, RestartPolicyKind, RollingUpdateConfig,
    SelectorRequirement, Toleration,
};
use crate::domain::quantity::{IntOrPercent, Quantity, QuantityKind};
use crate::domain::resources::ResourceChecker;

/// Agent types this engine knows about.
pub const KNOWN_AGENT_TYPES: [&str; 5] = ["worker", "coordinator", "monitor", "proxy", "gateway"];

const LOG_LEVELS: [&str; 4] = ["debug", "info", "warn", "error"];
const LOG_FORMATS: [&str; 2] = ["json", "text"];
const LOG_OUTPUTS: [&str; 3] = ["stdout", "file", "syslog"];
const TOLERATION_OPERATORS: [&str; 3] = ["", "Exists", "Equal"];
const TAINT_EFFECTS: [&str; 4] = ["", "NoSchedule", "PreferNoSchedule", "NoExecute"];
const SELECTOR_OPERATORS: [&str; 6] = ["In", "NotIn", "Exists", "DoesNotExist", "Gt", "Lt"];
const MAX_LABEL_LENGTH: usize = 63;

static LABEL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9\-_.]*[a-zA-Z0-9])?$")
        .unwrap_or_else(|e| panic!("invalid label pattern: {e}"))
});

/// A single rule violation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `base_config.max_concurrent_tasks`
    pub field: String,
    pub value: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(
        field: impl Into<String>,
        value: impl fmt::Display,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            value: value.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed for field '{}': {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Ordered collection of violations reported together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, value: impl fmt::Display, message: impl Into<String>) {
        self.0.push(ValidationError::new(field, value, message));
    }

    pub fn extend(&mut self, other: ValidationErrors) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.0.iter()
    }

    /// True when any violation is reported against `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("no validation errors");
        }
        let joined = self
            .0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&joined)
    }
}

impl std::error::Error for ValidationErrors {}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a ValidationError;
    type IntoIter = std::slice::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[async_trait]
pub trait ConfigurationValidator: Send + Sync {
    fn validate(&self, config: &AgentConfiguration) -> Result<(), ValidationErrors>;

    fn validate_compatibility(&self, config: &AgentConfiguration) -> Result<(), ValidationErrors>;

    async fn validate_resources(&self, config: &AgentConfiguration) -> Result<(), ValidationErrors>;
}

/// What the running engine accepts. Loaded from engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationPolicy {
    #[serde(default = "default_supported_agent_types")]
    pub supported_agent_types: Vec<String>,

    /// Known but currently switched off
    #[serde(default)]
    pub disabled_agent_types: Vec<String>,

    #[serde(default = "default_supported_strategies")]
    pub supported_strategies: Vec<DeploymentStrategy>,
}

fn default_supported_agent_types() -> Vec<String> {
    KNOWN_AGENT_TYPES.iter().map(|s| s.to_string()).collect()
}

fn default_supported_strategies() -> Vec<DeploymentStrategy> {
    DeploymentStrategy::ALL.to_vec()
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            supported_agent_types: default_supported_agent_types(),
            disabled_agent_types: vec![],
            supported_strategies: default_supported_strategies(),
        }
    }
}

impl ValidationPolicy {
    pub fn is_agent_type_known(&self, agent_type: &str) -> bool {
        self.supported_agent_types.iter().any(|t| t == agent_type)
    }

    pub fn is_agent_type_enabled(&self, agent_type: &str) -> bool {
        self.is_agent_type_known(agent_type)
            && !self.disabled_agent_types.iter().any(|t| t == agent_type)
    }

    pub fn is_strategy_supported(&self, strategy: &DeploymentStrategy) -> bool {
        self.supported_strategies.contains(strategy)
    }
}

/// Rule-based validator with an optional resource checker.
#[derive(Clone, Default)]
pub struct DefaultValidator {
    policy: ValidationPolicy,
    resource_checker: Option<Arc<dyn ResourceChecker>>,
}

impl DefaultValidator {
    pub fn new(policy: ValidationPolicy) -> Self {
        Self {
            policy,
            resource_checker: None,
        }
    }

    pub fn with_resource_checker(mut self, checker: Arc<dyn ResourceChecker>) -> Self {
        self.resource_checker = Some(checker);
        self
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    fn validate_identity(&self, config: &AgentConfiguration, errors: &mut ValidationErrors) {
        if config.name.trim().is_empty() {
            errors.push("name", &config.name, "name cannot be empty");
        }

        if config.agent_type.is_empty() {
            errors.push("agent_type", &config.agent_type, "agent type cannot be empty");
        } else if !self.policy.is_agent_type_known(&config.agent_type) {
            errors.push("agent_type", &config.agent_type, "unsupported agent type");
        }
    }

    fn validate_labels(&self, config: &AgentConfiguration, errors: &mut ValidationErrors) {
        for (key, value) in &config.labels {
            let field = format!("labels.{key}");
            if key.is_empty() || key.len() > MAX_LABEL_LENGTH {
                errors.push(&field, key, "label key must be between 1 and 63 characters");
            } else if !LABEL_PATTERN.is_match(key) {
                errors.push(&field, key, "label key has invalid format");
            }

            if value.len() > MAX_LABEL_LENGTH {
                errors.push(&field, value, "label value cannot exceed 63 characters");
            } else if !value.is_empty() && !LABEL_PATTERN.is_match(value) {
                errors.push(&field, value, "label value has invalid format");
            }
        }
    }
}

impl fmt::Debug for DefaultValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultValidator")
            .field("policy", &self.policy)
            .field("resource_checker", &self.resource_checker.is_some())
            .finish()
    }
}

#[async_trait]
impl ConfigurationValidator for DefaultValidator {
    fn validate(&self, config: &AgentConfiguration) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        self.validate_identity(config, &mut errors);
        validate_base_config(&config.base_config, &mut errors);
        validate_restart_policy(&config.runtime_config.restart_policy, &mut errors);
        validate_health_check(&config.runtime_config.health_check, &mut errors);
        validate_logging(&config.runtime_config.logging, &mut errors);
        validate_metrics(&config.runtime_config.metrics, &mut errors);
        validate_deployment(&config.deployment_config, &mut errors);
        self.validate_labels(config, &mut errors);

        errors.into_result()
    }

    fn validate_compatibility(&self, config: &AgentConfiguration) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.policy.is_agent_type_enabled(&config.agent_type) {
            errors.push(
                "agent_type",
                &config.agent_type,
                "agent type not supported by current system",
            );
        }

        let strategy = &config.deployment_config.strategy;
        if !self.policy.is_strategy_supported(strategy) {
            errors.push("deployment_config.strategy", strategy, "deployment strategy not supported");
        }

        let resources = &config.deployment_config.resources;
        let requests = check_resource_list(
            "deployment_config.resources.requests",
            &resources.requests,
            &mut errors,
        );
        let limits = check_resource_list(
            "deployment_config.resources.limits",
            &resources.limits,
            &mut errors,
        );

        for (name, request, limit) in [
            ("cpu", requests.cpu, limits.cpu),
            ("memory", requests.memory, limits.memory),
            ("storage", requests.storage, limits.storage),
        ] {
            if let (Some(request), Some(limit)) = (request, limit) {
                if request.magnitude() > limit.magnitude() {
                    errors.push(
                        format!("deployment_config.resources.requests.{name}"),
                        resource_field(&resources.requests, name),
                        format!("request exceeds limit {}", resource_field(&resources.limits, name)),
                    );
                }
            }
        }

        errors.into_result()
    }

    async fn validate_resources(&self, config: &AgentConfiguration) -> Result<(), ValidationErrors> {
        let Some(checker) = &self.resource_checker else {
            return Ok(());
        };

        let mut errors = ValidationErrors::new();
        let requests = &config.deployment_config.resources.requests;

        if !requests.cpu.is_empty() {
            if let Err(reason) = checker.check_cpu_availability(&requests.cpu).await {
                errors.push(
                    "deployment_config.resources.requests.cpu",
                    &requests.cpu,
                    format!("CPU resources not available: {reason}"),
                );
            }
        }

        if !requests.memory.is_empty() {
            if let Err(reason) = checker.check_memory_availability(&requests.memory).await {
                errors.push(
                    "deployment_config.resources.requests.memory",
                    &requests.memory,
                    format!("memory resources not available: {reason}"),
                );
            }
        }

        if !requests.storage.is_empty() {
            if let Err(reason) = checker.check_storage_availability(&requests.storage).await {
                errors.push(
                    "deployment_config.resources.requests.storage",
                    &requests.storage,
                    format!("storage resources not available: {reason}"),
                );
            }
        }

        errors.into_result()
    }
}

fn validate_base_config(base: &BaseConfig, errors: &mut ValidationErrors) {
    if base.max_concurrent_tasks <= 0 {
        errors.push(
            "base_config.max_concurrent_tasks",
            base.max_concurrent_tasks,
            "max concurrent tasks must be greater than 0",
        );
    }
    if base.task_queue_size <= 0 {
        errors.push(
            "base_config.task_queue_size",
            base.task_queue_size,
            "task queue size must be greater than 0",
        );
    }
    if base.heartbeat_interval.is_zero() {
        errors.push(
            "base_config.heartbeat_interval",
            humantime::format_duration(base.heartbeat_interval),
            "heartbeat interval must be greater than 0",
        );
    }
    if base.task_timeout.is_zero() {
        errors.push(
            "base_config.task_timeout",
            humantime::format_duration(base.task_timeout),
            "task timeout must be greater than 0",
        );
    }
    if base.resources.cpu <= 0 {
        errors.push(
            "base_config.resources.cpu",
            base.resources.cpu,
            "CPU resources must be greater than 0",
        );
    }
    if base.resources.memory <= 0 {
        errors.push(
            "base_config.resources.memory",
            base.resources.memory,
            "memory resources must be greater than 0",
        );
    }
}

fn validate_restart_policy(policy: &RestartPolicy, errors: &mut ValidationErrors) {
    const PREFIX: &str = "runtime_config.restart_policy";

    if let RestartPolicyKind::Unknown(kind) = &policy.policy {
        errors.push(
            format!("{PREFIX}.policy"),
            kind,
            "restart policy must be one of Always, OnFailure, Never",
        );
    }
    if policy.max_retries < -1 {
        errors.push(
            format!("{PREFIX}.max_retries"),
            policy.max_retries,
            "max retries cannot be less than -1",
        );
    }
    if !(policy.backoff_multiplier > 0.0) {
        errors.push(
            format!("{PREFIX}.backoff_multiplier"),
            policy.backoff_multiplier,
            "backoff multiplier must be greater than 0",
        );
    }
    if !policy.max_delay.is_zero() && policy.initial_delay > policy.max_delay {
        errors.push(
            format!("{PREFIX}.initial_delay"),
            humantime::format_duration(policy.initial_delay),
            "initial delay cannot be greater than max delay",
        );
    }
}

fn validate_health_check(health: &HealthCheckConfig, errors: &mut ValidationErrors) {
    const PREFIX: &str = "runtime_config.health_check";

    if !health.enabled {
        return;
    }
    if !is_valid_port(health.port) {
        errors.push(format!("{PREFIX}.port"), health.port, "port must be between 1 and 65535");
    }
    if health.interval.is_zero() {
        errors.push(
            format!("{PREFIX}.interval"),
            humantime::format_duration(health.interval),
            "interval must be greater than 0",
        );
    }
    if health.timeout.is_zero() {
        errors.push(
            format!("{PREFIX}.timeout"),
            humantime::format_duration(health.timeout),
            "timeout must be greater than 0",
        );
    }
    if health.failure_threshold <= 0 {
        errors.push(
            format!("{PREFIX}.failure_threshold"),
            health.failure_threshold,
            "failure threshold must be greater than 0",
        );
    }
    if health.success_threshold <= 0 {
        errors.push(
            format!("{PREFIX}.success_threshold"),
            health.success_threshold,
            "success threshold must be greater than 0",
        );
    }
}

fn validate_logging(logging: &LoggingConfig, errors: &mut ValidationErrors) {
    const PREFIX: &str = "runtime_config.logging";

    if !LOG_LEVELS.contains(&logging.level.as_str()) {
        errors.push(
            format!("{PREFIX}.level"),
            &logging.level,
            format!("log level must be one of {}", LOG_LEVELS.join(", ")),
        );
    }
    if !LOG_FORMATS.contains(&logging.format.as_str()) {
        errors.push(
            format!("{PREFIX}.format"),
            &logging.format,
            format!("log format must be one of {}", LOG_FORMATS.join(", ")),
        );
    }
    if !LOG_OUTPUTS.contains(&logging.output.as_str()) {
        errors.push(
            format!("{PREFIX}.output"),
            &logging.output,
            format!("log output must be one of {}", LOG_OUTPUTS.join(", ")),
        );
    }
    if logging.output == "file" && logging.file_path.is_empty() {
        errors.push(
            format!("{PREFIX}.file_path"),
            &logging.file_path,
            "file path is required when output is file",
        );
    }
}

fn validate_metrics(metrics: &MetricsConfig, errors: &mut ValidationErrors) {
    const PREFIX: &str = "runtime_config.metrics";

    if !metrics.enabled {
        return;
    }
    if !is_valid_port(metrics.port) {
        errors.push(format!("{PREFIX}.port"), metrics.port, "port must be between 1 and 65535");
    }
    if metrics.interval.is_zero() {
        errors.push(
            format!("{PREFIX}.interval"),
            humantime::format_duration(metrics.interval),
            "interval must be greater than 0",
        );
    }
}

fn validate_deployment(deployment: &DeploymentConfiguration, errors: &mut ValidationErrors) {
    if deployment.replicas < 0 {
        errors.push(
            "deployment_config.replicas",
            deployment.replicas,
            "replicas cannot be negative",
        );
    }

    if !deployment.strategy.is_known() {
        errors.push(
            "deployment_config.strategy",
            &deployment.strategy,
            "invalid deployment strategy",
        );
    }

    if deployment.strategy == DeploymentStrategy::RollingUpdate {
        validate_rolling_update(&deployment.rolling_update, errors);
    }

    for (i, toleration) in deployment.tolerations.iter().enumerate() {
        validate_toleration(&format!("deployment_config.tolerations[{i}]"), toleration, errors);
    }

    if let Some(affinity) = &deployment.affinity {
        validate_affinity(affinity, errors);
    }
}

fn validate_rolling_update(rolling: &RollingUpdateConfig, errors: &mut ValidationErrors) {
    const PREFIX: &str = "deployment_config.rolling_update";

    if !rolling.max_unavailable.is_empty() {
        if let Err(e) = IntOrPercent::parse(&rolling.max_unavailable) {
            errors.push(format!("{PREFIX}.max_unavailable"), &rolling.max_unavailable, e.to_string());
        }
    }
    if !rolling.max_surge.is_empty() {
        if let Err(e) = IntOrPercent::parse(&rolling.max_surge) {
            errors.push(format!("{PREFIX}.max_surge"), &rolling.max_surge, e.to_string());
        }
    }
}

fn validate_toleration(prefix: &str, toleration: &Toleration, errors: &mut ValidationErrors) {
    if !TOLERATION_OPERATORS.contains(&toleration.operator.as_str()) {
        errors.push(
            format!("{prefix}.operator"),
            &toleration.operator,
            "toleration operator must be Exists or Equal",
        );
    }
    if toleration.operator == "Exists" && !toleration.value.is_empty() {
        errors.push(
            format!("{prefix}.value"),
            &toleration.value,
            "value must be empty when operator is Exists",
        );
    }
    if !TAINT_EFFECTS.contains(&toleration.effect.as_str()) {
        errors.push(
            format!("{prefix}.effect"),
            &toleration.effect,
            "effect must be NoSchedule, PreferNoSchedule or NoExecute",
        );
    }
}

fn validate_affinity(affinity: &Affinity, errors: &mut ValidationErrors) {
    const PREFIX: &str = "deployment_config.affinity";

    if let Some(node) = &affinity.node_affinity {
        if let Some(required) = &node.required_during_scheduling_ignored_during_execution {
            for (i, term) in required.node_selector_terms.iter().enumerate() {
                validate_node_selector_term(
                    &format!("{PREFIX}.node_affinity.required[{i}]"),
                    term,
                    errors,
                );
            }
        }
        for (i, preferred) in node
            .preferred_during_scheduling_ignored_during_execution
            .iter()
            .enumerate()
        {
            let prefix = format!("{PREFIX}.node_affinity.preferred[{i}]");
            validate_weight(&prefix, preferred.weight, errors);
            validate_node_selector_term(&format!("{prefix}.preference"), &preferred.preference, errors);
        }
    }

    if let Some(pod) = &affinity.pod_affinity {
        validate_pod_affinity(&format!("{PREFIX}.pod_affinity"), pod, errors);
    }
    if let Some(pod) = &affinity.pod_anti_affinity {
        validate_pod_affinity(&format!("{PREFIX}.pod_anti_affinity"), pod, errors);
    }
}

fn validate_pod_affinity(prefix: &str, pod: &PodAffinity, errors: &mut ValidationErrors) {
    for (i, term) in pod
        .required_during_scheduling_ignored_during_execution
        .iter()
        .enumerate()
    {
        validate_pod_affinity_term(&format!("{prefix}.required[{i}]"), term, errors);
    }
    for (i, weighted) in pod
        .preferred_during_scheduling_ignored_during_execution
        .iter()
        .enumerate()
    {
        let term_prefix = format!("{prefix}.preferred[{i}]");
        validate_weight(&term_prefix, weighted.weight, errors);
        validate_pod_affinity_term(&term_prefix, &weighted.pod_affinity_term, errors);
    }
}

fn validate_pod_affinity_term(prefix: &str, term: &PodAffinityTerm, errors: &mut ValidationErrors) {
    if term.topology_key.is_empty() {
        errors.push(format!("{prefix}.topology_key"), "", "topology key cannot be empty");
    }
    if let Some(selector) = &term.label_selector {
        for (i, req) in selector.match_expressions.iter().enumerate() {
            validate_selector_requirement(
                &format!("{prefix}.label_selector.match_expressions[{i}]"),
                req,
                errors,
            );
        }
    }
}

fn validate_node_selector_term(prefix: &str, term: &NodeSelectorTerm, errors: &mut ValidationErrors) {
    for (i, req) in term.match_expressions.iter().enumerate() {
        validate_selector_requirement(&format!("{prefix}.match_expressions[{i}]"), req, errors);
    }
    for (i, req) in term.match_fields.iter().enumerate() {
        validate_selector_requirement(&format!("{prefix}.match_fields[{i}]"), req, errors);
    }
}

fn validate_selector_requirement(prefix: &str, req: &SelectorRequirement, errors: &mut ValidationErrors) {
    if req.key.is_empty() {
        errors.push(format!("{prefix}.key"), "", "selector key cannot be empty");
    }
    if !SELECTOR_OPERATORS.contains(&req.operator.as_str()) {
        errors.push(
            format!("{prefix}.operator"),
            &req.operator,
            format!("operator must be one of {}", SELECTOR_OPERATORS.join(", ")),
        );
    }
}

fn validate_weight(prefix: &str, weight: i32, errors: &mut ValidationErrors) {
    if !(1..=100).contains(&weight) {
        errors.push(format!("{prefix}.weight"), weight, "weight must be between 1 and 100");
    }
}

#[derive(Default)]
struct ParsedResources {
    cpu: Option<Quantity>,
    memory: Option<Quantity>,
    storage: Option<Quantity>,
}

/// Grammar-check every non-empty quantity, returning the ones that parsed.
fn check_resource_list(prefix: &str, list: &ResourceList, errors: &mut ValidationErrors) -> ParsedResources {
    let mut parse = |name: &str, kind: QuantityKind, raw: &str| -> Option<Quantity> {
        if raw.is_empty() {
            return None;
        }
        match Quantity::parse(kind, raw) {
            Ok(q) => Some(q),
            Err(e) => {
                errors.push(format!("{prefix}.{name}"), raw, e.to_string());
                None
            }
        }
    };

    ParsedResources {
        cpu: parse("cpu", QuantityKind::Cpu, &list.cpu),
        memory: parse("memory", QuantityKind::Memory, &list.memory),
        storage: parse("storage", QuantityKind::Storage, &list.storage),
    }
}

fn resource_field<'a>(list: &'a ResourceList, name: &str) -> &'a str {
    match name {
        "cpu" => &list.cpu,
        "memory" => &list.memory,
        _ => &list.storage,
    }
}

fn is_valid_port(port: u32) -> bool {
    (1..=65535).contains(&port)
}
