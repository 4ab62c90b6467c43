// Copyright (c) 2026 CodeVald Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Agent Configuration Aggregate
//!
//! `AgentConfiguration` is the versioned, declarative specification of a
//! worker agent. It is a pure specification artifact: it has no execution
//! state, only identity, version progression and presence in a repository.
//!
//! ## Blocks
//!
//! | Block | Type | Notes |
//! |-------|------|-------|
//! | `base_config` | `BaseConfig` | Core numeric limits, all strictly positive |
//! | `runtime_config` | `RuntimeConfiguration` | Restart, health, logging, metrics, ... |
//! | `deployment_config` | `DeploymentConfiguration` | Strategy, replicas, resources, scheduling hints |
//!
//! Scheduling hints (`tolerations`, `affinity`) are carried and shape-checked
//! only. Placement is the external scheduler's contract.
//!
//! Durations are serialized as humantime strings (`"30s"`, `"5m"`).

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Version assigned to every newly created, cloned or imported configuration.
pub const INITIAL_VERSION: &str = "1.0.0";

/// Opaque configuration identity.
///
/// An empty id marks a configuration that has not been persisted yet; the
/// service mints a UUID v4 on creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigurationId(pub String);

impl ConfigurationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ConfigurationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConfigurationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ConfigurationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Complete agent configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfiguration {
    #[serde(default)]
    pub id: ConfigurationId,

    #[serde(default)]
    pub version: String,

    /// Optimistic-concurrency counter owned by the repository.
    #[serde(default)]
    pub revision: u64,

    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    pub agent_type: String,

    #[serde(default)]
    pub base_config: BaseConfig,

    #[serde(default)]
    pub runtime_config: RuntimeConfiguration,

    #[serde(default)]
    pub deployment_config: DeploymentConfiguration,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment_variables: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

/// Core operational limits of an agent process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseConfig {
    pub max_concurrent_tasks: i32,
    pub task_queue_size: i32,
    #[serde(with = "humantime_serde")]
    pub heartbeat_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub task_timeout: Duration,
    #[serde(default)]
    pub resources: BaseResources,
}

/// Resource allocation of the agent process itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseResources {
    /// CPU in millicores (100 = 0.1 CPU)
    pub cpu: i32,
    /// Memory in MiB
    pub memory: i32,
    #[serde(default)]
    pub max_tasks: i32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RuntimeConfiguration {
    #[serde(default)]
    pub auto_restart: bool,
    #[serde(default)]
    pub restart_policy: RestartPolicy,
    #[serde(default)]
    pub health_check: HealthCheckConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub communication: CommunicationConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

/// Restart behavior kind. Unrecognised strings are preserved so that the
/// validator, not the parser, reports them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RestartPolicyKind {
    Always,
    OnFailure,
    Never,
    Unknown(String),
}

impl RestartPolicyKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Always => "Always",
            Self::OnFailure => "OnFailure",
            Self::Never => "Never",
            Self::Unknown(s) => s,
        }
    }
}

impl From<String> for RestartPolicyKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Always" => Self::Always,
            "OnFailure" => Self::OnFailure,
            "Never" => Self::Never,
            _ => Self::Unknown(s),
        }
    }
}

impl From<RestartPolicyKind> for String {
    fn from(kind: RestartPolicyKind) -> Self {
        kind.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestartPolicy {
    pub policy: RestartPolicyKind,
    /// Retries before giving up, -1 for unlimited
    pub max_retries: i32,
    pub backoff_multiplier: f64,
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,
    /// Zero disables the cap
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(default)]
    pub port: u32,
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub failure_threshold: i32,
    pub success_threshold: i32,
    #[serde(default, with = "humantime_serde")]
    pub initial_delay: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// debug, info, warn, error
    pub level: String,
    /// json, text
    pub format: String,
    /// stdout, file, syslog
    pub output: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file_path: String,
    /// Rotation size in MB
    #[serde(default)]
    pub max_size: u32,
    #[serde(default)]
    pub max_backups: u32,
    /// Retention in days
    #[serde(default)]
    pub max_age: u32,
    #[serde(default)]
    pub compress: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    #[serde(default)]
    pub port: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_metrics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunicationConfig {
    #[serde(default)]
    pub protocols: Vec<String>,
    pub message_queue_size: u32,
    #[serde(with = "humantime_serde")]
    pub connection_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub write_timeout: Duration,
    pub max_retries: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// MiB
    pub max_memory_usage: u32,
    #[serde(with = "humantime_serde")]
    pub gc_interval: Duration,
    pub persistence_enabled: bool,
    #[serde(with = "humantime_serde")]
    pub sync_interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub tls_enabled: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub certificate_path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key_path: String,
    #[serde(default)]
    pub authentication_required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_origins: Vec<String>,
}

/// Deployment approach. Unrecognised strings survive parsing as `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeploymentStrategy {
    /// Kill all existing instances before creating new ones
    Recreate,
    /// Gradually replace instances
    RollingUpdate,
    /// Create new instances alongside old ones
    BlueGreen,
    /// Gradually shift traffic to new instances
    Canary,
    Unknown(String),
}

impl DeploymentStrategy {
    pub const ALL: [DeploymentStrategy; 4] = [
        DeploymentStrategy::Recreate,
        DeploymentStrategy::RollingUpdate,
        DeploymentStrategy::BlueGreen,
        DeploymentStrategy::Canary,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Self::Recreate => "Recreate",
            Self::RollingUpdate => "RollingUpdate",
            Self::BlueGreen => "BlueGreen",
            Self::Canary => "Canary",
            Self::Unknown(s) => s,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl fmt::Display for DeploymentStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for DeploymentStrategy {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Recreate" => Self::Recreate,
            "RollingUpdate" => Self::RollingUpdate,
            "BlueGreen" => Self::BlueGreen,
            "Canary" => Self::Canary,
            _ => Self::Unknown(s),
        }
    }
}

impl From<DeploymentStrategy> for String {
    fn from(strategy: DeploymentStrategy) -> Self {
        strategy.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentConfiguration {
    pub strategy: DeploymentStrategy,
    pub replicas: i32,
    #[serde(default)]
    pub rolling_update: RollingUpdateConfig,
    #[serde(default)]
    pub resources: ResourceRequirements,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affinity: Option<Affinity>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RollingUpdateConfig {
    /// Integer or percentage ("1", "25%")
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub max_unavailable: String,
    /// Integer or percentage ("1", "25%")
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub max_surge: String,
    #[serde(default, with = "humantime_serde")]
    pub pause_before_scale: Duration,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceRequirements {
    #[serde(default)]
    pub requests: ResourceList,
    #[serde(default)]
    pub limits: ResourceList,
}

/// Resource amounts as quantity strings ("100m", "0.5", "128Mi", "10Gi").
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceList {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cpu: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub memory: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub storage: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom: BTreeMap<String, String>,
}

/// Node taint toleration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Toleration {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,
    /// "Exists" or "Equal"
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub operator: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
    /// "NoSchedule", "PreferNoSchedule" or "NoExecute"
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub effect: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toleration_seconds: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Affinity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_affinity: Option<NodeAffinity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_affinity: Option<PodAffinity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_anti_affinity: Option<PodAffinity>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeAffinity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_during_scheduling_ignored_during_execution: Option<NodeSelector>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preferred_during_scheduling_ignored_during_execution: Vec<PreferredSchedulingTerm>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PodAffinity {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_during_scheduling_ignored_during_execution: Vec<PodAffinityTerm>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preferred_during_scheduling_ignored_during_execution: Vec<WeightedPodAffinityTerm>,
}

/// Terms are ORed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeSelector {
    #[serde(default)]
    pub node_selector_terms: Vec<NodeSelectorTerm>,
}

/// Expressions and fields are ANDed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeSelectorTerm {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_expressions: Vec<SelectorRequirement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_fields: Vec<SelectorRequirement>,
}

/// Shared by node selector and label selector requirements.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SelectorRequirement {
    pub key: String,
    pub operator: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PreferredSchedulingTerm {
    /// 1-100
    pub weight: i32,
    pub preference: NodeSelectorTerm,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PodAffinityTerm {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_selector: Option<LabelSelector>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<String>,
    pub topology_key: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WeightedPodAffinityTerm {
    /// 1-100
    pub weight: i32,
    pub pod_affinity_term: PodAffinityTerm,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LabelSelector {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_expressions: Vec<SelectorRequirement>,
}

// Defaults mirror the built-in worker template.

impl Default for BaseConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 5,
            task_queue_size: 100,
            heartbeat_interval: Duration::from_secs(30),
            task_timeout: Duration::from_secs(300),
            resources: BaseResources::default(),
        }
    }
}

impl Default for BaseResources {
    fn default() -> Self {
        Self {
            cpu: 100,
            memory: 128,
            max_tasks: 100,
        }
    }
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            policy: RestartPolicyKind::OnFailure,
            max_retries: 3,
            backoff_multiplier: 2.0,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: "/health".to_string(),
            port: 8080,
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(5),
            failure_threshold: 3,
            success_threshold: 1,
            initial_delay: Duration::from_secs(10),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
            output: "stdout".to_string(),
            file_path: String::new(),
            max_size: 100,
            max_backups: 3,
            max_age: 7,
            compress: false,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
            path: "/metrics".to_string(),
            interval: Duration::from_secs(15),
            custom_metrics: vec![],
        }
    }
}

impl Default for CommunicationConfig {
    fn default() -> Self {
        Self {
            protocols: vec!["grpc".to_string()],
            message_queue_size: 1000,
            connection_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_memory_usage: 512,
            gc_interval: Duration::from_secs(60),
            persistence_enabled: false,
            sync_interval: Duration::from_secs(300),
        }
    }
}

impl Default for DeploymentConfiguration {
    fn default() -> Self {
        Self {
            strategy: DeploymentStrategy::RollingUpdate,
            replicas: 1,
            rolling_update: RollingUpdateConfig {
                max_unavailable: "25%".to_string(),
                max_surge: "25%".to_string(),
                pause_before_scale: Duration::ZERO,
            },
            resources: ResourceRequirements::default(),
            node_selector: BTreeMap::new(),
            tolerations: vec![],
            affinity: None,
        }
    }
}

impl AgentConfiguration {
    /// Build an unpersisted configuration with template defaults.
    pub fn new(name: impl Into<String>, agent_type: impl Into<String>) -> Self {
        Self {
            id: ConfigurationId::default(),
            version: String::new(),
            revision: 0,
            name: name.into(),
            description: String::new(),
            agent_type: agent_type.into(),
            base_config: BaseConfig::default(),
            runtime_config: RuntimeConfiguration::default(),
            deployment_config: DeploymentConfiguration::default(),
            environment_variables: BTreeMap::new(),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            created_at: None,
            updated_at: None,
            created_by: None,
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// True when every given label is present with an equal value.
    pub fn matches_labels(&self, labels: &BTreeMap<String, String>) -> bool {
        labels
            .iter()
            .all(|(key, value)| self.labels.get(key) == Some(value))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    pub fn from_yaml(data: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(data)
    }
}
