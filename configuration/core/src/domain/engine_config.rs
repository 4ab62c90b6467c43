// Copyright (c) 2026 CodeVald Contributors
// SPDX-License-Identifier: AGPL-3.0

// Engine Configuration - Kubernetes-style manifest for the engine itself
//
// Selects and tunes the pluggable backends:
// - Storage backend (in-memory or PostgreSQL document store)
// - Configuration cache TTL and capacity
// - Validation policy (enabled agent types, supported strategies)
// - Node capacity used by the resource checker
// - Event bus buffer size

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::cache::DEFAULT_CACHE_TTL;
use crate::domain::repository::{PostgresConfig, StorageBackend};
use crate::domain::validation::ValidationPolicy;

pub const API_VERSION: &str = "agentconf.io/v1";
pub const KIND: &str = "EngineConfig";

const CONFIG_PATH_ENV: &str = "AGENTCONF_CONFIG_PATH";
const DATABASE_URL_ENV: &str = "AGENTCONF_DATABASE_URL";
const CACHE_TTL_ENV: &str = "AGENTCONF_CACHE_TTL";

/// Top-level engine configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfigManifest {
    /// API version (must be "agentconf.io/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "EngineConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: EngineConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfigSpec {
    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub validation: ValidationPolicy,

    #[serde(default)]
    pub node: NodeCapacity,

    #[serde(default)]
    pub events: EventSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StorageSettings {
    #[default]
    InMemory,
    Postgres {
        connection_string: String,
        #[serde(default = "default_max_connections")]
        max_connections: u32,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_cache_ttl", with = "humantime_serde")]
    pub ttl: Duration,

    /// Maximum cached configurations before least-recently-used eviction
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

/// Capacity of the node the engine validates resource requests against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeCapacity {
    #[serde(default = "default_cpu_cores")]
    pub cpu_cores: u32,
    #[serde(default = "default_memory_gb")]
    pub memory_gb: u32,
    #[serde(default = "default_disk_gb")]
    pub disk_gb: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSettings {
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,
}

fn default_true() -> bool {
    true
}

fn default_max_connections() -> u32 {
    5
}

fn default_cache_ttl() -> Duration {
    DEFAULT_CACHE_TTL
}

fn default_cache_capacity() -> usize {
    1024
}

fn default_cpu_cores() -> u32 {
    4
}

fn default_memory_gb() -> u32 {
    16
}

fn default_disk_gb() -> u32 {
    100
}

fn default_event_capacity() -> usize {
    1000
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: default_cache_ttl(),
            capacity: default_cache_capacity(),
        }
    }
}

impl Default for NodeCapacity {
    fn default() -> Self {
        Self {
            cpu_cores: default_cpu_cores(),
            memory_gb: default_memory_gb(),
            disk_gb: default_disk_gb(),
        }
    }
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            capacity: default_event_capacity(),
        }
    }
}

impl Default for EngineConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "agentconf".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: EngineConfigSpec::default(),
        }
    }
}

impl StorageSettings {
    pub fn to_backend(&self) -> StorageBackend {
        match self {
            Self::InMemory => StorageBackend::InMemory,
            Self::Postgres {
                connection_string,
                max_connections,
            } => StorageBackend::PostgreSQL(PostgresConfig {
                connection_string: connection_string.clone(),
                max_connections: *max_connections,
            }),
        }
    }
}

impl EngineConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. AGENTCONF_CONFIG_PATH environment variable
    /// 2. ./agentconf.yaml (working directory)
    /// 3. ~/.agentconf/config.yaml (user home)
    /// 4. /etc/agentconf/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        let env_path = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
        let system = PathBuf::from("/etc/agentconf/config.yaml");
        Self::discover_from(env_path, Path::new("."), dirs::home_dir(), &system)
    }

    fn discover_from(
        env_path: Option<PathBuf>,
        cwd: &Path,
        home: Option<PathBuf>,
        system: &Path,
    ) -> Option<PathBuf> {
        if let Some(path) = env_path {
            if path.exists() {
                return Some(path);
            }
        }

        let local = cwd.join("agentconf.yaml");
        if local.exists() {
            return Some(local);
        }

        if let Some(home) = home {
            let user_config = home.join(".agentconf").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        if system.exists() {
            return Some(system.to_path_buf());
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        let database_url = std::env::var(DATABASE_URL_ENV).ok();
        let cache_ttl = std::env::var(CACHE_TTL_ENV).ok();
        self.apply_overrides(database_url, cache_ttl);
    }

    fn apply_overrides(&mut self, database_url: Option<String>, cache_ttl: Option<String>) {
        if let Some(url) = database_url.filter(|u| !u.is_empty()) {
            tracing::info!("Environment override: {} (storage backend set to postgres)", DATABASE_URL_ENV);
            let max_connections = match &self.spec.storage {
                StorageSettings::Postgres { max_connections, .. } => *max_connections,
                StorageSettings::InMemory => default_max_connections(),
            };
            self.spec.storage = StorageSettings::Postgres {
                connection_string: url,
                max_connections,
            };
        }

        if let Some(val) = cache_ttl {
            match humantime::parse_duration(&val) {
                Ok(ttl) => {
                    tracing::info!("Environment override: {}={}", CACHE_TTL_ENV, val);
                    self.spec.cache.ttl = ttl;
                }
                Err(_) => {
                    tracing::warn!(
                        "Invalid value for {}: '{}'. Expected a duration such as '30m'. Ignoring.",
                        CACHE_TTL_ENV,
                        val
                    );
                }
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if let StorageSettings::Postgres {
            connection_string,
            max_connections,
        } = &self.spec.storage
        {
            if connection_string.is_empty() {
                anyhow::bail!("spec.storage.connection_string cannot be empty for postgres");
            }
            if *max_connections == 0 {
                anyhow::bail!("spec.storage.max_connections must be greater than 0");
            }
        }

        if self.spec.cache.enabled && self.spec.cache.capacity == 0 {
            anyhow::bail!("spec.cache.capacity must be greater than 0 when the cache is enabled");
        }

        if self.spec.validation.supported_agent_types.is_empty() {
            anyhow::bail!("spec.validation.supported_agent_types cannot be empty");
        }

        for disabled in &self.spec.validation.disabled_agent_types {
            if !self.spec.validation.is_agent_type_known(disabled) {
                anyhow::bail!(
                    "Disabled agent type '{}' not found in supported_agent_types",
                    disabled
                );
            }
        }

        if let Some(unknown) = self
            .spec
            .validation
            .supported_strategies
            .iter()
            .find(|s| !s.is_known())
        {
            anyhow::bail!("Unknown deployment strategy in supported_strategies: '{}'", unknown);
        }

        if self.spec.events.capacity == 0 {
            anyhow::bail!("spec.events.capacity must be greater than 0");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::configuration::DeploymentStrategy;

    #[test]
    fn test_default_manifest() {
        let manifest = EngineConfigManifest::default();
        assert_eq!(manifest.api_version, API_VERSION);
        assert_eq!(manifest.kind, KIND);
        assert_eq!(manifest.spec.storage, StorageSettings::InMemory);
        assert_eq!(manifest.spec.cache.ttl, Duration::from_secs(3600));
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_parse_postgres_manifest() {
        let yaml = r#"
apiVersion: agentconf.io/v1
kind: EngineConfig
metadata:
  name: prod-engine
spec:
  storage:
    backend: postgres
    connection_string: postgres://agentconf@db/agentconf
  cache:
    ttl: 15m
    capacity: 256
  validation:
    disabled_agent_types: [proxy]
    supported_strategies: [RollingUpdate, Recreate]
  node:
    cpu_cores: 8
"#;
        let manifest = EngineConfigManifest::from_yaml_str(yaml).unwrap();
        assert!(manifest.validate().is_ok());
        assert_eq!(
            manifest.spec.storage.to_backend(),
            StorageBackend::PostgreSQL(PostgresConfig {
                connection_string: "postgres://agentconf@db/agentconf".to_string(),
                max_connections: 5,
            })
        );
        assert_eq!(manifest.spec.cache.ttl, Duration::from_secs(900));
        assert!(manifest.spec.cache.enabled);
        assert_eq!(manifest.spec.validation.supported_agent_types.len(), 5);
        assert!(!manifest.spec.validation.is_agent_type_enabled("proxy"));
        assert_eq!(
            manifest.spec.validation.supported_strategies,
            vec![DeploymentStrategy::RollingUpdate, DeploymentStrategy::Recreate]
        );
        assert_eq!(manifest.spec.node.cpu_cores, 8);
        assert_eq!(manifest.spec.node.memory_gb, 16);
    }

    #[test]
    fn test_validation() {
        let mut manifest = EngineConfigManifest::default();

        manifest.api_version = "wrong/v1".to_string();
        assert!(manifest.validate().is_err());
        manifest.api_version = API_VERSION.to_string();

        manifest.kind = "NodeConfig".to_string();
        assert!(manifest.validate().is_err());
        manifest.kind = KIND.to_string();

        manifest.metadata.name = "".to_string();
        assert!(manifest.validate().is_err());
        manifest.metadata.name = "engine".to_string();

        manifest.spec.storage = StorageSettings::Postgres {
            connection_string: String::new(),
            max_connections: 5,
        };
        assert!(manifest.validate().is_err());
        manifest.spec.storage = StorageSettings::InMemory;

        manifest.spec.validation.disabled_agent_types = vec!["robot".to_string()];
        assert!(manifest.validate().is_err());
        manifest.spec.validation.disabled_agent_types.clear();

        manifest.spec.validation.supported_strategies =
            vec![DeploymentStrategy::Unknown("Shadow".to_string())];
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut manifest = EngineConfigManifest::default();
        manifest.apply_overrides(
            Some("postgres://localhost/agentconf".to_string()),
            Some("10m".to_string()),
        );
        assert!(matches!(
            manifest.spec.storage,
            StorageSettings::Postgres { ref connection_string, max_connections: 5 }
                if connection_string == "postgres://localhost/agentconf"
        ));
        assert_eq!(manifest.spec.cache.ttl, Duration::from_secs(600));

        manifest.apply_overrides(None, Some("soon".to_string()));
        assert_eq!(manifest.spec.cache.ttl, Duration::from_secs(600));
    }

    #[test]
    fn test_discovery_precedence() {
        let cwd = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        let system = cwd.path().join("missing-system.yaml");

        assert_eq!(
            EngineConfigManifest::discover_from(None, cwd.path(), Some(home.path().to_path_buf()), &system),
            None
        );

        let user_dir = home.path().join(".agentconf");
        std::fs::create_dir_all(&user_dir).unwrap();
        let user_config = user_dir.join("config.yaml");
        std::fs::write(&user_config, "").unwrap();
        assert_eq!(
            EngineConfigManifest::discover_from(None, cwd.path(), Some(home.path().to_path_buf()), &system),
            Some(user_config)
        );

        let local = cwd.path().join("agentconf.yaml");
        std::fs::write(&local, "").unwrap();
        assert_eq!(
            EngineConfigManifest::discover_from(None, cwd.path(), Some(home.path().to_path_buf()), &system),
            Some(local.clone())
        );

        let explicit = home.path().join("explicit.yaml");
        std::fs::write(&explicit, "").unwrap();
        assert_eq!(
            EngineConfigManifest::discover_from(
                Some(explicit.clone()),
                cwd.path(),
                Some(home.path().to_path_buf()),
                &system
            ),
            Some(explicit)
        );

        // A dangling env path falls through to the next location.
        assert_eq!(
            EngineConfigManifest::discover_from(
                Some(home.path().join("nope.yaml")),
                cwd.path(),
                None,
                &system
            ),
            Some(local)
        );
    }

    #[test]
    fn test_yaml_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.yaml");
        let mut manifest = EngineConfigManifest::default();
        manifest.spec.events.capacity = 64;
        manifest.to_yaml_file(&path).unwrap();

        let loaded = EngineConfigManifest::from_yaml_file(&path).unwrap();
        assert_eq!(loaded.spec.events.capacity, 64);
        assert_eq!(loaded.spec.storage, StorageSettings::InMemory);
    }
}
