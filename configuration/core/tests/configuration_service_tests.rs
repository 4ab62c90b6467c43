// Copyright (c) 2026 CodeVald Contributors
// SPDX-License-Identifier: AGPL-3.0

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agentconf_core::application::{ConfigurationError, ConfigurationService, ExportFormat};
use agentconf_core::domain::configuration::{AgentConfiguration, ConfigurationId};
use agentconf_core::domain::events::ConfigurationEvent;
use agentconf_core::domain::notification::{ConfigurationNotifier, NotificationError};
use agentconf_core::domain::repository::{ConfigurationRepository, ListFilter, RepositoryError};
use agentconf_core::domain::resources::ResourceChecker;
use agentconf_core::domain::runtime::{AgentRuntime, RuntimeError};
use agentconf_core::domain::validation::{DefaultValidator, ValidationPolicy};
use agentconf_core::infrastructure::cache::{InMemoryConfigurationCache, NoopConfigurationCache};
use agentconf_core::infrastructure::event_bus::EventBus;
use agentconf_core::infrastructure::notifier::{EventBusNotifier, TracingNotifier};
use agentconf_core::infrastructure::repositories::InMemoryConfigurationRepository;
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::timeout;

/// Wraps the in-memory repository and counts reads. Optionally the first
/// read stalls, widening the window for concurrent writers.
#[derive(Default)]
struct CountingRepository {
    inner: InMemoryConfigurationRepository,
    gets: AtomicUsize,
    first_get_delay: Option<Duration>,
    stalled: AtomicBool,
}

impl CountingRepository {
    fn stalling(delay: Duration) -> Self {
        Self {
            first_get_delay: Some(delay),
            ..Default::default()
        }
    }

    fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfigurationRepository for CountingRepository {
    async fn store(&self, config: &AgentConfiguration) -> Result<(), RepositoryError> {
        self.inner.store(config).await
    }
    async fn get(&self, id: &ConfigurationId) -> Result<AgentConfiguration, RepositoryError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.first_get_delay {
            if !self.stalled.swap(true, Ordering::SeqCst) {
                tokio::time::sleep(delay).await;
            }
        }
        self.inner.get(id).await
    }
    async fn update(&self, config: &mut AgentConfiguration) -> Result<(), RepositoryError> {
        self.inner.update(config).await
    }
    async fn delete(&self, id: &ConfigurationId) -> Result<(), RepositoryError> {
        self.inner.delete(id).await
    }
    async fn list(&self, filter: &ListFilter) -> Result<Vec<AgentConfiguration>, RepositoryError> {
        self.inner.list(filter).await
    }
    async fn get_versions(&self, id: &ConfigurationId) -> Result<Vec<AgentConfiguration>, RepositoryError> {
        self.inner.get_versions(id).await
    }
    async fn get_by_labels(
        &self,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<AgentConfiguration>, RepositoryError> {
        self.inner.get_by_labels(labels).await
    }
}

struct FailingNotifier;

#[async_trait]
impl ConfigurationNotifier for FailingNotifier {
    async fn notify_created(&self, _config: &AgentConfiguration) -> Result<(), NotificationError> {
        Err(NotificationError::Delivery("broker offline".to_string()))
    }
    async fn notify_updated(
        &self,
        _old: &AgentConfiguration,
        _new: &AgentConfiguration,
    ) -> Result<(), NotificationError> {
        Err(NotificationError::Delivery("broker offline".to_string()))
    }
    async fn notify_deleted(&self, _id: &ConfigurationId) -> Result<(), NotificationError> {
        Err(NotificationError::Delivery("broker offline".to_string()))
    }
    async fn notify_applied(&self, _agent_id: &str, _config_id: &ConfigurationId) -> Result<(), NotificationError> {
        Err(NotificationError::Delivery("broker offline".to_string()))
    }
}

#[derive(Default)]
struct RecordingRuntime {
    applied: Mutex<Vec<(String, ConfigurationId)>>,
}

#[async_trait]
impl AgentRuntime for RecordingRuntime {
    async fn apply(&self, agent_id: &str, config: &AgentConfiguration) -> Result<(), RuntimeError> {
        if agent_id == "ghost" {
            return Err(RuntimeError::AgentNotFound(agent_id.to_string()));
        }
        self.applied.lock().push((agent_id.to_string(), config.id.clone()));
        Ok(())
    }
}

struct NoCpuChecker;

#[async_trait]
impl ResourceChecker for NoCpuChecker {
    async fn check_cpu_availability(&self, _cpu: &str) -> Result<(), String> {
        Err("cluster saturated".to_string())
    }
    async fn check_memory_availability(&self, _memory: &str) -> Result<(), String> {
        Ok(())
    }
    async fn check_storage_availability(&self, _storage: &str) -> Result<(), String> {
        Ok(())
    }
}

struct Harness {
    service: Arc<ConfigurationService>,
    repository: Arc<CountingRepository>,
    event_bus: EventBus,
}

fn harness() -> Harness {
    harness_with(DefaultValidator::default(), Duration::from_secs(3600))
}

fn harness_with(validator: DefaultValidator, ttl: Duration) -> Harness {
    harness_on(Arc::new(CountingRepository::default()), validator, ttl)
}

fn harness_on(repository: Arc<CountingRepository>, validator: DefaultValidator, ttl: Duration) -> Harness {
    let event_bus = EventBus::new(64);
    let service = ConfigurationService::new(
        repository.clone(),
        Arc::new(validator),
        Arc::new(InMemoryConfigurationCache::new(128)),
        Arc::new(EventBusNotifier::new(event_bus.clone())),
    )
    .with_cache_ttl(ttl);

    Harness {
        service: Arc::new(service),
        repository,
        event_bus,
    }
}

fn worker(name: &str) -> AgentConfiguration {
    AgentConfiguration::new(name, "worker")
}

/// Everything except identity, revision and timestamps.
fn without_identity(mut config: AgentConfiguration) -> AgentConfiguration {
    config.id = ConfigurationId::default();
    config.revision = 0;
    config.created_at = None;
    config.updated_at = None;
    config
}

// ── create ──

#[tokio::test]
async fn test_create_assigns_identity_and_timestamps() {
    let h = harness();
    let created = h.service.create_configuration(worker("worker-001")).await.unwrap();

    assert!(!created.id.is_empty());
    assert_eq!(created.version, "1.0.0");
    assert_eq!(created.revision, 0);
    assert!(created.created_at.is_some());
    assert_eq!(created.created_at, created.updated_at);
}

#[tokio::test]
async fn test_create_records_actor() {
    let h = harness();
    let mut config = worker("worker-001");
    config.created_by = Some("spoofed".to_string());

    let created = h
        .service
        .create_configuration_as(config, Some("operator"))
        .await
        .unwrap();
    assert_eq!(created.created_by.as_deref(), Some("operator"));
}

#[tokio::test]
async fn test_zero_max_concurrent_tasks_is_rejected_before_persisting() {
    let h = harness();
    let mut config = worker("worker-001");
    config.base_config.max_concurrent_tasks = 0;

    match h.service.create_configuration(config).await {
        Err(ConfigurationError::Validation(errors)) => {
            assert!(errors.has_field("base_config.max_concurrent_tasks"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert!(h.service.list_configurations(&ListFilter::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_base_and_label_violations_reported_together() {
    let h = harness();
    let mut config = worker("worker-001");
    config.base_config.task_queue_size = 0;
    config.labels.insert("bad key!".to_string(), "v".to_string());

    let err = h.service.create_configuration(config).await.unwrap_err();
    let errors = err.validation_errors().unwrap();
    assert!(errors.has_field("base_config.task_queue_size"));
    assert!(errors.has_field("labels.bad key!"));
}

#[tokio::test]
async fn test_disabled_agent_type_is_incompatible_on_create() {
    let policy = ValidationPolicy {
        disabled_agent_types: vec!["gateway".to_string()],
        ..Default::default()
    };
    let h = harness_with(DefaultValidator::new(policy), Duration::from_secs(3600));

    let err = h
        .service
        .create_configuration(AgentConfiguration::new("gw", "gateway"))
        .await
        .unwrap_err();
    assert!(matches!(err, ConfigurationError::Compatibility(ref e) if e.has_field("agent_type")));
}

#[tokio::test]
async fn test_notifier_failure_does_not_fail_operations() {
    let service = ConfigurationService::new(
        Arc::new(InMemoryConfigurationRepository::new()),
        Arc::new(DefaultValidator::default()),
        Arc::new(NoopConfigurationCache),
        Arc::new(FailingNotifier),
    );

    let created = service.create_configuration(worker("w")).await.unwrap();
    let updated = service.update_configuration(created.clone()).await.unwrap();
    service.apply_configuration("agent-1", &updated.id).await.unwrap();
    service.delete_configuration(&created.id).await.unwrap();
}

#[tokio::test]
async fn test_create_publishes_event() {
    let h = harness();
    let mut events = h.event_bus.subscribe();

    let created = h.service.create_configuration(worker("w")).await.unwrap();
    let event = timeout(Duration::from_secs(1), events.recv()).await.unwrap().unwrap();
    match event {
        ConfigurationEvent::ConfigurationCreated {
            configuration_id,
            name,
            ..
        } => {
            assert_eq!(configuration_id, created.id);
            assert_eq!(name, "w");
        }
        other => panic!("unexpected event {other:?}"),
    }
}

// ── read / cache ──

#[tokio::test]
async fn test_cache_hit_avoids_repository_read() {
    let h = harness();
    let created = h.service.create_configuration(worker("w")).await.unwrap();

    let fetched = h.service.get_configuration(&created.id).await.unwrap();
    assert_eq!(fetched, created);
    assert_eq!(h.repository.gets(), 0);
}

#[tokio::test]
async fn test_expired_cache_entry_falls_through_to_repository() {
    let h = harness_with(DefaultValidator::default(), Duration::from_millis(20));
    let created = h.service.create_configuration(worker("w")).await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    h.service.get_configuration(&created.id).await.unwrap();
    assert_eq!(h.repository.gets(), 1);

    // Repopulated by the read-through.
    h.service.get_configuration(&created.id).await.unwrap();
    assert_eq!(h.repository.gets(), 1);
}

#[tokio::test]
async fn test_get_missing_is_not_found() {
    let h = harness();
    let missing = ConfigurationId::new();
    assert!(matches!(
        h.service.get_configuration(&missing).await,
        Err(ConfigurationError::NotFound(ref id)) if id == &missing
    ));
}

// ── update ──

#[tokio::test]
async fn test_update_restores_immutable_fields_and_bumps_revision() {
    let h = harness();
    let created = h
        .service
        .create_configuration_as(worker("w"), Some("alice"))
        .await
        .unwrap();

    let mut change = created.clone();
    change.description = "tuned".to_string();
    change.created_at = None;
    change.created_by = Some("mallory".to_string());

    let updated = h.service.update_configuration(change).await.unwrap();
    assert_eq!(updated.revision, 1);
    assert_eq!(updated.created_at, created.created_at);
    assert_eq!(updated.created_by.as_deref(), Some("alice"));
    assert!(updated.updated_at >= created.updated_at);
    assert_eq!(updated.version, created.version);
}

#[tokio::test]
async fn test_invalid_update_leaves_stored_version_unchanged() {
    let h = harness();
    let created = h.service.create_configuration(worker("w")).await.unwrap();

    let mut change = created.clone();
    change.runtime_config.logging.output = "file".to_string();
    change.runtime_config.logging.file_path.clear();

    let err = h.service.update_configuration(change).await.unwrap_err();
    assert!(err
        .validation_errors()
        .unwrap()
        .has_field("runtime_config.logging.file_path"));

    let stored = h.service.get_configuration(&created.id).await.unwrap();
    assert_eq!(stored, created);
    assert_eq!(h.service.get_configuration_versions(&created.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_stale_revision_update_conflicts() {
    let h = harness();
    let created = h.service.create_configuration(worker("w")).await.unwrap();

    let mut first = created.clone();
    first.description = "first".to_string();
    h.service.update_configuration(first).await.unwrap();

    let mut stale = created.clone();
    stale.description = "stale".to_string();
    match h.service.update_configuration(stale).await {
        Err(ConfigurationError::Conflict {
            id,
            expected,
            actual,
        }) => {
            assert_eq!(id, created.id);
            assert_eq!(expected, 0);
            assert_eq!(actual, 1);
        }
        other => panic!("expected conflict, got {other:?}"),
    }

    let stored = h.service.get_configuration(&created.id).await.unwrap();
    assert_eq!(stored.description, "first");
}

#[tokio::test]
async fn test_update_missing_is_not_found() {
    let h = harness();
    let mut ghost = worker("ghost");
    ghost.id = ConfigurationId::new();
    assert!(matches!(
        h.service.update_configuration(ghost).await,
        Err(ConfigurationError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_version_history_grows_on_update() {
    let h = harness();
    let mut current = h.service.create_configuration(worker("w")).await.unwrap();

    for replicas in [2, 3] {
        current.deployment_config.replicas = replicas;
        current = h.service.update_configuration(current).await.unwrap();
    }

    let versions = h.service.get_configuration_versions(&current.id).await.unwrap();
    let replicas: Vec<_> = versions.iter().map(|v| v.deployment_config.replicas).collect();
    assert_eq!(replicas, vec![3, 2, 1]);
    assert!(h
        .service
        .get_configuration_versions(&ConfigurationId::new())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_concurrent_updates_to_one_configuration_serialize() {
    let h = harness();
    let created = h.service.create_configuration(worker("w")).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let service = h.service.clone();
        let mut change = created.clone();
        change.description = format!("writer {i}");
        handles.push(tokio::spawn(async move { service.update_configuration(change).await }));
    }

    let mut successes = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(ConfigurationError::Conflict { .. }) => conflicts += 1,
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }
    assert_eq!(successes, 1);
    assert_eq!(conflicts, 7);
}

#[tokio::test]
async fn test_updates_to_different_configurations_all_succeed() {
    let h = harness();
    let mut created = Vec::new();
    for i in 0..8 {
        created.push(h.service.create_configuration(worker(&format!("w{i}"))).await.unwrap());
    }

    let updates = created.into_iter().map(|mut config| {
        let service = h.service.clone();
        config.description = "parallel".to_string();
        async move { service.update_configuration(config).await }
    });
    for result in futures::future::join_all(updates).await {
        assert_eq!(result.unwrap().revision, 1);
    }
}

#[tokio::test]
async fn test_duplicate_create_keeps_updates_serialized() {
    let h = harness();
    let created = h.service.create_configuration(worker("w")).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let service = h.service.clone();
        let mut change = created.clone();
        change.description = format!("writer {i}");
        handles.push(tokio::spawn(async move { service.update_configuration(change).await }));
    }

    let mut duplicate = worker("imposter");
    duplicate.id = created.id.clone();
    assert!(matches!(
        h.service.create_configuration(duplicate).await,
        Err(ConfigurationError::Persistence { operation: "store", .. })
    ));

    let mut successes = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(ConfigurationError::Conflict { .. }) => conflicts += 1,
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }
    assert_eq!(successes, 1);
    assert_eq!(conflicts, 7);

    let stored = h.service.get_configuration(&created.id).await.unwrap();
    assert_eq!(stored.name, "w");
    assert_eq!(stored.revision, 1);
}

#[tokio::test]
async fn test_read_racing_update_does_not_recache_stale_document() {
    let repository = Arc::new(CountingRepository::stalling(Duration::from_millis(200)));

    // Stored behind the service's back, as rows left by an earlier process are.
    let mut seeded = worker("seeded");
    seeded.id = ConfigurationId::new();
    seeded.description = "old".to_string();
    repository.store(&seeded).await.unwrap();

    let h = harness_on(repository, DefaultValidator::default(), Duration::from_secs(3600));

    let reader = {
        let service = h.service.clone();
        let id = seeded.id.clone();
        tokio::spawn(async move { service.get_configuration(&id).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut change = seeded.clone();
    change.description = "new".to_string();
    let updated = h.service.update_configuration(change).await.unwrap();

    let read = reader.await.unwrap().unwrap();
    assert_eq!(read.description, "old");
    assert_eq!(read.revision, 0);

    let current = h.service.get_configuration(&seeded.id).await.unwrap();
    assert_eq!(current.description, "new");
    assert_eq!(current.revision, updated.revision);
    assert_eq!(h.repository.gets(), 2);
}

// ── delete ──

#[tokio::test]
async fn test_delete_invalidates_cache_and_history() {
    let h = harness();
    let mut events = h.event_bus.subscribe();
    let created = h.service.create_configuration(worker("w")).await.unwrap();
    h.service.delete_configuration(&created.id).await.unwrap();

    assert!(matches!(
        h.service.get_configuration(&created.id).await,
        Err(ConfigurationError::NotFound(_))
    ));
    assert!(h.service.get_configuration_versions(&created.id).await.unwrap().is_empty());
    assert!(matches!(
        h.service.delete_configuration(&created.id).await,
        Err(ConfigurationError::NotFound(_))
    ));

    events.recv().await.unwrap();
    assert!(matches!(
        events.recv().await.unwrap(),
        ConfigurationEvent::ConfigurationDeleted { .. }
    ));
}

// ── list ──

#[tokio::test]
async fn test_list_by_type_and_label_newest_first() {
    let h = harness();
    let specs = [
        ("alpha", "worker", "prod"),
        ("bravo", "worker", "dev"),
        ("charlie", "monitor", "prod"),
        ("delta", "worker", "prod"),
    ];
    for (name, agent_type, env) in specs {
        h.service
            .create_configuration(AgentConfiguration::new(name, agent_type).with_label("env", env))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let mut filter = ListFilter {
        agent_type: Some("worker".to_string()),
        ..Default::default()
    };
    filter.labels.insert("env".to_string(), "prod".to_string());

    let names: Vec<_> = h
        .service
        .list_configurations(&filter)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["delta", "alpha"]);

    let by_label = h
        .service
        .get_configurations_by_labels(&BTreeMap::from([("env".to_string(), "prod".to_string())]))
        .await
        .unwrap();
    assert_eq!(by_label.len(), 3);
    assert_eq!(by_label[0].name, "delta");
}

// ── clone / export / import ──

#[tokio::test]
async fn test_clone_resets_identity() {
    let h = harness();
    let mut source = worker("source").with_label("env", "prod");
    source.version = "2.3.1".to_string();
    source.deployment_config.replicas = 4;
    let source = h.service.create_configuration(source).await.unwrap();

    let clone = h.service.clone_configuration(&source.id, "copy").await.unwrap();
    assert_ne!(clone.id, source.id);
    assert_eq!(clone.version, "1.0.0");
    assert_eq!(clone.name, "copy");

    let mut expected = without_identity(source);
    expected.name = "copy".to_string();
    expected.version = "1.0.0".to_string();
    assert_eq!(without_identity(clone), expected);
}

#[tokio::test]
async fn test_export_import_round_trip() {
    let h = harness();
    let mut config = worker("exported").with_label("team", "core");
    config.description = "round trip".to_string();
    config.environment_variables.insert("RUST_LOG".to_string(), "debug".to_string());
    config.deployment_config.resources.requests.cpu = "250m".to_string();
    config.deployment_config.resources.limits.memory = "1Gi".to_string();
    let original = h.service.create_configuration(config).await.unwrap();

    for format in [ExportFormat::Json, ExportFormat::Yaml] {
        let data = h.service.export_configuration(&original.id, format).await.unwrap();
        let imported = h.service.import_configuration(&data, format).await.unwrap();

        assert_ne!(imported.id, original.id, "{format} import must mint a new id");
        assert_eq!(without_identity(imported), without_identity(original.clone()));
    }
}

#[tokio::test]
async fn test_import_rejects_malformed_input() {
    let h = harness();
    assert!(matches!(
        h.service.import_configuration("{ not json", ExportFormat::Json).await,
        Err(ConfigurationError::Serialization(_))
    ));
}

// ── validate / apply ──

#[tokio::test]
async fn test_validate_configuration_aggregates_both_passes() {
    let h = harness();
    let mut config = worker("w");
    config.base_config.max_concurrent_tasks = 0;
    config.deployment_config.resources.requests.cpu = "lots".to_string();

    let err = h.service.validate_configuration(&config).unwrap_err();
    let errors = err.validation_errors().unwrap();
    assert!(errors.has_field("base_config.max_concurrent_tasks"));
    assert!(errors.has_field("deployment_config.resources.requests.cpu"));
    assert!(h.service.validate_configuration(&worker("ok")).is_ok());
}

#[tokio::test]
async fn test_apply_hands_off_to_runtime() {
    let runtime = Arc::new(RecordingRuntime::default());
    let event_bus = EventBus::new(16);
    let service = ConfigurationService::new(
        Arc::new(InMemoryConfigurationRepository::new()),
        Arc::new(DefaultValidator::default()),
        Arc::new(InMemoryConfigurationCache::new(16)),
        Arc::new(EventBusNotifier::new(event_bus.clone())),
    )
    .with_runtime(runtime.clone());

    let created = service.create_configuration(worker("w")).await.unwrap();
    let mut events = event_bus.subscribe();

    service.apply_configuration("agent-7", &created.id).await.unwrap();
    assert_eq!(
        runtime.applied.lock().clone(),
        vec![("agent-7".to_string(), created.id.clone())]
    );
    assert!(matches!(
        events.recv().await.unwrap(),
        ConfigurationEvent::ConfigurationApplied { ref agent_id, .. } if agent_id == "agent-7"
    ));

    assert!(matches!(
        service.apply_configuration("ghost", &created.id).await,
        Err(ConfigurationError::Runtime(_))
    ));
}

#[tokio::test]
async fn test_apply_fails_when_resources_unavailable() {
    let validator = DefaultValidator::default().with_resource_checker(Arc::new(NoCpuChecker));
    let service = ConfigurationService::new(
        Arc::new(InMemoryConfigurationRepository::new()),
        Arc::new(validator),
        Arc::new(NoopConfigurationCache),
        Arc::new(TracingNotifier),
    );

    let mut config = worker("w");
    config.deployment_config.resources.requests.cpu = "500m".to_string();
    let created = service.create_configuration(config).await.unwrap();

    match service.apply_configuration("agent-1", &created.id).await {
        Err(ConfigurationError::ResourceUnavailable(errors)) => {
            assert!(errors.has_field("deployment_config.resources.requests.cpu"));
        }
        other => panic!("expected resource error, got {other:?}"),
    }
}
