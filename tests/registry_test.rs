use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use resource_watch::resources::{
    ObservationDomain, Observer, ObserverId, RegistryError, Resource, ResourceCallbacks,
    ResourceRegistry, ResourceRegistryBuilder, ResourceType, ResourceWatcher, TargetKind,
    WatcherError,
};

const FRAME: ObservationDomain = ObservationDomain::PerTarget(TargetKind::Frame);

struct RecordingObserver {
    id: ObserverId,
    domain: ObservationDomain,
    available: Mutex<Vec<Resource>>,
    updated: Mutex<Vec<Resource>>,
    destroyed: Mutex<Vec<Resource>>,
}

impl RecordingObserver {
    fn new(domain: ObservationDomain) -> Arc<Self> {
        Arc::new(Self {
            id: ObserverId::next(),
            domain,
            available: Mutex::new(Vec::new()),
            updated: Mutex::new(Vec::new()),
            destroyed: Mutex::new(Vec::new()),
        })
    }

    fn available(&self) -> Vec<Resource> {
        self.available.lock().clone()
    }
}

impl Observer for RecordingObserver {
    fn observer_id(&self) -> ObserverId {
        self.id
    }

    fn domain(&self) -> ObservationDomain {
        self.domain
    }

    fn notify_resource_available(&self, resources: Vec<Resource>) {
        self.available.lock().extend(resources);
    }

    fn notify_resource_updated(&self, resources: Vec<Resource>) {
        self.updated.lock().extend(resources);
    }

    fn notify_resource_destroyed(&self, resources: Vec<Resource>) {
        self.destroyed.lock().extend(resources);
    }
}

/// Counters shared by every watcher a factory builds.
#[derive(Default)]
struct Probe {
    constructed: AtomicUsize,
    started: AtomicUsize,
    destroyed: AtomicUsize,
}

impl Probe {
    fn constructed(&self) -> usize {
        self.constructed.load(Ordering::SeqCst)
    }

    fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("target went away during start-up")]
struct StartError;

#[derive(Clone, Default)]
struct Behavior {
    existing: Vec<Resource>,
    start_delay: Option<Duration>,
    fail_start: bool,
    fail_destroy: bool,
}

struct ProbeWatcher {
    probe: Arc<Probe>,
    behavior: Behavior,
}

#[async_trait]
impl ResourceWatcher for ProbeWatcher {
    async fn watch(
        &self,
        _observer: &dyn Observer,
        callbacks: ResourceCallbacks,
    ) -> Result<(), WatcherError> {
        if let Some(delay) = self.behavior.start_delay {
            tokio::time::sleep(delay).await;
        }
        if self.behavior.fail_start {
            return Err(Box::new(StartError));
        }
        if !self.behavior.existing.is_empty() {
            callbacks.available(self.behavior.existing.clone());
        }
        self.probe.started.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn destroy(&self) -> Result<(), WatcherError> {
        self.probe.destroyed.fetch_add(1, Ordering::SeqCst);
        if self.behavior.fail_destroy {
            return Err("destroy failed".into());
        }
        Ok(())
    }
}

fn factory(probe: &Arc<Probe>, behavior: Behavior) -> impl Fn() -> ProbeWatcher + Send + Sync + 'static {
    let probe = probe.clone();
    move || {
        probe.constructed.fetch_add(1, Ordering::SeqCst);
        ProbeWatcher {
            probe: probe.clone(),
            behavior: behavior.clone(),
        }
    }
}

fn console(id: u64) -> Resource {
    Resource::new(ResourceType::CONSOLE_MESSAGE, json!({ "id": id }))
}

/// console-message, stylesheet, css-change per frame target; network-event process-wide.
struct Fixture {
    registry: ResourceRegistry,
    console: Arc<Probe>,
    stylesheet: Arc<Probe>,
    css: Arc<Probe>,
    network: Arc<Probe>,
}

fn fixture_with(builder: ResourceRegistryBuilder, console_behavior: Behavior) -> Fixture {
    let console = Arc::new(Probe::default());
    let stylesheet = Arc::new(Probe::default());
    let css = Arc::new(Probe::default());
    let network = Arc::new(Probe::default());

    let registry = builder
        .per_target(
            TargetKind::Frame,
            ResourceType::CONSOLE_MESSAGE,
            factory(&console, console_behavior),
        )
        .per_target(
            TargetKind::Frame,
            ResourceType::STYLESHEET,
            factory(&stylesheet, Behavior::default()),
        )
        .per_target(
            TargetKind::Frame,
            ResourceType::CSS_CHANGE,
            factory(&css, Behavior::default()),
        )
        .process_wide(
            ResourceType::NETWORK_EVENT,
            factory(&network, Behavior::default()),
        )
        .build();

    Fixture {
        registry,
        console,
        stylesheet,
        css,
        network,
    }
}

fn fixture() -> Fixture {
    fixture_with(ResourceRegistry::builder(), Behavior::default())
}

#[tokio::test]
async fn test_rewatch_is_idempotent() {
    let f = fixture();
    let observer = RecordingObserver::new(FRAME);

    f.registry
        .watch(&observer, &[ResourceType::CONSOLE_MESSAGE])
        .await
        .unwrap();
    let first = f
        .registry
        .get_active_watcher(&observer, &ResourceType::CONSOLE_MESSAGE)
        .unwrap();

    f.registry
        .watch(&observer, &[ResourceType::CONSOLE_MESSAGE])
        .await
        .unwrap();
    let second = f
        .registry
        .get_active_watcher(&observer, &ResourceType::CONSOLE_MESSAGE)
        .unwrap();

    assert_eq!(f.console.constructed(), 1);
    assert!(first.ptr_eq(&second));
}

#[tokio::test]
async fn test_watch_unwatch_symmetry() {
    let f = fixture();
    let observer = RecordingObserver::new(FRAME);

    f.registry
        .watch(&observer, &[ResourceType::STYLESHEET])
        .await
        .unwrap();
    assert!(f.registry.is_watching(&observer, &ResourceType::STYLESHEET));

    f.registry.unwatch(&observer, &[ResourceType::STYLESHEET]);
    assert!(
        f.registry
            .get_active_watcher(&observer, &ResourceType::STYLESHEET)
            .is_none()
    );

    // Second unwatch is a no-op.
    f.registry.unwatch(&observer, &[ResourceType::STYLESHEET]);
    assert_eq!(f.stylesheet.destroyed(), 1);
}

#[tokio::test]
async fn test_domain_isolation() {
    let f = fixture();
    let all = vec![
        ResourceType::CONSOLE_MESSAGE,
        ResourceType::NETWORK_EVENT,
        ResourceType::STYLESHEET,
    ];

    let process = f
        .registry
        .types_supported_by_domain(&all, ObservationDomain::ProcessWide)
        .unwrap();
    let frame = f.registry.types_supported_by_domain(&all, FRAME).unwrap();

    assert_eq!(process, vec![ResourceType::NETWORK_EVENT]);
    assert_eq!(
        frame,
        vec![ResourceType::CONSOLE_MESSAGE, ResourceType::STYLESHEET]
    );
    assert!(f.registry.has_any_type_for_per_target_domain(&all));
    assert!(
        !f.registry
            .has_any_type_for_per_target_domain(&[ResourceType::NETWORK_EVENT])
    );
}

#[tokio::test]
async fn test_unwatch_all_tears_everything_down() {
    let f = fixture();
    let observer = RecordingObserver::new(FRAME);
    let types = [
        ResourceType::CONSOLE_MESSAGE,
        ResourceType::STYLESHEET,
        ResourceType::CSS_CHANGE,
    ];

    f.registry.watch(&observer, &types).await.unwrap();
    assert_eq!(f.registry.active_types(&observer), types.to_vec());

    f.registry.unwatch_all(&observer);

    for resource_type in &types {
        assert!(f.registry.get_active_watcher(&observer, resource_type).is_none());
    }
    assert_eq!(f.console.destroyed(), 1);
    assert_eq!(f.stylesheet.destroyed(), 1);
    assert_eq!(f.css.destroyed(), 1);

    // Idempotent.
    f.registry.unwatch_all(&observer);
    assert_eq!(f.console.destroyed(), 1);
}

#[tokio::test]
async fn test_unknown_type_fails_and_installs_nothing() {
    let f = fixture();
    let observer = RecordingObserver::new(FRAME);

    let err = f
        .registry
        .watch(&observer, &[ResourceType::new("totally-bogus")])
        .await
        .unwrap_err();

    assert!(matches!(
        &err,
        RegistryError::UnknownResourceType { resource_type } if resource_type.as_str() == "totally-bogus"
    ));
    for catalog in f.registry.catalogs().all() {
        for entry in catalog.entries() {
            assert!(entry.watchers().is_empty());
        }
    }
}

#[tokio::test]
async fn test_existing_resources_arrive_before_watch_resolves() {
    let behavior = Behavior {
        existing: vec![console(1), console(2)],
        start_delay: Some(Duration::from_millis(5)),
        ..Default::default()
    };
    let f = fixture_with(ResourceRegistry::builder(), behavior);
    let observer = RecordingObserver::new(FRAME);

    f.registry
        .watch(&observer, &[ResourceType::CONSOLE_MESSAGE])
        .await
        .unwrap();

    assert_eq!(observer.available(), vec![console(1), console(2)]);
}

#[tokio::test]
async fn test_per_target_observer_drops_process_wide_types() {
    let f = fixture();
    let observer = RecordingObserver::new(FRAME);

    f.registry
        .watch(
            &observer,
            &[ResourceType::CONSOLE_MESSAGE, ResourceType::NETWORK_EVENT],
        )
        .await
        .unwrap();

    assert!(f.registry.is_watching(&observer, &ResourceType::CONSOLE_MESSAGE));
    assert!(
        f.registry
            .get_active_watcher(&observer, &ResourceType::NETWORK_EVENT)
            .is_none()
    );
    assert_eq!(f.network.constructed(), 0);
}

#[tokio::test]
async fn test_process_wide_observer() {
    let f = fixture();
    let observer = RecordingObserver::new(ObservationDomain::ProcessWide);

    f.registry
        .watch(&observer, &[ResourceType::NETWORK_EVENT])
        .await
        .unwrap();
    assert_eq!(
        f.registry.active_types(&observer),
        vec![ResourceType::NETWORK_EVENT]
    );
}

#[tokio::test]
async fn test_process_wide_observer_rejects_per_target_type() {
    let f = fixture();
    let observer = RecordingObserver::new(ObservationDomain::ProcessWide);

    let err = f
        .registry
        .watch(
            &observer,
            &[ResourceType::NETWORK_EVENT, ResourceType::CONSOLE_MESSAGE],
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RegistryError::UnsupportedDomain {
            domain: ObservationDomain::ProcessWide
        }
    ));
    // Types started before the rejected one stay installed.
    assert!(f.registry.is_watching(&observer, &ResourceType::NETWORK_EVENT));
    assert!(!f.registry.is_watching(&observer, &ResourceType::CONSOLE_MESSAGE));
    assert_eq!(f.console.constructed(), 0);
}

#[tokio::test]
async fn test_unsupported_target_kind() {
    let f = fixture();
    let observer = RecordingObserver::new(ObservationDomain::PerTarget(TargetKind::Worker));

    let err = f
        .registry
        .watch(&observer, &[ResourceType::CONSOLE_MESSAGE])
        .await
        .unwrap_err();

    assert!(matches!(err, RegistryError::UnsupportedDomain { .. }));
    assert!(
        f.registry
            .types_supported_by_domain(&[ResourceType::CONSOLE_MESSAGE], observer.domain())
            .is_err()
    );
}

#[tokio::test]
async fn test_watcher_failure_keeps_earlier_types() {
    let behavior = Behavior {
        fail_start: true,
        ..Default::default()
    };
    let f = fixture_with(ResourceRegistry::builder(), behavior);
    let observer = RecordingObserver::new(FRAME);

    let err = f
        .registry
        .watch(
            &observer,
            &[
                ResourceType::STYLESHEET,
                ResourceType::CONSOLE_MESSAGE,
                ResourceType::CSS_CHANGE,
            ],
        )
        .await
        .unwrap_err();

    assert_eq!(err.resource_type(), Some(&ResourceType::CONSOLE_MESSAGE));
    let source = err.into_watcher_error().unwrap();
    assert!(source.downcast_ref::<StartError>().is_some());

    assert!(f.registry.is_watching(&observer, &ResourceType::STYLESHEET));
    assert!(!f.registry.is_watching(&observer, &ResourceType::CONSOLE_MESSAGE));
    assert!(!f.registry.is_watching(&observer, &ResourceType::CSS_CHANGE));
    // The failed watcher is shut down, not leaked.
    assert_eq!(f.console.destroyed(), 1);
    assert_eq!(f.css.constructed(), 0);
}

#[tokio::test]
async fn test_unwatch_all_continues_past_failed_destroy() {
    let behavior = Behavior {
        fail_destroy: true,
        ..Default::default()
    };
    let f = fixture_with(ResourceRegistry::builder(), behavior);
    let observer = RecordingObserver::new(FRAME);

    f.registry
        .watch(
            &observer,
            &[ResourceType::CONSOLE_MESSAGE, ResourceType::STYLESHEET],
        )
        .await
        .unwrap();

    f.registry.unwatch_all(&observer);

    assert_eq!(f.console.destroyed(), 1);
    assert_eq!(f.stylesheet.destroyed(), 1);
    assert!(f.registry.active_types(&observer).is_empty());
}

#[tokio::test]
async fn test_concurrent_watch_is_single_flight() {
    let behavior = Behavior {
        start_delay: Some(Duration::from_millis(20)),
        ..Default::default()
    };
    let f = fixture_with(ResourceRegistry::builder(), behavior);
    let observer = RecordingObserver::new(FRAME);
    let types = [ResourceType::CONSOLE_MESSAGE];

    let (a, b) = tokio::join!(
        f.registry.watch(&observer, &types),
        f.registry.watch(&observer, &types)
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(f.console.constructed(), 1);
    assert_eq!(f.console.destroyed(), 0);
    assert!(f.registry.is_watching(&observer, &ResourceType::CONSOLE_MESSAGE));
}

#[tokio::test]
async fn test_concurrent_watch_without_gate_destroys_duplicate() {
    let behavior = Behavior {
        start_delay: Some(Duration::from_millis(20)),
        ..Default::default()
    };
    let f = fixture_with(ResourceRegistry::builder().single_flight(false), behavior);
    let observer = RecordingObserver::new(FRAME);
    let types = [ResourceType::CONSOLE_MESSAGE];

    let (a, b) = tokio::join!(
        f.registry.watch(&observer, &types),
        f.registry.watch(&observer, &types)
    );
    a.unwrap();
    b.unwrap();

    // Both raced past the lookup; the loser was shut down instead of orphaned.
    assert_eq!(f.console.constructed(), 2);
    assert_eq!(f.console.destroyed(), 1);

    f.registry.unwatch_all(&observer);
    assert_eq!(f.console.destroyed(), 2);
}

#[tokio::test]
async fn test_observers_do_not_share_watchers() {
    let f = fixture();
    let a = RecordingObserver::new(FRAME);
    let b = RecordingObserver::new(FRAME);

    f.registry
        .watch(&a, &[ResourceType::CONSOLE_MESSAGE])
        .await
        .unwrap();
    f.registry
        .watch(&b, &[ResourceType::CONSOLE_MESSAGE])
        .await
        .unwrap();
    assert_eq!(f.console.constructed(), 2);

    f.registry.unwatch_all(&a);
    assert!(!f.registry.is_watching(&a, &ResourceType::CONSOLE_MESSAGE));
    assert!(f.registry.is_watching(&b, &ResourceType::CONSOLE_MESSAGE));
}

#[tokio::test]
async fn test_registry_does_not_keep_observer_alive() {
    let behavior = Behavior {
        existing: vec![console(7)],
        ..Default::default()
    };
    let f = fixture_with(ResourceRegistry::builder(), behavior);
    let observer = RecordingObserver::new(FRAME);

    f.registry
        .watch(&observer, &[ResourceType::CONSOLE_MESSAGE])
        .await
        .unwrap();

    assert_eq!(Arc::strong_count(&observer), 1);
    f.registry.unwatch_all(&observer);
}

#[tokio::test]
async fn test_factory_resolves_lazily() {
    let f = fixture();
    let observer = RecordingObserver::new(FRAME);
    let binding_resolved = |registry: &ResourceRegistry| {
        registry
            .catalog(FRAME)
            .unwrap()
            .get(&ResourceType::STYLESHEET)
            .unwrap()
            .binding()
            .is_resolved()
    };

    assert!(!binding_resolved(&f.registry));
    f.registry
        .watch(&observer, &[ResourceType::STYLESHEET])
        .await
        .unwrap();
    assert!(binding_resolved(&f.registry));
}

#[tokio::test]
async fn test_active_watcher_downcast() {
    let f = fixture();
    let observer = RecordingObserver::new(FRAME);

    f.registry
        .watch(&observer, &[ResourceType::CSS_CHANGE])
        .await
        .unwrap();

    let handle = f
        .registry
        .get_active_watcher(&observer, &ResourceType::CSS_CHANGE)
        .unwrap();
    let watcher = handle.downcast_ref::<ProbeWatcher>().unwrap();
    assert_eq!(watcher.probe.started.load(Ordering::SeqCst), 1);
}
