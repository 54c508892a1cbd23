//! Broadcast-backed resource watcher.
//!
//! A [`ResourceSource`] keeps the resources of one type that currently exist
//! and broadcasts every change. A [`BroadcastWatcher`] attached to a source
//! replays the existing resources to its observer, then forwards changes
//! until destroyed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::domain::ObservationDomain;
use super::error::WatcherError;
use super::factory::FactoryBinding;
use super::observer::Observer;
use super::registry::ResourceRegistryBuilder;
use super::types::{Resource, ResourceType};
use super::watcher::{ResourceCallbacks, ResourceWatcher};

#[derive(Debug, Clone)]
pub enum ResourceEvent {
    Available(Vec<Resource>),
    Updated(Vec<Resource>),
    Destroyed(Vec<Resource>),
}

/// Live resources of one type plus a change feed.
pub struct ResourceSource {
    resource_type: ResourceType,
    existing: RwLock<Vec<Resource>>,
    sender: broadcast::Sender<ResourceEvent>,
}

impl ResourceSource {
    /// Create a source with the given channel capacity.
    pub fn new(resource_type: ResourceType, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            resource_type,
            existing: RwLock::new(Vec::new()),
            sender,
        }
    }

    pub fn resource_type(&self) -> &ResourceType {
        &self.resource_type
    }

    pub fn emit_available(&self, resources: Vec<Resource>) {
        let mut existing = self.existing.write();
        existing.extend(resources.iter().cloned());
        self.send(ResourceEvent::Available(resources));
    }

    /// Replace matching existing resources and broadcast the update.
    ///
    /// Resources are matched on their `id` payload field when present.
    pub fn emit_updated(&self, resources: Vec<Resource>) {
        let mut existing = self.existing.write();
        for updated in &resources {
            if let Some(slot) = existing.iter_mut().find(|r| same_resource(r, updated)) {
                *slot = updated.clone();
            }
        }
        self.send(ResourceEvent::Updated(resources));
    }

    pub fn emit_destroyed(&self, resources: Vec<Resource>) {
        let mut existing = self.existing.write();
        existing.retain(|r| !resources.iter().any(|gone| same_resource(r, gone)));
        self.send(ResourceEvent::Destroyed(resources));
    }

    /// Resources that exist right now.
    pub fn existing(&self) -> Vec<Resource> {
        self.existing.read().clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Snapshot and subscribe without missing or repeating a change.
    fn attach(&self) -> (Vec<Resource>, broadcast::Receiver<ResourceEvent>) {
        let existing = self.existing.read();
        (existing.clone(), self.sender.subscribe())
    }

    // Callers hold the `existing` write lock.
    fn send(&self, event: ResourceEvent) {
        match self.sender.send(event) {
            Ok(count) => {
                crate::debug_event!("source", "sent", "{} to {count} watchers", self.resource_type);
            }
            Err(_) => {
                // No watchers attached, nothing to deliver.
                crate::debug_event!("source", "dropped", "no watchers for {}", self.resource_type);
            }
        }
    }
}

fn same_resource(a: &Resource, b: &Resource) -> bool {
    match (a.payload.get("id"), b.payload.get("id")) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Watcher forwarding a [`ResourceSource`] to one observer.
pub struct BroadcastWatcher {
    source: Arc<ResourceSource>,
    task: Mutex<Option<JoinHandle<()>>>,
    delivery: Arc<Delivery>,
}

/// State shared with the forwarding task.
#[derive(Default)]
struct Delivery {
    stopped: AtomicBool,
    /// Held for the duration of each callback; reentrant so a callback may
    /// destroy its own watcher.
    in_flight: ReentrantMutex<()>,
    count: AtomicUsize,
}

impl Delivery {
    /// Run `deliver` unless the watcher was stopped. Returns false once stopped.
    fn run(&self, deliver: impl FnOnce()) -> bool {
        let _in_flight = self.in_flight.lock();
        if self.stopped.load(Ordering::Acquire) {
            return false;
        }
        deliver();
        true
    }

    /// Block further callbacks and wait out the one in progress, if any.
    fn halt(&self) {
        self.stopped.store(true, Ordering::Release);
        drop(self.in_flight.lock());
    }
}

impl BroadcastWatcher {
    pub fn new(source: Arc<ResourceSource>) -> Self {
        Self {
            source,
            task: Mutex::new(None),
            delivery: Arc::new(Delivery::default()),
        }
    }

    /// Number of resources handed to the observer so far, all kinds included.
    pub fn delivered(&self) -> usize {
        self.delivery.count.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    fn stop(&self) {
        self.delivery.halt();
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }
}

#[async_trait]
impl ResourceWatcher for BroadcastWatcher {
    async fn watch(
        &self,
        observer: &dyn Observer,
        callbacks: ResourceCallbacks,
    ) -> Result<(), WatcherError> {
        let (existing, mut receiver) = self.source.attach();
        let resource_type = self.source.resource_type().clone();
        let observer_id = observer.observer_id();
        self.delivery.stopped.store(false, Ordering::Release);

        if !existing.is_empty() {
            self.delivery.count.fetch_add(existing.len(), Ordering::Relaxed);
            crate::debug_event!(
                "watcher",
                "replayed",
                "{} existing {resource_type} to {observer_id}",
                existing.len()
            );
            callbacks.available(existing);
        }

        let delivery = self.delivery.clone();
        let task = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        let (resources, sink) = match event {
                            ResourceEvent::Available(r) => (r, &callbacks.on_available),
                            ResourceEvent::Updated(r) => (r, &callbacks.on_updated),
                            ResourceEvent::Destroyed(r) => (r, &callbacks.on_destroyed),
                        };
                        let forwarded = delivery.run(|| {
                            delivery.count.fetch_add(resources.len(), Ordering::Relaxed);
                            (**sink)(resources);
                        });
                        if !forwarded {
                            crate::debug_event!(
                                "watcher",
                                "stopped",
                                "{resource_type} for {observer_id}"
                            );
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        crate::warn_event!(
                            "watcher",
                            "lagged",
                            "{resource_type} for {observer_id} skipped {n} events"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        crate::debug_event!("watcher", "source closed", "{resource_type}");
                        break;
                    }
                }
            }
        });

        if let Some(previous) = self.task.lock().replace(task) {
            previous.abort();
        }
        Ok(())
    }

    /// Stop forwarding. No callback runs after this returns.
    fn destroy(&self) -> Result<(), WatcherError> {
        self.stop();
        Ok(())
    }
}

impl Drop for BroadcastWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// A set of sources, each bound to the domain that owns its type.
#[derive(Default)]
pub struct ResourceSources {
    sources: IndexMap<ResourceType, (ObservationDomain, Arc<ResourceSource>)>,
}

impl ResourceSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// One source per entry of `layout`.
    pub fn from_layout(
        layout: impl IntoIterator<Item = (ObservationDomain, ResourceType)>,
        capacity: usize,
    ) -> Self {
        let mut sources = Self::new();
        for (domain, resource_type) in layout {
            sources.add(domain, Arc::new(ResourceSource::new(resource_type, capacity)));
        }
        sources
    }

    pub fn add(&mut self, domain: ObservationDomain, source: Arc<ResourceSource>) {
        self.sources
            .insert(source.resource_type().clone(), (domain, source));
    }

    pub fn get(&self, resource_type: &ResourceType) -> Option<&Arc<ResourceSource>> {
        self.sources.get(resource_type).map(|(_, source)| source)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObservationDomain, &Arc<ResourceSource>)> {
        self.sources.values().map(|(domain, source)| (*domain, source))
    }

    /// Bind a [`BroadcastWatcher`] factory for every source.
    pub fn install(&self, mut builder: ResourceRegistryBuilder) -> ResourceRegistryBuilder {
        for (domain, source) in self.iter() {
            let source = source.clone();
            builder = builder.bind(
                domain,
                FactoryBinding::from_fn(source.resource_type().clone(), move || {
                    BroadcastWatcher::new(source.clone())
                }),
            );
        }
        builder
    }
}
