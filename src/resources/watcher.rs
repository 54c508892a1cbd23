//! Watcher contract and the callbacks handed to each watcher.

use std::any::Any;
use std::sync::{Arc, Weak};

use async_trait::async_trait;

use super::error::WatcherError;
use super::observer::Observer;
use super::types::Resource;

/// Sink for a batch of resources.
pub type ResourceSink = Arc<dyn Fn(Vec<Resource>) + Send + Sync>;

/// The three notification sinks passed to a watcher at start-up.
#[derive(Clone)]
pub struct ResourceCallbacks {
    pub on_available: ResourceSink,
    pub on_updated: ResourceSink,
    pub on_destroyed: ResourceSink,
}

impl ResourceCallbacks {
    /// Forward every notification to `observer` for as long as it is alive.
    ///
    /// Only a weak reference is held, so a watcher outliving its observer
    /// silently drops further notifications.
    pub fn for_observer(observer: Weak<dyn Observer>) -> Self {
        let available = observer.clone();
        let updated = observer.clone();
        let destroyed = observer;

        Self {
            on_available: Arc::new(move |resources| {
                if let Some(observer) = available.upgrade() {
                    observer.notify_resource_available(resources);
                }
            }),
            on_updated: Arc::new(move |resources| {
                if let Some(observer) = updated.upgrade() {
                    observer.notify_resource_updated(resources);
                }
            }),
            on_destroyed: Arc::new(move |resources| {
                if let Some(observer) = destroyed.upgrade() {
                    observer.notify_resource_destroyed(resources);
                }
            }),
        }
    }

    pub fn available(&self, resources: Vec<Resource>) {
        (self.on_available)(resources)
    }

    pub fn updated(&self, resources: Vec<Resource>) {
        (self.on_updated)(resources)
    }

    pub fn destroyed(&self, resources: Vec<Resource>) {
        (self.on_destroyed)(resources)
    }
}

/// Detects and reports resources of one type on behalf of one observer.
///
/// Implementations use interior mutability; the registry only ever holds
/// them behind a shared handle.
#[async_trait]
pub trait ResourceWatcher: Send + Sync + Any {
    /// Start watching.
    ///
    /// Resources that already exist must be delivered through
    /// `callbacks.on_available` before this returns.
    async fn watch(
        &self,
        observer: &dyn Observer,
        callbacks: ResourceCallbacks,
    ) -> Result<(), WatcherError>;

    /// Stop future notifications and release anything the watcher holds.
    fn destroy(&self) -> Result<(), WatcherError>;
}

/// Shared handle to a live watcher, as tracked by a lifetime table.
#[derive(Clone)]
pub struct WatcherHandle(Arc<dyn ResourceWatcher>);

impl WatcherHandle {
    pub fn new(watcher: Arc<dyn ResourceWatcher>) -> Self {
        Self(watcher)
    }

    /// Access the concrete watcher to query its accumulated state.
    pub fn downcast_ref<W: ResourceWatcher>(&self) -> Option<&W> {
        let any: &dyn Any = self.0.as_ref();
        any.downcast_ref::<W>()
    }

    pub fn ptr_eq(&self, other: &WatcherHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl std::ops::Deref for WatcherHandle {
    type Target = dyn ResourceWatcher;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("WatcherHandle")
            .field(&Arc::as_ptr(&self.0))
            .finish()
    }
}
