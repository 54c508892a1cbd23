//! Lazily resolved watcher constructors.
//!
//! Each resource type is bound at start-up to a loader. The loader runs the
//! first time the type is actually watched and the constructor it yields is
//! cached for every later lookup.

use std::fmt;
use std::sync::{Arc, OnceLock};

use super::types::ResourceType;
use super::watcher::ResourceWatcher;

/// Builds a fresh watcher instance for one (observer, resource type) pair.
pub type WatcherConstructor = Arc<dyn Fn() -> Arc<dyn ResourceWatcher> + Send + Sync>;

/// Produces the constructor on first use.
pub type WatcherLoader = Box<dyn Fn() -> WatcherConstructor + Send + Sync>;

/// Binding from a resource type to the constructor of its watcher.
pub struct FactoryBinding {
    resource_type: ResourceType,
    loader: WatcherLoader,
    resolved: OnceLock<WatcherConstructor>,
}

impl FactoryBinding {
    pub fn new(resource_type: ResourceType, loader: WatcherLoader) -> Self {
        Self {
            resource_type,
            loader,
            resolved: OnceLock::new(),
        }
    }

    /// Bind a type directly to a constructor closure.
    pub fn from_fn<F, W>(resource_type: ResourceType, constructor: F) -> Self
    where
        F: Fn() -> W + Send + Sync + 'static,
        W: ResourceWatcher + 'static,
    {
        let constructor: WatcherConstructor =
            Arc::new(move || Arc::new(constructor()) as Arc<dyn ResourceWatcher>);
        Self::new(resource_type, Box::new(move || constructor.clone()))
    }

    pub fn resource_type(&self) -> &ResourceType {
        &self.resource_type
    }

    /// Resolve the constructor, running the loader only on first use.
    pub fn resolve(&self) -> WatcherConstructor {
        self.resolved
            .get_or_init(|| {
                crate::debug_event!("factory", "resolved", "{}", self.resource_type);
                (self.loader)()
            })
            .clone()
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }
}

impl fmt::Debug for FactoryBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryBinding")
            .field("resource_type", &self.resource_type)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}
