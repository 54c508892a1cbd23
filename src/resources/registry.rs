//! Public orchestration: start and stop resource watchers for observers.

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::config::RegistryConfig;

use super::domain::{Catalog, CatalogEntry, Catalogs, ObservationDomain, TargetKind};
use super::error::{RegistryError, RegistryResult};
use super::factory::FactoryBinding;
use super::observer::{Observer, ObserverId};
use super::types::ResourceType;
use super::watcher::{ResourceCallbacks, ResourceWatcher, WatcherHandle};

/// Registry of resource watchers across every observation domain.
///
/// At most one watcher is live per (observer, resource type). Observers are
/// tracked by id only; their owner must call [`unwatch_all`](Self::unwatch_all)
/// when discarding one.
pub struct ResourceRegistry {
    catalogs: Catalogs,
    /// Per-observer gate serializing concurrent `watch` calls.
    gates: DashMap<ObserverId, Arc<Mutex<()>>>,
    single_flight: bool,
}

impl ResourceRegistry {
    pub fn builder() -> ResourceRegistryBuilder {
        ResourceRegistryBuilder::new()
    }

    /// Start watching `resource_types` for `observer`.
    ///
    /// Types are started in order. Each watcher delivers the resources that
    /// already exist before its start-up resolves, so they all reach the
    /// observer before this returns. A per-target observer silently skips
    /// types owned by another domain; a process-wide observer fails with
    /// [`RegistryError::UnsupportedDomain`]. Types no catalog knows fail the
    /// call. A failure leaves the types installed before it in place.
    pub async fn watch<O>(
        &self,
        observer: &Arc<O>,
        resource_types: &[ResourceType],
    ) -> RegistryResult<()>
    where
        O: Observer + 'static,
    {
        let domain = observer.domain();
        let catalog = self.catalogs.resolve(domain)?;
        let id = observer.observer_id();

        let _gate = if self.single_flight {
            Some(self.gate(id).lock_owned().await)
        } else {
            None
        };

        let weak: Weak<O> = Arc::downgrade(observer);
        let weak: Weak<dyn Observer> = weak;

        for resource_type in resource_types {
            let Some(entry) = catalog.get(resource_type) else {
                if !self.catalogs.is_known(resource_type) {
                    return Err(RegistryError::UnknownResourceType {
                        resource_type: resource_type.clone(),
                    });
                }
                // Per-target observers only receive the types their target owns.
                if !domain.is_per_target() {
                    return Err(RegistryError::UnsupportedDomain { domain });
                }
                crate::debug_event!("registry", "dropped", "{resource_type} not owned by {domain}");
                continue;
            };

            if entry.watchers().has(id) {
                crate::debug_event!("registry", "already watching", "{resource_type} for {id}");
                continue;
            }

            let watcher = (entry.binding().resolve())();
            let callbacks = ResourceCallbacks::for_observer(weak.clone());

            if let Err(source) = watcher.watch(&**observer, callbacks).await {
                shutdown_abandoned(resource_type, id, watcher.as_ref());
                return Err(RegistryError::WatcherFailure {
                    resource_type: resource_type.clone(),
                    source,
                });
            }

            if let Err(rejected) = entry.watchers().insert(id, WatcherHandle::new(watcher)) {
                crate::warn_event!(
                    "registry",
                    "duplicate watcher",
                    "{resource_type} for {id}, keeping the first"
                );
                shutdown_abandoned(resource_type, id, &*rejected);
                continue;
            }

            crate::log_event!("registry", "watching", "{resource_type} for {id} ({domain})");
        }

        Ok(())
    }

    /// Stop watching `resource_types` for `observer`.
    ///
    /// Types that are not watched, or not owned by the observer's domain,
    /// are ignored.
    pub fn unwatch<O>(&self, observer: &O, resource_types: &[ResourceType])
    where
        O: Observer + ?Sized,
    {
        let Some(catalog) = self.catalog_for(observer.domain(), "unwatch") else {
            return;
        };
        let id = observer.observer_id();

        for resource_type in resource_types {
            match catalog.get(resource_type) {
                Some(entry) => release(entry, id),
                None => crate::debug_event!(
                    "registry",
                    "unwatch ignored",
                    "{resource_type} not owned by {}",
                    catalog.domain()
                ),
            }
        }
    }

    /// Stop every watcher of `observer` in its domain.
    ///
    /// Keeps going when a watcher fails to shut down. Safe to call repeatedly.
    pub fn unwatch_all<O>(&self, observer: &O)
    where
        O: Observer + ?Sized,
    {
        let id = observer.observer_id();
        // A gate still held by an in-flight watch stays in place.
        self.gates.remove_if(&id, |_, gate| Arc::strong_count(gate) == 1);

        let Some(catalog) = self.catalog_for(observer.domain(), "unwatch_all") else {
            return;
        };

        for entry in catalog.entries() {
            release(entry, id);
        }
        crate::debug_event!("registry", "released all", "{id}");
    }

    /// Live watcher servicing `observer` for `resource_type`, if any.
    pub fn get_active_watcher<O>(
        &self,
        observer: &O,
        resource_type: &ResourceType,
    ) -> Option<WatcherHandle>
    where
        O: Observer + ?Sized,
    {
        self.catalogs
            .resolve(observer.domain())
            .ok()?
            .get(resource_type)?
            .watchers()
            .get(observer.observer_id())
    }

    pub fn is_watching<O>(&self, observer: &O, resource_type: &ResourceType) -> bool
    where
        O: Observer + ?Sized,
    {
        self.get_active_watcher(observer, resource_type).is_some()
    }

    /// Resource types currently watched for `observer`, in catalog order.
    pub fn active_types<O>(&self, observer: &O) -> Vec<ResourceType>
    where
        O: Observer + ?Sized,
    {
        let id = observer.observer_id();
        self.catalogs
            .resolve(observer.domain())
            .map(|catalog| {
                catalog
                    .entries()
                    .filter(|entry| entry.watchers().has(id))
                    .map(|entry| entry.watchers().resource_type().clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Requested types owned by `domain`, in request order.
    pub fn types_supported_by_domain(
        &self,
        resource_types: &[ResourceType],
        domain: ObservationDomain,
    ) -> RegistryResult<Vec<ResourceType>> {
        self.catalogs.filter_supported_types(resource_types, domain)
    }

    /// Requested types owned by the process-wide domain.
    pub fn process_wide_types(&self, resource_types: &[ResourceType]) -> Vec<ResourceType> {
        self.catalogs.process_wide().filter_supported(resource_types)
    }

    /// Whether any per-target domain owns at least one requested type.
    pub fn has_any_type_for_per_target_domain(&self, resource_types: &[ResourceType]) -> bool {
        self.catalogs.per_target().any(|catalog| {
            resource_types
                .iter()
                .any(|resource_type| catalog.contains(resource_type))
        })
    }

    pub fn catalog(&self, domain: ObservationDomain) -> RegistryResult<&Catalog> {
        self.catalogs.resolve(domain)
    }

    pub fn catalogs(&self) -> &Catalogs {
        &self.catalogs
    }

    fn gate(&self, id: ObserverId) -> Arc<Mutex<()>> {
        self.gates.entry(id).or_default().clone()
    }

    fn catalog_for(&self, domain: ObservationDomain, operation: &str) -> Option<&Catalog> {
        match self.catalogs.resolve(domain) {
            Ok(catalog) => Some(catalog),
            Err(e) => {
                crate::warn_event!("registry", "ignored", "{operation}: {e}");
                None
            }
        }
    }
}

/// Remove and destroy the watcher for `id`, logging shutdown failures.
fn release(entry: &CatalogEntry, id: ObserverId) {
    let resource_type = entry.watchers().resource_type();
    match entry.watchers().remove(id) {
        Ok(true) => crate::debug_event!("registry", "unwatched", "{resource_type} for {id}"),
        Ok(false) => {}
        Err(e) => {
            crate::warn_event!("registry", "shutdown failed", "{resource_type} for {id}: {e}")
        }
    }
}

/// Shut down a watcher that never made it into a lifetime table.
fn shutdown_abandoned(resource_type: &ResourceType, id: ObserverId, watcher: &dyn ResourceWatcher) {
    if let Err(e) = watcher.destroy() {
        crate::warn_event!(
            "registry",
            "shutdown failed",
            "abandoned {resource_type} for {id}: {e}"
        );
    }
}

/// Builder for constructing a ResourceRegistry.
pub struct ResourceRegistryBuilder {
    catalogs: Catalogs,
    disabled: Vec<ResourceType>,
    single_flight: bool,
}

impl ResourceRegistryBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            catalogs: Catalogs::new(),
            disabled: Vec::new(),
            single_flight: true,
        }
    }

    /// Create a builder that honors the `[registry]` settings.
    pub fn with_settings(config: &RegistryConfig) -> Self {
        let mut builder = Self::new().single_flight(config.single_flight);
        for resource_type in &config.disabled_types {
            builder = builder.disable(resource_type.clone());
        }
        builder
    }

    /// Register a binding in `domain`.
    pub fn bind(mut self, domain: ObservationDomain, binding: FactoryBinding) -> Self {
        self.catalogs.catalog_mut(domain).insert(binding);
        self
    }

    /// Register a process-wide resource type.
    pub fn process_wide<F, W>(self, resource_type: ResourceType, constructor: F) -> Self
    where
        F: Fn() -> W + Send + Sync + 'static,
        W: ResourceWatcher + 'static,
    {
        self.bind(
            ObservationDomain::ProcessWide,
            FactoryBinding::from_fn(resource_type, constructor),
        )
    }

    /// Register a resource type for targets of `kind`.
    pub fn per_target<F, W>(self, kind: TargetKind, resource_type: ResourceType, constructor: F) -> Self
    where
        F: Fn() -> W + Send + Sync + 'static,
        W: ResourceWatcher + 'static,
    {
        self.bind(
            ObservationDomain::PerTarget(kind),
            FactoryBinding::from_fn(resource_type, constructor),
        )
    }

    /// Leave `resource_type` out of every catalog.
    pub fn disable(mut self, resource_type: ResourceType) -> Self {
        self.disabled.push(resource_type);
        self
    }

    /// Serialize concurrent `watch` calls per observer (on by default).
    pub fn single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = enabled;
        self
    }

    /// Build the ResourceRegistry.
    pub fn build(mut self) -> ResourceRegistry {
        for resource_type in &self.disabled {
            for catalog in self.catalogs.all_mut() {
                if catalog.remove(resource_type) {
                    crate::debug_event!(
                        "registry",
                        "disabled",
                        "{resource_type} in {}",
                        catalog.domain()
                    );
                }
            }
        }

        ResourceRegistry {
            catalogs: self.catalogs,
            gates: DashMap::new(),
            single_flight: self.single_flight,
        }
    }
}

impl Default for ResourceRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
