//! Per-type table of live watchers, keyed by observer.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::error::WatcherError;
use super::observer::ObserverId;
use super::types::ResourceType;
use super::watcher::WatcherHandle;

/// Tracks the single live watcher servicing each observer for one
/// resource type in one domain.
///
/// The table is the owner of record for its handles: removing an entry
/// destroys the watcher.
#[derive(Debug)]
pub struct LifetimeTable {
    resource_type: ResourceType,
    watchers: DashMap<ObserverId, WatcherHandle>,
}

impl LifetimeTable {
    pub fn new(resource_type: ResourceType) -> Self {
        Self {
            resource_type,
            watchers: DashMap::new(),
        }
    }

    pub fn resource_type(&self) -> &ResourceType {
        &self.resource_type
    }

    pub fn has(&self, observer: ObserverId) -> bool {
        self.watchers.contains_key(&observer)
    }

    pub fn get(&self, observer: ObserverId) -> Option<WatcherHandle> {
        self.watchers.get(&observer).map(|entry| entry.value().clone())
    }

    /// Record the watcher for `observer`.
    ///
    /// An existing entry is never overwritten; the rejected handle is
    /// returned so the caller can shut it down.
    pub fn insert(&self, observer: ObserverId, handle: WatcherHandle) -> Result<(), WatcherHandle> {
        match self.watchers.entry(observer) {
            Entry::Occupied(_) => Err(handle),
            Entry::Vacant(slot) => {
                slot.insert(handle);
                Ok(())
            }
        }
    }

    /// Remove and destroy the watcher for `observer`.
    ///
    /// Returns `Ok(false)` when nothing was tracked. The entry is gone even
    /// when `destroy` fails.
    pub fn remove(&self, observer: ObserverId) -> Result<bool, WatcherError> {
        // Destroy outside the shard lock.
        let Some((_, handle)) = self.watchers.remove(&observer) else {
            return Ok(false);
        };
        handle.destroy()?;
        Ok(true)
    }

    pub fn observers(&self) -> Vec<ObserverId> {
        self.watchers.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.watchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watchers.is_empty()
    }
}
