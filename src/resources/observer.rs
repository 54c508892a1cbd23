//! Observer contract: the subscriber side of the registry.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use super::domain::ObservationDomain;
use super::types::Resource;

static NEXT_OBSERVER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an observer.
///
/// Lifetime tables are keyed by this id rather than by the observer itself,
/// so tracking a watcher never keeps its observer alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl ObserverId {
    /// Mint a fresh id.
    pub fn next() -> Self {
        Self(NEXT_OBSERVER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer#{}", self.0)
    }
}

/// A process-wide or per-target subscriber.
///
/// Owners of an observer must call
/// [`ResourceRegistry::unwatch_all`](super::ResourceRegistry::unwatch_all)
/// before discarding it; the registry does not reclaim watchers on its own.
pub trait Observer: Send + Sync {
    fn observer_id(&self) -> ObserverId;

    /// Domain this observer belongs to. Per-target observers carry their
    /// target kind here.
    fn domain(&self) -> ObservationDomain;

    fn notify_resource_available(&self, resources: Vec<Resource>);

    fn notify_resource_updated(&self, resources: Vec<Resource>);

    fn notify_resource_destroyed(&self, resources: Vec<Resource>);
}

impl<T: Observer + ?Sized> Observer for std::sync::Arc<T> {
    fn observer_id(&self) -> ObserverId {
        (**self).observer_id()
    }

    fn domain(&self) -> ObservationDomain {
        (**self).domain()
    }

    fn notify_resource_available(&self, resources: Vec<Resource>) {
        (**self).notify_resource_available(resources)
    }

    fn notify_resource_updated(&self, resources: Vec<Resource>) {
        (**self).notify_resource_updated(resources)
    }

    fn notify_resource_destroyed(&self, resources: Vec<Resource>) {
        (**self).notify_resource_destroyed(resources)
    }
}
