//! Resource watcher registry.
//!
//! Lets observers subscribe to typed streams of diagnostic resources
//! without double-subscribing and without leaking watchers.
//!
//! # Architecture
//!
//! ```text
//! ResourceRegistry
//!   - Catalogs (domain resolver)
//!       ProcessWide            -> Catalog
//!       PerTarget(TargetKind)  -> Catalog
//!   - Catalog: ResourceType -> CatalogEntry
//!       FactoryBinding  (lazy, cached constructor)
//!       LifetimeTable   (ObserverId -> live watcher)
//!         |
//!    +---------+---------+
//!    |         |         |
//! watcher   watcher   watcher   -> Observer callbacks
//! ```

pub mod broadcast;
mod domain;
mod error;
mod factory;
mod lifetime;
mod observer;
mod registry;
mod types;
mod watcher;

pub use broadcast::{BroadcastWatcher, ResourceEvent, ResourceSource, ResourceSources};
pub use domain::{
    Catalog, CatalogEntry, Catalogs, ObservationDomain, TargetKind, builtin_layout,
};
pub use error::{RegistryError, RegistryResult, WatcherError};
pub use factory::{FactoryBinding, WatcherConstructor, WatcherLoader};
pub use lifetime::LifetimeTable;
pub use observer::{Observer, ObserverId};
pub use registry::{ResourceRegistry, ResourceRegistryBuilder};
pub use types::{Resource, ResourceType};
pub use watcher::{ResourceCallbacks, ResourceSink, ResourceWatcher, WatcherHandle};
