pub mod cli;
pub mod config;
pub mod logging;
pub mod resources;

pub use config::Settings;
pub use resources::{
    ObservationDomain, Observer, ObserverId, RegistryError, RegistryResult, Resource,
    ResourceRegistry, ResourceRegistryBuilder, ResourceType, ResourceWatcher, TargetKind,
};
