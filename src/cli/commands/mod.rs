//! Command implementations.

pub mod demo;
pub mod init;
pub mod types;

use crate::config::Settings;
use crate::resources::{ResourceRegistry, ResourceRegistryBuilder, ResourceSources, builtin_layout};

/// Registry with a broadcast watcher bound to every built-in resource type.
pub(crate) fn builtin_registry(settings: &Settings) -> (ResourceRegistry, ResourceSources) {
    let sources = ResourceSources::from_layout(builtin_layout(), settings.broadcast.capacity);
    let registry = sources
        .install(ResourceRegistryBuilder::with_settings(&settings.registry))
        .build();
    (registry, sources)
}
