//! Error types for the resource registry.

use thiserror::Error;

use super::domain::ObservationDomain;
use super::types::ResourceType;

/// Error raised by a watcher implementation during start-up or shutdown.
///
/// Kept as the watcher produced it; the registry only attaches the
/// resource type it was servicing.
pub type WatcherError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors from registry operations.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Unsupported observation domain: {domain}")]
    UnsupportedDomain { domain: ObservationDomain },

    #[error("Unknown resource type '{resource_type}'")]
    UnknownResourceType { resource_type: ResourceType },

    #[error("Watcher for '{resource_type}' failed: {source}")]
    WatcherFailure {
        resource_type: ResourceType,
        #[source]
        source: WatcherError,
    },
}

impl RegistryError {
    /// Resource type the error is attributable to, if any.
    pub fn resource_type(&self) -> Option<&ResourceType> {
        match self {
            RegistryError::UnsupportedDomain { .. } => None,
            RegistryError::UnknownResourceType { resource_type }
            | RegistryError::WatcherFailure { resource_type, .. } => Some(resource_type),
        }
    }

    /// Take back the watcher's own error, untouched.
    pub fn into_watcher_error(self) -> Option<WatcherError> {
        match self {
            RegistryError::WatcherFailure { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;
