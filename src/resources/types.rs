//! Resource type identifiers and resource payloads.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a stream of resources (console messages, network events, ...).
///
/// A plain string token. Whether a token is known is decided by the
/// registry's catalogs, not by this type, so arbitrary tokens can be built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceType(Cow<'static, str>);

impl ResourceType {
    pub const CONSOLE_MESSAGE: ResourceType = ResourceType::from_static("console-message");
    pub const CSS_CHANGE: ResourceType = ResourceType::from_static("css-change");
    pub const CSS_MESSAGE: ResourceType = ResourceType::from_static("css-message");
    pub const DOCUMENT_EVENT: ResourceType = ResourceType::from_static("document-event");
    pub const ERROR_MESSAGE: ResourceType = ResourceType::from_static("error-message");
    pub const PLATFORM_MESSAGE: ResourceType = ResourceType::from_static("platform-message");
    pub const NETWORK_EVENT: ResourceType = ResourceType::from_static("network-event");
    pub const STYLESHEET: ResourceType = ResourceType::from_static("stylesheet");

    /// Every well-known resource type.
    pub const WELL_KNOWN: [ResourceType; 8] = [
        Self::CONSOLE_MESSAGE,
        Self::CSS_CHANGE,
        Self::CSS_MESSAGE,
        Self::DOCUMENT_EVENT,
        Self::ERROR_MESSAGE,
        Self::PLATFORM_MESSAGE,
        Self::NETWORK_EVENT,
        Self::STYLESHEET,
    ];

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ResourceType {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// A single diagnostic resource delivered to an observer.
///
/// The payload shape belongs to the watcher that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub resource_type: ResourceType,
    pub payload: serde_json::Value,
}

impl Resource {
    pub fn new(resource_type: ResourceType, payload: serde_json::Value) -> Self {
        Self {
            resource_type,
            payload,
        }
    }
}
