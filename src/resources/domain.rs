//! Observation domains, per-domain catalogs and the domain resolver.
//!
//! A resource type lives in exactly the catalogs it was registered in.
//! Process-wide observers see the process-wide catalog; per-target observers
//! see the catalog of their target kind.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::error::{RegistryError, RegistryResult};
use super::factory::FactoryBinding;
use super::lifetime::LifetimeTable;
use super::types::ResourceType;

/// Kind of observed target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Frame,
    Process,
    Worker,
}

impl TargetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TargetKind::Frame => "frame",
            TargetKind::Process => "process",
            TargetKind::Worker => "worker",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scope a resource type is observed within.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObservationDomain {
    ProcessWide,
    PerTarget(TargetKind),
}

impl ObservationDomain {
    pub fn is_per_target(self) -> bool {
        matches!(self, ObservationDomain::PerTarget(_))
    }
}

impl fmt::Display for ObservationDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObservationDomain::ProcessWide => f.write_str("process-wide"),
            ObservationDomain::PerTarget(kind) => write!(f, "{kind} target"),
        }
    }
}

/// Factory binding and live watchers for one resource type in one domain.
#[derive(Debug)]
pub struct CatalogEntry {
    binding: FactoryBinding,
    watchers: LifetimeTable,
}

impl CatalogEntry {
    pub fn new(binding: FactoryBinding) -> Self {
        let watchers = LifetimeTable::new(binding.resource_type().clone());
        Self { binding, watchers }
    }

    pub fn binding(&self) -> &FactoryBinding {
        &self.binding
    }

    pub fn watchers(&self) -> &LifetimeTable {
        &self.watchers
    }
}

/// Resource types owned by a single domain, in registration order.
#[derive(Debug)]
pub struct Catalog {
    domain: ObservationDomain,
    entries: IndexMap<ResourceType, CatalogEntry>,
}

impl Catalog {
    pub fn new(domain: ObservationDomain) -> Self {
        Self {
            domain,
            entries: IndexMap::new(),
        }
    }

    pub fn domain(&self) -> ObservationDomain {
        self.domain
    }

    /// Register a binding, replacing any earlier binding for the same type.
    pub fn insert(&mut self, binding: FactoryBinding) {
        let resource_type = binding.resource_type().clone();
        self.entries.insert(resource_type, CatalogEntry::new(binding));
    }

    pub fn remove(&mut self, resource_type: &ResourceType) -> bool {
        self.entries.shift_remove(resource_type).is_some()
    }

    pub fn get(&self, resource_type: &ResourceType) -> Option<&CatalogEntry> {
        self.entries.get(resource_type)
    }

    pub fn contains(&self, resource_type: &ResourceType) -> bool {
        self.entries.contains_key(resource_type)
    }

    pub fn types(&self) -> impl Iterator<Item = &ResourceType> {
        self.entries.keys()
    }

    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Requested types this catalog owns, in request order.
    pub fn filter_supported(&self, requested: &[ResourceType]) -> Vec<ResourceType> {
        requested
            .iter()
            .filter(|resource_type| self.contains(resource_type))
            .cloned()
            .collect()
    }
}

/// Every catalog known to a registry.
#[derive(Debug)]
pub struct Catalogs {
    process_wide: Catalog,
    per_target: IndexMap<TargetKind, Catalog>,
}

impl Catalogs {
    pub fn new() -> Self {
        let mut per_target = IndexMap::new();
        per_target.insert(
            TargetKind::Frame,
            Catalog::new(ObservationDomain::PerTarget(TargetKind::Frame)),
        );
        Self {
            process_wide: Catalog::new(ObservationDomain::ProcessWide),
            per_target,
        }
    }

    /// Catalog for `domain`, created if the target kind has none yet.
    pub(crate) fn catalog_mut(&mut self, domain: ObservationDomain) -> &mut Catalog {
        match domain {
            ObservationDomain::ProcessWide => &mut self.process_wide,
            ObservationDomain::PerTarget(kind) => self
                .per_target
                .entry(kind)
                .or_insert_with(|| Catalog::new(domain)),
        }
    }

    /// Resolve the catalog that applies to `domain`.
    pub fn resolve(&self, domain: ObservationDomain) -> RegistryResult<&Catalog> {
        match domain {
            ObservationDomain::ProcessWide => Ok(&self.process_wide),
            ObservationDomain::PerTarget(kind) => self
                .per_target
                .get(&kind)
                .ok_or(RegistryError::UnsupportedDomain { domain }),
        }
    }

    /// Requested types present in the catalog for `domain`.
    pub fn filter_supported_types(
        &self,
        requested: &[ResourceType],
        domain: ObservationDomain,
    ) -> RegistryResult<Vec<ResourceType>> {
        Ok(self.resolve(domain)?.filter_supported(requested))
    }

    /// Whether any catalog carries a binding for `resource_type`.
    pub fn is_known(&self, resource_type: &ResourceType) -> bool {
        self.all().any(|catalog| catalog.contains(resource_type))
    }

    pub fn process_wide(&self) -> &Catalog {
        &self.process_wide
    }

    pub fn per_target(&self) -> impl Iterator<Item = &Catalog> {
        self.per_target.values()
    }

    pub fn all(&self) -> impl Iterator<Item = &Catalog> {
        std::iter::once(&self.process_wide).chain(self.per_target.values())
    }

    pub(crate) fn all_mut(&mut self) -> impl Iterator<Item = &mut Catalog> {
        std::iter::once(&mut self.process_wide).chain(self.per_target.values_mut())
    }
}

impl Default for Catalogs {
    fn default() -> Self {
        Self::new()
    }
}

/// Domain assignment of the well-known resource types.
pub fn builtin_layout() -> Vec<(ObservationDomain, ResourceType)> {
    let frame = ObservationDomain::PerTarget(TargetKind::Frame);
    vec![
        (frame, ResourceType::CONSOLE_MESSAGE),
        (frame, ResourceType::CSS_CHANGE),
        (frame, ResourceType::CSS_MESSAGE),
        (frame, ResourceType::DOCUMENT_EVENT),
        (frame, ResourceType::ERROR_MESSAGE),
        (frame, ResourceType::PLATFORM_MESSAGE),
        (frame, ResourceType::STYLESHEET),
        (ObservationDomain::ProcessWide, ResourceType::NETWORK_EVENT),
    ]
}
