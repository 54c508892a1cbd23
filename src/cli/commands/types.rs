//! Types command - list the catalog of each observation domain.

use anyhow::Result;

use crate::cli::DomainArg;
use crate::config::Settings;
use crate::resources::{Catalog, ObservationDomain};

use super::builtin_registry;

pub fn run_types(settings: &Settings, domain: Option<DomainArg>) -> Result<()> {
    let (registry, _sources) = builtin_registry(settings);

    match domain {
        Some(domain) => {
            let catalog = registry.catalog(ObservationDomain::from(domain))?;
            print_catalog(catalog);
        }
        None => {
            for catalog in registry.catalogs().all() {
                print_catalog(catalog);
            }
        }
    }
    Ok(())
}

fn print_catalog(catalog: &Catalog) {
    println!("{} ({} types)", catalog.domain(), catalog.len());
    for resource_type in catalog.types() {
        println!("  {resource_type}");
    }
}
