//! Demo command - drive broadcast watchers end to end.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use serde_json::json;

use crate::config::Settings;
use crate::resources::{
    ObservationDomain, Observer, ObserverId, Resource, ResourceType, TargetKind,
};

use super::builtin_registry;

/// Observer that logs and counts every notification.
struct DemoObserver {
    id: ObserverId,
    domain: ObservationDomain,
    available: AtomicUsize,
    updated: AtomicUsize,
    destroyed: AtomicUsize,
}

impl DemoObserver {
    fn new(domain: ObservationDomain) -> Self {
        Self {
            id: ObserverId::next(),
            domain,
            available: AtomicUsize::new(0),
            updated: AtomicUsize::new(0),
            destroyed: AtomicUsize::new(0),
        }
    }

    fn record(&self, counter: &AtomicUsize, kind: &str, resources: &[Resource]) {
        counter.fetch_add(resources.len(), Ordering::Relaxed);
        for resource in resources {
            crate::log_event!(
                "demo",
                kind,
                "{} {} {}",
                self.id,
                resource.resource_type,
                resource.payload
            );
        }
    }
}

impl Observer for DemoObserver {
    fn observer_id(&self) -> ObserverId {
        self.id
    }

    fn domain(&self) -> ObservationDomain {
        self.domain
    }

    fn notify_resource_available(&self, resources: Vec<Resource>) {
        self.record(&self.available, "available", &resources);
    }

    fn notify_resource_updated(&self, resources: Vec<Resource>) {
        self.record(&self.updated, "updated", &resources);
    }

    fn notify_resource_destroyed(&self, resources: Vec<Resource>) {
        self.record(&self.destroyed, "destroyed", &resources);
    }
}

fn sample(resource_type: &ResourceType, n: usize) -> Resource {
    Resource::new(
        resource_type.clone(),
        json!({ "id": n, "summary": format!("{resource_type} #{n}") }),
    )
}

pub async fn run_demo(settings: &Settings, events: usize) -> Result<()> {
    let (registry, sources) = builtin_registry(settings);

    // Exists before anyone subscribes; must still be seen.
    if let Some(source) = sources.get(&ResourceType::CONSOLE_MESSAGE) {
        source.emit_available(vec![sample(&ResourceType::CONSOLE_MESSAGE, 0)]);
    }

    let process = Arc::new(DemoObserver::new(ObservationDomain::ProcessWide));
    let frame = Arc::new(DemoObserver::new(ObservationDomain::PerTarget(
        TargetKind::Frame,
    )));
    let requested = ResourceType::WELL_KNOWN.to_vec();

    registry
        .watch(&process, &registry.process_wide_types(&requested))
        .await?;
    if registry.has_any_type_for_per_target_domain(&requested) {
        registry.watch(&frame, &requested).await?;
    }

    for (_, source) in sources.iter() {
        for n in 1..=events {
            source.emit_available(vec![sample(source.resource_type(), n)]);
        }
        if events > 0 {
            source.emit_updated(vec![sample(source.resource_type(), 1)]);
            source.emit_destroyed(vec![sample(source.resource_type(), 1)]);
        }
    }

    // Let the forwarding tasks drain.
    tokio::time::sleep(Duration::from_millis(50)).await;

    for observer in [&process, &frame] {
        println!(
            "{} ({}): {} types, {} available, {} updated, {} destroyed",
            observer.id,
            observer.domain,
            registry.active_types(observer).len(),
            observer.available.load(Ordering::Relaxed),
            observer.updated.load(Ordering::Relaxed),
            observer.destroyed.load(Ordering::Relaxed),
        );
    }

    registry.unwatch_all(&process);
    registry.unwatch_all(&frame);
    crate::log_event!("demo", "finished");
    Ok(())
}
