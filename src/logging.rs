//! Logging for registry and watcher events.
//!
//! Every event is emitted under a component target, `resource_watch::<component>`
//! (`registry`, `factory`, `source`, `watcher`, `demo`), so watcher traffic can be
//! silenced while registry bookkeeping stays visible.
//!
//! # Configuration
//!
//! ```toml
//! [logging]
//! default = "warn"  # quiet by default
//!
//! [logging.modules]
//! registry = "debug"   # short form for resource_watch::registry
//! source = "warn"
//! tokio = "error"
//! ```
//!
//! # Environment Variable
//!
//! `RUST_LOG` takes precedence over config:
//! ```bash
//! RUST_LOG=debug resource-watch demo
//! RUST_LOG=resource_watch::resources=trace resource-watch demo
//! ```

use std::sync::Once;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Compact time format: HH:MM:SS.mmm
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Components that log under `resource_watch::<component>`.
pub const COMPONENTS: [&str; 5] = ["registry", "factory", "source", "watcher", "demo"];

/// Tracing target for a component or module name from config.
fn target_for(module: &str) -> String {
    if COMPONENTS.contains(&module) {
        format!("resource_watch::{module}")
    } else {
        module.to_string()
    }
}

/// Build the filter directive string from config.
fn filter_directives(config: &LoggingConfig) -> String {
    let mut filter_str = config.default.clone();
    for (module, level) in &config.modules {
        filter_str.push_str(&format!(",{}={level}", target_for(module)));
    }
    filter_str
}

/// Initialize logging with configuration.
///
/// Call once at startup. Safe to call multiple times (only first call takes effect).
/// The `RUST_LOG` environment variable takes precedence over config settings.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(filter_directives(config))
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_timer(CompactTime)
            .with_level(true)
            .with_writer(std::io::stderr)
            .with_filter(filter);

        tracing_subscriber::registry().with(fmt_layer).init();
    });
}

/// Initialize logging with default configuration.
pub fn init() {
    init_with_config(&LoggingConfig::default());
}

/// Log an event under a component target.
///
/// # Examples
/// ```ignore
/// log_event!("registry", "watching", "{resource_type} for {id}");
/// log_event!("demo", "started");
/// ```
#[macro_export]
macro_rules! log_event {
    ($component:literal, $event:expr) => {
        tracing::info!(target: concat!("resource_watch::", $component), "{}", $event)
    };
    ($component:literal, $event:expr, $($arg:tt)*) => {
        tracing::info!(
            target: concat!("resource_watch::", $component),
            "{}: {}",
            $event,
            format!($($arg)*)
        )
    };
}

/// Debug-only event logging.
///
/// # Examples
/// ```ignore
/// debug_event!("source", "sent", "{} to {count} watchers", resource_type);
/// ```
#[macro_export]
macro_rules! debug_event {
    ($component:literal, $event:expr) => {
        tracing::debug!(target: concat!("resource_watch::", $component), "{}", $event)
    };
    ($component:literal, $event:expr, $($arg:tt)*) => {
        tracing::debug!(
            target: concat!("resource_watch::", $component),
            "{}: {}",
            $event,
            format!($($arg)*)
        )
    };
}

/// Watcher shutdown and delivery problems that do not fail the caller.
///
/// # Examples
/// ```ignore
/// warn_event!("registry", "shutdown failed", "{resource_type} for {id}: {e}");
/// ```
#[macro_export]
macro_rules! warn_event {
    ($component:literal, $event:expr, $($arg:tt)*) => {
        tracing::warn!(
            target: concat!("resource_watch::", $component),
            "{}: {}",
            $event,
            format!($($arg)*)
        )
    };
}
