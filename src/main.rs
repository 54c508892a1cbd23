use anyhow::Result;
use clap::Parser;

use resource_watch::Settings;
use resource_watch::cli::commands::{demo, init, types};
use resource_watch::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .unwrap_or_else(|e| {
        eprintln!("Warning: failed to load settings, using defaults: {e}");
        Settings::default()
    });

    resource_watch::logging::init_with_config(&settings.logging);

    match cli.command {
        Commands::Init { force } => init::run_init(force),
        Commands::Config => init::run_config(&settings),
        Commands::Types { domain } => types::run_types(&settings, domain),
        Commands::Demo { events } => demo::run_demo(&settings, events).await,
    }
}
