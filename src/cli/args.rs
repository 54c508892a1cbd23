//! CLI argument parsing using clap.

use clap::{
    Parser, Subcommand, ValueEnum,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

use crate::resources::{ObservationDomain, TargetKind};

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

#[derive(Parser)]
#[command(name = "resource-watch")]
#[command(version, about = "Inspect and exercise the resource watcher registry")]
#[command(styles = clap_cargo_style())]
pub struct Cli {
    /// Path to a settings file (defaults to .resource-watch/settings.toml)
    #[arg(long, global = true, env = "RW_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up .resource-watch directory
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Display active settings
    Config,

    /// List resource types per observation domain
    Types {
        /// Only list this domain
        #[arg(short, long, value_enum)]
        domain: Option<DomainArg>,
    },

    /// Run broadcast watchers for every built-in type against sample observers
    Demo {
        /// Sample resources emitted per type after subscription
        #[arg(short, long, default_value_t = 2)]
        events: usize,
    },
}

/// Observation domain selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DomainArg {
    /// Process-wide domain
    Process,
    /// Frame targets
    Frame,
    /// Worker targets
    Worker,
}

impl From<DomainArg> for ObservationDomain {
    fn from(arg: DomainArg) -> Self {
        match arg {
            DomainArg::Process => ObservationDomain::ProcessWide,
            DomainArg::Frame => ObservationDomain::PerTarget(TargetKind::Frame),
            DomainArg::Worker => ObservationDomain::PerTarget(TargetKind::Worker),
        }
    }
}
