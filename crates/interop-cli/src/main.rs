use anyhow::{Context, Result};
use clap::Parser;
use interop_core::{ResolverConfig, VirtualCallResolver, init_global, shutdown_global};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod native;

use cli::{Cli, Command};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("vtprobe=info".parse()?)
                .add_directive("interop_core=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Command::Probe {
            instances,
            threads,
            rounds,
            json,
        } => {
            if !init_global(&config)? {
                warn!("Global resolver was already initialized, ignoring config");
            }
            let result = commands::probe::run(
                VirtualCallResolver::global(),
                instances,
                threads,
                rounds,
                json,
            );
            shutdown_global();
            result
        }
        Command::Handle { count } => commands::handle::run(count),
    }
}

fn load_config(cli: &Cli) -> Result<ResolverConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let config = ResolverConfig::load_from_path(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            info!("Loaded config from {}", path.display());
            config
        }
        None => ResolverConfig::default(),
    };

    if let Some(secs) = cli.eviction_secs {
        config.eviction_window_ms = (secs * 1000.0) as u64;
        config.validate()?;
    }

    Ok(config)
}
