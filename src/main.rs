//! voxshift CLI
//!
//! Command-line interface for the voxshift rendering pipeline.

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use voxshift::cli::{commands, Cli, Commands};
use voxshift::{RenderOptions, VoxConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    info!("voxshift v{}", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(path) => VoxConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => VoxConfig::default(),
    };

    handle_command(cli.command, config).await
}

async fn handle_command(cmd: Commands, config: VoxConfig) -> anyhow::Result<()> {
    match cmd {
        Commands::Effects { json, catalog } => {
            let catalog = commands::load_catalog(catalog.as_deref())?;
            commands::list_effects(&catalog, json)?;
        }
        Commands::Render {
            input,
            effect,
            output,
            seed,
            catalog,
        } => {
            let catalog = commands::load_catalog(catalog.as_deref())?;
            let options = RenderOptions {
                reverb_seed: seed.or(config.render.reverb_seed),
            };
            commands::render_file(&catalog, &input, &effect, &output, &options)
                .with_context(|| format!("failed to render {}", input.display()))?;
        }
        Commands::Inspect { path } => {
            commands::inspect(&path).with_context(|| format!("failed to inspect {}", path.display()))?;
        }
        Commands::Session {
            input,
            effect,
            out_dir,
            realtime,
            catalog,
        } => {
            let catalog = commands::load_catalog(catalog.as_deref())?;
            commands::run_session(&input, &effect, &out_dir, realtime, &catalog, config)
                .await
                .context("session failed")?;
        }
    }
    Ok(())
}
