// src/main.rs
//! Tile Stitch - build a georeferenced map from slippy tiles

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tile_stitch::{config::DEFAULT_SETTINGS_FILE, logging, MapConfig, MapCreator};

#[derive(Debug, Parser)]
#[command(name = "tile-stitch", version, about)]
struct Cli {
    /// Settings section describing the map to build
    section: String,

    /// Settings file
    #[arg(short, long, default_value = DEFAULT_SETTINGS_FILE)]
    config: PathBuf,

    /// Concurrent tile downloads (overrides the settings file)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Only write the PNG and metadata, skip the GeoTIFF
    #[arg(long)]
    no_georef: bool,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose).context("Failed to initialise logging")?;

    let mut config = MapConfig::load(&cli.config, &cli.section)
        .with_context(|| format!("Invalid settings in {}", cli.config.display()))?;
    if let Some(workers) = cli.workers {
        anyhow::ensure!(workers > 0, "--workers must be at least 1");
        config.workers = workers;
    }
    tracing::debug!(config = %serde_json::to_string(&config)?, "Resolved settings");

    let mut creator = MapCreator::from_config(&config)?;
    if cli.no_georef {
        creator = creator.without_georef();
    }

    let report = creator
        .run(&config)
        .with_context(|| format!("Failed to build map [{}]", config.name))?;

    println!("{}", report.png_path.display());
    if let Some(tiff) = &report.tiff_path {
        println!("{}", tiff.display());
    }

    Ok(())
}
