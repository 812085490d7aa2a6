//! Bunnymark Runtime
//!
//! Binary that parses settings, loads assets and runs the benchmark either
//! in a window or headless.

mod app;
mod assets;
mod cli;
mod headless;

use anyhow::Result;
use assets::Assets;
use clap::Parser;
use cli::{Args, DEFAULT_HEADLESS_FRAMES};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let settings = args.settings()?;
    settings.validate()?;

    tracing::info!("Bunnymark v{}", bunnymark_core::VERSION);
    tracing::info!(
        sprites = settings.simulation.count,
        strategy = %settings.batch.strategy,
        policy = %settings.batch.cycle_policy(),
        metrics = bunnymark_metrics::ENABLED,
        "Configuration"
    );

    let assets = Assets::load(&settings)?;

    if args.headless {
        let frames = args.frame_limit().unwrap_or(DEFAULT_HEADLESS_FRAMES);
        headless::run(&settings, &assets, frames)?;
        return Ok(());
    }

    app::run(settings, assets, args.frame_limit())
}
