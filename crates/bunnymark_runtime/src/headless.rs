//! Windowless runs against the host-memory backend

use crate::assets::Assets;
use anyhow::{Context, Result};
use bunnymark_render::{FrameLimit, HeadlessBackend, RunSummary, SubmissionDriver};
use bunnymark_services::Settings;

/// Run `frames` frames without a GPU and report what was produced.
pub fn run(settings: &Settings, assets: &Assets, frames: u64) -> Result<RunSummary> {
    let mut driver = SubmissionDriver::new(
        HeadlessBackend::new(),
        &settings.driver_config(),
        assets.shaders.as_ref(),
        &assets.image,
    )
    .context("starting headless benchmark")?;

    tracing::info!(frames, "Running headless");
    let summary = driver.run(&mut FrameLimit::new(frames))?;
    tracing::info!(
        frames = summary.frames,
        bytes = summary.bytes_written,
        uploaded = driver.backend().bytes_uploaded(),
        submitted = driver.backend().submitted(),
        presented = driver.backend().frames_presented(),
        regions_in_flight = driver.cycler().in_flight(),
        "Headless run complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bunnymark_asset::{EmbeddedShaders, SpriteImage};
    use bunnymark_render::EncodeStrategy;

    #[test]
    fn test_headless_run_counts_frames() {
        let mut settings = Settings::default();
        settings.simulation.count = 100;
        settings.batch.strategy = EncodeStrategy::InstanceAttribute;
        let assets = Assets {
            image: SpriteImage::placeholder(),
            shaders: Box::new(EmbeddedShaders),
        };

        let summary = run(&settings, &assets, 25).unwrap();
        assert_eq!(summary.frames, 25);
        assert_eq!(summary.bytes_written, 25 * 100 * 64);
    }
}
