//! Command line
//!
//! Flags override whatever the settings file (or the defaults) chose.

use anyhow::{Context, Result};
use bunnymark_render::EncodeStrategy;
use bunnymark_services::settings::PolicyKind;
use bunnymark_services::Settings;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Frames rendered by a headless run when `--frames` is not given.
pub const DEFAULT_HEADLESS_FRAMES: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    Transient,
    Pool,
    Persistent,
}

impl From<PolicyArg> for PolicyKind {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Transient => PolicyKind::Transient,
            PolicyArg::Pool => PolicyKind::Pool,
            PolicyArg::Persistent => PolicyKind::Persistent,
        }
    }
}

/// Sprite batching benchmark
#[derive(Debug, Parser)]
#[command(name = "bunnymark", version, about)]
pub struct Args {
    /// JSON settings file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Number of sprites
    #[arg(long, short = 'n')]
    pub count: Option<usize>,

    /// Batch strategy: vertex, instanced or pull
    #[arg(long)]
    pub strategy: Option<EncodeStrategy>,

    /// Share an index buffer between duplicated quad vertices
    #[arg(long)]
    pub indexed: bool,

    /// How per-frame write targets are reused
    #[arg(long, value_enum)]
    pub policy: Option<PolicyArg>,

    /// Regions in the pool policy
    #[arg(long, value_name = "K")]
    pub pool_regions: Option<usize>,

    /// Seed for sprite velocities
    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long)]
    pub width: Option<u32>,

    #[arg(long)]
    pub height: Option<u32>,

    /// Sprite edge length used for wall reflection
    #[arg(long)]
    pub extent: Option<f32>,

    /// PNG sprite texture (a built-in bunny otherwise)
    #[arg(long, value_name = "PNG")]
    pub texture: Option<PathBuf>,

    /// Directory of WGSL shaders overriding the built-in ones
    #[arg(long, value_name = "DIR")]
    pub shader_dir: Option<PathBuf>,

    /// Wait for vertical sync when presenting
    #[arg(long)]
    pub vsync: bool,

    /// Run without a window or GPU
    #[arg(long)]
    pub headless: bool,

    /// Stop after this many frames
    #[arg(long)]
    pub frames: Option<u64>,
}

impl Args {
    /// Settings file (or defaults) with every given flag applied.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::load(path)
                .with_context(|| format!("loading settings from {}", path.display()))?,
            None => Settings::default(),
        };
        self.apply(&mut settings);
        Ok(settings)
    }

    fn apply(&self, settings: &mut Settings) {
        if let Some(count) = self.count {
            settings.simulation.count = count;
        }
        if let Some(seed) = self.seed {
            settings.simulation.seed = seed;
        }
        if let Some(extent) = self.extent {
            settings.simulation.sprite_extent = extent;
        }
        if let Some(width) = self.width {
            settings.graphics.width = width;
        }
        if let Some(height) = self.height {
            settings.graphics.height = height;
        }
        if self.vsync {
            settings.graphics.vsync = true;
        }
        if let Some(strategy) = self.strategy {
            settings.batch.strategy = strategy;
        }
        if self.indexed {
            settings.batch.indexed = true;
        }
        if let Some(policy) = self.policy {
            settings.batch.policy = policy.into();
        }
        if let Some(regions) = self.pool_regions {
            settings.batch.pool_regions = regions;
        }
        if let Some(texture) = &self.texture {
            settings.assets.texture = Some(texture.clone());
        }
        if let Some(dir) = &self.shader_dir {
            settings.assets.shader_dir = Some(dir.clone());
        }
    }

    /// Frame budget for this run. Windowed runs are unlimited by default.
    pub fn frame_limit(&self) -> Option<u64> {
        match (self.frames, self.headless) {
            (Some(frames), _) => Some(frames),
            (None, true) => Some(DEFAULT_HEADLESS_FRAMES),
            (None, false) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bunnymark_render::CyclePolicy;

    #[test]
    fn test_no_flags_keeps_defaults() {
        let args = Args::try_parse_from(["bunnymark"]).unwrap();
        assert_eq!(args.settings().unwrap(), Settings::default());
        assert_eq!(args.frame_limit(), None);
    }

    #[test]
    fn test_flags_override_settings() {
        let args = Args::try_parse_from([
            "bunnymark",
            "--count",
            "1000",
            "--strategy",
            "instanced",
            "--policy",
            "pool",
            "--pool-regions",
            "3",
            "--seed",
            "42",
            "--vsync",
        ])
        .unwrap();
        let settings = args.settings().unwrap();

        assert_eq!(settings.simulation.count, 1000);
        assert_eq!(settings.simulation.seed, 42);
        assert!(settings.graphics.vsync);
        assert_eq!(settings.batch.strategy, EncodeStrategy::InstanceAttribute);
        assert_eq!(
            settings.batch.cycle_policy(),
            CyclePolicy::FixedPool { regions: 3 }
        );
    }

    #[test]
    fn test_headless_defaults_to_bounded_run() {
        let args = Args::try_parse_from(["bunnymark", "--headless"]).unwrap();
        assert_eq!(args.frame_limit(), Some(DEFAULT_HEADLESS_FRAMES));

        let args = Args::try_parse_from(["bunnymark", "--headless", "--frames", "10"]).unwrap();
        assert_eq!(args.frame_limit(), Some(10));
    }

    #[test]
    fn test_unknown_strategy_is_rejected() {
        assert!(Args::try_parse_from(["bunnymark", "--strategy", "compute"]).is_err());
    }
}
