//! Settings management
//!
//! Everything a run needs, grouped the way the JSON file is laid out:
//!
//! ```json
//! {
//!   "graphics": { "width": 800, "height": 600, "vsync": false, "title": "Bunnymark" },
//!   "simulation": { "count": 50000, "seed": 5489, "sprite_extent": 32.0 },
//!   "batch": { "strategy": "storage_buffer_pull", "indexed": false, "policy": "pool", "pool_regions": 2 },
//!   "assets": { "texture": null, "shader_dir": null }
//! }
//! ```
//!
//! Missing fields take their defaults.

use bunnymark_core::{Viewport, DEFAULT_SEED, DEFAULT_SPRITE_EXTENT};
use bunnymark_render::cycler::DEFAULT_POOL_REGIONS;
use bunnymark_render::window::WindowConfig;
use bunnymark_render::{CyclePolicy, DriverConfig, EncodeStrategy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings from {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed settings in {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid setting {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Run settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub graphics: GraphicsSettings,
    pub simulation: SimulationSettings,
    pub batch: BatchSettings,
    pub assets: AssetSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphicsSettings {
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
    pub title: String,
}

impl Default for GraphicsSettings {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            vsync: false,
            title: "Bunnymark".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub count: usize,
    pub seed: u64,
    /// Edge length used for the reflection bounds.
    pub sprite_extent: f32,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            count: 50_000,
            seed: DEFAULT_SEED,
            sprite_extent: DEFAULT_SPRITE_EXTENT,
        }
    }
}

/// Cycling policy as named in settings files and on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    Transient,
    Pool,
    Persistent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    pub strategy: EncodeStrategy,
    /// Share an index buffer when duplicating vertices.
    pub indexed: bool,
    pub policy: PolicyKind,
    pub pool_regions: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            strategy: EncodeStrategy::StorageBufferPull,
            indexed: false,
            policy: PolicyKind::Pool,
            pool_regions: DEFAULT_POOL_REGIONS,
        }
    }
}

impl BatchSettings {
    pub fn cycle_policy(&self) -> CyclePolicy {
        match self.policy {
            PolicyKind::Transient => CyclePolicy::Transient,
            PolicyKind::Pool => CyclePolicy::FixedPool {
                regions: self.pool_regions,
            },
            PolicyKind::Persistent => CyclePolicy::PersistentSingle,
        }
    }
}

/// Optional overrides for the built-in texture and shaders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetSettings {
    pub texture: Option<PathBuf>,
    pub shader_dir: Option<PathBuf>,
}

impl Settings {
    /// Read settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_json(&text).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Reject values no run could start with.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let invalid = |field, reason| Err(SettingsError::Invalid { field, reason });

        if self.graphics.width == 0 || self.graphics.height == 0 {
            return invalid("graphics.width/height", "must be non-zero");
        }
        if self.simulation.count == 0 {
            return invalid("simulation.count", "must be at least 1");
        }
        if !(self.simulation.sprite_extent.is_finite() && self.simulation.sprite_extent >= 0.0) {
            return invalid("simulation.sprite_extent", "must be a finite, non-negative size");
        }
        let extent = self.simulation.sprite_extent;
        if extent > self.graphics.width as f32 || extent > self.graphics.height as f32 {
            return invalid("simulation.sprite_extent", "must fit inside the window");
        }
        if self.batch.policy == PolicyKind::Pool && self.batch.pool_regions < 2 {
            return invalid("batch.pool_regions", "a pool needs at least 2 regions");
        }
        Ok(())
    }

    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.graphics.width as f32, self.graphics.height as f32)
    }

    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            sprite_count: self.simulation.count,
            viewport: self.viewport(),
            sprite_extent: self.simulation.sprite_extent,
            seed: self.simulation.seed,
            strategy: self.batch.strategy,
            indexed: self.batch.indexed,
            policy: self.batch.cycle_policy(),
        }
    }

    pub fn window_config(&self) -> WindowConfig {
        WindowConfig {
            title: self.graphics.title.clone(),
            width: self.graphics.width,
            height: self.graphics.height,
            resizable: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_run() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());

        let config = settings.driver_config();
        assert_eq!(config.sprite_count, 50_000);
        assert_eq!(config.seed, 5489);
        assert_eq!(config.viewport, Viewport::new(800.0, 600.0));
        assert_eq!(config.strategy, EncodeStrategy::StorageBufferPull);
        assert_eq!(config.policy, CyclePolicy::FixedPool { regions: 2 });
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings = Settings::from_json(
            r#"{ "simulation": { "count": 1000 }, "batch": { "strategy": "vertex_duplication", "policy": "transient" } }"#,
        )
        .unwrap();

        assert_eq!(settings.simulation.count, 1000);
        assert_eq!(settings.simulation.seed, DEFAULT_SEED);
        assert_eq!(settings.graphics.width, 800);
        assert_eq!(settings.batch.strategy, EncodeStrategy::VertexDuplication);
        assert_eq!(settings.batch.cycle_policy(), CyclePolicy::Transient);
    }

    #[test]
    fn test_json_round_trip() {
        let mut settings = Settings::default();
        settings.batch.policy = PolicyKind::Persistent;
        settings.assets.texture = Some(PathBuf::from("bunny.png"));

        let json = settings.to_json().unwrap();
        assert_eq!(Settings::from_json(&json).unwrap(), settings);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.simulation.count = 0;
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::Invalid { field: "simulation.count", .. })
        ));

        let mut settings = Settings::default();
        settings.batch.pool_regions = 1;
        assert!(settings.validate().is_err());
        settings.batch.policy = PolicyKind::Transient;
        assert!(settings.validate().is_ok());

        let mut settings = Settings::default();
        settings.graphics.height = 16;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = Settings::load("/nonexistent/bunnymark.json").unwrap_err();
        assert!(matches!(err, SettingsError::Io { .. }));
    }
}
