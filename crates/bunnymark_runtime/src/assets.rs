//! Startup assets

use anyhow::{Context, Result};
use bunnymark_asset::{DirectoryShaders, EmbeddedShaders, ShaderLibrary, SpriteImage};
use bunnymark_services::Settings;

/// The sprite texture and the shaders that draw it.
pub struct Assets {
    pub image: SpriteImage,
    pub shaders: Box<dyn ShaderLibrary>,
}

impl Assets {
    /// Load the configured overrides, falling back to the built-in assets.
    pub fn load(settings: &Settings) -> Result<Self> {
        let image = match &settings.assets.texture {
            Some(path) => SpriteImage::load(path)
                .with_context(|| format!("loading sprite texture {}", path.display()))?,
            None => SpriteImage::placeholder(),
        };
        let shaders: Box<dyn ShaderLibrary> = match &settings.assets.shader_dir {
            Some(dir) => Box::new(DirectoryShaders::new(dir)),
            None => Box::new(EmbeddedShaders),
        };

        tracing::info!(
            width = image.width(),
            height = image.height(),
            custom_shaders = settings.assets.shader_dir.is_some(),
            "Assets loaded"
        );
        Ok(Self { image, shaders })
    }
}
