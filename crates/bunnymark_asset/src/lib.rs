//! Bunnymark Asset Pipeline
//!
//! Everything the benchmark loads once at startup: the sprite texture and
//! the sprite shaders.

pub mod shader;
pub mod sprite;

pub use shader::{DirectoryShaders, EmbeddedShaders, ShaderCode, ShaderLibrary, ShaderStage};
pub use sprite::{PixelFormat, SpriteImage};

use std::path::PathBuf;
use thiserror::Error;

/// Failure to produce a startup asset.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode image {path}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("image {width}x{height} has {actual} bytes, expected {expected}")]
    PixelSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("no shader named '{name}' for the {stage:?} stage")]
    UnknownShader { name: String, stage: ShaderStage },
}
