//! Sprite shader sources
//!
//! Shaders are addressed by logical program name plus stage. The render
//! backend only ever sees the resulting `ShaderCode`.

use std::borrow::Cow;
use std::path::PathBuf;

use crate::AssetError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    /// Entry point every sprite program uses for this stage.
    pub fn entry_point(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vs_main",
            ShaderStage::Fragment => "fs_main",
        }
    }
}

/// Shader text ready for the backend to compile.
#[derive(Debug, Clone)]
pub struct ShaderCode {
    pub name: String,
    pub stage: ShaderStage,
    pub entry_point: &'static str,
    pub source: Cow<'static, str>,
}

/// Lookup of shader code by logical name and stage.
pub trait ShaderLibrary {
    fn shader(&self, name: &str, stage: ShaderStage) -> Result<ShaderCode, AssetError>;
}

/// Program fed by per-vertex CPU geometry.
pub const SPRITE_VERTEX: &str = "sprite_vertex";
/// Program fed by a unit quad plus instance-rate records.
pub const SPRITE_INSTANCED: &str = "sprite_instanced";
/// Program that pulls records from a storage buffer.
pub const SPRITE_PULL: &str = "sprite_pull";

/// WGSL compiled into the binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddedShaders;

impl EmbeddedShaders {
    fn source(name: &str) -> Option<&'static str> {
        match name {
            SPRITE_VERTEX => Some(include_str!("../shaders/sprite_vertex.wgsl")),
            SPRITE_INSTANCED => Some(include_str!("../shaders/sprite_instanced.wgsl")),
            SPRITE_PULL => Some(include_str!("../shaders/sprite_pull.wgsl")),
            _ => None,
        }
    }
}

impl ShaderLibrary for EmbeddedShaders {
    fn shader(&self, name: &str, stage: ShaderStage) -> Result<ShaderCode, AssetError> {
        let source = Self::source(name).ok_or_else(|| AssetError::UnknownShader {
            name: name.to_string(),
            stage,
        })?;
        Ok(ShaderCode {
            name: name.to_string(),
            stage,
            entry_point: stage.entry_point(),
            source: Cow::Borrowed(source),
        })
    }
}

/// Reads `<root>/<name>.wgsl` from disk on every request.
#[derive(Debug, Clone)]
pub struct DirectoryShaders {
    root: PathBuf,
}

impl DirectoryShaders {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ShaderLibrary for DirectoryShaders {
    fn shader(&self, name: &str, stage: ShaderStage) -> Result<ShaderCode, AssetError> {
        let path = self.root.join(format!("{name}.wgsl"));
        let source = std::fs::read_to_string(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                AssetError::UnknownShader {
                    name: name.to_string(),
                    stage,
                }
            } else {
                AssetError::Io { path: path.clone(), source }
            }
        })?;
        tracing::debug!("Loaded shader {}", path.display());
        Ok(ShaderCode {
            name: name.to_string(),
            stage,
            entry_point: stage.entry_point(),
            source: Cow::Owned(source),
        })
    }
}
