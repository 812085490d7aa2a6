//! Rendering backend abstraction
//!
//! The frame pipeline only ever talks to a [`GraphicsBackend`]. The wgpu
//! implementation lives in [`crate::gpu`], the host-memory one used by tests
//! and headless runs in [`crate::headless`].

use crate::encoder::EncodeStrategy;
use crate::error::BackendError;
use crate::DeviceCapabilities;
use bunnymark_asset::{ShaderCode, SpriteImage};
use glam::Mat4;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            pub fn from_raw(id: u64) -> Self {
                Self(id)
            }

            pub fn id(&self) -> u64 {
                self.0
            }
        }
    };
}

handle!(
    /// GPU buffer owned by a backend.
    BufferHandle
);
handle!(
    /// Sampled sprite texture.
    TextureHandle
);
handle!(
    /// Compiled sprite pipeline with its bound camera and texture.
    PipelineHandle
);
handle!(
    /// Completion signal for one submission. Tokens increase monotonically.
    SubmissionToken
);

/// How a buffer is bound when drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Vertex,
    Index,
    Instance,
    Storage,
}

/// A byte range of a backend buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub buffer: BufferHandle,
    pub offset: u64,
    pub size: u64,
}

impl Region {
    /// The first `size` bytes of `buffer`.
    pub fn whole(buffer: BufferHandle, size: u64) -> Self {
        Self {
            buffer,
            offset: 0,
            size,
        }
    }

    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

/// Draw parameters for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCall {
    /// Vertices, or indices when `indexed`.
    pub elements: u32,
    pub instances: u32,
    pub indexed: bool,
}

/// Buffers uploaded once at startup and reused every frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeometryBuffers {
    pub vertices: Option<BufferHandle>,
    pub indices: Option<BufferHandle>,
}

/// Everything needed to record one frame's draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSubmission {
    pub pipeline: PipelineHandle,
    pub strategy: EncodeStrategy,
    pub batch: Region,
    pub geometry: GeometryBuffers,
    pub draw: DrawCall,
}

/// Pipeline creation request.
pub struct PipelineDesc<'a> {
    pub strategy: EncodeStrategy,
    pub vertex: &'a ShaderCode,
    pub fragment: &'a ShaderCode,
    pub texture: TextureHandle,
    pub projection: Mat4,
}

/// The device, swapchain and shader surface the frame pipeline drives.
pub trait GraphicsBackend {
    fn capabilities(&self) -> &DeviceCapabilities;

    /// Allocate a buffer that lives until the backend is dropped.
    fn create_buffer(&mut self, kind: BufferKind, size: u64) -> Result<BufferHandle, BackendError>;

    /// A fresh region that no in-flight submission reads. Released by the
    /// backend once the frame using it has completed.
    fn acquire_transient(&mut self, kind: BufferKind, size: u64) -> Result<Region, BackendError>;

    /// Copy `bytes` into the start of `region`.
    fn upload(&mut self, region: &Region, bytes: &[u8]) -> Result<(), BackendError>;

    fn create_texture(&mut self, image: &SpriteImage) -> Result<TextureHandle, BackendError>;

    fn create_pipeline(&mut self, desc: &PipelineDesc<'_>) -> Result<PipelineHandle, BackendError>;

    /// Record and queue one frame. The returned token completes once the GPU
    /// has finished reading every buffer the frame references.
    fn submit(&mut self, frame: &FrameSubmission) -> Result<SubmissionToken, BackendError>;

    fn is_complete(&mut self, token: SubmissionToken) -> bool;

    /// Block until `token` has completed.
    fn wait(&mut self, token: SubmissionToken) -> Result<(), BackendError>;

    fn present(&mut self) -> Result<(), BackendError>;
}

/// Check an upload against the size of the buffer it targets.
pub(crate) fn check_bounds(region: &Region, len: usize, size: u64) -> Result<(), BackendError> {
    let len = len as u64;
    if len > region.size || region.offset + len > size {
        return Err(BackendError::OutOfBounds {
            offset: region.offset,
            len,
            size,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_order_by_submission() {
        let first = SubmissionToken::from_raw(1);
        let second = SubmissionToken::from_raw(2);
        assert!(first < second);
        assert_eq!(second.id(), 2);
    }

    #[test]
    fn test_bounds_check() {
        let region = Region {
            buffer: BufferHandle::from_raw(0),
            offset: 64,
            size: 64,
        };
        assert_eq!(region.end(), 128);
        assert!(check_bounds(&region, 64, 128).is_ok());
        assert!(check_bounds(&region, 65, 256).is_err());
        assert!(check_bounds(&region, 64, 100).is_err());
    }
}
