//! Bunnymark Render System
//!
//! The per-frame pipeline that turns the sprite population into GPU batches:
//! batch encoding, write-target cycling and frame submission. Device,
//! window and shader handling sit behind [`backend::GraphicsBackend`].

pub mod backend;
pub mod cycler;
pub mod driver;
pub mod encoder;
pub mod error;
pub mod gpu;
pub mod headless;
pub mod instance;
pub mod window;

pub use wgpu;
pub use winit;

pub use backend::{
    BufferHandle, BufferKind, DrawCall, FrameSubmission, GeometryBuffers, GraphicsBackend,
    PipelineDesc, PipelineHandle, Region, SubmissionToken, TextureHandle,
};
pub use cycler::{CyclePolicy, FrameBufferCycler};
pub use driver::{
    DriverConfig, FrameLimit, FrameReport, FrameState, QuitSignal, RunSummary, SubmissionDriver,
};
pub use encoder::{BatchEncoder, EncodeStrategy};
pub use error::{BackendError, ConfigError, CycleError, DriverError, EncodeError};
pub use headless::{Completion, HeadlessBackend};
pub use instance::{SpriteAppearance, SpriteInstance, SpriteVertex};

/// Graphics API a backend drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// Metal (macOS, iOS)
    Metal,
    /// DirectX 12 (Windows)
    DirectX12,
    /// Vulkan (cross-platform)
    Vulkan,
    /// OpenGL / GLES (fallback)
    OpenGL,
    /// WebGPU in a browser
    WebGpu,
    /// No GPU at all; buffers live in host memory
    Headless,
}

/// What a backend can do. Checked once at startup against the chosen batch
/// strategy and cycling policy.
#[derive(Debug, Clone)]
pub struct DeviceCapabilities {
    pub backend: BackendType,
    pub max_buffer_size: u64,
    pub max_storage_binding_size: u64,
    /// Fixed-function instance-rate vertex attributes.
    pub supports_instancing: bool,
    /// Read-only storage buffers visible to the vertex stage.
    pub supports_vertex_storage: bool,
    /// Fresh per-frame regions that never alias in-flight ones.
    pub transient_allocation: bool,
    /// Uploads are ordered before any later submission reads the buffer.
    pub ordered_uploads: bool,
    /// Submissions report when the GPU is done with them.
    pub completion_signals: bool,
}

impl DeviceCapabilities {
    /// Everything supported, with generous limits.
    pub fn full(backend: BackendType) -> Self {
        Self {
            backend,
            max_buffer_size: 1 << 30,
            max_storage_binding_size: 1 << 30,
            supports_instancing: true,
            supports_vertex_storage: true,
            transient_allocation: true,
            ordered_uploads: true,
            completion_signals: true,
        }
    }
}
