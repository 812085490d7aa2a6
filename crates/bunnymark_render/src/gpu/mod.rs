//! wgpu backend
//!
//! Draws into a window surface. Per-frame transient buffers are dropped at
//! present; wgpu keeps their memory alive until the GPU is done with them.

mod pipeline;

use crate::backend::{
    check_bounds, BufferHandle, BufferKind, FrameSubmission, GraphicsBackend, PipelineDesc,
    PipelineHandle, Region, SubmissionToken, TextureHandle,
};
use crate::encoder::EncodeStrategy;
use crate::error::BackendError;
use crate::{BackendType, DeviceCapabilities};
use bunnymark_asset::{PixelFormat, SpriteImage};
use pipeline::SpritePipeline;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use winit::window::Window;

/// Clear color behind the sprites.
pub const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.5,
    g: 0.5,
    b: 1.0,
    a: 1.0,
};

/// Surface settings chosen at startup.
#[derive(Debug, Clone)]
pub struct GpuConfig {
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
    pub clear_color: wgpu::Color,
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            vsync: false,
            clear_color: CLEAR_COLOR,
        }
    }
}

struct GpuBuffer {
    buffer: wgpu::Buffer,
    size: u64,
}

pub struct WgpuBackend {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    capabilities: DeviceCapabilities,
    clear_color: wgpu::Color,
    sampler: wgpu::Sampler,
    buffers: HashMap<BufferHandle, GpuBuffer>,
    textures: HashMap<TextureHandle, wgpu::TextureView>,
    pipelines: HashMap<PipelineHandle, SpritePipeline>,
    batch_groups: HashMap<BufferHandle, wgpu::BindGroup>,
    transient: Vec<BufferHandle>,
    frame: Option<wgpu::SurfaceTexture>,
    next_handle: u64,
    next_token: u64,
    completed: Arc<AtomicU64>,
    in_flight: InFlight<wgpu::SubmissionIndex>,
}

/// Submissions the GPU may still be reading, oldest first.
struct InFlight<I> {
    entries: VecDeque<(SubmissionToken, I)>,
}

impl<I: Clone> InFlight<I> {
    fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    fn push(&mut self, token: SubmissionToken, index: I) {
        self.entries.push_back((token, index));
    }

    fn index_of(&self, token: SubmissionToken) -> Option<I> {
        self.entries
            .iter()
            .find(|(t, _)| *t == token)
            .map(|(_, index)| index.clone())
    }

    /// Drop every entry whose token is at or below `completed`.
    fn forget_completed(&mut self, completed: u64) {
        while self
            .entries
            .front()
            .is_some_and(|(token, _)| token.id() <= completed)
        {
            self.entries.pop_front();
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

impl WgpuBackend {
    pub async fn new(window: Arc<Window>, config: GpuConfig) -> Result<Self, BackendError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .map_err(|e| BackendError::Surface(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(BackendError::NoAdapter)?;

        let info = adapter.get_info();
        let limits = adapter.limits();
        let downlevel = adapter.get_downlevel_capabilities();

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Bunnymark Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits.clone(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| BackendError::Device(e.to_string()))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| BackendError::Surface("surface reports no formats".to_string()))?;

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: config.width.max(1),
            height: config.height.max(1),
            present_mode: if config.vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let capabilities = DeviceCapabilities {
            backend: backend_type(info.backend),
            max_buffer_size: limits.max_buffer_size,
            max_storage_binding_size: u64::from(limits.max_storage_buffer_binding_size),
            supports_instancing: true,
            supports_vertex_storage: downlevel
                .flags
                .contains(wgpu::DownlevelFlags::VERTEX_STORAGE)
                && limits.max_storage_buffers_per_shader_stage > 0,
            transient_allocation: true,
            ordered_uploads: true,
            completion_signals: true,
        };

        tracing::info!(
            adapter = %info.name,
            backend = ?info.backend,
            ?format,
            present_mode = ?surface_config.present_mode,
            vertex_storage = capabilities.supports_vertex_storage,
            "GPU initialized"
        );

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Sprite Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Ok(Self {
            surface,
            device,
            queue,
            config: surface_config,
            capabilities,
            clear_color: config.clear_color,
            sampler,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            pipelines: HashMap::new(),
            batch_groups: HashMap::new(),
            transient: Vec::new(),
            frame: None,
            next_handle: 0,
            next_token: 1,
            completed: Arc::new(AtomicU64::new(0)),
            in_flight: InFlight::new(),
        })
    }

    /// Reconfigure the surface for a new window size. Zero sizes are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
    }

    /// Reconfigure the surface after it was lost or went stale.
    pub fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }

    fn next_handle(&mut self) -> u64 {
        let id = self.next_handle;
        self.next_handle += 1;
        id
    }

    fn allocate(&mut self, kind: BufferKind, size: u64, label: &str) -> BufferHandle {
        let usage = match kind {
            BufferKind::Vertex | BufferKind::Instance => wgpu::BufferUsages::VERTEX,
            BufferKind::Index => wgpu::BufferUsages::INDEX,
            BufferKind::Storage => wgpu::BufferUsages::STORAGE,
        };
        let size = size.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: usage | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let handle = BufferHandle::from_raw(self.next_handle());
        self.buffers.insert(handle, GpuBuffer { buffer, size });
        handle
    }

    fn buffer(&self, handle: BufferHandle) -> Result<&wgpu::Buffer, BackendError> {
        self.buffers
            .get(&handle)
            .map(|b| &b.buffer)
            .ok_or(BackendError::UnknownHandle {
                kind: "buffer",
                id: handle.id(),
            })
    }

    fn acquire_frame(&self) -> Result<wgpu::SurfaceTexture, BackendError> {
        match self.surface.get_current_texture() {
            Ok(frame) => Ok(frame),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                Err(BackendError::SurfaceLost)
            }
            Err(wgpu::SurfaceError::OutOfMemory) => Err(BackendError::OutOfMemory),
            Err(e) => Err(BackendError::Surface(e.to_string())),
        }
    }

    fn forget_completed(&mut self) {
        let completed = self.completed.load(Ordering::Acquire);
        self.in_flight.forget_completed(completed);
        tracing::trace!(in_flight = self.in_flight.len(), completed, "Submissions pending");
    }
}

fn backend_type(backend: wgpu::Backend) -> BackendType {
    match backend {
        wgpu::Backend::Metal => BackendType::Metal,
        wgpu::Backend::Dx12 => BackendType::DirectX12,
        wgpu::Backend::Vulkan => BackendType::Vulkan,
        wgpu::Backend::Gl => BackendType::OpenGL,
        wgpu::Backend::BrowserWebGpu => BackendType::WebGpu,
        wgpu::Backend::Empty => BackendType::Headless,
    }
}

impl GraphicsBackend for WgpuBackend {
    fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    fn create_buffer(&mut self, kind: BufferKind, size: u64) -> Result<BufferHandle, BackendError> {
        Ok(self.allocate(kind, size, "Sprite Buffer"))
    }

    fn acquire_transient(&mut self, kind: BufferKind, size: u64) -> Result<Region, BackendError> {
        let handle = self.allocate(kind, size, "Transient Sprite Buffer");
        self.transient.push(handle);
        Ok(Region::whole(handle, size))
    }

    fn upload(&mut self, region: &Region, bytes: &[u8]) -> Result<(), BackendError> {
        let target = self
            .buffers
            .get(&region.buffer)
            .ok_or(BackendError::UnknownHandle {
                kind: "buffer",
                id: region.buffer.id(),
            })?;
        check_bounds(region, bytes.len(), target.size)?;
        if !bytes.is_empty() {
            self.queue.write_buffer(&target.buffer, region.offset, bytes);
        }
        Ok(())
    }

    fn create_texture(&mut self, image: &SpriteImage) -> Result<TextureHandle, BackendError> {
        let size = wgpu::Extent3d {
            width: image.width(),
            height: image.height(),
            depth_or_array_layers: 1,
        };
        let format = match image.format() {
            PixelFormat::Rgba8 => wgpu::TextureFormat::Rgba8UnormSrgb,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Sprite Texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            image.pixels(),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(image.stride()),
                rows_per_image: Some(image.height()),
            },
            size,
        );

        let handle = TextureHandle::from_raw(self.next_handle());
        self.textures
            .insert(handle, texture.create_view(&wgpu::TextureViewDescriptor::default()));
        Ok(handle)
    }

    fn create_pipeline(&mut self, desc: &PipelineDesc<'_>) -> Result<PipelineHandle, BackendError> {
        let texture = self
            .textures
            .get(&desc.texture)
            .ok_or(BackendError::UnknownHandle {
                kind: "texture",
                id: desc.texture.id(),
            })?;
        let built = pipeline::build(&self.device, self.config.format, desc, texture, &self.sampler)?;
        let handle = PipelineHandle::from_raw(self.next_handle());
        self.pipelines.insert(handle, built);
        Ok(handle)
    }

    fn submit(&mut self, frame: &FrameSubmission) -> Result<SubmissionToken, BackendError> {
        let pipeline = self
            .pipelines
            .get(&frame.pipeline)
            .ok_or(BackendError::UnknownHandle {
                kind: "pipeline",
                id: frame.pipeline.id(),
            })?;

        if frame.strategy == EncodeStrategy::StorageBufferPull
            && !self.batch_groups.contains_key(&frame.batch.buffer)
        {
            let buffer = self.buffer(frame.batch.buffer)?;
            if let Some(group) = pipeline.batch_group(&self.device, buffer) {
                self.batch_groups.insert(frame.batch.buffer, group);
            }
        }

        let batch = self.buffer(frame.batch.buffer)?;
        let vertices = frame.geometry.vertices.map(|h| self.buffer(h)).transpose()?;
        let indices = frame.geometry.indices.map(|h| self.buffer(h)).transpose()?;

        let output = self.acquire_frame()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Sprite Batch Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Sprite Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_pipeline(&pipeline.pipeline);
            render_pass.set_bind_group(0, &pipeline.frame_group, &[]);

            let batch = batch.slice(frame.batch.offset..frame.batch.end());
            match frame.strategy {
                EncodeStrategy::VertexDuplication => render_pass.set_vertex_buffer(0, batch),
                EncodeStrategy::InstanceAttribute => {
                    if let Some(quad) = vertices {
                        render_pass.set_vertex_buffer(0, quad.slice(..));
                    }
                    render_pass.set_vertex_buffer(1, batch);
                }
                EncodeStrategy::StorageBufferPull => {
                    if let Some(group) = self.batch_groups.get(&frame.batch.buffer) {
                        render_pass.set_bind_group(1, group, &[]);
                    }
                }
            }

            let draw = frame.draw;
            match (draw.indexed, indices) {
                (true, Some(indices)) => {
                    render_pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                    render_pass.draw_indexed(0..draw.elements, 0, 0..draw.instances);
                }
                _ => render_pass.draw(0..draw.elements, 0..draw.instances),
            }
        }

        let index = self.queue.submit(std::iter::once(encoder.finish()));
        let token = SubmissionToken::from_raw(self.next_token);
        self.next_token += 1;

        let completed = Arc::clone(&self.completed);
        let id = token.id();
        self.queue.on_submitted_work_done(move || {
            completed.fetch_max(id, Ordering::AcqRel);
        });
        self.forget_completed();
        self.in_flight.push(token, index);
        self.frame = Some(output);
        Ok(token)
    }

    fn is_complete(&mut self, token: SubmissionToken) -> bool {
        let _ = self.device.poll(wgpu::Maintain::Poll);
        self.forget_completed();
        self.completed.load(Ordering::Acquire) >= token.id()
    }

    fn wait(&mut self, token: SubmissionToken) -> Result<(), BackendError> {
        if let Some(index) = self.in_flight.index_of(token) {
            let _ = self.device.poll(wgpu::Maintain::WaitForSubmissionIndex(index));
        }
        self.completed.fetch_max(token.id(), Ordering::AcqRel);
        self.forget_completed();
        Ok(())
    }

    fn present(&mut self) -> Result<(), BackendError> {
        if let Some(frame) = self.frame.take() {
            frame.present();
        }
        for handle in self.transient.drain(..) {
            self.buffers.remove(&handle);
            self.batch_groups.remove(&handle);
        }
        // Fire completion callbacks even when no pool slot asks about them.
        let _ = self.device.poll(wgpu::Maintain::Poll);
        self.forget_completed();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(id: u64) -> SubmissionToken {
        SubmissionToken::from_raw(id)
    }

    #[test]
    fn test_in_flight_stays_bounded_by_gpu_lag() {
        let mut in_flight = InFlight::new();
        for id in 1..=1000u64 {
            in_flight.forget_completed(id.saturating_sub(3));
            in_flight.push(token(id), id * 10);
            assert!(in_flight.len() <= 3, "{} pending after token {id}", in_flight.len());
        }
    }

    #[test]
    fn test_in_flight_finds_pending_index() {
        let mut in_flight = InFlight::new();
        in_flight.push(token(1), 10u64);
        in_flight.push(token(2), 20);
        assert_eq!(in_flight.index_of(token(2)), Some(20));

        in_flight.forget_completed(1);
        assert_eq!(in_flight.len(), 1);
        assert_eq!(in_flight.index_of(token(1)), None);

        in_flight.forget_completed(5);
        assert_eq!(in_flight.len(), 0);
    }
}
