//! Sprite pipelines, one per batch strategy
//!
//! Bind group 0 (camera, texture, sampler) is shared by every strategy.
//! Storage pull adds group 1 holding the sprite records.

use crate::backend::PipelineDesc;
use crate::encoder::EncodeStrategy;
use crate::error::BackendError;
use crate::instance::{QuadVertex, SpriteInstance, SpriteVertex};
use bunnymark_asset::ShaderCode;
use wgpu::util::DeviceExt;

static VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2, 2 => Float32x4];

static QUAD_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

// Offsets follow SpriteInstance, skipping its padding.
static INSTANCE_ATTRIBUTES: [wgpu::VertexAttribute; 4] = [
    wgpu::VertexAttribute {
        format: wgpu::VertexFormat::Float32x4,
        offset: 0,
        shader_location: 2,
    },
    wgpu::VertexAttribute {
        format: wgpu::VertexFormat::Float32x2,
        offset: 16,
        shader_location: 3,
    },
    wgpu::VertexAttribute {
        format: wgpu::VertexFormat::Float32x4,
        offset: 32,
        shader_location: 4,
    },
    wgpu::VertexAttribute {
        format: wgpu::VertexFormat::Float32x4,
        offset: 48,
        shader_location: 5,
    },
];

pub(super) struct SpritePipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub frame_group: wgpu::BindGroup,
    /// Layout of the sprite record group, storage pull only.
    pub batch_layout: Option<wgpu::BindGroupLayout>,
}

impl SpritePipeline {
    /// Bind `buffer` as the storage array the pull shader indexes.
    pub fn batch_group(&self, device: &wgpu::Device, buffer: &wgpu::Buffer) -> Option<wgpu::BindGroup> {
        let layout = self.batch_layout.as_ref()?;
        Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Sprite Records"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        }))
    }
}

fn vertex_layouts(strategy: EncodeStrategy) -> Vec<wgpu::VertexBufferLayout<'static>> {
    match strategy {
        EncodeStrategy::VertexDuplication => vec![wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<SpriteVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &VERTEX_ATTRIBUTES,
        }],
        EncodeStrategy::InstanceAttribute => vec![
            wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &QUAD_ATTRIBUTES,
            },
            wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<SpriteInstance>() as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Instance,
                attributes: &INSTANCE_ATTRIBUTES,
            },
        ],
        EncodeStrategy::StorageBufferPull => Vec::new(),
    }
}

fn shader_module(device: &wgpu::Device, code: &ShaderCode) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&code.name),
        source: wgpu::ShaderSource::Wgsl(code.source.clone()),
    })
}

/// Compile the pipeline for `desc` and bind its camera and texture.
///
/// Validation errors are captured in an error scope and returned instead of
/// reaching the device's uncaptured error handler.
pub(super) fn build(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    desc: &PipelineDesc<'_>,
    texture: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
) -> Result<SpritePipeline, BackendError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let camera = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Camera Uniform"),
        contents: bytemuck::bytes_of(&desc.projection.to_cols_array()),
        usage: wgpu::BufferUsages::UNIFORM,
    });

    let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Sprite Frame Layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    });

    let frame_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Sprite Frame Group"),
        layout: &frame_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: camera.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(texture),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    });

    let batch_layout = (desc.strategy == EncodeStrategy::StorageBufferPull).then(|| {
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Sprite Records Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        })
    });

    let mut layouts = vec![&frame_layout];
    layouts.extend(batch_layout.as_ref());
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Sprite Pipeline Layout"),
        bind_group_layouts: &layouts,
        push_constant_ranges: &[],
    });

    let vertex_module = shader_module(device, desc.vertex);
    let fragment_module = shader_module(device, desc.fragment);
    let buffers = vertex_layouts(desc.strategy);

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Sprite Pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &vertex_module,
            entry_point: Some(desc.vertex.entry_point),
            buffers: &buffers,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &fragment_module,
            entry_point: Some(desc.fragment.entry_point),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
        cache: None,
    });

    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        return Err(BackendError::Pipeline {
            strategy: desc.strategy,
            reason: error.to_string(),
        });
    }

    Ok(SpritePipeline {
        pipeline,
        frame_group,
        batch_layout,
    })
}
