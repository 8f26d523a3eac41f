/*
 * Renderer Module
 *
 * This module draws the whole flock in a single indexed draw call. The
 * vertex stage of the externally supplied render kernel looks up each
 * vertex's agent state in the current position/velocity textures and its
 * baked displacement in the animation texture; the host never touches
 * per-agent data after the buffers are built. The visible-agent count is an
 * index-range cutoff, not a buffer rebuild.
 */

use bytemuck::{Pod, Zeroable};
use nannou::prelude::*;
use nannou::wgpu::{self, DeviceExt};

use crate::baker::AnimationTexture;
use crate::geometry::InstanceGeometry;
use crate::simulation::{validated, KernelError, SimulationContext};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

// Per-frame render state; matches the uniform block in bird.wgsl
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct RenderUniforms {
    view_proj: [[f32; 4]; 4],
    time: f32,
    size: f32,
    anim_row: f32,
    duration_frames: f32,
}

const _: () = assert!(
    std::mem::size_of::<RenderUniforms>() == 80,
    "size of RenderUniforms does not match WGSL"
);

pub struct FlockRenderer {
    render_pipeline: wgpu::RenderPipeline,
    // One bind group per simulation parity
    bind_groups: [wgpu::BindGroup; 2],
    uniform_buffer: wgpu::Buffer,

    position_buffer: wgpu::Buffer,
    color_buffer: wgpu::Buffer,
    reference_buffer: wgpu::Buffer,
    seed_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,

    indices_per_agent: u32,
    total_indices: u32,
    duration_frames: u32,

    depth_view: wgpu::TextureViewHandle,
    depth_size: [u32; 2],
    msaa_samples: u32,
}

impl FlockRenderer {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        render_source: &str,
        geometry: &InstanceGeometry,
        animation: &AnimationTexture,
        simulation: &SimulationContext,
        dst_format: wgpu::TextureFormat,
        msaa_samples: u32,
        frame_size: [u32; 2],
    ) -> Result<Self, KernelError> {
        // Static instance buffers, uploaded once
        let position_buffer = device.create_buffer_init(&wgpu::BufferInitDescriptor {
            label: Some("flock vertex positions"),
            contents: bytemuck::cast_slice(&geometry.positions),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let color_buffer = device.create_buffer_init(&wgpu::BufferInitDescriptor {
            label: Some("flock vertex colors"),
            contents: bytemuck::cast_slice(&geometry.colors),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let reference_buffer = device.create_buffer_init(&wgpu::BufferInitDescriptor {
            label: Some("flock vertex references"),
            contents: bytemuck::cast_slice(&geometry.references),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let seed_buffer = device.create_buffer_init(&wgpu::BufferInitDescriptor {
            label: Some("flock vertex seeds"),
            contents: bytemuck::cast_slice(&geometry.seeds),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::BufferInitDescriptor {
            label: Some("flock indices"),
            contents: bytemuck::cast_slice(&geometry.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let animation_view = upload_animation_texture(device, queue, animation);

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("render uniforms"),
            size: std::mem::size_of::<RenderUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("flock render layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                vertex_texture_entry(1),
                vertex_texture_entry(2),
                vertex_texture_entry(3),
            ],
        });

        let bind_groups = [0usize, 1].map(|parity| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("flock render bind group"),
                layout: &bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniform_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(
                            simulation.position_view(parity),
                        ),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(
                            simulation.velocity_view(parity),
                        ),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::TextureView(&animation_view),
                    },
                ],
            })
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("flock render pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        // position, color, reference, seeds: one tightly packed buffer each
        let vertex_layouts = [
            vertex_buffer_layout(12, &POSITION_ATTR),
            vertex_buffer_layout(12, &COLOR_ATTR),
            vertex_buffer_layout(16, &REFERENCE_ATTR),
            vertex_buffer_layout(16, &SEED_ATTR),
        ];

        let render_pipeline = validated(device, "render", || {
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("render kernel"),
                source: wgpu::ShaderSource::Wgsl(render_source.into()),
            });
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("flock render pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: "vs_main",
                    buffers: &vertex_layouts,
                },
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: "fs_main",
                    targets: &[Some(wgpu::ColorTargetState {
                        format: dst_format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::LessEqual,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState {
                    count: msaa_samples,
                    mask: !0,
                    alpha_to_coverage_enabled: false,
                },
                multiview: None,
            })
        })?;

        Ok(Self {
            render_pipeline,
            bind_groups,
            uniform_buffer,
            position_buffer,
            color_buffer,
            reference_buffer,
            seed_buffer,
            index_buffer,
            indices_per_agent: geometry.indices_per_agent,
            total_indices: geometry.total_indices(),
            duration_frames: animation.duration_frames,
            depth_view: create_depth_texture(device, frame_size, msaa_samples),
            depth_size: frame_size,
            msaa_samples,
        })
    }

    pub fn duration_frames(&self) -> u32 {
        self.duration_frames
    }

    // Per-frame uniforms; the settings size rides along with the camera and
    // animation state
    pub fn write_uniforms(
        &self,
        queue: &wgpu::Queue,
        view_proj: Mat4,
        time: f32,
        size: f32,
        anim_row: f32,
    ) {
        let uniforms = RenderUniforms {
            view_proj: view_proj.to_cols_array_2d(),
            time,
            size,
            anim_row,
            duration_frames: self.duration_frames as f32,
        };
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
    }

    // Recreate the depth attachment when the frame size changes
    pub fn ensure_depth_texture(&mut self, device: &wgpu::Device, frame_size: [u32; 2]) {
        if self.depth_size != frame_size {
            self.depth_view = create_depth_texture(device, frame_size, self.msaa_samples);
            self.depth_size = frame_size;
        }
    }

    // Draw the visible part of the flock reading the given parity of the
    // simulation textures
    pub fn draw(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureViewHandle,
        parity: usize,
        visible_count: u32,
    ) {
        let index_count = draw_index_count(self.indices_per_agent, visible_count, self.total_indices);

        let mut pass = wgpu::RenderPassBuilder::new()
            .color_attachment(target, |color| {
                color.load_op(wgpu::LoadOp::Clear(wgpu::Color {
                    r: 1.0,
                    g: 1.0,
                    b: 1.0,
                    a: 1.0,
                }))
            })
            .depth_stencil_attachment(&self.depth_view, |depth| depth)
            .begin(encoder);

        pass.set_pipeline(&self.render_pipeline);
        pass.set_bind_group(0, &self.bind_groups[parity], &[]);
        pass.set_vertex_buffer(0, self.position_buffer.slice(..));
        pass.set_vertex_buffer(1, self.color_buffer.slice(..));
        pass.set_vertex_buffer(2, self.reference_buffer.slice(..));
        pass.set_vertex_buffer(3, self.seed_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..index_count, 0, 0..1);
    }
}

// Leading index count for the requested visible-agent count. Zero visible
// agents submit zero indices while the simulation keeps stepping.
pub fn draw_index_count(indices_per_agent: u32, visible_count: u32, total_indices: u32) -> u32 {
    indices_per_agent.saturating_mul(visible_count).min(total_indices)
}

fn upload_animation_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    animation: &AnimationTexture,
) -> wgpu::TextureViewHandle {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("animation texture"),
        size: wgpu::Extent3d {
            width: animation.width,
            height: animation.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba32Float,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        bytemuck::cast_slice(&animation.texels),
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(animation.bytes_per_row()),
            rows_per_image: Some(animation.height),
        },
        wgpu::Extent3d {
            width: animation.width,
            height: animation.height,
            depth_or_array_layers: 1,
        },
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn create_depth_texture(
    device: &wgpu::Device,
    size: [u32; 2],
    msaa_samples: u32,
) -> wgpu::TextureViewHandle {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("flock depth texture"),
        size: wgpu::Extent3d {
            width: size[0].max(1),
            height: size[1].max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: msaa_samples,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

const POSITION_ATTR: [wgpu::VertexAttribute; 1] = [wgpu::VertexAttribute {
    format: wgpu::VertexFormat::Float32x3,
    offset: 0,
    shader_location: 0,
}];
const COLOR_ATTR: [wgpu::VertexAttribute; 1] = [wgpu::VertexAttribute {
    format: wgpu::VertexFormat::Float32x3,
    offset: 0,
    shader_location: 1,
}];
const REFERENCE_ATTR: [wgpu::VertexAttribute; 1] = [wgpu::VertexAttribute {
    format: wgpu::VertexFormat::Float32x4,
    offset: 0,
    shader_location: 2,
}];
const SEED_ATTR: [wgpu::VertexAttribute; 1] = [wgpu::VertexAttribute {
    format: wgpu::VertexFormat::Float32x4,
    offset: 0,
    shader_location: 3,
}];

fn vertex_buffer_layout<'a>(
    stride: u64,
    attributes: &'a [wgpu::VertexAttribute],
) -> wgpu::VertexBufferLayout<'a> {
    wgpu::VertexBufferLayout {
        array_stride: stride,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes,
    }
}
