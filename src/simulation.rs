/*
 * Simulation State Store Module
 *
 * This module owns the GPU-resident flock state: a ping-pong pair of
 * rgba32float textures for positions and another pair for velocities, one
 * texel per agent. Each frame the velocity kernel and then the position
 * kernel read the previous step's snapshot through read-only bindings and
 * write the next step into the alternate buffers, after which the roles
 * swap. The kernels themselves are externally supplied WGSL programs; this
 * module only binds their uniforms and textures and orders the dispatches.
 */

use bytemuck::{Pod, Zeroable};
use nannou::wgpu;
use rand::Rng;
use thiserror::Error;

use crate::assets::KernelSources;
use crate::params::SimulationParams;
use crate::BOUNDS_HALF;

// Work-group edge length declared by the compute kernels
pub const WORKGROUP_SIZE: u32 = 8;

#[derive(Debug, Error)]
pub enum KernelError {
    #[error("{kernel} kernel rejected by the compute backend: {message}")]
    Rejected { kernel: &'static str, message: String },
}

// Per-frame scheduler state, written every step
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct FrameUniforms {
    delta: f32,
    time: f32,
    bounds_half: f32,
    _pad: f32,
}

// Live tunables, re-uploaded only when the settings version moves
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct FlockUniforms {
    separation_distance: f32,
    alignment_distance: f32,
    cohesion_distance: f32,
    _pad: f32,
}

const _: () = assert!(
    std::mem::size_of::<FrameUniforms>() == 16,
    "size of FrameUniforms does not match WGSL"
);
const _: () = assert!(
    std::mem::size_of::<FlockUniforms>() == 16,
    "size of FlockUniforms does not match WGSL"
);

pub struct SimulationContext {
    frame_uniforms: wgpu::Buffer,
    flock_uniforms: wgpu::Buffer,

    position_views: [wgpu::TextureViewHandle; 2],
    velocity_views: [wgpu::TextureViewHandle; 2],

    velocity_pipeline: wgpu::ComputePipeline,
    position_pipeline: wgpu::ComputePipeline,
    // One bind group per ping-pong parity, indexed by the current buffer
    velocity_bind_groups: [wgpu::BindGroup; 2],
    position_bind_groups: [wgpu::BindGroup; 2],

    workgroups: u32,
    current: usize,
}

impl SimulationContext {
    // Build the state textures, seed them, and install both kernels. A
    // kernel the backend rejects is reported and nothing is installed; the
    // simulation then never starts.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        sources: &KernelSources,
        grid_width: u32,
        rng: &mut impl Rng,
    ) -> Result<Self, KernelError> {
        let agent_count = (grid_width * grid_width) as usize;

        let position_textures = [
            create_state_texture(device, "position texture 0", grid_width),
            create_state_texture(device, "position texture 1", grid_width),
        ];
        let velocity_textures = [
            create_state_texture(device, "velocity texture 0", grid_width),
            create_state_texture(device, "velocity texture 1", grid_width),
        ];

        // State is reseeded on every process start; both parities receive
        // the same snapshot so the first step reads defined data either way.
        let position_texels = seed_positions(agent_count, rng);
        let velocity_texels = seed_velocities(agent_count, rng);
        for texture in &position_textures {
            upload_state_texels(queue, texture, grid_width, &position_texels);
        }
        for texture in &velocity_textures {
            upload_state_texels(queue, texture, grid_width, &velocity_texels);
        }

        let position_views = [
            position_textures[0].create_view(&wgpu::TextureViewDescriptor::default()),
            position_textures[1].create_view(&wgpu::TextureViewDescriptor::default()),
        ];
        let velocity_views = [
            velocity_textures[0].create_view(&wgpu::TextureViewDescriptor::default()),
            velocity_textures[1].create_view(&wgpu::TextureViewDescriptor::default()),
        ];

        let frame_uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame uniforms"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let flock_uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("flock uniforms"),
            size: std::mem::size_of::<FlockUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // Velocity kernel: reads the previous position/velocity snapshot,
        // writes the next velocity
        let velocity_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("velocity kernel layout"),
            entries: &[
                uniform_entry(0),
                uniform_entry(1),
                read_texture_entry(2),
                read_texture_entry(3),
                write_texture_entry(4),
            ],
        });
        // Position kernel: reads the previous position and the freshly
        // written velocity, writes the next position
        let position_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("position kernel layout"),
            entries: &[
                uniform_entry(0),
                read_texture_entry(1),
                read_texture_entry(2),
                write_texture_entry(3),
            ],
        });

        let velocity_pl = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("velocity kernel pipeline layout"),
            bind_group_layouts: &[&velocity_layout],
            push_constant_ranges: &[],
        });
        let position_pl = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("position kernel pipeline layout"),
            bind_group_layouts: &[&position_layout],
            push_constant_ranges: &[],
        });

        let velocity_pipeline = validated(device, "velocity", || {
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("velocity kernel"),
                source: wgpu::ShaderSource::Wgsl(sources.velocity.as_str().into()),
            });
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("velocity kernel"),
                layout: Some(&velocity_pl),
                module: &module,
                entry_point: "main",
            })
        })?;
        let position_pipeline = validated(device, "position", || {
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("position kernel"),
                source: wgpu::ShaderSource::Wgsl(sources.position.as_str().into()),
            });
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("position kernel"),
                layout: Some(&position_pl),
                module: &module,
                entry_point: "main",
            })
        })?;

        // With `src` as the current parity: the velocity kernel reads
        // pos[src]/vel[src] and writes vel[1-src]; the position kernel reads
        // pos[src]/vel[1-src] and writes pos[1-src].
        let velocity_bind_groups = [0usize, 1].map(|src| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("velocity kernel bind group"),
                layout: &velocity_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: frame_uniforms.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: flock_uniforms.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(&position_views[src]),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::TextureView(&velocity_views[src]),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: wgpu::BindingResource::TextureView(&velocity_views[1 - src]),
                    },
                ],
            })
        });
        let position_bind_groups = [0usize, 1].map(|src| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("position kernel bind group"),
                layout: &position_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: frame_uniforms.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&position_views[src]),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(&velocity_views[1 - src]),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::TextureView(&position_views[1 - src]),
                    },
                ],
            })
        });

        Ok(Self {
            frame_uniforms,
            flock_uniforms,
            position_views,
            velocity_views,
            velocity_pipeline,
            position_pipeline,
            velocity_bind_groups,
            position_bind_groups,
            workgroups: (grid_width + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE,
            current: 0,
        })
    }

    // Scheduler state for this step; delta arrives already clamped
    pub fn write_frame_uniforms(&self, queue: &wgpu::Queue, delta: f32, time: f32) {
        let uniforms = FrameUniforms {
            delta,
            time,
            bounds_half: BOUNDS_HALF,
            _pad: 0.0,
        };
        queue.write_buffer(&self.frame_uniforms, 0, bytemuck::bytes_of(&uniforms));
    }

    // Push the current panel values; called when the settings version moves
    pub fn write_flock_uniforms(&self, queue: &wgpu::Queue, params: &SimulationParams) {
        let uniforms = FlockUniforms {
            separation_distance: params.separation,
            alignment_distance: params.alignment,
            cohesion_distance: params.cohesion,
            _pad: 0.0,
        };
        queue.write_buffer(&self.flock_uniforms, 0, bytemuck::bytes_of(&uniforms));
    }

    // Record one simulation step. The two kernels go into separate compute
    // passes of the same encoder, so the velocity written by the first pass
    // is complete before the position kernel reads it; the parity swap at
    // the end transfers buffer ownership for the next step.
    pub fn step(&mut self, encoder: &mut wgpu::CommandEncoder) {
        let src = self.current;
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("velocity kernel"),
            });
            pass.set_pipeline(&self.velocity_pipeline);
            pass.set_bind_group(0, &self.velocity_bind_groups[src], &[]);
            pass.dispatch_workgroups(self.workgroups, self.workgroups, 1);
        }
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("position kernel"),
            });
            pass.set_pipeline(&self.position_pipeline);
            pass.set_bind_group(0, &self.position_bind_groups[src], &[]);
            pass.dispatch_workgroups(self.workgroups, self.workgroups, 1);
        }
        self.current = 1 - src;
    }

    // Parity of the most recently written buffers, for the render pass
    pub fn current(&self) -> usize {
        self.current
    }

    pub fn position_view(&self, parity: usize) -> &wgpu::TextureViewHandle {
        &self.position_views[parity]
    }

    pub fn velocity_view(&self, parity: usize) -> &wgpu::TextureViewHandle {
        &self.velocity_views[parity]
    }
}

// Initial position texels: uniform inside the cubic bounds, w = 1
pub fn seed_positions(agent_count: usize, rng: &mut impl Rng) -> Vec<f32> {
    let mut texels = Vec::with_capacity(agent_count * 4);
    for _ in 0..agent_count {
        texels.push(rng.gen_range(-BOUNDS_HALF..=BOUNDS_HALF));
        texels.push(rng.gen_range(-BOUNDS_HALF..=BOUNDS_HALF));
        texels.push(rng.gen_range(-BOUNDS_HALF..=BOUNDS_HALF));
        texels.push(1.0);
    }
    texels
}

// Initial velocity texels: uniform in [-5, 5] per axis, w = 1
pub fn seed_velocities(agent_count: usize, rng: &mut impl Rng) -> Vec<f32> {
    let mut texels = Vec::with_capacity(agent_count * 4);
    for _ in 0..agent_count {
        texels.push(rng.gen_range(-5.0..=5.0));
        texels.push(rng.gen_range(-5.0..=5.0));
        texels.push(rng.gen_range(-5.0..=5.0));
        texels.push(1.0);
    }
    texels
}

// Wrap rule the position kernel applies after integration: a component past
// one face re-enters through the opposite face, it is never clamped. This is
// the host-side mirror of the WGSL in assets/shaders/position.wgsl.
pub fn wrap_axis(value: f32, half_width: f32) -> f32 {
    if value > half_width {
        value - 2.0 * half_width
    } else if value < -half_width {
        value + 2.0 * half_width
    } else {
        value
    }
}

// Run `build` under a validation error scope so a rejected kernel becomes a
// reportable error instead of an uncaptured device panic
pub(crate) fn validated<T>(
    device: &wgpu::Device,
    kernel: &'static str,
    build: impl FnOnce() -> T,
) -> Result<T, KernelError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = build();
    match pollster::block_on(device.pop_error_scope()) {
        Some(error) => Err(KernelError::Rejected {
            kernel,
            message: error.to_string(),
        }),
        None => Ok(value),
    }
}

fn create_state_texture(device: &wgpu::Device, label: &str, grid_width: u32) -> wgpu::TextureHandle {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: grid_width,
            height: grid_width,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba32Float,
        usage: wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::STORAGE_BINDING
            | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    })
}

fn upload_state_texels(
    queue: &wgpu::Queue,
    texture: &wgpu::TextureHandle,
    grid_width: u32,
    texels: &[f32],
) {
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        bytemuck::cast_slice(texels),
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(grid_width * 16),
            rows_per_image: Some(grid_width),
        },
        wgpu::Extent3d {
            width: grid_width,
            height: grid_width,
            depth_or_array_layers: 1,
        },
    );
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn read_texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn write_texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::StorageTexture {
            access: wgpu::StorageTextureAccess::WriteOnly,
            format: wgpu::TextureFormat::Rgba32Float,
            view_dimension: wgpu::TextureViewDimension::D2,
        },
        count: None,
    }
}
