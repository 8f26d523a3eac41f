/*
 * Application Module
 *
 * This module defines the main application model and the frame scheduler.
 * Startup is a single synchronous initialization: fetch assets, bake the
 * animation texture, build the instance geometry, seed the simulation
 * textures and install the kernels. Afterwards each displayed frame runs
 * exactly one simulation step (velocity kernel, then position kernel) and
 * one instanced draw; there is no catch-up stepping, a stalled frame only
 * produces a larger, clamped delta.
 */

use nannou::prelude::*;
use nannou::wgpu;
use nannou_egui::Egui;

use crate::assets::{self, AssetError, KernelSources};
use crate::baker::{self, AnimationTexture};
use crate::camera::Camera;
use crate::debug::DebugInfo;
use crate::geometry::{self, InstanceGeometry};
use crate::params::SimulationParams;
use crate::renderer::FlockRenderer;
use crate::simulation::{KernelError, SimulationContext};
use crate::ui;
use crate::{AGENT_COUNT, ANIMATION_FPS, GRID_WIDTH};

// GPU-side half of the model; absent when a kernel was rejected, in which
// case the simulation never starts
pub struct GpuState {
    pub simulation: SimulationContext,
    pub renderer: FlockRenderer,
}

// Main model for the application
pub struct Model {
    pub params: SimulationParams,
    pub egui: Egui,
    pub debug_info: DebugInfo,
    pub camera: Camera,
    pub gpu: Option<GpuState>,
    // Monotonic animation-row counter, wrapped at the clip length for upload
    pub anim_row: f64,
    // Settings version last pushed to the flock uniforms
    pub applied_version: Option<u64>,
}

// Initialize the model
pub fn model(app: &App) -> Model {
    let window_id = app
        .new_window()
        .title("GPU Flocking Simulation")
        .size(1280, 720)
        .view(view)
        .raw_event(raw_window_event)
        .build()
        .unwrap();

    // Get the window
    let window = app.window(window_id).unwrap();

    // Create the UI
    let egui = Egui::from_window(&window);

    // Fetch everything the simulation consumes; a missing or malformed
    // asset aborts the load, no partial scene is shown
    let assets = app
        .assets_path()
        .map_err(|err| AssetError::AssetsDir(format!("{err:?}")))
        .and_then(|dir| assets::load(&dir))
        .unwrap_or_else(|err| {
            log::error!("asset load failed: {err}");
            std::process::exit(1);
        });

    let animation = baker::bake_animation_texture(&assets.clip, assets.mesh.vertex_count())
        .unwrap_or_else(|err| {
            log::error!("animation bake failed: {err}");
            std::process::exit(1);
        });

    let mut rng = rand::thread_rng();
    let geometry = geometry::build_instance_geometry(
        &assets.mesh,
        &animation,
        AGENT_COUNT,
        GRID_WIDTH,
        &mut rng,
    )
    .unwrap_or_else(|err| {
        log::error!("instance geometry build failed: {err}");
        std::process::exit(1);
    });

    let gpu = match build_gpu(&window, &assets.kernels, &geometry, &animation, &mut rng) {
        Ok(gpu) => {
            log::info!("simulation ready: {AGENT_COUNT} agents on a {GRID_WIDTH}x{GRID_WIDTH} grid");
            Some(gpu)
        }
        Err(err) => {
            log::error!("kernel installation failed: {err}");
            None
        }
    };

    Model {
        params: SimulationParams::default(),
        egui,
        debug_info: DebugInfo::default(),
        camera: Camera::new(),
        gpu,
        anim_row: 0.0,
        applied_version: None,
    }
}

// Seed the state store and install all three kernels
fn build_gpu(
    window: &nannou::window::Window,
    kernels: &KernelSources,
    geometry: &InstanceGeometry,
    animation: &AnimationTexture,
    rng: &mut impl rand::Rng,
) -> Result<GpuState, KernelError> {
    let device = window.device();
    let queue = window.queue();

    let simulation = SimulationContext::new(device, queue, kernels, GRID_WIDTH, rng)?;

    let (width, height) = window.inner_size_pixels();
    let renderer = FlockRenderer::new(
        device,
        queue,
        &kernels.render,
        geometry,
        animation,
        &simulation,
        Frame::TEXTURE_FORMAT,
        window.msaa_samples(),
        [width, height],
    )?;

    Ok(GpuState {
        simulation,
        renderer,
    })
}

// Update the model: the frame scheduler
pub fn update(app: &App, model: &mut Model, update: Update) {
    // Update debug info
    model.debug_info.fps = app.fps();
    model.debug_info.frame_time = update.since_last;

    // Update UI; bumps the settings version when a tunable changed
    ui::update_ui(&mut model.egui, &mut model.params, &model.debug_info);

    let Some(gpu) = model.gpu.as_mut() else {
        return;
    };

    let window = app.main_window();
    let device = window.device();
    let queue = window.queue();

    // Tunables reach the kernels only when the settings version moved
    if model.applied_version != Some(model.params.version()) {
        gpu.simulation.write_flock_uniforms(queue, &model.params);
        model.applied_version = Some(model.params.version());
    }

    if !model.params.pause_simulation {
        // Clamp the frame delta so a stall integrates at most one time unit
        let delta = update.since_last.as_secs_f32().min(1.0);

        // Advance the animation row at the baked cadence
        let duration = gpu.renderer.duration_frames() as f64;
        model.anim_row = (model.anim_row + delta as f64 * ANIMATION_FPS as f64) % duration;

        gpu.simulation.write_frame_uniforms(queue, delta, app.time);

        // Velocity then position, strictly ordered, once per frame
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("simulation step"),
        });
        gpu.simulation.step(&mut encoder);
        queue.submit(Some(encoder.finish()));
    }

    // The render side tracks the window every frame: resize recreates the
    // depth attachment and feeds the new aspect ratio into the projection
    let (width, height) = window.inner_size_pixels();
    gpu.renderer.ensure_depth_texture(device, [width, height]);

    let rect = app.window_rect();
    let view_proj = model.camera.view_projection(rect.w() / rect.h());
    gpu.renderer.write_uniforms(
        queue,
        view_proj,
        app.time,
        model.params.size,
        model.anim_row as f32,
    );
}

// Render the model
pub fn view(app: &App, model: &Model, frame: Frame) {
    match &model.gpu {
        Some(gpu) => {
            let mut encoder = frame.command_encoder();
            gpu.renderer.draw(
                &mut encoder,
                frame.texture_view(),
                gpu.simulation.current(),
                model.params.count,
            );
        }
        None => {
            // No kernels installed; keep the window alive but empty
            frame.clear(WHITE);
        }
    }

    // Draw debug visualization if enabled
    if model.params.show_debug {
        let draw = app.draw();
        ui::draw_debug_info(
            &draw,
            &model.debug_info,
            app.window_rect(),
            AGENT_COUNT,
            model.params.count,
        );
        draw.to_frame(app, &frame).unwrap();
    }

    // Draw the egui UI
    model.egui.draw_to_frame(&frame).unwrap();
}

// Handle raw window events for egui
pub fn raw_window_event(_app: &App, model: &mut Model, event: &nannou::winit::event::WindowEvent) {
    model.egui.handle_raw_event(event);
}
