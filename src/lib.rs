/*
 * GPU Flocking Simulation - Module Definitions
 *
 * This file defines the module structure for the GPU-driven flocking
 * application. The simulation state lives entirely on the compute device;
 * the host side bakes assets, schedules kernel dispatches and renders.
 */

// Re-export key components for easier access
pub use app::Model;
pub use assets::LoadedAssets;
pub use baker::AnimationTexture;
pub use camera::Camera;
pub use debug::DebugInfo;
pub use geometry::InstanceGeometry;
pub use params::SimulationParams;
pub use simulation::SimulationContext;

// Define modules
pub mod app;
pub mod assets;
pub mod baker;
pub mod camera;
pub mod debug;
pub mod geometry;
pub mod params;
pub mod renderer;
pub mod simulation;
pub mod ui;

// Constants
pub const GRID_WIDTH: u32 = 64;
pub const AGENT_COUNT: u32 = GRID_WIDTH * GRID_WIDTH;
pub const BOUNDS: f32 = 800.0;
pub const BOUNDS_HALF: f32 = BOUNDS / 2.0;

// The clip is resampled at this rate when baked; the render pass advances
// one row per 1/60s of wall time.
pub const ANIMATION_FPS: f32 = 60.0;
