/*
 * UI Module
 *
 * This module contains functions for creating and updating the user
 * interface using nannou_egui. It exposes the live flocking tunables:
 * separation/alignment/cohesion radii, bird size and visible count.
 * Parameter change detection is handled by the SimulationParams struct.
 */

use nannou_egui::{egui, Egui};

use crate::debug::DebugInfo;
use crate::params::SimulationParams;

// Update the UI and return whether any tunable changed this frame
pub fn update_ui(egui: &mut Egui, params: &mut SimulationParams, debug_info: &DebugInfo) -> bool {
    // Take a snapshot of current parameter values for change detection
    params.take_snapshot();

    let ctx = egui.begin_frame();

    egui::Window::new("Flock Controls")
        .default_pos([10.0, 10.0])
        .show(&ctx, |ui| {
            ui.collapsing("Flocking Behavior", |ui| {
                ui.add(
                    egui::Slider::new(&mut params.separation, SimulationParams::get_radius_range())
                        .text("Separation"),
                );
                ui.add(
                    egui::Slider::new(&mut params.alignment, SimulationParams::get_radius_range())
                        .text("Alignment"),
                );
                ui.add(
                    egui::Slider::new(&mut params.cohesion, SimulationParams::get_radius_range())
                        .text("Cohesion"),
                );
            });

            ui.collapsing("Rendering", |ui| {
                ui.add(
                    egui::Slider::new(&mut params.size, SimulationParams::get_size_range())
                        .text("Bird Size"),
                );
                ui.add(
                    egui::Slider::new(&mut params.count, SimulationParams::get_count_range())
                        .text("Visible Birds"),
                );
            });

            ui.label(format!("FPS: {:.1}", debug_info.fps));

            ui.checkbox(&mut params.show_debug, "Show Debug Info");
            ui.checkbox(&mut params.pause_simulation, "Pause Simulation");
        });

    drop(ctx);

    // Detect parameter changes and advance the settings version
    params.detect_changes()
}

// Draw debug information on the screen
pub fn draw_debug_info(
    draw: &nannou::Draw,
    debug_info: &DebugInfo,
    window_rect: nannou::geom::Rect,
    agent_count: u32,
    visible_count: u32,
) {
    let margin = 20.0;
    let line_height = 20.0;
    let text_x = window_rect.left() + margin;
    let text_y = window_rect.top() - margin;

    let debug_texts = [
        format!("FPS: {:.1}", debug_info.fps),
        format!(
            "Frame time: {:.2} ms",
            debug_info.frame_time.as_secs_f64() * 1000.0
        ),
        format!("Total Birds: {}", agent_count),
        format!("Visible Birds: {}", visible_count),
    ];

    for (i, text) in debug_texts.iter().enumerate() {
        let y = text_y - (i as f32 * line_height);

        draw.text(text)
            .x_y(text_x + 70.0, y)
            .color(nannou::color::BLACK)
            .font_size(14);
    }
}
