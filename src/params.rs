/*
 * Simulation Parameters Module
 *
 * This module defines the SimulationParams struct that contains all the
 * adjustable parameters for the flocking simulation. These parameters can
 * be modified through the UI. Consumers do not receive change callbacks;
 * they poll the version counter, which is bumped whenever a value differs
 * from the previous snapshot, and re-upload their uniforms when it moves.
 */

use crate::AGENT_COUNT;

// Parameters for the simulation that can be adjusted via UI
pub struct SimulationParams {
    pub separation: f32,
    pub alignment: f32,
    pub cohesion: f32,
    pub size: f32,
    pub count: u32,
    pub show_debug: bool,
    pub pause_simulation: bool,

    // Internal state for change detection
    version: u64,
    previous_values: Option<ParamSnapshot>,
}

// A snapshot of parameter values used for change detection
struct ParamSnapshot {
    separation: f32,
    alignment: f32,
    cohesion: f32,
    size: f32,
    count: u32,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            separation: 20.0,
            alignment: 20.0,
            cohesion: 20.0,
            size: 0.2,
            count: AGENT_COUNT / 4,
            show_debug: false,
            pause_simulation: false,
            version: 0,
            previous_values: None,
        }
    }
}

impl SimulationParams {
    // Take a snapshot of current parameter values for change detection
    pub fn take_snapshot(&mut self) {
        self.previous_values = Some(ParamSnapshot {
            separation: self.separation,
            alignment: self.alignment,
            cohesion: self.cohesion,
            size: self.size,
            count: self.count,
        });
    }

    // Compare against the last snapshot and bump the version if anything
    // changed. Returns true when a change was detected.
    pub fn detect_changes(&mut self) -> bool {
        let changed = match &self.previous_values {
            Some(prev) => {
                self.separation != prev.separation
                    || self.alignment != prev.alignment
                    || self.cohesion != prev.cohesion
                    || self.size != prev.size
                    || self.count != prev.count
            }
            None => false,
        };

        if changed {
            self.version += 1;
        }
        changed
    }

    // Current version of the tunable values. Starts at 0 and increases by
    // one for every detected change.
    pub fn version(&self) -> u64 {
        self.version
    }

    // Get parameter ranges for UI sliders
    pub fn get_radius_range() -> std::ops::RangeInclusive<f32> {
        0.0..=100.0
    }

    pub fn get_size_range() -> std::ops::RangeInclusive<f32> {
        0.0..=1.0
    }

    pub fn get_count_range() -> std::ops::RangeInclusive<u32> {
        0..=AGENT_COUNT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_stable_without_changes() {
        let mut params = SimulationParams::default();
        params.take_snapshot();
        assert!(!params.detect_changes());
        assert_eq!(params.version(), 0);
    }

    #[test]
    fn version_bumps_once_per_change() {
        let mut params = SimulationParams::default();

        params.take_snapshot();
        params.separation = 35.0;
        assert!(params.detect_changes());
        assert_eq!(params.version(), 1);

        params.take_snapshot();
        params.count = 0;
        params.size = 0.5;
        assert!(params.detect_changes());
        assert_eq!(params.version(), 2);
    }

    #[test]
    fn zeroed_radii_are_a_valid_setting() {
        // Turning all three radii off must register as an ordinary change;
        // the kernels then see plain damping plus boundary turn-back.
        let mut params = SimulationParams::default();
        params.take_snapshot();
        params.separation = 0.0;
        params.alignment = 0.0;
        params.cohesion = 0.0;
        assert!(params.detect_changes());
        assert_eq!(params.separation, 0.0);
    }
}
