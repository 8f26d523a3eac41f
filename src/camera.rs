/*
 * Camera Module
 *
 * This module defines the Camera struct that produces the view-projection
 * matrix consumed by the render kernel. The flock is watched from a fixed
 * eye point; only the aspect ratio varies, following window resizes.
 */

use nannou::prelude::*;

pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn new() -> Self {
        Self {
            eye: vec3(0.0, 0.0, 350.0),
            target: Vec3::ZERO,
            fov_y: 75.0_f32.to_radians(),
            near: 1.0,
            far: 3000.0,
        }
    }

    // Combined view-projection matrix for the given window aspect ratio
    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        let proj = Mat4::perspective_rh(self.fov_y, aspect.max(1e-3), self.near, self.far);
        let view = Mat4::look_at_rh(self.eye, self.target, Vec3::Y);
        proj * view
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}
