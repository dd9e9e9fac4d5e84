//! A simple look-at camera for 3D scenes.

use glam::{Mat4, Vec3};

/// A camera with position, orientation, and field of view.
///
/// Used by the gather pass to transform transparent geometry into clip
/// space and to measure view-space depth for sorting.
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub position: Vec3,
    pub forward: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            forward: Vec3::NEG_Z,
            up: Vec3::Y,
            fov: std::f32::consts::FRAC_PI_3, // 60 degrees
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(mut self, x: f32, y: f32, z: f32) -> Self {
        self.position = Vec3::new(x, y, z);
        self
    }

    pub fn looking_at(mut self, x: f32, y: f32, z: f32) -> Self {
        let forward = Vec3::new(x, y, z) - self.position;
        self.forward = forward.normalize_or(Vec3::NEG_Z);
        self
    }

    pub fn with_fov(mut self, fov_degrees: f32) -> Self {
        self.fov = fov_degrees.to_radians();
        self
    }

    /// World-to-view matrix.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward, self.up)
    }

    /// View-to-clip matrix for the given aspect ratio.
    pub fn projection_matrix(&self, aspect: f32, near: f32, far: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov, aspect, near, far)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looking_at_normalizes_forward() {
        let cam = Camera::new().at(0.0, 0.0, 10.0).looking_at(0.0, 0.0, 0.0);
        assert!((cam.forward.length() - 1.0).abs() < 1e-6);
        assert!((cam.forward - Vec3::NEG_Z).length() < 1e-6);
    }

    #[test]
    fn view_matrix_moves_target_onto_negative_z() {
        let cam = Camera::new().at(3.0, 0.0, 0.0).looking_at(0.0, 0.0, 0.0);
        let view = cam.view_matrix();
        let origin_in_view = view.transform_point3(Vec3::ZERO);
        // The look-at target sits straight ahead, 3 units down -Z.
        assert!(origin_in_view.x.abs() < 1e-5);
        assert!(origin_in_view.y.abs() < 1e-5);
        assert!((origin_in_view.z + 3.0).abs() < 1e-5);
    }
}
