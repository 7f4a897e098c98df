//! Camera state copied into the renderer each frame.

use glam::{Mat4, Vec3};

/// View/projection matrices plus eye position and facing. Copied by value;
/// the renderer never keeps a reference into host memory.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraMatrices {
    pub view: Mat4,
    pub projection: Mat4,
    pub position: Vec3,
    pub front: Vec3,
}

impl CameraMatrices {
    /// Right-handed look-at camera with a perspective projection (depth range 0..1).
    pub fn look_at(position: Vec3, target: Vec3, fov_y_radians: f32, aspect: f32, near: f32, far: f32) -> Self {
        let front = (target - position).normalize_or(Vec3::NEG_Z);
        let up = if front.cross(Vec3::Y).length_squared() < 1e-6 { Vec3::Z } else { Vec3::Y };
        Self {
            view: Mat4::look_at_rh(position, target, up),
            projection: Mat4::perspective_rh(fov_y_radians, aspect, near, far),
            position,
            front,
        }
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

impl Default for CameraMatrices {
    fn default() -> Self {
        Self::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, 45f32.to_radians(), 16.0 / 9.0, 0.01, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn look_at_places_target_in_front() {
        let cam = CameraMatrices::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, 1.0, 1.0, 0.1, 50.0);
        let p = cam.view.transform_point3(Vec3::ZERO);
        assert!((p.z + 5.0).abs() < 1e-5);
        assert_eq!(cam.front, Vec3::NEG_Z);
    }

    #[test]
    fn straight_down_camera_has_valid_basis() {
        let cam = CameraMatrices::look_at(Vec3::new(0.0, 10.0, 0.0), Vec3::ZERO, 1.0, 1.0, 0.1, 50.0);
        assert!(cam.view.is_finite());
    }
}
