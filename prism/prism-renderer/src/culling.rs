//! View-frustum culling of draw records against their model-space bounds.

use glam::{Mat4, Vec3, Vec4};
use render_api::Aabb;

use crate::queue::GeometryRecord;

/// Six view-space planes (left, right, bottom, top, near, far), normals pointing inward.
#[derive(Clone, Copy, Debug)]
pub struct Frustum {
    planes: [Vec4; 6],
}

impl Frustum {
    /// Planes of a projection with 0..1 clip depth. Each plane is normalized by its normal length.
    pub fn from_projection(projection: &Mat4) -> Self {
        let r0 = projection.row(0);
        let r1 = projection.row(1);
        let r2 = projection.row(2);
        let r3 = projection.row(3);
        let planes = [r3 + r0, r3 - r0, r3 + r1, r3 - r1, r2, r3 - r2].map(|p| {
            let len = p.truncate().length();
            if len > 0.0 { p / len } else { p }
        });
        Self { planes }
    }

    pub fn planes(&self) -> &[Vec4; 6] {
        &self.planes
    }

    /// True only when all eight corners lie outside one plane. Boxes straddling any
    /// plane are kept, so the test never rejects something on screen.
    pub fn culls(&self, view_model: &Mat4, bounds: &Aabb) -> bool {
        let corners: [Vec3; 8] = bounds.corners().map(|c| view_model.transform_point3(c));
        self.planes
            .iter()
            .any(|plane| corners.iter().all(|c| plane.truncate().dot(*c) + plane.w <= 0.0))
    }
}

/// Visibility flag per record, in record order.
pub fn cull(view: &Mat4, projection: &Mat4, records: &[GeometryRecord]) -> Vec<bool> {
    let frustum = Frustum::from_projection(projection);
    records
        .iter()
        .map(|r| !frustum.culls(&(*view * r.model), &r.bounds))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::MeshHandle;

    fn camera() -> (Mat4, Mat4) {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        let proj = Mat4::perspective_rh(60f32.to_radians(), 16.0 / 9.0, 0.1, 50.0);
        (view, proj)
    }

    fn record(name: &str, min: Vec3, max: Vec3) -> GeometryRecord {
        GeometryRecord::new(name, MeshHandle::default(), 3, Aabb::new(min, max), Mat4::IDENTITY)
    }

    #[test]
    fn box_in_front_of_camera_is_visible() {
        let (view, proj) = camera();
        let r = record("center", Vec3::splat(-0.5), Vec3::splat(0.5));
        assert_eq!(cull(&view, &proj, &[r]), vec![true]);
    }

    #[test]
    fn box_behind_camera_is_culled() {
        let (view, proj) = camera();
        let r = record("behind", Vec3::new(-1.0, -1.0, 8.0), Vec3::new(1.0, 1.0, 10.0));
        assert_eq!(cull(&view, &proj, &[r]), vec![false]);
    }

    #[test]
    fn box_beyond_far_plane_is_culled() {
        let (view, proj) = camera();
        let r = record("distant", Vec3::new(-1.0, -1.0, -200.0), Vec3::new(1.0, 1.0, -100.0));
        assert_eq!(cull(&view, &proj, &[r]), vec![false]);
    }

    #[test]
    fn box_far_to_the_side_is_culled() {
        let (view, proj) = camera();
        let r = record("side", Vec3::new(40.0, -1.0, -1.0), Vec3::new(42.0, 1.0, 1.0));
        assert_eq!(cull(&view, &proj, &[r]), vec![false]);
    }

    #[test]
    fn box_straddling_left_plane_stays_visible() {
        let (view, proj) = camera();
        // Left edge of the view at z=0 is about x=-5.13; this box crosses it.
        let r = record("straddle", Vec3::new(-8.0, -0.5, -0.5), Vec3::new(-4.0, 0.5, 0.5));
        assert_eq!(cull(&view, &proj, &[r]), vec![true]);
    }

    #[test]
    fn box_straddling_near_plane_stays_visible() {
        let (view, proj) = camera();
        let r = record("through_near", Vec3::new(-0.5, -0.5, 3.0), Vec3::new(0.5, 0.5, 6.0));
        assert_eq!(cull(&view, &proj, &[r]), vec![true]);
    }

    #[test]
    fn model_matrix_moves_bounds() {
        let (view, proj) = camera();
        let mut r = record("moved", Vec3::splat(-0.5), Vec3::splat(0.5));
        r.model = Mat4::from_translation(Vec3::new(0.0, 0.0, 20.0));
        assert_eq!(cull(&view, &proj, &[r]), vec![false]);
    }

    #[test]
    fn planes_are_normalized() {
        let (_, proj) = camera();
        for p in Frustum::from_projection(&proj).planes() {
            assert!((p.truncate().length() - 1.0).abs() < 1e-5);
        }
    }
}
