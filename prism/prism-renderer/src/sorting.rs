//! Front-to-back draw ordering by distance from the camera.

use glam::Vec3;

use crate::queue::GeometryRecord;

/// Permutation of record indices ordered by ascending distance from `eye` to each
/// record's world-space bounds center. Equal distances keep their relative order,
/// so sorting an already sorted queue is a no-op.
pub fn distance_order(eye: Vec3, records: &[GeometryRecord]) -> Vec<usize> {
    let distances: Vec<f32> = records.iter().map(|r| r.world_center().distance(eye)).collect();
    let mut order: Vec<usize> = (0..records.len()).collect();
    order.sort_unstable_by(|&a, &b| distances[a].total_cmp(&distances[b]).then(a.cmp(&b)));
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::MeshHandle;
    use glam::Mat4;
    use render_api::Aabb;

    fn records(positions: &[Vec3]) -> Vec<GeometryRecord> {
        positions
            .iter()
            .enumerate()
            .map(|(i, p)| {
                GeometryRecord::new(
                    format!("r{i}"),
                    MeshHandle::default(),
                    3,
                    Aabb::new(Vec3::splat(-0.5), Vec3::splat(0.5)),
                    Mat4::from_translation(*p),
                )
            })
            .collect()
    }

    fn permute(records: &[GeometryRecord], order: &[usize]) -> Vec<GeometryRecord> {
        order.iter().map(|&i| records[i].clone()).collect()
    }

    #[test]
    fn orders_nearest_first() {
        let rs = records(&[Vec3::new(0.0, 0.0, 9.0), Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, -4.0, 0.0)]);
        assert_eq!(distance_order(Vec3::ZERO, &rs), vec![1, 2, 0]);
    }

    #[test]
    fn sorting_twice_is_idempotent() {
        let eye = Vec3::new(2.0, 1.0, 3.0);
        let rs = records(&[
            Vec3::new(5.0, 0.0, 0.0),
            Vec3::new(-1.0, 2.0, 7.0),
            Vec3::new(2.0, 1.0, 2.0),
            Vec3::new(2.0, 1.0, 4.0),
            Vec3::new(0.0, -8.0, 0.0),
        ]);
        let once = permute(&rs, &distance_order(eye, &rs));
        let again = distance_order(eye, &once);
        assert_eq!(again, (0..rs.len()).collect::<Vec<_>>());
    }

    #[test]
    fn empty_queue_sorts_to_nothing() {
        assert!(distance_order(Vec3::ZERO, &[]).is_empty());
    }
}
