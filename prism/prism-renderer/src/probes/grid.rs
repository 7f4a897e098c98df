//! Regular probe grid inside a world-space box.

use glam::{UVec3, Vec3};

use crate::config::ProbeVolume;

pub const FACES_PER_PROBE: u32 = 6;

#[derive(Clone, Debug, PartialEq)]
pub struct ProbeGrid {
    pub counts: UVec3,
    pub min: Vec3,
    pub spacing: Vec3,
}

impl ProbeGrid {
    /// `floor(span * density) + 1` probes per axis, `1 / density` apart, starting at the box minimum.
    pub fn new(volume: &ProbeVolume) -> Self {
        let counts = (volume.span * volume.density).floor().as_uvec3() + UVec3::ONE;
        Self { counts, min: volume.center - volume.span * 0.5, spacing: Vec3::ONE / volume.density }
    }

    pub fn len(&self) -> usize {
        (self.counts.x * self.counts.y * self.counts.z) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Probe positions, x varying fastest.
    pub fn positions(&self) -> Vec<Vec3> {
        let mut out = Vec::with_capacity(self.len());
        for z in 0..self.counts.z {
            for y in 0..self.counts.y {
                for x in 0..self.counts.x {
                    out.push(self.min + UVec3::new(x, y, z).as_vec3() * self.spacing);
                }
            }
        }
        out
    }

    /// Cubemap-array layers needed for every probe.
    pub fn layer_count(&self) -> u32 {
        self.len() as u32 * FACES_PER_PROBE
    }
}

/// Array layer of one probe face.
pub fn slice_index(probe: usize, face: usize) -> u32 {
    probe as u32 * FACES_PER_PROBE + face as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn volume(span: Vec3, density: Vec3) -> ProbeVolume {
        ProbeVolume { center: Vec3::ZERO, span, density }
    }

    #[test]
    fn counts_follow_span_times_density() {
        let grid = ProbeGrid::new(&volume(Vec3::new(4.0, 2.0, 6.0), Vec3::new(0.5, 1.0, 0.5)));
        assert_eq!(grid.counts, UVec3::new(3, 3, 4));
        assert_eq!(grid.len(), 36);
        assert_eq!(grid.positions().len(), 36);
    }

    #[test]
    fn positions_stay_inside_box() {
        let v = volume(Vec3::new(5.0, 3.0, 1.0), Vec3::new(0.7, 1.3, 2.0));
        let grid = ProbeGrid::new(&v);
        let (lo, hi) = (v.center - v.span * 0.5, v.center + v.span * 0.5);
        for p in grid.positions() {
            assert!(p.cmpge(lo - 1e-4).all() && p.cmple(hi + 1e-4).all(), "{p} outside box");
        }
        assert_eq!(grid.positions()[0], lo);
    }

    #[test]
    fn zero_span_gives_single_probe_at_center() {
        let grid = ProbeGrid::new(&volume(Vec3::ZERO, Vec3::ONE));
        assert_eq!(grid.positions(), vec![Vec3::ZERO]);
    }

    #[test]
    fn every_face_gets_its_own_slice() {
        let grid = ProbeGrid::new(&volume(Vec3::new(2.0, 1.0, 3.0), Vec3::ONE));
        let mut seen = HashSet::new();
        for probe in 0..grid.len() {
            for face in 0..FACES_PER_PROBE as usize {
                let slice = slice_index(probe, face);
                assert!(slice < grid.layer_count());
                assert!(seen.insert(slice), "slice {slice} written twice");
            }
        }
        assert_eq!(seen.len(), (grid.counts.x * grid.counts.y * grid.counts.z * 6) as usize);
    }
}
