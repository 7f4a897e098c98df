//! Static/dynamic point shadow caching. Static geometry is rendered once per light into a
//! static cubemap; every refresh copies it into the combined cubemap and adds dynamic geometry on top.

use crate::lights::MAX_POINT_SHADOW_MAPS;
use crate::queue::GeometryRecord;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheState {
    /// Static contribution not rendered yet.
    Cold,
    Warm,
}

/// Draw lists for one point light refresh, as indices into the record slice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PointShadowPlan {
    pub slot: usize,
    /// Records rendered into the static cubemap. Empty once the cache is warm.
    pub static_records: Vec<usize>,
    /// Records rendered into the combined cubemap after the static copy.
    pub dynamic_records: Vec<usize>,
}

impl PointShadowPlan {
    pub fn bakes_static(&self) -> bool {
        !self.static_records.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct PointShadowCache {
    states: [CacheState; MAX_POINT_SHADOW_MAPS],
}

impl Default for PointShadowCache {
    fn default() -> Self {
        Self { states: [CacheState::Cold; MAX_POINT_SHADOW_MAPS] }
    }
}

impl PointShadowCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, slot: usize) -> Option<CacheState> {
        self.states.get(slot).copied()
    }

    pub fn plan(&self, slot: usize, records: &[GeometryRecord]) -> PointShadowPlan {
        let cold = self.state(slot) == Some(CacheState::Cold);
        let (mut static_records, mut dynamic_records) = (Vec::new(), Vec::new());
        for (i, r) in records.iter().enumerate() {
            if r.is_dynamic {
                dynamic_records.push(i);
            } else if cold {
                static_records.push(i);
            }
        }
        PointShadowPlan { slot, static_records, dynamic_records }
    }

    /// Mark a refresh as encoded. Returns true when this call moved the slot from Cold to Warm.
    pub fn commit(&mut self, plan: &PointShadowPlan) -> bool {
        match self.states.get_mut(plan.slot) {
            Some(state @ CacheState::Cold) => {
                *state = CacheState::Warm;
                log::debug!("point shadow slot {} static cache warm", plan.slot);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::MeshHandle;
    use glam::{Mat4, Vec3};
    use render_api::Aabb;

    fn records() -> Vec<GeometryRecord> {
        let bounds = Aabb::new(Vec3::splat(-0.5), Vec3::splat(0.5));
        vec![
            GeometryRecord::new("floor", MeshHandle::default(), 6, bounds, Mat4::IDENTITY),
            GeometryRecord::new("ball", MeshHandle::default(), 36, bounds, Mat4::IDENTITY).dynamic(true),
            GeometryRecord::new("wall", MeshHandle::default(), 6, bounds, Mat4::IDENTITY),
        ]
    }

    #[test]
    fn cold_to_warm_happens_exactly_once() {
        let mut cache = PointShadowCache::new();
        let rs = records();
        let mut transitions = 0;
        for _ in 0..4 {
            let plan = cache.plan(0, &rs);
            if cache.commit(&plan) {
                transitions += 1;
            }
        }
        assert_eq!(transitions, 1);
        assert_eq!(cache.state(0), Some(CacheState::Warm));
    }

    #[test]
    fn static_records_are_never_resubmitted_after_warm() {
        let mut cache = PointShadowCache::new();
        let rs = records();
        let first = cache.plan(0, &rs);
        assert_eq!(first.static_records, vec![0, 2]);
        assert_eq!(first.dynamic_records, vec![1]);
        cache.commit(&first);
        for _ in 0..3 {
            let plan = cache.plan(0, &rs);
            assert!(!plan.bakes_static());
            assert!(plan.dynamic_records.iter().all(|&i| rs[i].is_dynamic));
            cache.commit(&plan);
        }
    }

    #[test]
    fn slots_warm_independently() {
        let mut cache = PointShadowCache::new();
        let rs = records();
        let plan = cache.plan(1, &rs);
        cache.commit(&plan);
        assert_eq!(cache.state(0), Some(CacheState::Cold));
        assert_eq!(cache.state(1), Some(CacheState::Warm));
        assert_eq!(cache.state(MAX_POINT_SHADOW_MAPS), None);
    }
}
