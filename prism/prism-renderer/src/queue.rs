//! Geometry records and the per-frame draw queue.

use glam::{Mat4, Vec3};
use render_api::{Aabb, CameraMatrices, TextureKind};

use crate::culling;
use crate::error::SubmitError;
use crate::geometry::{MeshHandle, ProgramHandle, TextureHandle};
use crate::sorting;

/// One drawable surface for one frame. Holds handles only; the geometry table owns GPU memory.
#[derive(Clone, Debug)]
pub struct GeometryRecord {
    /// Diagnostic label.
    pub name: String,
    pub mesh: MeshHandle,
    pub index_count: u32,
    /// Forward shading program; `None` uses the built-in one.
    pub program: Option<ProgramHandle>,
    pub model: Mat4,
    pub textures: Vec<(TextureKind, TextureHandle)>,
    /// Bounds in model space.
    pub bounds: Aabb,
    pub is_dynamic: bool,
    /// Written by the culler each frame.
    pub is_visible: bool,
}

impl GeometryRecord {
    pub fn new(name: impl Into<String>, mesh: MeshHandle, index_count: u32, bounds: Aabb, model: Mat4) -> Self {
        Self {
            name: name.into(),
            mesh,
            index_count,
            program: None,
            model,
            textures: Vec::new(),
            bounds,
            is_dynamic: false,
            is_visible: true,
        }
    }

    pub fn with_program(mut self, program: ProgramHandle) -> Self {
        self.program = Some(program);
        self
    }

    pub fn with_textures(mut self, textures: Vec<(TextureKind, TextureHandle)>) -> Self {
        self.textures = textures;
        self
    }

    pub fn dynamic(mut self, is_dynamic: bool) -> Self {
        self.is_dynamic = is_dynamic;
        self
    }

    pub fn validate(&self) -> Result<(), SubmitError> {
        if self.index_count == 0 {
            return Err(SubmitError::ZeroIndexCount(self.name.clone()));
        }
        if !self.bounds.is_valid() {
            return Err(SubmitError::InvalidBounds(self.name.clone()));
        }
        Ok(())
    }

    /// Bounds centroid placed in the world by the model matrix.
    pub fn world_center(&self) -> Vec3 {
        self.model.transform_point3(self.bounds.center())
    }

    pub fn texture(&self, kind: TextureKind) -> Option<TextureHandle> {
        self.textures.iter().find(|(k, _)| *k == kind).map(|(_, h)| *h)
    }
}

/// Records submitted for the coming frame, in submission order until culled and sorted.
#[derive(Default)]
pub struct DrawQueue {
    records: Vec<GeometryRecord>,
}

impl DrawQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record. Invalid records are logged and rejected.
    pub fn push(&mut self, record: GeometryRecord) -> Result<(), SubmitError> {
        if let Err(e) = record.validate() {
            log::error!("draw submission rejected: {e}");
            return Err(e);
        }
        self.records.push(record);
        Ok(())
    }

    pub fn records(&self) -> &[GeometryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Cull and sort in parallel while `overlap` runs on the same record snapshot,
    /// then apply the visibility flags and draw order once everything has joined.
    pub fn prepare_with<R, F>(&mut self, camera: &CameraMatrices, overlap: F) -> R
    where
        R: Send,
        F: FnOnce(&[GeometryRecord]) -> R + Send,
    {
        let records = self.records.as_slice();
        let ((visibility, order), result) = rayon::join(
            || {
                rayon::join(
                    || culling::cull(&camera.view, &camera.projection, records),
                    || sorting::distance_order(camera.position, records),
                )
            },
            || overlap(records),
        );
        self.apply(&visibility, &order);
        result
    }

    /// Cull and sort without overlapping work.
    pub fn prepare(&mut self, camera: &CameraMatrices) {
        self.prepare_with(camera, |_| ());
    }

    fn apply(&mut self, visibility: &[bool], order: &[usize]) {
        for (record, &visible) in self.records.iter_mut().zip(visibility) {
            record.is_visible = visible;
        }
        let mut slots: Vec<Option<GeometryRecord>> = self.records.drain(..).map(Some).collect();
        self.records = order.iter().filter_map(|&i| slots.get_mut(i).and_then(Option::take)).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_bounds() -> Aabb {
        Aabb::new(Vec3::splat(-0.5), Vec3::splat(0.5))
    }

    fn record_at(name: &str, pos: Vec3) -> GeometryRecord {
        GeometryRecord::new(name, MeshHandle::default(), 36, unit_bounds(), Mat4::from_translation(pos))
    }

    fn camera() -> CameraMatrices {
        CameraMatrices::look_at(Vec3::ZERO, Vec3::NEG_Z, 60f32.to_radians(), 1.0, 0.1, 100.0)
    }

    #[test]
    fn zero_index_submission_is_rejected() {
        let mut queue = DrawQueue::new();
        let record = GeometryRecord::new("empty", MeshHandle::default(), 0, unit_bounds(), Mat4::IDENTITY);
        assert_eq!(queue.push(record), Err(SubmitError::ZeroIndexCount("empty".into())));
        assert!(queue.is_empty());
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let mut queue = DrawQueue::new();
        let bounds = Aabb::new(Vec3::ONE, Vec3::ZERO);
        let record = GeometryRecord::new("flipped", MeshHandle::default(), 3, bounds, Mat4::IDENTITY);
        assert!(queue.push(record).is_err());
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn prepare_culls_and_orders_nearest_first() {
        let mut queue = DrawQueue::new();
        queue.push(record_at("far", Vec3::new(0.0, 0.0, -20.0))).unwrap();
        queue.push(record_at("behind", Vec3::new(0.0, 0.0, 10.0))).unwrap();
        queue.push(record_at("near", Vec3::new(0.0, 0.0, -3.0))).unwrap();
        queue.prepare(&camera());
        let names: Vec<&str> = queue.records().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["near", "behind", "far"]);
        let visible: Vec<bool> = queue.records().iter().map(|r| r.is_visible).collect();
        assert_eq!(visible, [true, false, true]);
    }

    #[test]
    fn overlap_sees_every_submitted_record() {
        let mut queue = DrawQueue::new();
        for i in 0..4 {
            queue.push(record_at(&format!("r{i}"), Vec3::new(0.0, 0.0, -2.0 - i as f32))).unwrap();
        }
        let seen = queue.prepare_with(&camera(), |records| records.len());
        assert_eq!(seen, 4);
        assert_eq!(queue.len(), 4);
    }

    #[test]
    fn clear_empties_queue() {
        let mut queue = DrawQueue::new();
        queue.push(record_at("a", Vec3::ZERO)).unwrap();
        queue.clear();
        assert!(queue.is_empty());
    }

    #[test]
    fn world_center_applies_model() {
        let r = record_at("a", Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(r.world_center(), Vec3::new(1.0, 2.0, 3.0));
    }
}
