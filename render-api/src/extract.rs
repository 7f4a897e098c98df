//! Data extracted from the host world each frame.
//! The host fills these; a backend uploads meshes once and re-queues them every frame.

use std::collections::HashMap;
use std::sync::Arc;

use glam::Mat4;

use crate::{CameraMatrices, Mesh};

/// One drawable instance owned by the host.
#[derive(Clone, Debug)]
pub struct ExtractedMesh {
    /// Host-defined entity or instance id.
    pub entity_id: u64,
    pub mesh: Arc<Mesh>,
    /// Bumped by the host whenever `mesh` content changes; the backend re-uploads on change.
    pub revision: u64,
    pub transform: Mat4,
    /// Moves between frames. Static instances are baked into shadow caches and probes.
    pub is_dynamic: bool,
    pub visible: bool,
}

/// All extracted meshes for the current frame.
#[derive(Default, Debug)]
pub struct ExtractedMeshes {
    pub meshes: HashMap<u64, ExtractedMesh>,
}

impl ExtractedMeshes {
    pub fn insert(&mut self, mesh: ExtractedMesh) {
        self.meshes.insert(mesh.entity_id, mesh);
    }
}

/// View data for the current frame.
#[derive(Clone, Debug)]
pub struct ExtractedView {
    pub camera: CameraMatrices,
    pub viewport_size: (u32, u32),
}

impl Default for ExtractedView {
    fn default() -> Self {
        Self { camera: CameraMatrices::default(), viewport_size: (1600, 900) }
    }
}
