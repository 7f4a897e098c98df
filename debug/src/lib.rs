//! Demo scene shared by the debug binaries.

use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};
use render_api::{Attenuation, ExtractedMesh, ExtractedMeshes, Light, Mesh, TextureData, TextureKind};

pub const FLOOR_ID: u64 = 1;
pub const PILLAR_ID: u64 = 2;
pub const SPINNER_ID: u64 = 3;

/// A floor and a pillar that never move plus a spinning dynamic cube.
pub struct DemoScene {
    floor: Arc<Mesh>,
    pillar: Arc<Mesh>,
    spinner: Arc<Mesh>,
}

impl DemoScene {
    pub fn new() -> Self {
        let material = |rgba: [u8; 4], roughness: u8| {
            vec![
                TextureData::solid(TextureKind::Diffuse, rgba),
                TextureData::solid(TextureKind::Roughness, [roughness, roughness, roughness, 255]),
            ]
        };
        Self {
            floor: Arc::new(Mesh::cube("floor", material([180, 180, 170, 255], 220))),
            pillar: Arc::new(Mesh::cube("pillar", material([60, 110, 200, 255], 90))),
            spinner: Arc::new(Mesh::cube("spinner", material([220, 90, 50, 255], 40))),
        }
    }

    /// Instances for the frame at `time` seconds.
    pub fn extract(&self, time: f32) -> ExtractedMeshes {
        let mut out = ExtractedMeshes::default();
        let instance = |entity_id, mesh: &Arc<Mesh>, transform, is_dynamic| ExtractedMesh {
            entity_id,
            mesh: Arc::clone(mesh),
            revision: 0,
            transform,
            is_dynamic,
            visible: true,
        };
        out.insert(instance(
            FLOOR_ID,
            &self.floor,
            Mat4::from_scale_rotation_translation(Vec3::new(8.0, 0.2, 8.0), Quat::IDENTITY, Vec3::new(0.0, -0.6, 0.0)),
            false,
        ));
        out.insert(instance(
            PILLAR_ID,
            &self.pillar,
            Mat4::from_scale_rotation_translation(Vec3::new(0.6, 2.0, 0.6), Quat::IDENTITY, Vec3::new(-1.5, 0.5, -1.0)),
            false,
        ));
        out.insert(instance(
            SPINNER_ID,
            &self.spinner,
            Mat4::from_rotation_translation(Quat::from_rotation_y(time) * Quat::from_rotation_x(0.4), Vec3::new(1.0, 0.2, 0.0)),
            true,
        ));
        out
    }

    pub fn lights() -> Vec<Light> {
        vec![
            Light::directional("sun", Vec3::new(4.0, 8.0, 4.0), Vec3::new(-0.4, -1.0, -0.4), Vec3::new(1.0, 0.96, 0.9), 2.0),
            Light::point("warm", Vec3::new(1.5, 1.5, 1.5), Vec3::new(1.0, 0.6, 0.3), 6.0, Attenuation::default()),
            Light::point("cool", Vec3::new(-2.0, 1.2, 1.0), Vec3::new(0.3, 0.5, 1.0), 4.0, Attenuation::default()),
        ]
    }
}

impl Default for DemoScene {
    fn default() -> Self {
        Self::new()
    }
}
