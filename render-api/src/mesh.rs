//! Mesh data handed from the host to a backend: vertices, indices, material textures.

use glam::{Mat4, Vec3};

/// Interleaved vertex layout shared by every geometry pipeline (stride 56).
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
}

impl Vertex {
    pub const STRIDE: u64 = std::mem::size_of::<Vertex>() as u64;

    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self { position, normal, uv, tangent: [1.0, 0.0, 0.0], bitangent: [0.0, 1.0, 0.0] }
    }
}

/// Material texture role. Each kind is bound to a fixed texture slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureKind {
    Diffuse,
    Specular,
    Normal,
    Metallic,
    Roughness,
    Occlusion,
}

impl TextureKind {
    pub const ALL: [TextureKind; 6] = [
        TextureKind::Diffuse,
        TextureKind::Specular,
        TextureKind::Normal,
        TextureKind::Metallic,
        TextureKind::Roughness,
        TextureKind::Occlusion,
    ];

    /// Fixed texture unit for this kind.
    pub fn slot(self) -> usize {
        match self {
            TextureKind::Diffuse => 0,
            TextureKind::Specular => 1,
            TextureKind::Normal => 2,
            TextureKind::Metallic => 3,
            TextureKind::Roughness => 4,
            TextureKind::Occlusion => 5,
        }
    }

    /// Type name used by material files, e.g. `texture_diffuse`.
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "texture_diffuse" | "diffuse" => Some(TextureKind::Diffuse),
            "texture_specular" | "specular" => Some(TextureKind::Specular),
            "texture_normal" | "normal" => Some(TextureKind::Normal),
            "texture_metallic" | "metallic" => Some(TextureKind::Metallic),
            "texture_roughness" | "roughness" => Some(TextureKind::Roughness),
            "texture_ao" | "occlusion" => Some(TextureKind::Occlusion),
            _ => None,
        }
    }
}

/// Decoded RGBA8 texture image.
#[derive(Clone, Debug)]
pub struct TextureData {
    pub kind: TextureKind,
    pub width: u32,
    pub height: u32,
    pub rgba8: Vec<u8>,
}

impl TextureData {
    pub fn solid(kind: TextureKind, rgba: [u8; 4]) -> Self {
        Self { kind, width: 1, height: 1, rgba8: rgba.to_vec() }
    }
}

/// Axis-aligned bounding box in the mesh's local space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// True when `min <= max` on every axis.
    pub fn is_valid(&self) -> bool {
        self.min.cmple(self.max).all()
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    /// Bounds of this box after `transform`, still axis aligned.
    pub fn transformed(&self, transform: &Mat4) -> Aabb {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for c in self.corners() {
            let p = transform.transform_point3(c);
            min = min.min(p);
            max = max.max(p);
        }
        Aabb { min, max }
    }

    fn from_points(points: impl Iterator<Item = Vec3>) -> Option<Aabb> {
        let mut bounds: Option<Aabb> = None;
        for p in points {
            bounds = Some(match bounds {
                None => Aabb::new(p, p),
                Some(b) => Aabb::new(b.min.min(p), b.max.max(p)),
            });
        }
        bounds
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum MeshError {
    #[error("mesh '{0}' has no vertices")]
    NoVertices(String),
    #[error("mesh '{0}' has no indices")]
    NoIndices(String),
    #[error("mesh '{name}' index {index} out of range ({vertex_count} vertices)")]
    IndexOutOfRange { name: String, index: u32, vertex_count: usize },
}

/// CPU-side mesh. Construction never fails: invalid data is logged and the mesh
/// is marked not ready, after which backends refuse to upload or draw it.
#[derive(Clone, Debug)]
pub struct Mesh {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub textures: Vec<TextureData>,
    bounds: Aabb,
    setup: Result<(), MeshError>,
}

impl Mesh {
    pub fn new(name: impl Into<String>, vertices: Vec<Vertex>, indices: Vec<u32>, textures: Vec<TextureData>) -> Self {
        let name = name.into();
        let setup = Self::check(&name, &vertices, &indices);
        if let Err(e) = &setup {
            log::error!("Mesh setup failed: {e}");
        }
        if textures.is_empty() {
            log::warn!("mesh '{name}' has no textures; default material will be used");
        }
        let bounds = Aabb::from_points(vertices.iter().map(|v| Vec3::from(v.position)))
            .unwrap_or(Aabb::new(Vec3::ZERO, Vec3::ZERO));
        Self { name, vertices, indices, textures, bounds, setup }
    }

    fn check(name: &str, vertices: &[Vertex], indices: &[u32]) -> Result<(), MeshError> {
        if vertices.is_empty() {
            return Err(MeshError::NoVertices(name.to_string()));
        }
        if indices.is_empty() {
            return Err(MeshError::NoIndices(name.to_string()));
        }
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(MeshError::IndexOutOfRange { name: name.to_string(), index, vertex_count: vertices.len() });
        }
        Ok(())
    }

    /// Whether construction succeeded. A mesh that is not ready is never drawn.
    pub fn is_ready(&self) -> bool {
        self.setup.is_ok()
    }

    pub fn setup_result(&self) -> Result<(), MeshError> {
        self.setup.clone()
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Unit cube centered at the origin with per-face normals and UVs.
    pub fn cube(name: impl Into<String>, textures: Vec<TextureData>) -> Self {
        const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ];
        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (n, t, b) in FACES {
            let (n, t, b) = (Vec3::from(n), Vec3::from(t), Vec3::from(b));
            let base = vertices.len() as u32;
            for (u, v) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
                let p = n * 0.5 + t * (u - 0.5) + b * (v - 0.5);
                vertices.push(Vertex {
                    position: p.to_array(),
                    normal: n.to_array(),
                    uv: [u, 1.0 - v],
                    tangent: t.to_array(),
                    bitangent: b.to_array(),
                });
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        Self::new(name, vertices, indices, textures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Vec<Vertex> {
        vec![
            Vertex::new([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
            Vertex::new([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
            Vertex::new([0.0, 2.0, -1.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
        ]
    }

    #[test]
    fn vertex_stride_matches_pipeline_layout() {
        assert_eq!(Vertex::STRIDE, 56);
    }

    #[test]
    fn zero_indices_marks_mesh_not_ready() {
        let mesh = Mesh::new("empty", triangle(), Vec::new(), Vec::new());
        assert!(!mesh.is_ready());
        assert_eq!(mesh.setup_result(), Err(MeshError::NoIndices("empty".into())));
        assert_eq!(mesh.index_count(), 0);
    }

    #[test]
    fn zero_vertices_marks_mesh_not_ready() {
        let mesh = Mesh::new("novert", Vec::new(), vec![0, 1, 2], Vec::new());
        assert_eq!(mesh.setup_result(), Err(MeshError::NoVertices("novert".into())));
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let mesh = Mesh::new("bad", triangle(), vec![0, 1, 3], Vec::new());
        assert!(matches!(mesh.setup_result(), Err(MeshError::IndexOutOfRange { index: 3, .. })));
    }

    #[test]
    fn bounds_cover_all_vertices() {
        let mesh = Mesh::new("tri", triangle(), vec![0, 1, 2], Vec::new());
        assert!(mesh.is_ready());
        let b = mesh.bounds();
        assert_eq!(b.min, Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(b.max, Vec3::new(1.0, 2.0, 0.0));
        assert!(b.is_valid());
    }

    #[test]
    fn cube_is_closed_and_centered() {
        let cube = Mesh::cube("cube", Vec::new());
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.index_count(), 36);
        assert_eq!(cube.bounds().center(), Vec3::ZERO);
        assert_eq!(cube.bounds().max, Vec3::splat(0.5));
    }

    #[test]
    fn transformed_bounds_follow_translation() {
        let b = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let t = b.transformed(&Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0)));
        assert_eq!(t.min, Vec3::new(4.0, -1.0, -1.0));
        assert_eq!(t.max, Vec3::new(6.0, 1.0, 1.0));
    }

    #[test]
    fn texture_type_names_map_to_slots() {
        assert_eq!(TextureKind::from_type_name("texture_diffuse"), Some(TextureKind::Diffuse));
        assert_eq!(TextureKind::from_type_name("texture_normal").map(TextureKind::slot), Some(2));
        assert_eq!(TextureKind::from_type_name("texture_height"), None);
    }
}
