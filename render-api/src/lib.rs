//! Shared render API for Prism.
//! Host-facing mesh, light and camera types plus the RenderBackend trait, free of any GPU types.

mod backend;
mod camera;
mod extract;
mod light;
mod mesh;

pub use backend::{RenderBackend, RenderBackendWindow};
pub use camera::CameraMatrices;
pub use extract::{ExtractedMesh, ExtractedMeshes, ExtractedView};
pub use light::{Attenuation, Light, LightKind};
pub use mesh::{Aabb, Mesh, MeshError, TextureData, TextureKind, Vertex};
pub use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
