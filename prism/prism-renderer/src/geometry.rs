//! Geometry table: GPU meshes, material textures and forward programs behind generational handles.
//! Owned by the host; draw records refer into it and a stale handle simply resolves to nothing.

use render_api::{Aabb, Mesh, TextureData, TextureKind, Vertex};
use slotmap::SlotMap;
use wgpu::util::DeviceExt;

use crate::error::GeometryError;
use crate::queue::GeometryRecord;

slotmap::new_key_type! {
    pub struct MeshHandle;
    pub struct TextureHandle;
    pub struct ProgramHandle;
}

pub struct GpuMesh {
    pub vertex_buf: wgpu::Buffer,
    pub index_buf: wgpu::Buffer,
    pub index_count: u32,
    pub bounds: Aabb,
    pub textures: Vec<(TextureKind, TextureHandle)>,
}

pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

/// Host-supplied forward shading program, built against the shared forward layout.
pub struct ForwardProgram {
    pub label: String,
    pub(crate) pipeline: wgpu::RenderPipeline,
}

#[derive(Default)]
pub struct GeometryTable {
    meshes: SlotMap<MeshHandle, GpuMesh>,
    textures: SlotMap<TextureHandle, GpuTexture>,
    programs: SlotMap<ProgramHandle, ForwardProgram>,
}

impl GeometryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upload a ready mesh plus its textures. A mesh whose setup failed is refused.
    pub fn upload_mesh(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, mesh: &Mesh) -> Result<MeshHandle, GeometryError> {
        mesh.setup_result()?;
        let mut textures = Vec::with_capacity(mesh.textures.len());
        for data in &mesh.textures {
            textures.push((data.kind, self.upload_texture(device, queue, &mesh.name, data)?));
        }
        let vertex_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("prism_mesh_vertex"),
            contents: bytemuck::cast_slice::<Vertex, u8>(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("prism_mesh_index"),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        log::debug!("uploaded mesh '{}' ({} vertices, {} indices)", mesh.name, mesh.vertices.len(), mesh.indices.len());
        Ok(self.meshes.insert(GpuMesh {
            vertex_buf,
            index_buf,
            index_count: mesh.index_count(),
            bounds: mesh.bounds(),
            textures,
        }))
    }

    pub fn upload_texture(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        owner: &str,
        data: &TextureData,
    ) -> Result<TextureHandle, GeometryError> {
        let expected = data.width as usize * data.height as usize * 4;
        if data.rgba8.len() != expected || expected == 0 {
            return Err(GeometryError::TextureSize(owner.to_string(), data.rgba8.len(), expected));
        }
        let gpu = create_rgba8_texture(device, queue, "prism_material_texture", data.kind, data.width, data.height, &data.rgba8);
        Ok(self.textures.insert(gpu))
    }

    /// Drop a mesh and the textures it uploaded.
    pub fn remove_mesh(&mut self, handle: MeshHandle) -> bool {
        match self.meshes.remove(handle) {
            Some(mesh) => {
                for (_, t) in mesh.textures {
                    self.textures.remove(t);
                }
                true
            }
            None => false,
        }
    }

    pub fn insert_program(&mut self, program: ForwardProgram) -> ProgramHandle {
        self.programs.insert(program)
    }

    pub fn remove_program(&mut self, handle: ProgramHandle) -> Option<ForwardProgram> {
        self.programs.remove(handle)
    }

    pub fn mesh(&self, handle: MeshHandle) -> Option<&GpuMesh> {
        self.meshes.get(handle)
    }

    pub fn texture(&self, handle: TextureHandle) -> Option<&GpuTexture> {
        self.textures.get(handle)
    }

    pub fn program(&self, handle: ProgramHandle) -> Option<&ForwardProgram> {
        self.programs.get(handle)
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// Draw record for an uploaded mesh, carrying its index count, bounds and textures.
    pub fn record(&self, name: impl Into<String>, handle: MeshHandle, model: glam::Mat4) -> Option<GeometryRecord> {
        let mesh = self.meshes.get(handle)?;
        Some(GeometryRecord::new(name, handle, mesh.index_count, mesh.bounds, model).with_textures(mesh.textures.clone()))
    }
}

/// Diffuse maps are color data and sampled as sRGB; every other kind is linear.
pub(crate) fn create_rgba8_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    kind: TextureKind,
    width: u32,
    height: u32,
    rgba8: &[u8],
) -> GpuTexture {
    let format = match kind {
        TextureKind::Diffuse => wgpu::TextureFormat::Rgba8UnormSrgb,
        _ => wgpu::TextureFormat::Rgba8Unorm,
    };
    let size = wgpu::Extent3d { width, height, depth_or_array_layers: 1 };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        rgba8,
        wgpu::ImageDataLayout { offset: 0, bytes_per_row: Some(4 * width), rows_per_image: Some(height) },
        size,
    );
    let view = texture.create_view(&Default::default());
    GpuTexture { texture, view }
}
