//! Prism plugin: owns the renderer and the geometry table; implements RenderBackend for the host.

use std::collections::{HashMap, HashSet};

use glam::Mat4;
use prism_renderer::{GeometryTable, MeshHandle, Renderer, RendererConfig};
use render_api::{ExtractedMeshes, ExtractedView, Light, RenderBackend};

/// Uploaded mesh plus the per-frame instance state the host last extracted.
struct CachedMesh {
    handle: MeshHandle,
    name: String,
    revision: u64,
    transform: Mat4,
    is_dynamic: bool,
    visible: bool,
}

/// Revisions that failed to upload, per entity. A failed revision is retried only once the host
/// bumps it.
#[derive(Default)]
struct RejectedMeshes {
    revisions: HashMap<u64, u64>,
}

impl RejectedMeshes {
    fn should_upload(&self, entity_id: u64, revision: u64) -> bool {
        self.revisions.get(&entity_id) != Some(&revision)
    }

    fn reject(&mut self, entity_id: u64, revision: u64) {
        self.revisions.insert(entity_id, revision);
    }

    fn accept(&mut self, entity_id: u64) {
        self.revisions.remove(&entity_id);
    }

    fn retain(&mut self, current: &HashSet<u64>) {
        self.revisions.retain(|id, _| current.contains(id));
    }
}

pub struct PrismPlugin {
    renderer: Renderer,
    table: GeometryTable,
    /// Keyed by entity id; refreshed in `prepare`.
    mesh_cache: HashMap<u64, CachedMesh>,
    rejected: RejectedMeshes,
    offscreen: wgpu::Texture,
}

impl PrismPlugin {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Result<Self, String> {
        Self::new_with_config(device, queue, RendererConfig::default())
    }

    pub fn new_with_config(device: wgpu::Device, queue: wgpu::Queue, config: RendererConfig) -> Result<Self, String> {
        let renderer = Renderer::new(device, queue, config).map_err(|e| e.to_string())?;
        let config = renderer.config();
        let offscreen = renderer.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("prism_offscreen_output"),
            size: wgpu::Extent3d { width: config.width, height: config.height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: config.output_format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        Ok(Self { renderer, table: GeometryTable::new(), mesh_cache: HashMap::new(), rejected: RejectedMeshes::default(), offscreen })
    }

    pub fn device(&self) -> &wgpu::Device {
        self.renderer.device()
    }

    pub fn queue(&self) -> &wgpu::Queue {
        self.renderer.queue()
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer {
        &mut self.renderer
    }

    /// Forward programs are registered here so records can refer to them.
    pub fn table_mut(&mut self) -> &mut GeometryTable {
        &mut self.table
    }

    /// Target of `render_frame`; sized and formatted from the renderer config.
    pub fn offscreen_texture(&self) -> &wgpu::Texture {
        &self.offscreen
    }

    /// Queue every cached visible instance and render into `output`.
    pub fn render_frame_to_view(&mut self, view: &ExtractedView, output: &wgpu::TextureView) -> Result<(), String> {
        let config = self.renderer.config();
        if view.viewport_size != (config.width, config.height) {
            log::trace!(
                "viewport {:?} differs from configured {}x{}; rendering at configured size",
                view.viewport_size,
                config.width,
                config.height
            );
        }
        self.renderer.set_camera(view.camera);
        for cached in self.mesh_cache.values().filter(|c| c.visible) {
            let Some(record) = self.table.record(cached.name.clone(), cached.handle, cached.transform) else {
                log::warn!("mesh '{}' is missing from the geometry table", cached.name);
                continue;
            };
            if let Err(e) = self.renderer.push_to_draw_queue(record.dynamic(cached.is_dynamic)) {
                log::warn!("skipping '{}': {e}", cached.name);
            }
        }
        self.renderer.render(&self.table, output).map_err(|e| e.to_string())
    }
}

impl RenderBackend for PrismPlugin {
    fn prepare(&mut self, extracted: &ExtractedMeshes) {
        let current: HashSet<u64> = extracted.meshes.keys().copied().collect();
        let table = &mut self.table;
        self.mesh_cache.retain(|id, cached| {
            let keep = current.contains(id);
            if !keep {
                table.remove_mesh(cached.handle);
            }
            keep
        });
        self.rejected.retain(&current);
        for (&entity_id, mesh) in &extracted.meshes {
            if let Some(cached) = self.mesh_cache.get_mut(&entity_id) {
                cached.transform = mesh.transform;
                cached.is_dynamic = mesh.is_dynamic;
                cached.visible = mesh.visible;
                if cached.revision == mesh.revision {
                    continue;
                }
            }
            if !self.rejected.should_upload(entity_id, mesh.revision) {
                continue;
            }
            let device = self.renderer.device();
            let queue = self.renderer.queue();
            let handle = match self.table.upload_mesh(device, queue, &mesh.mesh) {
                Ok(handle) => handle,
                Err(e) => {
                    log::error!("mesh '{}' (entity {entity_id}) not uploaded: {e}", mesh.mesh.name);
                    self.rejected.reject(entity_id, mesh.revision);
                    continue;
                }
            };
            self.rejected.accept(entity_id);
            let cached = CachedMesh {
                handle,
                name: mesh.mesh.name.clone(),
                revision: mesh.revision,
                transform: mesh.transform,
                is_dynamic: mesh.is_dynamic,
                visible: mesh.visible,
            };
            if let Some(old) = self.mesh_cache.insert(entity_id, cached) {
                self.table.remove_mesh(old.handle);
            }
        }
    }

    fn add_light(&mut self, light: Light) -> Result<(), String> {
        self.renderer.add_light(light).map(|_| ()).map_err(|e| e.to_string())
    }

    fn render_frame(&mut self, view: &ExtractedView) -> Result<(), String> {
        let output = self.offscreen.create_view(&wgpu::TextureViewDescriptor::default());
        self.render_frame_to_view(view, &output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_revision_is_not_retried_until_bumped() {
        let mut rejected = RejectedMeshes::default();
        assert!(rejected.should_upload(7, 1));
        rejected.reject(7, 1);
        assert!(!rejected.should_upload(7, 1));
        assert!(rejected.should_upload(7, 2));
        assert!(rejected.should_upload(8, 1));
        rejected.accept(7);
        assert!(rejected.should_upload(7, 1));
    }

    #[test]
    fn vanished_entities_are_forgotten() {
        let mut rejected = RejectedMeshes::default();
        rejected.reject(1, 3);
        rejected.reject(2, 3);
        rejected.retain(&HashSet::from([2]));
        assert!(rejected.should_upload(1, 3));
        assert!(!rejected.should_upload(2, 3));
    }
}
