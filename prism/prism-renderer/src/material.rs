//! Material texture bindings: one fixed slot per texture kind, neutral defaults for missing kinds.

use render_api::TextureKind;

use crate::geometry::{create_rgba8_texture, GeometryTable, GpuTexture};
use crate::pipeline::{linear_sampler, sampler_entry, texture_entry};
use crate::queue::GeometryRecord;

/// Texel used when a record has no texture of the given kind.
pub(crate) fn default_texel(kind: TextureKind) -> [u8; 4] {
    match kind {
        TextureKind::Diffuse | TextureKind::Occlusion => [255, 255, 255, 255],
        TextureKind::Specular | TextureKind::Roughness => [128, 128, 128, 255],
        TextureKind::Normal => [128, 128, 255, 255],
        TextureKind::Metallic => [0, 0, 0, 255],
    }
}

pub struct MaterialBindings {
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    defaults: Vec<GpuTexture>,
}

impl MaterialBindings {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let mut entries: Vec<wgpu::BindGroupLayoutEntry> = TextureKind::ALL
            .iter()
            .map(|k| texture_entry(k.slot() as u32, wgpu::TextureViewDimension::D2))
            .collect();
        entries.push(sampler_entry(TextureKind::ALL.len() as u32));
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("material_bind_group_layout"),
            entries: &entries,
        });
        let defaults = TextureKind::ALL
            .iter()
            .map(|&k| create_rgba8_texture(device, queue, "material_default", k, 1, 1, &default_texel(k)))
            .collect();
        let sampler = linear_sampler(device, "material_sampler", wgpu::AddressMode::Repeat);
        Self { layout, sampler, defaults }
    }

    pub fn layout(&self) -> &wgpu::BindGroupLayout {
        &self.layout
    }

    /// Bind the record's textures by kind; unknown or stale handles fall back to defaults.
    pub fn bind_group(&self, device: &wgpu::Device, table: &GeometryTable, record: &GeometryRecord) -> wgpu::BindGroup {
        let views: Vec<&wgpu::TextureView> = TextureKind::ALL
            .iter()
            .map(|&k| {
                record
                    .texture(k)
                    .and_then(|h| table.texture(h))
                    .map(|t| &t.view)
                    .unwrap_or(&self.defaults[k.slot()].view)
            })
            .collect();
        let mut entries: Vec<wgpu::BindGroupEntry> = views
            .iter()
            .enumerate()
            .map(|(i, v)| wgpu::BindGroupEntry { binding: i as u32, resource: wgpu::BindingResource::TextureView(v) })
            .collect();
        entries.push(wgpu::BindGroupEntry {
            binding: TextureKind::ALL.len() as u32,
            resource: wgpu::BindingResource::Sampler(&self.sampler),
        });
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("material_bind_group"),
            layout: &self.layout,
            entries: &entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_neutral() {
        assert_eq!(default_texel(TextureKind::Diffuse), [255; 4]);
        assert_eq!(default_texel(TextureKind::Normal), [128, 128, 255, 255]);
        assert_eq!(default_texel(TextureKind::Metallic)[0], 0);
    }

    #[test]
    fn slots_are_dense_and_unique() {
        let mut slots: Vec<usize> = TextureKind::ALL.iter().map(|k| k.slot()).collect();
        slots.sort_unstable();
        assert_eq!(slots, (0..TextureKind::ALL.len()).collect::<Vec<_>>());
    }
}
