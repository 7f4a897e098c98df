//! Group 0 of every lit pass: scene uniforms plus the directional and point shadow textures.

use crate::pipeline::{sampler_entry, texture_entry, uniform_entry, SCENE_STAGES};
use crate::uniforms::{SceneUniforms, SCENE_UNIFORMS_SIZE};

pub struct SceneBindings {
    layout: wgpu::BindGroupLayout,
    shadow_sampler: wgpu::Sampler,
}

impl SceneBindings {
    pub fn new(device: &wgpu::Device) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("scene_bind_group_layout"),
            entries: &[
                uniform_entry(0, SCENE_STAGES, SCENE_UNIFORMS_SIZE),
                texture_entry(1, wgpu::TextureViewDimension::D2),
                texture_entry(2, wgpu::TextureViewDimension::CubeArray),
                sampler_entry(3),
            ],
        });
        let shadow_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("shadow_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        Self { layout, shadow_sampler }
    }

    pub fn layout(&self) -> &wgpu::BindGroupLayout {
        &self.layout
    }

    pub fn create_uniform_buffer(&self, device: &wgpu::Device, label: &str) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: SCENE_UNIFORMS_SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    pub(crate) fn write(queue: &wgpu::Queue, buffer: &wgpu::Buffer, uniforms: &SceneUniforms) {
        queue.write_buffer(buffer, 0, bytemuck::bytes_of(uniforms));
    }

    pub fn bind_group(
        &self,
        device: &wgpu::Device,
        uniforms: &wgpu::Buffer,
        directional_moments: &wgpu::TextureView,
        point_moments: &wgpu::TextureView,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("scene_bind_group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: uniforms.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(directional_moments) },
                wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::TextureView(point_moments) },
                wgpu::BindGroupEntry { binding: 3, resource: wgpu::BindingResource::Sampler(&self.shadow_sampler) },
            ],
        })
    }
}
