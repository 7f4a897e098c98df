//! Lighting composition: one fullscreen pass over the G-buffer evaluating every light, shadows,
//! SSAO and probe IBL. Writes HDR color and the bloom bright pass.

use wgpu::CommandEncoder;

use crate::error::RendererError;
use crate::pipeline::{color_attachment, fullscreen_pipeline, shader_module, texture_entry, COMMON_WGSL};
use crate::resources::{FrameResources, HDR_FORMAT};
use crate::scene::SceneBindings;

const FULLSCREEN_SHADER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/fullscreen.wgsl"));
const LIGHTING_SHADER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/lighting.wgsl"));

pub struct LightPass {
    pipeline: wgpu::RenderPipeline,
    gbuffer_layout: wgpu::BindGroupLayout,
}

impl LightPass {
    pub fn new(device: &wgpu::Device, scene: &SceneBindings, ibl_layout: &wgpu::BindGroupLayout) -> Result<Self, RendererError> {
        let shader = shader_module(device, "lighting_shader", &[COMMON_WGSL, FULLSCREEN_SHADER, LIGHTING_SHADER]);
        let gbuffer_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lighting_gbuffer_bind_group_layout"),
            entries: &[
                texture_entry(0, wgpu::TextureViewDimension::D2),
                texture_entry(1, wgpu::TextureViewDimension::D2),
                texture_entry(2, wgpu::TextureViewDimension::D2),
                texture_entry(3, wgpu::TextureViewDimension::D2),
                texture_entry(4, wgpu::TextureViewDimension::D2),
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("lighting_pipeline_layout"),
            bind_group_layouts: &[scene.layout(), &gbuffer_layout, ibl_layout],
            push_constant_ranges: &[],
        });
        let pipeline = fullscreen_pipeline(
            device,
            "lighting_pipeline",
            &pipeline_layout,
            &shader,
            "fs_lighting",
            &[Some(HDR_FORMAT.into()), Some(HDR_FORMAT.into())],
        );
        Ok(Self { pipeline, gbuffer_layout })
    }

    pub fn encode(&self, encoder: &mut CommandEncoder, device: &wgpu::Device, frame: &FrameResources, scene: &wgpu::BindGroup, ibl: &wgpu::BindGroup) {
        let views = [&frame.albedo, &frame.normal, &frame.position, &frame.material, &frame.ssao];
        let entries: Vec<wgpu::BindGroupEntry> = views
            .iter()
            .enumerate()
            .map(|(i, v)| wgpu::BindGroupEntry { binding: i as u32, resource: wgpu::BindingResource::TextureView(v) })
            .collect();
        let gbuffer = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lighting_gbuffer_bind_group"),
            layout: &self.gbuffer_layout,
            entries: &entries,
        });
        let mut rp = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("lighting_pass"),
            color_attachments: &[
                color_attachment(&frame.color, wgpu::LoadOp::Clear(wgpu::Color::BLACK)),
                color_attachment(&frame.bright, wgpu::LoadOp::Clear(wgpu::Color::BLACK)),
            ],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        rp.set_pipeline(&self.pipeline);
        rp.set_bind_group(0, scene, &[]);
        rp.set_bind_group(1, &gbuffer, &[]);
        rp.set_bind_group(2, ibl, &[]);
        rp.draw(0..3, 0..1);
    }
}
