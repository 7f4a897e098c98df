//! Present pass: composite HDR color with bloom and blurred AO, tone map, render to the output view.

use wgpu::CommandEncoder;

use crate::config::{PipelineMode, RendererConfig, ToneMapping};
use crate::error::RendererError;
use crate::pipeline::{color_attachment, fullscreen_pipeline, linear_sampler, sampler_entry, shader_module, texture_entry, uniform_entry};
use crate::resources::FrameResources;

const FULLSCREEN_SHADER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/fullscreen.wgsl"));
const PRESENT_SHADER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/present.wgsl"));

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
struct PresentUniforms {
    mode: u32,
    debug_view: u32,
    tone_mapping: u32,
    post_effects: u32,
    bloom_color: [f32; 3],
    bloom_intensity: f32,
    ao_color: [f32; 3],
    ao_intensity: f32,
    bloom_enabled: u32,
    ao_enabled: u32,
    encode_gamma: u32,
    _pad: u32,
}

impl PresentUniforms {
    fn new(config: &RendererConfig, post_effects: bool) -> Self {
        let (mode, debug_view) = match config.pipeline {
            PipelineMode::Debug(view) => (1, view.index()),
            _ => (0, 0),
        };
        Self {
            mode,
            debug_view,
            tone_mapping: match config.tone_mapping {
                ToneMapping::Reinhard => 0,
                ToneMapping::None => 1,
            },
            post_effects: post_effects as u32,
            bloom_color: config.bloom.color.to_array(),
            bloom_intensity: config.bloom.intensity,
            ao_color: config.ssao.color.to_array(),
            ao_intensity: config.ssao.intensity,
            bloom_enabled: config.bloom.enabled as u32,
            ao_enabled: (config.ssao.enabled && config.pipeline != PipelineMode::Forward) as u32,
            encode_gamma: (!config.output_format.is_srgb()) as u32,
            _pad: 0,
        }
    }
}

pub struct PresentPass {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    uniform_buf: wgpu::Buffer,
}

impl PresentPass {
    pub fn new(device: &wgpu::Device, output_format: wgpu::TextureFormat) -> Result<Self, RendererError> {
        let shader = shader_module(device, "present_shader", &[FULLSCREEN_SHADER, PRESENT_SHADER]);
        let mut entries: Vec<wgpu::BindGroupLayoutEntry> = (0..8).map(|i| texture_entry(i, wgpu::TextureViewDimension::D2)).collect();
        entries.push(sampler_entry(8));
        entries.push(uniform_entry(9, wgpu::ShaderStages::FRAGMENT, std::mem::size_of::<PresentUniforms>() as u64));
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("present_bind_group_layout"),
            entries: &entries,
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("present_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let target = wgpu::ColorTargetState { format: output_format, blend: None, write_mask: wgpu::ColorWrites::ALL };
        let pipeline = fullscreen_pipeline(device, "present_pipeline", &pipeline_layout, &shader, "fs_present", &[Some(target)]);
        let uniform_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("present_uniform"),
            size: std::mem::size_of::<PresentUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let sampler = linear_sampler(device, "present_sampler", wgpu::AddressMode::ClampToEdge);
        Ok(Self { pipeline, bind_group_layout, sampler, uniform_buf })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn encode(
        &self,
        encoder: &mut CommandEncoder,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        config: &RendererConfig,
        post_effects: bool,
        frame: &FrameResources,
        shadow_moments: &wgpu::TextureView,
        output_view: &wgpu::TextureView,
    ) {
        queue.write_buffer(&self.uniform_buf, 0, bytemuck::bytes_of(&PresentUniforms::new(config, post_effects)));
        let views = [
            &frame.color,
            frame.post_view(),
            &frame.albedo,
            &frame.normal,
            &frame.position,
            &frame.material,
            &frame.ssao,
            shadow_moments,
        ];
        let mut entries: Vec<wgpu::BindGroupEntry> = views
            .iter()
            .enumerate()
            .map(|(i, v)| wgpu::BindGroupEntry { binding: i as u32, resource: wgpu::BindingResource::TextureView(v) })
            .collect();
        entries.push(wgpu::BindGroupEntry { binding: 8, resource: wgpu::BindingResource::Sampler(&self.sampler) });
        entries.push(wgpu::BindGroupEntry { binding: 9, resource: self.uniform_buf.as_entire_binding() });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("present_bind_group"),
            layout: &self.bind_group_layout,
            entries: &entries,
        });
        let mut rp = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("present_pass"),
            color_attachments: &[color_attachment(output_view, wgpu::LoadOp::Clear(wgpu::Color::BLACK))],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        rp.set_pipeline(&self.pipeline);
        rp.set_bind_group(0, &bind_group, &[]);
        rp.draw(0..3, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BloomOptions, DebugView, SsaoOptions};
    use glam::Vec3;

    #[test]
    fn uniforms_match_shader_block() {
        assert_eq!(std::mem::size_of::<PresentUniforms>(), 64);
    }

    #[test]
    fn debug_mode_selects_view() {
        let config = RendererConfig { pipeline: PipelineMode::Debug(DebugView::Occlusion), ..Default::default() };
        let u = PresentUniforms::new(&config, true);
        assert_eq!((u.mode, u.debug_view), (1, 4));
    }

    #[test]
    fn forward_mode_never_tints_occlusion() {
        let config = RendererConfig { pipeline: PipelineMode::Forward, ..Default::default() };
        assert_eq!(PresentUniforms::new(&config, true).ao_enabled, 0);
        assert_eq!(PresentUniforms::new(&RendererConfig::default(), true).ao_enabled, 1);
    }

    #[test]
    fn gamma_is_applied_only_for_linear_outputs() {
        let linear = RendererConfig::default();
        let srgb = RendererConfig { output_format: wgpu::TextureFormat::Bgra8UnormSrgb, ..Default::default() };
        assert_eq!(PresentUniforms::new(&linear, true).encode_gamma, 1);
        assert_eq!(PresentUniforms::new(&srgb, false).encode_gamma, 0);
        assert_eq!(PresentUniforms::new(&srgb, false).post_effects, 0);
    }

    #[test]
    fn updated_post_settings_reach_the_composite() {
        let mut config = RendererConfig::default();
        config.set_bloom(BloomOptions { enabled: false, intensity: 0.4, color: Vec3::new(1.0, 0.5, 0.0), ..Default::default() }).unwrap();
        config.set_ssao(SsaoOptions { intensity: 2.0, color: Vec3::X, ..Default::default() }).unwrap();
        let u = PresentUniforms::new(&config, true);
        assert_eq!((u.bloom_enabled, u.bloom_intensity, u.bloom_color), (0, 0.4, [1.0, 0.5, 0.0]));
        assert_eq!((u.ao_enabled, u.ao_intensity, u.ao_color), (1, 2.0, [1.0, 0.0, 0.0]));
    }
}
