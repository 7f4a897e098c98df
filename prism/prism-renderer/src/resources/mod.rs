//! Frame resources: G-buffer, HDR color + bright pass, SSAO, and the half-resolution post ping-pong.

use wgpu::TextureView;

use crate::blur::{BlurPass, BlurTarget};
use crate::config::{PipelineMode, RendererConfig};
use crate::error::RendererError;
use crate::pipeline::logged_scope;

pub const ALBEDO_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const NORMAL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const POSITION_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const MATERIAL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const SSAO_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;

pub struct FrameResources {
    pub albedo: TextureView,
    pub normal: TextureView,
    pub position: TextureView,
    pub material: TextureView,
    pub depth: TextureView,
    pub color: TextureView,
    pub bright: TextureView,
    pub ssao: TextureView,
    /// Bloom (rgb) and occlusion (alpha) blurred together at half resolution.
    pub post: BlurTarget,
    width: u32,
    height: u32,
}

impl FrameResources {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, config: &RendererConfig, blur: &BlurPass) -> Result<Self, RendererError> {
        if config.width == 0 || config.height == 0 {
            return Err(RendererError::FrameResources("width and height must be > 0".to_string()));
        }
        logged_scope(device, "frame render targets", || Ok(Self::create(device, queue, config, blur)))
    }

    fn create(device: &wgpu::Device, queue: &wgpu::Queue, config: &RendererConfig, blur: &BlurPass) -> Self {
        let (width, height) = (config.width, config.height);
        let make_rt = |label: &str, format: wgpu::TextureFormat| {
            device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some(label),
                    size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
                    view_formats: &[],
                })
                .create_view(&Default::default())
        };
        let albedo = make_rt("gbuffer_albedo", ALBEDO_FORMAT);
        let normal = make_rt("gbuffer_normal", NORMAL_FORMAT);
        let position = make_rt("gbuffer_position", POSITION_FORMAT);
        let material = make_rt("gbuffer_material", MATERIAL_FORMAT);
        let depth = make_rt("depth", DEPTH_FORMAT);
        let color = make_rt("hdr_color", HDR_FORMAT);
        let bright = make_rt("bright_pass", HDR_FORMAT);
        let ssao = make_rt("ssao", SSAO_FORMAT);
        // Forward frames have no occlusion; a cleared-white target keeps the packed alpha neutral.
        if config.pipeline == PipelineMode::Forward || !config.ssao.enabled {
            clear_white(device, queue, &ssao);
        }
        let post = BlurTarget::new(
            device,
            blur,
            "post_blur",
            HDR_FORMAT,
            config.post_extent(),
            config.blur_iterations,
            &bright,
            Some(&ssao),
        );
        log::debug!("frame resources {width}x{height}, post {:?}", config.post_extent());
        Self { albedo, normal, position, material, depth, color, bright, ssao, post, width, height }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Reset occlusion to neutral white, e.g. after SSAO is switched off.
    pub fn clear_occlusion(&self, device: &wgpu::Device, queue: &wgpu::Queue) {
        clear_white(device, queue, &self.ssao);
    }

    /// Blurred bloom + occlusion, or the raw bright pass when blurring is off.
    pub fn post_view(&self) -> &TextureView {
        self.post.result_view().unwrap_or(&self.bright)
    }
}

fn clear_white(device: &wgpu::Device, queue: &wgpu::Queue, view: &TextureView) {
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("ssao_clear") });
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("ssao_clear"),
        color_attachments: &[crate::pipeline::color_attachment(view, wgpu::LoadOp::Clear(wgpu::Color::WHITE))],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    });
    queue.submit(Some(encoder.finish()));
}
