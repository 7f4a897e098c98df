//! Screen-space ambient occlusion: hemisphere kernel, tiled rotation noise, fullscreen pass.

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use wgpu::CommandEncoder;

use crate::config::SsaoOptions;
use crate::error::RendererError;
use crate::pipeline::{color_attachment, fullscreen_pipeline, shader_module, texture_entry, uniform_buffer, uniform_entry, COMMON_WGSL};
use crate::resources::{FrameResources, SSAO_FORMAT};
use crate::scene::SceneBindings;

const FULLSCREEN_SHADER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/fullscreen.wgsl"));
const SSAO_SHADER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/ssao.wgsl"));

pub const SSAO_KERNEL_SIZE: usize = 8;
/// Edge length of the tiled rotation noise.
pub const SSAO_NOISE_DIM: u32 = 4;

/// Seeded when a seed is given, otherwise from OS entropy.
pub fn ssao_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Samples in the +Z hemisphere, scaled so that they cluster near the origin.
pub fn ssao_kernel(rng: &mut impl Rng) -> [Vec3; SSAO_KERNEL_SIZE] {
    std::array::from_fn(|i| {
        let dir = Vec3::new(rng.random::<f32>() * 2.0 - 1.0, rng.random::<f32>() * 2.0 - 1.0, rng.random::<f32>());
        let sample = dir.normalize_or(Vec3::Z) * rng.random::<f32>();
        let t = i as f32 / SSAO_KERNEL_SIZE as f32;
        sample * (0.1 + (1.0 - 0.1) * t * t)
    })
}

/// Rotation vectors around Z, one per noise texel, components in -1..1.
pub fn ssao_noise(rng: &mut impl Rng) -> Vec<Vec3> {
    (0..SSAO_NOISE_DIM * SSAO_NOISE_DIM)
        .map(|_| Vec3::new(rng.random::<f32>() * 2.0 - 1.0, rng.random::<f32>() * 2.0 - 1.0, 0.0))
        .collect()
}

/// Noise packed into RGBA8 with `v * 0.5 + 0.5`.
fn pack_noise(noise: &[Vec3]) -> Vec<u8> {
    noise
        .iter()
        .flat_map(|v| {
            let c = (*v * 0.5 + 0.5).clamp(Vec3::ZERO, Vec3::ONE) * 255.0;
            [c.x.round() as u8, c.y.round() as u8, c.z.round() as u8, 255]
        })
        .collect()
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct SsaoUniforms {
    samples: [[f32; 4]; SSAO_KERNEL_SIZE],
    radius: f32,
    bias: f32,
    intensity: f32,
    kernel_size: u32,
}

impl SsaoUniforms {
    fn new(kernel: &[Vec3; SSAO_KERNEL_SIZE], options: &SsaoOptions) -> Self {
        Self {
            samples: kernel.map(|s| s.extend(0.0).to_array()),
            radius: options.radius,
            bias: options.bias,
            intensity: options.intensity,
            kernel_size: SSAO_KERNEL_SIZE as u32,
        }
    }
}

pub struct SsaoPass {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    noise_view: wgpu::TextureView,
    kernel: [Vec3; SSAO_KERNEL_SIZE],
    uniform_buf: wgpu::Buffer,
}

impl SsaoPass {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, scene: &SceneBindings, options: &SsaoOptions) -> Result<Self, RendererError> {
        let mut rng = ssao_rng(options.seed);
        let kernel = ssao_kernel(&mut rng);
        let noise = ssao_noise(&mut rng);

        let shader = shader_module(device, "ssao_shader", &[COMMON_WGSL, FULLSCREEN_SHADER, SSAO_SHADER]);
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ssao_bind_group_layout"),
            entries: &[
                texture_entry(0, wgpu::TextureViewDimension::D2),
                texture_entry(1, wgpu::TextureViewDimension::D2),
                texture_entry(2, wgpu::TextureViewDimension::D2),
                uniform_entry(3, wgpu::ShaderStages::FRAGMENT, std::mem::size_of::<SsaoUniforms>() as u64),
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("ssao_pipeline_layout"),
            bind_group_layouts: &[scene.layout(), &bind_group_layout],
            push_constant_ranges: &[],
        });
        let pipeline = fullscreen_pipeline(device, "ssao_pipeline", &pipeline_layout, &shader, "fs_ssao", &[Some(SSAO_FORMAT.into())]);

        let size = wgpu::Extent3d { width: SSAO_NOISE_DIM, height: SSAO_NOISE_DIM, depth_or_array_layers: 1 };
        let noise_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("ssao_noise"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &noise_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &pack_noise(&noise),
            wgpu::ImageDataLayout { offset: 0, bytes_per_row: Some(4 * SSAO_NOISE_DIM), rows_per_image: Some(SSAO_NOISE_DIM) },
            size,
        );
        let uniform_buf = uniform_buffer(device, "ssao_uniform", &SsaoUniforms::new(&kernel, options));
        log::debug!("ssao kernel ready ({SSAO_KERNEL_SIZE} samples, seed {:?})", options.seed);
        Ok(Self { pipeline, bind_group_layout, noise_view: noise_texture.create_view(&Default::default()), kernel, uniform_buf })
    }

    /// Rewrite radius, bias and intensity; the kernel and noise stay as built.
    pub fn set_options(&self, queue: &wgpu::Queue, options: &SsaoOptions) {
        queue.write_buffer(&self.uniform_buf, 0, bytemuck::bytes_of(&SsaoUniforms::new(&self.kernel, options)));
    }

    pub fn encode(&self, encoder: &mut CommandEncoder, device: &wgpu::Device, frame: &FrameResources, scene: &wgpu::BindGroup) {
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ssao_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(&frame.position) },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(&frame.normal) },
                wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::TextureView(&self.noise_view) },
                wgpu::BindGroupEntry { binding: 3, resource: self.uniform_buf.as_entire_binding() },
            ],
        });
        let mut rp = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("ssao_pass"),
            color_attachments: &[color_attachment(&frame.ssao, wgpu::LoadOp::Clear(wgpu::Color::WHITE))],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        rp.set_pipeline(&self.pipeline);
        rp.set_bind_group(0, scene, &[]);
        rp.set_bind_group(1, &bind_group, &[]);
        rp.draw(0..3, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_kernel_is_reproducible() {
        let a = ssao_kernel(&mut ssao_rng(Some(7)));
        let b = ssao_kernel(&mut ssao_rng(Some(7)));
        let c = ssao_kernel(&mut ssao_rng(Some(8)));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn kernel_stays_in_upper_hemisphere_and_scale_bound() {
        let mut rng = ssao_rng(Some(42));
        for _ in 0..16 {
            let kernel = ssao_kernel(&mut rng);
            for (i, s) in kernel.iter().enumerate() {
                assert!(s.z >= 0.0);
                let t = i as f32 / SSAO_KERNEL_SIZE as f32;
                let scale = 0.1 + 0.9 * t * t;
                assert!(s.length() <= scale + 1e-5, "sample {i} too long: {}", s.length());
            }
        }
    }

    #[test]
    fn noise_rotates_around_z() {
        let noise = ssao_noise(&mut ssao_rng(Some(3)));
        assert_eq!(noise.len(), (SSAO_NOISE_DIM * SSAO_NOISE_DIM) as usize);
        assert!(noise.iter().all(|v| v.z == 0.0 && v.x.abs() <= 1.0 && v.y.abs() <= 1.0));
    }

    #[test]
    fn noise_packs_to_unorm() {
        let packed = pack_noise(&[Vec3::new(-1.0, 1.0, 0.0)]);
        assert_eq!(packed, vec![0, 255, 128, 255]);
    }

    #[test]
    fn uniforms_match_shader_block() {
        assert_eq!(std::mem::size_of::<SsaoUniforms>(), 144);
    }

    #[test]
    fn new_options_keep_the_kernel() {
        let kernel = ssao_kernel(&mut ssao_rng(Some(5)));
        let before = SsaoUniforms::new(&kernel, &SsaoOptions::default());
        let after = SsaoUniforms::new(&kernel, &SsaoOptions { radius: 2.0, bias: 0.1, intensity: 3.0, ..Default::default() });
        assert_eq!(before.samples, after.samples);
        assert_eq!((after.radius, after.bias, after.intensity), (2.0, 0.1, 3.0));
    }
}
