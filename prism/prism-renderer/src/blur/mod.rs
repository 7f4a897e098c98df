//! Ping-pong separable Gaussian blur. Used for bloom + SSAO and for soft directional shadows.

use crate::error::RendererError;
use crate::pipeline::{color_attachment, fullscreen_pipeline, linear_sampler, sampler_entry, shader_module, texture_entry, uniform_buffer, uniform_entry};

const FULLSCREEN_SHADER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/fullscreen.wgsl"));
const BLUR_SHADER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/blur.wgsl"));

/// Center tap first, then one weight per symmetric pair of taps.
pub const BLUR_WEIGHTS: [f32; 5] = [0.227027, 0.1945946, 0.1216216, 0.054054, 0.016216];

/// Formats a blur target may use.
const BLUR_FORMATS: [wgpu::TextureFormat; 2] = [wgpu::TextureFormat::Rg16Float, wgpu::TextureFormat::Rgba16Float];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlurSource {
    /// The texture(s) being blurred.
    Input,
    Buffer(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlurStep {
    pub horizontal: bool,
    pub read: BlurSource,
    pub write: usize,
}

/// Alternation state. Each step writes buffer `horizontal as usize` and flips the direction;
/// only the first step reads the input.
#[derive(Clone, Copy, Debug)]
pub struct PingPong {
    horizontal: bool,
    first_iteration: bool,
}

impl Default for PingPong {
    fn default() -> Self {
        Self { horizontal: true, first_iteration: true }
    }
}

impl PingPong {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_step(&mut self) -> BlurStep {
        let step = BlurStep {
            horizontal: self.horizontal,
            read: if self.first_iteration { BlurSource::Input } else { BlurSource::Buffer(!self.horizontal as usize) },
            write: self.horizontal as usize,
        };
        self.horizontal = !self.horizontal;
        self.first_iteration = false;
        step
    }
}

pub fn blur_steps(iterations: u32) -> Vec<BlurStep> {
    let mut pp = PingPong::new();
    (0..iterations).map(|_| pp.next_step()).collect()
}

/// Buffer holding the result after `iterations` steps; `None` when nothing is blurred.
pub fn final_buffer(iterations: u32) -> Option<usize> {
    (iterations > 0).then_some((iterations % 2) as usize)
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct BlurUniforms {
    texel_step: [f32; 2],
    pack_secondary: u32,
    tap_count: u32,
    weights: [[f32; 4]; 2],
}

impl BlurUniforms {
    fn new(texel_step: [f32; 2], pack_secondary: bool) -> Self {
        let mut weights = [[0.0; 4]; 2];
        for (i, w) in BLUR_WEIGHTS.iter().enumerate() {
            weights[i / 4][i % 4] = *w;
        }
        Self { texel_step, pack_secondary: pack_secondary as u32, tap_count: BLUR_WEIGHTS.len() as u32, weights }
    }
}

/// Two same-sized buffers plus the bind groups each step reads from.
pub struct BlurTarget {
    label: String,
    format: wgpu::TextureFormat,
    views: [wgpu::TextureView; 2],
    /// Read input (horizontal), read buffer 0 (horizontal), read buffer 1 (vertical).
    bind_groups: [wgpu::BindGroup; 3],
    iterations: u32,
}

impl BlurTarget {
    /// `secondary`, when given, is packed into alpha on the first step.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        device: &wgpu::Device,
        pass: &BlurPass,
        label: &str,
        format: wgpu::TextureFormat,
        size: (u32, u32),
        iterations: u32,
        primary: &wgpu::TextureView,
        secondary: Option<&wgpu::TextureView>,
    ) -> Self {
        let (width, height) = size;
        let make = |i: usize| {
            device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some(&format!("{label}_pingpong{i}")),
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
        let views = [make(0), make(1)];
        let h_step = [1.0 / width as f32, 0.0];
        let v_step = [0.0, 1.0 / height as f32];
        let bind_groups = [
            pass.bind_group(device, primary, secondary.unwrap_or(primary), &BlurUniforms::new(h_step, secondary.is_some())),
            pass.bind_group(device, &views[0], &views[0], &BlurUniforms::new(h_step, false)),
            pass.bind_group(device, &views[1], &views[1], &BlurUniforms::new(v_step, false)),
        ];
        Self { label: label.to_string(), format, views, bind_groups, iterations }
    }

    /// Blurred result, or `None` when configured for zero iterations.
    pub fn result_view(&self) -> Option<&wgpu::TextureView> {
        final_buffer(self.iterations).map(|i| &self.views[i])
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Bind groups do not depend on the step count, so only the counter changes.
    pub fn set_iterations(&mut self, iterations: u32) {
        self.iterations = iterations;
    }
}

pub struct BlurPass {
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    pipelines: Vec<(wgpu::TextureFormat, wgpu::RenderPipeline)>,
}

impl BlurPass {
    pub fn new(device: &wgpu::Device) -> Result<Self, RendererError> {
        let shader = shader_module(device, "blur_shader", &[FULLSCREEN_SHADER, BLUR_SHADER]);
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("blur_bind_group_layout"),
            entries: &[
                texture_entry(0, wgpu::TextureViewDimension::D2),
                texture_entry(1, wgpu::TextureViewDimension::D2),
                sampler_entry(2),
                uniform_entry(3, wgpu::ShaderStages::FRAGMENT, std::mem::size_of::<BlurUniforms>() as u64),
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("blur_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let pipelines = BLUR_FORMATS
            .iter()
            .map(|&format| {
                let pipeline = fullscreen_pipeline(device, "blur_pipeline", &pipeline_layout, &shader, "fs_blur", &[Some(format.into())]);
                (format, pipeline)
            })
            .collect();
        let sampler = linear_sampler(device, "blur_sampler", wgpu::AddressMode::ClampToEdge);
        Ok(Self { bind_group_layout, sampler, pipelines })
    }

    fn bind_group(
        &self,
        device: &wgpu::Device,
        primary: &wgpu::TextureView,
        secondary: &wgpu::TextureView,
        uniforms: &BlurUniforms,
    ) -> wgpu::BindGroup {
        let buf = uniform_buffer(device, "blur_uniform", uniforms);
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("blur_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(primary) },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(secondary) },
                wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::Sampler(&self.sampler) },
                wgpu::BindGroupEntry { binding: 3, resource: buf.as_entire_binding() },
            ],
        })
    }

    pub fn encode(&self, encoder: &mut wgpu::CommandEncoder, target: &BlurTarget) -> Result<(), RendererError> {
        let pipeline = self
            .pipelines
            .iter()
            .find(|(f, _)| *f == target.format)
            .map(|(_, p)| p)
            .ok_or_else(|| RendererError::FrameResources(format!("no blur pipeline for {:?}", target.format)))?;
        for step in blur_steps(target.iterations) {
            let bind_group = match step.read {
                BlurSource::Input => &target.bind_groups[0],
                BlurSource::Buffer(0) => &target.bind_groups[1],
                BlurSource::Buffer(_) => &target.bind_groups[2],
            };
            let mut rp = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(&target.label),
                color_attachments: &[color_attachment(&target.views[step.write], wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT))],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            rp.set_pipeline(pipeline);
            rp.set_bind_group(0, bind_group, &[]);
            rp.draw(0..3, 0..1);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_index_is_iterations_mod_two() {
        for k in 1..9u32 {
            let steps = blur_steps(k);
            assert_eq!(steps.last().map(|s| s.write), final_buffer(k));
            assert_eq!(final_buffer(k), Some((k % 2) as usize));
        }
        assert_eq!(final_buffer(0), None);
    }

    #[test]
    fn only_first_step_reads_input() {
        let steps = blur_steps(5);
        assert_eq!(steps[0], BlurStep { horizontal: true, read: BlurSource::Input, write: 1 });
        for pair in steps.windows(2) {
            assert_eq!(pair[1].read, BlurSource::Buffer(pair[0].write));
            assert_ne!(pair[0].horizontal, pair[1].horizontal);
        }
    }

    #[test]
    fn weights_sum_to_one() {
        let total = BLUR_WEIGHTS[0] + 2.0 * BLUR_WEIGHTS[1..].iter().sum::<f32>();
        assert!((total - 1.0).abs() < 1e-4);
    }

    #[test]
    fn uniforms_pack_weights_in_order() {
        let u = BlurUniforms::new([0.5, 0.0], true);
        assert_eq!(u.weights[0], [BLUR_WEIGHTS[0], BLUR_WEIGHTS[1], BLUR_WEIGHTS[2], BLUR_WEIGHTS[3]]);
        assert_eq!(u.weights[1][0], BLUR_WEIGHTS[4]);
        assert_eq!(u.tap_count, 5);
        assert_eq!(std::mem::size_of::<BlurUniforms>(), 48);
    }

    const SIZE: usize = 16;

    fn blur_reference(input: &[f32], horizontal: bool) -> Vec<f32> {
        let at = |x: isize, y: isize| {
            let x = x.clamp(0, SIZE as isize - 1) as usize;
            let y = y.clamp(0, SIZE as isize - 1) as usize;
            input[y * SIZE + x]
        };
        let mut out = vec![0.0; SIZE * SIZE];
        for y in 0..SIZE as isize {
            for x in 0..SIZE as isize {
                let mut v = at(x, y) * BLUR_WEIGHTS[0];
                for (i, w) in BLUR_WEIGHTS.iter().enumerate().skip(1) {
                    let i = i as isize;
                    let (dx, dy) = if horizontal { (i, 0) } else { (0, i) };
                    v += (at(x + dx, y + dy) + at(x - dx, y - dy)) * w;
                }
                out[y as usize * SIZE + x as usize] = v;
            }
        }
        out
    }

    fn max_horizontal_gradient(img: &[f32]) -> f32 {
        (0..SIZE)
            .flat_map(|y| (1..SIZE).map(move |x| (y, x)))
            .map(|(y, x)| (img[y * SIZE + x] - img[y * SIZE + x - 1]).abs())
            .fold(0.0, f32::max)
    }

    #[test]
    fn ping_pong_smooths_a_step_edge() {
        let input: Vec<f32> = (0..SIZE * SIZE).map(|i| if i % SIZE < SIZE / 2 { 0.0 } else { 1.0 }).collect();
        let input_gradient = max_horizontal_gradient(&input);
        for k in 1..6 {
            let mut buffers = [vec![0.0; SIZE * SIZE], vec![0.0; SIZE * SIZE]];
            for step in blur_steps(k) {
                let src = match step.read {
                    BlurSource::Input => input.clone(),
                    BlurSource::Buffer(i) => buffers[i].clone(),
                };
                buffers[step.write] = blur_reference(&src, step.horizontal);
            }
            let result = &buffers[final_buffer(k).unwrap()];
            assert!(max_horizontal_gradient(result) < input_gradient, "k={k}");
        }
    }
}
