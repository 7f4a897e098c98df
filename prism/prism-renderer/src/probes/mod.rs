//! Light-probe bake for image-based lighting. Static geometry is captured into a temporary cubemap
//! per probe, then convolved into the irradiance and prefiltered cubemap arrays that the lighting
//! pass samples for the rest of the run.

pub mod grid;

pub use grid::{slice_index, ProbeGrid, FACES_PER_PROBE};

use glam::Vec3;
use render_api::CameraMatrices;
use wgpu::util::DeviceExt;

use crate::brdf::{brdf_lut, BRDF_LUT_SIZE, BRDF_SAMPLES};
use crate::config::RendererConfig;
use crate::error::RendererError;
use crate::forward::FORWARD_PRELUDE;
use crate::gbuffer::SURFACE_WGSL;
use crate::geometry::GeometryTable;
use crate::lights::LightRegistry;
use crate::material::MaterialBindings;
use crate::pipeline::{
    color_attachment, depth_attachment, depth_state, fullscreen_pipeline, linear_sampler, logged_scope, model_bind_group, model_layout, sampler_entry,
    shader_module, storage_entry, texture_entry, uniform_buffer, uniform_entry, vertex_layout, COMMON_WGSL,
};
use crate::queue::GeometryRecord;
use crate::resources::HDR_FORMAT;
use crate::scene::SceneBindings;
use crate::shadows::{cube_face_projection, cube_face_view, CubeFace, ShadowSubsystem};
use crate::uniforms::SceneUniforms;

const FULLSCREEN_SHADER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/fullscreen.wgsl"));
const CAPTURE_SHADER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/probe_capture.wgsl"));
const CONVOLVE_SHADER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/convolve.wgsl"));

/// Roughness encoded by each prefilter mip.
pub fn mip_roughness(mip: u32, mip_levels: u32) -> f32 {
    if mip_levels <= 1 {
        return 0.0;
    }
    mip as f32 / (mip_levels - 1) as f32
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct ConvolveUniforms {
    face: u32,
    roughness: f32,
    source_resolution: f32,
    _pad: u32,
}

/// Counts from one completed bake.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BakeReport {
    pub probes: usize,
    pub irradiance_slices: u32,
    pub prefilter_passes: u32,
}

pub struct ProbeBaker {
    grid: Option<ProbeGrid>,
    capture_pipeline: wgpu::RenderPipeline,
    irradiance_pipeline: wgpu::RenderPipeline,
    prefilter_pipeline: wgpu::RenderPipeline,
    model_layout: wgpu::BindGroupLayout,
    convolve_layout: wgpu::BindGroupLayout,
    ibl_layout: wgpu::BindGroupLayout,
    capture_sampler: wgpu::Sampler,
    ibl_sampler: wgpu::Sampler,
    irradiance: wgpu::Texture,
    prefilter: wgpu::Texture,
    irradiance_view: wgpu::TextureView,
    prefilter_view: wgpu::TextureView,
    brdf_view: wgpu::TextureView,
    positions: wgpu::Buffer,
    baked_probes: u32,
    capture_resolution: u32,
    irradiance_resolution: u32,
    prefilter_resolution: u32,
    prefilter_mips: u32,
}

impl ProbeBaker {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        config: &RendererConfig,
        scene: &SceneBindings,
        materials: &MaterialBindings,
    ) -> Result<Self, RendererError> {
        let grid = config.probes.as_ref().filter(|_| config.bakes_probes()).map(ProbeGrid::new);
        if let Some(grid) = &grid {
            let max_layers = device.limits().max_texture_array_layers;
            if grid.layer_count() > max_layers {
                return Err(RendererError::InvalidConfig(format!(
                    "{} probes need {} cubemap layers, device allows {max_layers}",
                    grid.len(),
                    grid.layer_count()
                )));
            }
        }
        logged_scope(device, "probe bake targets", || Ok(Self::create(device, queue, config, scene, materials, grid)))
    }

    fn create(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        config: &RendererConfig,
        scene: &SceneBindings,
        materials: &MaterialBindings,
        grid: Option<ProbeGrid>,
    ) -> Self {
        let model_layout = model_layout(device, "probe_model_bind_group_layout");
        let capture_shader = shader_module(device, "probe_capture_shader", &[COMMON_WGSL, SURFACE_WGSL, FORWARD_PRELUDE, CAPTURE_SHADER]);
        let capture_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("probe_capture_pipeline_layout"),
            bind_group_layouts: &[scene.layout(), &model_layout, materials.layout()],
            push_constant_ranges: &[],
        });
        let capture_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("probe_capture_pipeline"),
            layout: Some(&capture_layout),
            vertex: wgpu::VertexState {
                module: &capture_shader,
                entry_point: Some("vs"),
                buffers: &[vertex_layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &capture_shader,
                entry_point: Some("fs"),
                targets: &[Some(HDR_FORMAT.into())],
                compilation_options: Default::default(),
            }),
            // Cube face projections flip Y, which flips winding.
            primitive: wgpu::PrimitiveState { front_face: wgpu::FrontFace::Cw, cull_mode: Some(wgpu::Face::Back), ..Default::default() },
            depth_stencil: Some(depth_state(true)),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let convolve_shader = shader_module(device, "probe_convolve_shader", &[FULLSCREEN_SHADER, CONVOLVE_SHADER]);
        let convolve_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("probe_convolve_bind_group_layout"),
            entries: &[
                texture_entry(0, wgpu::TextureViewDimension::Cube),
                sampler_entry(1),
                uniform_entry(2, wgpu::ShaderStages::FRAGMENT, std::mem::size_of::<ConvolveUniforms>() as u64),
            ],
        });
        let convolve_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("probe_convolve_pipeline_layout"),
            bind_group_layouts: &[&convolve_layout],
            push_constant_ranges: &[],
        });
        let irradiance_pipeline =
            fullscreen_pipeline(device, "probe_irradiance_pipeline", &convolve_pipeline_layout, &convolve_shader, "fs_irradiance", &[Some(HDR_FORMAT.into())]);
        let prefilter_pipeline =
            fullscreen_pipeline(device, "probe_prefilter_pipeline", &convolve_pipeline_layout, &convolve_shader, "fs_prefilter", &[Some(HDR_FORMAT.into())]);

        // Without a grid the arrays shrink to one 1px probe so the lighting layout stays valid.
        let (layers, irradiance_resolution, prefilter_resolution, prefilter_mips) = match &grid {
            Some(g) => (g.layer_count(), config.irradiance_resolution, config.prefilter_resolution, config.prefilter_mip_levels),
            None => (FACES_PER_PROBE, 1, 1, 1),
        };
        let make_array = |label: &str, size: u32, mips: u32| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d { width: size, height: size, depth_or_array_layers: layers },
                mip_level_count: mips,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: HDR_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
        };
        let irradiance = make_array("probe_irradiance", irradiance_resolution, 1);
        let prefilter = make_array("probe_prefilter", prefilter_resolution, prefilter_mips);
        let cube_array = |t: &wgpu::Texture| {
            t.create_view(&wgpu::TextureViewDescriptor {
                label: Some("probe_cube_array"),
                dimension: Some(wgpu::TextureViewDimension::CubeArray),
                array_layer_count: Some(layers),
                ..Default::default()
            })
        };
        let irradiance_view = cube_array(&irradiance);
        let prefilter_view = cube_array(&prefilter);

        let brdf_size = wgpu::Extent3d { width: BRDF_LUT_SIZE, height: BRDF_LUT_SIZE, depth_or_array_layers: 1 };
        let brdf_texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some("brdf_lut"),
                size: brdf_size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &brdf_lut(BRDF_LUT_SIZE, BRDF_SAMPLES),
        );

        let mut positions: Vec<[f32; 4]> =
            grid.as_ref().map(|g| g.positions().iter().map(|p| p.extend(1.0).to_array()).collect()).unwrap_or_default();
        if positions.is_empty() {
            positions.push([0.0; 4]);
        }
        let positions = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("probe_positions"),
            contents: bytemuck::cast_slice(&positions),
            usage: wgpu::BufferUsages::STORAGE,
        });

        let ibl_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ibl_bind_group_layout"),
            entries: &[
                texture_entry(0, wgpu::TextureViewDimension::CubeArray),
                texture_entry(1, wgpu::TextureViewDimension::CubeArray),
                texture_entry(2, wgpu::TextureViewDimension::D2),
                sampler_entry(3),
                storage_entry(4, wgpu::ShaderStages::FRAGMENT),
            ],
        });
        if let Some(g) = &grid {
            log::debug!("probe grid {:?}: {} probes, {} layers", g.counts, g.len(), g.layer_count());
        }
        Self {
            grid,
            capture_pipeline,
            irradiance_pipeline,
            prefilter_pipeline,
            model_layout,
            convolve_layout,
            ibl_layout,
            capture_sampler: linear_sampler(device, "probe_capture_sampler", wgpu::AddressMode::ClampToEdge),
            ibl_sampler: linear_sampler(device, "ibl_sampler", wgpu::AddressMode::ClampToEdge),
            irradiance,
            prefilter,
            irradiance_view,
            prefilter_view,
            brdf_view: brdf_texture.create_view(&Default::default()),
            positions,
            baked_probes: 0,
            capture_resolution: config.probe_capture_resolution,
            irradiance_resolution,
            prefilter_resolution,
            prefilter_mips,
        }
    }

    pub fn grid(&self) -> Option<&ProbeGrid> {
        self.grid.as_ref()
    }

    /// Probes the lighting pass may sample; zero until the bake has run.
    pub fn baked_probes(&self) -> u32 {
        self.baked_probes
    }

    pub fn ibl_layout(&self) -> &wgpu::BindGroupLayout {
        &self.ibl_layout
    }

    pub fn ibl_bind_group(&self, device: &wgpu::Device) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ibl_bind_group"),
            layout: &self.ibl_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(&self.irradiance_view) },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(&self.prefilter_view) },
                wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::TextureView(&self.brdf_view) },
                wgpu::BindGroupEntry { binding: 3, resource: wgpu::BindingResource::Sampler(&self.ibl_sampler) },
                wgpu::BindGroupEntry { binding: 4, resource: self.positions.as_entire_binding() },
            ],
        })
    }

    /// Capture and convolve every probe. Each probe is submitted on its own and its capture
    /// cubemap is released before the next one is created.
    #[allow(clippy::too_many_arguments)]
    pub fn bake(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        config: &RendererConfig,
        lights: &LightRegistry,
        scene: &SceneBindings,
        shadows: &ShadowSubsystem,
        materials: &MaterialBindings,
        table: &GeometryTable,
        records: &[GeometryRecord],
    ) -> Result<BakeReport, RendererError> {
        let Some(grid) = self.grid.clone() else {
            return Err(RendererError::InvalidConfig("probe bake requested without a probe volume".to_string()));
        };
        let static_records: Vec<&GeometryRecord> = records.iter().filter(|r| !r.is_dynamic).collect();
        log::info!("baking {} light probes from {} static records", grid.len(), static_records.len());
        let mut report = BakeReport { probes: 0, irradiance_slices: 0, prefilter_passes: 0 };
        for (probe, position) in grid.positions().into_iter().enumerate() {
            logged_scope(device, "probe capture", || {
                let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("probe_bake") });
                let capture = self.capture(&mut encoder, device, config, lights, scene, shadows, materials, table, &static_records, position);
                let capture_view = capture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some("probe_capture_cube"),
                    dimension: Some(wgpu::TextureViewDimension::Cube),
                    ..Default::default()
                });
                report.irradiance_slices += self.convolve_irradiance(&mut encoder, device, &capture_view, probe);
                report.prefilter_passes += self.convolve_prefilter(&mut encoder, device, &capture_view, probe);
                queue.submit(Some(encoder.finish()));
                capture.destroy();
            });
            report.probes += 1;
            log::debug!("probe {probe} baked at {position}");
        }
        self.baked_probes = grid.len() as u32;
        log::info!(
            "light probe bake finished: {} probes, {} irradiance slices, {} prefilter passes",
            report.probes,
            report.irradiance_slices,
            report.prefilter_passes
        );
        Ok(report)
    }

    /// Render the static records into a fresh capture cubemap centered at `position`.
    #[allow(clippy::too_many_arguments)]
    fn capture(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        device: &wgpu::Device,
        config: &RendererConfig,
        lights: &LightRegistry,
        scene: &SceneBindings,
        shadows: &ShadowSubsystem,
        materials: &MaterialBindings,
        table: &GeometryTable,
        records: &[&GeometryRecord],
        position: Vec3,
    ) -> wgpu::Texture {
        let res = self.capture_resolution;
        let make = |label: &str, format: wgpu::TextureFormat, layers: u32| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d { width: res, height: res, depth_or_array_layers: layers },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
        };
        let capture = make("probe_capture", HDR_FORMAT, FACES_PER_PROBE);
        let depth = make("probe_capture_depth", wgpu::TextureFormat::Depth32Float, 1).create_view(&Default::default());
        let [r, g, b, a] = config.background.map(f64::from);
        let projection = cube_face_projection(config.light_near, config.light_far);
        for face in CubeFace::ALL {
            let camera = CameraMatrices { view: cube_face_view(position, face), projection, position, front: face.direction() };
            let uniforms = SceneUniforms::new(&camera, config, lights, shadows.light_space(), 0, (res, res));
            let buf = uniform_buffer(device, "probe_capture_scene", &uniforms);
            let scene_group = scene.bind_group(device, &buf, shadows.directional_view(), shadows.point_cube_view());
            let face_view = capture.create_view(&wgpu::TextureViewDescriptor {
                label: Some("probe_capture_face"),
                dimension: Some(wgpu::TextureViewDimension::D2),
                base_array_layer: face as u32,
                array_layer_count: Some(1),
                ..Default::default()
            });
            let mut rp = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("probe_capture_pass"),
                color_attachments: &[color_attachment(&face_view, wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }))],
                depth_stencil_attachment: depth_attachment(&depth),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            rp.set_pipeline(&self.capture_pipeline);
            rp.set_bind_group(0, &scene_group, &[]);
            for record in records {
                let Some(mesh) = table.mesh(record.mesh) else { continue };
                let model = model_bind_group(device, &self.model_layout, &record.model);
                let material = materials.bind_group(device, table, record);
                rp.set_bind_group(1, &model, &[]);
                rp.set_bind_group(2, &material, &[]);
                rp.set_vertex_buffer(0, mesh.vertex_buf.slice(..));
                rp.set_index_buffer(mesh.index_buf.slice(..), wgpu::IndexFormat::Uint32);
                rp.draw_indexed(0..record.index_count.min(mesh.index_count), 0, 0..1);
            }
        }
        capture
    }

    fn convolve_bind_group(&self, device: &wgpu::Device, source: &wgpu::TextureView, uniforms: &ConvolveUniforms) -> wgpu::BindGroup {
        let buf = uniform_buffer(device, "probe_convolve_uniform", uniforms);
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("probe_convolve_bind_group"),
            layout: &self.convolve_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(source) },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(&self.capture_sampler) },
                wgpu::BindGroupEntry { binding: 2, resource: buf.as_entire_binding() },
            ],
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn convolve_into(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        device: &wgpu::Device,
        pipeline: &wgpu::RenderPipeline,
        source: &wgpu::TextureView,
        target: &wgpu::Texture,
        layer: u32,
        mip: u32,
        uniforms: ConvolveUniforms,
    ) {
        let view = target.create_view(&wgpu::TextureViewDescriptor {
            label: Some("probe_convolve_target"),
            dimension: Some(wgpu::TextureViewDimension::D2),
            base_mip_level: mip,
            mip_level_count: Some(1),
            base_array_layer: layer,
            array_layer_count: Some(1),
            ..Default::default()
        });
        let bind_group = self.convolve_bind_group(device, source, &uniforms);
        let mut rp = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("probe_convolve_pass"),
            color_attachments: &[color_attachment(&view, wgpu::LoadOp::Clear(wgpu::Color::BLACK))],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        rp.set_pipeline(pipeline);
        rp.set_bind_group(0, &bind_group, &[]);
        rp.draw(0..3, 0..1);
    }

    fn convolve_irradiance(&self, encoder: &mut wgpu::CommandEncoder, device: &wgpu::Device, source: &wgpu::TextureView, probe: usize) -> u32 {
        for face in 0..FACES_PER_PROBE as usize {
            let uniforms = ConvolveUniforms {
                face: face as u32,
                roughness: 0.0,
                source_resolution: self.capture_resolution as f32,
                _pad: 0,
            };
            self.convolve_into(encoder, device, &self.irradiance_pipeline, source, &self.irradiance, slice_index(probe, face), 0, uniforms);
        }
        log::trace!("probe {probe}: irradiance {}px", self.irradiance_resolution);
        FACES_PER_PROBE
    }

    fn convolve_prefilter(&self, encoder: &mut wgpu::CommandEncoder, device: &wgpu::Device, source: &wgpu::TextureView, probe: usize) -> u32 {
        for mip in 0..self.prefilter_mips {
            for face in 0..FACES_PER_PROBE as usize {
                let uniforms = ConvolveUniforms {
                    face: face as u32,
                    roughness: mip_roughness(mip, self.prefilter_mips),
                    source_resolution: self.capture_resolution as f32,
                    _pad: 0,
                };
                self.convolve_into(encoder, device, &self.prefilter_pipeline, source, &self.prefilter, slice_index(probe, face), mip, uniforms);
            }
        }
        log::trace!("probe {probe}: prefilter {}px, {} mips", self.prefilter_resolution, self.prefilter_mips);
        self.prefilter_mips * FACES_PER_PROBE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roughness_spans_mip_chain() {
        assert_eq!(mip_roughness(0, 5), 0.0);
        assert_eq!(mip_roughness(2, 5), 0.5);
        assert_eq!(mip_roughness(4, 5), 1.0);
        assert_eq!(mip_roughness(0, 1), 0.0);
    }

    #[test]
    fn convolve_uniforms_are_one_vec4() {
        assert_eq!(std::mem::size_of::<ConvolveUniforms>(), 16);
    }
}
