//! Shadow subsystem: one directional light with soft variance shadows, and cubemap
//! shadows for point lights with a static cache plus per-refresh dynamic geometry.

pub mod cache;

pub use cache::{CacheState, PointShadowCache, PointShadowPlan};

use std::f32::consts::FRAC_PI_2;

use glam::{Mat4, Vec3};
use render_api::{Light, LightKind};

use crate::blur::{BlurPass, BlurTarget};
use crate::config::RendererConfig;
use crate::error::RendererError;
use crate::geometry::GeometryTable;
use crate::lights::{LightRegistry, MAX_POINT_SHADOW_MAPS};
use crate::pipeline::{color_attachment, depth_attachment, depth_state, logged_scope, model_bind_group, model_layout, uniform_entry, vertex_layout};
use crate::queue::GeometryRecord;

const SHADOW_SHADER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/shadow.wgsl"));

pub const SHADOW_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rg16Float;
const CLEAR_MOMENTS: wgpu::Color = wgpu::Color { r: 1.0, g: 1.0, b: 0.0, a: 1.0 };
/// Half extent of the directional light's orthographic box.
const DIRECTIONAL_EXTENT: f32 = 10.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CubeFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubeFace {
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    pub fn direction(self) -> Vec3 {
        match self {
            CubeFace::PositiveX => Vec3::X,
            CubeFace::NegativeX => Vec3::NEG_X,
            CubeFace::PositiveY => Vec3::Y,
            CubeFace::NegativeY => Vec3::NEG_Y,
            CubeFace::PositiveZ => Vec3::Z,
            CubeFace::NegativeZ => Vec3::NEG_Z,
        }
    }

    pub fn up(self) -> Vec3 {
        match self {
            CubeFace::PositiveY => Vec3::Z,
            CubeFace::NegativeY => Vec3::NEG_Z,
            _ => Vec3::NEG_Y,
        }
    }
}

/// 90° projection for rendering one cube face. Clip Y is flipped so that rendered rows match
/// cubemap sampling; front faces become clockwise.
pub fn cube_face_projection(near: f32, far: f32) -> Mat4 {
    Mat4::from_scale(Vec3::new(1.0, -1.0, 1.0)) * Mat4::perspective_rh(FRAC_PI_2, 1.0, near, far)
}

pub fn cube_face_view(position: Vec3, face: CubeFace) -> Mat4 {
    Mat4::look_at_rh(position, position + face.direction(), face.up())
}

/// View-projections for the six faces of a cubemap centered at `position`.
pub fn cube_face_view_projections(position: Vec3, near: f32, far: f32) -> [Mat4; 6] {
    let projection = cube_face_projection(near, far);
    CubeFace::ALL.map(|f| projection * cube_face_view(position, f))
}

pub fn directional_light_space(position: Vec3, direction: Vec3, near: f32, far: f32) -> Mat4 {
    let dir = direction.normalize_or(Vec3::NEG_Y);
    let up = if dir.cross(Vec3::Y).length_squared() < 1e-6 { Vec3::Z } else { Vec3::Y };
    let e = DIRECTIONAL_EXTENT;
    Mat4::orthographic_rh(-e, e, -e, e, near, far) * Mat4::look_at_rh(position, position + dir, up)
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct ShadowPassUniforms {
    view_proj: [[f32; 4]; 4],
    light_position: [f32; 3],
    far_plane: f32,
    mode: u32,
    _pad: [u32; 3],
}

const SHADOW_PASS_SIZE: u64 = std::mem::size_of::<ShadowPassUniforms>() as u64;

struct PassUniform {
    buf: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

pub struct ShadowSubsystem {
    directional_pipeline: wgpu::RenderPipeline,
    point_pipeline: wgpu::RenderPipeline,
    model_layout: wgpu::BindGroupLayout,
    directional_depth: wgpu::TextureView,
    directional_moments: wgpu::TextureView,
    directional_blur: BlurTarget,
    directional_pass: PassUniform,
    point_static: wgpu::Texture,
    point_combined: wgpu::Texture,
    point_cube_view: wgpu::TextureView,
    point_static_faces: Vec<wgpu::TextureView>,
    point_combined_faces: Vec<wgpu::TextureView>,
    point_face_depth: wgpu::TextureView,
    point_passes: Vec<PassUniform>,
    cache: PointShadowCache,
    point_resolution: u32,
    light_near: f32,
    light_far: f32,
    light_space: Mat4,
}

impl ShadowSubsystem {
    pub fn new(device: &wgpu::Device, config: &RendererConfig, blur: &BlurPass) -> Result<Self, RendererError> {
        logged_scope(device, "shadow render targets", || Self::create(device, config, blur))
    }

    fn create(device: &wgpu::Device, config: &RendererConfig, blur: &BlurPass) -> Result<Self, RendererError> {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("shadow_shader"),
            source: wgpu::ShaderSource::Wgsl(SHADOW_SHADER.into()),
        });
        let pass_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("shadow_pass_bind_group_layout"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX_FRAGMENT, SHADOW_PASS_SIZE)],
        });
        let model_layout = model_layout(device, "shadow_model_bind_group_layout");
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("shadow_pipeline_layout"),
            bind_group_layouts: &[&pass_layout, &model_layout],
            push_constant_ranges: &[],
        });
        let make_pipeline = |label: &str, front_face: wgpu::FrontFace, blend: Option<wgpu::BlendState>| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs"),
                    buffers: &[vertex_layout()],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs"),
                    targets: &[Some(wgpu::ColorTargetState { format: SHADOW_FORMAT, blend, write_mask: wgpu::ColorWrites::ALL })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState { front_face, cull_mode: Some(wgpu::Face::Front), ..Default::default() },
                depth_stencil: Some(depth_state(true)),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };
        let min = wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Min,
        };
        let directional_pipeline = make_pipeline("shadow_directional_pipeline", wgpu::FrontFace::Ccw, None);
        let point_pipeline =
            make_pipeline("shadow_point_pipeline", wgpu::FrontFace::Cw, Some(wgpu::BlendState { color: min, alpha: min }));

        let make_target = |label: &str, size: u32, layers: u32, format: wgpu::TextureFormat, usage: wgpu::TextureUsages| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d { width: size, height: size, depth_or_array_layers: layers },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage,
                view_formats: &[],
            })
        };
        let rt = wgpu::TextureUsages::RENDER_ATTACHMENT;
        let sampled = rt | wgpu::TextureUsages::TEXTURE_BINDING;
        let res = config.shadow_resolution;
        let directional_depth = make_target("shadow_directional_depth", res, 1, wgpu::TextureFormat::Depth32Float, rt)
            .create_view(&Default::default());
        let directional_moments =
            make_target("shadow_directional_moments", res, 1, SHADOW_FORMAT, sampled).create_view(&Default::default());
        let directional_blur = BlurTarget::new(
            device,
            blur,
            "shadow_directional_blur",
            SHADOW_FORMAT,
            (res, res),
            config.blur_iterations,
            &directional_moments,
            None,
        );

        let point_resolution = config.point_shadow_resolution;
        let layers = (MAX_POINT_SHADOW_MAPS * 6) as u32;
        let point_static = make_target("shadow_point_static", point_resolution, layers, SHADOW_FORMAT, rt | wgpu::TextureUsages::COPY_SRC);
        let point_combined =
            make_target("shadow_point_combined", point_resolution, layers, SHADOW_FORMAT, sampled | wgpu::TextureUsages::COPY_DST);
        let face_views = |texture: &wgpu::Texture| -> Vec<wgpu::TextureView> {
            (0..layers)
                .map(|layer| {
                    texture.create_view(&wgpu::TextureViewDescriptor {
                        label: Some("shadow_point_face"),
                        dimension: Some(wgpu::TextureViewDimension::D2),
                        base_array_layer: layer,
                        array_layer_count: Some(1),
                        ..Default::default()
                    })
                })
                .collect()
        };
        let point_static_faces = face_views(&point_static);
        let point_combined_faces = face_views(&point_combined);
        let point_cube_view = point_combined.create_view(&wgpu::TextureViewDescriptor {
            label: Some("shadow_point_cube_array"),
            dimension: Some(wgpu::TextureViewDimension::CubeArray),
            array_layer_count: Some(layers),
            ..Default::default()
        });
        let point_face_depth =
            make_target("shadow_point_face_depth", point_resolution, 1, wgpu::TextureFormat::Depth32Float, rt)
                .create_view(&Default::default());

        let make_pass = || {
            let buf = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("shadow_pass_uniform"),
                size: SHADOW_PASS_SIZE,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("shadow_pass_bind_group"),
                layout: &pass_layout,
                entries: &[wgpu::BindGroupEntry { binding: 0, resource: buf.as_entire_binding() }],
            });
            PassUniform { buf, bind_group }
        };
        let directional_pass = make_pass();
        let point_passes = (0..layers).map(|_| make_pass()).collect();
        log::debug!("shadow targets: directional {res}px, point {point_resolution}px x {layers} faces");

        Ok(Self {
            directional_pipeline,
            point_pipeline,
            model_layout,
            directional_depth,
            directional_moments,
            directional_blur,
            directional_pass,
            point_static,
            point_combined,
            point_cube_view,
            point_static_faces,
            point_combined_faces,
            point_face_depth,
            point_passes,
            cache: PointShadowCache::new(),
            point_resolution,
            light_near: config.light_near,
            light_far: config.light_far,
            light_space: Mat4::IDENTITY,
        })
    }

    /// Soft directional moments when blurring is on, raw moments otherwise.
    pub fn directional_view(&self) -> &wgpu::TextureView {
        self.directional_blur.result_view().unwrap_or(&self.directional_moments)
    }

    pub fn point_cube_view(&self) -> &wgpu::TextureView {
        &self.point_cube_view
    }

    pub fn light_space(&self) -> Mat4 {
        self.light_space
    }

    pub fn cache(&self) -> &PointShadowCache {
        &self.cache
    }

    /// Render every record into the directional moments target, then soften it.
    #[allow(clippy::too_many_arguments)]
    pub fn encode_directional(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        blur: &BlurPass,
        table: &GeometryTable,
        records: &[GeometryRecord],
        light: Option<&Light>,
    ) -> Result<(), RendererError> {
        let Some(light) = light else { return Ok(()) };
        let LightKind::Directional { direction } = light.kind else { return Ok(()) };
        self.light_space = directional_light_space(light.position, direction, self.light_near, self.light_far);
        let uniforms = ShadowPassUniforms {
            view_proj: self.light_space.to_cols_array_2d(),
            light_position: light.position.to_array(),
            far_plane: self.light_far,
            mode: 0,
            _pad: [0; 3],
        };
        queue.write_buffer(&self.directional_pass.buf, 0, bytemuck::bytes_of(&uniforms));
        {
            let mut rp = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("shadow_directional_pass"),
                color_attachments: &[color_attachment(&self.directional_moments, wgpu::LoadOp::Clear(CLEAR_MOMENTS))],
                depth_stencil_attachment: depth_attachment(&self.directional_depth),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            rp.set_pipeline(&self.directional_pipeline);
            rp.set_bind_group(0, &self.directional_pass.bind_group, &[]);
            draw_records(&mut rp, device, &self.model_layout, table, records, 0..records.len());
        }
        blur.encode(encoder, &self.directional_blur)
    }

    /// Refresh every registered point light. Cold slots first bake their static contribution.
    #[allow(clippy::too_many_arguments)]
    pub fn encode_points(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        table: &GeometryTable,
        records: &[GeometryRecord],
        lights: &LightRegistry,
    ) -> Vec<PointShadowPlan> {
        let mut plans = Vec::new();
        for (slot, light) in lights.point_lights().enumerate().take(MAX_POINT_SHADOW_MAPS) {
            let plan = self.cache.plan(slot, records);
            let faces = cube_face_view_projections(light.position, self.light_near, self.light_far);
            for (face, view_proj) in faces.iter().enumerate() {
                let uniforms = ShadowPassUniforms {
                    view_proj: view_proj.to_cols_array_2d(),
                    light_position: light.position.to_array(),
                    far_plane: self.light_far,
                    mode: 1,
                    _pad: [0; 3],
                };
                queue.write_buffer(&self.point_passes[slot * 6 + face].buf, 0, bytemuck::bytes_of(&uniforms));
            }
            if self.cache.state(slot) == Some(CacheState::Cold) {
                log::debug!("baking static point shadows for '{}' ({} records)", light.name, plan.static_records.len());
                self.encode_point_faces(encoder, device, table, records, slot, &plan.static_records, true);
            }
            let origin = wgpu::Origin3d { x: 0, y: 0, z: (slot * 6) as u32 };
            encoder.copy_texture_to_texture(
                wgpu::ImageCopyTexture { texture: &self.point_static, mip_level: 0, origin, aspect: wgpu::TextureAspect::All },
                wgpu::ImageCopyTexture { texture: &self.point_combined, mip_level: 0, origin, aspect: wgpu::TextureAspect::All },
                wgpu::Extent3d { width: self.point_resolution, height: self.point_resolution, depth_or_array_layers: 6 },
            );
            self.encode_point_faces(encoder, device, table, records, slot, &plan.dynamic_records, false);
            self.cache.commit(&plan);
            plans.push(plan);
        }
        plans
    }

    #[allow(clippy::too_many_arguments)]
    fn encode_point_faces(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        device: &wgpu::Device,
        table: &GeometryTable,
        records: &[GeometryRecord],
        slot: usize,
        indices: &[usize],
        into_static: bool,
    ) {
        for face in 0..6 {
            let layer = slot * 6 + face;
            let (target, load) = if into_static {
                (&self.point_static_faces[layer], wgpu::LoadOp::Clear(CLEAR_MOMENTS))
            } else {
                (&self.point_combined_faces[layer], wgpu::LoadOp::Load)
            };
            let mut rp = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("shadow_point_face_pass"),
                color_attachments: &[color_attachment(target, load)],
                depth_stencil_attachment: depth_attachment(&self.point_face_depth),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            rp.set_pipeline(&self.point_pipeline);
            rp.set_bind_group(0, &self.point_passes[layer].bind_group, &[]);
            draw_records(&mut rp, device, &self.model_layout, table, records, indices.iter().copied());
        }
    }
}

/// Draw the selected records with one model bind group each. Stale mesh handles are skipped.
pub(crate) fn draw_records(
    rp: &mut wgpu::RenderPass<'_>,
    device: &wgpu::Device,
    model_layout: &wgpu::BindGroupLayout,
    table: &GeometryTable,
    records: &[GeometryRecord],
    indices: impl IntoIterator<Item = usize>,
) {
    for i in indices {
        let Some(record) = records.get(i) else { continue };
        let Some(mesh) = table.mesh(record.mesh) else {
            log::warn!("skipping '{}': mesh handle no longer valid", record.name);
            continue;
        };
        let bind_group = model_bind_group(device, model_layout, &record.model);
        rp.set_bind_group(1, &bind_group, &[]);
        rp.set_vertex_buffer(0, mesh.vertex_buf.slice(..));
        rp.set_index_buffer(mesh.index_buf.slice(..), wgpu::IndexFormat::Uint32);
        rp.draw_indexed(0..record.index_count.min(mesh.index_count), 0, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4Swizzles;

    /// Direction that cubemap sampling maps to texel (u, v) of `face`, v growing downward.
    fn sampled_direction(face: CubeFace, u: f32, v: f32) -> Vec3 {
        let (sc, tc) = (2.0 * u - 1.0, 2.0 * v - 1.0);
        match face {
            CubeFace::PositiveX => Vec3::new(1.0, -tc, -sc),
            CubeFace::NegativeX => Vec3::new(-1.0, -tc, sc),
            CubeFace::PositiveY => Vec3::new(sc, 1.0, tc),
            CubeFace::NegativeY => Vec3::new(sc, -1.0, -tc),
            CubeFace::PositiveZ => Vec3::new(sc, -tc, 1.0),
            CubeFace::NegativeZ => Vec3::new(-sc, -tc, -1.0),
        }
    }

    #[test]
    fn face_projections_match_cube_sampling() {
        let center = Vec3::new(1.0, 2.0, -3.0);
        let matrices = cube_face_view_projections(center, 0.1, 50.0);
        for (face, m) in CubeFace::ALL.iter().zip(matrices.iter()) {
            for (u, v) in [(0.25, 0.25), (0.8, 0.3), (0.5, 0.9)] {
                let world = center + sampled_direction(*face, u, v) * 3.0;
                let clip = *m * world.extend(1.0);
                let ndc = clip.xyz() / clip.w;
                let (pu, pv) = ((ndc.x + 1.0) * 0.5, (1.0 - ndc.y) * 0.5);
                assert!((pu - u).abs() < 1e-4 && (pv - v).abs() < 1e-4, "{face:?} ({u},{v}) -> ({pu},{pv})");
                assert!((0.0..=1.0).contains(&ndc.z));
            }
        }
    }

    #[test]
    fn directional_space_contains_scene_origin() {
        let m = directional_light_space(Vec3::new(0.0, 20.0, 0.0), Vec3::NEG_Y, 0.01, 100.0);
        let p = m * Vec3::ZERO.extend(1.0);
        assert!(p.x.abs() < 1e-5 && p.y.abs() < 1e-5);
        assert!(p.z > 0.0 && p.z < 1.0);
        let outside = m * Vec3::new(15.0, 0.0, 0.0).extend(1.0);
        assert!(outside.x.abs() > 1.0 || outside.y.abs() > 1.0);
    }

    #[test]
    fn pass_uniform_size_matches_shader() {
        assert_eq!(SHADOW_PASS_SIZE, 96);
    }
}
