//! G-buffer pass: fill four color targets + depth from the visible records.

use wgpu::CommandEncoder;

use crate::error::RendererError;
use crate::geometry::GeometryTable;
use crate::material::MaterialBindings;
use crate::pipeline::{color_attachment, depth_attachment, depth_state, model_bind_group, model_layout, shader_module, vertex_layout, COMMON_WGSL};
use crate::queue::GeometryRecord;
use crate::resources::{FrameResources, ALBEDO_FORMAT, MATERIAL_FORMAT, NORMAL_FORMAT, POSITION_FORMAT};
use crate::scene::SceneBindings;

pub(crate) const SURFACE_WGSL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/surface.wgsl"));
const GBUFFER_SHADER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/gbuffer.wgsl"));

pub struct GBufferPass {
    pipeline: wgpu::RenderPipeline,
    model_layout: wgpu::BindGroupLayout,
}

impl GBufferPass {
    pub fn new(device: &wgpu::Device, scene: &SceneBindings, materials: &MaterialBindings) -> Result<Self, RendererError> {
        let shader = shader_module(device, "gbuffer_shader", &[COMMON_WGSL, SURFACE_WGSL, GBUFFER_SHADER]);
        let model_layout = model_layout(device, "gbuffer_model_bind_group_layout");
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("gbuffer_pipeline_layout"),
            bind_group_layouts: &[scene.layout(), &model_layout, materials.layout()],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("gbuffer_pipeline"),
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
                targets: &[
                    Some(ALBEDO_FORMAT.into()),
                    Some(NORMAL_FORMAT.into()),
                    Some(POSITION_FORMAT.into()),
                    Some(MATERIAL_FORMAT.into()),
                ],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState { cull_mode: Some(wgpu::Face::Back), ..Default::default() },
            depth_stencil: Some(depth_state(true)),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        Ok(Self { pipeline, model_layout })
    }

    /// Draw every visible record; records whose mesh handle went stale are skipped.
    #[allow(clippy::too_many_arguments)]
    pub fn encode(
        &self,
        encoder: &mut CommandEncoder,
        device: &wgpu::Device,
        frame: &FrameResources,
        scene: &wgpu::BindGroup,
        materials: &MaterialBindings,
        table: &GeometryTable,
        records: &[GeometryRecord],
    ) {
        let clear = wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT);
        let mut rp = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("gbuffer_pass"),
            color_attachments: &[
                color_attachment(&frame.albedo, clear),
                color_attachment(&frame.normal, clear),
                color_attachment(&frame.position, clear),
                color_attachment(&frame.material, clear),
            ],
            depth_stencil_attachment: depth_attachment(&frame.depth),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        rp.set_pipeline(&self.pipeline);
        rp.set_viewport(0.0, 0.0, frame.width() as f32, frame.height() as f32, 0.0, 1.0);
        rp.set_bind_group(0, scene, &[]);
        let mut drawn = 0;
        for record in records.iter().filter(|r| r.is_visible) {
            let Some(mesh) = table.mesh(record.mesh) else {
                log::warn!("skipping '{}': mesh handle no longer valid", record.name);
                continue;
            };
            let model = model_bind_group(device, &self.model_layout, &record.model);
            let material = materials.bind_group(device, table, record);
            rp.set_bind_group(1, &model, &[]);
            rp.set_bind_group(2, &material, &[]);
            rp.set_vertex_buffer(0, mesh.vertex_buf.slice(..));
            rp.set_index_buffer(mesh.index_buf.slice(..), wgpu::IndexFormat::Uint32);
            rp.draw_indexed(0..record.index_count.min(mesh.index_count), 0, 0..1);
            drawn += 1;
        }
        log::trace!("gbuffer: {drawn}/{} records drawn", records.len());
    }
}
