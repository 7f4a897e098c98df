//! Forward pass: per-record programs writing color and bright pass directly.
//!
//! A forward program is host WGSL compiled after the shared prelude (scene bindings, lighting,
//! material slots, `surface_vertex`, `shade_forward`). It must define `vs` and `fs`, with `fs`
//! returning `ForwardOut`.

use wgpu::CommandEncoder;

use crate::error::RendererError;
use crate::gbuffer::SURFACE_WGSL;
use crate::geometry::{ForwardProgram, GeometryTable};
use crate::material::MaterialBindings;
use crate::pipeline::{color_attachment, depth_attachment, depth_state, model_bind_group, model_layout, shader_module, vertex_layout, COMMON_WGSL};
use crate::queue::GeometryRecord;
use crate::resources::{FrameResources, HDR_FORMAT};
use crate::scene::SceneBindings;

pub(crate) const FORWARD_PRELUDE: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/forward_prelude.wgsl"));
const DEFAULT_PROGRAM: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/forward.wgsl"));

pub struct ForwardPass {
    pipeline_layout: wgpu::PipelineLayout,
    model_layout: wgpu::BindGroupLayout,
    default_program: ForwardProgram,
}

impl ForwardPass {
    pub fn new(device: &wgpu::Device, scene: &SceneBindings, materials: &MaterialBindings) -> Result<Self, RendererError> {
        let model_layout = model_layout(device, "forward_model_bind_group_layout");
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("forward_pipeline_layout"),
            bind_group_layouts: &[scene.layout(), &model_layout, materials.layout()],
            push_constant_ranges: &[],
        });
        let pipeline = build_pipeline(device, &pipeline_layout, "forward_default", DEFAULT_PROGRAM);
        let default_program = ForwardProgram { label: "forward_default".to_string(), pipeline };
        Ok(Self { pipeline_layout, model_layout, default_program })
    }

    /// Compile host WGSL into a program. Shader or pipeline validation errors are returned.
    pub fn create_program(&self, device: &wgpu::Device, label: &str, wgsl: &str) -> Result<ForwardProgram, RendererError> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = build_pipeline(device, &self.pipeline_layout, label, wgsl);
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            log::error!("forward program '{label}' rejected: {err}");
            return Err(RendererError::Program(label.to_string(), err.to_string()));
        }
        log::debug!("forward program '{label}' built");
        Ok(ForwardProgram { label: label.to_string(), pipeline })
    }

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
        background: [f32; 4],
    ) {
        let [r, g, b, a] = background.map(f64::from);
        let mut rp = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("forward_pass"),
            color_attachments: &[
                color_attachment(&frame.color, wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a })),
                color_attachment(&frame.bright, wgpu::LoadOp::Clear(wgpu::Color::BLACK)),
            ],
            depth_stencil_attachment: depth_attachment(&frame.depth),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        rp.set_viewport(0.0, 0.0, frame.width() as f32, frame.height() as f32, 0.0, 1.0);
        rp.set_bind_group(0, scene, &[]);
        for record in records.iter().filter(|r| r.is_visible) {
            let Some(mesh) = table.mesh(record.mesh) else {
                log::warn!("skipping '{}': mesh handle no longer valid", record.name);
                continue;
            };
            let program = match record.program {
                Some(handle) => table.program(handle).unwrap_or_else(|| {
                    log::warn!("'{}': forward program handle no longer valid, using the default", record.name);
                    &self.default_program
                }),
                None => &self.default_program,
            };
            let model = model_bind_group(device, &self.model_layout, &record.model);
            let material = materials.bind_group(device, table, record);
            rp.set_pipeline(&program.pipeline);
            rp.set_bind_group(1, &model, &[]);
            rp.set_bind_group(2, &material, &[]);
            rp.set_vertex_buffer(0, mesh.vertex_buf.slice(..));
            rp.set_index_buffer(mesh.index_buf.slice(..), wgpu::IndexFormat::Uint32);
            rp.draw_indexed(0..record.index_count.min(mesh.index_count), 0, 0..1);
        }
    }
}

fn build_pipeline(device: &wgpu::Device, layout: &wgpu::PipelineLayout, label: &str, program: &str) -> wgpu::RenderPipeline {
    let shader = shader_module(device, label, &[COMMON_WGSL, SURFACE_WGSL, FORWARD_PRELUDE, program]);
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs"),
            buffers: &[vertex_layout()],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs"),
            targets: &[Some(HDR_FORMAT.into()), Some(HDR_FORMAT.into())],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState { cull_mode: Some(wgpu::Face::Back), ..Default::default() },
        depth_stencil: Some(depth_state(true)),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
