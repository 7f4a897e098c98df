//! Prism renderer: wgpu frame renderer with a culled and sorted draw queue, cached shadows,
//! deferred or forward shading, SSAO, bloom and a one-shot light-probe bake.

pub mod blur;
pub mod brdf;
pub mod config;
pub mod culling;
pub mod error;
pub mod forward;
pub mod gbuffer;
pub mod geometry;
pub mod light_pass;
pub mod lights;
pub mod material;
pub mod pipeline;
pub mod present;
pub mod probes;
pub mod queue;
pub mod resources;
pub mod scene;
pub mod schedule;
pub mod shadows;
pub mod sorting;
pub mod ssao;
pub mod uniforms;

#[cfg(test)]
mod test_log;

use std::sync::atomic::{AtomicBool, Ordering};

use render_api::{CameraMatrices, Light};

pub use blur::{BlurPass, BlurTarget};
pub use config::{BloomOptions, DebugView, LightingModel, PipelineMode, ProbeVolume, RendererConfig, SsaoOptions, ToneMapping};
pub use error::{GeometryError, LightError, RendererError, SubmitError};
pub use forward::ForwardPass;
pub use gbuffer::GBufferPass;
pub use geometry::{ForwardProgram, GeometryTable, MeshHandle, ProgramHandle, TextureHandle};
pub use light_pass::LightPass;
pub use lights::{LightId, LightRegistry, MAX_POINT_SHADOW_MAPS, MAX_SPOT_LIGHTS};
pub use present::PresentPass;
pub use probes::{BakeReport, ProbeBaker, ProbeGrid};
pub use queue::{DrawQueue, GeometryRecord};
pub use resources::FrameResources;
pub use schedule::{FramePlan, FrameSchedule, RendererState};
pub use shadows::{CacheState, ShadowSubsystem};
pub use ssao::SsaoPass;

use material::MaterialBindings;
use scene::SceneBindings;
use uniforms::SceneUniforms;

static RENDERER_LIVE: AtomicBool = AtomicBool::new(false);

/// Process-wide claim on the single renderer slot, released on drop.
struct InstanceGuard;

impl InstanceGuard {
    fn acquire() -> Result<Self, RendererError> {
        if RENDERER_LIVE.swap(true, Ordering::AcqRel) {
            log::error!("refusing to configure a second renderer");
            return Err(RendererError::AlreadyConfigured);
        }
        Ok(Self)
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        RENDERER_LIVE.store(false, Ordering::Release);
    }
}

pub struct Renderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: RendererConfig,
    schedule: FrameSchedule,
    camera: CameraMatrices,
    draw_queue: DrawQueue,
    lights: LightRegistry,
    post_effects: bool,
    materials: MaterialBindings,
    scene: SceneBindings,
    scene_buf: wgpu::Buffer,
    scene_bind_group: wgpu::BindGroup,
    blur: BlurPass,
    shadows: ShadowSubsystem,
    frame: FrameResources,
    gbuffer_pass: GBufferPass,
    forward_pass: ForwardPass,
    ssao_pass: SsaoPass,
    light_pass: LightPass,
    present_pass: PresentPass,
    probes: ProbeBaker,
    ibl_bind_group: wgpu::BindGroup,
    _guard: InstanceGuard,
}

impl Renderer {
    /// Allocate every pass and render target. Fails if another renderer is alive in this process.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, config: RendererConfig) -> Result<Self, RendererError> {
        let guard = InstanceGuard::acquire()?;
        config.validate()?;
        let materials = MaterialBindings::new(&device, &queue);
        let scene = SceneBindings::new(&device);
        let blur = BlurPass::new(&device)?;
        let shadows = ShadowSubsystem::new(&device, &config, &blur)?;
        let frame = FrameResources::new(&device, &queue, &config, &blur)?;
        let gbuffer_pass = GBufferPass::new(&device, &scene, &materials)?;
        let forward_pass = ForwardPass::new(&device, &scene, &materials)?;
        let ssao_pass = SsaoPass::new(&device, &queue, &scene, &config.ssao)?;
        let probes = ProbeBaker::new(&device, &queue, &config, &scene, &materials)?;
        let light_pass = LightPass::new(&device, &scene, probes.ibl_layout())?;
        let present_pass = PresentPass::new(&device, config.output_format)?;
        let scene_buf = scene.create_uniform_buffer(&device, "scene_uniform");
        let scene_bind_group = scene.bind_group(&device, &scene_buf, shadows.directional_view(), shadows.point_cube_view());
        let ibl_bind_group = probes.ibl_bind_group(&device);
        log::info!(
            "prism renderer configured: {}x{} {:?} {:?}",
            config.width,
            config.height,
            config.pipeline,
            config.lighting
        );
        Ok(Self {
            schedule: FrameSchedule::new(&config),
            camera: CameraMatrices::default(),
            draw_queue: DrawQueue::new(),
            lights: LightRegistry::new(),
            post_effects: config.post_effects,
            device,
            queue,
            config,
            materials,
            scene,
            scene_buf,
            scene_bind_group,
            blur,
            shadows,
            frame,
            gbuffer_pass,
            forward_pass,
            ssao_pass,
            light_pass,
            present_pass,
            probes,
            ibl_bind_group,
            _guard: guard,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn state(&self) -> RendererState {
        self.schedule.state()
    }

    pub fn lights(&self) -> &LightRegistry {
        &self.lights
    }

    pub fn shadows(&self) -> &ShadowSubsystem {
        &self.shadows
    }

    pub fn probes(&self) -> &ProbeBaker {
        &self.probes
    }

    /// Passes the next call to `render` will encode.
    pub fn frame_plan(&self) -> FramePlan {
        self.schedule.plan()
    }

    pub fn add_light(&mut self, light: Light) -> Result<LightId, LightError> {
        self.lights.add(light)
    }

    pub fn set_camera(&mut self, camera: CameraMatrices) {
        self.camera = camera;
    }

    /// Queue a record for the next frame. `Ok` means it passed setup validation.
    pub fn push_to_draw_queue(&mut self, record: GeometryRecord) -> Result<(), SubmitError> {
        self.draw_queue.push(record)
    }

    /// Global switch for bloom and the AO tint in the final composite.
    pub fn set_post_effects(&mut self, enabled: bool) {
        self.post_effects = enabled;
    }

    /// Bloom threshold, strength and tint from the next frame on.
    pub fn set_bloom(&mut self, bloom: BloomOptions) -> Result<(), RendererError> {
        self.config.set_bloom(bloom)
    }

    /// Ping-pong steps of the bloom/AO blur. Soft shadows keep their construction-time count.
    pub fn set_blur_steps(&mut self, steps: u32) -> Result<(), RendererError> {
        self.config.set_blur_iterations(steps)?;
        self.frame.post.set_iterations(steps);
        Ok(())
    }

    pub fn set_ssao(&mut self, ssao: SsaoOptions) -> Result<(), RendererError> {
        let was_enabled = self.config.ssao.enabled;
        self.config.set_ssao(ssao)?;
        self.ssao_pass.set_options(&self.queue, &ssao);
        self.schedule.set_ssao(ssao.enabled);
        if was_enabled && !ssao.enabled {
            self.frame.clear_occlusion(&self.device, &self.queue);
        }
        Ok(())
    }

    /// Build a forward program from host WGSL. Insert it into the geometry table to use it.
    pub fn create_forward_program(&self, label: &str, wgsl: &str) -> Result<ForwardProgram, RendererError> {
        self.forward_pass.create_program(&self.device, label, wgsl)
    }

    /// Render the queued records into `output`. The queue is cleared and the frame counter
    /// advances whether or not encoding succeeds.
    pub fn render(&mut self, table: &GeometryTable, output: &wgpu::TextureView) -> Result<(), RendererError> {
        let plan = self.schedule.plan();
        log::trace!("frame {} ({} records): {:?}", plan.frame_index, self.draw_queue.len(), plan);
        let result = self.encode_frame(&plan, table, output);
        self.draw_queue.clear();
        match &result {
            Ok(()) => self.schedule.finish(&plan),
            Err(e) => {
                log::error!("frame {} dropped: {e}", plan.frame_index);
                self.schedule.abandon(&plan);
            }
        }
        result
    }

    fn encode_frame(&mut self, plan: &FramePlan, table: &GeometryTable, output: &wgpu::TextureView) -> Result<(), RendererError> {
        let Self { device, queue, draw_queue, shadows, blur, lights, camera, .. } = self;
        let (device, queue, blur, lights) = (&*device, &*queue, &*blur, &*lights);
        let shadow_work = draw_queue.prepare_with(camera, |records| {
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("prism_shadows") });
            if plan.directional_shadows {
                shadows.encode_directional(&mut encoder, device, queue, blur, table, records, lights.directional())?;
            }
            if plan.point_shadows {
                let refreshed = shadows.encode_points(&mut encoder, device, queue, table, records, lights);
                log::trace!("refreshed {} point shadow caches", refreshed.len());
            }
            Ok::<_, RendererError>(encoder)
        });
        let mut encoder = shadow_work?;

        let uniforms = SceneUniforms::new(
            &self.camera,
            &self.config,
            &self.lights,
            self.shadows.light_space(),
            self.probes.baked_probes(),
            (self.config.width, self.config.height),
        );
        SceneBindings::write(&self.queue, &self.scene_buf, &uniforms);

        let records = self.draw_queue.records();
        match plan.pipeline {
            PipelineMode::Deferred | PipelineMode::Debug(_) => {
                self.gbuffer_pass.encode(&mut encoder, &self.device, &self.frame, &self.scene_bind_group, &self.materials, table, records);
                if plan.ssao {
                    self.ssao_pass.encode(&mut encoder, &self.device, &self.frame, &self.scene_bind_group);
                }
                if plan.pipeline == PipelineMode::Deferred {
                    self.light_pass.encode(&mut encoder, &self.device, &self.frame, &self.scene_bind_group, &self.ibl_bind_group);
                }
            }
            PipelineMode::Forward => {
                self.forward_pass.encode(
                    &mut encoder,
                    &self.device,
                    &self.frame,
                    &self.scene_bind_group,
                    &self.materials,
                    table,
                    records,
                    self.config.background,
                );
            }
        }
        if self.post_effects && !matches!(plan.pipeline, PipelineMode::Debug(_)) {
            self.blur.encode(&mut encoder, &self.frame.post)?;
        }
        self.queue.submit(Some(encoder.finish()));

        if plan.probe_bake {
            let baked = self.probes.bake(
                &self.device,
                &self.queue,
                &self.config,
                &self.lights,
                &self.scene,
                &self.shadows,
                &self.materials,
                table,
                records,
            );
            if let Err(e) = baked {
                log::error!("light probe bake failed: {e}");
            }
        }

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("prism_present") });
        self.present_pass.encode(
            &mut encoder,
            &self.device,
            &self.queue,
            &self.config,
            self.post_effects,
            &self.frame,
            self.shadows.directional_view(),
            output,
        );
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_one_instance_guard_at_a_time() {
        let first = InstanceGuard::acquire().unwrap();
        assert!(matches!(InstanceGuard::acquire(), Err(RendererError::AlreadyConfigured)));
        drop(first);
        let again = InstanceGuard::acquire();
        assert!(again.is_ok());
    }
}
