//! Frame scheduling: which passes run on a given frame, and the renderer lifecycle.

use crate::config::{PipelineMode, RendererConfig};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RendererState {
    /// Resources allocated, no frame rendered yet.
    Configured,
    Running,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BakeState {
    Disabled,
    Pending,
    Done,
}

/// Passes to encode for one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FramePlan {
    pub frame_index: u64,
    pub pipeline: PipelineMode,
    pub directional_shadows: bool,
    pub point_shadows: bool,
    pub ssao: bool,
    pub probe_bake: bool,
}

pub struct FrameSchedule {
    frame_index: u64,
    pipeline: PipelineMode,
    directional_interval: u64,
    point_interval: u64,
    ssao: bool,
    bake: BakeState,
    bake_from: u64,
    state: RendererState,
}

impl FrameSchedule {
    pub fn new(config: &RendererConfig) -> Self {
        Self {
            frame_index: 0,
            pipeline: config.pipeline,
            directional_interval: config.directional_shadow_interval.max(1),
            point_interval: config.point_shadow_interval.max(1),
            ssao: config.ssao.enabled,
            bake: if config.bakes_probes() { BakeState::Pending } else { BakeState::Disabled },
            bake_from: config.probe_bake_frame,
            state: RendererState::Configured,
        }
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn state(&self) -> RendererState {
        self.state
    }

    pub fn probes_baked(&self) -> bool {
        self.bake == BakeState::Done
    }

    /// Plan for the next frame to render.
    pub fn plan(&self) -> FramePlan {
        let frame_index = self.frame_index;
        let geometry_ssao = !matches!(self.pipeline, PipelineMode::Forward);
        FramePlan {
            frame_index,
            pipeline: self.pipeline,
            directional_shadows: frame_index % self.directional_interval == 0,
            point_shadows: frame_index % self.point_interval == 0,
            ssao: self.ssao && geometry_ssao,
            probe_bake: self.bake == BakeState::Pending && frame_index >= self.bake_from,
        }
    }

    pub fn set_ssao(&mut self, enabled: bool) {
        self.ssao = enabled;
    }

    /// Skip past a frame that failed to encode. A pending bake stays pending.
    pub fn abandon(&mut self, plan: &FramePlan) {
        self.frame_index = plan.frame_index + 1;
    }

    /// Record that `plan` was executed and advance to the next frame.
    pub fn finish(&mut self, plan: &FramePlan) {
        if plan.probe_bake {
            self.bake = BakeState::Done;
        }
        self.state = RendererState::Running;
        self.frame_index = plan.frame_index + 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LightingModel;

    fn run(schedule: &mut FrameSchedule, frames: u64) -> Vec<FramePlan> {
        (0..frames)
            .map(|_| {
                let plan = schedule.plan();
                schedule.finish(&plan);
                plan
            })
            .collect()
    }

    #[test]
    fn point_shadows_refresh_every_fifth_frame() {
        let config = RendererConfig { point_shadow_interval: 5, ..Default::default() };
        let mut schedule = FrameSchedule::new(&config);
        let frames: Vec<u64> = run(&mut schedule, 10).iter().filter(|p| p.point_shadows).map(|p| p.frame_index).collect();
        assert_eq!(frames, vec![0, 5]);
    }

    #[test]
    fn shadow_intervals_are_independent() {
        let config = RendererConfig { directional_shadow_interval: 3, point_shadow_interval: 4, ..Default::default() };
        let plans = run(&mut FrameSchedule::new(&config), 9);
        let dir: Vec<u64> = plans.iter().filter(|p| p.directional_shadows).map(|p| p.frame_index).collect();
        let point: Vec<u64> = plans.iter().filter(|p| p.point_shadows).map(|p| p.frame_index).collect();
        assert_eq!(dir, vec![0, 3, 6]);
        assert_eq!(point, vec![0, 4, 8]);
    }

    #[test]
    fn running_after_first_frame() {
        let mut schedule = FrameSchedule::new(&RendererConfig::default());
        assert_eq!(schedule.state(), RendererState::Configured);
        run(&mut schedule, 1);
        assert_eq!(schedule.state(), RendererState::Running);
    }

    #[test]
    fn abandoned_frame_advances_but_keeps_bake_pending() {
        let config = RendererConfig { probe_bake_frame: 0, ..Default::default() };
        let mut schedule = FrameSchedule::new(&config);
        let failed = schedule.plan();
        assert!(failed.probe_bake);
        schedule.abandon(&failed);
        let next = schedule.plan();
        assert_eq!(next.frame_index, 1);
        assert!(next.probe_bake);
        assert!(!schedule.probes_baked());
    }

    #[test]
    fn ssao_can_be_switched_at_runtime() {
        let mut schedule = FrameSchedule::new(&RendererConfig::default());
        schedule.set_ssao(false);
        assert!(!schedule.plan().ssao);
        schedule.set_ssao(true);
        assert!(schedule.plan().ssao);
    }

    #[test]
    fn probe_bake_runs_once_from_configured_frame() {
        let config = RendererConfig { probe_bake_frame: 2, ..Default::default() };
        let mut schedule = FrameSchedule::new(&config);
        let bakes: Vec<u64> = run(&mut schedule, 6).iter().filter(|p| p.probe_bake).map(|p| p.frame_index).collect();
        assert_eq!(bakes, vec![2]);
        assert!(schedule.probes_baked());
    }

    #[test]
    fn blinn_phong_never_bakes() {
        let config = RendererConfig { lighting: LightingModel::BlinnPhong, ..Default::default() };
        let plans = run(&mut FrameSchedule::new(&config), 4);
        assert!(plans.iter().all(|p| !p.probe_bake));
    }

    #[test]
    fn forward_mode_skips_ssao() {
        let config = RendererConfig { pipeline: PipelineMode::Forward, ..Default::default() };
        assert!(!FrameSchedule::new(&config).plan().ssao);
        assert!(FrameSchedule::new(&RendererConfig::default()).plan().ssao);
    }
}
