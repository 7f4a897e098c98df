//! Prism configuration: output, pipeline mode, shadows, post effects, probes.

use glam::Vec3;

use crate::error::RendererError;

/// Tone mapping mode for the final composite.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ToneMapping {
    #[default]
    Reinhard,
    /// No tone mapping (clamp).
    None,
}

/// Which G-buffer channel the debug pipeline shows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DebugView {
    #[default]
    Albedo,
    Normal,
    Depth,
    Material,
    Occlusion,
    ShadowMoments,
}

impl DebugView {
    pub(crate) fn index(self) -> u32 {
        match self {
            DebugView::Albedo => 0,
            DebugView::Normal => 1,
            DebugView::Depth => 2,
            DebugView::Material => 3,
            DebugView::Occlusion => 4,
            DebugView::ShadowMoments => 5,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PipelineMode {
    #[default]
    Deferred,
    Forward,
    /// Deferred fill followed by a raw view of one intermediate target.
    Debug(DebugView),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LightingModel {
    #[default]
    Pbr,
    BlinnPhong,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BloomOptions {
    pub enabled: bool,
    pub intensity: f32,
    /// Luminance above which a pixel contributes to the bright pass.
    pub threshold: f32,
    pub color: Vec3,
}

impl Default for BloomOptions {
    fn default() -> Self {
        Self { enabled: true, intensity: 1.0, threshold: 1.0, color: Vec3::ONE }
    }
}

impl BloomOptions {
    pub fn validate(&self) -> Result<(), RendererError> {
        if !(self.intensity >= 0.0 && self.threshold >= 0.0) || !self.color.is_finite() {
            return Err(RendererError::InvalidConfig("bloom intensity and threshold must be non-negative".to_string()));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SsaoOptions {
    pub enabled: bool,
    pub intensity: f32,
    /// Hemisphere radius in view-space units.
    pub radius: f32,
    pub bias: f32,
    /// Tint applied where the blurred occlusion darkens the composite.
    pub color: Vec3,
    /// Fixed RNG seed for the sample kernel and noise. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for SsaoOptions {
    fn default() -> Self {
        Self { enabled: true, intensity: 1.0, radius: 0.5, bias: 0.025, color: Vec3::ZERO, seed: None }
    }
}

impl SsaoOptions {
    pub fn validate(&self) -> Result<(), RendererError> {
        if !(self.radius > 0.0) {
            return Err(RendererError::InvalidConfig("ssao radius must be positive".to_string()));
        }
        if !(self.intensity >= 0.0 && self.bias >= 0.0) || !self.color.is_finite() {
            return Err(RendererError::InvalidConfig("ssao intensity and bias must be non-negative".to_string()));
        }
        Ok(())
    }
}

/// Upper bound on ping-pong blur iterations.
pub const MAX_BLUR_ITERATIONS: u32 = 64;

/// World-space box filled with light probes for the IBL bake.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProbeVolume {
    pub center: Vec3,
    /// Full extent of the box on each axis.
    pub span: Vec3,
    /// Probes per world unit on each axis.
    pub density: Vec3,
}

impl Default for ProbeVolume {
    fn default() -> Self {
        Self { center: Vec3::ZERO, span: Vec3::splat(4.0), density: Vec3::splat(0.5) }
    }
}

/// Prism renderer configuration. Only the post-effect tunables change after construction.
#[derive(Clone, Debug)]
pub struct RendererConfig {
    pub width: u32,
    pub height: u32,
    pub background: [f32; 4],
    pub pipeline: PipelineMode,
    pub lighting: LightingModel,
    /// Near/far planes for every shadow-casting light.
    pub light_near: f32,
    pub light_far: f32,
    /// Directional shadow map edge length.
    pub shadow_resolution: u32,
    /// Point shadow cubemap face edge length.
    pub point_shadow_resolution: u32,
    /// Frames between directional shadow refreshes.
    pub directional_shadow_interval: u64,
    /// Frames between point shadow refreshes.
    pub point_shadow_interval: u64,
    /// Ping-pong iterations for bloom/SSAO and soft shadows.
    pub blur_iterations: u32,
    pub bloom: BloomOptions,
    pub ssao: SsaoOptions,
    /// Global post-effects switch; bloom and AO tint are skipped when off.
    pub post_effects: bool,
    pub tone_mapping: ToneMapping,
    /// `None` disables the light-probe bake.
    pub probes: Option<ProbeVolume>,
    /// Frame index from which the probe bake may run.
    pub probe_bake_frame: u64,
    pub probe_capture_resolution: u32,
    pub irradiance_resolution: u32,
    pub prefilter_resolution: u32,
    pub prefilter_mip_levels: u32,
    /// Output view format passed to `render`, e.g. the swapchain format.
    pub output_format: wgpu::TextureFormat,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            width: 1600,
            height: 900,
            background: [0.8, 0.8, 0.8, 1.0],
            pipeline: PipelineMode::default(),
            lighting: LightingModel::default(),
            light_near: 0.01,
            light_far: 100.0,
            shadow_resolution: 2048,
            point_shadow_resolution: 512,
            directional_shadow_interval: 5,
            point_shadow_interval: 10,
            blur_iterations: 5,
            bloom: BloomOptions::default(),
            ssao: SsaoOptions::default(),
            post_effects: true,
            tone_mapping: ToneMapping::default(),
            probes: Some(ProbeVolume::default()),
            probe_bake_frame: 1,
            probe_capture_resolution: 128,
            irradiance_resolution: 32,
            prefilter_resolution: 128,
            prefilter_mip_levels: 5,
            output_format: wgpu::TextureFormat::Rgba8Unorm,
        }
    }
}

impl RendererConfig {
    pub fn validate(&self) -> Result<(), RendererError> {
        let invalid = |msg: &str| Err(RendererError::InvalidConfig(msg.to_string()));
        if self.width == 0 || self.height == 0 {
            return invalid("resolution must be non-zero");
        }
        if self.shadow_resolution == 0 || self.point_shadow_resolution == 0 {
            return invalid("shadow resolutions must be non-zero");
        }
        if self.directional_shadow_interval == 0 || self.point_shadow_interval == 0 {
            return invalid("shadow refresh intervals must be at least 1");
        }
        if !(self.light_near > 0.0 && self.light_near < self.light_far) {
            return invalid("light near plane must be positive and below the far plane");
        }
        if self.probe_capture_resolution == 0 || self.irradiance_resolution == 0 {
            return invalid("probe capture and irradiance resolutions must be non-zero");
        }
        if self.prefilter_mip_levels < 2 {
            return invalid("prefilter needs at least two mip levels");
        }
        let max_mips = 32 - self.prefilter_resolution.leading_zeros();
        if self.prefilter_mip_levels > max_mips {
            return invalid("prefilter mip levels exceed the prefilter resolution");
        }
        if let Some(volume) = &self.probes {
            if volume.density.cmple(Vec3::ZERO).any() || volume.span.cmplt(Vec3::ZERO).any() {
                return invalid("probe density must be positive and span non-negative");
            }
        }
        if self.blur_iterations > MAX_BLUR_ITERATIONS {
            return invalid("too many blur iterations");
        }
        self.bloom.validate()?;
        self.ssao.validate()
    }

    /// Replace the bloom settings. On error the current settings are kept.
    pub fn set_bloom(&mut self, bloom: BloomOptions) -> Result<(), RendererError> {
        bloom.validate()?;
        self.bloom = bloom;
        Ok(())
    }

    /// Replace the SSAO settings. The sample kernel keeps the seed it was built with.
    pub fn set_ssao(&mut self, ssao: SsaoOptions) -> Result<(), RendererError> {
        ssao.validate()?;
        self.ssao = ssao;
        Ok(())
    }

    pub fn set_blur_iterations(&mut self, iterations: u32) -> Result<(), RendererError> {
        if iterations > MAX_BLUR_ITERATIONS {
            return Err(RendererError::InvalidConfig("too many blur iterations".to_string()));
        }
        self.blur_iterations = iterations;
        Ok(())
    }

    /// Probes are only baked for deferred PBR rendering.
    pub fn bakes_probes(&self) -> bool {
        self.probes.is_some() && self.pipeline == PipelineMode::Deferred && self.lighting == LightingModel::Pbr
    }

    /// Half-resolution extent used by the bloom/SSAO ping-pong.
    pub fn post_extent(&self) -> (u32, u32) {
        ((self.width / 2).max(1), (self.height / 2).max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(RendererConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let config = RendererConfig { point_shadow_interval: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(RendererError::InvalidConfig(_))));
    }

    #[test]
    fn inverted_light_planes_are_rejected() {
        let config = RendererConfig { light_near: 10.0, light_far: 1.0, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn too_many_prefilter_mips_are_rejected() {
        let config = RendererConfig { prefilter_resolution: 16, prefilter_mip_levels: 6, ..Default::default() };
        assert!(config.validate().is_err());
        let config = RendererConfig { prefilter_resolution: 16, prefilter_mip_levels: 5, ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_probe_resolutions_are_rejected() {
        let config = RendererConfig { irradiance_resolution: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(RendererError::InvalidConfig(_))));
        let config = RendererConfig { probe_capture_resolution: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(RendererError::InvalidConfig(_))));
    }

    #[test]
    fn rejected_tunables_leave_config_unchanged() {
        let mut config = RendererConfig::default();
        assert!(config.set_bloom(BloomOptions { intensity: -1.0, ..Default::default() }).is_err());
        assert!(config.set_ssao(SsaoOptions { radius: 0.0, ..Default::default() }).is_err());
        assert!(config.set_blur_iterations(MAX_BLUR_ITERATIONS + 1).is_err());
        assert_eq!(config.bloom, BloomOptions::default());
        assert_eq!(config.ssao, SsaoOptions::default());
        assert_eq!(config.blur_iterations, 5);

        config.set_blur_iterations(0).unwrap();
        config.set_ssao(SsaoOptions { enabled: false, radius: 1.5, ..Default::default() }).unwrap();
        assert_eq!(config.blur_iterations, 0);
        assert_eq!(config.ssao.radius, 1.5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn probes_only_bake_for_deferred_pbr() {
        let mut config = RendererConfig::default();
        assert!(config.bakes_probes());
        config.lighting = LightingModel::BlinnPhong;
        assert!(!config.bakes_probes());
        config.lighting = LightingModel::Pbr;
        config.pipeline = PipelineMode::Forward;
        assert!(!config.bakes_probes());
        config.pipeline = PipelineMode::Deferred;
        config.probes = None;
        assert!(!config.bakes_probes());
    }
}
