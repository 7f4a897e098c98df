//! Scene uniform block shared by the lit passes (layout mirrors `Scene` in common.wgsl).

use glam::Mat4;
use render_api::{CameraMatrices, LightKind};

use crate::config::{LightingModel, RendererConfig};
use crate::lights::{LightRegistry, MAX_POINT_SHADOW_MAPS, MAX_SPOT_LIGHTS};

#[repr(C)]
#[derive(Copy, Clone, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct GpuDirectional {
    direction: [f32; 3],
    enabled: u32,
    color: [f32; 3],
    _pad: f32,
}

#[repr(C)]
#[derive(Copy, Clone, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct GpuPoint {
    position: [f32; 3],
    far_plane: f32,
    color: [f32; 3],
    _pad0: f32,
    attenuation: [f32; 3],
    _pad1: f32,
}

#[repr(C)]
#[derive(Copy, Clone, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct GpuSpot {
    position: [f32; 3],
    inner_cos: f32,
    direction: [f32; 3],
    outer_cos: f32,
    color: [f32; 3],
    _pad0: f32,
    attenuation: [f32; 3],
    _pad1: f32,
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct SceneUniforms {
    view: [[f32; 4]; 4],
    projection: [[f32; 4]; 4],
    inv_view: [[f32; 4]; 4],
    light_space: [[f32; 4]; 4],
    camera_position: [f32; 3],
    ambient: f32,
    screen_size: [f32; 2],
    bloom_threshold: f32,
    ssao_enabled: u32,
    lighting_model: u32,
    point_count: u32,
    spot_count: u32,
    probe_count: u32,
    directional: GpuDirectional,
    points: [GpuPoint; MAX_POINT_SHADOW_MAPS],
    spots: [GpuSpot; MAX_SPOT_LIGHTS],
    background: [f32; 4],
}

pub(crate) const SCENE_UNIFORMS_SIZE: u64 = std::mem::size_of::<SceneUniforms>() as u64;

impl SceneUniforms {
    pub(crate) fn new(
        camera: &CameraMatrices,
        config: &RendererConfig,
        lights: &LightRegistry,
        light_space: Mat4,
        probe_count: u32,
        screen_size: (u32, u32),
    ) -> Self {
        let directional = lights
            .directional()
            .and_then(|l| match l.kind {
                LightKind::Directional { direction } => Some(GpuDirectional {
                    direction: direction.to_array(),
                    enabled: 1,
                    color: l.radiance().to_array(),
                    _pad: 0.0,
                }),
                _ => None,
            })
            .unwrap_or_default();
        let mut points = [GpuPoint::default(); MAX_POINT_SHADOW_MAPS];
        for (slot, light) in points.iter_mut().zip(lights.point_lights()) {
            if let LightKind::Point { attenuation } = light.kind {
                *slot = GpuPoint {
                    position: light.position.to_array(),
                    far_plane: config.light_far,
                    color: light.radiance().to_array(),
                    _pad0: 0.0,
                    attenuation: [attenuation.constant, attenuation.linear, attenuation.quadratic],
                    _pad1: 0.0,
                };
            }
        }
        let mut spots = [GpuSpot::default(); MAX_SPOT_LIGHTS];
        let mut spot_count = 0;
        for (slot, light) in spots.iter_mut().zip(lights.spot_lights()) {
            if let LightKind::Spot { direction, attenuation, inner_cutoff, outer_cutoff } = light.kind {
                *slot = GpuSpot {
                    position: light.position.to_array(),
                    inner_cos: inner_cutoff.cos(),
                    direction: direction.to_array(),
                    outer_cos: outer_cutoff.cos(),
                    color: light.radiance().to_array(),
                    _pad0: 0.0,
                    attenuation: [attenuation.constant, attenuation.linear, attenuation.quadratic],
                    _pad1: 0.0,
                };
                spot_count += 1;
            }
        }
        Self {
            view: camera.view.to_cols_array_2d(),
            projection: camera.projection.to_cols_array_2d(),
            inv_view: camera.view.inverse().to_cols_array_2d(),
            light_space: light_space.to_cols_array_2d(),
            camera_position: camera.position.to_array(),
            ambient: 0.03,
            screen_size: [screen_size.0 as f32, screen_size.1 as f32],
            bloom_threshold: config.bloom.threshold,
            ssao_enabled: config.ssao.enabled as u32,
            lighting_model: match config.lighting {
                LightingModel::Pbr => 0,
                LightingModel::BlinnPhong => 1,
            },
            point_count: lights.point_count().min(MAX_POINT_SHADOW_MAPS) as u32,
            spot_count,
            probe_count,
            directional,
            points,
            spots,
            background: config.background,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use crate::config::{BloomOptions, SsaoOptions};
    use render_api::{Attenuation, Light};

    #[test]
    fn layout_matches_wgsl_scene_block() {
        assert_eq!(std::mem::size_of::<GpuDirectional>(), 32);
        assert_eq!(std::mem::size_of::<GpuPoint>(), 48);
        assert_eq!(std::mem::size_of::<GpuSpot>(), 64);
        assert_eq!(SCENE_UNIFORMS_SIZE, 848);
        assert_eq!(SCENE_UNIFORMS_SIZE % 16, 0);
    }

    #[test]
    fn lights_are_packed_in_registration_order() {
        let mut lights = LightRegistry::new();
        lights.add(Light::point("a", Vec3::X, Vec3::ONE, 2.0, Attenuation::default())).unwrap();
        lights.add(Light::point("b", Vec3::Y, Vec3::ONE, 1.0, Attenuation::default())).unwrap();
        let u = SceneUniforms::new(&CameraMatrices::default(), &RendererConfig::default(), &lights, Mat4::IDENTITY, 0, (8, 8));
        assert_eq!(u.point_count, 2);
        assert_eq!(u.points[0].position, [1.0, 0.0, 0.0]);
        assert_eq!(u.points[0].color, [2.0, 2.0, 2.0]);
        assert_eq!(u.points[1].position, [0.0, 1.0, 0.0]);
        assert_eq!(u.directional.enabled, 0);
    }

    #[test]
    fn updated_post_settings_reach_the_scene_block() {
        let mut config = RendererConfig::default();
        config.set_bloom(BloomOptions { threshold: 2.5, ..Default::default() }).unwrap();
        config.set_ssao(SsaoOptions { enabled: false, ..Default::default() }).unwrap();
        let u = SceneUniforms::new(&CameraMatrices::default(), &config, &LightRegistry::new(), Mat4::IDENTITY, 0, (8, 8));
        assert_eq!(u.bloom_threshold, 2.5);
        assert_eq!(u.ssao_enabled, 0);
    }
}
