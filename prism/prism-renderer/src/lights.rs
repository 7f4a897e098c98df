//! Light registry: at most one directional light, a bounded set of shadowed point lights, spot lights.

use render_api::{Light, LightKind};

use crate::error::LightError;

/// Point lights each own one shadow cubemap cache.
pub const MAX_POINT_SHADOW_MAPS: usize = 5;
pub const MAX_SPOT_LIGHTS: usize = 4;

/// Position of a light in registration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LightId(pub usize);

#[derive(Default)]
pub struct LightRegistry {
    lights: Vec<Light>,
    directional: Option<usize>,
    points: Vec<usize>,
    spots: Vec<usize>,
}

impl LightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a light. A second directional light, or one light past a kind's limit,
    /// is logged and dropped; the already registered lights stay untouched.
    pub fn add(&mut self, light: Light) -> Result<LightId, LightError> {
        let id = self.lights.len();
        let result = match light.kind {
            LightKind::Directional { .. } if self.directional.is_some() => Err(LightError::DirectionalAlreadyRegistered),
            LightKind::Directional { .. } => {
                self.directional = Some(id);
                Ok(())
            }
            LightKind::Point { .. } if self.points.len() >= MAX_POINT_SHADOW_MAPS => {
                Err(LightError::TooManyPointLights(MAX_POINT_SHADOW_MAPS))
            }
            LightKind::Point { .. } => {
                self.points.push(id);
                Ok(())
            }
            LightKind::Spot { .. } if self.spots.len() >= MAX_SPOT_LIGHTS => Err(LightError::TooManySpotLights(MAX_SPOT_LIGHTS)),
            LightKind::Spot { .. } => {
                self.spots.push(id);
                Ok(())
            }
        };
        match result {
            Ok(()) => {
                log::debug!("registered light '{}'", light.name);
                self.lights.push(light);
                Ok(LightId(id))
            }
            Err(e) => {
                log::error!("{e} Dropping light '{}'.", light.name);
                Err(e)
            }
        }
    }

    pub fn get(&self, id: LightId) -> Option<&Light> {
        self.lights.get(id.0)
    }

    pub fn all(&self) -> &[Light] {
        &self.lights
    }

    pub fn directional(&self) -> Option<&Light> {
        self.directional.map(|i| &self.lights[i])
    }

    /// Point lights in registration order; the position is also the shadow cache slot.
    pub fn point_lights(&self) -> impl Iterator<Item = &Light> + '_ {
        self.points.iter().map(|&i| &self.lights[i])
    }

    pub fn spot_lights(&self) -> impl Iterator<Item = &Light> + '_ {
        self.spots.iter().map(|&i| &self.lights[i])
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_log;
    use glam::Vec3;
    use render_api::Attenuation;

    fn sun(name: &str) -> Light {
        Light::directional(name, Vec3::new(0.0, 10.0, 0.0), Vec3::NEG_Y, Vec3::ONE, 1.0)
    }

    #[test]
    fn second_directional_light_is_rejected_and_logged() {
        let mut registry = LightRegistry::new();
        let (results, errors) = test_log::capture(|| (registry.add(sun("first")), registry.add(sun("second"))));
        assert_eq!(results.0, Ok(LightId(0)));
        assert_eq!(results.1, Err(LightError::DirectionalAlreadyRegistered));
        assert_eq!(registry.directional().map(|l| l.name.as_str()), Some("first"));
        assert_eq!(registry.all().len(), 1);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Cannot have more than 1 directional light."));
    }

    #[test]
    fn point_lights_are_capped_at_shadow_map_count() {
        let mut registry = LightRegistry::new();
        for i in 0..MAX_POINT_SHADOW_MAPS {
            let l = Light::point(format!("p{i}"), Vec3::ZERO, Vec3::ONE, 1.0, Attenuation::default());
            assert!(registry.add(l).is_ok());
        }
        let extra = Light::point("extra", Vec3::ZERO, Vec3::ONE, 1.0, Attenuation::default());
        assert_eq!(registry.add(extra), Err(LightError::TooManyPointLights(MAX_POINT_SHADOW_MAPS)));
        assert_eq!(registry.point_count(), MAX_POINT_SHADOW_MAPS);
    }

    #[test]
    fn kinds_are_tracked_separately() {
        let mut registry = LightRegistry::new();
        registry.add(Light::point("p", Vec3::X, Vec3::ONE, 1.0, Attenuation::default())).unwrap();
        registry.add(sun("sun")).unwrap();
        registry.add(Light::spot("s", Vec3::Y, Vec3::NEG_Y, Vec3::ONE, 1.0, 0.2, 0.3)).unwrap();
        assert_eq!(registry.point_lights().count(), 1);
        assert_eq!(registry.spot_lights().count(), 1);
        assert_eq!(registry.get(LightId(1)).map(|l| l.name.as_str()), Some("sun"));
    }
}
