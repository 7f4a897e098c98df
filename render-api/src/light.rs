//! Light descriptions. One shared payload plus a tagged kind.

use glam::Vec3;

/// Constant/linear/quadratic distance falloff.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Attenuation {
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl Attenuation {
    pub fn factor(&self, distance: f32) -> f32 {
        1.0 / (self.constant + self.linear * distance + self.quadratic * distance * distance)
    }
}

impl Default for Attenuation {
    fn default() -> Self {
        Self { constant: 1.0, linear: 0.09, quadratic: 0.032 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LightKind {
    /// Sun-like light. `direction` points from the light toward the scene.
    Directional { direction: Vec3 },
    Point { attenuation: Attenuation },
    /// Cone light; cutoffs are half-angles in radians.
    Spot { direction: Vec3, attenuation: Attenuation, inner_cutoff: f32, outer_cutoff: f32 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Light {
    pub name: String,
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub kind: LightKind,
}

impl Light {
    pub fn directional(name: impl Into<String>, position: Vec3, direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            name: name.into(),
            position,
            color,
            intensity,
            kind: LightKind::Directional { direction: direction.normalize_or(Vec3::NEG_Y) },
        }
    }

    pub fn point(name: impl Into<String>, position: Vec3, color: Vec3, intensity: f32, attenuation: Attenuation) -> Self {
        Self { name: name.into(), position, color, intensity, kind: LightKind::Point { attenuation } }
    }

    pub fn spot(
        name: impl Into<String>,
        position: Vec3,
        direction: Vec3,
        color: Vec3,
        intensity: f32,
        inner_cutoff: f32,
        outer_cutoff: f32,
    ) -> Self {
        Self {
            name: name.into(),
            position,
            color,
            intensity,
            kind: LightKind::Spot {
                direction: direction.normalize_or(Vec3::NEG_Y),
                attenuation: Attenuation::default(),
                inner_cutoff,
                outer_cutoff,
            },
        }
    }

    /// Color premultiplied by intensity, as uploaded to shaders.
    pub fn radiance(&self) -> Vec3 {
        self.color * self.intensity
    }

    pub fn is_directional(&self) -> bool {
        matches!(self.kind, LightKind::Directional { .. })
    }

    pub fn is_point(&self) -> bool {
        matches!(self.kind, LightKind::Point { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radiance_scales_color() {
        let l = Light::point("p", Vec3::ZERO, Vec3::new(1.0, 0.5, 0.0), 4.0, Attenuation::default());
        assert_eq!(l.radiance(), Vec3::new(4.0, 2.0, 0.0));
        assert!(l.is_point());
        assert!(!l.is_directional());
    }

    #[test]
    fn attenuation_is_one_at_origin_and_decreasing() {
        let a = Attenuation::default();
        assert_eq!(a.factor(0.0), 1.0);
        assert!(a.factor(2.0) < a.factor(1.0));
    }

    #[test]
    fn directional_direction_is_normalized() {
        let l = Light::directional("sun", Vec3::ZERO, Vec3::new(0.0, -4.0, 3.0), Vec3::ONE, 1.0);
        match l.kind {
            LightKind::Directional { direction } => assert!((direction.length() - 1.0).abs() < 1e-6),
            _ => panic!("expected directional"),
        }
    }
}
