//! Split-sum BRDF lookup table for image-based specular, integrated on the CPU at startup.
//! Columns are `n·v`, rows are roughness; red holds the Fresnel scale, green the bias.

use glam::{Vec2, Vec3};

pub const BRDF_LUT_SIZE: u32 = 64;
pub const BRDF_SAMPLES: u32 = 256;

fn radical_inverse(bits: u32) -> f32 {
    bits.reverse_bits() as f32 * 2.328_306_4e-10
}

fn hammersley(i: u32, n: u32) -> Vec2 {
    Vec2::new(i as f32 / n as f32, radical_inverse(i))
}

/// Half vector around +Z drawn from the GGX distribution.
fn importance_sample_ggx(xi: Vec2, roughness: f32) -> Vec3 {
    let a = roughness * roughness;
    let phi = 2.0 * std::f32::consts::PI * xi.x;
    let cos_theta = ((1.0 - xi.y) / (1.0 + (a * a - 1.0) * xi.y)).sqrt();
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    Vec3::new(phi.cos() * sin_theta, phi.sin() * sin_theta, cos_theta)
}

fn geometry_schlick_ggx(n_dot_x: f32, roughness: f32) -> f32 {
    let k = roughness * roughness / 2.0;
    n_dot_x / (n_dot_x * (1.0 - k) + k)
}

/// Scale and bias applied to F0 for a view angle and roughness.
pub fn integrate_brdf(n_dot_v: f32, roughness: f32, samples: u32) -> (f32, f32) {
    let v = Vec3::new((1.0 - n_dot_v * n_dot_v).max(0.0).sqrt(), 0.0, n_dot_v);
    let (mut scale, mut bias) = (0.0, 0.0);
    for i in 0..samples {
        let h = importance_sample_ggx(hammersley(i, samples), roughness);
        let l = 2.0 * v.dot(h) * h - v;
        let n_dot_l = l.z.max(0.0);
        if n_dot_l <= 0.0 {
            continue;
        }
        let n_dot_h = h.z.max(0.0);
        let v_dot_h = v.dot(h).max(0.0);
        let g = geometry_schlick_ggx(n_dot_v, roughness) * geometry_schlick_ggx(n_dot_l, roughness);
        let g_vis = g * v_dot_h / (n_dot_h * n_dot_v).max(1e-6);
        let fc = (1.0 - v_dot_h).powi(5);
        scale += (1.0 - fc) * g_vis;
        bias += fc * g_vis;
    }
    (scale / samples as f32, bias / samples as f32)
}

/// RGBA8 texels, row-major, `size * size * 4` bytes.
pub fn brdf_lut(size: u32, samples: u32) -> Vec<u8> {
    let mut texels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        let roughness = (y as f32 + 0.5) / size as f32;
        for x in 0..size {
            let n_dot_v = (x as f32 + 0.5) / size as f32;
            let (scale, bias) = integrate_brdf(n_dot_v, roughness, samples);
            let to_u8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
            texels.extend_from_slice(&[to_u8(scale), to_u8(bias), 0, 255]);
        }
    }
    texels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smooth_head_on_reflection_keeps_f0() {
        let (scale, bias) = integrate_brdf(0.99, 0.05, BRDF_SAMPLES);
        assert!(scale > 0.9, "scale {scale}");
        assert!(bias < 0.05, "bias {bias}");
    }

    #[test]
    fn rough_grazing_reflection_loses_energy() {
        let (smooth, _) = integrate_brdf(0.9, 0.1, BRDF_SAMPLES);
        let (rough, _) = integrate_brdf(0.1, 0.9, BRDF_SAMPLES);
        assert!(rough < smooth);
    }

    #[test]
    fn lut_values_stay_in_unit_range() {
        for (nv, r) in [(0.05, 0.05), (0.5, 0.5), (0.95, 0.95), (0.2, 0.8)] {
            let (scale, bias) = integrate_brdf(nv, r, 64);
            assert!((0.0..=1.0).contains(&scale));
            assert!((0.0..=1.0).contains(&bias));
            assert!(scale + bias <= 1.02);
        }
    }

    #[test]
    fn lut_has_one_texel_per_cell() {
        let lut = brdf_lut(8, 16);
        assert_eq!(lut.len(), 8 * 8 * 4);
        assert!(lut.chunks(4).all(|t| t[3] == 255));
    }

    #[test]
    fn hammersley_covers_unit_square() {
        let points: Vec<Vec2> = (0..16).map(|i| hammersley(i, 16)).collect();
        assert!(points.iter().all(|p| (0.0..1.0).contains(&p.x) && (0.0..1.0).contains(&p.y)));
        assert_eq!(points[1].y, 0.5);
    }
}
