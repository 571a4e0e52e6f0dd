//! CPU reference ray marcher.
//!
//! This is the same march `cloud.wgsl` runs per fragment, written in Rust so
//! the compositing rules can be tested without a GPU and so headless
//! snapshots can be produced. Keep the two in sync: every constant and step
//! here has a counterpart in the shader.
//!
//! The volume occupies the unit cube `[-0.5, 0.5]³` in object space. Texture
//! coordinates are `position + 0.5`.

use glam::{UVec2, Vec3, Vec4};

use crate::density::DensityField;
use crate::params::RenderParameters;

/// Step length at which `opacity` is applied unscaled (1/100 of the cube).
pub const REFERENCE_STEP: f32 = 0.01;
/// Offset used for the diagonal density gradient.
pub const SHADE_OFFSET: f32 = 0.01;
/// Lower bound on per-step transmission, keeps `pow` away from zero.
const MIN_TRANSMISSION: f32 = 1e-6;

/// Anything the marcher can read normalized densities from.
pub trait VolumeSampler {
    /// Filtered density in `[0, 1]` at texture coordinates `uvw`.
    fn sample(&self, uvw: Vec3) -> f32;
    /// Resolution per axis, used to scale the jitter.
    fn size(&self) -> u32;
}

impl VolumeSampler for DensityField {
    fn sample(&self, uvw: Vec3) -> f32 {
        DensityField::sample(self, uvw)
    }

    fn size(&self) -> u32 {
        DensityField::size(self)
    }
}

/// A ray in the cube's object space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Ray from `origin` toward `target`.
    pub fn toward(origin: Vec3, target: Vec3) -> Self {
        Self::new(origin, target - origin)
    }
}

/// Slab intersection with the unit cube. Returns `(t_enter, t_exit)`.
///
/// A miss is signalled by `t_enter > t_exit`.
pub fn hit_box(origin: Vec3, direction: Vec3) -> (f32, f32) {
    let inv_dir = direction.recip();
    let t1 = (Vec3::splat(-0.5) - origin) * inv_dir;
    let t2 = (Vec3::splat(0.5) - origin) * inv_dir;
    let t_min = t1.min(t2);
    let t_max = t1.max(t2);
    (t_min.max_element(), t_max.min_element())
}

/// Smooth ramp from 0 at `lo` to 1 at `hi`.
///
/// A zero-width band becomes a hard cut: `1` strictly above `lo`.
pub fn band(lo: f32, hi: f32, x: f32) -> f32 {
    if hi <= lo {
        return if x > lo { 1.0 } else { 0.0 };
    }
    let t = ((x - lo) / (hi - lo)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Thomas Wang's 32-bit integer hash.
pub fn wang_hash(seed: u32) -> u32 {
    let mut s = (seed ^ 61) ^ (seed >> 16);
    s = s.wrapping_mul(9);
    s ^= s >> 4;
    s = s.wrapping_mul(0x27d4_eb2d);
    s ^ (s >> 15)
}

/// Per-pixel, per-frame jitter in `[-1, 1)`.
pub fn jitter(pixel: UVec2, frame: u32) -> f32 {
    let seed = pixel
        .x
        .wrapping_mul(1973)
        .wrapping_add(pixel.y.wrapping_mul(9277))
        .wrapping_add(frame.wrapping_mul(26699));
    let r = wang_hash(seed) as f64 / 4_294_967_296.0;
    (r * 2.0 - 1.0) as f32
}

/// March one ray and return straight (non-premultiplied) RGBA.
///
/// `jitter` shifts every sample along the ray by `jitter / size` and is
/// ignored unless `params.dither` is set.
pub fn march<V>(volume: &V, ray: Ray, params: &RenderParameters, base: Vec3, jitter: f32) -> Vec4
where
    V: VolumeSampler + ?Sized,
{
    let p = params.sanitized();
    if p.steps == 0 {
        return Vec4::ZERO;
    }

    let dir = ray.direction.normalize_or_zero();
    if dir == Vec3::ZERO {
        return Vec4::ZERO;
    }

    let (t_enter, t_exit) = hit_box(ray.origin, dir);
    let t_enter = t_enter.max(0.0);
    if !(t_enter < t_exit) {
        return Vec4::ZERO;
    }

    let step_len = (t_exit - t_enter) / p.steps as f32;
    let exponent = step_len / REFERENCE_STEP;
    let offset = if p.dither {
        jitter / volume.size().max(1) as f32
    } else {
        0.0
    };
    let start = ray.origin + dir * (t_enter + 0.5 * step_len + offset);

    let mut rgb = base;
    let mut alpha = 0.0f32;

    for i in 0..p.steps {
        let pos = start + dir * (i as f32 * step_len);
        let uvw = pos + Vec3::splat(0.5);

        let density = volume.sample(uvw).clamp(0.0, 1.0);
        let coverage = band(p.threshold - p.range, p.threshold + p.range, density) * p.opacity;
        if coverage <= 0.0 {
            continue;
        }

        let a = 1.0 - (1.0 - coverage).max(MIN_TRANSMISSION).powf(exponent);
        let shade = volume.sample(uvw - Vec3::splat(SHADE_OFFSET)).clamp(0.0, 1.0)
            - volume.sample(uvw + Vec3::splat(SHADE_OFFSET)).clamp(0.0, 1.0);
        let col = shade * 3.0 + (pos.x + pos.y) * 0.25 + 0.2;

        rgb += Vec3::splat((1.0 - alpha) * a * col);
        alpha += (1.0 - alpha) * a;

        // Nothing behind a saturated sample contributes
        if alpha >= 1.0 {
            break;
        }
    }

    rgb.clamp(Vec3::ZERO, Vec3::ONE).extend(alpha.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Uniform(f32);

    impl VolumeSampler for Uniform {
        fn sample(&self, _uvw: Vec3) -> f32 {
            self.0
        }
        fn size(&self) -> u32 {
            16
        }
    }

    fn straight_through() -> Ray {
        Ray::toward(Vec3::new(0.0, 0.0, 1.5), Vec3::ZERO)
    }

    fn params() -> RenderParameters {
        RenderParameters::default().with_dither(false)
    }

    #[test]
    fn test_hit_box_axis_ray() {
        let (t0, t1) = hit_box(Vec3::new(0.0, 0.0, 1.5), Vec3::new(0.0, 0.0, -1.0));
        assert!((t0 - 1.0).abs() < 1e-6);
        assert!((t1 - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_hit_box_miss() {
        let (t0, t1) = hit_box(Vec3::new(2.0, 0.0, 1.5), Vec3::new(0.0, 0.0, -1.0));
        assert!(t0 > t1);
    }

    #[test]
    fn test_band() {
        assert_eq!(band(0.2, 0.4, 0.1), 0.0);
        assert_eq!(band(0.2, 0.4, 0.5), 1.0);
        assert!((band(0.2, 0.4, 0.3) - 0.5).abs() < 1e-6);
        // Degenerate band
        assert_eq!(band(0.3, 0.3, 0.3), 0.0);
        assert_eq!(band(0.3, 0.3, 0.31), 1.0);
    }

    #[test]
    fn test_wang_hash_known_values() {
        assert_eq!(wang_hash(0), 0xc0a9_496a);
        assert_eq!(wang_hash(1), 0x2792_2c9d);
        assert_eq!(wang_hash(12345), 0x0dde_ec13);
    }

    #[test]
    fn test_jitter_range() {
        for y in 0..32 {
            for x in 0..32 {
                let j = jitter(UVec2::new(x, y), 7);
                assert!((-1.0..1.0).contains(&j));
            }
        }
        assert_ne!(jitter(UVec2::new(3, 4), 0), jitter(UVec2::new(3, 4), 1));
    }

    #[test]
    fn test_zero_steps_is_transparent() {
        let c = march(&Uniform(1.0), straight_through(), &params().with_steps(0), Vec3::ONE, 0.0);
        assert_eq!(c, Vec4::ZERO);
    }

    #[test]
    fn test_miss_is_transparent() {
        let ray = Ray::new(Vec3::new(3.0, 0.0, 1.5), Vec3::new(0.0, 0.0, -1.0));
        let c = march(&Uniform(1.0), ray, &params(), Vec3::ONE, 0.0);
        assert_eq!(c.w, 0.0);
    }

    #[test]
    fn test_camera_inside_cube_still_marches() {
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        let c = march(&Uniform(1.0), ray, &params(), Vec3::ZERO, 0.0);
        assert!(c.w > 0.0);
    }

    #[test]
    fn test_opacity_increases_coverage() {
        let low = march(&Uniform(0.8), straight_through(), &params().with_opacity(0.01), Vec3::ZERO, 0.0);
        let high = march(&Uniform(0.8), straight_through(), &params().with_opacity(0.05), Vec3::ZERO, 0.0);
        assert!(high.w > low.w);
    }

    #[test]
    fn test_step_count_converges() {
        let p = params().with_opacity(0.02);
        let coarse = march(&Uniform(0.8), straight_through(), &p.with_steps(50), Vec3::ZERO, 0.0);
        let fine = march(&Uniform(0.8), straight_through(), &p.with_steps(200), Vec3::ZERO, 0.0);
        assert!((coarse.w - fine.w).abs() < 1e-3, "{} vs {}", coarse.w, fine.w);
    }

    #[test]
    fn test_below_threshold_is_transparent() {
        let c = march(&Uniform(0.1), straight_through(), &params().with_threshold(0.5), Vec3::ONE, 0.0);
        assert_eq!(c.w, 0.0);
    }

    #[test]
    fn test_base_color_survives_with_no_coverage() {
        let c = march(&Uniform(0.0), straight_through(), &params(), Vec3::new(0.4, 0.0, 0.8), 0.0);
        assert_eq!(c.truncate(), Vec3::new(0.4, 0.0, 0.8));
    }

    #[test]
    fn test_dither_off_ignores_jitter() {
        let field = crate::density::DensityFieldGenerator::new(16)
            .generate(&crate::noise_source::ImprovedNoise::new());
        let a = march(&field, straight_through(), &params(), Vec3::ZERO, 0.9);
        let b = march(&field, straight_through(), &params(), Vec3::ZERO, -0.9);
        assert_eq!(a, b);
    }
}
