//! Coherent noise sources for density generation.
//!
//! The generator accepts anything implementing [`noise::NoiseFn<f64, 3>`].
//! [`ImprovedNoise`] reproduces Ken Perlin's reference implementation with the
//! canonical permutation table, so a cloud generated with it is identical on
//! every run and every machine. The seeded generators from the `noise` crate
//! are available through [`NoiseKind`] for variations.

use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use serde::Deserialize;

/// Ken Perlin's canonical permutation table.
const PERMUTATION: [u8; 256] = [
    151, 160, 137, 91, 90, 15, 131, 13, 201, 95, 96, 53, 194, 233, 7, 225,
    140, 36, 103, 30, 69, 142, 8, 99, 37, 240, 21, 10, 23, 190, 6, 148,
    247, 120, 234, 75, 0, 26, 197, 62, 94, 252, 219, 203, 117, 35, 11, 32,
    57, 177, 33, 88, 237, 149, 56, 87, 174, 20, 125, 136, 171, 168, 68, 175,
    74, 165, 71, 134, 139, 48, 27, 166, 77, 146, 158, 231, 83, 111, 229, 122,
    60, 211, 133, 230, 220, 105, 92, 41, 55, 46, 245, 40, 244, 102, 143, 54,
    65, 25, 63, 161, 1, 216, 80, 73, 209, 76, 132, 187, 208, 89, 18, 169,
    200, 196, 135, 130, 116, 188, 159, 86, 164, 100, 109, 198, 173, 186, 3, 64,
    52, 217, 226, 250, 124, 123, 5, 202, 38, 147, 118, 126, 255, 82, 85, 212,
    207, 206, 59, 227, 47, 16, 58, 17, 182, 189, 28, 42, 223, 183, 170, 213,
    119, 248, 152, 2, 44, 154, 163, 70, 221, 153, 101, 155, 167, 43, 172, 9,
    129, 22, 39, 253, 19, 98, 108, 110, 79, 113, 224, 232, 178, 185, 112, 104,
    218, 246, 97, 228, 251, 34, 242, 193, 238, 210, 144, 12, 191, 179, 162, 241,
    81, 51, 145, 235, 249, 14, 239, 107, 49, 192, 214, 31, 181, 199, 106, 157,
    184, 84, 204, 176, 115, 121, 50, 45, 127, 4, 150, 254, 138, 236, 205, 93,
    222, 114, 67, 29, 24, 72, 243, 141, 128, 195, 78, 66, 215, 61, 156, 180,
];

/// Reference 3D "improved" Perlin noise.
///
/// Stateless and coordinate-pure: the same point always yields the same value,
/// roughly in `[-1, 1]`, and every integer lattice point yields exactly `0.0`.
#[derive(Clone, Debug)]
pub struct ImprovedNoise {
    perm: [u8; 512],
}

impl ImprovedNoise {
    /// Create the noise function with the canonical permutation table.
    pub fn new() -> Self {
        let mut perm = [0u8; 512];
        for i in 0..512 {
            perm[i] = PERMUTATION[i & 255];
        }
        Self { perm }
    }

    fn p(&self, i: usize) -> usize {
        self.perm[i] as usize
    }

    /// Sample the noise at `(x, y, z)`.
    pub fn sample(&self, x: f64, y: f64, z: f64) -> f64 {
        let (fx, fy, fz) = (x.floor(), y.floor(), z.floor());

        // Unit cube containing the point, wrapped into the table
        let xi = (fx as i64 & 255) as usize;
        let yi = (fy as i64 & 255) as usize;
        let zi = (fz as i64 & 255) as usize;

        // Relative position inside that cube
        let (x, y, z) = (x - fx, y - fy, z - fz);
        let (u, v, w) = (fade(x), fade(y), fade(z));

        let a = self.p(xi) + yi;
        let aa = self.p(a) + zi;
        let ab = self.p(a + 1) + zi;
        let b = self.p(xi + 1) + yi;
        let ba = self.p(b) + zi;
        let bb = self.p(b + 1) + zi;

        lerp(
            w,
            lerp(
                v,
                lerp(u, grad(self.p(aa), x, y, z), grad(self.p(ba), x - 1.0, y, z)),
                lerp(u, grad(self.p(ab), x, y - 1.0, z), grad(self.p(bb), x - 1.0, y - 1.0, z)),
            ),
            lerp(
                v,
                lerp(
                    u,
                    grad(self.p(aa + 1), x, y, z - 1.0),
                    grad(self.p(ba + 1), x - 1.0, y, z - 1.0),
                ),
                lerp(
                    u,
                    grad(self.p(ab + 1), x, y - 1.0, z - 1.0),
                    grad(self.p(bb + 1), x - 1.0, y - 1.0, z - 1.0),
                ),
            ),
        )
    }
}

impl Default for ImprovedNoise {
    fn default() -> Self {
        Self::new()
    }
}

impl NoiseFn<f64, 3> for ImprovedNoise {
    fn get(&self, point: [f64; 3]) -> f64 {
        self.sample(point[0], point[1], point[2])
    }
}

fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

fn lerp(t: f64, a: f64, b: f64) -> f64 {
    a + t * (b - a)
}

/// Dot product with one of twelve gradient directions picked by the hash.
fn grad(hash: usize, x: f64, y: f64, z: f64) -> f64 {
    let h = hash & 15;
    let u = if h < 8 { x } else { y };
    let v = if h < 4 {
        y
    } else if h == 12 || h == 14 {
        x
    } else {
        z
    };
    let u = if h & 1 == 0 { u } else { -u };
    let v = if h & 2 == 0 { v } else { -v };
    u + v
}

/// Which coherent noise function drives the density field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum NoiseKind {
    /// Reference improved Perlin noise (seed is ignored).
    #[default]
    Improved,
    /// Seeded Perlin noise from the `noise` crate.
    Perlin,
    /// Four octaves of seeded Perlin noise.
    Fbm,
}

/// Boxed noise function shared across generator threads.
pub type DynNoise = Box<dyn NoiseFn<f64, 3> + Send + Sync>;

impl NoiseKind {
    /// Build the noise function for this kind.
    pub fn build(self, seed: u32) -> DynNoise {
        match self {
            NoiseKind::Improved => Box::new(ImprovedNoise::new()),
            NoiseKind::Perlin => Box::new(Perlin::new(seed)),
            NoiseKind::Fbm => Box::new(Fbm::<Perlin>::new(seed).set_octaves(4)),
        }
    }

    /// Display name used in logs and the panel.
    pub fn name(self) -> &'static str {
        match self {
            NoiseKind::Improved => "improved",
            NoiseKind::Perlin => "perlin",
            NoiseKind::Fbm => "fbm",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_value() {
        // Value published alongside the reference implementation
        let noise = ImprovedNoise::new();
        let v = noise.sample(3.14, 42.0, 7.0);
        assert!((v - 0.136_919_958_784_000_12).abs() < 1e-12, "got {}", v);
    }

    #[test]
    fn test_zero_on_lattice_points() {
        let noise = ImprovedNoise::new();
        for &(x, y, z) in &[(0.0, 0.0, 0.0), (1.0, 2.0, 3.0), (-4.0, 17.0, 255.0), (300.0, -1.0, 9.0)] {
            assert_eq!(noise.sample(x, y, z), 0.0);
        }
    }

    #[test]
    fn test_bounded() {
        let noise = ImprovedNoise::new();
        for i in 0..2000 {
            let t = i as f64 * 0.173;
            let v = noise.sample(t, t * 0.61 + 3.0, -t * 1.37);
            assert!((-1.0..=1.0).contains(&v), "out of range: {}", v);
        }
    }

    #[test]
    fn test_noise_fn_matches_sample() {
        let noise = ImprovedNoise::new();
        assert_eq!(noise.get([0.5, 0.25, 0.75]), noise.sample(0.5, 0.25, 0.75));
    }

    #[test]
    fn test_built_kinds_are_deterministic() {
        for kind in [NoiseKind::Improved, NoiseKind::Perlin, NoiseKind::Fbm] {
            let a = kind.build(7);
            let b = kind.build(7);
            let p = [1.3, -0.7, 4.2];
            assert_eq!(a.get(p), b.get(p), "{} not deterministic", kind.name());
        }
    }

    #[test]
    fn test_seed_changes_perlin() {
        let a = NoiseKind::Perlin.build(1);
        let b = NoiseKind::Perlin.build(2);
        let differs = (0..64).any(|i| {
            let p = [i as f64 * 0.37 + 0.1, 0.5, i as f64 * 0.11 + 0.3];
            a.get(p) != b.get(p)
        });
        assert!(differs);
    }
}
