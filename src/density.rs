//! Volumetric density field generation.
//!
//! A [`DensityField`] is a cubic grid of bytes. [`DensityFieldGenerator`] fills
//! it once at startup by multiplying coherent noise with a radial falloff, so
//! the cloud is dense in the middle and fades toward the cube edges.
//!
//! # Layout
//!
//! Cells are stored x-fastest: the cell `(x, y, z)` lives at
//! `z * N * N + y * N + x`. This matches the row/slice order a 3D texture
//! upload expects, so the bytes go to the GPU without reshuffling.
//!
//! # Example
//!
//! ```ignore
//! use gascloud::{DensityFieldGenerator, ImprovedNoise};
//!
//! let field = DensityFieldGenerator::new(128).generate(&ImprovedNoise::new());
//! assert_eq!(field.as_bytes().len(), 128 * 128 * 128);
//! ```

use glam::{DVec3, Vec3};
use noise::NoiseFn;
use rayon::prelude::*;

/// Default grid resolution per axis.
pub const DEFAULT_SIZE: u32 = 128;
/// Default noise frequency scale.
pub const DEFAULT_SCALE: f64 = 0.05;
/// Default divisor applied to the x and z noise frequency.
pub const DEFAULT_ANISOTROPY: f64 = 1.5;

/// Immutable cubic grid of 8-bit densities.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DensityField {
    size: u32,
    data: Vec<u8>,
}

impl DensityField {
    /// Wrap existing voxel data.
    ///
    /// # Panics
    ///
    /// Panics if `data.len() != size³`.
    pub fn from_bytes(size: u32, data: Vec<u8>) -> Self {
        assert_eq!(
            data.len(),
            cell_count(size),
            "Density data size mismatch"
        );
        Self { size, data }
    }

    /// A field where every voxel is zero.
    pub fn empty(size: u32) -> Self {
        Self::from_bytes(size, vec![0; cell_count(size)])
    }

    /// Grid resolution per axis.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Total number of voxels.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the field has no voxels.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw voxel bytes in upload order.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Linear index of the cell at `(x, y, z)`.
    pub fn index(&self, x: u32, y: u32, z: u32) -> usize {
        debug_assert!(x < self.size && y < self.size && z < self.size);
        let n = self.size as usize;
        z as usize * n * n + y as usize * n + x as usize
    }

    /// Cell coordinates of a linear index. Inverse of [`index`](Self::index).
    pub fn coords(&self, index: usize) -> (u32, u32, u32) {
        let n = self.size as usize;
        let x = index % n;
        let y = (index / n) % n;
        let z = index / (n * n);
        (x as u32, y as u32, z as u32)
    }

    /// Density byte at `(x, y, z)`.
    pub fn get(&self, x: u32, y: u32, z: u32) -> u8 {
        self.data[self.index(x, y, z)]
    }

    /// Trilinearly filtered density at normalized texture coordinates.
    ///
    /// Mirrors a linear, clamp-to-edge sampler over an `R8Unorm` 3D texture:
    /// texel centers sit at `(i + 0.5) / N` and the result is in `[0, 1]`.
    /// A zero-sized field samples as empty space.
    pub fn sample(&self, uvw: Vec3) -> f32 {
        if self.size == 0 {
            return 0.0;
        }
        let n = self.size as f32;
        let max = self.size - 1;
        let g = (uvw * n - Vec3::splat(0.5)).clamp(Vec3::ZERO, Vec3::splat(n - 1.0));
        let base = g.floor();
        let frac = g - base;

        let x0 = base.x as u32;
        let y0 = base.y as u32;
        let z0 = base.z as u32;
        let x1 = (x0 + 1).min(max);
        let y1 = (y0 + 1).min(max);
        let z1 = (z0 + 1).min(max);

        let v = |x, y, z| self.get(x, y, z) as f32 / 255.0;

        let v00 = lerp(v(x0, y0, z0), v(x1, y0, z0), frac.x);
        let v10 = lerp(v(x0, y1, z0), v(x1, y1, z0), frac.x);
        let v01 = lerp(v(x0, y0, z1), v(x1, y0, z1), frac.x);
        let v11 = lerp(v(x0, y1, z1), v(x1, y1, z1), frac.x);
        let v0 = lerp(v00, v10, frac.y);
        let v1 = lerp(v01, v11, frac.y);
        lerp(v0, v1, frac.z)
    }

    /// Mean density byte, useful for quick sanity checks and logs.
    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().map(|&b| b as f64).sum::<f64>() / self.data.len() as f64
    }
}

fn cell_count(size: u32) -> usize {
    let n = size as usize;
    n * n * n
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Store a density value the way an unsigned byte array does.
///
/// Truncates toward zero and keeps the low 8 bits. Non-finite values store 0.
pub fn to_byte(value: f64) -> u8 {
    if !value.is_finite() {
        return 0;
    }
    (value.trunc() as i64).rem_euclid(256) as u8
}

/// Radial falloff for the cell at `(x, y, z)` in a grid of side `size`.
///
/// `1 - |(p - N/2) / N|`, used squared. Inside the grid the offset never
/// exceeds `√3/2`, so the corners keep a faint density of about `0.018`.
pub fn falloff(x: u32, y: u32, z: u32, size: u32) -> f64 {
    let n = size as f64;
    let offset = (DVec3::new(x as f64, y as f64, z as f64) - DVec3::splat(n / 2.0)) / n;
    1.0 - offset.length()
}

/// Builds a [`DensityField`] from coherent noise and a radial falloff.
#[derive(Clone, Debug)]
pub struct DensityFieldGenerator {
    /// Grid resolution per axis.
    pub size: u32,
    /// Noise frequency scale.
    pub scale: f64,
    /// Divisor for the x and z frequency (stretches the cloud horizontally).
    pub anisotropy: f64,
}

impl Default for DensityFieldGenerator {
    fn default() -> Self {
        Self {
            size: DEFAULT_SIZE,
            scale: DEFAULT_SCALE,
            anisotropy: DEFAULT_ANISOTROPY,
        }
    }
}

impl DensityFieldGenerator {
    /// Create a generator for a grid of the given size with default scale.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero.
    pub fn new(size: u32) -> Self {
        assert!(size > 0, "Density field size must be at least 1");
        Self {
            size,
            ..Default::default()
        }
    }

    /// Set the noise frequency scale.
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Set the x/z frequency divisor.
    pub fn with_anisotropy(mut self, anisotropy: f64) -> Self {
        self.anisotropy = anisotropy;
        self
    }

    /// Noise-space coordinates of the cell at `(x, y, z)`.
    pub fn noise_point(&self, x: u32, y: u32, z: u32) -> [f64; 3] {
        [
            x as f64 * self.scale / self.anisotropy,
            y as f64 * self.scale,
            z as f64 * self.scale / self.anisotropy,
        ]
    }

    /// Density byte for a single cell.
    pub fn density_at<N>(&self, noise: &N, x: u32, y: u32, z: u32) -> u8
    where
        N: NoiseFn<f64, 3> + ?Sized,
    {
        let d = falloff(x, y, z, self.size);
        let n = noise.get(self.noise_point(x, y, z));
        to_byte((128.0 + 128.0 * n) * d * d)
    }

    /// Fill the whole field.
    ///
    /// Each z-slice owns a disjoint range of the output and is generated on
    /// the rayon pool.
    pub fn generate<N>(&self, noise: &N) -> DensityField
    where
        N: NoiseFn<f64, 3> + Sync + ?Sized,
    {
        let n = self.size as usize;
        let mut data = vec![0u8; cell_count(self.size)];

        data.par_chunks_mut(n * n)
            .enumerate()
            .for_each(|(z, slice)| {
                for y in 0..n {
                    let row = &mut slice[y * n..(y + 1) * n];
                    for (x, cell) in row.iter_mut().enumerate() {
                        *cell = self.density_at(noise, x as u32, y as u32, z as u32);
                    }
                }
            });

        DensityField {
            size: self.size,
            data,
        }
    }
}
