//! Headless rendering with the CPU ray marcher.
//!
//! Produces the same image the GPU path draws for frame 0 from the initial
//! camera pose, without opening a window or touching the GPU. Rows are
//! marched in parallel on the rayon pool.

use std::path::Path;
use std::time::Instant;

use glam::{Mat4, UVec2, Vec2, Vec3};
use image::{Rgb, RgbImage};
use log::info;
use rayon::prelude::*;

use crate::camera::OrbitCamera;
use crate::config::CloudConfig;
use crate::density::DensityField;
use crate::error::AppError;
use crate::gpu::spin_matrix;
use crate::params::RenderParameters;
use crate::raymarch::{jitter, march, Ray, VolumeSampler};

/// Everything needed to render one still frame.
#[derive(Clone, Debug)]
pub struct SnapshotView {
    pub width: u32,
    pub height: u32,
    pub camera: OrbitCamera,
    pub params: RenderParameters,
    /// Cube rotation.
    pub model: Mat4,
    pub base: Vec3,
    pub clear: Vec3,
}

impl SnapshotView {
    /// Frame 0 of the configured scene at `width` x `height`.
    pub fn from_config(config: &CloudConfig, width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            camera: OrbitCamera::new(),
            params: config.params,
            model: spin_matrix(0.0, config.spin_rate),
            base: config.base_rgb(),
            clear: config.clear_rgb(),
        }
    }

    /// Object-space ray through the centre of `pixel`.
    pub fn pixel_ray(&self, pixel: UVec2) -> Ray {
        let aspect = self.width as f32 / self.height as f32;
        let inv_view_proj = self.camera.view_proj(aspect).inverse();
        let inv_model = self.model.inverse();

        let uv = (pixel.as_vec2() + Vec2::splat(0.5)) / Vec2::new(self.width as f32, self.height as f32);
        let ndc = Vec2::new(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0);
        let far = inv_view_proj.project_point3(ndc.extend(1.0));

        let origin = inv_model.transform_point3(self.camera.position());
        let target = inv_model.transform_point3(far);
        Ray::toward(origin, target)
    }

    /// Ray march every pixel and composite over the clear colour.
    pub fn render<V>(&self, volume: &V) -> RgbImage
    where
        V: VolumeSampler + Sync + ?Sized,
    {
        let width = self.width as usize;
        let mut buf = vec![0u8; width * self.height as usize * 3];

        buf.par_chunks_mut(width * 3)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, px) in row.chunks_exact_mut(3).enumerate() {
                    let pixel = UVec2::new(x as u32, y as u32);
                    let color = march(
                        volume,
                        self.pixel_ray(pixel),
                        &self.params,
                        self.base,
                        jitter(pixel, self.params.frame),
                    );
                    let rgb = color.truncate() * color.w + self.clear * (1.0 - color.w);
                    px.copy_from_slice(&to_rgb8(rgb));
                }
            });

        // Buffer length is width * height * 3 by construction
        RgbImage::from_raw(self.width, self.height, buf)
            .unwrap_or_else(|| RgbImage::from_pixel(self.width, self.height, Rgb(to_rgb8(self.clear))))
    }
}

fn to_rgb8(c: Vec3) -> [u8; 3] {
    let c = c.clamp(Vec3::ZERO, Vec3::ONE) * 255.0 + Vec3::splat(0.5);
    [c.x as u8, c.y as u8, c.z as u8]
}

/// Generate the configured field and render it to an image.
pub fn render_snapshot(config: &CloudConfig, width: u32, height: u32) -> (DensityField, RgbImage) {
    let start = Instant::now();
    let noise = config.noise.build(config.seed);
    let field = config.generator().generate(noise.as_ref());
    info!(
        "Generated {0}x{0}x{0} density field in {1:.1?}",
        field.size(),
        start.elapsed()
    );

    let start = Instant::now();
    let image = SnapshotView::from_config(config, width, height).render(&field);
    info!("Ray marched {}x{} snapshot in {:.1?}", width, height, start.elapsed());

    (field, image)
}

/// Render a snapshot and write it to `path`. Format follows the extension.
pub fn write_snapshot(config: &CloudConfig, path: &Path, width: u32, height: u32) -> Result<(), AppError> {
    let (_, image) = render_snapshot(config, width, height);
    image.save(path)?;
    info!("Wrote {}", path.display());
    Ok(())
}
