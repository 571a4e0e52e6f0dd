//! # gascloud
//!
//! A volumetric gas cloud: a 3D Perlin-noise density field with a radial
//! falloff, uploaded as a 3D texture and ray marched in a fragment shader.
//!
//! ## Quick Start
//!
//! ```ignore
//! use gascloud::prelude::*;
//!
//! fn main() -> Result<(), AppError> {
//!     let config = CloudConfig::new().with_size(96);
//!     CloudApp::run(config)
//! }
//! ```
//!
//! ## Pipeline
//!
//! 1. [`DensityFieldGenerator`] samples a [`noise::NoiseFn`] over an `N³`
//!    grid and fades it toward the edges, producing a [`DensityField`] of
//!    bytes.
//! 2. The field becomes an `R8Unorm` 3D texture. The unit cube is drawn with
//!    back faces culled and every fragment marches a ray through the volume.
//! 3. [`RenderParameters`] (threshold, opacity, range, steps) are read every
//!    frame. With the `egui` feature they are edited live in a small panel.
//!
//! The march is also available on the CPU in [`raymarch`], which backs the
//! headless [`snapshot`] renderer and the tests.
//!
//! ## Noise
//!
//! | [`NoiseKind`] | Source |
//! |---------------|--------|
//! | `Improved` | [`ImprovedNoise`], Ken Perlin's reference permutation |
//! | `Perlin` | seeded [`noise::Perlin`] |
//! | `Fbm` | seeded four-octave [`noise::Fbm`] |

pub mod app;
pub mod camera;
pub mod config;
pub mod density;
pub mod error;
mod gpu;
pub mod noise_source;
#[cfg(feature = "egui")]
pub mod panel;
pub mod params;
pub mod raymarch;
pub mod snapshot;
pub mod time;

pub use app::CloudApp;
pub use camera::OrbitCamera;
pub use config::{Args, CloudConfig};
pub use density::{DensityField, DensityFieldGenerator};
pub use error::{AppError, ConfigError, GpuError};
pub use glam::{Vec2, Vec3, Vec4};
pub use gpu::{render_extent, spin_matrix, CloudUniforms, CLOUD_SHADER, FALLBACK_MESSAGE};
pub use noise_source::{ImprovedNoise, NoiseKind};
pub use params::RenderParameters;
pub use raymarch::{march, Ray, VolumeSampler};
pub use time::FrameClock;

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use gascloud::prelude::*;
/// ```
pub mod prelude {
    pub use crate::app::CloudApp;
    pub use crate::camera::OrbitCamera;
    pub use crate::config::{Args, CloudConfig};
    pub use crate::density::{DensityField, DensityFieldGenerator};
    pub use crate::error::{AppError, ConfigError, GpuError};
    pub use crate::noise_source::{ImprovedNoise, NoiseKind};
    pub use crate::params::RenderParameters;
    pub use crate::raymarch::{march, Ray, VolumeSampler};
    pub use crate::snapshot::{render_snapshot, write_snapshot, SnapshotView};
    pub use crate::time::FrameClock;
    pub use crate::{Vec2, Vec3, Vec4};
    #[cfg(feature = "egui")]
    pub use egui;
}
