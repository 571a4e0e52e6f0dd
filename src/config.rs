//! Application configuration.
//!
//! [`CloudConfig`] collects everything the app needs at startup. Values come
//! from [`CloudConfig::default`], optionally overlaid by a RON file, then by
//! command-line flags ([`Args`]).
//!
//! ```ron
//! (
//!     size: 96,
//!     noise: fbm,
//!     seed: 7,
//!     params: (threshold: 0.3, steps: 150),
//! )
//! ```

use std::path::{Path, PathBuf};

use clap::Parser;
use glam::Vec3;
use serde::Deserialize;

use crate::density::{DensityFieldGenerator, DEFAULT_ANISOTROPY, DEFAULT_SCALE, DEFAULT_SIZE};
use crate::error::ConfigError;
use crate::noise_source::NoiseKind;
use crate::params::RenderParameters;

/// Largest accepted field size (256³ bytes = 16 MiB).
pub const MAX_FIELD_SIZE: u32 = 256;
/// Smallest accepted field size.
pub const MIN_FIELD_SIZE: u32 = 2;

/// Startup configuration for the cloud viewer.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// Density grid resolution per axis.
    pub size: u32,
    /// Noise frequency scale.
    pub scale: f64,
    /// Divisor for the x and z noise frequency.
    pub anisotropy: f64,
    /// Which noise function to use.
    pub noise: NoiseKind,
    /// Seed for the seeded noise kinds.
    pub seed: u32,
    /// Cloud tint as `0xRRGGBB`.
    pub base_color: u32,
    /// Background as `0xRRGGBB`.
    pub clear_color: u32,
    /// Initial ray march parameters.
    pub params: RenderParameters,
    /// Cube rotation rate about Y in radians per second.
    pub spin_rate: f32,
    /// Upper bound on rendered pixels per logical pixel.
    pub max_pixel_ratio: f64,
    /// Initial window size in logical pixels.
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_SIZE,
            scale: DEFAULT_SCALE,
            anisotropy: DEFAULT_ANISOTROPY,
            noise: NoiseKind::Improved,
            seed: 0,
            base_color: 0x6e00cc,
            clear_color: 0x000000,
            params: RenderParameters::default(),
            spin_rate: 1.0 / 7.5,
            max_pixel_ratio: 2.0,
            window_width: 1280,
            window_height: 720,
        }
    }
}

impl CloudConfig {
    /// Create a config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a RON config file. Missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse a config from RON text.
    pub fn from_ron(text: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(text)
    }

    /// Set the field size.
    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    /// Set the noise scale.
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Set the noise kind and seed.
    pub fn with_noise(mut self, noise: NoiseKind, seed: u32) -> Self {
        self.noise = noise;
        self.seed = seed;
        self
    }

    /// Set the initial render parameters.
    pub fn with_params(mut self, params: RenderParameters) -> Self {
        self.params = params;
        self
    }

    /// Check values the generator and renderer cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_FIELD_SIZE..=MAX_FIELD_SIZE).contains(&self.size) {
            return Err(ConfigError::Invalid {
                field: "size",
                reason: format!(
                    "must be between {} and {}, got {}",
                    MIN_FIELD_SIZE, MAX_FIELD_SIZE, self.size
                ),
            });
        }
        if !self.scale.is_finite() {
            return Err(ConfigError::Invalid {
                field: "scale",
                reason: format!("must be finite, got {}", self.scale),
            });
        }
        if !self.anisotropy.is_finite() || self.anisotropy == 0.0 {
            return Err(ConfigError::Invalid {
                field: "anisotropy",
                reason: format!("must be finite and non-zero, got {}", self.anisotropy),
            });
        }
        if !(self.max_pixel_ratio > 0.0) {
            return Err(ConfigError::Invalid {
                field: "max_pixel_ratio",
                reason: format!("must be positive, got {}", self.max_pixel_ratio),
            });
        }
        Ok(())
    }

    /// Generator configured from this config.
    pub fn generator(&self) -> DensityFieldGenerator {
        DensityFieldGenerator::new(self.size)
            .with_scale(self.scale)
            .with_anisotropy(self.anisotropy)
    }

    /// Base tint as RGB in `[0, 1]`.
    pub fn base_rgb(&self) -> Vec3 {
        hex_to_rgb(self.base_color)
    }

    /// Background as RGB in `[0, 1]`.
    pub fn clear_rgb(&self) -> Vec3 {
        hex_to_rgb(self.clear_color)
    }

    /// Overlay command-line flags that were given.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(size) = args.size {
            self.size = size;
        }
        if let Some(scale) = args.scale {
            self.scale = scale;
        }
        if let Some(noise) = args.noise {
            self.noise = noise;
        }
        if let Some(seed) = args.seed {
            self.seed = seed;
        }
        if let Some(steps) = args.steps {
            self.params.steps = steps;
        }
    }
}

/// Convert `0xRRGGBB` to RGB components in `[0, 1]`.
pub fn hex_to_rgb(hex: u32) -> Vec3 {
    Vec3::new(
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    )
}

/// Command-line flags.
#[derive(Parser, Debug)]
#[command(name = "gascloud", version, about = "Ray-marched volumetric gas cloud")]
pub struct Args {
    /// RON config file to load before applying flags.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Density grid resolution per axis.
    #[arg(long)]
    pub size: Option<u32>,

    /// Noise frequency scale.
    #[arg(long)]
    pub scale: Option<f64>,

    /// Noise function.
    #[arg(long, value_enum)]
    pub noise: Option<NoiseKind>,

    /// Seed for the seeded noise functions.
    #[arg(long)]
    pub seed: Option<u32>,

    /// Initial ray march steps.
    #[arg(long)]
    pub steps: Option<u32>,

    /// Render one frame on the CPU to this PNG and exit (no window).
    #[arg(long)]
    pub snapshot: Option<PathBuf>,

    /// Snapshot width in pixels.
    #[arg(long, default_value_t = 640)]
    pub snapshot_width: u32,

    /// Snapshot height in pixels.
    #[arg(long, default_value_t = 360)]
    pub snapshot_height: u32,
}

impl Args {
    /// Resolve the final config: defaults, then file, then flags.
    pub fn resolve(&self) -> Result<CloudConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => CloudConfig::load(path)?,
            None => CloudConfig::default(),
        };
        config.apply_args(self);
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CloudConfig::new();
        assert_eq!(config.size, 128);
        assert_eq!(config.base_color, 0x6e00cc);
        assert_eq!(config.noise, NoiseKind::Improved);
        assert_eq!(config.params, RenderParameters::default());
        assert!((config.spin_rate - 1.0 / 7.5).abs() < 1e-6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_ron_partial() {
        let config = CloudConfig::from_ron("(size: 64, noise: fbm, seed: 9, params: (steps: 150))").unwrap();
        assert_eq!(config.size, 64);
        assert_eq!(config.noise, NoiseKind::Fbm);
        assert_eq!(config.seed, 9);
        assert_eq!(config.params.steps, 150);
        assert_eq!(config.params.threshold, 0.25);
        assert_eq!(config.window_width, 1280);
    }

    #[test]
    fn test_sample_config_parses() {
        let config = CloudConfig::from_ron(include_str!("../gascloud.ron")).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.size, 128);
        assert_eq!(config.base_color, 0x6e00cc);
        assert_eq!(config.params, RenderParameters::default());
    }

    #[test]
    fn test_from_ron_rejects_garbage() {
        assert!(CloudConfig::from_ron("(size: \"big\")").is_err());
    }

    #[test]
    fn test_validate_size() {
        assert!(CloudConfig::new().with_size(1).validate().is_err());
        assert!(CloudConfig::new().with_size(512).validate().is_err());
        assert!(CloudConfig::new().with_size(2).validate().is_ok());
    }

    #[test]
    fn test_validate_anisotropy() {
        let mut config = CloudConfig::new();
        config.anisotropy = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "anisotropy", .. })
        ));
    }

    #[test]
    fn test_hex_to_rgb() {
        let rgb = hex_to_rgb(0x6e00cc);
        assert!((rgb.x - 110.0 / 255.0).abs() < 1e-6);
        assert_eq!(rgb.y, 0.0);
        assert!((rgb.z - 204.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_args_override() {
        let args = Args::parse_from(["gascloud", "--size", "32", "--noise", "perlin", "--seed", "3", "--steps", "20"]);
        let config = args.resolve().unwrap();
        assert_eq!(config.size, 32);
        assert_eq!(config.noise, NoiseKind::Perlin);
        assert_eq!(config.seed, 3);
        assert_eq!(config.params.steps, 20);
    }

    #[test]
    fn test_args_invalid_size() {
        let args = Args::parse_from(["gascloud", "--size", "1000"]);
        assert!(args.resolve().is_err());
    }

    #[test]
    fn test_missing_config_file() {
        let args = Args::parse_from(["gascloud", "--config", "/definitely/not/here.ron"]);
        assert!(matches!(args.resolve(), Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_generator_from_config() {
        let gen = CloudConfig::new().with_size(16).with_scale(0.1).generator();
        assert_eq!(gen.size, 16);
        assert!((gen.scale - 0.1).abs() < 1e-12);
    }
}
