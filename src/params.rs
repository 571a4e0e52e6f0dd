//! Live-tunable ray march parameters.
//!
//! [`RenderParameters`] is the single record the parameter panel writes and the
//! render step reads. It is passed by reference into each frame; nothing about
//! it is global.

use std::ops::RangeInclusive;

use serde::Deserialize;

/// Slider range for `threshold`.
pub const THRESHOLD_RANGE: RangeInclusive<f32> = 0.0..=1.0;
/// Slider range for `opacity`.
pub const OPACITY_RANGE: RangeInclusive<f32> = 0.0..=1.0;
/// Slider range for `range`.
pub const BAND_RANGE: RangeInclusive<f32> = 0.0..=1.0;
/// Slider range for `steps`.
pub const STEPS_RANGE: RangeInclusive<u32> = 0..=200;
/// Slider increment for the float parameters.
pub const FLOAT_STEP: f64 = 0.01;

/// Parameters consumed by the ray marcher every frame.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct RenderParameters {
    /// Minimum normalized density that contributes to the cloud.
    pub threshold: f32,
    /// Peak per-step coverage.
    pub opacity: f32,
    /// Half-width of the soft band around `threshold`.
    pub range: f32,
    /// Number of equal increments along each ray. `0` renders nothing.
    pub steps: u32,
    /// Rendered frame count. Wraps at `u32::MAX`.
    #[serde(skip)]
    pub frame: u32,
    /// Jitter ray starts per pixel and frame to hide banding.
    pub dither: bool,
}

impl Default for RenderParameters {
    fn default() -> Self {
        Self {
            threshold: 0.25,
            opacity: 0.25,
            range: 0.1,
            steps: 100,
            frame: 0,
            dither: true,
        }
    }
}

impl RenderParameters {
    /// Create parameters with the default cloud look.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the density threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the per-step opacity.
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    /// Set the soft band half-width.
    pub fn with_range(mut self, range: f32) -> Self {
        self.range = range;
        self
    }

    /// Set the number of march steps.
    pub fn with_steps(mut self, steps: u32) -> Self {
        self.steps = steps;
        self
    }

    /// Enable or disable per-pixel jitter.
    pub fn with_dither(mut self, dither: bool) -> Self {
        self.dither = dither;
        self
    }

    /// Copy with every tunable clamped into its slider range.
    ///
    /// NaN floats collapse to the lower bound.
    pub fn sanitized(&self) -> Self {
        Self {
            threshold: clamp_unit(self.threshold, &THRESHOLD_RANGE),
            opacity: clamp_unit(self.opacity, &OPACITY_RANGE),
            range: clamp_unit(self.range, &BAND_RANGE),
            steps: self.steps.clamp(*STEPS_RANGE.start(), *STEPS_RANGE.end()),
            ..*self
        }
    }

    /// Advance the frame counter, wrapping on overflow.
    pub fn advance_frame(&mut self) {
        self.frame = self.frame.wrapping_add(1);
    }
}

fn clamp_unit(value: f32, range: &RangeInclusive<f32>) -> f32 {
    if value.is_nan() {
        *range.start()
    } else {
        value.clamp(*range.start(), *range.end())
    }
}
