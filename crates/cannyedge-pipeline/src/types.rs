//! Shared types for the cannyedge pipeline.

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate raster data without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbaImage` so downstream crates can reference the
/// original frame and rendered stages without depending on `image`
/// directly.
pub use image::RgbaImage;

/// Single-channel `f32` raster used for gradient fields.
pub type FloatImage = image::ImageBuffer<image::Luma<f32>, Vec<f32>>;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of an image buffer.
    #[must_use]
    pub fn of<P: image::Pixel, C: std::ops::Deref<Target = [P::Subpixel]>>(
        image: &image::ImageBuffer<P, C>,
    ) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    /// Total pixel count (`width * height`).
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Odd Gaussian kernel size in `[MIN, MAX]`.
///
/// Construction never fails: even values are bumped to the next odd
/// value and the result is clamped into range, so `4` becomes `5` and
/// `26` becomes `25`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub struct KernelSize(u32);

impl KernelSize {
    /// Smallest accepted kernel size.
    pub const MIN: Self = Self(3);
    /// Largest accepted kernel size.
    pub const MAX: Self = Self(25);
    /// Kernel size used until the user picks another one.
    pub const DEFAULT: Self = Self(5);

    /// Normalize a requested size to the nearest odd value in range.
    #[must_use]
    pub fn new(requested: i32) -> Self {
        let odd = if requested % 2 == 0 {
            requested.saturating_add(1)
        } else {
            requested
        };
        #[allow(clippy::cast_possible_wrap)]
        let clamped = odd.clamp(Self::MIN.0 as i32, Self::MAX.0 as i32);
        #[allow(clippy::cast_sign_loss)]
        Self(clamped as u32)
    }

    /// The kernel width in pixels.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Half-width of the kernel (`(size - 1) / 2`).
    #[must_use]
    pub const fn radius(self) -> u32 {
        (self.0 - 1) / 2
    }
}

impl Default for KernelSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<i32> for KernelSize {
    fn from(requested: i32) -> Self {
        Self::new(requested)
    }
}

impl From<KernelSize> for i32 {
    fn from(size: KernelSize) -> Self {
        #[allow(clippy::cast_possible_wrap)]
        let value = size.0 as Self;
        value
    }
}

/// A threshold that is either derived from the image or set by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Threshold {
    /// Use the value from [`AutoThresholds`].
    #[default]
    Auto,
    /// Use this exact value.
    Override(u8),
}

impl Threshold {
    /// Build a threshold from an optional raw value, clamping into `0..=255`.
    #[must_use]
    pub fn from_option(value: Option<i32>) -> Self {
        value.map_or(Self::Auto, |v| {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let byte = v.clamp(0, 255) as u8;
            Self::Override(byte)
        })
    }

    /// The override value, if any.
    #[must_use]
    pub const fn override_value(self) -> Option<u8> {
        match self {
            Self::Auto => None,
            Self::Override(v) => Some(v),
        }
    }

    /// Resolve against an automatically derived value.
    #[must_use]
    pub const fn resolve(self, auto: u8) -> u8 {
        match self {
            Self::Auto => auto,
            Self::Override(v) => v,
        }
    }
}

/// Low/high thresholds suggested by the auto-threshold estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AutoThresholds {
    /// Suggested low threshold.
    pub low: u8,
    /// Suggested high threshold.
    pub high: u8,
}

impl AutoThresholds {
    /// Values reported before the first suppression stage has run.
    pub const INITIAL: Self = Self { low: 40, high: 100 };
}

impl Default for AutoThresholds {
    fn default() -> Self {
        Self::INITIAL
    }
}

/// Thresholds actually used by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EffectiveThresholds {
    /// Pixels at or above this value (and below `high`) are weak.
    pub low: u8,
    /// Pixels at or above this value are strong.
    pub high: u8,
}

/// User-tunable pipeline parameters.
///
/// # Threshold invariant
///
/// When both thresholds are overrides, `low <= high`. [`set_thresholds`]
/// swaps an inverted pair at assignment time. When only one side is
/// overridden the effective pair may be inverted against the auto value;
/// the classifier then has an empty weak band, which is well defined.
///
/// [`set_thresholds`]: Self::set_thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PipelineParameters {
    /// Gaussian smoothing kernel size.
    pub kernel_size: KernelSize,

    /// Low hysteresis threshold.
    pub low_threshold: Threshold,

    /// High hysteresis threshold.
    pub high_threshold: Threshold,
}

impl PipelineParameters {
    /// Set both thresholds from optional raw values.
    ///
    /// Values are clamped into `0..=255`; `None` means auto. If both are
    /// present and `low > high` they are swapped.
    pub fn set_thresholds(&mut self, low: Option<i32>, high: Option<i32>) {
        let (low, high) = match (Threshold::from_option(low), Threshold::from_option(high)) {
            (Threshold::Override(l), Threshold::Override(h)) if l > h => {
                (Threshold::Override(h), Threshold::Override(l))
            }
            pair => pair,
        };
        self.low_threshold = low;
        self.high_threshold = high;
    }

    /// Restore the threshold invariant on a directly constructed value:
    /// two inverted overrides are swapped.
    #[must_use]
    pub const fn normalized(self) -> Self {
        match (self.low_threshold, self.high_threshold) {
            (Threshold::Override(l), Threshold::Override(h)) if l > h => Self {
                low_threshold: Threshold::Override(h),
                high_threshold: Threshold::Override(l),
                ..self
            },
            _ => self,
        }
    }

    /// Resolve the effective thresholds against the auto suggestion.
    #[must_use]
    pub const fn effective(&self, auto: AutoThresholds) -> EffectiveThresholds {
        EffectiveThresholds {
            low: self.low_threshold.resolve(auto.low),
            high: self.high_threshold.resolve(auto.high),
        }
    }
}

/// Errors that can occur during pipeline processing.
///
/// Parameter values are never errors: they are normalized on
/// assignment. Cancellation is not an error either; see
/// [`RunOutcome`](crate::orchestrator::RunOutcome).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// The frame has zero width or height.
    #[error("frame is empty ({width}x{height})")]
    EmptyFrame {
        /// Declared width.
        width: u32,
        /// Declared height.
        height: u32,
    },

    /// The pixel buffer length does not match the declared geometry.
    #[error("frame buffer holds {actual} bytes, expected {expected}")]
    BufferSizeMismatch {
        /// Bytes implied by width, height, and pixel format.
        expected: usize,
        /// Bytes actually supplied.
        actual: usize,
    },

    /// The frame has a channel count the pipeline cannot convert.
    #[error("unsupported channel count: {0}")]
    UnsupportedChannels(u8),

    /// Two rasters that must share dimensions do not.
    #[error("dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        /// Dimensions of the reference raster.
        expected: Dimensions,
        /// Dimensions of the offending raster.
        actual: Dimensions,
    },

    /// A stage failed to produce its output.
    #[error("stage computation failed: {0}")]
    Compute(String),
}

impl PipelineError {
    /// Whether the error was caused by a malformed input frame rather
    /// than a failure inside a stage.
    #[must_use]
    pub const fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyFrame { .. } | Self::BufferSizeMismatch { .. } | Self::UnsupportedChannels(_)
        )
    }
}

/// Check that `actual` matches `expected`, returning
/// [`PipelineError::DimensionMismatch`] otherwise.
pub(crate) fn ensure_same_dimensions(
    expected: Dimensions,
    actual: Dimensions,
) -> Result<(), PipelineError> {
    if expected == actual {
        Ok(())
    } else {
        Err(PipelineError::DimensionMismatch { expected, actual })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn even_kernel_size_rounds_up_to_odd() {
        assert_eq!(KernelSize::new(4).get(), 5);
        assert_eq!(KernelSize::new(6).get(), 7);
    }

    #[test]
    fn kernel_size_clamps_to_range() {
        assert_eq!(KernelSize::new(26).get(), 25);
        assert_eq!(KernelSize::new(1000).get(), 25);
        assert_eq!(KernelSize::new(1).get(), 3);
        assert_eq!(KernelSize::new(-8).get(), 3);
        assert_eq!(KernelSize::new(i32::MAX).get(), 25);
    }

    #[test]
    fn odd_kernel_sizes_in_range_are_kept() {
        for k in (3..=25).step_by(2) {
            assert_eq!(KernelSize::new(k).get(), u32::try_from(k).unwrap());
        }
    }

    #[test]
    fn kernel_radius() {
        assert_eq!(KernelSize::new(3).radius(), 1);
        assert_eq!(KernelSize::new(25).radius(), 12);
    }

    #[test]
    fn inverted_threshold_overrides_are_swapped() {
        let mut params = PipelineParameters::default();
        params.set_thresholds(Some(200), Some(50));
        assert_eq!(params.low_threshold, Threshold::Override(50));
        assert_eq!(params.high_threshold, Threshold::Override(200));
    }

    #[test]
    fn threshold_overrides_are_clamped() {
        let mut params = PipelineParameters::default();
        params.set_thresholds(Some(-20), Some(900));
        assert_eq!(params.low_threshold, Threshold::Override(0));
        assert_eq!(params.high_threshold, Threshold::Override(255));
    }

    #[test]
    fn single_override_is_not_swapped() {
        let mut params = PipelineParameters::default();
        params.set_thresholds(Some(200), None);
        assert_eq!(params.low_threshold, Threshold::Override(200));
        assert_eq!(params.high_threshold, Threshold::Auto);
    }

    #[test]
    fn normalized_swaps_inverted_overrides() {
        let params = PipelineParameters {
            low_threshold: Threshold::Override(90),
            high_threshold: Threshold::Override(10),
            ..PipelineParameters::default()
        };
        let fixed = params.normalized();
        assert_eq!(fixed.low_threshold, Threshold::Override(10));
        assert_eq!(fixed.high_threshold, Threshold::Override(90));
        assert_eq!(fixed.normalized(), fixed);
    }

    #[test]
    fn effective_thresholds_prefer_overrides() {
        let mut params = PipelineParameters::default();
        let auto = AutoThresholds { low: 26, high: 64 };
        assert_eq!(params.effective(auto), EffectiveThresholds { low: 26, high: 64 });

        params.set_thresholds(None, Some(120));
        assert_eq!(params.effective(auto), EffectiveThresholds { low: 26, high: 120 });
    }

    #[test]
    fn defaults_match_configuration_surface() {
        let params = PipelineParameters::default();
        assert_eq!(params.kernel_size.get(), 5);
        assert_eq!(params.low_threshold, Threshold::Auto);
        assert_eq!(params.high_threshold, Threshold::Auto);
        assert_eq!(AutoThresholds::default(), AutoThresholds { low: 40, high: 100 });
    }

    #[test]
    fn parameters_json_roundtrip_normalizes_kernel_size() {
        let json = r#"{"kernel_size":8,"low_threshold":"Auto","high_threshold":{"Override":90}}"#;
        let params: PipelineParameters = serde_json::from_str(json).unwrap();
        assert_eq!(params.kernel_size.get(), 9);
        assert_eq!(params.high_threshold, Threshold::Override(90));

        let back = serde_json::to_string(&params).unwrap();
        let again: PipelineParameters = serde_json::from_str(&back).unwrap();
        assert_eq!(params, again);
    }

    #[test]
    fn input_errors_are_classified() {
        assert!(PipelineError::EmptyFrame { width: 0, height: 3 }.is_input_error());
        assert!(
            PipelineError::BufferSizeMismatch {
                expected: 4,
                actual: 3
            }
            .is_input_error()
        );
        assert!(!PipelineError::Compute("boom".into()).is_input_error());
    }
}
