//! Sobel gradient estimation.
//!
//! Produces horizontal and vertical derivatives, the gradient magnitude
//! and the gradient direction for every pixel of the smoothed image.
//!
//! # Conventions
//!
//! - `gx` is positive when intensity increases to the right.
//! - `gy` is positive when intensity increases toward row 0 (upward on
//!   screen), so `direction = atan2(gy, gx)` is measured
//!   counter-clockwise from the positive x axis as displayed.
//! - The outermost one-pixel ring is not computed: `gx`, `gy`,
//!   magnitude and direction are all `0.0` there.

use image::{GrayImage, Luma};
use imageproc::filter::filter_clamped;
use imageproc::kernel;

use crate::types::{Dimensions, FloatImage, PipelineError};

/// Gradient fields of one image.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradients {
    /// Horizontal derivative.
    pub gx: FloatImage,
    /// Vertical derivative (positive upward).
    pub gy: FloatImage,
    /// `hypot(gx, gy)`.
    pub magnitude: FloatImage,
    /// `atan2(gy, gx)` in radians, in `(-pi, pi]`.
    pub direction: FloatImage,
    /// Largest value in `magnitude`, `0.0` for a flat image.
    pub max_magnitude: f32,
}

impl Gradients {
    /// Dimensions shared by all four fields.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::of(&self.magnitude)
    }
}

/// Scale a magnitude into `0..=255` against the frame maximum.
///
/// `round(value * 255 / max(1, max_magnitude))`, clamped. Shared by the
/// magnitude display and the suppression output so both stages render
/// on the same scale.
pub(crate) fn normalize(value: f32, max_magnitude: f32) -> u8 {
    let scaled = value * 255.0 / max_magnitude.max(1.0);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let byte = scaled.round().clamp(0.0, 255.0) as u8;
    byte
}

fn float_image(dimensions: Dimensions, data: Vec<f32>) -> Result<FloatImage, PipelineError> {
    FloatImage::from_raw(dimensions.width, dimensions.height, data)
        .ok_or_else(|| PipelineError::Compute("gradient buffer has wrong length".into()))
}

/// Apply the 3x3 Sobel operator to the interior of `image`.
///
/// Derivatives come from [`imageproc::filter::filter_clamped`] with the
/// Sobel kernels. The vertical response is negated for the upward `gy`
/// convention and the border ring is left at zero.
///
/// # Errors
///
/// Returns [`PipelineError::Compute`] if an output buffer cannot be
/// assembled.
pub fn compute(image: &GrayImage) -> Result<Gradients, PipelineError> {
    let dimensions = Dimensions::of(image);
    let (w, h) = (image.width(), image.height());
    let horizontal = filter_clamped::<_, i32, i16>(image, kernel::SOBEL_HORIZONTAL_3X3);
    let vertical = filter_clamped::<_, i32, i16>(image, kernel::SOBEL_VERTICAL_3X3);

    let len = w as usize * h as usize;
    let mut gx = Vec::with_capacity(len);
    let mut gy = Vec::with_capacity(len);
    let mut magnitude = Vec::with_capacity(len);
    let mut direction = Vec::with_capacity(len);
    let mut max_magnitude = 0.0f32;

    for y in 0..h {
        for x in 0..w {
            let interior = x > 0 && y > 0 && x + 1 < w && y + 1 < h;
            let (dx, dy) = if interior {
                (
                    f32::from(horizontal.get_pixel(x, y).0[0]),
                    f32::from(vertical.get_pixel(x, y).0[0].saturating_neg()),
                )
            } else {
                (0.0, 0.0)
            };
            let m = dx.hypot(dy);
            gx.push(dx);
            gy.push(dy);
            magnitude.push(m);
            direction.push(if interior { dy.atan2(dx) } else { 0.0 });
            max_magnitude = max_magnitude.max(m);
        }
    }

    Ok(Gradients {
        gx: float_image(dimensions, gx)?,
        gy: float_image(dimensions, gy)?,
        magnitude: float_image(dimensions, magnitude)?,
        direction: float_image(dimensions, direction)?,
        max_magnitude,
    })
}

/// 8-bit view of the magnitude field for display.
#[must_use = "returns the display image"]
pub fn magnitude_display(gradients: &Gradients) -> GrayImage {
    let max = gradients.max_magnitude;
    GrayImage::from_fn(
        gradients.magnitude.width(),
        gradients.magnitude.height(),
        |x, y| Luma([normalize(gradients.magnitude.get_pixel(x, y).0[0], max)]),
    )
}
