//! Non-maximum suppression.
//!
//! Thins gradient ridges to single-pixel width by keeping only pixels
//! whose magnitude is at least that of both neighbors along the
//! gradient direction. Comparisons use `>=`, so two equal neighboring
//! peaks both survive.

use image::{GrayImage, Luma};

use crate::gradient::{Gradients, normalize};
use crate::types::{Dimensions, FloatImage, PipelineError, ensure_same_dimensions};

/// Gradient direction quantized to one of four neighbor axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sector {
    /// `[0, 22.5)` and `[157.5, 180)` degrees: left and right.
    Horizontal,
    /// `[22.5, 67.5)` degrees: up-right and down-left.
    Rising,
    /// `[67.5, 112.5)` degrees: up and down.
    Vertical,
    /// `[112.5, 157.5)` degrees: up-left and down-right.
    Falling,
}

impl Sector {
    /// Quantize a direction in radians.
    ///
    /// The angle is folded into `[0, 180)` degrees first, since the
    /// two neighbors compared for `theta` and `theta + 180` are the same.
    #[must_use]
    pub fn from_radians(theta: f32) -> Self {
        let degrees = theta.to_degrees().rem_euclid(180.0);
        if degrees < 22.5 || degrees >= 157.5 {
            Self::Horizontal
        } else if degrees < 67.5 {
            Self::Rising
        } else if degrees < 112.5 {
            Self::Vertical
        } else {
            Self::Falling
        }
    }

    /// `(dx, dy)` offsets of the two compared neighbors, in image
    /// coordinates (row 0 at the top).
    #[must_use]
    pub const fn neighbor_offsets(self) -> [(i32, i32); 2] {
        match self {
            Self::Horizontal => [(-1, 0), (1, 0)],
            Self::Rising => [(1, -1), (-1, 1)],
            Self::Vertical => [(0, -1), (0, 1)],
            Self::Falling => [(-1, -1), (1, 1)],
        }
    }
}

/// Suppress non-maxima in `magnitude` along `direction`.
///
/// Survivors are scaled with the same normalization as the magnitude
/// display; everything else, including the one-pixel border and any
/// pixel with zero magnitude, is 0.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if the two fields differ
/// in size.
pub fn suppress(
    magnitude: &FloatImage,
    direction: &FloatImage,
    max_magnitude: f32,
) -> Result<GrayImage, PipelineError> {
    let dimensions = Dimensions::of(magnitude);
    ensure_same_dimensions(dimensions, Dimensions::of(direction))?;

    let (w, h) = (magnitude.width(), magnitude.height());
    let mut out = GrayImage::new(w, h);
    if w < 3 || h < 3 {
        return Ok(out);
    }

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let m = magnitude.get_pixel(x, y).0[0];
            if m <= 0.0 {
                continue;
            }
            let sector = Sector::from_radians(direction.get_pixel(x, y).0[0]);
            let is_max = sector.neighbor_offsets().iter().all(|&(dx, dy)| {
                let nx = x.saturating_add_signed(dx);
                let ny = y.saturating_add_signed(dy);
                m >= magnitude.get_pixel(nx, ny).0[0]
            });
            if is_max {
                out.put_pixel(x, y, Luma([normalize(m, max_magnitude)]));
            }
        }
    }
    Ok(out)
}

/// [`suppress`] applied to a [`Gradients`] bundle.
///
/// # Errors
///
/// See [`suppress`].
pub fn suppress_gradients(gradients: &Gradients) -> Result<GrayImage, PipelineError> {
    suppress(
        &gradients.magnitude,
        &gradients.direction,
        gradients.max_magnitude,
    )
}
