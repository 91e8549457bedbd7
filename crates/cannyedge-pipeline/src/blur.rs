//! Gaussian smoothing for noise reduction before gradient estimation.
//!
//! The kernel width is chosen by the user ([`KernelSize`]); sigma is
//! derived from it with [`sigma_for`]. Convolution is separable
//! (horizontal pass, then vertical pass) and keeps the intermediate
//! pass in `f32`, rounding once at the end.
//!
//! # Border policy
//!
//! Samples outside the image replicate the nearest edge pixel
//! (clamp-to-edge), so a uniform image stays uniform and the output has
//! the same dimensions as the input.

use image::{GrayImage, Luma};
use imageproc::filter::separable_filter_equal;

use crate::types::{FloatImage, KernelSize};

/// Sigma for a kernel of the given size.
///
/// `0.3 * ((k - 1) / 2 - 1) + 0.8`, the conventional rule for deriving
/// sigma when only the aperture is specified. `k = 3` gives `0.8`,
/// `k = 5` gives `1.1`, `k = 25` gives `4.1`.
#[must_use]
pub fn sigma_for(kernel: KernelSize) -> f32 {
    #[allow(clippy::cast_precision_loss)]
    let half = kernel.radius() as f32;
    0.3f32.mul_add(half - 1.0, 0.8)
}

/// Normalized 1D Gaussian weights for `kernel`, centre at index
/// `kernel.radius()`.
#[must_use]
pub fn gaussian_kernel(kernel: KernelSize) -> Vec<f32> {
    let sigma = sigma_for(kernel);
    let denom = 2.0 * sigma * sigma;
    #[allow(clippy::cast_possible_wrap)]
    let radius = kernel.radius() as i32;
    let weights: Vec<f32> = (-radius..=radius)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let d = i as f32;
            (-(d * d) / denom).exp()
        })
        .collect();
    let sum: f32 = weights.iter().sum();
    weights.into_iter().map(|w| w / sum).collect()
}

/// Smooth a grayscale image with a separable Gaussian of width `kernel`.
///
/// Both passes run on an `f32` copy through
/// [`imageproc::filter::separable_filter_equal`], which pads by
/// continuity. The result is rounded to `u8` once, after the vertical
/// pass.
#[must_use = "returns the smoothed image"]
pub fn gaussian_smooth(image: &GrayImage, kernel: KernelSize) -> GrayImage {
    let weights = gaussian_kernel(kernel);
    let samples = FloatImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([f32::from(image.get_pixel(x, y).0[0])])
    });
    let smoothed = separable_filter_equal(&samples, &weights);
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let value = smoothed.get_pixel(x, y).0[0];
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let byte = value.round().clamp(0.0, 255.0) as u8;
        Luma([byte])
    })
}
