//! Luminance conversion.
//!
//! This is the first numeric stage: an RGBA frame in, a single-channel
//! `GrayImage` of the same size out. Alpha is ignored.

use image::GrayImage;

use crate::types::RgbaImage;

/// Fixed-point BT.601 weights scaled by `2^14`.
///
/// `0.299 R + 0.587 G + 0.114 B`, rounded so the weights sum to exactly
/// `1 << 14`. A pixel with `R == G == B` therefore maps to itself.
const WEIGHT_R: u32 = 4899;
const WEIGHT_G: u32 = 9617;
const WEIGHT_B: u32 = 1868;
const SHIFT: u32 = 14;
const _: () = assert!(WEIGHT_R + WEIGHT_G + WEIGHT_B == 1 << SHIFT);

/// BT.601 luma of a single RGB triple, rounded half up.
#[must_use]
pub const fn luma(r: u8, g: u8, b: u8) -> u8 {
    let sum = r as u32 * WEIGHT_R + g as u32 * WEIGHT_G + b as u32 * WEIGHT_B + (1 << (SHIFT - 1));
    #[allow(clippy::cast_possible_truncation)]
    let value = (sum >> SHIFT) as u8;
    value
}

/// Convert an RGBA image to single-channel luminance.
#[must_use = "returns the grayscale image"]
pub fn to_grayscale(image: &RgbaImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, _] = image.get_pixel(x, y).0;
        image::Luma([luma(r, g, b)])
    })
}
