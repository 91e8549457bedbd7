//! Display conversion and PNG encoding.
//!
//! Every stage image handed to a display sink is packed RGBA. Single
//! channel results are expanded by replicating luminance into R, G and
//! B with opaque alpha.

use image::ImageEncoder;
use image::buffer::ConvertBuffer;

use crate::types::{GrayImage, RgbaImage};

/// Errors that can occur while encoding a rendered stage.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// PNG encoding failed.
    #[error("PNG encoding failed: {0}")]
    PngEncode(String),
}

impl From<image::ImageError> for RenderError {
    fn from(err: image::ImageError) -> Self {
        Self::PngEncode(err.to_string())
    }
}

/// Expand a single-channel image into displayable RGBA.
#[must_use = "returns the display image"]
pub fn to_display(image: &GrayImage) -> RgbaImage {
    image.convert()
}

/// Encode an RGBA image as PNG bytes.
///
/// # Errors
///
/// Returns [`RenderError::PngEncode`] if the encoder rejects the image.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, RenderError> {
    let mut png_bytes = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
    encoder.write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ExtendedColorType::Rgba8,
    )?;
    Ok(png_bytes)
}
