//! Frame-source boundary: raw pixel buffers in, oriented RGBA out.
//!
//! Camera plumbing (YUV conversion, plane strides) stays with the
//! frame source. By the time a [`SourceFrame`] reaches the pipeline it
//! is packed 8-bit luminance, RGB, or RGBA. [`SourceFrame::into_rgba`]
//! validates the geometry and produces the Original stage image.
//!
//! [`apply_orientation`] is offered to frame sources so every caller
//! rotates and mirrors frames the same way: rotate clockwise first,
//! then flip horizontally for front-facing cameras.

use image::buffer::ConvertBuffer;
use image::{ImageBuffer, Luma, Rgb};
use serde::{Deserialize, Serialize};

use crate::types::{PipelineError, RgbaImage};

/// Packed 8-bit pixel layout of a [`SourceFrame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// One luminance byte per pixel.
    Luma8,
    /// Three bytes per pixel: red, green, blue.
    Rgb8,
    /// Four bytes per pixel: red, green, blue, alpha.
    Rgba8,
}

impl PixelFormat {
    /// Bytes per pixel.
    #[must_use]
    pub const fn channels(self) -> u8 {
        match self {
            Self::Luma8 => 1,
            Self::Rgb8 => 3,
            Self::Rgba8 => 4,
        }
    }

    /// Pick the format for a packed buffer with `channels` bytes per pixel.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UnsupportedChannels`] for anything other
    /// than 1, 3, or 4 channels.
    pub const fn from_channels(channels: u8) -> Result<Self, PipelineError> {
        match channels {
            1 => Ok(Self::Luma8),
            3 => Ok(Self::Rgb8),
            4 => Ok(Self::Rgba8),
            other => Err(PipelineError::UnsupportedChannels(other)),
        }
    }
}

/// A frame as delivered by the capture subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFrame {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Layout of `data`.
    pub format: PixelFormat,
    /// Row-major packed pixel bytes, no row padding.
    pub data: Vec<u8>,
}

impl SourceFrame {
    /// Wrap an existing RGBA image.
    #[must_use]
    pub fn from_rgba(image: RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            format: PixelFormat::Rgba8,
            data: image.into_raw(),
        }
    }

    /// Number of bytes the declared geometry requires.
    #[must_use]
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * usize::from(self.format.channels())
    }

    /// Validate the frame and convert it to RGBA.
    ///
    /// Luminance frames are replicated into R, G, and B; alpha is set
    /// to 255 for formats without it.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyFrame`] if either dimension is zero
    /// and [`PipelineError::BufferSizeMismatch`] if `data` is not exactly
    /// `width * height * channels` bytes.
    pub fn into_rgba(self) -> Result<RgbaImage, PipelineError> {
        if self.width == 0 || self.height == 0 {
            return Err(PipelineError::EmptyFrame {
                width: self.width,
                height: self.height,
            });
        }
        let expected = self.expected_len();
        if self.data.len() != expected {
            return Err(PipelineError::BufferSizeMismatch {
                expected,
                actual: self.data.len(),
            });
        }

        let mismatch = || PipelineError::Compute("frame buffer rejected by image".into());
        let (w, h) = (self.width, self.height);
        match self.format {
            PixelFormat::Rgba8 => RgbaImage::from_raw(w, h, self.data).ok_or_else(mismatch),
            PixelFormat::Rgb8 => ImageBuffer::<Rgb<u8>, Vec<u8>>::from_raw(w, h, self.data)
                .map(|rgb| -> RgbaImage { rgb.convert() })
                .ok_or_else(mismatch),
            PixelFormat::Luma8 => ImageBuffer::<Luma<u8>, Vec<u8>>::from_raw(w, h, self.data)
                .map(|gray| -> RgbaImage { gray.convert() })
                .ok_or_else(mismatch),
        }
    }
}

/// Clockwise sensor rotation reported by the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rotation {
    /// No rotation.
    #[default]
    Deg0,
    /// Quarter turn clockwise.
    Deg90,
    /// Half turn.
    Deg180,
    /// Three quarter turns clockwise.
    Deg270,
}

impl Rotation {
    /// Map a rotation in degrees to a [`Rotation`].
    ///
    /// Negative values and multiples of 360 are normalized. Returns
    /// `None` for angles that are not a multiple of 90.
    #[must_use]
    pub const fn from_degrees(degrees: i32) -> Option<Self> {
        match degrees.rem_euclid(360) {
            0 => Some(Self::Deg0),
            90 => Some(Self::Deg90),
            180 => Some(Self::Deg180),
            270 => Some(Self::Deg270),
            _ => None,
        }
    }
}

/// How a raw sensor frame must be transformed to appear upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Orientation {
    /// Clockwise rotation to apply.
    pub rotation: Rotation,
    /// Whether to mirror horizontally after rotating (front camera).
    pub mirrored: bool,
}

/// Rotate, then optionally mirror, an RGBA frame.
#[must_use = "returns the reoriented image"]
pub fn apply_orientation(image: &RgbaImage, orientation: Orientation) -> RgbaImage {
    let rotated = match orientation.rotation {
        Rotation::Deg0 => image.clone(),
        Rotation::Deg90 => image::imageops::rotate90(image),
        Rotation::Deg180 => image::imageops::rotate180(image),
        Rotation::Deg270 => image::imageops::rotate270(image),
    };
    if orientation.mirrored {
        image::imageops::flip_horizontal(&rotated)
    } else {
        rotated
    }
}
