//! Auto-threshold estimation and double-threshold classification.

use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

use crate::types::{AutoThresholds, Dimensions, EffectiveThresholds};

/// Display byte for a suppressed pixel.
pub const SUPPRESSED: u8 = 0;
/// Display byte for a weak pixel.
pub const WEAK: u8 = 75;
/// Display byte for a strong pixel (and for a final edge pixel).
pub const STRONG: u8 = 255;

/// Floor for the auto high threshold, so a faint image is not flooded.
const MIN_AUTO_HIGH: f32 = 30.0;
/// Auto high threshold as a fraction of the brightest suppressed pixel.
const HIGH_FRACTION: f32 = 0.25;
/// Auto low threshold as a fraction of the auto high threshold.
const LOW_FRACTION: f32 = 0.4;

/// Suggest thresholds from the suppression output.
///
/// `high = clamp(round(max(30, 0.25 * max)), 1, 255)` and
/// `low = max(1, round(0.4 * high))`.
#[must_use]
pub fn estimate_auto(suppressed: &GrayImage) -> AutoThresholds {
    let max = suppressed.pixels().map(|p| p.0[0]).max().unwrap_or(0);
    let high = MIN_AUTO_HIGH
        .max(HIGH_FRACTION * f32::from(max))
        .round()
        .clamp(1.0, 255.0);
    let low = (LOW_FRACTION * high).round().max(1.0);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let thresholds = AutoThresholds {
        low: low as u8,
        high: high as u8,
    };
    thresholds
}

/// Label assigned to each pixel by the double threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelClass {
    /// Below the low threshold.
    #[default]
    Suppressed,
    /// At or above the low threshold but below the high one.
    Weak,
    /// At or above the high threshold.
    Strong,
}

impl PixelClass {
    /// Classify one value. `value >= high` wins over `value >= low`.
    #[must_use]
    pub const fn of(value: u8, thresholds: EffectiveThresholds) -> Self {
        if value >= thresholds.high {
            Self::Strong
        } else if value >= thresholds.low {
            Self::Weak
        } else {
            Self::Suppressed
        }
    }

    /// Byte used when the class map is displayed.
    #[must_use]
    pub const fn sentinel(self) -> u8 {
        match self {
            Self::Suppressed => SUPPRESSED,
            Self::Weak => WEAK,
            Self::Strong => STRONG,
        }
    }
}

/// Per-class pixel counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClassCounts {
    /// Strong pixels.
    pub strong: u64,
    /// Weak pixels.
    pub weak: u64,
    /// Suppressed pixels.
    pub suppressed: u64,
}

/// Row-major grid of [`PixelClass`] labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMap {
    dimensions: Dimensions,
    classes: Vec<PixelClass>,
}

impl ClassMap {
    /// A map where every pixel is [`PixelClass::Suppressed`].
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            dimensions: Dimensions { width, height },
            classes: vec![PixelClass::Suppressed; width as usize * height as usize],
        }
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.dimensions.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.dimensions.height
    }

    /// Map dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Label at `(x, y)`, or `None` outside the map.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<PixelClass> {
        if x >= self.dimensions.width || y >= self.dimensions.height {
            return None;
        }
        self.classes
            .get(y as usize * self.dimensions.width as usize + x as usize)
            .copied()
    }

    /// Overwrite the label at `(x, y)`. Out-of-range coordinates are ignored.
    pub fn set(&mut self, x: u32, y: u32, class: PixelClass) {
        if x >= self.dimensions.width || y >= self.dimensions.height {
            return;
        }
        let i = y as usize * self.dimensions.width as usize + x as usize;
        if let Some(slot) = self.classes.get_mut(i) {
            *slot = class;
        }
    }

    /// Labels in row-major order.
    #[must_use]
    pub fn as_slice(&self) -> &[PixelClass] {
        &self.classes
    }

    /// Count pixels of each class.
    #[must_use]
    pub fn counts(&self) -> ClassCounts {
        self.classes
            .iter()
            .fold(ClassCounts::default(), |mut counts, class| {
                match class {
                    PixelClass::Strong => counts.strong += 1,
                    PixelClass::Weak => counts.weak += 1,
                    PixelClass::Suppressed => counts.suppressed += 1,
                }
                counts
            })
    }

    /// Render labels as sentinel bytes (0, 75, 255).
    #[must_use = "returns the display image"]
    pub fn to_image(&self) -> GrayImage {
        GrayImage::from_fn(self.dimensions.width, self.dimensions.height, |x, y| {
            Luma([self.get(x, y).unwrap_or_default().sentinel()])
        })
    }
}

/// Label every pixel of the suppression output.
#[must_use]
pub fn classify(suppressed: &GrayImage, thresholds: EffectiveThresholds) -> ClassMap {
    ClassMap {
        dimensions: Dimensions::of(suppressed),
        classes: suppressed
            .pixels()
            .map(|p| PixelClass::of(p.0[0], thresholds))
            .collect(),
    }
}
