//! User-selectable display stages.
//!
//! Each [`Stage`] is one point on the stage slider. Selecting a stage
//! means every stage up to and including it is fresh for the current
//! frame and parameters.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stage shown to the user, ordered by slider position.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum Stage {
    /// 0: the source frame, unprocessed.
    #[default]
    Original,
    /// 1: Gaussian-smoothed luminance.
    Smoothed,
    /// 2: normalized gradient magnitude.
    GradientMagnitude,
    /// 3: non-maximum suppression output.
    Suppressed,
    /// 4: hysteresis output.
    FinalEdges,
}

impl Stage {
    /// All stages in slider order.
    pub const ALL: [Self; 5] = [
        Self::Original,
        Self::Smoothed,
        Self::GradientMagnitude,
        Self::Suppressed,
        Self::FinalEdges,
    ];

    /// Largest slider index.
    pub const MAX_INDEX: u8 = 4;

    /// Full display label for the stage.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Original => "Original",
            Self::Smoothed => "Smoothed",
            Self::GradientMagnitude => "Gradient Magnitude",
            Self::Suppressed => "Non-Max Suppressed",
            Self::FinalEdges => "Final Edges",
        }
    }

    /// Short label for compact display.
    #[must_use]
    pub const fn short_label(self) -> &'static str {
        match self {
            Self::Original => "Orig",
            Self::Smoothed => "Blur",
            Self::GradientMagnitude => "Grad",
            Self::Suppressed => "NMS",
            Self::FinalEdges => "Edge",
        }
    }

    /// Slider index (0 to 4).
    #[must_use]
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Stage at a slider index, `None` past [`Self::MAX_INDEX`].
    #[must_use]
    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Original),
            1 => Some(Self::Smoothed),
            2 => Some(Self::GradientMagnitude),
            3 => Some(Self::Suppressed),
            4 => Some(Self::FinalEdges),
            _ => None,
        }
    }

    /// Stage for a raw slider value, clamped into range.
    #[must_use]
    pub fn from_slider(value: i32) -> Self {
        let clamped = value.clamp(0, i32::from(Self::MAX_INDEX));
        u8::try_from(clamped)
            .ok()
            .and_then(Self::from_index)
            .unwrap_or_default()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One numeric step of the pipeline, in execution order.
///
/// Steps are finer than [`Stage`]s: thresholding and tracking both feed
/// [`Stage::FinalEdges`], and grayscale conversion has no stage of its
/// own.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Step {
    /// RGBA to luminance.
    Grayscale,
    /// Gaussian smoothing.
    Smooth,
    /// Sobel gradients.
    Gradient,
    /// Non-maximum suppression and auto-threshold estimation.
    Suppress,
    /// Double-threshold classification.
    Threshold,
    /// Hysteresis tracking.
    Track,
}

impl Step {
    /// All steps in execution order.
    pub const ALL: [Self; 6] = [
        Self::Grayscale,
        Self::Smooth,
        Self::Gradient,
        Self::Suppress,
        Self::Threshold,
        Self::Track,
    ];

    /// Display label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Grayscale => "Grayscale",
            Self::Smooth => "Smoothing",
            Self::Gradient => "Gradient",
            Self::Suppress => "Suppression",
            Self::Threshold => "Threshold",
            Self::Track => "Hysteresis",
        }
    }

    /// The step after this one, `None` after [`Step::Track`].
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Grayscale => Some(Self::Smooth),
            Self::Smooth => Some(Self::Gradient),
            Self::Gradient => Some(Self::Suppress),
            Self::Suppress => Some(Self::Threshold),
            Self::Threshold => Some(Self::Track),
            Self::Track => None,
        }
    }

    /// The step before this one, `None` before [`Step::Grayscale`].
    #[must_use]
    pub const fn previous(self) -> Option<Self> {
        match self {
            Self::Grayscale => None,
            Self::Smooth => Some(Self::Grayscale),
            Self::Gradient => Some(Self::Smooth),
            Self::Suppress => Some(Self::Gradient),
            Self::Threshold => Some(Self::Suppress),
            Self::Track => Some(Self::Threshold),
        }
    }
}

impl Stage {
    /// Last step that must be fresh before this stage can be shown.
    ///
    /// `None` for [`Stage::Original`], which needs no computation.
    #[must_use]
    pub const fn required_step(self) -> Option<Step> {
        match self {
            Self::Original => None,
            Self::Smoothed => Some(Step::Smooth),
            Self::GradientMagnitude => Some(Step::Gradient),
            Self::Suppressed => Some(Step::Suppress),
            Self::FinalEdges => Some(Step::Track),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
