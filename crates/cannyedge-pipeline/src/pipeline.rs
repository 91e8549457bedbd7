//! Typed pipeline: advance step by step, inspecting each intermediate
//! result before continuing.
//!
//! ```rust
//! # use cannyedge_pipeline::{Pipeline, PipelineParameters, PipelineError, RgbaImage};
//! # fn run(frame: RgbaImage) -> Result<(), PipelineError> {
//! let tracked = Pipeline::new(frame, PipelineParameters::default())
//!     .grayscale()
//!     .smooth()
//!     .gradients()?
//!     .suppress()?
//!     .threshold()
//!     .track();
//!
//! let staged = tracked.into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each step consumes `self` and returns the next state, which wraps
//! the previous one, so every intermediate stays reachable through
//! accessors. Skipping a step or running steps out of order is a
//! compile-time error.
//!
//! [`preview`] runs only as far as a selected [`Stage`] needs, which is
//! what live mode does for every accepted frame.

use crate::diagnostics::StageMetrics;
use crate::gradient::Gradients;
use crate::stage::{Stage, Step};
use crate::threshold::ClassMap;
use crate::types::{
    AutoThresholds, Dimensions, EffectiveThresholds, GrayImage, PipelineError, PipelineParameters,
    RgbaImage,
};

/// Entry point for the typed pipeline.
pub struct Pipeline;

impl Pipeline {
    /// Wrap an oriented RGBA frame and a parameter snapshot.
    ///
    /// No processing is performed; call [`.grayscale()`](Pending::grayscale)
    /// to begin.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(original: RgbaImage, parameters: PipelineParameters) -> Pending {
        Pending {
            parameters,
            original,
        }
    }
}

// ───────────────────────── Pending ──────────────────────────

/// Pipeline state before any processing.
#[must_use = "pipeline stages are consumed by advancing; call .grayscale() to continue"]
pub struct Pending {
    parameters: PipelineParameters,
    original: RgbaImage,
}

impl Pending {
    /// The source frame.
    #[must_use]
    pub const fn original(&self) -> &RgbaImage {
        &self.original
    }

    /// Parameter snapshot for this run.
    #[must_use]
    pub const fn parameters(&self) -> &PipelineParameters {
        &self.parameters
    }

    /// Convert to luminance.
    pub fn grayscale(self) -> Grayscaled {
        let gray = crate::grayscale::to_grayscale(&self.original);
        Grayscaled { prev: self, gray }
    }
}

// ───────────────────────── Grayscaled ──────────────────────────

/// Pipeline state after luminance conversion.
#[must_use = "pipeline stages are consumed by advancing; call .smooth() to continue"]
pub struct Grayscaled {
    prev: Pending,
    gray: GrayImage,
}

impl Grayscaled {
    /// The source frame.
    #[must_use]
    pub const fn original(&self) -> &RgbaImage {
        self.prev.original()
    }

    /// Luminance image.
    #[must_use]
    pub const fn gray(&self) -> &GrayImage {
        &self.gray
    }

    /// Apply the Gaussian smoother.
    pub fn smooth(self) -> Smoothed {
        let smoothed =
            crate::blur::gaussian_smooth(&self.gray, self.prev.parameters.kernel_size);
        Smoothed {
            prev: self,
            smoothed,
        }
    }
}

// ───────────────────────── Smoothed ──────────────────────────

/// Pipeline state after Gaussian smoothing.
#[must_use = "pipeline stages are consumed by advancing; call .gradients() to continue"]
pub struct Smoothed {
    prev: Grayscaled,
    smoothed: GrayImage,
}

impl Smoothed {
    /// Smoothed luminance.
    #[must_use]
    pub const fn smoothed(&self) -> &GrayImage {
        &self.smoothed
    }

    /// Estimate Sobel gradients.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Compute`] if the gradient buffers cannot
    /// be assembled.
    pub fn gradients(self) -> Result<GradientsComputed, PipelineError> {
        let gradients = crate::gradient::compute(&self.smoothed)?;
        let magnitude = crate::gradient::magnitude_display(&gradients);
        Ok(GradientsComputed {
            prev: self,
            gradients,
            magnitude,
        })
    }
}

// ───────────────────────── GradientsComputed ──────────────────────────

/// Pipeline state after gradient estimation.
#[must_use = "pipeline stages are consumed by advancing; call .suppress() to continue"]
pub struct GradientsComputed {
    prev: Smoothed,
    gradients: Gradients,
    magnitude: GrayImage,
}

impl GradientsComputed {
    /// Gradient fields.
    #[must_use]
    pub const fn gradients(&self) -> &Gradients {
        &self.gradients
    }

    /// Normalized 8-bit magnitude.
    #[must_use]
    pub const fn magnitude(&self) -> &GrayImage {
        &self.magnitude
    }

    /// Suppress non-maxima and estimate auto thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DimensionMismatch`] if the gradient
    /// fields disagree in size.
    pub fn suppress(self) -> Result<Suppressed, PipelineError> {
        let suppressed = crate::nms::suppress_gradients(&self.gradients)?;
        let auto_thresholds = crate::threshold::estimate_auto(&suppressed);
        Ok(Suppressed {
            prev: self,
            suppressed,
            auto_thresholds,
        })
    }
}

// ───────────────────────── Suppressed ──────────────────────────

/// Pipeline state after non-maximum suppression.
#[must_use = "pipeline stages are consumed by advancing; call .threshold() to continue"]
pub struct Suppressed {
    prev: GradientsComputed,
    suppressed: GrayImage,
    auto_thresholds: AutoThresholds,
}

impl Suppressed {
    /// Thinned magnitude.
    #[must_use]
    pub const fn suppressed(&self) -> &GrayImage {
        &self.suppressed
    }

    /// Thresholds suggested by the suppression output.
    #[must_use]
    pub const fn auto_thresholds(&self) -> AutoThresholds {
        self.auto_thresholds
    }

    /// Thresholds the classifier will use.
    #[must_use]
    pub const fn effective_thresholds(&self) -> EffectiveThresholds {
        self.parameters().effective(self.auto_thresholds)
    }

    const fn parameters(&self) -> &PipelineParameters {
        &self.prev.prev.prev.prev.parameters
    }

    /// Classify every pixel as strong, weak or suppressed.
    pub fn threshold(self) -> Thresholded {
        let effective = self.effective_thresholds();
        let classes = crate::threshold::classify(&self.suppressed, effective);
        Thresholded {
            prev: self,
            effective,
            classes,
        }
    }
}

// ───────────────────────── Thresholded ──────────────────────────

/// Pipeline state after double thresholding.
#[must_use = "pipeline stages are consumed by advancing; call .track() to continue"]
pub struct Thresholded {
    prev: Suppressed,
    effective: EffectiveThresholds,
    classes: ClassMap,
}

impl Thresholded {
    /// Per-pixel labels.
    #[must_use]
    pub const fn classes(&self) -> &ClassMap {
        &self.classes
    }

    /// Thresholds used for classification.
    #[must_use]
    pub const fn effective_thresholds(&self) -> EffectiveThresholds {
        self.effective
    }

    /// Trace edges through weak pixels.
    pub fn track(self) -> Tracked {
        let edges = crate::hysteresis::track(&self.classes);
        Tracked { prev: self, edges }
    }
}

// ───────────────────────── Tracked ──────────────────────────

/// Pipeline state after hysteresis. All steps are complete.
pub struct Tracked {
    prev: Thresholded,
    edges: GrayImage,
}

impl Tracked {
    /// Final binary edge image.
    #[must_use]
    pub const fn edges(&self) -> &GrayImage {
        &self.edges
    }

    /// Consume the pipeline and return every intermediate.
    #[must_use]
    pub fn into_result(self) -> StagedResult {
        let Thresholded {
            prev: suppressed,
            effective,
            classes,
        } = self.prev;
        let Suppressed {
            prev: gradients,
            suppressed,
            auto_thresholds,
        } = suppressed;
        let GradientsComputed {
            prev: smoothed,
            gradients,
            magnitude,
        } = gradients;
        let Smoothed {
            prev: grayscaled,
            smoothed,
        } = smoothed;
        let Grayscaled { prev: pending, gray } = grayscaled;

        StagedResult {
            parameters: pending.parameters,
            original: pending.original,
            gray,
            smoothed,
            gradients,
            magnitude,
            suppressed,
            auto_thresholds,
            effective,
            classes,
            edges: self.edges,
        }
    }
}

// ──────────────────── PipelineStage trait ────────────────────

/// Implemented by every state that has executed a step, so diagnostics
/// can be collected uniformly.
pub trait PipelineStage {
    /// The step this state completed.
    const STEP: Step;

    /// Metrics describing the work done to reach this state.
    fn metrics(&self) -> StageMetrics;
}

impl PipelineStage for Grayscaled {
    const STEP: Step = Step::Grayscale;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Grayscale {
            width: self.gray.width(),
            height: self.gray.height(),
        }
    }
}

impl PipelineStage for Smoothed {
    const STEP: Step = Step::Smooth;

    fn metrics(&self) -> StageMetrics {
        let kernel = self.prev.prev.parameters.kernel_size;
        StageMetrics::Smoothing {
            kernel_size: kernel.get(),
            sigma: crate::blur::sigma_for(kernel),
        }
    }
}

impl PipelineStage for GradientsComputed {
    const STEP: Step = Step::Gradient;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Gradient {
            max_magnitude: self.gradients.max_magnitude,
        }
    }
}

impl PipelineStage for Suppressed {
    const STEP: Step = Step::Suppress;

    fn metrics(&self) -> StageMetrics {
        suppression_metrics(&self.suppressed, self.auto_thresholds)
    }
}

impl PipelineStage for Thresholded {
    const STEP: Step = Step::Threshold;

    fn metrics(&self) -> StageMetrics {
        threshold_metrics(&self.classes, self.effective)
    }
}

impl PipelineStage for Tracked {
    const STEP: Step = Step::Track;

    fn metrics(&self) -> StageMetrics {
        hysteresis_metrics(&self.prev.classes, &self.edges)
    }
}

pub(crate) fn suppression_metrics(suppressed: &GrayImage, auto: AutoThresholds) -> StageMetrics {
    StageMetrics::Suppression {
        surviving: suppressed.pixels().map(|p| u64::from(p.0[0] > 0)).sum(),
        auto_low: auto.low,
        auto_high: auto.high,
    }
}

pub(crate) fn threshold_metrics(classes: &ClassMap, effective: EffectiveThresholds) -> StageMetrics {
    let counts = classes.counts();
    StageMetrics::Threshold {
        low: effective.low,
        high: effective.high,
        strong: counts.strong,
        weak: counts.weak,
        suppressed: counts.suppressed,
    }
}

pub(crate) fn hysteresis_metrics(classes: &ClassMap, edges: &GrayImage) -> StageMetrics {
    let edge_pixels = crate::hysteresis::edge_pixel_count(edges);
    StageMetrics::Hysteresis {
        edge_pixels,
        promoted: edge_pixels.saturating_sub(classes.counts().strong),
    }
}

// ───────────────────────── Results ──────────────────────────

/// Every intermediate of one complete run.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedResult {
    /// Parameter snapshot used for the run.
    pub parameters: PipelineParameters,
    /// Source frame.
    pub original: RgbaImage,
    /// Luminance.
    pub gray: GrayImage,
    /// Smoothed luminance.
    pub smoothed: GrayImage,
    /// Gradient fields.
    pub gradients: Gradients,
    /// Normalized gradient magnitude.
    pub magnitude: GrayImage,
    /// Non-maximum suppression output.
    pub suppressed: GrayImage,
    /// Auto threshold suggestion.
    pub auto_thresholds: AutoThresholds,
    /// Thresholds used for classification.
    pub effective: EffectiveThresholds,
    /// Per-pixel labels.
    pub classes: ClassMap,
    /// Final binary edge image.
    pub edges: GrayImage,
}

impl StagedResult {
    /// Frame dimensions.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::of(&self.original)
    }

    /// Display image for `stage`.
    #[must_use]
    pub fn display(&self, stage: Stage) -> RgbaImage {
        match stage {
            Stage::Original => self.original.clone(),
            Stage::Smoothed => crate::render::to_display(&self.smoothed),
            Stage::GradientMagnitude => crate::render::to_display(&self.magnitude),
            Stage::Suppressed => crate::render::to_display(&self.suppressed),
            Stage::FinalEdges => crate::render::to_display(&self.edges),
        }
    }
}

/// Output of a partial run, as produced for each live frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    /// Stage the image shows.
    pub stage: Stage,
    /// Display image.
    pub image: RgbaImage,
    /// Auto thresholds, when suppression ran.
    pub auto_thresholds: Option<AutoThresholds>,
}

/// Run only the steps needed to display `stage`.
///
/// [`Stage::Original`] returns the frame unchanged without touching any
/// step.
///
/// # Errors
///
/// Propagates any [`PipelineError`] raised by an executed step.
pub fn preview(
    original: RgbaImage,
    parameters: PipelineParameters,
    stage: Stage,
) -> Result<Preview, PipelineError> {
    let done = |image: &GrayImage, auto_thresholds| Preview {
        stage,
        image: crate::render::to_display(image),
        auto_thresholds,
    };

    if stage == Stage::Original {
        return Ok(Preview {
            stage,
            image: original,
            auto_thresholds: None,
        });
    }

    let smoothed = Pipeline::new(original, parameters).grayscale().smooth();
    if stage == Stage::Smoothed {
        return Ok(done(smoothed.smoothed(), None));
    }

    let gradients = smoothed.gradients()?;
    if stage == Stage::GradientMagnitude {
        return Ok(done(gradients.magnitude(), None));
    }

    let suppressed = gradients.suppress()?;
    let auto = Some(suppressed.auto_thresholds());
    if stage == Stage::Suppressed {
        return Ok(done(suppressed.suppressed(), auto));
    }

    let tracked = suppressed.threshold().track();
    Ok(done(tracked.edges(), auto))
}
