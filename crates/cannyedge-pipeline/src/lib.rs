//! cannyedge-pipeline: Step-by-step Canny edge detection (sans-IO).
//!
//! Turns an RGBA frame into a sequence of displayable stages:
//! grayscale -> Gaussian smoothing -> Sobel gradients -> non-maximum
//! suppression -> double threshold -> hysteresis.
//!
//! Three ways to drive it:
//!
//! - [`process`] runs every step once and returns all intermediates.
//! - [`Pipeline`] advances one typed step at a time.
//! - [`Orchestrator`] keeps per-step buffers and recomputes only what a
//!   parameter or stage change invalidates.
//!
//! This crate has **no I/O and no threads**. Off-thread capture and
//! live-frame processing live in `cannyedge-worker`.

pub mod blur;
pub mod diagnostics;
pub mod frame;
pub mod gradient;
pub mod grayscale;
pub mod hysteresis;
pub mod nms;
pub mod orchestrator;
pub mod pipeline;
pub mod render;
pub mod stage;
pub mod threshold;
pub mod types;

pub use frame::{Orientation, PixelFormat, Rotation, SourceFrame, apply_orientation};
pub use orchestrator::{CancelToken, CaptureState, Orchestrator, RunOutcome};
pub use pipeline::{Pipeline, Preview, StagedResult, preview};
pub use stage::{Stage, Step};
pub use threshold::{ClassMap, PixelClass};
pub use types::{
    AutoThresholds, Dimensions, EffectiveThresholds, GrayImage, KernelSize, PipelineError,
    PipelineParameters, RgbaImage, Threshold,
};

/// Run the full pipeline on an oriented RGBA frame.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyFrame`] for a zero-sized frame, or any
/// error raised by a step.
pub fn process(
    original: RgbaImage,
    parameters: PipelineParameters,
) -> Result<StagedResult, PipelineError> {
    if original.width() == 0 || original.height() == 0 {
        return Err(PipelineError::EmptyFrame {
            width: original.width(),
            height: original.height(),
        });
    }
    let tracked = Pipeline::new(original, parameters.normalized())
        .grayscale()
        .smooth()
        .gradients()?
        .suppress()?
        .threshold()
        .track();
    Ok(tracked.into_result())
}
