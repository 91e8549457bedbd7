//! Stateful pipeline driver with incremental recomputation.
//!
//! The [`Orchestrator`] owns one buffer per step and tracks how far the
//! buffers are fresh for the current frame and parameters. A parameter
//! change only invalidates the steps that depend on it:
//!
//! | Change          | First stale step      |
//! |-----------------|-----------------------|
//! | new frame       | [`Step::Grayscale`]   |
//! | kernel size     | [`Step::Smooth`]      |
//! | thresholds      | [`Step::Threshold`]   |
//! | selected stage  | nothing               |
//!
//! A run recomputes stale steps up to what the selected stage needs
//! (everything while a capture is in progress), checking a
//! [`CancelToken`] between steps. A cancelled run publishes nothing.
//!
//! The low-level API (`load_frame`, `select_stage`, `update_*`, `run`)
//! lets a worker apply many changes and run once. The convenience
//! methods (`submit_frame`, `set_stage`, `set_kernel_size`,
//! `set_thresholds`) apply one change and run to completion.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::diagnostics::{Clock, PipelineDiagnostics, StageDiagnostics, StageMetrics, StdClock};
use crate::frame::SourceFrame;
use crate::gradient::Gradients;
use crate::stage::{Stage, Step};
use crate::threshold::ClassMap;
use crate::types::{
    AutoThresholds, Dimensions, EffectiveThresholds, GrayImage, KernelSize, PipelineError,
    PipelineParameters, RgbaImage,
};

/// Cooperative cancellation flag shared between a run and its owner.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// A fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Runs observe it before their next step.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Capture lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CaptureState {
    /// No frame loaded.
    #[default]
    NotCaptured,
    /// A frame is loaded and its first full run has not finished.
    Capturing,
    /// A frame is loaded and has been fully processed at least once.
    Captured,
}

/// How a run ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub enum RunOutcome {
    /// All requested steps ran and the display was updated.
    Completed,
    /// The token was cancelled; the display was left untouched.
    Cancelled,
}

/// Per-step buffers. Entries past the orchestrator's fresh mark may be
/// stale and are overwritten by the next run.
#[derive(Debug, Default)]
struct StageBuffers {
    gray: Option<GrayImage>,
    smoothed: Option<GrayImage>,
    gradients: Option<Gradients>,
    magnitude: Option<GrayImage>,
    suppressed: Option<GrayImage>,
    effective: Option<EffectiveThresholds>,
    classes: Option<ClassMap>,
    edges: Option<GrayImage>,
}

fn required<'a, T>(slot: Option<&'a T>, what: &str) -> Result<&'a T, PipelineError> {
    slot.ok_or_else(|| PipelineError::Compute(format!("{what} buffer is missing")))
}

/// Owns the stage buffers for one frame source and decides what to
/// recompute.
#[derive(Debug)]
pub struct Orchestrator<C = StdClock> {
    clock: C,
    state: CaptureState,
    stage: Stage,
    parameters: PipelineParameters,
    original: Option<RgbaImage>,
    buffers: StageBuffers,
    fresh: Option<Step>,
    auto_thresholds: AutoThresholds,
    display: Option<RgbaImage>,
    last_error: Option<PipelineError>,
    diagnostics: Option<PipelineDiagnostics>,
}

impl Orchestrator {
    /// An empty orchestrator timing steps with [`StdClock`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(StdClock)
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> Orchestrator<C> {
    /// An empty orchestrator timing steps with `clock`.
    #[must_use]
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            state: CaptureState::NotCaptured,
            stage: Stage::Original,
            parameters: PipelineParameters::default(),
            original: None,
            buffers: StageBuffers::default(),
            fresh: None,
            auto_thresholds: AutoThresholds::INITIAL,
            display: None,
            last_error: None,
            diagnostics: None,
        }
    }

    // ─────────────────────── accessors ───────────────────────

    /// Capture lifecycle state.
    #[must_use]
    pub const fn state(&self) -> CaptureState {
        self.state
    }

    /// Selected stage.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    /// Current parameters.
    #[must_use]
    pub const fn parameters(&self) -> &PipelineParameters {
        &self.parameters
    }

    /// Latest auto threshold suggestion, [`AutoThresholds::INITIAL`]
    /// until suppression has run on the current frame.
    #[must_use]
    pub const fn auto_thresholds(&self) -> AutoThresholds {
        self.auto_thresholds
    }

    /// Thresholds the classifier uses with the current parameters.
    #[must_use]
    pub const fn effective_thresholds(&self) -> EffectiveThresholds {
        self.parameters.effective(self.auto_thresholds)
    }

    /// Image last published for display.
    #[must_use]
    pub const fn display(&self) -> Option<&RgbaImage> {
        self.display.as_ref()
    }

    /// The loaded frame.
    #[must_use]
    pub const fn original(&self) -> Option<&RgbaImage> {
        self.original.as_ref()
    }

    /// Error from the most recent failed operation, cleared by the next
    /// completed run.
    #[must_use]
    pub const fn last_error(&self) -> Option<&PipelineError> {
        self.last_error.as_ref()
    }

    /// Diagnostics of the most recent completed run.
    #[must_use]
    pub const fn diagnostics(&self) -> Option<&PipelineDiagnostics> {
        self.diagnostics.as_ref()
    }

    /// Last step whose buffer is fresh.
    #[must_use]
    pub const fn fresh_through(&self) -> Option<Step> {
        self.fresh
    }

    // ─────────────────────── low-level mutators ───────────────────────

    /// Validate and store a new frame without processing it.
    ///
    /// Every step becomes stale, the selected stage resets to
    /// [`Stage::Original`] and the state becomes
    /// [`CaptureState::Capturing`].
    ///
    /// # Errors
    ///
    /// Returns the frame's input error. The previous frame and its
    /// buffers are kept.
    pub fn load_frame(&mut self, frame: SourceFrame) -> Result<(), PipelineError> {
        match frame.into_rgba() {
            Ok(rgba) => {
                self.load_image(rgba);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "rejected frame");
                self.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Store an already validated RGBA frame without processing it.
    pub fn load_image(&mut self, image: RgbaImage) {
        tracing::debug!(
            width = image.width(),
            height = image.height(),
            "frame loaded"
        );
        self.original = Some(image);
        self.fresh = None;
        self.stage = Stage::Original;
        self.state = CaptureState::Capturing;
        self.auto_thresholds = AutoThresholds::INITIAL;
    }

    /// Select the stage to display. Nothing is recomputed until the
    /// next run.
    pub const fn select_stage(&mut self, stage: Stage) {
        self.stage = stage;
    }

    /// Store a normalized kernel size and invalidate smoothing onward
    /// if it changed.
    pub fn update_kernel_size(&mut self, requested: i32) -> KernelSize {
        let kernel = KernelSize::new(requested);
        if kernel != self.parameters.kernel_size {
            self.parameters.kernel_size = kernel;
            self.invalidate_from(Step::Smooth);
        }
        kernel
    }

    /// Store clamped thresholds (`None` for auto) and invalidate
    /// classification onward if they changed.
    pub fn update_thresholds(&mut self, low: Option<i32>, high: Option<i32>) {
        let mut next = self.parameters;
        next.set_thresholds(low, high);
        self.update_parameters(next);
    }

    /// Replace all parameters, invalidating only what changed.
    pub fn update_parameters(&mut self, parameters: PipelineParameters) {
        let parameters = parameters.normalized();
        let previous = self.parameters;
        self.parameters = parameters;
        if parameters.kernel_size != previous.kernel_size {
            self.invalidate_from(Step::Smooth);
        } else if parameters.low_threshold != previous.low_threshold
            || parameters.high_threshold != previous.high_threshold
        {
            self.invalidate_from(Step::Threshold);
        }
    }

    fn invalidate_from(&mut self, step: Step) {
        if self.fresh.is_some_and(|fresh| fresh >= step) {
            self.fresh = step.previous();
        }
    }

    // ─────────────────────── running ───────────────────────

    /// Recompute stale steps up to what the current state needs, then
    /// publish the selected stage.
    ///
    /// While capturing, every step runs. Afterwards only the steps the
    /// selected stage depends on run. Parameters are read once, at the
    /// start.
    ///
    /// # Errors
    ///
    /// On a step failure the original frame is displayed, the error is
    /// stored in [`last_error`](Self::last_error) and returned. Buffers
    /// computed before the failure remain fresh.
    pub fn run(&mut self, cancel: &CancelToken) -> Result<RunOutcome, PipelineError> {
        let Some(dimensions) = self.original.as_ref().map(Dimensions::of) else {
            return Ok(RunOutcome::Completed);
        };
        let parameters = self.parameters;
        let target = if self.state == CaptureState::Capturing {
            Some(Step::Track)
        } else {
            self.stage.required_step()
        };

        let mut diagnostics = PipelineDiagnostics::new(dimensions, parameters);
        let mut next = self.fresh.map_or(Some(Step::Grayscale), Step::next);
        while let Some(step) = next.filter(|&s| target.is_some_and(|t| s <= t)) {
            if cancel.is_cancelled() {
                tracing::debug!(%step, "run cancelled");
                return Ok(RunOutcome::Cancelled);
            }

            let start = self.clock.now();
            let metrics = match self.run_step(step, &parameters) {
                Ok(metrics) => metrics,
                Err(err) => return Err(self.fail(err)),
            };
            let duration = self.clock.elapsed(&start);
            tracing::debug!(%step, ?duration, "step complete");

            self.fresh = Some(step);
            diagnostics.record(step, StageDiagnostics { duration, metrics });
            next = step.next();
        }

        if self.state == CaptureState::Capturing {
            self.state = CaptureState::Captured;
        }
        self.display = self.render(self.stage);
        self.last_error = None;
        self.diagnostics = Some(diagnostics);
        Ok(RunOutcome::Completed)
    }

    fn run_step(
        &mut self,
        step: Step,
        parameters: &PipelineParameters,
    ) -> Result<StageMetrics, PipelineError> {
        let buffers = &mut self.buffers;
        match step {
            Step::Grayscale => {
                let original = required(self.original.as_ref(), "original")?;
                let gray = crate::grayscale::to_grayscale(original);
                let metrics = StageMetrics::Grayscale {
                    width: gray.width(),
                    height: gray.height(),
                };
                buffers.gray = Some(gray);
                Ok(metrics)
            }
            Step::Smooth => {
                let gray = required(buffers.gray.as_ref(), "grayscale")?;
                let kernel = parameters.kernel_size;
                buffers.smoothed = Some(crate::blur::gaussian_smooth(gray, kernel));
                Ok(StageMetrics::Smoothing {
                    kernel_size: kernel.get(),
                    sigma: crate::blur::sigma_for(kernel),
                })
            }
            Step::Gradient => {
                let smoothed = required(buffers.smoothed.as_ref(), "smoothed")?;
                let gradients = crate::gradient::compute(smoothed)?;
                let metrics = StageMetrics::Gradient {
                    max_magnitude: gradients.max_magnitude,
                };
                buffers.magnitude = Some(crate::gradient::magnitude_display(&gradients));
                buffers.gradients = Some(gradients);
                Ok(metrics)
            }
            Step::Suppress => {
                let gradients = required(buffers.gradients.as_ref(), "gradient")?;
                let suppressed = crate::nms::suppress_gradients(gradients)?;
                let auto = crate::threshold::estimate_auto(&suppressed);
                let metrics = crate::pipeline::suppression_metrics(&suppressed, auto);
                buffers.suppressed = Some(suppressed);
                self.auto_thresholds = auto;
                Ok(metrics)
            }
            Step::Threshold => {
                let suppressed = required(buffers.suppressed.as_ref(), "suppressed")?;
                let effective = parameters.effective(self.auto_thresholds);
                let classes = crate::threshold::classify(suppressed, effective);
                let metrics = crate::pipeline::threshold_metrics(&classes, effective);
                buffers.effective = Some(effective);
                buffers.classes = Some(classes);
                Ok(metrics)
            }
            Step::Track => {
                let classes = required(buffers.classes.as_ref(), "threshold")?;
                let edges = crate::hysteresis::track(classes);
                let metrics = crate::pipeline::hysteresis_metrics(classes, &edges);
                buffers.edges = Some(edges);
                Ok(metrics)
            }
        }
    }

    /// Fall back to the original frame and record `err`.
    fn fail(&mut self, err: PipelineError) -> PipelineError {
        tracing::warn!(error = %err, "pipeline run failed, showing original frame");
        self.display.clone_from(&self.original);
        if self.state == CaptureState::Capturing {
            self.state = CaptureState::Captured;
        }
        self.last_error = Some(err.clone());
        err
    }

    /// Display image for `stage` from fresh buffers, `None` if the
    /// stage is not fresh.
    #[must_use]
    pub fn render(&self, stage: Stage) -> Option<RgbaImage> {
        if let Some(step) = stage.required_step()
            && self.fresh.is_none_or(|fresh| fresh < step)
        {
            return None;
        }
        let gray = match stage {
            Stage::Original => return self.original.clone(),
            Stage::Smoothed => self.buffers.smoothed.as_ref(),
            Stage::GradientMagnitude => self.buffers.magnitude.as_ref(),
            Stage::Suppressed => self.buffers.suppressed.as_ref(),
            Stage::FinalEdges => self.buffers.edges.as_ref(),
        };
        gray.map(crate::render::to_display)
    }

    // ─────────────────────── convenience operations ───────────────────────

    /// Load a captured frame and run the full pipeline, then show
    /// [`Stage::Original`].
    ///
    /// # Errors
    ///
    /// Returns an input error for a malformed frame, or a step failure.
    pub fn submit_frame(&mut self, frame: SourceFrame) -> Result<RunOutcome, PipelineError> {
        self.load_frame(frame)?;
        self.run(&CancelToken::new())
    }

    /// Select `stage` and compute whatever it still needs.
    ///
    /// # Errors
    ///
    /// See [`run`](Self::run).
    pub fn set_stage(&mut self, stage: Stage) -> Result<RunOutcome, PipelineError> {
        self.select_stage(stage);
        self.run(&CancelToken::new())
    }

    /// Normalize and store a kernel size, recomputing through the
    /// selected stage when a frame is loaded.
    ///
    /// # Errors
    ///
    /// See [`run`](Self::run).
    pub fn set_kernel_size(&mut self, requested: i32) -> Result<KernelSize, PipelineError> {
        let kernel = self.update_kernel_size(requested);
        match self.run(&CancelToken::new())? {
            RunOutcome::Completed => {}
            RunOutcome::Cancelled => {
                tracing::debug!(kernel = kernel.get(), "kernel size stored, run cancelled");
            }
        }
        Ok(kernel)
    }

    /// Clamp and store threshold overrides, recomputing through the
    /// selected stage when a frame is loaded.
    ///
    /// # Errors
    ///
    /// See [`run`](Self::run).
    pub fn set_thresholds(
        &mut self,
        low: Option<i32>,
        high: Option<i32>,
    ) -> Result<RunOutcome, PipelineError> {
        self.update_thresholds(low, high);
        self.run(&CancelToken::new())
    }

    /// Drop the frame and every buffer. Parameters are kept.
    pub fn reset(&mut self) {
        tracing::debug!("orchestrator reset");
        self.state = CaptureState::NotCaptured;
        self.stage = Stage::Original;
        self.original = None;
        self.buffers = StageBuffers::default();
        self.fresh = None;
        self.auto_thresholds = AutoThresholds::INITIAL;
        self.display = None;
        self.last_error = None;
        self.diagnostics = None;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Threshold;

    /// 5x5 frame with columns 0, 0, 128, 255, 255.
    fn step_frame() -> SourceFrame {
        let data = (0..25)
            .flat_map(|i| {
                let v = [0u8, 0, 128, 255, 255][i % 5];
                [v, v, v, 255]
            })
            .collect();
        SourceFrame {
            width: 5,
            height: 5,
            format: crate::frame::PixelFormat::Rgba8,
            data,
        }
    }

    fn captured_k3() -> Orchestrator {
        let mut orch = Orchestrator::new();
        orch.update_kernel_size(3);
        assert_eq!(orch.submit_frame(step_frame()).unwrap(), RunOutcome::Completed);
        orch
    }

    fn executed_steps(orch: &Orchestrator) -> Vec<Step> {
        orch.diagnostics()
            .unwrap()
            .executed()
            .map(|(step, _)| step)
            .collect()
    }

    #[test]
    fn starts_empty_with_documented_defaults() {
        let orch = Orchestrator::new();
        assert_eq!(orch.state(), CaptureState::NotCaptured);
        assert_eq!(orch.stage(), Stage::Original);
        assert_eq!(orch.parameters().kernel_size.get(), 5);
        assert_eq!(orch.auto_thresholds(), AutoThresholds { low: 40, high: 100 });
        assert!(orch.display().is_none());
    }

    #[test]
    fn capture_runs_everything_and_shows_original() {
        let orch = captured_k3();
        assert_eq!(orch.state(), CaptureState::Captured);
        assert_eq!(orch.stage(), Stage::Original);
        assert_eq!(orch.fresh_through(), Some(Step::Track));
        assert_eq!(executed_steps(&orch), Step::ALL.to_vec());
        assert_eq!(orch.auto_thresholds(), AutoThresholds { low: 26, high: 64 });
        assert_eq!(orch.display(), orch.original());
    }

    #[test]
    fn final_edges_show_single_column() {
        let mut orch = captured_k3();
        orch.set_stage(Stage::FinalEdges).unwrap();
        // Already fresh: nothing recomputed.
        assert!(executed_steps(&orch).is_empty());
        let display = orch.display().unwrap();
        for y in 0..5 {
            for x in 0..5 {
                let v = if x == 2 && (1..=3).contains(&y) { 255 } else { 0 };
                assert_eq!(display.get_pixel(x, y).0, [v, v, v, 255], "({x}, {y})");
            }
        }
    }

    #[test]
    fn kernel_size_is_normalized() {
        let mut orch = Orchestrator::new();
        assert_eq!(orch.set_kernel_size(4).unwrap().get(), 5);
        assert_eq!(orch.set_kernel_size(26).unwrap().get(), 25);
        assert_eq!(orch.parameters().kernel_size.get(), 25);
    }

    #[test]
    fn inverted_thresholds_are_swapped() {
        let mut orch = Orchestrator::new();
        orch.set_thresholds(Some(200), Some(50)).unwrap();
        assert_eq!(
            orch.effective_thresholds(),
            EffectiveThresholds { low: 50, high: 200 }
        );
        assert_eq!(orch.parameters().low_threshold, Threshold::Override(50));
    }

    #[test]
    fn threshold_change_reuses_suppression() {
        let mut orch = captured_k3();
        orch.set_stage(Stage::FinalEdges).unwrap();
        orch.set_thresholds(Some(10), Some(20)).unwrap();
        assert_eq!(executed_steps(&orch), vec![Step::Threshold, Step::Track]);
        assert_eq!(
            orch.effective_thresholds(),
            EffectiveThresholds { low: 10, high: 20 }
        );
    }

    #[test]
    fn kernel_change_recomputes_only_through_selected_stage() {
        let mut orch = captured_k3();
        orch.set_stage(Stage::Smoothed).unwrap();
        orch.set_kernel_size(7).unwrap();
        assert_eq!(executed_steps(&orch), vec![Step::Smooth]);
        assert_eq!(orch.fresh_through(), Some(Step::Smooth));
        assert!(orch.render(Stage::FinalEdges).is_none());

        orch.set_stage(Stage::FinalEdges).unwrap();
        assert_eq!(
            executed_steps(&orch),
            vec![Step::Gradient, Step::Suppress, Step::Threshold, Step::Track]
        );
    }

    #[test]
    fn unchanged_parameters_invalidate_nothing() {
        let mut orch = captured_k3();
        orch.update_kernel_size(3);
        orch.update_thresholds(None, None);
        assert_eq!(orch.fresh_through(), Some(Step::Track));
    }

    #[test]
    fn stage_selection_alone_does_not_compute() {
        let mut orch = captured_k3();
        orch.update_kernel_size(9);
        orch.select_stage(Stage::Suppressed);
        assert_eq!(orch.fresh_through(), Some(Step::Grayscale));
        assert_eq!(orch.run(&CancelToken::new()).unwrap(), RunOutcome::Completed);
        assert_eq!(orch.fresh_through(), Some(Step::Suppress));
    }

    #[test]
    fn cancelled_run_publishes_nothing() {
        let mut orch = Orchestrator::new();
        orch.load_frame(step_frame()).unwrap();
        let token = CancelToken::new();
        token.cancel();
        assert_eq!(orch.run(&token).unwrap(), RunOutcome::Cancelled);
        assert!(orch.display().is_none());
        assert!(orch.last_error().is_none());
        assert_eq!(orch.state(), CaptureState::Capturing);

        // The next run still completes the capture.
        assert_eq!(orch.run(&CancelToken::new()).unwrap(), RunOutcome::Completed);
        assert_eq!(orch.state(), CaptureState::Captured);
    }

    #[test]
    fn malformed_frame_keeps_previous_buffers() {
        let mut orch = captured_k3();
        let bad = SourceFrame {
            width: 4,
            height: 4,
            format: crate::frame::PixelFormat::Rgba8,
            data: vec![0; 7],
        };
        let err = orch.submit_frame(bad).unwrap_err();
        assert!(err.is_input_error());
        assert_eq!(orch.last_error(), Some(&err));
        assert_eq!(orch.state(), CaptureState::Captured);
        assert!(orch.render(Stage::FinalEdges).is_some());
        assert_eq!(orch.original().map(|o| o.width()), Some(5));
    }

    #[test]
    fn failure_falls_back_to_original() {
        let mut orch = captured_k3();
        orch.set_stage(Stage::FinalEdges).unwrap();
        let err = orch.fail(PipelineError::Compute("out of memory".into()));
        assert!(!err.is_input_error());
        assert_eq!(orch.display(), orch.original());
        assert_eq!(orch.last_error(), Some(&err));

        // A later successful run clears the error.
        orch.set_stage(Stage::Smoothed).unwrap();
        assert!(orch.last_error().is_none());
    }

    #[test]
    fn step_failure_during_run_falls_back_to_original() {
        let mut orch = captured_k3();
        // Suppression is stale but its input buffer is gone.
        orch.buffers.gradients = None;
        orch.fresh = Some(Step::Gradient);

        let err = orch.set_stage(Stage::FinalEdges).unwrap_err();
        assert_eq!(err, PipelineError::Compute("gradient buffer is missing".into()));
        assert!(!err.is_input_error());
        assert_eq!(orch.display(), orch.original());
        assert_eq!(orch.last_error(), Some(&err));
        assert_eq!(orch.state(), CaptureState::Captured);
        assert_eq!(orch.fresh_through(), Some(Step::Gradient));
        assert!(orch.render(Stage::FinalEdges).is_none());
    }

    #[test]
    fn kernel_change_recomputes_selected_stage() {
        let mut orch = captured_k3();
        orch.set_stage(Stage::FinalEdges).unwrap();
        let before = orch.display().cloned();
        assert_eq!(orch.set_kernel_size(5).unwrap().get(), 5);
        assert_eq!(orch.fresh_through(), Some(Step::Track));
        assert_eq!(orch.display().cloned(), orch.render(Stage::FinalEdges));
        assert!(before.is_some());
    }

    #[test]
    fn runs_are_deterministic() {
        let mut a = captured_k3();
        let mut b = captured_k3();
        a.set_stage(Stage::FinalEdges).unwrap();
        b.set_stage(Stage::FinalEdges).unwrap();
        assert_eq!(a.display(), b.display());
    }

    #[test]
    fn new_frame_resets_stage_and_auto_values() {
        let mut orch = captured_k3();
        orch.set_stage(Stage::Suppressed).unwrap();
        orch.load_frame(step_frame()).unwrap();
        assert_eq!(orch.stage(), Stage::Original);
        assert_eq!(orch.auto_thresholds(), AutoThresholds::INITIAL);
        assert_eq!(orch.state(), CaptureState::Capturing);
    }

    #[test]
    fn reset_returns_to_not_captured() {
        let mut orch = captured_k3();
        orch.reset();
        assert_eq!(orch.state(), CaptureState::NotCaptured);
        assert!(orch.display().is_none());
        assert!(orch.render(Stage::Original).is_none());
        assert_eq!(orch.parameters().kernel_size.get(), 3);
        // Running with no frame is a no-op.
        assert_eq!(orch.run(&CancelToken::new()).unwrap(), RunOutcome::Completed);
    }
}
