//! Pipeline diagnostics: timing and per-stage metrics.
//!
//! Every orchestrator run and every call to [`process_with_diagnostics`]
//! records one [`StageDiagnostics`] per step it actually executed.
//! Steps reused from an earlier run are left as `None`.
//!
//! Durations are serialized as fractional seconds (`f64`).

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::pipeline::{Pipeline, PipelineStage, StagedResult};
use crate::stage::Step;
use crate::types::{Dimensions, PipelineError, PipelineParameters, RgbaImage};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Time source for stage timing.
///
/// Abstracted so tests can use a deterministic clock.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Diagnostics for a single pipeline step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this step (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Step-specific metrics.
    pub metrics: StageMetrics,
}

/// Step-specific metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Grayscale conversion metrics.
    Grayscale {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
    },
    /// Gaussian smoothing metrics.
    Smoothing {
        /// Kernel width in pixels.
        kernel_size: u32,
        /// Sigma derived from the kernel size.
        sigma: f32,
    },
    /// Gradient estimation metrics.
    Gradient {
        /// Largest gradient magnitude in the frame.
        max_magnitude: f32,
    },
    /// Non-maximum suppression metrics.
    Suppression {
        /// Pixels left non-zero after suppression.
        surviving: u64,
        /// Suggested low threshold.
        auto_low: u8,
        /// Suggested high threshold.
        auto_high: u8,
    },
    /// Double-threshold metrics.
    Threshold {
        /// Effective low threshold.
        low: u8,
        /// Effective high threshold.
        high: u8,
        /// Strong pixel count.
        strong: u64,
        /// Weak pixel count.
        weak: u64,
        /// Suppressed pixel count.
        suppressed: u64,
    },
    /// Hysteresis metrics.
    Hysteresis {
        /// Final edge pixel count.
        edge_pixels: u64,
        /// Weak pixels promoted to edges.
        promoted: u64,
    },
}

/// Diagnostics collected from one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Frame dimensions.
    pub dimensions: Dimensions,
    /// Parameter snapshot the run used.
    pub parameters: PipelineParameters,
    /// Grayscale conversion, if executed.
    pub grayscale: Option<StageDiagnostics>,
    /// Gaussian smoothing, if executed.
    pub smoothing: Option<StageDiagnostics>,
    /// Gradient estimation, if executed.
    pub gradient: Option<StageDiagnostics>,
    /// Non-maximum suppression, if executed.
    pub suppression: Option<StageDiagnostics>,
    /// Double threshold, if executed.
    pub threshold: Option<StageDiagnostics>,
    /// Hysteresis, if executed.
    pub hysteresis: Option<StageDiagnostics>,
    /// Total wall-clock duration of the run (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
}

impl PipelineDiagnostics {
    /// Empty diagnostics for a run over a frame of `dimensions`.
    #[must_use]
    pub const fn new(dimensions: Dimensions, parameters: PipelineParameters) -> Self {
        Self {
            dimensions,
            parameters,
            grayscale: None,
            smoothing: None,
            gradient: None,
            suppression: None,
            threshold: None,
            hysteresis: None,
            total_duration: Duration::ZERO,
        }
    }

    const fn slot_mut(&mut self, step: Step) -> &mut Option<StageDiagnostics> {
        match step {
            Step::Grayscale => &mut self.grayscale,
            Step::Smooth => &mut self.smoothing,
            Step::Gradient => &mut self.gradient,
            Step::Suppress => &mut self.suppression,
            Step::Threshold => &mut self.threshold,
            Step::Track => &mut self.hysteresis,
        }
    }

    /// Store the diagnostics for `step` and add its duration to the total.
    pub fn record(&mut self, step: Step, diagnostics: StageDiagnostics) {
        self.total_duration += diagnostics.duration;
        *self.slot_mut(step) = Some(diagnostics);
    }

    /// Diagnostics for `step`, if it ran.
    #[must_use]
    pub const fn get(&self, step: Step) -> Option<&StageDiagnostics> {
        match step {
            Step::Grayscale => self.grayscale.as_ref(),
            Step::Smooth => self.smoothing.as_ref(),
            Step::Gradient => self.gradient.as_ref(),
            Step::Suppress => self.suppression.as_ref(),
            Step::Threshold => self.threshold.as_ref(),
            Step::Track => self.hysteresis.as_ref(),
        }
    }

    /// Executed steps in order.
    pub fn executed(&self) -> impl Iterator<Item = (Step, &StageDiagnostics)> {
        Step::ALL
            .into_iter()
            .filter_map(|step| self.get(step).map(|d| (step, d)))
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.dimensions.width,
            self.dimensions.height,
            self.dimensions.pixel_count(),
        ));
        lines.push(format!(
            "Kernel size: {}  Low: {:?}  High: {:?}",
            self.parameters.kernel_size.get(),
            self.parameters.low_threshold,
            self.parameters.high_threshold,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for (step, diag) in self.executed() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            let name = step.label();
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Grayscale { width, height } => format!("{width}x{height}"),
        StageMetrics::Smoothing { kernel_size, sigma } => {
            format!("k={kernel_size} sigma={sigma:.2}")
        }
        StageMetrics::Gradient { max_magnitude } => format!("max={max_magnitude:.1}"),
        StageMetrics::Suppression {
            surviving,
            auto_low,
            auto_high,
        } => format!("surviving={surviving} auto={auto_low}/{auto_high}"),
        StageMetrics::Threshold {
            low,
            high,
            strong,
            weak,
            suppressed,
        } => format!("low={low} high={high} strong={strong} weak={weak} suppressed={suppressed}"),
        StageMetrics::Hysteresis {
            edge_pixels,
            promoted,
        } => format!("edges={edge_pixels} promoted={promoted}"),
    }
}

/// Time one step with `clock`.
pub(crate) fn timed<C: Clock, T>(clock: &C, f: impl FnOnce() -> T) -> (T, Duration) {
    let start = clock.now();
    let value = f();
    (value, clock.elapsed(&start))
}

/// Record the metrics of a just-reached stage.
fn record_stage<S: PipelineStage>(diag: &mut PipelineDiagnostics, stage: &S, duration: Duration) {
    diag.record(
        S::STEP,
        StageDiagnostics {
            duration,
            metrics: stage.metrics(),
        },
    );
}

/// Run the full pipeline, timing every step.
///
/// # Errors
///
/// Propagates any [`PipelineError`] raised by a step.
pub fn process_with_diagnostics<C: Clock>(
    original: RgbaImage,
    parameters: PipelineParameters,
    clock: &C,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    let mut diag = PipelineDiagnostics::new(Dimensions::of(&original), parameters);

    let pending = Pipeline::new(original, parameters);

    let (grayscaled, d) = timed(clock, || pending.grayscale());
    record_stage(&mut diag, &grayscaled, d);

    let (smoothed, d) = timed(clock, || grayscaled.smooth());
    record_stage(&mut diag, &smoothed, d);

    let (gradients, d) = timed(clock, || smoothed.gradients());
    let gradients = gradients?;
    record_stage(&mut diag, &gradients, d);

    let (suppressed, d) = timed(clock, || gradients.suppress());
    let suppressed = suppressed?;
    record_stage(&mut diag, &suppressed, d);

    let (thresholded, d) = timed(clock, || suppressed.threshold());
    record_stage(&mut diag, &thresholded, d);

    let (tracked, d) = timed(clock, || thresholded.track());
    record_stage(&mut diag, &tracked, d);

    tracing::debug!(
        total_ms = duration_ms(diag.total_duration),
        "pipeline run complete"
    );
    Ok((tracked.into_result(), diag))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::types::PipelineParameters;

    /// Clock that advances one millisecond per reading.
    struct TickClock {
        ticks: Cell<u64>,
    }

    impl Clock for TickClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.ticks.get();
            self.ticks.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.now() - since)
        }
    }

    fn edge_frame() -> RgbaImage {
        RgbaImage::from_fn(12, 12, |x, _| {
            if x < 6 {
                image::Rgba([0, 0, 0, 255])
            } else {
                image::Rgba([255, 255, 255, 255])
            }
        })
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_millis(1234);
        assert!((duration_ms(d) - 1234.0).abs() < 0.01);
    }

    #[test]
    fn full_run_records_every_step() {
        let clock = TickClock { ticks: Cell::new(0) };
        let (_, diag) =
            process_with_diagnostics(edge_frame(), PipelineParameters::default(), &clock).unwrap();
        assert_eq!(diag.executed().count(), Step::ALL.len());
        assert_eq!(diag.total_duration, Duration::from_millis(6));
        assert!(matches!(
            diag.get(Step::Grayscale).unwrap().metrics,
            StageMetrics::Grayscale {
                width: 12,
                height: 12
            }
        ));
    }

    #[test]
    fn hysteresis_metrics_count_edges() {
        let (result, diag) =
            process_with_diagnostics(edge_frame(), PipelineParameters::default(), &StdClock)
                .unwrap();
        let Some(StageDiagnostics {
            metrics: StageMetrics::Hysteresis { edge_pixels, .. },
            ..
        }) = diag.hysteresis
        else {
            panic!("missing hysteresis diagnostics");
        };
        assert_eq!(edge_pixels, crate::hysteresis::edge_pixel_count(&result.edges));
        assert!(edge_pixels > 0);
    }

    #[test]
    fn partial_diagnostics_skip_missing_steps() {
        let mut diag = PipelineDiagnostics::new(
            Dimensions {
                width: 4,
                height: 4,
            },
            PipelineParameters::default(),
        );
        diag.record(
            Step::Threshold,
            StageDiagnostics {
                duration: Duration::from_millis(2),
                metrics: StageMetrics::Threshold {
                    low: 10,
                    high: 20,
                    strong: 1,
                    weak: 2,
                    suppressed: 13,
                },
            },
        );
        let steps: Vec<Step> = diag.executed().map(|(s, _)| s).collect();
        assert_eq!(steps, vec![Step::Threshold]);
        let report = diag.report();
        assert!(report.contains("Pipeline Diagnostics Report"));
        assert!(report.contains("Threshold"));
        assert!(!report.contains("Hysteresis"));
    }

    #[test]
    fn json_uses_fractional_seconds() {
        let mut diag = PipelineDiagnostics::new(
            Dimensions {
                width: 1,
                height: 1,
            },
            PipelineParameters::default(),
        );
        diag.record(
            Step::Gradient,
            StageDiagnostics {
                duration: Duration::from_millis(1500),
                metrics: StageMetrics::Gradient { max_magnitude: 4.0 },
            },
        );
        let json: serde_json::Value = serde_json::to_value(&diag).unwrap();
        assert!((json["total_duration"].as_f64().unwrap() - 1.5).abs() < 1e-9);
        assert!(json["smoothing"].is_null());

        let back: PipelineDiagnostics = serde_json::from_value(json).unwrap();
        assert_eq!(back, diag);
    }
}
