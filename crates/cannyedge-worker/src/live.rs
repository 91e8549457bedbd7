//! Live-mode frame processing.
//!
//! Frames arrive at sensor rate. A [`FrameThrottle`] drops frames that
//! arrive before the minimum interval has elapsed; nothing is queued.
//! Each accepted frame gets a sequence number and is processed on its
//! own blocking task, computing only as far as the selected stage.
//! Failures are published like previews, so readers see why a frame
//! produced no image. Results land in a [`LatestResult`] slot that refuses anything older
//! than what it already holds, so out-of-order completion never shows
//! a stale frame.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use cannyedge_pipeline::{
    KernelSize, PipelineError, PipelineParameters, Preview, SourceFrame, Stage,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::WorkerError;

/// Minimum time between accepted live frames (about 30 fps).
pub const DEFAULT_MIN_FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// Keep-latest, drop-others frame admission.
#[derive(Debug, Clone)]
pub struct FrameThrottle {
    min_interval: Duration,
    last_accepted: Option<Instant>,
}

impl FrameThrottle {
    /// Create a throttle admitting at most one frame per `min_interval`.
    #[must_use]
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_accepted: None,
        }
    }

    /// The configured interval.
    #[must_use]
    pub const fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Decide whether a frame arriving at `now` is processed.
    ///
    /// The first frame is always accepted.
    pub fn accept(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_accepted
            && now.saturating_duration_since(last) < self.min_interval
        {
            return false;
        }
        self.last_accepted = Some(now);
        true
    }
}

impl Default for FrameThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_FRAME_INTERVAL)
    }
}

/// A value tagged with the submission order of the frame it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequenced<T> {
    /// Submission sequence number, starting at 1.
    pub sequence: u64,
    /// The payload.
    pub value: T,
}

/// Single-slot publication point that only moves forward in sequence.
///
/// Clones share the slot.
#[derive(Debug)]
pub struct LatestResult<T> {
    sender: Arc<watch::Sender<Option<Sequenced<T>>>>,
}

impl<T> Clone for LatestResult<T> {
    fn clone(&self) -> Self {
        Self {
            sender: Arc::clone(&self.sender),
        }
    }
}

impl<T> Default for LatestResult<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LatestResult<T> {
    /// An empty slot.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Store `value` unless the slot already holds a result from the
    /// same or a later submission. Returns whether it was stored.
    pub fn publish(&self, sequence: u64, value: T) -> bool {
        self.sender.send_if_modified(|slot| {
            if slot
                .as_ref()
                .is_some_and(|current| current.sequence >= sequence)
            {
                return false;
            }
            *slot = Some(Sequenced { sequence, value });
            true
        })
    }

    /// Sequence number of the stored result.
    #[must_use]
    pub fn latest_sequence(&self) -> Option<u64> {
        self.sender.borrow().as_ref().map(|current| current.sequence)
    }

    /// Receiver notified whenever a newer result is stored.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Sequenced<T>>> {
        self.sender.subscribe()
    }
}

impl<T: Clone> LatestResult<T> {
    /// A copy of the stored result.
    #[must_use]
    pub fn get(&self) -> Option<Sequenced<T>> {
        self.sender.borrow().clone()
    }
}

/// Settings read once per accepted frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LiveSettings {
    /// Pipeline parameters.
    pub parameters: PipelineParameters,
    /// Stage to compute and display.
    pub stage: Stage,
}

/// Outcome of one live frame: its preview or the error that stopped it.
pub type LiveOutcome = Result<Preview, PipelineError>;

/// A processed live frame.
pub type LiveResult = Sequenced<LiveOutcome>;

/// Throttled, out-of-order-safe live frame processor.
#[derive(Debug)]
pub struct LiveProcessor {
    throttle: Mutex<FrameThrottle>,
    next_sequence: AtomicU64,
    settings: watch::Sender<LiveSettings>,
    results: LatestResult<LiveOutcome>,
}

impl Default for LiveProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_FRAME_INTERVAL)
    }
}

impl LiveProcessor {
    /// Create a processor admitting at most one frame per `min_interval`.
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        let (settings, _) = watch::channel(LiveSettings::default());
        Self {
            throttle: Mutex::new(FrameThrottle::new(min_interval)),
            next_sequence: AtomicU64::new(0),
            settings,
            results: LatestResult::new(),
        }
    }

    /// Current settings.
    #[must_use]
    pub fn settings(&self) -> LiveSettings {
        *self.settings.borrow()
    }

    /// Replace the parameters used by frames accepted from now on.
    pub fn set_parameters(&self, parameters: PipelineParameters) {
        let parameters = parameters.normalized();
        self.settings.send_modify(|s| s.parameters = parameters);
    }

    /// Select the stage computed for frames accepted from now on.
    pub fn set_stage(&self, stage: Stage) {
        self.settings.send_modify(|s| s.stage = stage);
    }

    /// Normalize and store a kernel size.
    pub fn set_kernel_size(&self, requested: i32) -> KernelSize {
        let kernel = KernelSize::new(requested);
        self.settings.send_modify(|s| s.parameters.kernel_size = kernel);
        kernel
    }

    /// Clamp and store threshold overrides (`None` for auto).
    pub fn set_thresholds(&self, low: Option<i32>, high: Option<i32>) {
        self.settings
            .send_modify(|s| s.parameters.set_thresholds(low, high));
    }

    /// Offer a frame arriving now.
    ///
    /// # Errors
    ///
    /// See [`submit_at`](Self::submit_at).
    pub fn submit(&self, frame: SourceFrame) -> Result<Option<JoinHandle<bool>>, WorkerError> {
        self.submit_at(frame, Instant::now())
    }

    /// Offer a frame arriving at `now`.
    ///
    /// Returns `None` if the throttle dropped the frame. Otherwise the
    /// frame is processed on a blocking task whose handle resolves to
    /// whether its result was published.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::NoRuntime`] outside a tokio runtime.
    pub fn submit_at(
        &self,
        frame: SourceFrame,
        now: Instant,
    ) -> Result<Option<JoinHandle<bool>>, WorkerError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| WorkerError::NoRuntime)?;
        let sequence = {
            let mut throttle = self.throttle.lock().unwrap_or_else(PoisonError::into_inner);
            if !throttle.accept(now) {
                tracing::trace!("live frame dropped by throttle");
                return Ok(None);
            }
            self.next_sequence.fetch_add(1, Ordering::Relaxed) + 1
        };
        let settings = self.settings();
        let results = self.results.clone();
        Ok(Some(runtime.spawn_blocking(move || {
            process_frame(sequence, frame, settings, &results)
        })))
    }

    /// Number of frames accepted so far.
    #[must_use]
    pub fn accepted(&self) -> u64 {
        self.next_sequence.load(Ordering::Relaxed)
    }

    /// The newest published result.
    #[must_use]
    pub fn latest(&self) -> Option<LiveResult> {
        self.results.get()
    }

    /// Receiver notified whenever a newer result is published.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<LiveResult>> {
        self.results.subscribe()
    }
}

fn process_frame(
    sequence: u64,
    frame: SourceFrame,
    settings: LiveSettings,
    results: &LatestResult<LiveOutcome>,
) -> bool {
    let outcome = frame.into_rgba().and_then(|original| {
        cannyedge_pipeline::preview(original, settings.parameters, settings.stage)
    });
    if let Err(ref err) = outcome {
        tracing::warn!(sequence, error = %err, "live frame failed");
    }
    let published = results.publish(sequence, outcome);
    if !published {
        tracing::debug!(sequence, "discarding out-of-order live result");
    }
    published
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use cannyedge_pipeline::{PixelFormat, Threshold};

    fn gray_frame(value: u8) -> SourceFrame {
        SourceFrame {
            width: 6,
            height: 6,
            format: PixelFormat::Luma8,
            data: vec![value; 36],
        }
    }

    #[test]
    fn throttle_at_100_hz_admits_about_30_per_second() {
        let mut throttle = FrameThrottle::default();
        let start = Instant::now();
        let accepted = (0..100)
            .filter(|&i| throttle.accept(start + Duration::from_millis(i * 10)))
            .count();
        // Every 40 ms: 0, 40, ..., 960.
        assert_eq!(accepted, 25);
        assert!(accepted <= 30);
    }

    #[test]
    fn throttle_accepts_first_and_exact_interval() {
        let mut throttle = FrameThrottle::new(Duration::from_millis(33));
        let start = Instant::now();
        assert!(throttle.accept(start));
        assert!(!throttle.accept(start + Duration::from_millis(32)));
        assert!(throttle.accept(start + Duration::from_millis(33)));
    }

    #[test]
    fn throttle_rejects_time_going_backwards() {
        let mut throttle = FrameThrottle::default();
        let start = Instant::now();
        assert!(throttle.accept(start + Duration::from_millis(100)));
        assert!(!throttle.accept(start));
    }

    #[test]
    fn older_result_never_replaces_newer() {
        let slot = LatestResult::new();
        assert!(slot.publish(2, "second"));
        assert!(!slot.publish(1, "first"));
        assert!(!slot.publish(2, "again"));
        assert_eq!(
            slot.get(),
            Some(Sequenced {
                sequence: 2,
                value: "second"
            })
        );
        assert!(slot.publish(3, "third"));
        assert_eq!(slot.latest_sequence(), Some(3));
    }

    #[test]
    fn clones_share_the_slot() {
        let slot = LatestResult::new();
        let other = slot.clone();
        assert!(other.publish(5, 50));
        assert!(!slot.publish(4, 40));
        assert_eq!(slot.get().unwrap().value, 50);
    }

    #[test]
    fn submit_outside_runtime_fails() {
        let live = LiveProcessor::default();
        let err = live.submit(gray_frame(0)).unwrap_err();
        assert_eq!(err, WorkerError::NoRuntime);
        assert_eq!(live.accepted(), 0);
    }

    #[test]
    fn settings_are_normalized() {
        let live = LiveProcessor::default();
        assert_eq!(live.set_kernel_size(4).get(), 5);
        live.set_thresholds(Some(200), Some(50));
        let parameters = live.settings().parameters;
        assert_eq!(parameters.low_threshold, Threshold::Override(50));
        assert_eq!(parameters.high_threshold, Threshold::Override(200));
    }

    #[tokio::test]
    async fn throttled_frames_do_not_consume_sequence_numbers() {
        let live = LiveProcessor::default();
        let start = Instant::now();
        let first = live.submit_at(gray_frame(10), start).unwrap().unwrap();
        assert!(live.submit_at(gray_frame(20), start + Duration::from_millis(5)).unwrap().is_none());
        let second = live
            .submit_at(gray_frame(30), start + Duration::from_millis(40))
            .unwrap()
            .unwrap();

        first.await.unwrap();
        second.await.unwrap();
        assert_eq!(live.accepted(), 2);
        let latest = live.latest().unwrap();
        assert_eq!(latest.sequence, 2);
        assert!(latest.value.is_ok());
    }

    #[tokio::test]
    async fn latest_submitted_frame_wins() {
        let live = LiveProcessor::new(Duration::ZERO);
        let start = Instant::now();
        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                live.submit_at(gray_frame(i * 30), start + Duration::from_millis(u64::from(i)))
                    .unwrap()
                    .unwrap()
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let latest = live.latest().unwrap();
        assert_eq!(latest.sequence, 8);
        let preview = latest.value.as_ref().unwrap();
        assert_eq!(preview.image.get_pixel(0, 0).0, [210, 210, 210, 255]);
    }

    #[tokio::test]
    async fn frame_uses_settings_at_submission() {
        let live = LiveProcessor::default();
        live.set_stage(Stage::Smoothed);
        let handle = live.submit(gray_frame(90)).unwrap().unwrap();
        live.set_stage(Stage::FinalEdges);
        assert!(handle.await.unwrap());

        let result = live.latest().unwrap();
        let preview = result.value.as_ref().unwrap();
        assert_eq!(preview.stage, Stage::Smoothed);
        assert_eq!(preview.image.get_pixel(3, 3).0, [90, 90, 90, 255]);
        assert!(preview.auto_thresholds.is_none());
    }

    #[tokio::test]
    async fn failed_frame_publishes_its_error() {
        let live = LiveProcessor::new(Duration::ZERO);
        let start = Instant::now();
        let mut frame = gray_frame(0);
        frame.data.pop();
        let handle = live.submit_at(frame, start).unwrap().unwrap();
        assert!(handle.await.unwrap());

        let failed = live.latest().unwrap();
        assert_eq!(failed.sequence, 1);
        assert!(failed.value.as_ref().unwrap_err().is_input_error());

        let handle = live
            .submit_at(gray_frame(40), start + Duration::from_millis(1))
            .unwrap()
            .unwrap();
        assert!(handle.await.unwrap());
        let recovered = live.latest().unwrap();
        assert_eq!(recovered.sequence, 2);
        assert!(recovered.value.is_ok());
    }

    #[test]
    fn late_failure_never_hides_a_newer_preview() {
        let slot: LatestResult<Result<u8, PipelineError>> = LatestResult::new();
        assert!(slot.publish(2, Ok(7)));
        assert!(!slot.publish(1, Err(PipelineError::Compute("late".into()))));
        assert_eq!(slot.get().unwrap().value, Ok(7));
    }
}
