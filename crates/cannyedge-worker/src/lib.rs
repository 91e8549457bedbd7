//! cannyedge-worker: Off-thread pipeline processing.
//!
//! Two scheduling modes sit on top of `cannyedge-pipeline`:
//!
//! - [`CaptureWorker`] owns an [`Orchestrator`](cannyedge_pipeline::Orchestrator)
//!   on a background task. Every command cancels the run in flight, so
//!   only the most recent request ever publishes a result.
//! - [`LiveProcessor`] throttles incoming frames and processes each
//!   accepted frame independently. Results carry a sequence number and
//!   an older frame never replaces a newer one.
//!
//! Both publish through `tokio::sync::watch` channels, so readers only
//! ever see the latest result.

pub mod capture;
pub mod live;

pub use capture::{CaptureSnapshot, CaptureWorker, Command};
pub use live::{
    DEFAULT_MIN_FRAME_INTERVAL, FrameThrottle, LatestResult, LiveOutcome, LiveProcessor,
    LiveResult, LiveSettings, Sequenced,
};

/// Errors raised by the worker plumbing itself.
///
/// Pipeline failures are not worker errors; they travel inside the
/// published snapshots.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkerError {
    /// No tokio runtime is available to spawn the worker on.
    #[error("no tokio runtime available")]
    NoRuntime,

    /// The worker task has stopped and no longer accepts commands.
    #[error("worker has shut down")]
    Closed,
}
