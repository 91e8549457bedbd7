//! Capture-mode worker with last-request-wins scheduling.
//!
//! A single background task owns the [`Orchestrator`] and its stage
//! buffers. Callers send [`Command`]s; each one gets a generation number
//! and cancels the run in flight. The task drains every queued command,
//! applies them in order, and runs the orchestrator once off the async
//! runtime. Only a run whose generation is still the latest publishes a
//! [`CaptureSnapshot`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use cannyedge_pipeline::diagnostics::Clock;
use cannyedge_pipeline::{
    AutoThresholds, CancelToken, CaptureState, EffectiveThresholds, Orchestrator, PipelineError,
    PipelineParameters, RgbaImage, RunOutcome, SourceFrame, Stage,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::WorkerError;

/// A request for the capture worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Load a captured frame and run the full pipeline.
    Capture(SourceFrame),
    /// Display another stage, computing it if needed.
    SelectStage(Stage),
    /// Change the smoothing kernel size. Normalized, never rejected.
    SetKernelSize(i32),
    /// Change the threshold overrides. `None` selects the auto value.
    SetThresholds {
        /// Low threshold override.
        low: Option<i32>,
        /// High threshold override.
        high: Option<i32>,
    },
    /// Drop the frame and every stage buffer.
    Reset,
}

/// What the capture worker last published.
#[derive(Debug, Clone)]
pub struct CaptureSnapshot {
    /// Generation of the newest command reflected here. Zero before any
    /// command was processed.
    pub generation: u64,
    /// Capture state after the run.
    pub state: CaptureState,
    /// Selected stage.
    pub stage: Stage,
    /// Parameters the run used.
    pub parameters: PipelineParameters,
    /// Auto thresholds of the current frame.
    pub auto_thresholds: AutoThresholds,
    /// Thresholds the classifier uses.
    pub effective_thresholds: EffectiveThresholds,
    /// Image to display, `None` without a frame.
    pub display: Option<Arc<RgbaImage>>,
    /// Input error or step failure raised while handling the commands.
    pub error: Option<PipelineError>,
}

impl CaptureSnapshot {
    fn of<C: Clock>(
        generation: u64,
        orchestrator: &Orchestrator<C>,
        error: Option<PipelineError>,
    ) -> Self {
        Self {
            generation,
            state: orchestrator.state(),
            stage: orchestrator.stage(),
            parameters: *orchestrator.parameters(),
            auto_thresholds: orchestrator.auto_thresholds(),
            effective_thresholds: orchestrator.effective_thresholds(),
            display: orchestrator.display().cloned().map(Arc::new),
            error,
        }
    }
}

#[derive(Debug)]
struct Request {
    generation: u64,
    command: Command,
}

/// State shared by the handle and the background task.
///
/// `in_flight` also serializes submissions, so channel order matches
/// generation order.
#[derive(Debug, Default)]
struct Shared {
    latest: AtomicU64,
    in_flight: Mutex<CancelToken>,
}

impl Shared {
    fn lock(&self) -> std::sync::MutexGuard<'_, CancelToken> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install a fresh token for a run covering `generation`.
    ///
    /// The token starts cancelled if a newer command was submitted in
    /// the meantime.
    fn begin_run(&self, generation: u64) -> CancelToken {
        let token = CancelToken::new();
        *self.lock() = token.clone();
        if self.latest.load(Ordering::Acquire) != generation {
            token.cancel();
        }
        token
    }

    fn is_latest(&self, generation: u64) -> bool {
        self.latest.load(Ordering::Acquire) == generation
    }
}

/// Handle to a background capture worker.
///
/// Dropping the handle stops the worker once its queue is drained.
#[derive(Debug)]
pub struct CaptureWorker {
    commands: mpsc::UnboundedSender<Request>,
    shared: Arc<Shared>,
    snapshots: watch::Receiver<CaptureSnapshot>,
    task: JoinHandle<()>,
}

impl CaptureWorker {
    /// Spawn a worker with a fresh orchestrator on the current tokio
    /// runtime.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::NoRuntime`] outside a tokio runtime.
    pub fn spawn() -> Result<Self, WorkerError> {
        Self::with_orchestrator(Orchestrator::new())
    }

    /// Spawn a worker around an existing orchestrator.
    ///
    /// If a run aborts, the worker continues with a fresh orchestrator
    /// built from `C::default()` and the last known parameters.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::NoRuntime`] outside a tokio runtime.
    pub fn with_orchestrator<C>(orchestrator: Orchestrator<C>) -> Result<Self, WorkerError>
    where
        C: Clock + Default + Send + 'static,
    {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| WorkerError::NoRuntime)?;
        let (commands, queue) = mpsc::unbounded_channel();
        let (publisher, snapshots) = watch::channel(CaptureSnapshot::of(0, &orchestrator, None));
        let shared = Arc::new(Shared::default());
        let task = runtime.spawn(worker_loop(
            orchestrator,
            queue,
            Arc::clone(&shared),
            publisher,
        ));
        Ok(Self {
            commands,
            shared,
            snapshots,
            task,
        })
    }

    /// Queue a command, cancelling the run in flight.
    ///
    /// Returns the command's generation.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Closed`] if the worker task has stopped.
    pub fn submit(&self, command: Command) -> Result<u64, WorkerError> {
        let in_flight = self.shared.lock();
        let generation = self.shared.latest.load(Ordering::Acquire) + 1;
        self.commands
            .send(Request {
                generation,
                command,
            })
            .map_err(|_| WorkerError::Closed)?;
        self.shared.latest.store(generation, Ordering::Release);
        in_flight.cancel();
        drop(in_flight);
        tracing::trace!(generation, "capture command queued");
        Ok(generation)
    }

    /// Capture `frame` and run the full pipeline on it.
    ///
    /// # Errors
    ///
    /// See [`submit`](Self::submit).
    pub fn capture(&self, frame: SourceFrame) -> Result<u64, WorkerError> {
        self.submit(Command::Capture(frame))
    }

    /// Display `stage`.
    ///
    /// # Errors
    ///
    /// See [`submit`](Self::submit).
    pub fn select_stage(&self, stage: Stage) -> Result<u64, WorkerError> {
        self.submit(Command::SelectStage(stage))
    }

    /// Change the smoothing kernel size.
    ///
    /// # Errors
    ///
    /// See [`submit`](Self::submit).
    pub fn set_kernel_size(&self, requested: i32) -> Result<u64, WorkerError> {
        self.submit(Command::SetKernelSize(requested))
    }

    /// Change the threshold overrides.
    ///
    /// # Errors
    ///
    /// See [`submit`](Self::submit).
    pub fn set_thresholds(&self, low: Option<i32>, high: Option<i32>) -> Result<u64, WorkerError> {
        self.submit(Command::SetThresholds { low, high })
    }

    /// Return to the not-captured state.
    ///
    /// # Errors
    ///
    /// See [`submit`](Self::submit).
    pub fn reset(&self) -> Result<u64, WorkerError> {
        self.submit(Command::Reset)
    }

    /// Generation of the newest submitted command.
    #[must_use]
    pub fn latest_generation(&self) -> u64 {
        self.shared.latest.load(Ordering::Acquire)
    }

    /// The most recently published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> CaptureSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver that is notified on every publication.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CaptureSnapshot> {
        self.snapshots.clone()
    }

    /// Wait until a snapshot covering `generation` is published.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Closed`] if the worker stops first.
    pub async fn settled(&self, generation: u64) -> Result<CaptureSnapshot, WorkerError> {
        let mut snapshots = self.snapshots.clone();
        let snapshot = snapshots
            .wait_for(|snapshot| snapshot.generation >= generation)
            .await
            .map_err(|_| WorkerError::Closed)?;
        Ok(snapshot.clone())
    }

    /// Cancel the run in flight and wait for the worker task to exit.
    pub async fn shutdown(self) {
        let Self {
            commands,
            shared,
            task,
            ..
        } = self;
        drop(commands);
        shared.lock().cancel();
        if let Err(err) = task.await {
            tracing::warn!(error = %err, "capture worker exited abnormally");
        }
    }
}

async fn worker_loop<C>(
    mut orchestrator: Orchestrator<C>,
    mut queue: mpsc::UnboundedReceiver<Request>,
    shared: Arc<Shared>,
    publisher: watch::Sender<CaptureSnapshot>,
) where
    C: Clock + Default + Send + 'static,
{
    // Input error of a rejected frame, held until a snapshot reports it.
    let mut pending_error: Option<PipelineError> = None;

    while let Some(first) = queue.recv().await {
        let mut batch = vec![first];
        while let Ok(next) = queue.try_recv() {
            batch.push(next);
        }
        let generation = batch.last().map_or(0, |request| request.generation);
        let token = shared.begin_run(generation);
        let parameters = *orchestrator.parameters();
        tracing::debug!(generation, commands = batch.len(), "capture run starting");

        let mut pending = pending_error.take();
        let job = tokio::task::spawn_blocking(move || {
            let outcome = handle_batch(&mut orchestrator, batch, &mut pending, &token);
            (orchestrator, pending, outcome)
        });
        let (returned, pending, outcome) = match job.await {
            Ok(parts) => parts,
            Err(err) => {
                tracing::error!(generation, error = %err, "capture run aborted, starting over");
                orchestrator = Orchestrator::with_clock(C::default());
                orchestrator.update_parameters(parameters);
                if shared.is_latest(generation) {
                    let error = PipelineError::Compute(format!("capture run aborted: {err}"));
                    let snapshot = CaptureSnapshot::of(generation, &orchestrator, Some(error));
                    publisher.send_replace(snapshot);
                }
                continue;
            }
        };
        orchestrator = returned;
        pending_error = pending;

        let error = match outcome {
            Ok(RunOutcome::Cancelled) => {
                tracing::debug!(generation, "capture run cancelled");
                continue;
            }
            Ok(RunOutcome::Completed) => pending_error.clone(),
            Err(err) => Some(err),
        };
        if !shared.is_latest(generation) {
            tracing::debug!(generation, "discarding stale capture result");
            continue;
        }
        pending_error = None;
        publisher.send_replace(CaptureSnapshot::of(generation, &orchestrator, error));
    }
    tracing::debug!("capture worker stopped");
}

/// Apply a drained batch and run the orchestrator once.
///
/// `pending` carries the input error of the newest rejected frame. A
/// later accepted frame or a reset clears it.
fn handle_batch<C: Clock>(
    orchestrator: &mut Orchestrator<C>,
    batch: Vec<Request>,
    pending: &mut Option<PipelineError>,
    token: &CancelToken,
) -> Result<RunOutcome, PipelineError> {
    for Request { command, .. } in batch {
        match command {
            Command::Capture(frame) => *pending = orchestrator.load_frame(frame).err(),
            Command::SelectStage(stage) => orchestrator.select_stage(stage),
            Command::SetKernelSize(requested) => {
                let kernel = orchestrator.update_kernel_size(requested);
                tracing::trace!(requested, kernel = kernel.get(), "kernel size updated");
            }
            Command::SetThresholds { low, high } => orchestrator.update_thresholds(low, high),
            Command::Reset => {
                orchestrator.reset();
                *pending = None;
            }
        }
    }
    orchestrator.run(token)
}
