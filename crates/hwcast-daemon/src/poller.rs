//! Periodic sample → store → broadcast loop.

use hwcast_hw::SamplerBackend;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::snapshot;
use crate::state::AppState;

/// Lifecycle of the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Stopped,
    Running,
    Stopping,
}

/// Failures that end the poll loop.
#[derive(Debug, Error)]
pub enum PollError {
    /// The sampler panicked or its blocking task was lost.
    #[error("Sampler task failed: {0}")]
    SamplerTask(String),

    /// The snapshot could not be serialized for broadcast.
    #[error("Failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

type SharedBackend = Arc<Mutex<Box<dyn SamplerBackend>>>;

/// Cloneable handle that requests the poll loop to stop.
#[derive(Clone)]
pub struct StopSignal(Arc<watch::Sender<bool>>);

impl StopSignal {
    /// Requests shutdown. Safe to call any number of times from anywhere.
    pub fn stop(&self) {
        self.0.send_replace(true);
    }
}

/// Owner's handle to a running poll loop.
pub struct PollerHandle {
    stop: StopSignal,
    state: watch::Receiver<PollState>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Requests shutdown without waiting for it.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Returns a signal that can stop the loop from other tasks.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PollState {
        *self.state.borrow()
    }

    /// Waits for the loop to finish, including backend release.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            error!("Poll loop task failed: {}", e);
        }
    }

    /// Stops the loop and waits for it to finish.
    pub async fn shutdown(self) {
        self.stop();
        self.join().await;
    }
}

/// The poll loop: samples the backend, stores the snapshot and broadcasts
/// it, once per interval.
pub struct Poller {
    backend: SharedBackend,
    state: Arc<AppState>,
    interval: Duration,
    log_snapshots: bool,
}

impl Poller {
    pub fn new<B>(backend: B, state: Arc<AppState>, interval: Duration) -> Self
    where
        B: SamplerBackend + 'static,
    {
        let backend: Box<dyn SamplerBackend> = Box::new(backend);
        Self {
            backend: Arc::new(Mutex::new(backend)),
            state,
            interval,
            log_snapshots: false,
        }
    }

    /// Logs each cycle's snapshot as JSON at debug level.
    pub fn log_snapshots(mut self, enable: bool) -> Self {
        self.log_snapshots = enable;
        self
    }

    /// Starts the loop on the runtime.
    pub fn spawn(self) -> PollerHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(PollState::Running);
        let task = tokio::spawn(self.run(stop_rx, state_tx));
        PollerHandle {
            stop: StopSignal(Arc::new(stop_tx)),
            state: state_rx,
            task,
        }
    }

    async fn run(self, mut stop_rx: watch::Receiver<bool>, state_tx: watch::Sender<PollState>) {
        info!("Poll loop starting (interval {:?})", self.interval);
        let mut failures = FailureLog::default();

        let outcome = loop {
            if *stop_rx.borrow() {
                break Ok(());
            }
            if let Err(e) = self.cycle(&mut failures).await {
                break Err(e);
            }
            if *stop_rx.borrow() {
                break Ok(());
            }
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = stop_rx.changed() => {
                    if changed.is_err() {
                        debug!("Poll loop handle dropped");
                        break Ok(());
                    }
                }
            }
        };

        state_tx.send_replace(PollState::Stopping);
        match outcome {
            Ok(()) => info!("Poll loop stopping"),
            Err(e) => error!("Poll loop terminated: {}", e),
        }

        let backend = Arc::clone(&self.backend);
        let closed = tokio::task::spawn_blocking(move || {
            let mut backend = backend.lock().unwrap_or_else(PoisonError::into_inner);
            backend.close();
        })
        .await;
        if let Err(e) = closed {
            warn!("Failed to close sampler backend: {}", e);
        }

        state_tx.send_replace(PollState::Stopped);
        info!("Poll loop stopped");
    }

    /// One sample → build → replace → publish pass.
    ///
    /// A failed sample is logged and skipped; anything else is fatal.
    async fn cycle(&self, failures: &mut FailureLog) -> Result<(), PollError> {
        let backend = Arc::clone(&self.backend);
        let sampled = tokio::task::spawn_blocking(move || {
            let mut backend = backend.lock().unwrap_or_else(PoisonError::into_inner);
            backend.sample()
        })
        .await
        .map_err(|e| PollError::SamplerTask(e.to_string()))?;

        let devices = match sampled {
            Ok(devices) => {
                failures.clear();
                devices
            }
            Err(e) => {
                failures.record(&e);
                return Ok(());
            }
        };

        let snapshot = self.state.store().replace(snapshot::build(&devices));
        if self.log_snapshots {
            debug!("Hardware data: {}", serde_json::to_string(&*snapshot)?);
        }

        // Only enqueues; sends run on each subscriber's own task
        let report = self.state.broadcaster().publish(&snapshot)?;
        if report.dropped > 0 {
            debug!(
                "Broadcast queued for {}, dropped {}",
                report.queued, report.dropped
            );
        }
        Ok(())
    }
}

/// Rate-limits sampling failure warnings to one per minute.
#[derive(Default)]
struct FailureLog {
    consecutive: u32,
    last_logged: Option<Instant>,
}

impl FailureLog {
    fn record(&mut self, e: &hwcast_hw::Error) {
        self.consecutive += 1;
        match self.last_logged {
            None => warn!("Sampling error, keeping previous snapshot: {}", e),
            Some(at) if at.elapsed() >= Duration::from_secs(60) => warn!(
                "Sampling error (failing for {} cycles), keeping previous snapshot: {}",
                self.consecutive, e
            ),
            Some(_) => return,
        }
        self.last_logged = Some(Instant::now());
    }

    fn clear(&mut self) {
        if self.consecutive > 0 {
            info!("Sampling recovered after {} failed cycles", self.consecutive);
        }
        self.consecutive = 0;
        self.last_logged = None;
    }
}
