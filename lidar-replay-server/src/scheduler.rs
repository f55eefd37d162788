//! Playback scheduler - emits a frame sequence at its capture timing, forever.
//!
//! ```text
//!  start()                 fire            fire            fire
//!    │◄── t1 - t0 ──►│◄── t1 - t0 ──►│◄── t2 - t1 ──►│ ... │◄ boundary ►│
//!                   f0              f1              f2         fN-1      f0
//! ```
//!
//! Each firing delivers one frame, then arms the timer for the next one. The
//! timing rules live in [`PlaybackCursor`]; this module only sleeps and calls
//! the sink. Deadlines are chained from the previous deadline rather than from
//! the wakeup time, so time spent delivering does not accumulate as drift.

use log::{debug, error, info, warn};
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use lidar_replay_core::playback::{duration_to_wait, wait_to_duration};
use lidar_replay_core::{
    DeliveryError, FrameSequence, PlaybackCursor, PlaybackState, SchedulerError,
    DEFAULT_BOUNDARY_WAIT,
};

/// Default lag after which the deadline chain is reset to the current time
pub const DEFAULT_RESYNC_AFTER: Duration = Duration::from_secs(1);

/// Furthest a single wait may push a deadline
const MAX_WAIT: Duration = Duration::from_secs(86400 * 365 * 30);

/// Deadline `wait_ns` after `from`; non-positive waits are due at `from`
fn deadline_after(from: Instant, wait_ns: i64) -> Instant {
    let wait = wait_to_duration(wait_ns).min(MAX_WAIT);
    from.checked_add(wait).unwrap_or(from)
}

/// Receiver of emitted frames.
///
/// Called from the scheduler task, one frame at a time and in order. Errors
/// and panics are counted and logged; playback continues with the next frame.
pub trait FrameSink<P>: Send + Sync + 'static {
    fn deliver(&self, payload: &Arc<P>, timestamp_ns: i64) -> Result<(), DeliveryError>;
}

impl<P, F> FrameSink<P> for F
where
    F: Fn(&Arc<P>, i64) -> Result<(), DeliveryError> + Send + Sync + 'static,
{
    fn deliver(&self, payload: &Arc<P>, timestamp_ns: i64) -> Result<(), DeliveryError> {
        self(payload, timestamp_ns)
    }
}

#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// Wait after the last frame before the first one is emitted again
    pub boundary_wait: Duration,
    /// How far behind its deadline the loop may fall before it stops trying
    /// to catch up
    pub resync_after: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            boundary_wait: DEFAULT_BOUNDARY_WAIT,
            resync_after: DEFAULT_RESYNC_AFTER,
        }
    }
}

impl PlaybackConfig {
    pub fn with_boundary_wait(boundary_wait: Duration) -> Self {
        Self {
            boundary_wait,
            ..Default::default()
        }
    }
}

/// Playback status information
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    /// Index of the next frame to be emitted
    pub frame: usize,
    pub frame_count: usize,
    pub emissions: u64,
    /// Completed passes over the whole sequence
    pub loops: u64,
    /// Capture timestamp of the last emitted frame
    pub last_timestamp_ns: Option<i64>,
    /// Signed wait that followed the last emission
    pub last_wait_ns: Option<i64>,
    pub boundary_wait_ms: u64,
    pub delivery_failures: u64,
}

impl PlaybackStatus {
    /// Status of a playback that has not started yet
    pub fn idle(frame_count: usize, boundary_wait: Duration) -> Self {
        Self {
            state: PlaybackState::Idle,
            frame: 0,
            frame_count,
            emissions: 0,
            loops: 0,
            last_timestamp_ns: None,
            last_wait_ns: None,
            boundary_wait_ms: boundary_wait.as_millis() as u64,
            delivery_failures: 0,
        }
    }
}

/// State shared between the scheduler, its handles and its task
#[derive(Debug)]
struct Shared {
    state: AtomicU8,
    boundary_wait: Duration,
    frame: AtomicUsize,
    frame_count: AtomicUsize,
    emissions: AtomicU64,
    loops: AtomicU64,
    last_timestamp_ns: AtomicI64,
    last_wait_ns: AtomicI64,
    delivery_failures: AtomicU64,
}

impl Shared {
    fn new(boundary_wait: Duration) -> Self {
        Self {
            state: AtomicU8::new(PlaybackState::Idle as u8),
            boundary_wait,
            frame: AtomicUsize::new(0),
            frame_count: AtomicUsize::new(0),
            emissions: AtomicU64::new(0),
            loops: AtomicU64::new(0),
            last_timestamp_ns: AtomicI64::new(0),
            last_wait_ns: AtomicI64::new(0),
            delivery_failures: AtomicU64::new(0),
        }
    }

    fn state(&self) -> PlaybackState {
        PlaybackState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: PlaybackState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn record(&self, cursor: &PlaybackCursor, timestamp_ns: i64, wait_ns: i64) {
        self.frame.store(cursor.position(), Ordering::Relaxed);
        self.loops.store(cursor.loops(), Ordering::Relaxed);
        self.last_timestamp_ns.store(timestamp_ns, Ordering::Relaxed);
        self.last_wait_ns.store(wait_ns, Ordering::Relaxed);
        self.emissions.store(cursor.emissions(), Ordering::Release);
    }

    fn status(&self) -> PlaybackStatus {
        let emissions = self.emissions.load(Ordering::Acquire);
        let emitted = |v: i64| if emissions > 0 { Some(v) } else { None };
        PlaybackStatus {
            state: self.state(),
            frame: self.frame.load(Ordering::Relaxed),
            frame_count: self.frame_count.load(Ordering::Relaxed),
            emissions,
            loops: self.loops.load(Ordering::Relaxed),
            last_timestamp_ns: emitted(self.last_timestamp_ns.load(Ordering::Relaxed)),
            last_wait_ns: emitted(self.last_wait_ns.load(Ordering::Relaxed)),
            boundary_wait_ms: self.boundary_wait.as_millis() as u64,
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
        }
    }
}

/// Cloneable control handle for a running playback
#[derive(Debug, Clone)]
pub struct PlaybackHandle {
    token: CancellationToken,
    shared: Arc<Shared>,
}

impl PlaybackHandle {
    /// Signal the playback to stop. No frame is delivered after this returns,
    /// except one whose delivery is already in progress.
    pub fn stop(&self) {
        self.shared.set_state(PlaybackState::Stopped);
        self.token.cancel();
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.state()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.shared.status()
    }
}

/// Drives a [`FrameSequence`] through a [`FrameSink`] on a tokio task.
///
/// A scheduler is single use: once stopped it cannot be started again.
/// Dropping it stops the playback.
pub struct PlaybackScheduler {
    config: PlaybackConfig,
    handle: PlaybackHandle,
    task: Option<JoinHandle<()>>,
}

impl PlaybackScheduler {
    pub fn new(config: PlaybackConfig) -> Self {
        let shared = Arc::new(Shared::new(config.boundary_wait));
        Self {
            config,
            handle: PlaybackHandle {
                token: CancellationToken::new(),
                shared,
            },
            task: None,
        }
    }

    /// Arm the first timer and return immediately.
    ///
    /// The first frame goes out after the first capture interval, or after
    /// the boundary wait for a single-frame sequence. Must be called from
    /// within a tokio runtime.
    pub fn start<P, S>(
        &mut self,
        sequence: Arc<FrameSequence<P>>,
        sink: S,
    ) -> Result<(), SchedulerError>
    where
        P: Send + Sync + 'static,
        S: FrameSink<P>,
    {
        match self.handle.state() {
            PlaybackState::Stopped => return Err(SchedulerError::Stopped),
            PlaybackState::Armed => return Err(SchedulerError::AlreadyStarted),
            PlaybackState::Idle => {}
        }
        if sequence.is_empty() {
            return Err(SchedulerError::EmptySequence);
        }
        let runtime = Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;

        let boundary_wait_ns = duration_to_wait(self.config.boundary_wait);
        let first_wait_ns = PlaybackCursor::initial_wait_ns(sequence.timestamps(), boundary_wait_ns);
        let deadline = deadline_after(Instant::now(), first_wait_ns);

        info!(
            "Starting playback of {} frames, first frame in {:?}",
            sequence.len(),
            wait_to_duration(first_wait_ns)
        );

        let shared = self.handle.shared.clone();
        shared.frame_count.store(sequence.len(), Ordering::Relaxed);
        shared.set_state(PlaybackState::Armed);

        let task = PlaybackTask {
            sequence,
            sink,
            token: self.handle.token.clone(),
            shared,
            boundary_wait_ns,
            resync_after: self.config.resync_after,
        };
        self.task = Some(runtime.spawn(task.run(deadline)));
        Ok(())
    }

    /// Cancel the pending timer. Idempotent; a stopped scheduler stays stopped.
    pub fn stop(&self) {
        if self.handle.state() != PlaybackState::Stopped {
            debug!("Stopping playback");
        }
        self.handle.stop();
    }

    pub fn handle(&self) -> PlaybackHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> PlaybackState {
        self.handle.state()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.handle.status()
    }

    /// Wait for the playback task to exit after a stop
    pub async fn join(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Playback task failed: {}", e);
            }
        }
    }
}

impl Drop for PlaybackScheduler {
    fn drop(&mut self) {
        self.handle.stop();
    }
}

/// Marks the playback stopped when the task exits, including by unwinding
struct StopOnExit(Arc<Shared>);

impl Drop for StopOnExit {
    fn drop(&mut self) {
        self.0.set_state(PlaybackState::Stopped);
    }
}

struct PlaybackTask<P, S> {
    sequence: Arc<FrameSequence<P>>,
    sink: S,
    token: CancellationToken,
    shared: Arc<Shared>,
    boundary_wait_ns: i64,
    resync_after: Duration,
}

impl<P, S> PlaybackTask<P, S>
where
    P: Send + Sync + 'static,
    S: FrameSink<P>,
{
    async fn run(self, mut deadline: Instant) {
        let _stopped = StopOnExit(self.shared.clone());
        let mut cursor = PlaybackCursor::new(self.sequence.len());

        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                _ = sleep_until(deadline) => {}
            }

            let emission = cursor.step(self.sequence.timestamps(), self.boundary_wait_ns);
            if emission.wrapped {
                debug!("Playback wrapped to the first frame (loop {})", cursor.loops());
            }
            let Some(frame) = self.sequence.get(emission.index) else {
                error!("Frame {} missing from sequence", emission.index);
                break;
            };

            self.deliver(emission.index, &frame.payload, frame.timestamp_ns);
            self.shared.record(&cursor, frame.timestamp_ns, emission.wait_ns);

            if self.token.is_cancelled() {
                break;
            }

            deadline = deadline_after(deadline, emission.wait_ns);
            let now = Instant::now();
            let behind = now.saturating_duration_since(deadline);
            if behind > self.resync_after {
                warn!("Playback is {:?} behind schedule, resynchronizing", behind);
                deadline = now;
            }
        }

        debug!(
            "Playback task exited after {} emissions",
            self.shared.emissions.load(Ordering::Acquire)
        );
    }

    fn deliver(&self, index: usize, payload: &Arc<P>, timestamp_ns: i64) {
        let result = catch_unwind(AssertUnwindSafe(|| self.sink.deliver(payload, timestamp_ns)));
        let failure = match result {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(panic) => panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "delivery panicked".to_string()),
        };
        self.shared.delivery_failures.fetch_add(1, Ordering::Relaxed);
        warn!("Delivery of frame {} failed: {}", index, failure);
    }
}
