//! Playback cursor and state machine.
//!
//! This module holds the timing rules of playback with no clock attached:
//! given the capture timestamps it decides which frame goes out next and how
//! long to wait before the one after. The async driver in the server crate
//! only sleeps and delivers.
//!
//! # State Transitions
//!
//! ```text
//!   Idle ──start()──► Armed ──fire──► Armed ──fire──► ...
//!    │                  │
//!    └────stop()────────┴──stop()──► Stopped
//! ```
//!
//! # Example
//!
//! ```rust
//! use lidar_replay_core::playback::PlaybackCursor;
//!
//! let timestamps = [1000, 1500, 5000];
//! let mut cursor = PlaybackCursor::new(timestamps.len());
//! let waits: Vec<i64> = (0..4)
//!     .map(|_| cursor.step(&timestamps, 100).wait_ns)
//!     .collect();
//! assert_eq!(waits, vec![500, 3500, 100, 500]);
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Wait used after the last frame, before wrapping to the first
pub const DEFAULT_BOUNDARY_WAIT: Duration = Duration::from_millis(100);

/// Lifecycle of a scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[repr(u8)]
pub enum PlaybackState {
    /// Constructed, not started
    #[default]
    Idle = 0,
    /// A timer is pending for the next frame
    Armed = 1,
    /// Terminal
    Stopped = 2,
}

impl PlaybackState {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => PlaybackState::Idle,
            1 => PlaybackState::Armed,
            _ => PlaybackState::Stopped,
        }
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Armed => write!(f, "armed"),
            PlaybackState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Result of one firing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Emission {
    /// Frame to deliver now
    pub index: usize,
    /// True if the cursor wrapped back to frame 0 for this emission
    pub wrapped: bool,
    /// Signed wait before the next firing, in nanoseconds. Not clamped:
    /// out-of-order capture timestamps give zero or negative values. Gaps
    /// wider than the `i64` range saturate at `i64::MIN` / `i64::MAX`.
    pub wait_ns: i64,
}

/// Index into a frame sequence, advanced once per emission.
///
/// The raw position may equal `len` between firings; the wraparound is
/// applied at the start of the next [`step`](PlaybackCursor::step), before
/// anything is delivered.
#[derive(Debug, Clone)]
pub struct PlaybackCursor {
    position: usize,
    len: usize,
    emissions: u64,
    loops: u64,
}

impl PlaybackCursor {
    pub fn new(len: usize) -> Self {
        Self {
            position: 0,
            len,
            emissions: 0,
            loops: 0,
        }
    }

    /// Wait before the very first firing.
    ///
    /// This is the first capture interval, or the boundary wait when there
    /// is only one frame.
    pub fn initial_wait_ns(timestamps: &[i64], boundary_wait_ns: i64) -> i64 {
        match timestamps {
            [first, second, ..] => second.saturating_sub(*first),
            _ => boundary_wait_ns,
        }
    }

    /// Perform one firing: wrap if needed, pick the frame, compute the next
    /// wait and advance.
    ///
    /// `timestamps` must have the length given to [`PlaybackCursor::new`],
    /// which must be non-zero.
    pub fn step(&mut self, timestamps: &[i64], boundary_wait_ns: i64) -> Emission {
        debug_assert_eq!(timestamps.len(), self.len);

        let mut wrapped = false;
        if self.position == self.len {
            self.position = 0;
            self.loops += 1;
            wrapped = true;
        }

        let index = self.position;
        let wait_ns = if index + 1 != self.len {
            timestamps[index + 1].saturating_sub(timestamps[index])
        } else {
            boundary_wait_ns
        };

        self.position += 1;
        self.emissions += 1;

        Emission {
            index,
            wrapped,
            wait_ns,
        }
    }

    /// Index of the next frame to be delivered, always in `[0, len)`
    pub fn position(&self) -> usize {
        if self.position == self.len {
            0
        } else {
            self.position
        }
    }

    /// Number of completed wraparounds
    pub fn loops(&self) -> u64 {
        self.loops
    }

    pub fn emissions(&self) -> u64 {
        self.emissions
    }
}

/// Convert a signed wait to a sleep duration; zero and negative waits are due
/// immediately.
pub fn wait_to_duration(wait_ns: i64) -> Duration {
    if wait_ns > 0 {
        Duration::from_nanos(wait_ns as u64)
    } else {
        Duration::ZERO
    }
}

pub fn duration_to_wait(duration: Duration) -> i64 {
    duration.as_nanos().min(i64::MAX as u128) as i64
}
