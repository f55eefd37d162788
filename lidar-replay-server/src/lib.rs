//! # LiDAR Replay Server
//!
//! Replays a recorded LiDAR drive at its original capture timing, looping
//! forever, and streams each scan to subscribers over WebSocket.
//!
//! ## Architecture
//!
//! The server is built on top of [`lidar_replay_core`] for loading and timing
//! rules, with [`tokio`] providing the async runtime.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  lidar-replay-server                    │
//! │  ┌─────────────┐  ┌─────────────┐  ┌──────────────────┐ │
//! │  │ REST API    │  │ WebSocket   │  │ --output         │ │
//! │  │ (axum)      │  │ (clouds)    │  │ (stdout)         │ │
//! │  └──────┬──────┘  └──────┬──────┘  └────────┬─────────┘ │
//! │         │                ▼                  │           │
//! │         │         ┌─────────────────────────┴─────────┐ │
//! │         │         │ CloudPublisher (broadcast)        │ │
//! │         │         └─────────────────▲─────────────────┘ │
//! │         ▼                           │                   │
//! │  ┌─────────────────────────────────────────────────────┐│
//! │  │              PlaybackScheduler (tokio task)         ││
//! │  │  - wait → emit → advance → recompute wait           ││
//! │  └─────────────────────────────────────────────────────┘│
//! │                             ▲                           │
//! │  ┌─────────────────────────────────────────────────────┐│
//! │  │              Dataset → FrameStore (startup)         ││
//! │  └─────────────────────────────────────────────────────┘│
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Components
//!
//! - [`Session`] - Shared application state
//! - [`dataset::Dataset`] - KITTI drive discovery and loading
//! - [`scheduler::PlaybackScheduler`] - Timed, looping emission of frames
//! - [`publisher::CloudPublisher`] - Broadcast transport for emitted frames
//!
//! ## REST API
//!
//! | Endpoint | Description |
//! |----------|-------------|
//! | `GET /v1/api/status` | Playback status |
//! | `GET /v1/api/frames` | Loaded recording summary |
//! | `WS /v1/api/stream` | One bincode `PointCloudMessage` per emission |
//!
//! ## Command-Line Interface
//!
//! See [`Cli`] for all available options. Key options:
//!
//! - `DATA_PATH` - Root of a KITTI drive, e.g. `2011_09_26_drive_0013_sync`
//! - `-p, --port` - HTTP server port (default: 6503)
//! - `--boundary-wait-ms` - Pause between the last and first frame (default: 100)
//! - `-v` - Increase verbosity (use multiple times)

extern crate tokio;

use clap::Parser;
use std::{
    path::PathBuf,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};
use thiserror::Error;

use lidar_replay_core::{LoadError, SchedulerError, DEFAULT_FRAME_ID};

pub mod config;
pub mod dataset;
pub mod playback;
pub mod publisher;
pub mod scheduler;
pub mod timestamps;

use dataset::FramesSummary;
use publisher::CloudPublisher;
use scheduler::{PlaybackHandle, PlaybackStatus};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Clone, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,

    /// Root of the recorded drive
    pub data_path: PathBuf,

    /// Stream name, also stamped as the frame id of every cloud
    #[arg(short, long, default_value = DEFAULT_FRAME_ID)]
    pub topic: String,

    /// Sensor directory below the data path
    #[arg(long, default_value = config::DEFAULT_SENSOR_DIR)]
    pub sensor_dir: String,

    /// Timestamps file inside the sensor directory
    #[arg(long, default_value = config::DEFAULT_TIMESTAMPS_FILE)]
    pub timestamps_file: String,

    /// Directory with the binary scans inside the sensor directory
    #[arg(long, default_value = config::DEFAULT_DATA_DIR)]
    pub data_dir: String,

    /// Extension of the binary scan files
    #[arg(long, default_value = config::DEFAULT_EXTENSION)]
    pub extension: String,

    /// Wait after the last frame before starting over, in milliseconds
    #[arg(long, default_value_t = 100)]
    pub boundary_wait_ms: u64,

    /// Start playback this many milliseconds after process start, so that
    /// several replay processes can begin together
    #[arg(long, default_value_t = 0)]
    pub sync_delay_ms: u64,

    /// Number of frames kept for slow subscribers before they skip
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u16).range(1..))]
    pub history_depth: u16,

    /// Port for webserver
    #[arg(short, long, default_value_t = 6503)]
    pub port: u16,

    /// Do not start the webserver
    #[arg(long, default_value_t = false)]
    pub no_web: bool,

    /// Write a line per emitted frame to stdout
    #[arg(long, default_value_t = false)]
    pub output: bool,
}

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("{0}")]
    Load(#[from] LoadError),
    #[error("{0}")]
    Scheduler(#[from] SchedulerError),
    #[error("I/O operation failed")]
    Io(#[from] std::io::Error),
}

pub struct SessionInner {
    pub args: Cli,
    pub publisher: CloudPublisher,
    pub frames: FramesSummary,
    /// Set once playback has started
    pub playback: Option<PlaybackHandle>,
}

#[derive(Clone)]
pub struct Session {
    pub inner: Arc<RwLock<SessionInner>>,
}

impl Session {
    pub fn new(args: Cli, publisher: CloudPublisher, frames: FramesSummary) -> Self {
        Session {
            inner: Arc::new(RwLock::new(SessionInner {
                args,
                publisher,
                frames,
                playback: None,
            })),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, SessionInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, SessionInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn args(&self) -> Cli {
        self.read().args.clone()
    }

    pub fn publisher(&self) -> CloudPublisher {
        self.read().publisher.clone()
    }

    pub fn frames(&self) -> FramesSummary {
        self.read().frames.clone()
    }

    pub fn set_playback(&self, handle: PlaybackHandle) {
        self.write().playback = Some(handle);
    }

    /// Current playback status, `idle` until playback has started
    pub fn playback_status(&self) -> PlaybackStatus {
        let inner = self.read();
        match &inner.playback {
            Some(handle) => handle.status(),
            None => PlaybackStatus::idle(
                inner.frames.frame_count,
                config::boundary_wait(&inner.args),
            ),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Session {{ }}")
    }
}
