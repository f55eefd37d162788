//! # LiDAR Replay Core
//!
//! Platform-independent building blocks for replaying recorded point clouds.
//!
//! This crate contains pure loading and timing logic with **no async runtime and
//! no filesystem access**. Where frames come from is abstracted through the
//! [`FrameSource`] trait, and how they are decoded through [`FrameDecoder`].
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  lidar-replay-core (no tokio, no fs)                        │
//! │  ├── point/       (XYZI binary decoding)                    │
//! │  ├── cloud/       (PointCloud2-style message)               │
//! │  ├── source/      (FrameSource, FrameDecoder)               │
//! │  ├── frame_store/ (ordered in-memory recording)             │
//! │  └── playback/    (cursor & state machine)                  │
//! └─────────────────────────────────────────────────────────────┘
//!                 ▲
//!    ┌────────────┴────────────┐
//!    │  lidar-replay-server    │
//!    │  (tokio scheduler, ws)  │
//!    └─────────────────────────┘
//! ```
//!
//! ## Example: Loading And Stepping
//!
//! ```rust
//! use lidar_replay_core::{CloudDecoder, FrameStore, PlaybackCursor, PointCloudMessage};
//!
//! let scan: Vec<u8> = [1.0f32, 2.0, 3.0, 0.5]
//!     .iter()
//!     .flat_map(|v| v.to_le_bytes())
//!     .collect();
//! let store: FrameStore<PointCloudMessage> = FrameStore::build(
//!     &[1000, 1500],
//!     &[scan.clone(), scan],
//!     &CloudDecoder::default(),
//! )
//! .unwrap();
//!
//! let sequence = store.sequence();
//! let mut cursor = PlaybackCursor::new(sequence.len());
//! let emission = cursor.step(sequence.timestamps(), 100);
//! assert_eq!(emission.index, 0);
//! assert_eq!(emission.wait_ns, 500);
//! ```

pub mod cloud;
pub mod error;
pub mod frame_store;
pub mod playback;
pub mod point;
pub mod source;

pub use cloud::{PointCloudMessage, PointField, PointFieldType, Stamp, DEFAULT_FRAME_ID};
pub use error::{DeliveryError, LoadError, SchedulerError};
pub use frame_store::{Frame, FrameSequence, FrameStore, SkipReason, SkippedSource};
pub use playback::{Emission, PlaybackCursor, PlaybackState, DEFAULT_BOUNDARY_WAIT};
pub use point::{decode_points, PointXyzi};
pub use source::{CloudDecoder, FrameDecoder, FrameSource};
