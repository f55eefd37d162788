//! Abstractions over where raw frames come from and how they are decoded.
//!
//! The core never touches the filesystem. A host supplies [`FrameSource`]
//! implementations (files, memory, network captures) and a [`FrameDecoder`]
//! that turns their bytes into payloads.
//!
//! ```rust
//! use lidar_replay_core::source::{FrameDecoder, FrameSource};
//! use lidar_replay_core::CloudDecoder;
//!
//! let raw: Vec<u8> = [1.0f32, 2.0, 3.0, 0.5]
//!     .iter()
//!     .flat_map(|v| v.to_le_bytes())
//!     .collect();
//! let decoder = CloudDecoder::default();
//! let msg = decoder.decode(&raw.read().unwrap(), 1_000).unwrap();
//! assert_eq!(msg.width, 1);
//! ```

use std::io;

use crate::cloud::{PointCloudMessage, DEFAULT_FRAME_ID};
use crate::point::decode_points;

/// A single readable frame, e.g. one `.bin` file
pub trait FrameSource {
    /// Human-readable name used in skip reports
    fn describe(&self) -> String;

    /// Read the raw bytes of the frame
    fn read(&self) -> io::Result<Vec<u8>>;
}

impl FrameSource for Vec<u8> {
    fn describe(&self) -> String {
        format!("<memory, {} bytes>", self.len())
    }

    fn read(&self) -> io::Result<Vec<u8>> {
        Ok(self.clone())
    }
}

/// Turns raw frame bytes into a payload
pub trait FrameDecoder {
    type Payload;

    /// Decode `raw` captured at `timestamp_ns`.
    ///
    /// Returns `None` when the bytes hold no points; such frames are skipped.
    fn decode(&self, raw: &[u8], timestamp_ns: i64) -> Option<Self::Payload>;
}

/// Decodes Velodyne XYZI scans into [`PointCloudMessage`]s
#[derive(Debug, Clone)]
pub struct CloudDecoder {
    frame_id: String,
}

impl CloudDecoder {
    pub fn new(frame_id: &str) -> Self {
        Self {
            frame_id: frame_id.to_string(),
        }
    }

    pub fn frame_id(&self) -> &str {
        &self.frame_id
    }
}

impl Default for CloudDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_ID)
    }
}

impl FrameDecoder for CloudDecoder {
    type Payload = PointCloudMessage;

    fn decode(&self, raw: &[u8], timestamp_ns: i64) -> Option<PointCloudMessage> {
        let points = decode_points(raw);
        if points.is_empty() {
            return None;
        }
        Some(PointCloudMessage::from_points(
            &points,
            timestamp_ns,
            &self.frame_id,
        ))
    }
}
