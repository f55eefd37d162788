//! XYZI point records and the raw binary decoder.
//!
//! Velodyne scans are stored as consecutive little-endian `f32` quadruples:
//!
//! ```text
//! ┌────────┬────────┬────────┬───────────┐
//! │ x (m)  │ y (m)  │ z (m)  │ intensity │   16 bytes per point
//! └────────┴────────┴────────┴───────────┘
//! ```

use serde::{Deserialize, Serialize};

/// Size of one `f32` field in bytes
pub const FIELD_SIZE: usize = 4;

/// Size of one encoded point in bytes
pub const POINT_STEP: usize = 4 * FIELD_SIZE;

/// A single point of a scan
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PointXyzi {
    pub x_m: f32,
    pub y_m: f32,
    pub z_m: f32,
    pub intensity: f32,
}

impl PointXyzi {
    pub fn new(x_m: f32, y_m: f32, z_m: f32, intensity: f32) -> Self {
        Self {
            x_m,
            y_m,
            z_m,
            intensity,
        }
    }

    /// Decode one point from exactly [`POINT_STEP`] bytes
    pub fn from_le_bytes(buf: &[u8; POINT_STEP]) -> Self {
        let field = |i: usize| {
            f32::from_le_bytes([
                buf[i * FIELD_SIZE],
                buf[i * FIELD_SIZE + 1],
                buf[i * FIELD_SIZE + 2],
                buf[i * FIELD_SIZE + 3],
            ])
        };
        Self {
            x_m: field(0),
            y_m: field(1),
            z_m: field(2),
            intensity: field(3),
        }
    }

    /// Encode this point as [`POINT_STEP`] little-endian bytes
    pub fn to_le_bytes(&self) -> [u8; POINT_STEP] {
        let mut buf = [0u8; POINT_STEP];
        buf[0..4].copy_from_slice(&self.x_m.to_le_bytes());
        buf[4..8].copy_from_slice(&self.y_m.to_le_bytes());
        buf[8..12].copy_from_slice(&self.z_m.to_le_bytes());
        buf[12..16].copy_from_slice(&self.intensity.to_le_bytes());
        buf
    }
}

/// Decode raw scan bytes into points.
///
/// Any trailing partial quadruple is discarded, so input shorter than one
/// point yields an empty vector.
pub fn decode_points(raw: &[u8]) -> Vec<PointXyzi> {
    raw.chunks_exact(POINT_STEP)
        .map(|chunk| {
            let mut buf = [0u8; POINT_STEP];
            buf.copy_from_slice(chunk);
            PointXyzi::from_le_bytes(&buf)
        })
        .collect()
}

/// Encode points back into the raw scan layout
pub fn encode_points(points: &[PointXyzi]) -> Vec<u8> {
    let mut raw = Vec::with_capacity(points.len() * POINT_STEP);
    for p in points {
        raw.extend_from_slice(&p.to_le_bytes());
    }
    raw
}
