//! Point cloud message model.
//!
//! [`PointCloudMessage`] mirrors the layout of a ROS `sensor_msgs/PointCloud2`
//! message carrying unorganized XYZI data, so consumers that already speak
//! PointCloud2 can map it one-to-one. On the wire it is encoded with bincode.

use serde::{Deserialize, Serialize};

use crate::point::{decode_points, encode_points, PointXyzi, FIELD_SIZE, POINT_STEP};

/// Default coordinate frame name stamped on every message
pub const DEFAULT_FRAME_ID: &str = "pointcloud";

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Datatype codes used in [`PointField::datatype`].
///
/// This is the full PointCloud2 datatype table so that field descriptions
/// from other producers can be interpreted. Clouds built here only use
/// [`PointFieldType::Float32`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum PointFieldType {
    Int8 = 1,
    Uint8 = 2,
    Int16 = 3,
    Uint16 = 4,
    Int32 = 5,
    Uint32 = 6,
    Float32 = 7,
    Float64 = 8,
}

/// Describes one channel of the packed point data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointField {
    pub name: String,
    /// Byte offset from the start of the point
    pub offset: u32,
    pub datatype: u8,
    /// Number of elements in the field
    pub count: u32,
}

impl PointField {
    fn float32(name: &str, index: usize) -> Self {
        Self {
            name: name.to_string(),
            offset: (index * FIELD_SIZE) as u32,
            datatype: PointFieldType::Float32 as u8,
            count: 1,
        }
    }
}

/// Capture time split into seconds and nanoseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Stamp {
    pub sec: i32,
    pub nanosec: u32,
}

impl Stamp {
    /// Split a nanosecond timestamp. `nanosec` is always in `[0, 1e9)`, so
    /// times before the epoch get a negative `sec` and a positive remainder.
    ///
    /// `sec` is an `i32` as in PointCloud2 headers. Times outside its range
    /// (before 1901-12-13 or after 2038-01-19 03:14:07 UTC) are clamped to
    /// `i32::MIN` / `i32::MAX`; only `nanosec` keeps the sub-second part.
    pub fn from_nanos(timestamp_ns: i64) -> Self {
        let sec = timestamp_ns.div_euclid(NANOS_PER_SEC);
        let nanosec = timestamp_ns.rem_euclid(NANOS_PER_SEC);
        Self {
            sec: sec.clamp(i32::MIN as i64, i32::MAX as i64) as i32,
            nanosec: nanosec as u32,
        }
    }

    pub fn as_nanos(&self) -> i64 {
        self.sec as i64 * NANOS_PER_SEC + self.nanosec as i64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub stamp: Stamp,
    pub frame_id: String,
}

/// One complete scan, ready to publish
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointCloudMessage {
    pub header: Header,
    pub height: u32,
    pub width: u32,
    pub fields: Vec<PointField>,
    pub is_bigendian: bool,
    /// Length of a point in bytes
    pub point_step: u32,
    /// Length of a row in bytes
    pub row_step: u32,
    pub data: Vec<u8>,
    /// True if there are no invalid points
    pub is_dense: bool,
}

impl PointCloudMessage {
    /// Build an unorganized (single row) cloud from decoded points
    pub fn from_points(points: &[PointXyzi], timestamp_ns: i64, frame_id: &str) -> Self {
        let width = points.len() as u32;
        Self {
            header: Header {
                stamp: Stamp::from_nanos(timestamp_ns),
                frame_id: frame_id.to_string(),
            },
            height: 1,
            width,
            fields: vec![
                PointField::float32("x", 0),
                PointField::float32("y", 1),
                PointField::float32("z", 2),
                PointField::float32("intensity", 3),
            ],
            is_bigendian: false,
            point_step: POINT_STEP as u32,
            row_step: POINT_STEP as u32 * width,
            data: encode_points(points),
            is_dense: true,
        }
    }

    pub fn point_count(&self) -> usize {
        self.height as usize * self.width as usize
    }

    /// Unpack the data buffer back into points
    pub fn points(&self) -> Vec<PointXyzi> {
        decode_points(&self.data)
    }

    /// Encode for the wire
    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn decode(buf: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(buf)
    }
}
