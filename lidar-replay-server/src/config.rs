//! Configuration derived from the command line.

use std::path::Path;
use std::time::Duration;

use crate::Cli;

pub const DEFAULT_SENSOR_DIR: &str = "velodyne_points";
pub const DEFAULT_TIMESTAMPS_FILE: &str = "timestamps_start.txt";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_EXTENSION: &str = "bin";

/// Where the timestamps and scans live below a drive's root.
///
/// ```text
/// <root>/<sensor_dir>/<timestamps_file>
/// <root>/<sensor_dir>/<data_dir>/*.<extension>
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetLayout {
    pub sensor_dir: String,
    pub timestamps_file: String,
    pub data_dir: String,
    pub extension: String,
}

impl Default for DatasetLayout {
    fn default() -> Self {
        Self {
            sensor_dir: DEFAULT_SENSOR_DIR.to_string(),
            timestamps_file: DEFAULT_TIMESTAMPS_FILE.to_string(),
            data_dir: DEFAULT_DATA_DIR.to_string(),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }
}

impl DatasetLayout {
    pub fn timestamps_path(&self, root: &Path) -> std::path::PathBuf {
        root.join(&self.sensor_dir).join(&self.timestamps_file)
    }

    pub fn data_path(&self, root: &Path) -> std::path::PathBuf {
        root.join(&self.sensor_dir).join(&self.data_dir)
    }
}

impl From<&Cli> for DatasetLayout {
    fn from(args: &Cli) -> Self {
        Self {
            sensor_dir: args.sensor_dir.clone(),
            timestamps_file: args.timestamps_file.clone(),
            data_dir: args.data_dir.clone(),
            // Accept both "bin" and ".bin"
            extension: args.extension.trim_start_matches('.').to_string(),
        }
    }
}

pub fn boundary_wait(args: &Cli) -> Duration {
    Duration::from_millis(args.boundary_wait_ms)
}

pub fn sync_delay(args: &Cli) -> Duration {
    Duration::from_millis(args.sync_delay_ms)
}
