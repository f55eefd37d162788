//! Recorded drive discovery and loading.
//!
//! Finds the timestamps file and the binary scans of a drive, pairs them in
//! capture order and builds the in-memory [`FrameStore`].

use log::{debug, info, warn};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use lidar_replay_core::{CloudDecoder, FrameSource, FrameStore, LoadError, PointCloudMessage};

use crate::config::DatasetLayout;
use crate::timestamps::read_timestamps;

/// Upper bound on bytes read from a single scan (one million floats)
pub const MAX_FRAME_BYTES: u64 = 4_000_000;

/// A scan file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinFile {
    path: PathBuf,
}

impl BinFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSource for BinFile {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn read(&self) -> io::Result<Vec<u8>> {
        let mut raw = Vec::new();
        File::open(&self.path)?
            .take(MAX_FRAME_BYTES)
            .read_to_end(&mut raw)?;
        Ok(raw)
    }
}

/// A validated drive directory
#[derive(Debug, Clone)]
pub struct Dataset {
    root: PathBuf,
    timestamps_path: PathBuf,
    data_path: PathBuf,
    extension: String,
}

impl Dataset {
    /// Check that the root, the timestamps file and the data directory exist
    pub fn open(root: &Path, layout: &DatasetLayout) -> Result<Self, LoadError> {
        if !root.exists() {
            return Err(LoadError::PathNotFound(root.to_owned()));
        }
        let timestamps_path = layout.timestamps_path(root);
        if !timestamps_path.is_file() {
            return Err(LoadError::PathNotFound(timestamps_path));
        }
        let data_path = layout.data_path(root);
        if !data_path.is_dir() {
            return Err(LoadError::PathNotFound(data_path));
        }

        Ok(Self {
            root: root.to_owned(),
            timestamps_path,
            data_path,
            extension: layout.extension.clone(),
        })
    }

    pub fn timestamps(&self) -> Result<Vec<i64>, LoadError> {
        read_timestamps(&self.timestamps_path)
    }

    /// Scan files with the configured extension, sorted by name
    pub fn frame_files(&self) -> Result<Vec<BinFile>, LoadError> {
        let entries = fs::read_dir(&self.data_path).map_err(|source| LoadError::Io {
            path: self.data_path.clone(),
            source,
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry.path()),
                Err(e) => {
                    warn!("Skipping unreadable entry in {}: {}", self.data_path.display(), e);
                    None
                }
            })
            .filter(|path| {
                path.is_file() && path.extension().is_some_and(|ext| ext == self.extension.as_str())
            })
            .collect();

        // Zero-padded names such as 0000000042.bin sort in capture order
        files.sort();

        debug!(
            "Found {} .{} files in {}",
            files.len(),
            self.extension,
            self.data_path.display()
        );
        Ok(files.into_iter().map(BinFile::new).collect())
    }

    /// Read and decode the whole drive, logging every skipped scan
    pub fn load(&self, decoder: &CloudDecoder) -> Result<FrameStore<PointCloudMessage>, LoadError> {
        info!(
            "Loading recording from {} as frame '{}'",
            self.root.display(),
            decoder.frame_id()
        );

        let timestamps = self.timestamps()?;
        let files = self.frame_files()?;
        let store = FrameStore::build(&timestamps, &files, decoder)?;

        for skipped in store.skipped() {
            warn!(
                "Skipping frame {} ({}): {}",
                skipped.index, skipped.source, skipped.reason
            );
        }

        let sequence = store.sequence();
        info!(
            "Loaded {} frames ({} skipped), capture duration {:.3}s",
            sequence.len(),
            store.skipped().len(),
            sequence.capture_duration_ns() as f64 * 1e-9
        );
        Ok(store)
    }
}

/// Summary of a loaded recording, served by the web API
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FramesSummary {
    pub frame_count: usize,
    pub skipped: usize,
    pub first_timestamp_ns: Option<i64>,
    pub last_timestamp_ns: Option<i64>,
    pub capture_duration_ns: i64,
    pub total_points: usize,
}

impl FramesSummary {
    pub fn from_store(store: &FrameStore<PointCloudMessage>) -> Self {
        let sequence = store.sequence();
        Self {
            frame_count: sequence.len(),
            skipped: store.skipped().len(),
            first_timestamp_ns: sequence.first_timestamp(),
            last_timestamp_ns: sequence.last_timestamp(),
            capture_duration_ns: sequence.capture_duration_ns(),
            total_points: sequence.iter().map(|f| f.payload.point_count()).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lidar_replay_core::point::{encode_points, PointXyzi};
    use tempfile::TempDir;

    fn create_drive(timestamps: &str, scans: &[(&str, usize)]) -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let sensor = temp_dir.path().join("velodyne_points");
        fs::create_dir_all(sensor.join("data")).unwrap();
        fs::write(sensor.join("timestamps_start.txt"), timestamps).unwrap();
        for (name, points) in scans {
            let raw = encode_points(&vec![PointXyzi::new(1.0, 2.0, 3.0, 0.5); *points]);
            fs::write(sensor.join("data").join(name), raw).unwrap();
        }
        temp_dir
    }

    #[test]
    fn test_open_missing_root() {
        let result = Dataset::open(Path::new("/nonexistent/drive"), &DatasetLayout::default());
        assert!(matches!(result, Err(LoadError::PathNotFound(p)) if p == Path::new("/nonexistent/drive")));
    }

    #[test]
    fn test_open_missing_timestamps_file() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("velodyne_points/data")).unwrap();

        match Dataset::open(temp_dir.path(), &DatasetLayout::default()) {
            Err(LoadError::PathNotFound(p)) => assert!(p.ends_with("timestamps_start.txt")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_open_missing_data_dir() {
        let temp_dir = TempDir::new().unwrap();
        let sensor = temp_dir.path().join("velodyne_points");
        fs::create_dir_all(&sensor).unwrap();
        fs::write(sensor.join("timestamps_start.txt"), "1000\n").unwrap();

        match Dataset::open(temp_dir.path(), &DatasetLayout::default()) {
            Err(LoadError::PathNotFound(p)) => assert!(p.ends_with("data")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_frame_files_sorted_and_filtered() {
        let drive = create_drive(
            "1\n2\n3\n",
            &[("0000000002.bin", 1), ("0000000000.bin", 1), ("0000000001.bin", 1)],
        );
        fs::write(drive.path().join("velodyne_points/data/notes.txt"), "x").unwrap();

        let dataset = Dataset::open(drive.path(), &DatasetLayout::default()).unwrap();
        let names: Vec<String> = dataset
            .frame_files()
            .unwrap()
            .iter()
            .map(|f| f.path().file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["0000000000.bin", "0000000001.bin", "0000000002.bin"]);
    }

    #[test]
    fn test_load_skips_empty_scan() {
        let drive = create_drive(
            "1000\n1500\n5000\n",
            &[("0000000000.bin", 3), ("0000000001.bin", 0), ("0000000002.bin", 2)],
        );

        let dataset = Dataset::open(drive.path(), &DatasetLayout::default()).unwrap();
        let store = dataset.load(&CloudDecoder::new("velodyne")).unwrap();

        let sequence = store.sequence();
        assert_eq!(sequence.timestamps(), &[1000, 5000]);
        assert_eq!(sequence.get(0).unwrap().payload.header.frame_id, "velodyne");
        assert_eq!(sequence.get(1).unwrap().payload.width, 2);
        assert_eq!(store.skipped().len(), 1);
        assert!(store.skipped()[0].source.ends_with("0000000001.bin"));

        let summary = FramesSummary::from_store(&store);
        assert_eq!(summary.frame_count, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.total_points, 5);
        assert_eq!(summary.capture_duration_ns, 4000);
    }

    #[test]
    fn test_load_count_mismatch() {
        let drive = create_drive("1000\n1500\n", &[("0000000000.bin", 3)]);

        let dataset = Dataset::open(drive.path(), &DatasetLayout::default()).unwrap();
        let result = dataset.load(&CloudDecoder::default());
        assert!(matches!(
            result,
            Err(LoadError::CountMismatch {
                timestamps: 2,
                sources: 1
            })
        ));
    }

    #[test]
    fn test_read_is_bounded() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("big.bin");
        fs::write(&path, vec![0u8; MAX_FRAME_BYTES as usize + 64]).unwrap();

        let raw = BinFile::new(path).read().unwrap();
        assert_eq!(raw.len() as u64, MAX_FRAME_BYTES);
    }
}
