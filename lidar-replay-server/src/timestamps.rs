//! Timestamps file parser.
//!
//! KITTI raw drives store one capture time per line:
//!
//! ```text
//! 2011-09-26 13:02:25.594360375
//! 2011-09-26 13:02:25.697681563
//! ```
//!
//! Times are UTC with up to nanosecond precision. A line may also hold a bare
//! integer count of nanoseconds. Blank lines are ignored.

use chrono::NaiveDateTime;
use log::debug;
use std::fs;
use std::path::Path;

use lidar_replay_core::LoadError;

const KITTI_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Parse a single timestamp to nanoseconds since the Unix epoch
pub fn parse_timestamp(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(ns) = text.parse::<i64>() {
        return Some(ns);
    }
    NaiveDateTime::parse_from_str(text, KITTI_FORMAT)
        .ok()?
        .and_utc()
        .timestamp_nanos_opt()
}

/// Parse the contents of a timestamps file, keeping line order
pub fn parse_timestamps(content: &str) -> Result<Vec<i64>, LoadError> {
    let mut timestamps = Vec::new();
    for (i, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_timestamp(line) {
            Some(ns) => timestamps.push(ns),
            None => {
                return Err(LoadError::InvalidTimestamp {
                    line: i + 1,
                    text: line.trim().to_string(),
                });
            }
        }
    }
    Ok(timestamps)
}

pub fn read_timestamps(path: &Path) -> Result<Vec<i64>, LoadError> {
    let content = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_owned(),
        source,
    })?;
    let timestamps = parse_timestamps(&content)?;
    debug!("Read {} timestamps from {}", timestamps.len(), path.display());
    Ok(timestamps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kitti_line() {
        assert_eq!(
            parse_timestamp("2011-09-26 13:02:25.594360375"),
            Some(1_317_042_145_594_360_375)
        );
    }

    #[test]
    fn test_parse_short_fraction() {
        assert_eq!(
            parse_timestamp("1970-01-01 00:00:01.5"),
            Some(1_500_000_000)
        );
    }

    #[test]
    fn test_parse_integer_nanoseconds() {
        assert_eq!(parse_timestamp("  1000 "), Some(1000));
        assert_eq!(parse_timestamp("-5"), Some(-5));
    }

    #[test]
    fn test_parse_file_keeps_order_and_skips_blank_lines() {
        let content = "2011-09-26 13:02:25.594360375\n\n2011-09-26 13:02:25.697681563\r\n1000\n";
        let timestamps = parse_timestamps(content).unwrap();
        assert_eq!(
            timestamps,
            vec![1_317_042_145_594_360_375, 1_317_042_145_697_681_563, 1000]
        );
    }

    #[test]
    fn test_invalid_line_reports_line_number() {
        let content = "1000\n1500\nnot a time\n";
        match parse_timestamps(content) {
            Err(LoadError::InvalidTimestamp { line, text }) => {
                assert_eq!(line, 3);
                assert_eq!(text, "not a time");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_missing_file() {
        let result = read_timestamps(Path::new("/nonexistent/timestamps_start.txt"));
        assert!(matches!(result, Err(LoadError::Io { .. })));
    }
}
