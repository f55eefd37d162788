//! Frame store: loads a recording into memory once, in capture order.
//!
//! # Skipping
//!
//! A source that cannot be read, or that decodes to zero points, is left out
//! together with its timestamp. The surviving frames keep their own capture
//! timestamps and their original relative order:
//!
//! ```text
//! timestamps: t0   t1   t2   t3
//! sources:    s0   s1   s2   s3
//!                  ^^ empty
//! sequence:   (t0,f0) (t2,f2) (t3,f3)
//! ```

use std::sync::Arc;

use crate::error::LoadError;
use crate::source::{FrameDecoder, FrameSource};

/// One frame of a recording
#[derive(Debug)]
pub struct Frame<P> {
    pub timestamp_ns: i64,
    pub payload: Arc<P>,
}

impl<P> Clone for Frame<P> {
    fn clone(&self) -> Self {
        Self {
            timestamp_ns: self.timestamp_ns,
            payload: self.payload.clone(),
        }
    }
}

/// Immutable, ordered list of frames
#[derive(Debug)]
pub struct FrameSequence<P> {
    timestamps: Vec<i64>,
    frames: Vec<Frame<P>>,
}

impl<P> FrameSequence<P> {
    /// Pair timestamps with payloads positionally.
    ///
    /// Fails with [`LoadError::CountMismatch`] unless both have the same length.
    pub fn new(timestamps: Vec<i64>, payloads: Vec<P>) -> Result<Self, LoadError> {
        if timestamps.len() != payloads.len() {
            return Err(LoadError::CountMismatch {
                timestamps: timestamps.len(),
                sources: payloads.len(),
            });
        }
        let frames = timestamps
            .iter()
            .zip(payloads)
            .map(|(&timestamp_ns, payload)| Frame {
                timestamp_ns,
                payload: Arc::new(payload),
            })
            .collect();
        Ok(Self { timestamps, frames })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Frame<P>> {
        self.frames.get(index)
    }

    /// Capture timestamps, index-aligned with the frames
    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    pub fn iter(&self) -> impl Iterator<Item = &Frame<P>> {
        self.frames.iter()
    }

    pub fn first_timestamp(&self) -> Option<i64> {
        self.timestamps.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<i64> {
        self.timestamps.last().copied()
    }

    /// Time between the first and last capture, zero for fewer than two
    /// frames. Saturates when the span exceeds the `i64` range.
    pub fn capture_duration_ns(&self) -> i64 {
        match (self.first_timestamp(), self.last_timestamp()) {
            (Some(first), Some(last)) => last.saturating_sub(first),
            _ => 0,
        }
    }
}

/// Why a source was left out of the sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The source could not be read
    Unreadable(String),
    /// The source decoded to zero points
    Empty,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Unreadable(e) => write!(f, "unreadable ({})", e),
            SkipReason::Empty => write!(f, "no points"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSource {
    /// Position in the input lists
    pub index: usize,
    pub source: String,
    pub timestamp_ns: i64,
    pub reason: SkipReason,
}

/// A loaded recording plus a report of what was left out
#[derive(Debug)]
pub struct FrameStore<P> {
    sequence: Arc<FrameSequence<P>>,
    skipped: Vec<SkippedSource>,
}

impl<P> FrameStore<P> {
    /// Read and decode every source, in order.
    ///
    /// The count check happens before any source is read. Unreadable and
    /// empty sources are skipped and listed in [`FrameStore::skipped`].
    pub fn build<S, D>(
        timestamps: &[i64],
        sources: &[S],
        decoder: &D,
    ) -> Result<Self, LoadError>
    where
        S: FrameSource,
        D: FrameDecoder<Payload = P>,
    {
        if timestamps.len() != sources.len() {
            return Err(LoadError::CountMismatch {
                timestamps: timestamps.len(),
                sources: sources.len(),
            });
        }

        let mut kept_timestamps = Vec::with_capacity(timestamps.len());
        let mut payloads = Vec::with_capacity(timestamps.len());
        let mut skipped = Vec::new();

        for (index, (&timestamp_ns, source)) in timestamps.iter().zip(sources).enumerate() {
            let reason = match source.read() {
                Ok(raw) => match decoder.decode(&raw, timestamp_ns) {
                    Some(payload) => {
                        kept_timestamps.push(timestamp_ns);
                        payloads.push(payload);
                        continue;
                    }
                    None => SkipReason::Empty,
                },
                Err(e) => SkipReason::Unreadable(e.to_string()),
            };
            skipped.push(SkippedSource {
                index,
                source: source.describe(),
                timestamp_ns,
                reason,
            });
        }

        Ok(Self {
            sequence: Arc::new(FrameSequence::new(kept_timestamps, payloads)?),
            skipped,
        })
    }

    /// Shared handle to the loaded frames
    pub fn sequence(&self) -> Arc<FrameSequence<P>> {
        self.sequence.clone()
    }

    pub fn skipped(&self) -> &[SkippedSource] {
        &self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::PointCloudMessage;
    use crate::point::{encode_points, PointXyzi};
    use crate::source::CloudDecoder;
    use std::io;

    enum TestSource {
        Bytes(Vec<u8>),
        Broken,
    }

    impl FrameSource for TestSource {
        fn describe(&self) -> String {
            match self {
                TestSource::Bytes(b) => format!("bytes:{}", b.len()),
                TestSource::Broken => "broken".to_string(),
            }
        }

        fn read(&self) -> io::Result<Vec<u8>> {
            match self {
                TestSource::Bytes(b) => Ok(b.clone()),
                TestSource::Broken => Err(io::Error::new(io::ErrorKind::NotFound, "gone")),
            }
        }
    }

    fn scan(n: usize, marker: f32) -> TestSource {
        TestSource::Bytes(encode_points(&vec![PointXyzi::new(marker, 0.0, 0.0, 0.0); n]))
    }

    fn marker(msg: &PointCloudMessage) -> f32 {
        msg.points()[0].x_m
    }

    #[test]
    fn test_build_keeps_capture_order() {
        let store: FrameStore<PointCloudMessage> = FrameStore::build(
            &[1000, 1500, 5000],
            &[scan(3, 1.0), scan(2, 2.0), scan(1, 3.0)],
            &CloudDecoder::default(),
        )
        .unwrap();

        let seq = store.sequence();
        assert_eq!(seq.len(), 3);
        assert_eq!(seq.timestamps(), &[1000, 1500, 5000]);
        let markers: Vec<f32> = seq.iter().map(|f| marker(&f.payload)).collect();
        assert_eq!(markers, vec![1.0, 2.0, 3.0]);
        assert!(store.skipped().is_empty());
    }

    #[test]
    fn test_count_mismatch_is_fatal() {
        let result: Result<FrameStore<PointCloudMessage>, _> = FrameStore::build(
            &[1, 2, 3],
            &[scan(1, 1.0), scan(1, 2.0)],
            &CloudDecoder::default(),
        );
        assert!(matches!(
            result,
            Err(LoadError::CountMismatch {
                timestamps: 3,
                sources: 2
            })
        ));
    }

    #[test]
    fn test_count_mismatch_checked_before_reading() {
        // Every source is broken, but the mismatch still wins
        let result: Result<FrameStore<PointCloudMessage>, _> = FrameStore::build(
            &[1],
            &[TestSource::Broken, TestSource::Broken],
            &CloudDecoder::default(),
        );
        assert!(matches!(result, Err(LoadError::CountMismatch { .. })));
    }

    #[test]
    fn test_empty_and_unreadable_sources_are_skipped() {
        let store: FrameStore<PointCloudMessage> = FrameStore::build(
            &[10, 20, 30, 40],
            &[
                scan(4, 1.0),
                TestSource::Bytes(Vec::new()),
                TestSource::Broken,
                scan(4, 4.0),
            ],
            &CloudDecoder::default(),
        )
        .unwrap();

        let seq = store.sequence();
        assert_eq!(seq.len(), 2);
        // Each surviving frame keeps its own timestamp
        assert_eq!(seq.timestamps(), &[10, 40]);
        assert_eq!(marker(&seq.get(1).unwrap().payload), 4.0);
        assert_eq!(seq.get(1).unwrap().payload.header.stamp.as_nanos(), 40);

        let skipped = store.skipped();
        assert_eq!(skipped.len(), 2);
        assert_eq!(skipped[0].index, 1);
        assert_eq!(skipped[0].reason, SkipReason::Empty);
        assert_eq!(skipped[1].index, 2);
        assert_eq!(skipped[1].source, "broken");
        assert!(matches!(skipped[1].reason, SkipReason::Unreadable(_)));
    }

    #[test]
    fn test_all_sources_skipped_gives_empty_sequence() {
        let store: FrameStore<PointCloudMessage> = FrameStore::build(
            &[1, 2],
            &[TestSource::Bytes(vec![0u8; 8]), TestSource::Broken],
            &CloudDecoder::default(),
        )
        .unwrap();
        assert!(store.sequence().is_empty());
        assert_eq!(store.sequence().capture_duration_ns(), 0);
    }

    #[test]
    fn test_sequence_rejects_unpaired_payloads() {
        let result = FrameSequence::new(vec![1, 2], vec!["a"]);
        assert!(matches!(result, Err(LoadError::CountMismatch { .. })));
    }

    #[test]
    fn test_capture_duration() {
        let seq = FrameSequence::new(vec![1000, 1500, 5000], vec![(), (), ()]).unwrap();
        assert_eq!(seq.capture_duration_ns(), 4000);
        assert_eq!(seq.first_timestamp(), Some(1000));
        assert_eq!(seq.last_timestamp(), Some(5000));
    }

    #[test]
    fn test_capture_duration_saturates() {
        let seq = FrameSequence::new(vec![i64::MIN, 0, i64::MAX], vec![(), (), ()]).unwrap();
        assert_eq!(seq.capture_duration_ns(), i64::MAX);

        let seq = FrameSequence::new(vec![i64::MAX, i64::MIN], vec![(), ()]).unwrap();
        assert_eq!(seq.capture_duration_ns(), i64::MIN);
    }
}
