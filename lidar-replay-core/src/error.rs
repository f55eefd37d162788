//! Error types for frame loading and playback

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort building a frame store.
///
/// Per-source problems (unreadable file, zero points) are not errors, they
/// are reported as skips. See [`crate::frame_store::SkipReason`].
#[derive(Error, Debug)]
pub enum LoadError {
    /// Number of timestamps does not equal the number of data sources
    #[error("The number of timestamps ({timestamps}) does not equal the number of data sources ({sources})")]
    CountMismatch { timestamps: usize, sources: usize },

    /// A required directory or file is absent
    #[error("Required path {0} was not found")]
    PathNotFound(PathBuf),

    /// A timestamps file line could not be parsed
    #[error("Invalid timestamp on line {line}: '{text}'")]
    InvalidTimestamp { line: usize, text: String },

    /// A required directory or file exists but cannot be read
    #[error("Cannot read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors returned when starting playback
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// There is nothing to play
    #[error("Cannot start playback of an empty frame sequence")]
    EmptySequence,

    /// `start` was already called on this scheduler
    #[error("Playback was already started")]
    AlreadyStarted,

    /// `stop` was called before `start`
    #[error("Playback was stopped before it started")]
    Stopped,

    /// `start` was called outside of an async runtime
    #[error("Playback must be started from within a tokio runtime")]
    NoRuntime,
}

/// Failure reported by a delivery callback.
///
/// The scheduler counts and logs these; they never stop playback.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// Payload could not be encoded for the transport
    #[error("Cannot encode frame: {0}")]
    Encode(String),

    /// Transport refused the frame
    #[error("Transport failed: {0}")]
    Transport(String),
}

impl From<bincode::Error> for DeliveryError {
    fn from(e: bincode::Error) -> Self {
        DeliveryError::Encode(e.to_string())
    }
}
