//! Types for probing and extraction.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempPath;
use thiserror::Error;

use super::runner::RunError;
use crate::models::MediaSource;

/// Probing a media file failed.
///
/// Callers treat this as "no audio tracks" and still attempt video-only
/// playback.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to start {tool}: {message}")]
    Spawn { tool: String, message: String },

    #[error("Probe exited with code {code:?}: {stderr}")]
    NonZeroExit { code: Option<i32>, stderr: String },

    #[error("Malformed probe output: {0}")]
    Malformed(String),

    #[error("Probe timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Probe cancelled")]
    Cancelled,
}

impl From<RunError> for ProbeError {
    fn from(err: RunError) -> Self {
        match err {
            RunError::Spawn { tool, source } => ProbeError::Spawn {
                tool,
                message: source.to_string(),
            },
            RunError::Io { tool, source } => ProbeError::Spawn {
                tool,
                message: source.to_string(),
            },
            RunError::TimedOut { after, .. } => ProbeError::TimedOut(after),
            RunError::Cancelled { .. } => ProbeError::Cancelled,
        }
    }
}

/// Extracting one audio track failed, or the whole extraction was cancelled.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Failed to extract audio track {index}: {message}")]
    Transcode { index: usize, message: String },

    #[error("Extraction cancelled")]
    Cancelled,

    #[error("I/O error preparing extraction: {0}")]
    Io(#[from] io::Error),
}

impl ExtractionError {
    /// Map a runner error for audio track `index`.
    pub(crate) fn from_run(index: usize, err: RunError) -> Self {
        match err {
            RunError::Cancelled { .. } => ExtractionError::Cancelled,
            other => ExtractionError::Transcode {
                index,
                message: other.to_string(),
            },
        }
    }
}

/// One transcode job: audio stream `stream` of `source` into `output`.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeRequest {
    pub source: PathBuf,
    /// Audio-relative stream index (`0:a:<stream>`).
    pub stream: usize,
    pub output: PathBuf,
    /// Linear gain applied during transcoding.
    pub gain_multiplier: f64,
    pub channels: u8,
    pub sample_rate: u32,
}

/// A decodable audio asset backed by a temporary file.
///
/// The file is deleted when the asset is dropped.
#[derive(Debug)]
pub struct ExtractedAsset {
    index: usize,
    path: TempPath,
}

impl ExtractedAsset {
    pub fn new(index: usize, path: TempPath) -> Self {
        Self { index, path }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Outcome of extracting every requested track.
#[derive(Debug, Default)]
pub struct ExtractionReport {
    /// Successfully extracted assets, indices `0..assets.len()`.
    pub assets: Vec<ExtractedAsset>,
    /// Number of tracks that were requested.
    pub requested: usize,
    /// The failure that stopped extraction early, if any.
    pub stopped_by: Option<ExtractionError>,
}

impl ExtractionReport {
    pub fn track_count(&self) -> usize {
        self.assets.len()
    }

    pub fn is_complete(&self) -> bool {
        self.stopped_by.is_none()
    }
}

/// Everything a background load produces.
#[derive(Debug)]
pub struct LoadedMedia {
    pub source: MediaSource,
    pub extraction: ExtractionReport,
    /// Set when probing failed and zero audio tracks were assumed.
    pub probe_error: Option<ProbeError>,
}
