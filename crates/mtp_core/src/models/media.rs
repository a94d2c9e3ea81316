//! Media-related data structures (probe output, loaded sources).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::enums::StreamKind;

/// One stream entry from the probe engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// Absolute stream index within the container.
    pub index: usize,
    /// Stream kind.
    pub kind: StreamKind,
    /// Frame width (video only).
    #[serde(default)]
    pub width: Option<u32>,
    /// Frame height (video only).
    #[serde(default)]
    pub height: Option<u32>,
}

impl StreamInfo {
    pub fn audio(index: usize) -> Self {
        Self {
            index,
            kind: StreamKind::Audio,
            width: None,
            height: None,
        }
    }

    pub fn video(index: usize, width: u32, height: u32) -> Self {
        Self {
            index,
            kind: StreamKind::Video,
            width: Some(width),
            height: Some(height),
        }
    }
}

/// Result of probing a media file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeReport {
    /// Streams in container order.
    pub streams: Vec<StreamInfo>,
    /// Container duration if reported.
    pub duration_ms: Option<u64>,
}

impl ProbeReport {
    /// Number of audio streams.
    pub fn audio_stream_count(&self) -> usize {
        self.streams
            .iter()
            .filter(|s| s.kind == StreamKind::Audio)
            .count()
    }

    /// Dimensions of the first video stream that reports both values.
    pub fn video_dimensions(&self) -> Option<VideoDimensions> {
        self.streams
            .iter()
            .filter(|s| s.kind == StreamKind::Video)
            .find_map(|s| match (s.width, s.height) {
                (Some(width), Some(height)) if width > 0 && height > 0 => {
                    Some(VideoDimensions { width, height })
                }
                _ => None,
            })
    }
}

/// Video frame dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoDimensions {
    pub width: u32,
    pub height: u32,
}

impl VideoDimensions {
    /// Fallback used whenever the video stream can't be probed.
    pub const FALLBACK: VideoDimensions = VideoDimensions {
        width: 1280,
        height: 720,
    };
}

impl Default for VideoDimensions {
    fn default() -> Self {
        Self::FALLBACK
    }
}

impl std::fmt::Display for VideoDimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A loaded media file. Immutable; the next load replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSource {
    path: PathBuf,
    duration_ms: u64,
    audio_stream_count: usize,
    dimensions: VideoDimensions,
}

impl MediaSource {
    pub fn new(
        path: impl Into<PathBuf>,
        duration_ms: u64,
        audio_stream_count: usize,
        dimensions: VideoDimensions,
    ) -> Self {
        Self {
            path: path.into(),
            duration_ms,
            audio_stream_count,
            dimensions,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Duration in ms; 0 when neither the probe nor the video decoder knew it.
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// Audio streams in the container (not necessarily all extracted).
    pub fn audio_stream_count(&self) -> usize {
        self.audio_stream_count
    }

    pub fn dimensions(&self) -> VideoDimensions {
        self.dimensions
    }

    /// File name for display.
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Format milliseconds as `MM:SS` (minutes are not wrapped into hours).
pub fn format_clock(ms: u64) -> String {
    let seconds = ms / 1000;
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Timeline label shown next to the seek bar: `MM:SS / MM:SS`.
pub fn timeline_label(position_ms: u64, duration_ms: u64) -> String {
    format!("{} / {}", format_clock(position_ms), format_clock(duration_ms))
}
