//! Core enums used throughout the player.

use serde::{Deserialize, Serialize};

/// Kind of stream reported by the probe engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
    Data,
    Attachment,
    Other,
}

impl StreamKind {
    /// Parse an ffprobe `codec_type` value.
    pub fn from_codec_type(s: &str) -> Self {
        match s {
            "video" => StreamKind::Video,
            "audio" => StreamKind::Audio,
            "subtitle" => StreamKind::Subtitle,
            "data" => StreamKind::Data,
            "attachment" => StreamKind::Attachment,
            _ => StreamKind::Other,
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamKind::Video => write!(f, "video"),
            StreamKind::Audio => write!(f, "audio"),
            StreamKind::Subtitle => write!(f, "subtitle"),
            StreamKind::Data => write!(f, "data"),
            StreamKind::Attachment => write!(f, "attachment"),
            StreamKind::Other => write!(f, "other"),
        }
    }
}

/// Transport state of the playback coordinator.
///
/// `Idle` is initial. Stopping returns to `Loaded` with the position reset,
/// and a new load may start from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransportState {
    /// No session attached (initial, or while a load is in flight).
    #[default]
    Idle,
    /// Session attached, transport at rest.
    Loaded,
    /// All decoders playing, poll timer running.
    Playing,
    /// All decoders paused.
    Paused,
    /// A drag-seek is in progress; decoders are paused.
    Scrubbing,
}

impl TransportState {
    /// Whether `play()` is accepted from this state.
    pub fn can_play(&self) -> bool {
        matches!(self, Self::Loaded | Self::Paused)
    }

    /// Whether `pause()` is accepted from this state.
    pub fn can_pause(&self) -> bool {
        matches!(self, Self::Playing)
    }

    /// Whether `stop()` is accepted from this state.
    pub fn can_stop(&self) -> bool {
        matches!(self, Self::Loaded | Self::Playing | Self::Paused)
    }

    /// Whether an explicit `seek()` is accepted from this state.
    pub fn can_seek(&self) -> bool {
        matches!(self, Self::Loaded | Self::Playing | Self::Paused)
    }

    /// Whether a scrub may begin from this state.
    pub fn can_scrub(&self) -> bool {
        matches!(self, Self::Playing | Self::Paused)
    }
}

impl std::fmt::Display for TransportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportState::Idle => write!(f, "Idle"),
            TransportState::Loaded => write!(f, "Loaded"),
            TransportState::Playing => write!(f, "Playing"),
            TransportState::Paused => write!(f, "Paused"),
            TransportState::Scrubbing => write!(f, "Scrubbing"),
        }
    }
}

/// Identifies one decoder handle inside a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackRef {
    Video,
    Audio(usize),
}

impl std::fmt::Display for TrackRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackRef::Video => write!(f, "video"),
            TrackRef::Audio(i) => write!(f, "audio[{}]", i),
        }
    }
}
