//! Notifications emitted by the coordinator to the shell.

use serde::{Deserialize, Serialize};

/// Severity of a user-visible message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageLevel {
    Info,
    Warning,
    Error,
}

/// A message intended for the shell's status/info area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMessage {
    pub level: MessageLevel,
    pub text: String,
}

impl UserMessage {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Info,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Warning,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Error,
            text: text.into(),
        }
    }
}

/// Event delivered to the shell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlayerEvent {
    /// Number of audio tracks in the newly attached session.
    TrackCountChanged(usize),
    /// Total media duration became known (ms).
    DurationKnown(u64),
    /// Poll-timer position update from the video clock (ms).
    PositionTick(u64),
    /// Transport started (`true`) or stopped playing (`false`).
    PlaybackStateChanged(bool),
    /// Displayed position while scrubbing; no decoder was seeked.
    PreviewPosition(u64),
    /// Drift monitor re-synced one audio track.
    DriftCorrected {
        index: usize,
        drift_ms: u64,
        target_ms: u64,
    },
    /// Status text for the user.
    Message(UserMessage),
}

/// Type alias for the shell's event callback.
///
/// Called synchronously on the thread that issued the coordinator command.
pub type EventCallback = Box<dyn Fn(&PlayerEvent) + Send + Sync>;
