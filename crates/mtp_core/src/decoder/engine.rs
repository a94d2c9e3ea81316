//! Decoder capability traits and errors.

use std::fmt;
use std::path::Path;

use thiserror::Error;

use crate::models::TrackRef;

/// Commands a decoder understands, for errors and journals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecoderCommand {
    Open,
    Play,
    Pause,
    Stop,
    Seek,
    Position,
    Duration,
    SetVolume,
    Mute,
    Query,
}

impl fmt::Display for DecoderCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DecoderCommand::Open => "open",
            DecoderCommand::Play => "play",
            DecoderCommand::Pause => "pause",
            DecoderCommand::Stop => "stop",
            DecoderCommand::Seek => "seek",
            DecoderCommand::Position => "position",
            DecoderCommand::Duration => "duration",
            DecoderCommand::SetVolume => "set_volume",
            DecoderCommand::Mute => "mute",
            DecoderCommand::Query => "query",
        };
        f.write_str(name)
    }
}

/// A single decoder rejected or failed a command.
///
/// Never fatal: the coordinator marks the handle degraded and moves on.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecoderCommandError {
    #[error("Failed to start decoder for {role}: {message}")]
    Spawn { role: TrackRef, message: String },

    #[error("Decoder {command} failed: {message}")]
    Command {
        command: DecoderCommand,
        message: String,
    },

    #[error("Decoder IPC error: {0}")]
    Ipc(String),

    #[error("Decoder has been terminated")]
    Terminated,

    #[error("Decoder {0} not available yet")]
    Unavailable(DecoderCommand),
}

/// Result type for decoder operations.
pub type DecoderResult<T> = Result<T, DecoderCommandError>;

/// One independently clocked decoder instance.
///
/// Seeking is absolute only. Methods take `&mut self` because most engines
/// are driven over a request/response channel.
pub trait DecoderEngine: Send {
    /// Load a media file or extracted asset.
    fn open(&mut self, asset: &Path) -> DecoderResult<()>;

    fn play(&mut self) -> DecoderResult<()>;

    fn pause(&mut self) -> DecoderResult<()>;

    /// Halt and rewind to 0, keeping the media loaded.
    fn stop(&mut self) -> DecoderResult<()>;

    /// Absolute seek.
    fn seek(&mut self, ms: u64) -> DecoderResult<()>;

    fn position_ms(&mut self) -> DecoderResult<u64>;

    /// Total duration; `None` while the engine doesn't know it yet.
    fn duration_ms(&mut self) -> DecoderResult<Option<u64>>;

    /// Linear gain in `[0, 1]`.
    fn set_volume(&mut self, gain: f32) -> DecoderResult<()>;

    /// Silence the decoder's own audio output.
    fn mute(&mut self) -> DecoderResult<()>;

    fn is_playing(&mut self) -> DecoderResult<bool>;

    /// Whether playback halted at the end of the media. Engines that can't
    /// tell report `false` and leave detection to the position check.
    fn reached_end(&mut self) -> DecoderResult<bool> {
        Ok(false)
    }

    /// Release the engine. Idempotent; later commands fail with
    /// [`DecoderCommandError::Terminated`].
    fn terminate(&mut self);
}

/// Creates decoder instances for a session.
pub trait DecoderFactory: Send + Sync {
    fn create(&self, role: TrackRef) -> DecoderResult<Box<dyn DecoderEngine>>;
}
