//! Coordinator error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::decoder::DecoderCommandError;
use crate::models::TransportState;

/// Errors returned by coordinator commands.
///
/// None of them is fatal; the coordinator stays usable after every one.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoordinatorError {
    /// Requested media does not exist. No state was changed.
    #[error("File not found: {}", .0.display())]
    LoadNotFound(PathBuf),

    /// The background load stopped before producing a session.
    #[error("Load failed: {0}")]
    LoadFailed(String),

    #[error("No media loaded")]
    NoSession,

    #[error("Cannot {command} while {state}")]
    InvalidTransition {
        command: &'static str,
        state: TransportState,
    },

    #[error("Decoder error: {0}")]
    Decoder(#[from] DecoderCommandError),

    #[error("The loaded media has no audio tracks")]
    NoAudioTracks,

    #[error("Export failed: {0}")]
    Export(String),
}

/// Result type for coordinator operations.
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;
