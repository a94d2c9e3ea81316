//! Decoder handle abstraction.
//!
//! The coordinator drives every decoder through [`DecoderEngine`]; where
//! the decoders come from is a [`DecoderFactory`] decision.

mod engine;
mod gain;
mod handle;
#[cfg(unix)]
mod mpv;
mod simulated;

pub use engine::{
    DecoderCommand, DecoderCommandError, DecoderEngine, DecoderFactory, DecoderResult,
};
pub use gain::{clamp_gain, GainControls, TrackGain};
pub use handle::{AudioTrackHandle, DecoderSlot, VideoTrackHandle};
#[cfg(unix)]
pub use mpv::{MpvDecoder, MpvFactory};
pub use simulated::{
    DecoderCall, JournalEntry, SimClock, SimulatedDecoder, SimulatedFactory, SimulatedTrack,
    REALTIME_JOURNAL_LIMIT,
};
