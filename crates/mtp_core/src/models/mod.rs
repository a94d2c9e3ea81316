//! Data models for Multitrack Player.
//!
//! - Enums for stream kinds and transport state
//! - Media structures (probe reports, loaded media sources)
//! - Player events delivered to the shell

mod enums;
mod events;
mod media;

pub use enums::{StreamKind, TrackRef, TransportState};
pub use events::{EventCallback, MessageLevel, PlayerEvent, UserMessage};
pub use media::{
    format_clock, timeline_label, MediaSource, ProbeReport, StreamInfo, VideoDimensions,
};
