//! Scrub controller: drag-seek without seeking on every pointer move.
//!
//! A scrub is three calls. `start_scrub` pauses everything and remembers
//! whether playback was running, `preview_move` only moves the displayed
//! position, and `end_scrub` issues the single real seek and restores the
//! previous transport state.

use crate::coordinator::{
    CoordinatorError, CoordinatorResult, FanoutReport, PlaybackSession, PollTimer,
};
use crate::models::TransportState;

/// Enter `Scrubbing` from `Playing` or `Paused`.
///
/// Duration and the displayed position are left untouched.
pub fn start_scrub(
    session: &mut PlaybackSession,
    timer: &mut PollTimer,
) -> CoordinatorResult<FanoutReport> {
    let state = session.state();
    if !state.can_scrub() {
        return Err(CoordinatorError::InvalidTransition {
            command: "start scrubbing",
            state,
        });
    }

    session.set_was_playing(state == TransportState::Playing);
    session.set_state(TransportState::Scrubbing);
    timer.stop();
    Ok(session.fanout(|d| d.pause()))
}

/// Update the displayed position while dragging. Never touches a decoder.
///
/// Returns the clamped preview position.
pub fn preview_move(session: &mut PlaybackSession, candidate_ms: u64) -> CoordinatorResult<u64> {
    if session.state() != TransportState::Scrubbing {
        return Err(CoordinatorError::InvalidTransition {
            command: "preview",
            state: session.state(),
        });
    }
    let ms = session.clamp_position(candidate_ms);
    session.set_position_ms(ms);
    Ok(ms)
}

/// Commit the scrub with exactly one seek fan-out.
///
/// Playback resumes if it was running when the scrub started; otherwise
/// the transport ends up `Paused`.
pub fn end_scrub(
    session: &mut PlaybackSession,
    timer: &mut PollTimer,
    final_ms: u64,
) -> CoordinatorResult<FanoutReport> {
    if session.state() != TransportState::Scrubbing {
        return Err(CoordinatorError::InvalidTransition {
            command: "end scrubbing",
            state: session.state(),
        });
    }

    let ms = session.clamp_position(final_ms);
    let mut report = session.fanout(|d| d.seek(ms));
    session.set_position_ms(ms);

    if session.was_playing() {
        report.merge(session.fanout(|d| d.play()));
        session.set_state(TransportState::Playing);
        timer.start();
    } else {
        session.set_state(TransportState::Paused);
    }
    Ok(report)
}
