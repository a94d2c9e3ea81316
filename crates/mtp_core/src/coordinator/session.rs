//! Playback session: one video handle, N audio handles, transport state.

use std::iter;

use super::errors::CoordinatorResult;
use crate::decoder::{
    AudioTrackHandle, DecoderCommandError, DecoderEngine, DecoderFactory, DecoderResult,
    DecoderSlot, GainControls, VideoTrackHandle,
};
use crate::extraction::ExtractedAsset;
use crate::models::{MediaSource, TrackRef, TransportState};

/// Per-handle outcome of one fan-out.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FanoutReport {
    /// Handles the command was sent to.
    pub attempted: usize,
    /// Handles that failed, in fan-out order.
    pub failures: Vec<(TrackRef, DecoderCommandError)>,
}

impl FanoutReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_tracks(&self) -> Vec<TrackRef> {
        self.failures.iter().map(|(t, _)| *t).collect()
    }

    pub(crate) fn merge(&mut self, other: FanoutReport) {
        self.attempted += other.attempted;
        self.failures.extend(other.failures);
    }
}

/// The loaded media and its decoders.
///
/// Audio indices are `0..len` with no gaps for the whole session.
pub struct PlaybackSession {
    source: MediaSource,
    video: VideoTrackHandle,
    audio: Vec<AudioTrackHandle>,
    gains: GainControls,
    state: TransportState,
    was_playing: bool,
    position_ms: u64,
    duration_ms: Option<u64>,
}

impl PlaybackSession {
    /// Create and open every decoder for a finished load.
    ///
    /// The video decoder is required. If an audio decoder can't be created,
    /// that track and every later one are dropped so indices stay gap-free.
    pub fn attach(
        factory: &dyn DecoderFactory,
        source: MediaSource,
        assets: Vec<ExtractedAsset>,
        gains: &[f32],
    ) -> CoordinatorResult<Self> {
        let video_decoder = factory.create(TrackRef::Video)?;
        let mut video = VideoTrackHandle::open(video_decoder, source.path());

        let mut audio: Vec<AudioTrackHandle> = Vec::with_capacity(assets.len());
        let mut assets = assets.into_iter();
        for asset in assets.by_ref() {
            let index = asset.index();
            debug_assert_eq!(index, audio.len());
            match factory.create(TrackRef::Audio(index)) {
                Ok(decoder) => {
                    let gain = gains.get(index).copied().unwrap_or(0.5);
                    audio.push(AudioTrackHandle::open(decoder, asset, gain));
                }
                Err(e) => {
                    tracing::warn!(
                        track = index,
                        "Audio decoder unavailable, dropping tracks from {}: {}",
                        index,
                        e
                    );
                    break;
                }
            }
        }
        // Remaining assets are released here
        drop(assets);

        let duration_ms = if source.duration_ms() > 0 {
            Some(source.duration_ms())
        } else {
            video.slot_mut().duration_ms().ok().flatten()
        };

        let gains = GainControls::new(audio.iter().map(|a| a.gain_cell()).collect());

        tracing::info!(
            media = %source.display_name(),
            tracks = audio.len(),
            duration_ms = ?duration_ms,
            "Session attached"
        );

        Ok(Self {
            source,
            video,
            audio,
            gains,
            state: TransportState::Loaded,
            was_playing: false,
            position_ms: 0,
            duration_ms,
        })
    }

    pub fn source(&self) -> &MediaSource {
        &self.source
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: TransportState) {
        if self.state != state {
            tracing::debug!("Transport {} -> {}", self.state, state);
        }
        self.state = state;
    }

    pub fn was_playing(&self) -> bool {
        self.was_playing
    }

    pub(crate) fn set_was_playing(&mut self, was_playing: bool) {
        self.was_playing = was_playing;
    }

    /// Position shown to the user.
    pub fn position_ms(&self) -> u64 {
        self.position_ms
    }

    pub(crate) fn set_position_ms(&mut self, ms: u64) {
        self.position_ms = ms;
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.duration_ms
    }

    pub fn track_count(&self) -> usize {
        self.audio.len()
    }

    pub fn video(&self) -> &VideoTrackHandle {
        &self.video
    }

    pub fn audio_tracks(&self) -> &[AudioTrackHandle] {
        &self.audio
    }

    pub fn audio_tracks_mut(&mut self) -> &mut [AudioTrackHandle] {
        &mut self.audio
    }

    pub fn gain_controls(&self) -> GainControls {
        self.gains.clone()
    }

    /// Clamp `ms` to the known duration.
    pub fn clamp_position(&self, ms: u64) -> u64 {
        match self.duration_ms {
            Some(d) => ms.min(d),
            None => ms,
        }
    }

    fn slots_mut(&mut self) -> impl Iterator<Item = &mut DecoderSlot> + '_ {
        iter::once(self.video.slot_mut()).chain(self.audio.iter_mut().map(|a| a.slot_mut()))
    }

    /// Send one command to the video, then every audio track in index
    /// order. Failures are collected and never stop the loop.
    pub fn fanout(
        &mut self,
        mut f: impl FnMut(&mut dyn DecoderEngine) -> DecoderResult<()>,
    ) -> FanoutReport {
        let mut report = FanoutReport::default();
        for slot in self.slots_mut() {
            if !slot.is_live() {
                continue;
            }
            report.attempted += 1;
            if let Err(e) = slot.command(&mut f) {
                report.failures.push((slot.track(), e));
            }
        }
        report
    }

    /// Seek every audio track (not the video) to `ms`.
    pub fn resync_audio(&mut self, ms: u64) -> FanoutReport {
        let mut report = FanoutReport::default();
        for handle in &mut self.audio {
            let slot = handle.slot_mut();
            if !slot.is_live() {
                continue;
            }
            report.attempted += 1;
            if let Err(e) = slot.command(|d| d.seek(ms)) {
                report.failures.push((slot.track(), e));
            }
        }
        report
    }

    pub fn video_position(&mut self) -> DecoderResult<u64> {
        self.video.slot_mut().position_ms()
    }

    /// Whether the video decoder reports end of media.
    pub fn video_reached_end(&mut self) -> bool {
        self.video.slot_mut().reached_end().unwrap_or(false)
    }

    /// Displayed position reached the duration, or the video reports end of media.
    pub fn at_end(&mut self) -> bool {
        let position = self.position_ms;
        matches!(self.duration_ms, Some(d) if d > 0 && position >= d) || self.video_reached_end()
    }

    /// Ask the video decoder for a duration the probe didn't know.
    ///
    /// Returns the duration the first time it becomes known.
    pub fn refresh_duration(&mut self) -> Option<u64> {
        if self.duration_ms.is_some() {
            return None;
        }
        let found = self
            .video
            .slot_mut()
            .duration_ms()
            .ok()
            .flatten()
            .filter(|d| *d > 0)?;
        self.duration_ms = Some(found);
        Some(found)
    }

    /// Store and apply a gain. Out-of-range indices are ignored.
    pub fn set_track_gain(&mut self, index: usize, gain: f32) -> Option<DecoderResult<()>> {
        let handle = self.audio.get_mut(index)?;
        Some(handle.set_gain(gain))
    }

    /// Push gains written through [`GainControls`] since the last call.
    pub fn apply_pending_gains(&mut self) -> FanoutReport {
        let mut report = FanoutReport::default();
        for handle in &mut self.audio {
            let track = handle.slot().track();
            if let Some(result) = handle.apply_pending_gain() {
                report.attempted += 1;
                if let Err(e) = result {
                    report.failures.push((track, e));
                }
            }
        }
        report
    }

    /// Terminate every decoder and release every asset.
    pub fn teardown(&mut self) {
        tracing::debug!(tracks = self.audio.len(), "Tearing down session");
        self.video.slot_mut().terminate();
        for handle in &mut self.audio {
            handle.release();
        }
        self.audio.clear();
        self.gains = GainControls::default();
        self.state = TransportState::Idle;
    }
}
