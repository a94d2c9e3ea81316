//! Track handles owned by a playback session.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::engine::{DecoderCommandError, DecoderEngine, DecoderResult};
use super::gain::TrackGain;
use crate::extraction::ExtractedAsset;
use crate::models::TrackRef;

/// One decoder plus its liveness and degradation flags.
///
/// A degraded slot failed at least one transport command. It stays in the
/// session and keeps receiving commands.
pub struct DecoderSlot {
    track: TrackRef,
    decoder: Box<dyn DecoderEngine>,
    live: bool,
    degraded: bool,
}

impl DecoderSlot {
    pub fn new(track: TrackRef, decoder: Box<dyn DecoderEngine>) -> Self {
        Self {
            track,
            decoder,
            live: true,
            degraded: false,
        }
    }

    pub fn track(&self) -> TrackRef {
        self.track
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn mark_degraded(&mut self) {
        if !self.degraded {
            tracing::warn!(track = %self.track, "Decoder marked degraded");
        }
        self.degraded = true;
    }

    /// Run a transport command, marking the slot degraded on failure.
    pub fn command<T>(
        &mut self,
        f: impl FnOnce(&mut dyn DecoderEngine) -> DecoderResult<T>,
    ) -> DecoderResult<T> {
        if !self.live {
            return Err(DecoderCommandError::Terminated);
        }
        let result = f(self.decoder.as_mut());
        if let Err(ref e) = result {
            tracing::debug!(track = %self.track, "Decoder command failed: {}", e);
            self.mark_degraded();
        }
        result
    }

    /// Read the playback position without affecting degradation.
    pub fn position_ms(&mut self) -> DecoderResult<u64> {
        if !self.live {
            return Err(DecoderCommandError::Terminated);
        }
        self.decoder.position_ms()
    }

    pub fn duration_ms(&mut self) -> DecoderResult<Option<u64>> {
        if !self.live {
            return Err(DecoderCommandError::Terminated);
        }
        self.decoder.duration_ms()
    }

    pub fn is_playing(&mut self) -> DecoderResult<bool> {
        if !self.live {
            return Err(DecoderCommandError::Terminated);
        }
        self.decoder.is_playing()
    }

    pub fn reached_end(&mut self) -> DecoderResult<bool> {
        if !self.live {
            return Err(DecoderCommandError::Terminated);
        }
        self.decoder.reached_end()
    }

    pub fn terminate(&mut self) {
        if self.live {
            self.decoder.terminate();
            self.live = false;
        }
    }
}

impl Drop for DecoderSlot {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// The session's video decoder. Its own audio is always muted.
pub struct VideoTrackHandle {
    slot: DecoderSlot,
    source: PathBuf,
}

impl VideoTrackHandle {
    /// Open `source` on `decoder` and mute it.
    ///
    /// Open and mute failures degrade the handle instead of failing the
    /// session.
    pub fn open(decoder: Box<dyn DecoderEngine>, source: &Path) -> Self {
        let mut slot = DecoderSlot::new(TrackRef::Video, decoder);
        let _ = slot.command(|d| d.open(source));
        let _ = slot.command(|d| d.mute());
        Self {
            slot,
            source: source.to_path_buf(),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn slot(&self) -> &DecoderSlot {
        &self.slot
    }

    pub fn slot_mut(&mut self) -> &mut DecoderSlot {
        &mut self.slot
    }
}

/// One extracted audio track and its decoder.
pub struct AudioTrackHandle {
    index: usize,
    gain: Arc<TrackGain>,
    slot: DecoderSlot,
    asset: Option<ExtractedAsset>,
}

impl AudioTrackHandle {
    /// Open the asset on `decoder` and apply the initial gain.
    pub fn open(decoder: Box<dyn DecoderEngine>, asset: ExtractedAsset, gain: f32) -> Self {
        let index = asset.index();
        let mut slot = DecoderSlot::new(TrackRef::Audio(index), decoder);
        let gain = Arc::new(TrackGain::new(gain));

        let _ = slot.command(|d| d.open(asset.path()));
        let initial = gain.get();
        let _ = slot.command(|d| d.set_volume(initial));

        Self {
            index,
            gain,
            slot,
            asset: Some(asset),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn gain(&self) -> f32 {
        self.gain.get()
    }

    pub fn gain_cell(&self) -> Arc<TrackGain> {
        Arc::clone(&self.gain)
    }

    /// Store and apply a new gain.
    pub fn set_gain(&mut self, gain: f32) -> DecoderResult<()> {
        self.gain.set_applied(gain);
        let applied = self.gain.get();
        self.slot.command(|d| d.set_volume(applied))
    }

    /// Push a gain written through `GainControls`, if any.
    pub fn apply_pending_gain(&mut self) -> Option<DecoderResult<()>> {
        let gain = self.gain.take_dirty()?;
        Some(self.slot.command(|d| d.set_volume(gain)))
    }

    pub fn asset_path(&self) -> Option<&Path> {
        self.asset.as_ref().map(|a| a.path())
    }

    pub fn slot(&self) -> &DecoderSlot {
        &self.slot
    }

    pub fn slot_mut(&mut self) -> &mut DecoderSlot {
        &mut self.slot
    }

    /// Terminate the decoder, then release the backing asset.
    pub fn release(&mut self) {
        self.slot.terminate();
        self.asset.take();
    }
}

impl Drop for AudioTrackHandle {
    fn drop(&mut self) {
        self.release();
    }
}
