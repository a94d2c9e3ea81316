//! Drift monitor: keeps audio tracks on the video clock.
//!
//! The video decoder is the reference. Each audio track whose position
//! differs from it by more than the tolerance is re-seeked on its own;
//! the rest of the session is left alone.

use crate::config::SyncSettings;
use crate::coordinator::PlaybackSession;

/// One corrective seek issued by the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriftCorrection {
    pub index: usize,
    pub drift_ms: u64,
    pub target_ms: u64,
    /// Whether the decoder accepted the seek.
    pub applied: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriftMonitor {
    tolerance_ms: u64,
}

impl DriftMonitor {
    pub fn new(tolerance_ms: u64) -> Self {
        Self { tolerance_ms }
    }

    pub fn from_settings(settings: &SyncSettings) -> Self {
        Self::new(settings.drift_tolerance_ms)
    }

    pub fn tolerance_ms(&self) -> u64 {
        self.tolerance_ms
    }

    /// Drift of one track if it is beyond tolerance.
    pub fn evaluate(&self, video_ms: u64, audio_ms: u64) -> Option<u64> {
        let drift = video_ms.abs_diff(audio_ms);
        (drift > self.tolerance_ms).then_some(drift)
    }

    /// Compare every live audio track against the video position `video_ms`
    /// and re-seek the ones that drifted.
    ///
    /// The caller reads the video clock once per tick and passes it in. An
    /// unreadable audio position skips that track.
    pub fn check(&self, session: &mut PlaybackSession, video_ms: u64) -> Vec<DriftCorrection> {
        let mut corrections = Vec::new();
        for handle in session.audio_tracks_mut() {
            let index = handle.index();
            let slot = handle.slot_mut();
            if !slot.is_live() {
                continue;
            }
            let Ok(audio_ms) = slot.position_ms() else {
                continue;
            };
            let Some(drift_ms) = self.evaluate(video_ms, audio_ms) else {
                continue;
            };

            let applied = slot.command(|d| d.seek(video_ms)).is_ok();
            tracing::debug!(
                track = index,
                drift_ms,
                target_ms = video_ms,
                applied,
                "Drift corrected"
            );
            corrections.push(DriftCorrection {
                index,
                drift_ms,
                target_ms: video_ms,
                applied,
            });
        }
        corrections
    }
}

impl Default for DriftMonitor {
    fn default() -> Self {
        Self::from_settings(&SyncSettings::default())
    }
}
