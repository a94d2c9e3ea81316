//! Fake engines shared by unit tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tempfile::TempDir;

use crate::config::ExtractionSettings;
use crate::coordinator::PlaybackSession;
use crate::decoder::SimulatedFactory;
use crate::extraction::{
    CancelHandle, ExtractedAsset, ExtractionError, ProbeEngine, ProbeError, TrackExtractor,
    TranscodeEngine, TranscodeRequest,
};
use crate::models::{MediaSource, ProbeReport, StreamInfo, VideoDimensions};

/// Probe engine reporting one 1920x1080 video stream plus N audio streams.
pub struct FakeProbe {
    audio_streams: Option<usize>,
}

impl FakeProbe {
    pub const DURATION_MS: u64 = 120_000;

    pub fn with_audio(n: usize) -> Self {
        Self {
            audio_streams: Some(n),
        }
    }

    pub fn failing() -> Self {
        Self {
            audio_streams: None,
        }
    }
}

impl ProbeEngine for FakeProbe {
    fn probe(&self, _path: &Path, _cancel: &CancelHandle) -> Result<ProbeReport, ProbeError> {
        let Some(n) = self.audio_streams else {
            return Err(ProbeError::NonZeroExit {
                code: Some(1),
                stderr: "Invalid data found when processing input".to_string(),
            });
        };

        let mut streams = vec![StreamInfo::video(0, 1920, 1080)];
        streams.extend((0..n).map(|i| StreamInfo::audio(i + 1)));
        Ok(ProbeReport {
            streams,
            duration_ms: Some(Self::DURATION_MS),
        })
    }
}

/// Transcoder that writes a few bytes per track and records every attempt.
pub struct FakeTranscoder {
    fail_at: Option<usize>,
    cancel_at: Option<usize>,
    delay: Duration,
    attempts: Mutex<Vec<usize>>,
}

impl FakeTranscoder {
    pub fn new() -> Self {
        Self {
            fail_at: None,
            cancel_at: None,
            delay: Duration::ZERO,
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_at(index: usize) -> Self {
        Self {
            fail_at: Some(index),
            ..Self::new()
        }
    }

    /// Behaves as if the in-flight process was killed at `index`.
    pub fn cancelling_at(index: usize) -> Self {
        Self {
            cancel_at: Some(index),
            ..Self::new()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn attempts(&self) -> Vec<usize> {
        self.attempts.lock().clone()
    }
}

impl TranscodeEngine for FakeTranscoder {
    fn transcode(
        &self,
        request: &TranscodeRequest,
        cancel: &CancelHandle,
    ) -> Result<(), ExtractionError> {
        self.attempts.lock().push(request.stream);

        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        if cancel.is_cancelled() || self.cancel_at == Some(request.stream) {
            return Err(ExtractionError::Cancelled);
        }
        if self.fail_at == Some(request.stream) {
            return Err(ExtractionError::Transcode {
                index: request.stream,
                message: "Stream map '0:a:x' matches no streams.".to_string(),
            });
        }

        fs::write(&request.output, b"RIFF\0\0\0\0WAVE")?;
        Ok(())
    }
}

/// Extractor over fake engines writing into `temp_root`.
pub fn fake_extractor(
    temp_root: &Path,
    probe: FakeProbe,
    transcoder: Arc<FakeTranscoder>,
) -> TrackExtractor {
    TrackExtractor::new(
        Arc::new(probe),
        transcoder,
        ExtractionSettings::default(),
        temp_root,
    )
}

/// Create an empty media file so load requests pass the existence check.
pub fn media_file(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, b"not really a movie").expect("write media file");
    path
}

/// An extracted asset backed by an empty temp file in `dir`.
pub fn asset_in(dir: &Path, index: usize) -> ExtractedAsset {
    let file = tempfile::Builder::new()
        .prefix(&format!("track_{}_", index))
        .suffix(".wav")
        .tempfile_in(dir)
        .expect("create asset");
    ExtractedAsset::new(index, file.into_temp_path())
}

/// A session of `tracks` audio tracks on simulated decoders.
///
/// The source reports no duration, so the session takes it from the video
/// decoder. Keep the returned directory alive for the assets' lifetime.
pub fn simulated_session(factory: &SimulatedFactory, tracks: usize) -> (PlaybackSession, TempDir) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let assets: Vec<ExtractedAsset> = (0..tracks).map(|i| asset_in(dir.path(), i)).collect();
    let source = MediaSource::new(
        dir.path().join("movie.mkv"),
        0,
        tracks,
        VideoDimensions::FALLBACK,
    );
    let session = PlaybackSession::attach(factory, source, assets, &vec![0.5; tracks])
        .expect("attach session");
    (session, dir)
}
