//! Track extraction service: probe, then transcode each audio stream.
//!
//! Extraction is sequential and stops at the first failing track. Tracks
//! extracted before the failure are kept; nothing is retried.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::cancel::CancelHandle;
use super::probe::{FfprobeEngine, ProbeEngine};
use super::transcode::{FfmpegTranscoder, TranscodeEngine};
use super::types::{
    ExtractedAsset, ExtractionError, ExtractionReport, LoadedMedia, ProbeError, TranscodeRequest,
};
use crate::config::{ExtractionSettings, Settings};
use crate::logging::LoadLogger;
use crate::models::{MediaSource, ProbeReport, VideoDimensions};

/// Produces per-track audio assets from one container.
#[derive(Clone)]
pub struct TrackExtractor {
    probe: Arc<dyn ProbeEngine>,
    transcoder: Arc<dyn TranscodeEngine>,
    settings: ExtractionSettings,
    temp_root: PathBuf,
}

impl TrackExtractor {
    pub fn new(
        probe: Arc<dyn ProbeEngine>,
        transcoder: Arc<dyn TranscodeEngine>,
        settings: ExtractionSettings,
        temp_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            probe,
            transcoder,
            settings,
            temp_root: temp_root.into(),
        }
    }

    /// Extractor using ffprobe and ffmpeg from the tool settings.
    pub fn from_settings(settings: &Settings) -> Self {
        let extraction = settings.extraction.clone();
        Self::new(
            Arc::new(FfprobeEngine::new(
                settings.tools.ffprobe.clone(),
                extraction.probe_timeout(),
            )),
            Arc::new(FfmpegTranscoder::new(
                settings.tools.ffmpeg.clone(),
                extraction.transcode_timeout(),
            )),
            extraction,
            settings.paths.temp_root_path(),
        )
    }

    pub fn settings(&self) -> &ExtractionSettings {
        &self.settings
    }

    pub fn probe(&self, path: &Path, cancel: &CancelHandle) -> Result<ProbeReport, ProbeError> {
        self.probe.probe(path, cancel)
    }

    pub fn probe_video_dimensions(&self, path: &Path, cancel: &CancelHandle) -> VideoDimensions {
        self.probe.probe_video_dimensions(path, cancel)
    }

    /// Extract audio streams `0..min(audio_stream_count, max_tracks)`.
    ///
    /// On cancellation every asset extracted so far is dropped and
    /// `stopped_by` is [`ExtractionError::Cancelled`].
    pub fn extract_tracks(
        &self,
        source: &Path,
        audio_stream_count: usize,
        max_tracks: Option<usize>,
        cancel: &CancelHandle,
        logger: &LoadLogger,
    ) -> ExtractionReport {
        let requested = audio_stream_count.min(max_tracks.unwrap_or(usize::MAX));
        let mut report = ExtractionReport {
            requested,
            ..Default::default()
        };

        if requested == 0 {
            return report;
        }

        if let Err(e) = fs::create_dir_all(&self.temp_root) {
            logger.error(&format!(
                "Cannot create temp folder {}: {}",
                self.temp_root.display(),
                e
            ));
            report.stopped_by = Some(ExtractionError::Io(e));
            return report;
        }

        for index in 0..requested {
            if cancel.is_cancelled() {
                report.assets.clear();
                report.stopped_by = Some(ExtractionError::Cancelled);
                return report;
            }

            let temp = match tempfile::Builder::new()
                .prefix(&format!("track_{}_", index))
                .suffix(".wav")
                .tempfile_in(&self.temp_root)
            {
                Ok(file) => file.into_temp_path(),
                Err(e) => {
                    logger.error(&format!("Cannot create temp file for track {}: {}", index, e));
                    report.stopped_by = Some(ExtractionError::Io(e));
                    return report;
                }
            };

            let request = TranscodeRequest {
                source: source.to_path_buf(),
                stream: index,
                output: temp.to_path_buf(),
                gain_multiplier: self.settings.gain_boost,
                channels: self.settings.channels,
                sample_rate: self.settings.sample_rate,
            };

            logger.command(&self.transcoder.describe(&request));

            match self.transcoder.transcode(&request, cancel) {
                Ok(()) => {
                    logger.debug(&format!("Track {} -> {}", index, temp.display()));
                    report.assets.push(ExtractedAsset::new(index, temp));
                }
                Err(ExtractionError::Cancelled) => {
                    logger.warn("Extraction cancelled");
                    report.assets.clear();
                    report.stopped_by = Some(ExtractionError::Cancelled);
                    return report;
                }
                Err(e) => {
                    logger.warn(&e.to_string());
                    if let ExtractionError::Transcode { message, .. } = &e {
                        for line in message.lines() {
                            logger.output_line(line, true);
                        }
                        logger.show_tail("ffmpeg");
                    }
                    report.stopped_by = Some(e);
                    break;
                }
            }
        }

        logger.success(&format!(
            "Extracted {} of {} audio track(s)",
            report.assets.len(),
            requested
        ));
        report
    }

    /// Full background load: probe, video dimensions, then extraction.
    ///
    /// Probe failure is not fatal: the file loads with zero audio tracks
    /// and the error is reported in [`LoadedMedia::probe_error`]. The only
    /// error returned is [`ExtractionError::Cancelled`].
    pub fn load(
        &self,
        path: &Path,
        cancel: &CancelHandle,
        logger: &LoadLogger,
    ) -> Result<LoadedMedia, ExtractionError> {
        if cancel.is_cancelled() {
            return Err(ExtractionError::Cancelled);
        }

        logger.phase("Probe");
        let (audio_count, duration_ms, probe_error) = match self.probe(path, cancel) {
            Ok(report) => {
                logger.info(&format!(
                    "{} stream(s), {} audio",
                    report.streams.len(),
                    report.audio_stream_count()
                ));
                (report.audio_stream_count(), report.duration_ms, None)
            }
            Err(ProbeError::Cancelled) => return Err(ExtractionError::Cancelled),
            Err(e) => {
                logger.warn(&format!("Probe failed, assuming no audio: {}", e));
                (0, None, Some(e))
            }
        };

        let dimensions = self.probe_video_dimensions(path, cancel);
        if cancel.is_cancelled() {
            return Err(ExtractionError::Cancelled);
        }

        logger.phase("Extract");
        let extraction = self.extract_tracks(
            path,
            audio_count,
            self.settings.max_tracks,
            cancel,
            logger,
        );
        if matches!(extraction.stopped_by, Some(ExtractionError::Cancelled)) {
            return Err(ExtractionError::Cancelled);
        }

        Ok(LoadedMedia {
            source: MediaSource::new(path, duration_ms.unwrap_or(0), audio_count, dimensions),
            extraction,
            probe_error,
        })
    }
}
