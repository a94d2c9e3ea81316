//! Playback coordinator: the transport state machine.
//!
//! Owns the current [`PlaybackSession`], the background load worker and the
//! poll timer. Every transport command fans out to the video decoder first,
//! then to each audio decoder in index order. Notifications are delivered
//! synchronously through the [`EventCallback`].
//!
//! Transitions:
//!
//! - `Idle` to `Loaded` when a finished load attaches
//! - `Loaded` or `Paused` to `Playing` on play, `Playing` to `Paused` on pause
//! - `Playing` or `Paused` to `Scrubbing`, and back to the state it left
//! - stop from `Loaded`, `Playing` or `Paused` to `Loaded` at position 0
//! - a new load from anywhere back to `Idle`

mod errors;
mod loader;
mod session;
mod timer;

pub use errors::{CoordinatorError, CoordinatorResult};
pub use loader::LoadTask;
pub use session::{FanoutReport, PlaybackSession};
pub use timer::PollTimer;

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::Settings;
use crate::decoder::{DecoderFactory, GainControls};
use crate::drift::DriftMonitor;
use crate::export::{run_mix_export, ExportPlan, ExportTrack};
use crate::extraction::{CancelHandle, ExtractionReport, LoadedMedia, TrackExtractor};
use crate::logging::{LoadLogger, LogConfig};
use crate::models::{
    timeline_label, EventCallback, MediaSource, PlayerEvent, TransportState, UserMessage,
};
use crate::scrub;
use crate::volume::VolumeMapper;

fn notify(callback: &Option<EventCallback>, event: PlayerEvent) {
    if let Some(cb) = callback {
        cb(&event);
    }
}

fn log_failures(command: &str, report: &FanoutReport) {
    for (track, e) in &report.failures {
        tracing::warn!(track = %track, "{} failed: {}", command, e);
    }
}

pub struct PlaybackCoordinator {
    settings: Settings,
    extractor: TrackExtractor,
    factory: Arc<dyn DecoderFactory>,
    volume: VolumeMapper,
    drift: DriftMonitor,
    timer: PollTimer,
    session: Option<PlaybackSession>,
    pending: Option<LoadTask>,
    generation: u64,
    callback: Option<EventCallback>,
    last_activity: Instant,
}

impl PlaybackCoordinator {
    pub fn new(
        settings: Settings,
        extractor: TrackExtractor,
        factory: Arc<dyn DecoderFactory>,
    ) -> Self {
        Self {
            volume: VolumeMapper::from_settings(&settings.volume),
            drift: DriftMonitor::from_settings(&settings.sync),
            timer: PollTimer::from_settings(&settings.sync),
            settings,
            extractor,
            factory,
            session: None,
            pending: None,
            generation: 0,
            callback: None,
            last_activity: Instant::now(),
        }
    }

    /// Coordinator using ffprobe/ffmpeg as configured in `settings`.
    pub fn from_settings(settings: Settings, factory: Arc<dyn DecoderFactory>) -> Self {
        let extractor = TrackExtractor::from_settings(&settings);
        Self::new(settings, extractor, factory)
    }

    pub fn with_callback(mut self, callback: EventCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn set_callback(&mut self, callback: EventCallback) {
        self.callback = Some(callback);
    }

    fn emit(&self, event: PlayerEvent) {
        notify(&self.callback, event);
    }

    fn message(&self, message: UserMessage) {
        self.emit(PlayerEvent::Message(message));
    }

    // ---- queries ----

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn volume_mapper(&self) -> VolumeMapper {
        self.volume
    }

    /// Transport state; `Idle` while nothing is attached.
    pub fn state(&self) -> TransportState {
        self.session
            .as_ref()
            .map(|s| s.state())
            .unwrap_or(TransportState::Idle)
    }

    pub fn is_playing(&self) -> bool {
        self.state() == TransportState::Playing
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn position_ms(&self) -> u64 {
        self.session.as_ref().map(|s| s.position_ms()).unwrap_or(0)
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.session.as_ref().and_then(|s| s.duration_ms())
    }

    pub fn track_count(&self) -> usize {
        self.session.as_ref().map(|s| s.track_count()).unwrap_or(0)
    }

    pub fn source(&self) -> Option<&MediaSource> {
        self.session.as_ref().map(|s| s.source())
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    /// `MM:SS / MM:SS` for the current position.
    pub fn timeline_label(&self) -> String {
        timeline_label(self.position_ms(), self.duration_ms().unwrap_or(0))
    }

    /// Gain cells of the current session, for slider callbacks.
    pub fn gain_controls(&self) -> GainControls {
        self.session
            .as_ref()
            .map(|s| s.gain_controls())
            .unwrap_or_default()
    }

    pub fn tick_interval(&self) -> Duration {
        self.timer.interval()
    }

    // ---- loading ----

    /// Start loading `path` in the background.
    ///
    /// A missing file leaves everything as it was. Otherwise any in-flight
    /// load is cancelled and the current session is torn down first.
    pub fn begin_load(&mut self, path: impl AsRef<Path>) -> CoordinatorResult<()> {
        let path = path.as_ref();
        if !path.is_file() {
            let err = CoordinatorError::LoadNotFound(path.to_path_buf());
            self.message(UserMessage::error(err.to_string()));
            return Err(err);
        }

        self.cancel_pending();
        self.teardown_session();
        self.generation += 1;

        tracing::info!(generation = self.generation, "Loading {}", path.display());
        self.message(UserMessage::info(format!(
            "Loading audio tracks from: {}",
            path.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string())
        )));

        let logger = self.load_logger(path);
        self.pending = Some(LoadTask::spawn(
            self.generation,
            path.to_path_buf(),
            self.extractor.clone(),
            logger,
        ));
        Ok(())
    }

    fn load_logger(&self, path: &Path) -> LoadLogger {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "load".to_string());
        let config = LogConfig::from(&self.settings.logging);

        if self.settings.logging.file_logging {
            match LoadLogger::new(&name, &self.settings.paths.logs_folder, config.clone()) {
                Ok(logger) => return logger,
                Err(e) => tracing::warn!(
                    "Could not create load log in {}: {}",
                    self.settings.paths.logs_folder,
                    e
                ),
            }
        }
        LoadLogger::detached(name, config)
    }

    /// Attach the background load if it has finished.
    ///
    /// Returns `None` while nothing is ready, otherwise the attach outcome
    /// with the number of audio tracks.
    pub fn poll_load(&mut self) -> Option<CoordinatorResult<usize>> {
        if !self.pending.as_ref()?.is_finished() {
            return None;
        }
        let task = self.pending.take()?;
        self.finish_load(task)
    }

    /// Block until the background load finishes, then attach it.
    pub fn wait_for_load(&mut self) -> Option<CoordinatorResult<usize>> {
        let task = self.pending.take()?;
        self.finish_load(task)
    }

    fn cancel_pending(&mut self) {
        if let Some(task) = self.pending.take() {
            tracing::debug!(
                generation = task.generation(),
                "Cancelling superseded load of {}",
                task.path().display()
            );
            task.cancel();
            // Assets of the superseded load are released with the result
            drop(task.join());
        }
    }

    fn finish_load(&mut self, task: LoadTask) -> Option<CoordinatorResult<usize>> {
        let generation = task.generation();
        let result = task.join();
        if generation != self.generation {
            tracing::debug!(generation, current = self.generation, "Discarding stale load");
            return None;
        }

        let loaded = match result {
            Ok(loaded) => loaded,
            Err(e) => {
                let err = CoordinatorError::LoadFailed(e.to_string());
                self.message(UserMessage::error(err.to_string()));
                return Some(Err(err));
            }
        };
        Some(self.attach(loaded))
    }

    fn attach(&mut self, loaded: LoadedMedia) -> CoordinatorResult<usize> {
        let LoadedMedia {
            source,
            extraction,
            probe_error,
        } = loaded;
        let ExtractionReport {
            assets,
            requested,
            stopped_by,
        } = extraction;

        if let Some(e) = probe_error {
            self.message(UserMessage::warning(format!(
                "Could not read audio streams ({}). Playing video only.",
                e
            )));
        }

        let gains = self
            .volume
            .initial_gains(assets.len(), &self.settings.volume.remembered());
        let session = match PlaybackSession::attach(self.factory.as_ref(), source, assets, &gains)
        {
            Ok(session) => session,
            Err(e) => {
                self.message(UserMessage::error(format!("Could not start playback: {}", e)));
                return Err(e);
            }
        };

        let count = session.track_count();
        let duration = session.duration_ms();
        self.session = Some(session);

        self.emit(PlayerEvent::TrackCountChanged(count));
        if let Some(ms) = duration {
            self.emit(PlayerEvent::DurationKnown(ms));
        }

        if let Some(e) = stopped_by {
            self.message(UserMessage::warning(format!(
                "Extracted {} of {} audio track(s): {}",
                count, requested, e
            )));
        }
        if count == 0 {
            self.message(UserMessage::info("No audio tracks found in the selected file."));
        } else {
            self.message(UserMessage::info(format!(
                "Loaded {} audio track(s). Click Play.",
                count
            )));
        }
        Ok(count)
    }

    fn teardown_session(&mut self) {
        self.timer.stop();
        if let Some(mut session) = self.session.take() {
            let was_playing = session.state() == TransportState::Playing;
            session.teardown();
            if was_playing {
                self.emit(PlayerEvent::PlaybackStateChanged(false));
            }
        }
    }

    // ---- transport ----

    pub fn play(&mut self) -> CoordinatorResult<FanoutReport> {
        let session = self.session.as_mut().ok_or(CoordinatorError::NoSession)?;
        let state = session.state();
        if !state.can_play() {
            return Err(CoordinatorError::InvalidTransition {
                command: "play",
                state,
            });
        }

        let mut report = FanoutReport::default();
        let rewind = session.at_end();
        if rewind {
            tracing::debug!("Play at end of media, rewinding");
            report.merge(session.fanout(|d| d.seek(0)));
            session.set_position_ms(0);
        } else if self.settings.sync.resync_audio_on_play {
            if let Ok(ms) = session.video_position() {
                report.merge(session.resync_audio(ms));
            }
        }
        report.merge(session.fanout(|d| d.play()));
        session.set_state(TransportState::Playing);
        log_failures("play", &report);

        self.timer.start();
        self.last_activity = Instant::now();
        if rewind {
            self.emit(PlayerEvent::PositionTick(0));
        }
        self.emit(PlayerEvent::PlaybackStateChanged(true));
        Ok(report)
    }

    pub fn pause(&mut self) -> CoordinatorResult<FanoutReport> {
        let session = self.session.as_mut().ok_or(CoordinatorError::NoSession)?;
        let state = session.state();
        if !state.can_pause() {
            return Err(CoordinatorError::InvalidTransition {
                command: "pause",
                state,
            });
        }

        let report = session.fanout(|d| d.pause());
        session.set_state(TransportState::Paused);
        log_failures("pause", &report);

        self.timer.stop();
        self.emit(PlayerEvent::PlaybackStateChanged(false));
        Ok(report)
    }

    /// Play when paused or loaded, pause when playing.
    pub fn toggle_play(&mut self) -> CoordinatorResult<FanoutReport> {
        if self.is_playing() {
            self.pause()
        } else {
            self.play()
        }
    }

    /// Stop every decoder and return to `Loaded` at position 0.
    pub fn stop(&mut self) -> CoordinatorResult<FanoutReport> {
        let session = self.session.as_mut().ok_or(CoordinatorError::NoSession)?;
        let state = session.state();
        if !state.can_stop() {
            return Err(CoordinatorError::InvalidTransition {
                command: "stop",
                state,
            });
        }

        let report = session.fanout(|d| d.stop());
        session.set_position_ms(0);
        session.set_state(TransportState::Loaded);
        log_failures("stop", &report);

        self.timer.stop();
        self.emit(PlayerEvent::PositionTick(0));
        if state == TransportState::Playing {
            self.emit(PlayerEvent::PlaybackStateChanged(false));
        }
        Ok(report)
    }

    /// Seek every decoder to the same absolute position.
    pub fn seek(&mut self, ms: u64) -> CoordinatorResult<FanoutReport> {
        let session = self.session.as_mut().ok_or(CoordinatorError::NoSession)?;
        let state = session.state();
        if !state.can_seek() {
            return Err(CoordinatorError::InvalidTransition {
                command: "seek",
                state,
            });
        }

        let ms = session.clamp_position(ms);
        let report = session.fanout(|d| d.seek(ms));
        session.set_position_ms(ms);
        log_failures("seek", &report);

        tracing::debug!(position_ms = ms, "Seek");
        self.emit(PlayerEvent::PositionTick(ms));
        Ok(report)
    }

    /// Set one track's gain (clamped to `[0, 1]`).
    ///
    /// Returns `false` for an index outside the session.
    pub fn set_track_gain(&mut self, index: usize, gain: f32) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        match session.set_track_gain(index, gain) {
            None => false,
            Some(Ok(())) => true,
            Some(Err(e)) => {
                tracing::warn!(track = index, "Gain not applied: {}", e);
                true
            }
        }
    }

    // ---- scrubbing ----

    pub fn start_scrub(&mut self) -> CoordinatorResult<FanoutReport> {
        let session = self.session.as_mut().ok_or(CoordinatorError::NoSession)?;
        let report = scrub::start_scrub(session, &mut self.timer)?;
        log_failures("scrub pause", &report);
        Ok(report)
    }

    pub fn preview_move(&mut self, ms: u64) -> CoordinatorResult<u64> {
        let session = self.session.as_mut().ok_or(CoordinatorError::NoSession)?;
        let ms = scrub::preview_move(session, ms)?;
        self.emit(PlayerEvent::PreviewPosition(ms));
        Ok(ms)
    }

    pub fn end_scrub(&mut self, ms: u64) -> CoordinatorResult<FanoutReport> {
        let session = self.session.as_mut().ok_or(CoordinatorError::NoSession)?;
        let report = scrub::end_scrub(session, &mut self.timer, ms)?;
        let position = session.position_ms();
        log_failures("scrub seek", &report);

        self.last_activity = Instant::now();
        self.emit(PlayerEvent::PositionTick(position));
        Ok(report)
    }

    // ---- poll timer ----

    /// Poll-timer body. Does nothing unless the transport is playing.
    pub fn tick(&mut self) {
        if !self.timer.is_running() {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.state() != TransportState::Playing {
            return;
        }
        let drift_due = self.timer.on_tick();

        log_failures("gain", &session.apply_pending_gains());

        if let Some(ms) = session.refresh_duration() {
            notify(&self.callback, PlayerEvent::DurationKnown(ms));
        }

        let position = match session.video_position() {
            Ok(ms) => session.clamp_position(ms),
            Err(e) => {
                tracing::trace!("Position unavailable: {}", e);
                return;
            }
        };
        session.set_position_ms(position);
        notify(&self.callback, PlayerEvent::PositionTick(position));

        if drift_due {
            for c in self.drift.check(session, position) {
                notify(
                    &self.callback,
                    PlayerEvent::DriftCorrected {
                        index: c.index,
                        drift_ms: c.drift_ms,
                        target_ms: c.target_ms,
                    },
                );
            }
        }

        if session.at_end() {
            tracing::info!("End of media reached");
            log_failures("pause", &session.fanout(|d| d.pause()));
            session.set_state(TransportState::Paused);
            self.timer.stop();
            notify(&self.callback, PlayerEvent::PlaybackStateChanged(false));
        }
    }

    // ---- auto-hide ----

    /// Record user activity (pointer move, key press).
    pub fn activity_ping(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Whether the shell may hide its controls: playing and idle long enough.
    pub fn should_hide_controls(&self) -> bool {
        self.is_playing()
            && self.last_activity.elapsed()
                >= Duration::from_millis(self.settings.interface.auto_hide_after_ms)
    }

    // ---- export ----

    /// Snapshot the current tracks and gains for a mix export.
    pub fn export_plan(&self, output: impl AsRef<Path>) -> CoordinatorResult<ExportPlan> {
        let session = self.session.as_ref().ok_or(CoordinatorError::NoSession)?;
        let tracks: Vec<ExportTrack> = session
            .audio_tracks()
            .iter()
            .filter_map(|track| {
                track.asset_path().map(|asset| ExportTrack {
                    index: track.index(),
                    asset: asset.to_path_buf(),
                    multiplier: self.volume.export_multiplier(track.gain()),
                })
            })
            .collect();

        ExportPlan::new(session.source().path(), tracks, output.as_ref())
            .map_err(|_| CoordinatorError::NoAudioTracks)
    }

    /// Export the current mix to `output`.
    ///
    /// Blocks until ffmpeg exits. A playing transport is paused for the
    /// duration and resumed afterwards, since nothing polls the decoders
    /// while this runs.
    pub fn export_mix(
        &mut self,
        output: impl AsRef<Path>,
        cancel: &CancelHandle,
    ) -> CoordinatorResult<()> {
        let plan = self.export_plan(output)?;
        let was_playing = self.is_playing();
        if was_playing {
            self.pause()?;
        }

        self.message(UserMessage::info(format!(
            "Exporting {} track(s) to {}",
            plan.tracks.len(),
            plan.output.display()
        )));
        let result = run_mix_export(
            &plan,
            &self.settings.tools,
            self.settings.extraction.transcode_timeout(),
            cancel,
        );
        match &result {
            Ok(()) => self.message(UserMessage::info("Export finished.")),
            Err(e) => tracing::warn!("Export failed: {}", e),
        }

        if was_playing {
            if let Err(e) = self.play() {
                tracing::warn!("Could not resume after export: {}", e);
            }
        }
        result.map_err(|e| CoordinatorError::Export(e.to_string()))
    }

    /// Cancel any load and release every decoder and asset.
    pub fn shutdown(&mut self) {
        self.cancel_pending();
        self.teardown_session();
    }
}

impl Drop for PlaybackCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{DecoderCall, SimulatedFactory};
    use crate::models::{MessageLevel, TrackRef};
    use crate::test_support::{fake_extractor, media_file, FakeProbe, FakeTranscoder};
    use parking_lot::Mutex;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct Harness {
        coordinator: PlaybackCoordinator,
        factory: SimulatedFactory,
        events: Arc<Mutex<Vec<PlayerEvent>>>,
        dir: TempDir,
    }

    impl Harness {
        fn media(&self, name: &str) -> PathBuf {
            media_file(self.dir.path(), name)
        }

        fn load(&mut self, name: &str) -> CoordinatorResult<usize> {
            let path = self.media(name);
            self.coordinator.begin_load(&path)?;
            self.coordinator
                .wait_for_load()
                .unwrap_or(Err(CoordinatorError::NoSession))
        }

        fn events(&self) -> Vec<PlayerEvent> {
            self.events.lock().clone()
        }

        fn clear_events(&self) {
            self.events.lock().clear();
        }

        fn messages(&self, level: MessageLevel) -> Vec<String> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    PlayerEvent::Message(m) if m.level == level => Some(m.text),
                    _ => None,
                })
                .collect()
        }

        fn all_tracks(&self) -> Vec<TrackRef> {
            let mut tracks = vec![TrackRef::Video];
            tracks.extend((0..self.coordinator.track_count()).map(TrackRef::Audio));
            tracks
        }
    }

    fn harness_with(
        probe: FakeProbe,
        transcoder: FakeTranscoder,
        tweak: impl FnOnce(&mut Settings),
    ) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.logging.file_logging = false;
        settings.paths.temp_root = dir.path().to_string_lossy().to_string();
        tweak(&mut settings);

        let factory = SimulatedFactory::new(None);
        let extractor = fake_extractor(dir.path(), probe, Arc::new(transcoder));
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);

        let coordinator = PlaybackCoordinator::new(settings, extractor, Arc::new(factory.clone()))
            .with_callback(Box::new(move |e: &PlayerEvent| sink.lock().push(e.clone())));

        Harness {
            coordinator,
            factory,
            events,
            dir,
        }
    }

    fn harness(audio_streams: usize) -> Harness {
        harness_with(
            FakeProbe::with_audio(audio_streams),
            FakeTranscoder::new(),
            |_| {},
        )
    }

    #[test]
    fn end_to_end_load_play_seek() {
        let mut h = harness(3);
        assert_eq!(h.load("movie.mkv").unwrap(), 3);

        let events = h.events();
        assert!(events.contains(&PlayerEvent::TrackCountChanged(3)));
        assert!(events.contains(&PlayerEvent::DurationKnown(FakeProbe::DURATION_MS)));
        assert_eq!(
            h.messages(MessageLevel::Info).last().map(String::as_str),
            Some("Loaded 3 audio track(s). Click Play.")
        );
        assert_eq!(h.coordinator.state(), TransportState::Loaded);

        let report = h.coordinator.play().unwrap();
        assert!(report.is_clean());
        assert_eq!(h.coordinator.state(), TransportState::Playing);
        for track in h.all_tracks() {
            assert!(h.factory.track(track).unwrap().is_playing(), "{track} not playing");
        }

        h.coordinator.seek(5_000).unwrap();
        for track in h.all_tracks() {
            assert_eq!(h.factory.track(track).unwrap().position(), 5_000);
        }
        assert_eq!(h.coordinator.position_ms(), 5_000);
        assert_eq!(h.coordinator.timeline_label(), "00:05 / 02:00");
    }

    #[test]
    fn fanout_starts_with_video() {
        let mut h = harness(2);
        h.load("movie.mkv").unwrap();
        h.factory.clear_journal();

        h.coordinator.play().unwrap();

        let plays: Vec<TrackRef> = h
            .factory
            .journal()
            .into_iter()
            .filter(|e| e.call == DecoderCall::Play)
            .map(|e| e.track)
            .collect();
        assert_eq!(
            plays,
            vec![TrackRef::Video, TrackRef::Audio(0), TrackRef::Audio(1)]
        );
    }

    #[test]
    fn missing_file_changes_nothing() {
        let mut h = harness(2);
        h.load("movie.mkv").unwrap();
        h.clear_events();

        let missing = h.dir.path().join("gone.mkv");
        assert_eq!(
            h.coordinator.begin_load(&missing),
            Err(CoordinatorError::LoadNotFound(missing.clone()))
        );
        assert!(!h.coordinator.is_loading());
        assert_eq!(h.coordinator.state(), TransportState::Loaded);
        assert_eq!(h.coordinator.track_count(), 2);
        assert_eq!(
            h.messages(MessageLevel::Error),
            vec![format!("File not found: {}", missing.display())]
        );
    }

    #[test]
    fn probe_failure_plays_video_only() {
        let mut h = harness_with(FakeProbe::failing(), FakeTranscoder::new(), |_| {});
        assert_eq!(h.load("broken.mkv").unwrap(), 0);

        assert!(h.events().contains(&PlayerEvent::TrackCountChanged(0)));
        assert_eq!(h.messages(MessageLevel::Warning).len(), 1);
        assert!(h
            .messages(MessageLevel::Info)
            .contains(&"No audio tracks found in the selected file.".to_string()));

        h.coordinator.play().unwrap();
        assert!(h.factory.track(TrackRef::Video).unwrap().is_playing());
    }

    #[test]
    fn partial_extraction_keeps_earlier_tracks() {
        let mut h = harness_with(FakeProbe::with_audio(4), FakeTranscoder::failing_at(2), |_| {});
        assert_eq!(h.load("movie.mkv").unwrap(), 2);

        let warnings = h.messages(MessageLevel::Warning);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("Extracted 2 of 4 audio track(s)"));
    }

    #[test]
    fn newer_load_supersedes_older() {
        let mut h = harness_with(
            FakeProbe::with_audio(5),
            FakeTranscoder::new().with_delay(Duration::from_millis(20)),
            |_| {},
        );
        let first = h.media("first.mkv");
        let second = h.media("second.mkv");

        h.coordinator.begin_load(&first).unwrap();
        h.coordinator.begin_load(&second).unwrap();
        assert_eq!(h.coordinator.wait_for_load().unwrap().unwrap(), 5);

        assert_eq!(h.coordinator.source().unwrap().path(), second.as_path());
        let counts: Vec<PlayerEvent> = h
            .events()
            .into_iter()
            .filter(|e| matches!(e, PlayerEvent::TrackCountChanged(_)))
            .collect();
        assert_eq!(counts, vec![PlayerEvent::TrackCountChanged(5)]);
    }

    #[test]
    fn reload_tears_down_previous_session() {
        let mut h = harness(2);
        h.load("first.mkv").unwrap();
        h.coordinator.play().unwrap();

        let old_video = h.factory.track(TrackRef::Video).unwrap();
        let old_assets: Vec<PathBuf> = h
            .coordinator
            .session()
            .unwrap()
            .audio_tracks()
            .iter()
            .filter_map(|a| a.asset_path().map(|p| p.to_path_buf()))
            .collect();
        assert_eq!(old_assets.len(), 2);
        h.clear_events();

        let second = h.media("second.mkv");
        h.coordinator.begin_load(&second).unwrap();

        assert!(old_video.is_terminated());
        assert!(old_assets.iter().all(|p| !p.exists()));
        assert_eq!(h.coordinator.state(), TransportState::Idle);
        assert!(h.events().contains(&PlayerEvent::PlaybackStateChanged(false)));

        h.coordinator.wait_for_load().unwrap().unwrap();
        assert_eq!(h.coordinator.state(), TransportState::Loaded);
    }

    #[test]
    fn commands_need_a_valid_state() {
        let mut h = harness(1);
        assert_eq!(h.coordinator.play().unwrap_err(), CoordinatorError::NoSession);
        assert_eq!(h.coordinator.seek(10).unwrap_err(), CoordinatorError::NoSession);

        h.load("movie.mkv").unwrap();
        assert_eq!(
            h.coordinator.pause().unwrap_err(),
            CoordinatorError::InvalidTransition {
                command: "pause",
                state: TransportState::Loaded
            }
        );
        assert!(h.coordinator.start_scrub().is_err());

        h.coordinator.play().unwrap();
        assert!(matches!(
            h.coordinator.play(),
            Err(CoordinatorError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn stop_returns_to_loaded_at_zero() {
        let mut h = harness(2);
        h.load("movie.mkv").unwrap();
        h.coordinator.play().unwrap();
        h.coordinator.seek(30_000).unwrap();
        h.clear_events();

        h.coordinator.stop().unwrap();

        assert_eq!(h.coordinator.state(), TransportState::Loaded);
        assert_eq!(h.coordinator.position_ms(), 0);
        assert_eq!(
            h.events(),
            vec![
                PlayerEvent::PositionTick(0),
                PlayerEvent::PlaybackStateChanged(false)
            ]
        );
        for track in h.all_tracks() {
            let sim = h.factory.track(track).unwrap();
            assert!(!sim.is_playing());
            assert_eq!(sim.position(), 0);
        }

        h.coordinator.play().unwrap();
        assert!(h.coordinator.is_playing());
    }

    #[test]
    fn toggle_alternates() {
        let mut h = harness(1);
        h.load("movie.mkv").unwrap();
        h.coordinator.toggle_play().unwrap();
        assert_eq!(h.coordinator.state(), TransportState::Playing);
        h.coordinator.toggle_play().unwrap();
        assert_eq!(h.coordinator.state(), TransportState::Paused);
    }

    #[test]
    fn seek_clamps_to_duration() {
        let mut h = harness(1);
        h.load("movie.mkv").unwrap();
        h.coordinator.seek(500_000).unwrap();
        assert_eq!(h.coordinator.position_ms(), FakeProbe::DURATION_MS);
        assert_eq!(
            h.factory.track(TrackRef::Audio(0)).unwrap().position(),
            FakeProbe::DURATION_MS
        );
    }

    #[test]
    fn tick_reports_position_and_corrects_drift() {
        let mut h = harness(2);
        h.load("movie.mkv").unwrap();
        h.coordinator.play().unwrap();

        h.factory.advance(1_000);
        h.factory.track(TrackRef::Audio(0)).unwrap().set_position(1_500);
        h.clear_events();

        h.coordinator.tick();

        assert_eq!(
            h.events(),
            vec![
                PlayerEvent::PositionTick(1_000),
                PlayerEvent::DriftCorrected {
                    index: 0,
                    drift_ms: 500,
                    target_ms: 1_000
                }
            ]
        );
        assert_eq!(h.factory.track(TrackRef::Audio(0)).unwrap().position(), 1_000);
        assert_eq!(h.coordinator.position_ms(), 1_000);
    }

    #[test]
    fn tick_is_idle_unless_playing() {
        let mut h = harness(1);
        h.load("movie.mkv").unwrap();
        h.clear_events();

        h.coordinator.tick();
        h.coordinator.play().unwrap();
        h.coordinator.pause().unwrap();
        h.clear_events();
        h.coordinator.tick();

        assert!(h.events().is_empty());
    }

    #[test]
    fn end_of_media_pauses() {
        let mut h = harness(1);
        h.load("movie.mkv").unwrap();
        h.coordinator.play().unwrap();
        h.factory
            .track(TrackRef::Video)
            .unwrap()
            .set_position(FakeProbe::DURATION_MS);
        h.clear_events();

        h.coordinator.tick();

        assert_eq!(h.coordinator.state(), TransportState::Paused);
        assert_eq!(
            h.events().last(),
            Some(&PlayerEvent::PlaybackStateChanged(false))
        );
        assert!(!h.factory.track(TrackRef::Audio(0)).unwrap().is_playing());
    }

    #[test]
    fn play_after_end_of_media_rewinds() {
        let mut h = harness(1);
        h.load("movie.mkv").unwrap();
        h.coordinator.play().unwrap();
        h.factory
            .track(TrackRef::Video)
            .unwrap()
            .set_position(FakeProbe::DURATION_MS);
        h.coordinator.tick();
        assert_eq!(h.coordinator.state(), TransportState::Paused);
        h.clear_events();

        h.coordinator.play().unwrap();
        h.coordinator.tick();

        assert_eq!(h.coordinator.state(), TransportState::Playing);
        assert_eq!(h.coordinator.position_ms(), 0);
        for track in h.all_tracks() {
            assert_eq!(h.factory.track(track).unwrap().position(), 0);
        }
        assert_eq!(
            h.events(),
            vec![
                PlayerEvent::PositionTick(0),
                PlayerEvent::PlaybackStateChanged(true),
                PlayerEvent::PositionTick(0)
            ]
        );
    }

    #[test]
    fn decoder_end_flag_pauses_short_of_duration() {
        let mut h = harness(1);
        h.load("movie.mkv").unwrap();
        h.coordinator.play().unwrap();
        let video = h.factory.track(TrackRef::Video).unwrap();
        video.set_position(FakeProbe::DURATION_MS - 40);
        video.set_reached_end(true);

        h.coordinator.tick();

        assert_eq!(h.coordinator.state(), TransportState::Paused);
        assert_eq!(h.coordinator.position_ms(), FakeProbe::DURATION_MS - 40);

        h.coordinator.play().unwrap();
        assert_eq!(video.position(), 0);
        assert_eq!(h.coordinator.state(), TransportState::Playing);
    }

    #[test]
    fn slider_writes_reach_decoders_on_tick() {
        let mut h = harness(2);
        h.load("movie.mkv").unwrap();
        let controls = h.coordinator.gain_controls();
        assert_eq!(controls.len(), 2);

        h.coordinator.play().unwrap();
        assert!(controls.set(1, 0.9));
        assert!(!controls.set(2, 0.9));
        h.coordinator.tick();
        assert_eq!(h.factory.track(TrackRef::Audio(1)).unwrap().volume(), 0.9);

        assert!(h.coordinator.set_track_gain(0, 1.7));
        assert_eq!(h.factory.track(TrackRef::Audio(0)).unwrap().volume(), 1.0);
        assert!(!h.coordinator.set_track_gain(9, 0.2));
    }

    #[test]
    fn remembered_volumes_seed_gains() {
        let mut h = harness_with(FakeProbe::with_audio(2), FakeTranscoder::new(), |s| {
            s.volume.remember_volumes = true;
            s.volume.remember(1, 200);
        });
        h.load("movie.mkv").unwrap();

        assert_eq!(h.factory.track(TrackRef::Audio(0)).unwrap().volume(), 0.5);
        assert_eq!(h.factory.track(TrackRef::Audio(1)).unwrap().volume(), 1.0);
    }

    #[test]
    fn scrub_cycle_through_coordinator() {
        let mut h = harness(2);
        h.load("movie.mkv").unwrap();
        h.coordinator.play().unwrap();
        h.factory.clear_journal();
        h.clear_events();

        h.coordinator.start_scrub().unwrap();
        assert_eq!(h.coordinator.preview_move(10_000).unwrap(), 10_000);
        assert!(h.factory.seeks().is_empty());
        h.coordinator.end_scrub(10_000).unwrap();

        assert_eq!(h.coordinator.state(), TransportState::Playing);
        assert_eq!(h.factory.seeks().len(), 3);
        assert_eq!(
            h.events(),
            vec![
                PlayerEvent::PreviewPosition(10_000),
                PlayerEvent::PositionTick(10_000)
            ]
        );
    }

    #[test]
    fn controls_hide_only_while_playing() {
        let mut h = harness_with(FakeProbe::with_audio(1), FakeTranscoder::new(), |s| {
            s.interface.auto_hide_after_ms = 0;
        });
        h.load("movie.mkv").unwrap();
        assert!(!h.coordinator.should_hide_controls());

        h.coordinator.play().unwrap();
        assert!(h.coordinator.should_hide_controls());

        h.coordinator.pause().unwrap();
        assert!(!h.coordinator.should_hide_controls());
    }

    #[test]
    fn export_plan_uses_current_gains() {
        let mut h = harness(2);
        assert_eq!(
            h.coordinator.export_plan("/out/mix.mkv").unwrap_err(),
            CoordinatorError::NoSession
        );

        h.load("movie.mkv").unwrap();
        h.coordinator.set_track_gain(1, 1.0);
        let plan = h.coordinator.export_plan("/out/mix.mkv").unwrap();

        assert_eq!(plan.tracks.len(), 2);
        assert!((plan.tracks[0].multiplier - 1.0).abs() < 1e-6);
        assert!((plan.tracks[1].multiplier - 2.0).abs() < 1e-6);
        assert_eq!(plan.output, PathBuf::from("/out/mix.mkv"));
    }

    #[test]
    fn export_needs_audio_tracks() {
        let mut h = harness(0);
        h.load("movie.mkv").unwrap();
        assert_eq!(
            h.coordinator.export_plan("/out/mix.mkv").unwrap_err(),
            CoordinatorError::NoAudioTracks
        );
    }

    fn harness_without_ffmpeg() -> Harness {
        harness_with(FakeProbe::with_audio(1), FakeTranscoder::new(), |s| {
            s.tools.ffmpeg = "mtp-no-such-ffmpeg".to_string();
        })
    }

    #[test]
    fn export_pauses_and_resumes_playback() {
        let mut h = harness_without_ffmpeg();
        h.load("movie.mkv").unwrap();
        h.coordinator.play().unwrap();
        h.factory.clear_journal();
        h.clear_events();

        let output = h.dir.path().join("mix.mkv");
        let result = h.coordinator.export_mix(&output, &CancelHandle::new());

        assert!(matches!(result, Err(CoordinatorError::Export(_))));
        assert_eq!(h.coordinator.state(), TransportState::Playing);
        let video_calls: Vec<DecoderCall> = h
            .factory
            .calls_for(TrackRef::Video)
            .into_iter()
            .filter(|c| matches!(c, DecoderCall::Pause | DecoderCall::Play))
            .collect();
        assert_eq!(video_calls, vec![DecoderCall::Pause, DecoderCall::Play]);
        assert_eq!(
            h.events().first(),
            Some(&PlayerEvent::PlaybackStateChanged(false))
        );
        assert_eq!(
            h.events().last(),
            Some(&PlayerEvent::PlaybackStateChanged(true))
        );
    }

    #[test]
    fn export_leaves_paused_transport_paused() {
        let mut h = harness_without_ffmpeg();
        h.load("movie.mkv").unwrap();
        h.coordinator.play().unwrap();
        h.coordinator.pause().unwrap();
        h.factory.clear_journal();

        let output = h.dir.path().join("mix.mkv");
        assert!(h
            .coordinator
            .export_mix(&output, &CancelHandle::new())
            .is_err());

        assert_eq!(h.coordinator.state(), TransportState::Paused);
        assert!(!h.factory.calls_for(TrackRef::Video).contains(&DecoderCall::Play));
    }

    #[test]
    fn shutdown_releases_everything() {
        let mut h = harness(2);
        h.load("movie.mkv").unwrap();
        h.coordinator.play().unwrap();

        h.coordinator.shutdown();

        assert_eq!(h.coordinator.state(), TransportState::Idle);
        assert!(h.factory.track(TrackRef::Audio(1)).unwrap().is_terminated());
        assert!(h.events().contains(&PlayerEvent::PlaybackStateChanged(false)));
    }

    #[test]
    fn load_log_written_when_enabled() {
        let logs = tempfile::tempdir().unwrap();
        let logs_path = logs.path().to_string_lossy().to_string();
        let mut h = harness_with(FakeProbe::with_audio(1), FakeTranscoder::new(), move |s| {
            s.logging.file_logging = true;
            s.paths.logs_folder = logs_path;
        });
        h.load("movie.mkv").unwrap();

        assert!(logs.path().join("movie.log").exists());
    }
}
