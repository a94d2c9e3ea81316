//! In-memory decoder engine.
//!
//! Keeps a transport clock per track and records every command in a
//! journal shared by all decoders of one factory. Used by the test suite
//! and by the CLI's `--simulate` mode, where the journal is capped.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use super::engine::{
    DecoderCommand, DecoderCommandError, DecoderEngine, DecoderFactory, DecoderResult,
};
use crate::models::TrackRef;

/// A command as received by a simulated decoder.
#[derive(Debug, Clone, PartialEq)]
pub enum DecoderCall {
    Open(PathBuf),
    Play,
    Pause,
    Stop,
    Seek(u64),
    SetVolume(f32),
    Mute,
    Terminate,
}

impl DecoderCall {
    fn command(&self) -> Option<DecoderCommand> {
        match self {
            DecoderCall::Open(_) => Some(DecoderCommand::Open),
            DecoderCall::Play => Some(DecoderCommand::Play),
            DecoderCall::Pause => Some(DecoderCommand::Pause),
            DecoderCall::Stop => Some(DecoderCommand::Stop),
            DecoderCall::Seek(_) => Some(DecoderCommand::Seek),
            DecoderCall::SetVolume(_) => Some(DecoderCommand::SetVolume),
            DecoderCall::Mute => Some(DecoderCommand::Mute),
            DecoderCall::Terminate => None,
        }
    }
}

/// One journal line: which decoder got which call.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub track: TrackRef,
    pub call: DecoderCall,
}

/// How simulated clocks advance while playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimClock {
    /// Only [`SimulatedFactory::advance`] moves the clock.
    Manual,
    /// Playing decoders follow the wall clock.
    Realtime,
}

#[derive(Debug)]
struct SimState {
    clock: SimClock,
    opened: Option<PathBuf>,
    playing: bool,
    base_ms: u64,
    anchor: Option<Instant>,
    duration_ms: Option<u64>,
    volume: f32,
    muted: bool,
    terminated: bool,
    position_unreadable: bool,
    end_reached: bool,
}

impl SimState {
    fn new(clock: SimClock, duration_ms: Option<u64>) -> Self {
        Self {
            clock,
            opened: None,
            playing: false,
            base_ms: 0,
            anchor: None,
            duration_ms,
            volume: 1.0,
            muted: false,
            terminated: false,
            position_unreadable: false,
            end_reached: false,
        }
    }

    fn clamp(&self, ms: u64) -> u64 {
        match self.duration_ms {
            Some(d) => ms.min(d),
            None => ms,
        }
    }

    fn position(&self) -> u64 {
        let mut pos = self.base_ms;
        if self.playing {
            if let Some(anchor) = self.anchor {
                pos += anchor.elapsed().as_millis() as u64;
            }
        }
        self.clamp(pos)
    }

    /// Fold elapsed wall time into `base_ms`.
    fn settle(&mut self) {
        self.base_ms = self.position();
        self.anchor = match (self.playing, self.clock) {
            (true, SimClock::Realtime) => Some(Instant::now()),
            _ => None,
        };
    }

    fn set_playing(&mut self, playing: bool) {
        self.settle();
        self.playing = playing;
        self.settle();
    }
}

/// Journal length kept by realtime factories.
pub const REALTIME_JOURNAL_LIMIT: usize = 1024;

#[derive(Default)]
struct Shared {
    journal: Mutex<VecDeque<JournalEntry>>,
    /// Oldest entries are dropped beyond this length.
    journal_limit: Option<usize>,
    failures: Mutex<HashSet<(TrackRef, DecoderCommand)>>,
    failed_creates: Mutex<HashSet<TrackRef>>,
    tracks: Mutex<HashMap<TrackRef, Arc<Mutex<SimState>>>>,
}

impl Shared {
    fn record(&self, track: TrackRef, call: DecoderCall) {
        let mut journal = self.journal.lock();
        journal.push_back(JournalEntry { track, call });
        if let Some(limit) = self.journal_limit {
            while journal.len() > limit {
                journal.pop_front();
            }
        }
    }
}

/// Factory for [`SimulatedDecoder`]s sharing one journal.
#[derive(Clone)]
pub struct SimulatedFactory {
    shared: Arc<Shared>,
    clock: SimClock,
    duration_ms: Option<u64>,
}

impl SimulatedFactory {
    fn with_clock(
        clock: SimClock,
        duration_ms: Option<u64>,
        journal_limit: Option<usize>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                journal_limit,
                ..Shared::default()
            }),
            clock,
            duration_ms,
        }
    }

    /// Factory with a manual clock; every track reports `duration_ms`.
    pub fn new(duration_ms: Option<u64>) -> Self {
        Self::with_clock(SimClock::Manual, duration_ms, None)
    }

    /// Factory whose playing decoders follow the wall clock. Keeps only
    /// the last [`REALTIME_JOURNAL_LIMIT`] journal entries.
    pub fn realtime(duration_ms: Option<u64>) -> Self {
        Self::with_clock(
            SimClock::Realtime,
            duration_ms,
            Some(REALTIME_JOURNAL_LIMIT),
        )
    }

    /// Make `command` fail on `track` (now and for decoders created later).
    pub fn fail_on(&self, track: TrackRef, command: DecoderCommand) {
        self.shared.failures.lock().insert((track, command));
    }

    pub fn clear_failures(&self) {
        self.shared.failures.lock().clear();
        self.shared.failed_creates.lock().clear();
    }

    /// Make `create(track)` fail.
    pub fn fail_create(&self, track: TrackRef) {
        self.shared.failed_creates.lock().insert(track);
    }

    /// State view for the most recently created decoder of `track`.
    pub fn track(&self, track: TrackRef) -> Option<SimulatedTrack> {
        self.shared
            .tracks
            .lock()
            .get(&track)
            .map(|state| SimulatedTrack {
                state: Arc::clone(state),
            })
    }

    pub fn journal(&self) -> Vec<JournalEntry> {
        self.shared.journal.lock().iter().cloned().collect()
    }

    pub fn clear_journal(&self) {
        self.shared.journal.lock().clear();
    }

    /// Calls received by `track`, in order.
    pub fn calls_for(&self, track: TrackRef) -> Vec<DecoderCall> {
        self.shared
            .journal
            .lock()
            .iter()
            .filter(|e| e.track == track)
            .map(|e| e.call.clone())
            .collect()
    }

    /// Every seek in the journal as `(track, ms)`.
    pub fn seeks(&self) -> Vec<(TrackRef, u64)> {
        self.shared
            .journal
            .lock()
            .iter()
            .filter_map(|e| match e.call {
                DecoderCall::Seek(ms) => Some((e.track, ms)),
                _ => None,
            })
            .collect()
    }

    /// Advance every playing manual-clock decoder by `ms`.
    pub fn advance(&self, ms: u64) {
        for state in self.shared.tracks.lock().values() {
            let mut state = state.lock();
            if state.playing && !state.terminated {
                state.base_ms = state.clamp(state.base_ms + ms);
            }
        }
    }
}

impl DecoderFactory for SimulatedFactory {
    fn create(&self, role: TrackRef) -> DecoderResult<Box<dyn DecoderEngine>> {
        if self.shared.failed_creates.lock().contains(&role) {
            return Err(DecoderCommandError::Spawn {
                role,
                message: "injected failure".to_string(),
            });
        }

        let state = Arc::new(Mutex::new(SimState::new(self.clock, self.duration_ms)));
        self.shared.tracks.lock().insert(role, Arc::clone(&state));

        Ok(Box::new(SimulatedDecoder {
            role,
            state,
            shared: Arc::clone(&self.shared),
        }))
    }
}

/// Test-side view of one simulated decoder.
#[derive(Clone)]
pub struct SimulatedTrack {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedTrack {
    pub fn position(&self) -> u64 {
        self.state.lock().position()
    }

    /// Force the clock, e.g. to create drift.
    pub fn set_position(&self, ms: u64) {
        let mut state = self.state.lock();
        state.base_ms = state.clamp(ms);
        state.anchor = match (state.playing, state.clock) {
            (true, SimClock::Realtime) => Some(Instant::now()),
            _ => None,
        };
    }

    pub fn set_duration(&self, duration_ms: Option<u64>) {
        self.state.lock().duration_ms = duration_ms;
    }

    /// Report end of media until the next open, seek or stop.
    pub fn set_reached_end(&self, reached: bool) {
        self.state.lock().end_reached = reached;
    }

    /// Make position reads fail without failing any command.
    pub fn set_position_unreadable(&self, unreadable: bool) {
        self.state.lock().position_unreadable = unreadable;
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    pub fn volume(&self) -> f32 {
        self.state.lock().volume
    }

    pub fn is_muted(&self) -> bool {
        self.state.lock().muted
    }

    pub fn is_terminated(&self) -> bool {
        self.state.lock().terminated
    }

    pub fn opened_path(&self) -> Option<PathBuf> {
        self.state.lock().opened.clone()
    }
}

/// Decoder engine backed by a [`SimState`].
pub struct SimulatedDecoder {
    role: TrackRef,
    state: Arc<Mutex<SimState>>,
    shared: Arc<Shared>,
}

impl SimulatedDecoder {
    /// Journal the call, then check termination and injected failures.
    fn accept(&self, call: DecoderCall) -> DecoderResult<()> {
        let command = call.command();
        self.shared.record(self.role, call);

        if self.state.lock().terminated {
            return Err(DecoderCommandError::Terminated);
        }
        if let Some(command) = command {
            if self.shared.failures.lock().contains(&(self.role, command)) {
                return Err(DecoderCommandError::Command {
                    command,
                    message: "injected failure".to_string(),
                });
            }
        }
        Ok(())
    }

    fn read<T>(
        &self,
        command: DecoderCommand,
        f: impl FnOnce(&SimState) -> T,
    ) -> DecoderResult<T> {
        let state = self.state.lock();
        if state.terminated {
            return Err(DecoderCommandError::Terminated);
        }
        if self.shared.failures.lock().contains(&(self.role, command)) {
            return Err(DecoderCommandError::Command {
                command,
                message: "injected failure".to_string(),
            });
        }
        if state.opened.is_none() {
            return Err(DecoderCommandError::Unavailable(command));
        }
        Ok(f(&state))
    }
}

impl DecoderEngine for SimulatedDecoder {
    fn open(&mut self, asset: &Path) -> DecoderResult<()> {
        self.accept(DecoderCall::Open(asset.to_path_buf()))?;
        let mut state = self.state.lock();
        state.opened = Some(asset.to_path_buf());
        state.playing = false;
        state.base_ms = 0;
        state.anchor = None;
        state.end_reached = false;
        Ok(())
    }

    fn play(&mut self) -> DecoderResult<()> {
        self.accept(DecoderCall::Play)?;
        self.state.lock().set_playing(true);
        Ok(())
    }

    fn pause(&mut self) -> DecoderResult<()> {
        self.accept(DecoderCall::Pause)?;
        self.state.lock().set_playing(false);
        Ok(())
    }

    fn stop(&mut self) -> DecoderResult<()> {
        self.accept(DecoderCall::Stop)?;
        let mut state = self.state.lock();
        state.playing = false;
        state.base_ms = 0;
        state.anchor = None;
        state.end_reached = false;
        Ok(())
    }

    fn seek(&mut self, ms: u64) -> DecoderResult<()> {
        self.accept(DecoderCall::Seek(ms))?;
        let mut state = self.state.lock();
        state.base_ms = state.clamp(ms);
        state.anchor = None;
        state.end_reached = false;
        state.settle();
        Ok(())
    }

    fn position_ms(&mut self) -> DecoderResult<u64> {
        let unreadable = self.state.lock().position_unreadable;
        if unreadable {
            return Err(DecoderCommandError::Unavailable(DecoderCommand::Position));
        }
        self.read(DecoderCommand::Position, |s| s.position())
    }

    fn duration_ms(&mut self) -> DecoderResult<Option<u64>> {
        self.read(DecoderCommand::Duration, |s| s.duration_ms)
    }

    fn set_volume(&mut self, gain: f32) -> DecoderResult<()> {
        self.accept(DecoderCall::SetVolume(gain))?;
        self.state.lock().volume = gain;
        Ok(())
    }

    fn mute(&mut self) -> DecoderResult<()> {
        self.accept(DecoderCall::Mute)?;
        self.state.lock().muted = true;
        Ok(())
    }

    fn is_playing(&mut self) -> DecoderResult<bool> {
        self.read(DecoderCommand::Query, |s| s.playing)
    }

    fn reached_end(&mut self) -> DecoderResult<bool> {
        self.read(DecoderCommand::Query, |s| s.end_reached)
    }

    fn terminate(&mut self) {
        let mut state = self.state.lock();
        if state.terminated {
            return;
        }
        state.terminated = true;
        state.playing = false;
        drop(state);
        self.shared.record(self.role, DecoderCall::Terminate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn opened(factory: &SimulatedFactory, role: TrackRef) -> Box<dyn DecoderEngine> {
        let mut decoder = factory.create(role).unwrap();
        decoder.open(Path::new("/media/a.wav")).unwrap();
        decoder
    }

    #[test]
    fn manual_clock_moves_only_when_advanced() {
        let factory = SimulatedFactory::new(Some(10_000));
        let mut decoder = opened(&factory, TrackRef::Audio(0));

        decoder.play().unwrap();
        assert_eq!(decoder.position_ms().unwrap(), 0);
        factory.advance(1_500);
        assert_eq!(decoder.position_ms().unwrap(), 1_500);

        decoder.pause().unwrap();
        factory.advance(1_000);
        assert_eq!(decoder.position_ms().unwrap(), 1_500);
    }

    #[test]
    fn seek_and_stop() {
        let factory = SimulatedFactory::new(Some(10_000));
        let mut decoder = opened(&factory, TrackRef::Video);

        decoder.seek(4_000).unwrap();
        assert_eq!(decoder.position_ms().unwrap(), 4_000);
        decoder.seek(50_000).unwrap();
        assert_eq!(decoder.position_ms().unwrap(), 10_000);

        decoder.play().unwrap();
        decoder.stop().unwrap();
        assert_eq!(decoder.position_ms().unwrap(), 0);
        assert!(!decoder.is_playing().unwrap());
    }

    #[test]
    fn realtime_clock_follows_wall_time() {
        let factory = SimulatedFactory::realtime(None);
        let mut decoder = opened(&factory, TrackRef::Audio(0));

        decoder.play().unwrap();
        thread::sleep(Duration::from_millis(60));
        assert!(decoder.position_ms().unwrap() >= 50);
    }

    #[test]
    fn injected_failure_is_reported_and_journaled() {
        let factory = SimulatedFactory::new(None);
        factory.fail_on(TrackRef::Audio(1), DecoderCommand::Seek);
        let mut decoder = opened(&factory, TrackRef::Audio(1));

        assert!(matches!(
            decoder.seek(100),
            Err(DecoderCommandError::Command {
                command: DecoderCommand::Seek,
                ..
            })
        ));
        assert_eq!(factory.seeks(), vec![(TrackRef::Audio(1), 100)]);
    }

    #[test]
    fn reads_before_open_are_unavailable() {
        let factory = SimulatedFactory::new(Some(1_000));
        let mut decoder = factory.create(TrackRef::Video).unwrap();
        assert!(matches!(
            decoder.duration_ms(),
            Err(DecoderCommandError::Unavailable(DecoderCommand::Duration))
        ));
    }

    #[test]
    fn terminate_is_idempotent() {
        let factory = SimulatedFactory::new(None);
        let mut decoder = opened(&factory, TrackRef::Audio(0));

        decoder.terminate();
        decoder.terminate();
        assert!(matches!(decoder.play(), Err(DecoderCommandError::Terminated)));
        let terminations = factory
            .calls_for(TrackRef::Audio(0))
            .into_iter()
            .filter(|c| *c == DecoderCall::Terminate)
            .count();
        assert_eq!(terminations, 1);
    }

    #[test]
    fn realtime_journal_is_capped() {
        let factory = SimulatedFactory::realtime(None);
        let mut decoder = opened(&factory, TrackRef::Audio(0));

        for ms in 0..(REALTIME_JOURNAL_LIMIT as u64 + 10) {
            decoder.seek(ms).unwrap();
        }

        let journal = factory.journal();
        assert_eq!(journal.len(), REALTIME_JOURNAL_LIMIT);
        assert_eq!(
            journal.last().map(|e| &e.call),
            Some(&DecoderCall::Seek(REALTIME_JOURNAL_LIMIT as u64 + 9))
        );
        assert!(!journal.iter().any(|e| matches!(e.call, DecoderCall::Open(_))));
    }

    #[test]
    fn manual_journal_keeps_everything() {
        let factory = SimulatedFactory::new(None);
        let mut decoder = opened(&factory, TrackRef::Audio(0));
        for ms in 0..(REALTIME_JOURNAL_LIMIT as u64 + 10) {
            decoder.seek(ms).unwrap();
        }
        assert_eq!(factory.journal().len(), REALTIME_JOURNAL_LIMIT + 11);
    }

    #[test]
    fn seek_clears_end_of_media() {
        let factory = SimulatedFactory::new(Some(10_000));
        let mut decoder = opened(&factory, TrackRef::Video);

        factory.track(TrackRef::Video).unwrap().set_reached_end(true);
        assert!(decoder.reached_end().unwrap());
        decoder.seek(0).unwrap();
        assert!(!decoder.reached_end().unwrap());
    }

    #[test]
    fn failed_create() {
        let factory = SimulatedFactory::new(None);
        factory.fail_create(TrackRef::Audio(2));
        assert!(factory.create(TrackRef::Audio(2)).is_err());
        assert!(factory.create(TrackRef::Audio(1)).is_ok());
    }
}
