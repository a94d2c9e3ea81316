//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Each section can be updated independently for atomic section-level updates.
//! Components receive the sections they need by value; nothing reads
//! settings from global state.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::logging::LogLevel;

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Path-related settings.
    #[serde(default)]
    pub paths: PathSettings,

    /// External tool locations.
    #[serde(default)]
    pub tools: ToolSettings,

    /// Audio extraction parameters.
    #[serde(default)]
    pub extraction: ExtractionSettings,

    /// Transport sync policy.
    #[serde(default)]
    pub sync: SyncSettings,

    /// Volume slider mapping and remembered levels.
    #[serde(default)]
    pub volume: VolumeSettings,

    /// Shell-facing hooks.
    #[serde(default)]
    pub interface: InterfaceSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Path configuration for temp assets and logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSettings {
    /// Root folder for extracted audio.
    #[serde(default = "default_temp_root")]
    pub temp_root: String,

    /// Folder for log files.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,

    /// Last media file that was loaded.
    #[serde(default)]
    pub last_media_path: String,
}

fn default_temp_root() -> String {
    std::env::temp_dir()
        .join("multitrack-player")
        .to_string_lossy()
        .to_string()
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            temp_root: default_temp_root(),
            logs_folder: default_logs_folder(),
            last_media_path: String::new(),
        }
    }
}

/// Locations of the external tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSettings {
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,

    #[serde(default = "default_ffprobe")]
    pub ffprobe: String,

    #[serde(default = "default_mpv")]
    pub mpv: String,
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

fn default_mpv() -> String {
    "mpv".to_string()
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
            mpv: default_mpv(),
        }
    }
}

/// Default gain multiplier applied while extracting each track.
///
/// Commentary and dialogue tracks are often mastered quietly; the extract
/// is boosted so that slider reference (see [`VolumeSettings`]) sits at a
/// comfortable level.
pub const DEFAULT_GAIN_BOOST: f64 = 4.0;

/// Audio extraction parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionSettings {
    /// Linear gain multiplier applied by the transcoder.
    #[serde(default = "default_gain_boost")]
    pub gain_boost: f64,

    /// Output channel count.
    #[serde(default = "default_channels")]
    pub channels: u8,

    /// Output sample rate.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Upper bound on extracted tracks (unset = all).
    #[serde(default)]
    pub max_tracks: Option<usize>,

    /// Probe timeout in seconds.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Per-track transcode timeout in seconds.
    #[serde(default = "default_transcode_timeout")]
    pub transcode_timeout_secs: u64,
}

fn default_gain_boost() -> f64 {
    DEFAULT_GAIN_BOOST
}

fn default_channels() -> u8 {
    2
}

fn default_sample_rate() -> u32 {
    44_100
}

fn default_probe_timeout() -> u64 {
    15
}

fn default_transcode_timeout() -> u64 {
    600
}

impl ExtractionSettings {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn transcode_timeout(&self) -> Duration {
        Duration::from_secs(self.transcode_timeout_secs)
    }
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            gain_boost: DEFAULT_GAIN_BOOST,
            channels: default_channels(),
            sample_rate: default_sample_rate(),
            max_tracks: None,
            probe_timeout_secs: default_probe_timeout(),
            transcode_timeout_secs: default_transcode_timeout(),
        }
    }
}

/// Transport sync policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Poll timer interval.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    /// Drift beyond this triggers a per-track re-sync.
    #[serde(default = "default_drift_tolerance")]
    pub drift_tolerance_ms: u64,

    /// Run the drift check every N poll ticks.
    #[serde(default = "default_drift_every_ticks")]
    pub drift_every_ticks: u32,

    /// Align audio to the video position whenever playback resumes.
    #[serde(default = "default_true")]
    pub resync_audio_on_play: bool,
}

fn default_tick_interval() -> u64 {
    50
}

fn default_drift_tolerance() -> u64 {
    200
}

fn default_drift_every_ticks() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

impl SyncSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
            drift_tolerance_ms: default_drift_tolerance(),
            drift_every_ticks: default_drift_every_ticks(),
            resync_audio_on_play: true,
        }
    }
}

/// Volume slider mapping and remembered per-track levels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSettings {
    /// Top of the slider range.
    #[serde(default = "default_slider_max")]
    pub slider_max: u32,

    /// Slider value that reproduces baseline loudness.
    #[serde(default = "default_slider_reference")]
    pub slider_reference: u32,

    /// Persist slider values between runs.
    #[serde(default)]
    pub remember_volumes: bool,

    /// Track index (as string key) -> slider value.
    #[serde(default)]
    pub saved_volumes: BTreeMap<String, u32>,
}

fn default_slider_max() -> u32 {
    200
}

fn default_slider_reference() -> u32 {
    100
}

impl VolumeSettings {
    /// Remembered slider values keyed by track index.
    ///
    /// Empty unless `remember_volumes` is enabled. Keys that aren't plain
    /// indices are ignored.
    pub fn remembered(&self) -> BTreeMap<usize, u32> {
        if !self.remember_volumes {
            return BTreeMap::new();
        }
        self.saved_volumes
            .iter()
            .filter_map(|(k, v)| k.parse::<usize>().ok().map(|i| (i, *v)))
            .collect()
    }

    /// Record a slider value for a track.
    pub fn remember(&mut self, index: usize, slider: u32) {
        self.saved_volumes.insert(index.to_string(), slider);
    }
}

impl Default for VolumeSettings {
    fn default() -> Self {
        Self {
            slider_max: default_slider_max(),
            slider_reference: default_slider_reference(),
            remember_volumes: false,
            saved_volumes: BTreeMap::new(),
        }
    }
}

/// Shell-facing hooks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceSettings {
    /// Idle time while playing after which the shell may hide its controls.
    #[serde(default = "default_auto_hide")]
    pub auto_hide_after_ms: u64,
}

fn default_auto_hide() -> u64 {
    3000
}

impl Default for InterfaceSettings {
    fn default() -> Self {
        Self {
            auto_hide_after_ms: default_auto_hide(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Application log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Keep tool output in the tail buffer only.
    #[serde(default = "default_true")]
    pub compact: bool,

    /// Number of tool output lines kept for failure diagnosis.
    #[serde(default = "default_error_tail")]
    pub error_tail: u32,

    /// Write per-load log files and a rolling application log.
    #[serde(default = "default_true")]
    pub file_logging: bool,
}

fn default_error_tail() -> u32 {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            compact: true,
            error_tail: default_error_tail(),
            file_logging: true,
        }
    }
}

impl PathSettings {
    pub fn temp_root_path(&self) -> PathBuf {
        PathBuf::from(&self.temp_root)
    }
}

/// Names of config sections for targeted updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSection {
    Paths,
    Tools,
    Extraction,
    Sync,
    Volume,
    Interface,
    Logging,
}

impl ConfigSection {
    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "paths",
            ConfigSection::Tools => "tools",
            ConfigSection::Extraction => "extraction",
            ConfigSection::Sync => "sync",
            ConfigSection::Volume => "volume",
            ConfigSection::Interface => "interface",
            ConfigSection::Logging => "logging",
        }
    }

    /// All sections in file order.
    pub fn all() -> &'static [ConfigSection] {
        &[
            ConfigSection::Paths,
            ConfigSection::Tools,
            ConfigSection::Extraction,
            ConfigSection::Sync,
            ConfigSection::Volume,
            ConfigSection::Interface,
            ConfigSection::Logging,
        ]
    }
}
