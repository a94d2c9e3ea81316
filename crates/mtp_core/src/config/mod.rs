//! Configuration management for Multitrack Player.
//!
//! This module provides:
//! - TOML-based configuration with logical sections
//! - Atomic file writes (write to temp, then rename)
//! - Section-level updates (only changed section is modified)
//! - Defaults for every missing key on load
//!
//! Settings are read once at startup and handed to the core as an
//! immutable value.
//!
//! # Example
//!
//! ```no_run
//! use mtp_core::config::{ConfigManager, ConfigSection};
//!
//! let mut config = ConfigManager::new(".config/settings.toml");
//! config.load_or_create().unwrap();
//!
//! println!("Drift tolerance: {}ms", config.settings().sync.drift_tolerance_ms);
//!
//! config.settings_mut().volume.remember(0, 150);
//! config.update_section(ConfigSection::Volume).unwrap();
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    ConfigSection, ExtractionSettings, InterfaceSettings, LoggingSettings, PathSettings,
    Settings, SyncSettings, ToolSettings, VolumeSettings, DEFAULT_GAIN_BOOST,
};
