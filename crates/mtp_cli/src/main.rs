//! Multitrack Player - terminal shell
//!
//! Loads a media file, extracts its audio tracks and plays them alongside
//! the video. Transport commands are read line by line from stdin.
//!
//! ```bash
//! mtp movie.mkv                 # play with mpv decoders
//! mtp movie.mkv --simulate      # in-memory decoders, no windows
//! ```

mod commands;

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;

use clap::Parser;
use thiserror::Error;

use mtp_core::config::{ConfigError, ConfigManager, ConfigSection};
use mtp_core::coordinator::{CoordinatorResult, FanoutReport, PlaybackCoordinator};
use mtp_core::decoder::{DecoderFactory, SimulatedFactory};
use mtp_core::extraction::CancelHandle;
use mtp_core::logging::{init_tracing, init_tracing_with_file, LogLevel};
use mtp_core::models::{format_clock, MessageLevel, PlayerEvent};

use commands::{parse_command, ShellCommand, HELP};

#[derive(Parser, Debug)]
#[command(name = "mtp", version, about = "Play a video with each audio track as its own stream")]
struct Args {
    /// Media file to load on startup
    media: Option<PathBuf>,

    /// Settings file
    #[arg(long, default_value = ".config/settings.toml")]
    config: PathBuf,

    /// Use in-memory decoders instead of mpv
    #[arg(long)]
    simulate: bool,

    /// Extract at most this many audio tracks
    #[arg(long)]
    max_tracks: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Unknown log level '{0}'")]
    LogLevel(String),

    #[cfg(not(unix))]
    #[error("{0}")]
    Decoders(String),
}

fn main() -> ExitCode {
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), CliError> {
    let mut config = ConfigManager::new(&args.config);
    if let Err(e) = config.load_or_create() {
        eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
    }

    let level = match &args.log_level {
        Some(name) => LogLevel::parse(name).ok_or_else(|| CliError::LogLevel(name.clone()))?,
        None => config.settings().logging.level,
    };
    let _log_guard = if config.settings().logging.file_logging {
        Some(init_tracing_with_file(level, &config.logs_folder()))
    } else {
        init_tracing(level);
        None
    };

    tracing::info!("Multitrack Player starting");
    tracing::info!("Config: {}", args.config.display());
    tracing::info!("Core version: {}", mtp_core::version());

    if let Err(e) = config.ensure_dirs_exist() {
        tracing::error!("Failed to create directories: {}", e);
    }

    if args.max_tracks.is_some() {
        config.settings_mut().extraction.max_tracks = args.max_tracks;
    }

    let factory = decoder_factory(&config, args.simulate)?;
    let mut coordinator = PlaybackCoordinator::from_settings(config.settings().clone(), factory)
        .with_callback(Box::new(print_event));

    if let Some(media) = &args.media {
        load(&mut coordinator, &mut config, media);
    }
    println!("Type 'help' for commands.");

    let (tx, rx) = mpsc::channel::<String>();
    thread::spawn(move || {
        for line in io::stdin().lock().lines().map_while(Result::ok) {
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    loop {
        match rx.recv_timeout(coordinator.tick_interval()) {
            Ok(line) => match parse_command(&line) {
                Ok(Some(ShellCommand::Quit)) => break,
                Ok(Some(command)) => execute(&mut coordinator, &mut config, command),
                Ok(None) => {}
                Err(e) => println!("{e}"),
            },
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                // stdin closed; finish a pending load so piped scripts still work
                if let Some(Err(e)) = coordinator.wait_for_load() {
                    tracing::warn!("Load failed: {}", e);
                }
                break;
            }
        }

        if let Some(Err(e)) = coordinator.poll_load() {
            tracing::warn!("Load failed: {}", e);
        }
        coordinator.tick();
    }

    coordinator.shutdown();
    tracing::info!("Multitrack Player exiting");
    Ok(())
}

#[cfg(unix)]
fn decoder_factory(
    config: &ConfigManager,
    simulate: bool,
) -> Result<Arc<dyn DecoderFactory>, CliError> {
    if simulate {
        return Ok(Arc::new(SimulatedFactory::realtime(None)));
    }
    let settings = config.settings();
    let socket_dir = settings.paths.temp_root_path().join("ipc");
    Ok(Arc::new(mtp_core::decoder::MpvFactory::new(
        settings.tools.mpv.clone(),
        socket_dir,
    )))
}

#[cfg(not(unix))]
fn decoder_factory(
    _config: &ConfigManager,
    simulate: bool,
) -> Result<Arc<dyn DecoderFactory>, CliError> {
    if simulate {
        Ok(Arc::new(SimulatedFactory::realtime(None)))
    } else {
        Err(CliError::Decoders(
            "mpv decoders need Unix sockets; run with --simulate".to_string(),
        ))
    }
}

fn print_event(event: &PlayerEvent) {
    match event {
        PlayerEvent::TrackCountChanged(n) => println!("[tracks] {}", n),
        PlayerEvent::DurationKnown(ms) => println!("[duration] {}", format_clock(*ms)),
        PlayerEvent::PlaybackStateChanged(playing) => {
            println!("[{}]", if *playing { "playing" } else { "paused" })
        }
        PlayerEvent::Message(m) => match m.level {
            MessageLevel::Info => println!("{}", m.text),
            MessageLevel::Warning => println!("Warning: {}", m.text),
            MessageLevel::Error => println!("Error: {}", m.text),
        },
        PlayerEvent::DriftCorrected {
            index,
            drift_ms,
            target_ms,
        } => tracing::debug!(track = index, drift_ms, target_ms, "Re-synced"),
        PlayerEvent::PositionTick(_) | PlayerEvent::PreviewPosition(_) => {}
    }
}

fn report(result: CoordinatorResult<FanoutReport>) {
    match result {
        Ok(report) if !report.is_clean() => {
            let tracks: Vec<String> = report
                .failed_tracks()
                .iter()
                .map(|t| t.to_string())
                .collect();
            println!("Warning: no response from {}", tracks.join(", "));
        }
        Ok(_) => {}
        Err(e) => println!("{e}"),
    }
}

fn load(coordinator: &mut PlaybackCoordinator, config: &mut ConfigManager, path: &Path) {
    if coordinator.begin_load(path).is_ok() {
        config.settings_mut().paths.last_media_path = path.to_string_lossy().to_string();
        if let Err(e) = config.update_section(ConfigSection::Paths) {
            tracing::warn!("Could not save last media path: {}", e);
        }
    }
}

fn execute(
    coordinator: &mut PlaybackCoordinator,
    config: &mut ConfigManager,
    command: ShellCommand,
) {
    coordinator.activity_ping();
    match command {
        ShellCommand::Play => report(coordinator.play()),
        ShellCommand::Pause => report(coordinator.pause()),
        ShellCommand::Toggle => report(coordinator.toggle_play()),
        ShellCommand::Stop => report(coordinator.stop()),
        ShellCommand::Seek(ms) => report(coordinator.seek(ms)),
        ShellCommand::Scrub(ms) => {
            let result = coordinator
                .start_scrub()
                .and_then(|_| coordinator.preview_move(ms))
                .and_then(|_| coordinator.end_scrub(ms));
            report(result);
        }
        ShellCommand::Gain { index, slider } => {
            let mapper = coordinator.volume_mapper();
            if !coordinator.set_track_gain(index, mapper.gain(slider)) {
                println!("No audio track {}", index);
                return;
            }
            if config.settings().volume.remember_volumes {
                config
                    .settings_mut()
                    .volume
                    .remember(index, slider.min(mapper.slider_max()));
                if let Err(e) = config.update_section(ConfigSection::Volume) {
                    tracing::warn!("Could not save volumes: {}", e);
                }
            }
        }
        ShellCommand::Load(path) => load(coordinator, config, &path),
        ShellCommand::Export(output) => {
            if let Err(e) = coordinator.export_mix(&output, &CancelHandle::new()) {
                println!("{e}");
            }
        }
        ShellCommand::Status => print_status(coordinator),
        ShellCommand::Help => println!("{HELP}"),
        ShellCommand::Quit => {}
    }
}

fn print_status(coordinator: &PlaybackCoordinator) {
    let name = coordinator
        .source()
        .map(|s| s.display_name())
        .unwrap_or_else(|| "(nothing loaded)".to_string());
    println!("{} [{}] {}", name, coordinator.state(), coordinator.timeline_label());

    let mapper = coordinator.volume_mapper();
    let gains = coordinator.gain_controls();
    for index in 0..gains.len() {
        if let Some(gain) = gains.get(index) {
            println!("  track {}: {}/{}", index, mapper.slider(gain), mapper.slider_max());
        }
    }
    if coordinator.is_loading() {
        println!("  (loading)");
    }
}
