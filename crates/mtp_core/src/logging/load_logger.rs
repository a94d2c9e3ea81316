//! Per-load logger with file output and a tool-output tail buffer.
//!
//! Each media load gets its own logger that:
//! - Writes to a dedicated log file named after the media
//! - Mirrors every line into `tracing`
//! - Keeps the last few lines of external tool output for failure diagnosis

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use parking_lot::Mutex;

use super::types::{LogConfig, LogLevel, MessagePrefix};

/// Logger for one probe + extraction run.
pub struct LoadLogger {
    /// Media name for identification.
    name: String,
    /// Path to log file (`None` when file output is disabled).
    log_path: Option<PathBuf>,
    /// File writer (buffered).
    file_writer: Arc<Mutex<Option<BufWriter<File>>>>,
    /// Logging configuration.
    config: LogConfig,
    /// Recent tool output lines.
    tail_buffer: Arc<Mutex<VecDeque<String>>>,
}

impl LoadLogger {
    /// Create a logger writing to `<log_dir>/<name>.log`.
    pub fn new(
        name: impl Into<String>,
        log_dir: impl AsRef<Path>,
        config: LogConfig,
    ) -> std::io::Result<Self> {
        let name = name.into();
        let log_dir = log_dir.as_ref();

        fs::create_dir_all(log_dir)?;

        let log_path = log_dir.join(format!("{}.log", sanitize_filename(&name)));
        let file = File::create(&log_path)?;

        Ok(Self {
            tail_buffer: Arc::new(Mutex::new(VecDeque::with_capacity(config.error_tail))),
            name,
            log_path: Some(log_path),
            file_writer: Arc::new(Mutex::new(Some(BufWriter::new(file)))),
            config,
        })
    }

    /// Create a logger that only mirrors into `tracing`.
    pub fn detached(name: impl Into<String>, config: LogConfig) -> Self {
        Self {
            tail_buffer: Arc::new(Mutex::new(VecDeque::with_capacity(config.error_tail))),
            name: name.into(),
            log_path: None,
            file_writer: Arc::new(Mutex::new(None)),
            config,
        }
    }

    /// Get the media name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the log file path, if writing to a file.
    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    /// Log a message at the specified level.
    pub fn log(&self, level: LogLevel, message: &str) {
        if level < self.config.level {
            return;
        }

        match level {
            LogLevel::Trace => tracing::trace!(media = %self.name, "{}", message),
            LogLevel::Debug => tracing::debug!(media = %self.name, "{}", message),
            LogLevel::Info => tracing::info!(media = %self.name, "{}", message),
            LogLevel::Warn => tracing::warn!(media = %self.name, "{}", message),
            LogLevel::Error => tracing::error!(media = %self.name, "{}", message),
        }

        let formatted = self.format_message(message);
        self.write_line(&formatted);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn warn(&self, message: &str) {
        let msg = MessagePrefix::Warning.format(message);
        self.log(LogLevel::Warn, &msg);
    }

    pub fn error(&self, message: &str) {
        let msg = MessagePrefix::Error.format(message);
        self.log(LogLevel::Error, &msg);
    }

    /// Log a command line being executed.
    pub fn command(&self, command: &str) {
        let msg = MessagePrefix::Command.format(command);
        self.log(LogLevel::Info, &msg);
    }

    /// Log a phase marker.
    pub fn phase(&self, phase_name: &str) {
        let msg = MessagePrefix::Phase.format(phase_name);
        self.log(LogLevel::Info, &msg);
    }

    pub fn success(&self, message: &str) {
        let msg = MessagePrefix::Success.format(message);
        self.log(LogLevel::Info, &msg);
    }

    /// Record one line of external tool output.
    ///
    /// Always kept in the tail buffer; written to the file only when not
    /// in compact mode.
    pub fn output_line(&self, line: &str, is_stderr: bool) {
        {
            let mut buffer = self.tail_buffer.lock();
            if buffer.len() >= self.config.error_tail {
                buffer.pop_front();
            }
            buffer.push_back(line.to_string());
        }

        if self.config.compact {
            return;
        }

        let prefix = if is_stderr { "[stderr] " } else { "" };
        let msg = format!("{}{}", prefix, line);
        self.write_line(&self.format_message(&msg));
    }

    /// Dump the tail buffer (typically after a tool failure).
    pub fn show_tail(&self, header: &str) {
        let lines: Vec<String> = self.tail_buffer.lock().iter().cloned().collect();
        if lines.is_empty() {
            return;
        }

        self.write_line(&self.format_message(&format!("[{}/tail]", header)));
        for line in &lines {
            tracing::debug!(media = %self.name, "{}", line);
            self.write_line(&self.format_message(line));
        }
    }

    pub fn get_tail(&self) -> Vec<String> {
        self.tail_buffer.lock().iter().cloned().collect()
    }

    pub fn flush(&self) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writer.flush();
        }
    }

    /// Close the logger and release the file.
    pub fn close(&self) {
        self.flush();
        *self.file_writer.lock() = None;
    }

    fn format_message(&self, message: &str) -> String {
        if self.config.show_timestamps {
            let timestamp = Local::now().format("%H:%M:%S");
            format!("[{}] {}", timestamp, message)
        } else {
            message.to_string()
        }
    }

    fn write_line(&self, formatted: &str) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writeln!(writer, "{}", formatted);
        }
    }
}

impl Drop for LoadLogger {
    fn drop(&mut self) {
        self.close();
    }
}

/// Sanitize a string to be safe for use as a filename.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_log_file() {
        let dir = tempdir().unwrap();
        let logger = LoadLogger::new("movie", dir.path(), LogConfig::default()).unwrap();

        let path = logger.log_path().unwrap();
        assert!(path.exists());
        assert!(path.to_string_lossy().ends_with("movie.log"));
    }

    #[test]
    fn writes_to_file() {
        let dir = tempdir().unwrap();
        let logger = LoadLogger::new("movie", dir.path(), LogConfig::default()).unwrap();

        logger.phase("Extract");
        logger.command("ffmpeg -i movie.mkv");
        logger.flush();

        let content = fs::read_to_string(logger.log_path().unwrap()).unwrap();
        assert!(content.contains("=== Extract ==="));
        assert!(content.contains("$ ffmpeg -i movie.mkv"));
    }

    #[test]
    fn compact_mode_keeps_output_in_tail_only() {
        let dir = tempdir().unwrap();
        let logger = LoadLogger::new("movie", dir.path(), LogConfig::default()).unwrap();

        logger.output_line("Stream mapping:", true);
        logger.flush();

        let content = fs::read_to_string(logger.log_path().unwrap()).unwrap();
        assert!(!content.contains("Stream mapping:"));
        assert_eq!(logger.get_tail(), vec!["Stream mapping:".to_string()]);

        logger.show_tail("ffmpeg");
        logger.flush();
        let content = fs::read_to_string(logger.log_path().unwrap()).unwrap();
        assert!(content.contains("[ffmpeg/tail]"));
        assert!(content.contains("Stream mapping:"));
    }

    #[test]
    fn tail_buffer_maintains_limit() {
        let mut config = LogConfig::default();
        config.error_tail = 5;
        let logger = LoadLogger::detached("movie", config);

        for i in 0..10 {
            logger.output_line(&format!("Line {}", i), false);
        }

        let tail = logger.get_tail();
        assert_eq!(tail.len(), 5);
        assert_eq!(tail[0], "Line 5");
        assert_eq!(tail[4], "Line 9");
    }

    #[test]
    fn detached_logger_has_no_file() {
        let logger = LoadLogger::detached("movie", LogConfig::default());
        logger.info("nothing on disk");
        assert!(logger.log_path().is_none());
    }

    #[test]
    fn sanitizes_filename() {
        assert_eq!(sanitize_filename("normal_name"), "normal_name");
        assert_eq!(sanitize_filename("has/slash"), "has_slash");
        assert_eq!(sanitize_filename("a<b>c"), "a_b_c");
    }
}
