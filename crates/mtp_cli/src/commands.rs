//! Line commands read from stdin.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Play,
    Pause,
    Toggle,
    Stop,
    Seek(u64),
    Gain { index: usize, slider: u32 },
    /// Full start/preview/end scrub cycle ending at the position.
    Scrub(u64),
    Load(PathBuf),
    Export(PathBuf),
    Status,
    Help,
    Quit,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command '{0}' (try 'help')")]
    Unknown(String),

    #[error("'{command}' needs {expected}")]
    MissingArgument {
        command: &'static str,
        expected: &'static str,
    },

    #[error("Invalid time '{0}' (use milliseconds or mm:ss)")]
    InvalidTime(String),

    #[error("Invalid number '{0}'")]
    InvalidNumber(String),
}

pub const HELP: &str = "\
Commands:
  play | pause | toggle | stop
  seek <ms|mm:ss>          jump every track to the position
  scrub <ms|mm:ss>         drag-seek to the position
  gain <track> <0-200>     set a track's volume slider
  load <path>              load another file
  export <path>            write the video with the current mix
  status                   show transport and track volumes
  quit";

/// Parse a time as plain milliseconds, `mm:ss` or `hh:mm:ss`.
///
/// Seconds may carry a fraction (`1:02.5`).
pub fn parse_time(s: &str) -> Option<u64> {
    let s = s.trim();
    if !s.contains(':') {
        return s.parse().ok();
    }

    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() > 3 {
        return None;
    }
    let (last, rest) = parts.split_last()?;
    let seconds: f64 = last.parse().ok()?;
    if !(0.0..60.0).contains(&seconds) {
        return None;
    }

    let mut minutes: u64 = 0;
    for part in rest {
        minutes = minutes.checked_mul(60)?.checked_add(part.parse().ok()?)?;
    }
    minutes
        .checked_mul(60_000)?
        .checked_add((seconds * 1000.0).round() as u64)
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Result<Option<ShellCommand>, CommandError> {
    let line = line.trim();
    let Some((word, rest)) = split_word(line) else {
        return Ok(None);
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "play" => ShellCommand::Play,
        "pause" => ShellCommand::Pause,
        "toggle" | "space" => ShellCommand::Toggle,
        "stop" => ShellCommand::Stop,
        "seek" => ShellCommand::Seek(time_arg("seek", rest)?),
        "scrub" => ShellCommand::Scrub(time_arg("scrub", rest)?),
        "gain" | "vol" => {
            let mut args = rest.split_whitespace();
            let (Some(index), Some(slider)) = (args.next(), args.next()) else {
                return Err(CommandError::MissingArgument {
                    command: "gain",
                    expected: "a track index and a slider value",
                });
            };
            ShellCommand::Gain {
                index: number(index)?,
                slider: number(slider)?,
            }
        }
        "load" | "open" => ShellCommand::Load(path_arg("load", rest)?),
        "export" => ShellCommand::Export(path_arg("export", rest)?),
        "status" => ShellCommand::Status,
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" | "q" => ShellCommand::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

fn split_word(line: &str) -> Option<(&str, &str)> {
    if line.is_empty() {
        return None;
    }
    Some(match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    })
}

fn time_arg(command: &'static str, rest: &str) -> Result<u64, CommandError> {
    if rest.is_empty() {
        return Err(CommandError::MissingArgument {
            command,
            expected: "a position",
        });
    }
    parse_time(rest).ok_or_else(|| CommandError::InvalidTime(rest.to_string()))
}

fn path_arg(command: &'static str, rest: &str) -> Result<PathBuf, CommandError> {
    let rest = rest.trim_matches('"');
    if rest.is_empty() {
        return Err(CommandError::MissingArgument {
            command,
            expected: "a path",
        });
    }
    Ok(PathBuf::from(rest))
}

fn number<T: std::str::FromStr>(s: &str) -> Result<T, CommandError> {
    s.parse()
        .map_err(|_| CommandError::InvalidNumber(s.to_string()))
}
