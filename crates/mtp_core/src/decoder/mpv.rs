//! mpv-backed decoder driven over its JSON IPC socket.
//!
//! Each track runs its own `mpv --idle` process. Audio instances have video
//! disabled and a volume ceiling of 100 so that gain 1.0 maps to mpv's
//! full volume.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::{json, Value};

use super::engine::{
    DecoderCommand, DecoderCommandError, DecoderEngine, DecoderFactory, DecoderResult,
};
use crate::models::TrackRef;

/// How long to wait for a fresh mpv to open its IPC socket.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait for a reply to one IPC request.
const REPLY_TIMEOUT: Duration = Duration::from_secs(2);

static SOCKET_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Spawns one mpv process per track.
#[derive(Debug, Clone)]
pub struct MpvFactory {
    program: String,
    socket_dir: PathBuf,
}

impl MpvFactory {
    pub fn new(program: impl Into<String>, socket_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            socket_dir: socket_dir.into(),
        }
    }

    /// Command-line arguments for a track role.
    pub fn build_args(role: TrackRef, socket: &Path) -> Vec<String> {
        let mut args = vec![
            "--idle=yes".to_string(),
            "--no-terminal".to_string(),
            "--pause".to_string(),
            "--keep-open=yes".to_string(),
            format!("--input-ipc-server={}", socket.display()),
        ];
        match role {
            TrackRef::Video => {
                args.push("--force-window=yes".to_string());
                args.push("--mute=yes".to_string());
            }
            TrackRef::Audio(_) => {
                args.push("--vid=no".to_string());
                args.push("--volume-max=100".to_string());
            }
        }
        args
    }
}

impl DecoderFactory for MpvFactory {
    fn create(&self, role: TrackRef) -> DecoderResult<Box<dyn DecoderEngine>> {
        std::fs::create_dir_all(&self.socket_dir).map_err(|e| DecoderCommandError::Spawn {
            role,
            message: e.to_string(),
        })?;

        let socket = self.socket_dir.join(format!(
            "mpv-{}-{}.sock",
            std::process::id(),
            SOCKET_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        let child = Command::new(&self.program)
            .args(Self::build_args(role, &socket))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| DecoderCommandError::Spawn {
                role,
                message: format!("{}: {}", self.program, e),
            })?;

        tracing::debug!(track = %role, socket = %socket.display(), "Spawned mpv");

        let mut decoder = MpvDecoder {
            role,
            child: Some(child),
            socket,
            conn: None,
            next_request: 1,
        };
        if let Err(e) = decoder.connect() {
            decoder.terminate();
            return Err(DecoderCommandError::Spawn {
                role,
                message: e.to_string(),
            });
        }
        Ok(Box::new(decoder))
    }
}

struct Connection {
    writer: UnixStream,
    reader: BufReader<UnixStream>,
}

/// One mpv process.
pub struct MpvDecoder {
    role: TrackRef,
    child: Option<Child>,
    socket: PathBuf,
    conn: Option<Connection>,
    next_request: u64,
}

impl MpvDecoder {
    fn connect(&mut self) -> DecoderResult<()> {
        let started = Instant::now();
        loop {
            match UnixStream::connect(&self.socket) {
                Ok(stream) => {
                    stream
                        .set_read_timeout(Some(REPLY_TIMEOUT))
                        .map_err(|e| DecoderCommandError::Ipc(e.to_string()))?;
                    let reader = stream
                        .try_clone()
                        .map_err(|e| DecoderCommandError::Ipc(e.to_string()))?;
                    self.conn = Some(Connection {
                        writer: stream,
                        reader: BufReader::new(reader),
                    });
                    return Ok(());
                }
                Err(e) if started.elapsed() > CONNECT_TIMEOUT => {
                    return Err(DecoderCommandError::Ipc(format!(
                        "no IPC socket at {}: {}",
                        self.socket.display(),
                        e
                    )));
                }
                Err(_) => thread::sleep(Duration::from_millis(50)),
            }
        }
    }

    /// Send one command and wait for its reply, skipping event lines.
    fn request(&mut self, command: DecoderCommand, args: Value) -> DecoderResult<Value> {
        let conn = self.conn.as_mut().ok_or(DecoderCommandError::Terminated)?;

        let id = self.next_request;
        self.next_request += 1;

        let mut line = json!({ "command": args, "request_id": id }).to_string();
        line.push('\n');
        conn.writer
            .write_all(line.as_bytes())
            .map_err(|e| DecoderCommandError::Ipc(e.to_string()))?;

        let mut buf = String::new();
        loop {
            buf.clear();
            let read = conn
                .reader
                .read_line(&mut buf)
                .map_err(|e| DecoderCommandError::Ipc(e.to_string()))?;
            if read == 0 {
                return Err(DecoderCommandError::Ipc("mpv closed the socket".to_string()));
            }

            let Ok(reply) = serde_json::from_str::<Value>(&buf) else {
                continue;
            };
            if reply.get("request_id").and_then(|r| r.as_u64()) != Some(id) {
                continue;
            }

            return match reply.get("error").and_then(|e| e.as_str()) {
                Some("success") => Ok(reply.get("data").cloned().unwrap_or(Value::Null)),
                Some("property unavailable") => Err(DecoderCommandError::Unavailable(command)),
                Some(other) => Err(DecoderCommandError::Command {
                    command,
                    message: other.to_string(),
                }),
                None => Err(DecoderCommandError::Ipc(format!("unexpected reply: {}", buf.trim()))),
            };
        }
    }

    fn set_property(
        &mut self,
        command: DecoderCommand,
        name: &str,
        value: Value,
    ) -> DecoderResult<()> {
        self.request(command, json!(["set_property", name, value]))
            .map(|_| ())
    }

    fn get_property(&mut self, command: DecoderCommand, name: &str) -> DecoderResult<Value> {
        self.request(command, json!(["get_property", name]))
    }
}

fn secs_to_ms(value: &Value) -> Option<u64> {
    value
        .as_f64()
        .filter(|s| s.is_finite() && *s >= 0.0)
        .map(|s| (s * 1000.0).round() as u64)
}

impl DecoderEngine for MpvDecoder {
    fn open(&mut self, asset: &Path) -> DecoderResult<()> {
        let path = asset.to_string_lossy().to_string();
        self.request(DecoderCommand::Open, json!(["loadfile", path, "replace"]))
            .map(|_| ())
    }

    fn play(&mut self) -> DecoderResult<()> {
        self.set_property(DecoderCommand::Play, "pause", json!(false))
    }

    fn pause(&mut self) -> DecoderResult<()> {
        self.set_property(DecoderCommand::Pause, "pause", json!(true))
    }

    fn stop(&mut self) -> DecoderResult<()> {
        // mpv's own stop unloads the file
        self.set_property(DecoderCommand::Stop, "pause", json!(true))?;
        self.request(DecoderCommand::Stop, json!(["seek", 0, "absolute+exact"]))
            .map(|_| ())
    }

    fn seek(&mut self, ms: u64) -> DecoderResult<()> {
        let secs = ms as f64 / 1000.0;
        self.request(DecoderCommand::Seek, json!(["seek", secs, "absolute+exact"]))
            .map(|_| ())
    }

    fn position_ms(&mut self) -> DecoderResult<u64> {
        let value = self.get_property(DecoderCommand::Position, "time-pos")?;
        secs_to_ms(&value).ok_or(DecoderCommandError::Unavailable(DecoderCommand::Position))
    }

    fn duration_ms(&mut self) -> DecoderResult<Option<u64>> {
        match self.get_property(DecoderCommand::Duration, "duration") {
            Ok(value) => Ok(secs_to_ms(&value)),
            Err(DecoderCommandError::Unavailable(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set_volume(&mut self, gain: f32) -> DecoderResult<()> {
        let volume = (gain.clamp(0.0, 1.0) * 100.0) as f64;
        self.set_property(DecoderCommand::SetVolume, "volume", json!(volume))
    }

    fn mute(&mut self) -> DecoderResult<()> {
        self.set_property(DecoderCommand::Mute, "mute", json!(true))
    }

    fn is_playing(&mut self) -> DecoderResult<bool> {
        let paused = self.get_property(DecoderCommand::Query, "pause")?;
        Ok(!paused.as_bool().unwrap_or(true))
    }

    // time-pos can settle just short of duration with --keep-open
    fn reached_end(&mut self) -> DecoderResult<bool> {
        match self.get_property(DecoderCommand::Query, "eof-reached") {
            Ok(value) => Ok(value.as_bool().unwrap_or(false)),
            Err(DecoderCommandError::Unavailable(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn terminate(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            let _ = conn.writer.write_all(b"{\"command\": [\"quit\"]}\n");
        }
        if let Some(mut child) = self.child.take() {
            let deadline = Instant::now() + Duration::from_millis(500);
            loop {
                match child.try_wait() {
                    Ok(Some(_)) => break,
                    Ok(None) if Instant::now() < deadline => {
                        thread::sleep(Duration::from_millis(20))
                    }
                    _ => {
                        let _ = child.kill();
                        let _ = child.wait();
                        break;
                    }
                }
            }
            tracing::debug!(track = %self.role, "mpv terminated");
        }
        let _ = std::fs::remove_file(&self.socket);
    }
}

impl Drop for MpvDecoder {
    fn drop(&mut self) {
        self.terminate();
    }
}
