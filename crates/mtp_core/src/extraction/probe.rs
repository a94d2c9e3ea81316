//! Stream probing with ffprobe.

use std::path::Path;
use std::time::Duration;

use serde_json::Value;

use super::cancel::CancelHandle;
use super::runner::ToolRunner;
use super::types::ProbeError;
use crate::models::{ProbeReport, StreamInfo, StreamKind, VideoDimensions};

/// Capability for inspecting a media file's streams.
pub trait ProbeEngine: Send + Sync {
    /// List the streams of `path`.
    fn probe(&self, path: &Path, cancel: &CancelHandle) -> Result<ProbeReport, ProbeError>;

    /// Dimensions of the first video stream.
    ///
    /// Best-effort: any failure yields [`VideoDimensions::FALLBACK`].
    fn probe_video_dimensions(&self, path: &Path, cancel: &CancelHandle) -> VideoDimensions {
        self.probe(path, cancel)
            .ok()
            .and_then(|r| r.video_dimensions())
            .unwrap_or_default()
    }
}

/// ffprobe-backed probe engine.
#[derive(Debug, Clone)]
pub struct FfprobeEngine {
    runner: ToolRunner,
}

impl FfprobeEngine {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            runner: ToolRunner::new(program, timeout),
        }
    }

    /// Arguments for the full stream listing.
    pub fn probe_args(path: &Path) -> Vec<String> {
        vec![
            "-v".to_string(),
            "error".to_string(),
            "-show_entries".to_string(),
            "stream=index,codec_type,width,height:format=duration".to_string(),
            "-of".to_string(),
            "json".to_string(),
            path.to_string_lossy().to_string(),
        ]
    }
}

impl ProbeEngine for FfprobeEngine {
    fn probe(&self, path: &Path, cancel: &CancelHandle) -> Result<ProbeReport, ProbeError> {
        if !path.exists() {
            return Err(ProbeError::NotFound(path.to_path_buf()));
        }

        tracing::debug!("Probing file: {}", path.display());

        let output = self.runner.run(Self::probe_args(path), cancel)?;
        if !output.success() {
            return Err(ProbeError::NonZeroExit {
                code: output.code,
                stderr: output.stderr_tail(5),
            });
        }

        parse_probe_json(&output.stdout)
    }

    fn probe_video_dimensions(&self, path: &Path, cancel: &CancelHandle) -> VideoDimensions {
        let args = [
            "-v".to_string(),
            "error".to_string(),
            "-select_streams".to_string(),
            "v:0".to_string(),
            "-show_entries".to_string(),
            "stream=width,height".to_string(),
            "-of".to_string(),
            "csv=s=x:p=0".to_string(),
            path.to_string_lossy().to_string(),
        ];

        match self.runner.run(args, cancel) {
            Ok(output) if output.success() => {
                parse_dimensions(&output.stdout).unwrap_or_else(|| {
                    tracing::debug!("Unreadable video dimensions, using fallback");
                    VideoDimensions::FALLBACK
                })
            }
            Ok(output) => {
                tracing::debug!(code = ?output.code, "Video probe failed, using fallback");
                VideoDimensions::FALLBACK
            }
            Err(e) => {
                tracing::debug!("Video probe failed ({}), using fallback", e);
                VideoDimensions::FALLBACK
            }
        }
    }
}

/// Parse ffprobe's JSON stream listing.
pub fn parse_probe_json(text: &str) -> Result<ProbeReport, ProbeError> {
    let json: Value =
        serde_json::from_str(text).map_err(|e| ProbeError::Malformed(e.to_string()))?;

    let streams = json
        .get("streams")
        .and_then(|s| s.as_array())
        .ok_or_else(|| ProbeError::Malformed("missing \"streams\" array".to_string()))?;

    let mut report = ProbeReport::default();
    for stream in streams {
        let Some(index) = stream.get("index").and_then(|i| i.as_u64()) else {
            continue;
        };
        let kind = stream
            .get("codec_type")
            .and_then(|t| t.as_str())
            .map(StreamKind::from_codec_type)
            .unwrap_or(StreamKind::Other);

        report.streams.push(StreamInfo {
            index: index as usize,
            kind,
            width: stream.get("width").and_then(|w| w.as_u64()).map(|w| w as u32),
            height: stream.get("height").and_then(|h| h.as_u64()).map(|h| h as u32),
        });
    }

    // ffprobe reports duration as a decimal string in seconds
    report.duration_ms = json
        .get("format")
        .and_then(|f| f.get("duration"))
        .and_then(|d| d.as_str())
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| (secs * 1000.0).round() as u64);

    Ok(report)
}

/// Parse `WIDTHxHEIGHT` as printed by ffprobe's csv writer.
pub fn parse_dimensions(text: &str) -> Option<VideoDimensions> {
    let line = text.lines().next()?.trim();
    let mut parts = line.split('x');
    let width: u32 = parts.next()?.trim().parse().ok()?;
    let height: u32 = parts.next()?.trim().parse().ok()?;
    if width == 0 || height == 0 {
        return None;
    }
    Some(VideoDimensions { width, height })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "programs": [],
        "streams": [
            {"index": 0, "codec_type": "video", "width": 1920, "height": 1080},
            {"index": 1, "codec_type": "audio"},
            {"index": 2, "codec_type": "audio"},
            {"index": 3, "codec_type": "subtitle"}
        ],
        "format": {"duration": "125.432000"}
    }"#;

    #[test]
    fn parses_streams_and_duration() {
        let report = parse_probe_json(SAMPLE).unwrap();
        assert_eq!(report.streams.len(), 4);
        assert_eq!(report.audio_stream_count(), 2);
        assert_eq!(report.duration_ms, Some(125_432));
        assert_eq!(
            report.video_dimensions(),
            Some(VideoDimensions {
                width: 1920,
                height: 1080
            })
        );
    }

    #[test]
    fn missing_duration_is_none() {
        let report = parse_probe_json(r#"{"streams": [{"index": 0, "codec_type": "audio"}]}"#)
            .unwrap();
        assert_eq!(report.audio_stream_count(), 1);
        assert_eq!(report.duration_ms, None);

        let report = parse_probe_json(r#"{"streams": [], "format": {"duration": "N/A"}}"#).unwrap();
        assert_eq!(report.duration_ms, None);
    }

    #[test]
    fn malformed_output_is_an_error() {
        assert!(matches!(
            parse_probe_json("not json"),
            Err(ProbeError::Malformed(_))
        ));
        assert!(matches!(
            parse_probe_json(r#"{"format": {}}"#),
            Err(ProbeError::Malformed(_))
        ));
    }

    #[test]
    fn parses_csv_dimensions() {
        assert_eq!(
            parse_dimensions("1920x1080\n"),
            Some(VideoDimensions {
                width: 1920,
                height: 1080
            })
        );
        assert_eq!(
            parse_dimensions("720x480x\n"),
            Some(VideoDimensions {
                width: 720,
                height: 480
            })
        );
        assert_eq!(parse_dimensions(""), None);
        assert_eq!(parse_dimensions("0x0"), None);
        assert_eq!(parse_dimensions("N/AxN/A"), None);
    }

    #[test]
    fn missing_file_is_not_found() {
        let engine = FfprobeEngine::new("ffprobe", Duration::from_secs(1));
        let result = engine.probe(Path::new("/nonexistent/movie.mkv"), &CancelHandle::new());
        assert!(matches!(result, Err(ProbeError::NotFound(_))));
    }

    #[test]
    fn dimensions_fall_back_when_tool_missing() {
        let engine = FfprobeEngine::new("mtp-no-such-ffprobe", Duration::from_secs(1));
        let path = Path::new("/nonexistent/movie.mkv");
        let dims = engine.probe_video_dimensions(path, &CancelHandle::new());
        assert_eq!(dims, VideoDimensions::FALLBACK);
    }

    #[test]
    fn probe_args_request_json() {
        let args = FfprobeEngine::probe_args(Path::new("movie.mkv"));
        assert!(args.contains(&"json".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("movie.mkv"));
    }
}
