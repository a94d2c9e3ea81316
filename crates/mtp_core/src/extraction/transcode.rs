//! Per-track audio transcoding with ffmpeg.

use std::fs;
use std::time::Duration;

use super::cancel::CancelHandle;
use super::runner::ToolRunner;
use super::types::{ExtractionError, TranscodeRequest};

/// Capability for turning one audio stream into a standalone asset.
pub trait TranscodeEngine: Send + Sync {
    /// Write stream `request.stream` of `request.source` to `request.output`.
    fn transcode(
        &self,
        request: &TranscodeRequest,
        cancel: &CancelHandle,
    ) -> Result<(), ExtractionError>;

    /// Human-readable command line for logs.
    fn describe(&self, request: &TranscodeRequest) -> String {
        format!(
            "transcode {} a:{} -> {}",
            request.source.display(),
            request.stream,
            request.output.display()
        )
    }
}

/// ffmpeg-backed transcoder producing 16-bit PCM WAV.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    runner: ToolRunner,
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            runner: ToolRunner::new(program, timeout),
        }
    }

    /// Build the ffmpeg argument list for a request.
    pub fn build_args(request: &TranscodeRequest) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-v".to_string(),
            "error".to_string(),
            "-i".to_string(),
            request.source.to_string_lossy().to_string(),
            "-map".to_string(),
            format!("0:a:{}", request.stream),
            "-af".to_string(),
            format!("volume={}", request.gain_multiplier),
            "-ac".to_string(),
            request.channels.to_string(),
            "-ar".to_string(),
            request.sample_rate.to_string(),
            "-c:a".to_string(),
            "pcm_s16le".to_string(),
            "-f".to_string(),
            "wav".to_string(),
            request.output.to_string_lossy().to_string(),
        ]
    }
}

impl TranscodeEngine for FfmpegTranscoder {
    fn transcode(
        &self,
        request: &TranscodeRequest,
        cancel: &CancelHandle,
    ) -> Result<(), ExtractionError> {
        let output = self
            .runner
            .run(Self::build_args(request), cancel)
            .map_err(|e| ExtractionError::from_run(request.stream, e))?;

        if !output.success() {
            return Err(ExtractionError::Transcode {
                index: request.stream,
                message: format!(
                    "ffmpeg exited with code {:?}\n{}",
                    output.code,
                    output.stderr_tail(10)
                ),
            });
        }

        let written = fs::metadata(&request.output)
            .map(|m| m.len())
            .unwrap_or(0);
        if written == 0 {
            return Err(ExtractionError::Transcode {
                index: request.stream,
                message: format!("output missing or empty: {}", request.output.display()),
            });
        }

        Ok(())
    }

    fn describe(&self, request: &TranscodeRequest) -> String {
        let mut line = self.runner.program().to_string();
        for arg in Self::build_args(request) {
            line.push(' ');
            if arg.contains(' ') {
                line.push_str(&format!("\"{}\"", arg));
            } else {
                line.push_str(&arg);
            }
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn request(stream: usize) -> TranscodeRequest {
        TranscodeRequest {
            source: PathBuf::from("/media/movie.mkv"),
            stream,
            output: PathBuf::from("/tmp/track_2.wav"),
            gain_multiplier: 4.0,
            channels: 2,
            sample_rate: 44_100,
        }
    }

    #[test]
    fn args_select_audio_stream_with_boost() {
        let args = FfmpegTranscoder::build_args(&request(2));
        let joined = args.join(" ");
        assert!(joined.contains("-map 0:a:2"));
        assert!(joined.contains("-af volume=4"));
        assert!(joined.contains("-ac 2"));
        assert!(joined.contains("-ar 44100"));
        assert!(joined.contains("-c:a pcm_s16le"));
        assert_eq!(args.last().map(String::as_str), Some("/tmp/track_2.wav"));
    }

    #[test]
    fn fractional_boost_is_preserved() {
        let mut req = request(0);
        req.gain_multiplier = 2.5;
        let args = FfmpegTranscoder::build_args(&req);
        assert!(args.contains(&"volume=2.5".to_string()));
    }

    #[test]
    fn describe_includes_program() {
        let transcoder = FfmpegTranscoder::new("/opt/ffmpeg", Duration::from_secs(1));
        assert!(transcoder.describe(&request(0)).starts_with("/opt/ffmpeg -y"));
    }

    #[test]
    fn missing_tool_is_transcode_failure() {
        let transcoder = FfmpegTranscoder::new("mtp-no-such-ffmpeg", Duration::from_secs(1));
        let result = transcoder.transcode(&request(3), &CancelHandle::new());
        assert!(matches!(
            result,
            Err(ExtractionError::Transcode { index: 3, .. })
        ));
    }
}
