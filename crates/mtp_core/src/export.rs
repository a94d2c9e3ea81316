//! Offline mix export.
//!
//! Re-muxes the source video with all extracted tracks mixed down at their
//! current gains. The plan is a snapshot of asset paths and multipliers;
//! [`PlaybackCoordinator::export_mix`] pauses the transport around the run.
//!
//! [`PlaybackCoordinator::export_mix`]: crate::coordinator::PlaybackCoordinator::export_mix

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::config::ToolSettings;
use crate::extraction::{CancelHandle, RunError, ToolRunner};

/// Errors from building or running an export.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("There are no audio tracks to export")]
    NoAudioTracks,

    #[error(transparent)]
    Run(#[from] RunError),

    #[error("ffmpeg exited with code {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },
}

/// One track in the mix.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportTrack {
    pub index: usize,
    pub asset: PathBuf,
    /// Linear multiplier relative to the extract's baseline loudness.
    pub multiplier: f64,
}

/// Everything needed to run the export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportPlan {
    pub source: PathBuf,
    pub tracks: Vec<ExportTrack>,
    pub output: PathBuf,
}

impl ExportPlan {
    pub fn new(
        source: impl Into<PathBuf>,
        tracks: Vec<ExportTrack>,
        output: impl Into<PathBuf>,
    ) -> Result<Self, ExportError> {
        if tracks.is_empty() {
            return Err(ExportError::NoAudioTracks);
        }
        Ok(Self {
            source: source.into(),
            tracks,
            output: output.into(),
        })
    }

    /// `-filter_complex` graph: one `volume` per input, then `amix`.
    pub fn filter_graph(&self) -> String {
        let mut parts: Vec<String> = self
            .tracks
            .iter()
            .enumerate()
            .map(|(i, t)| format!("[{}:a]volume={}[a{}]", i + 1, t.multiplier, i))
            .collect();

        let labels: String = (0..self.tracks.len()).map(|i| format!("[a{}]", i)).collect();
        parts.push(format!(
            "{}amix=inputs={}:duration=longest[aout]",
            labels,
            self.tracks.len()
        ));
        parts.join(";")
    }

    /// Full ffmpeg argument list.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-v".to_string(),
            "error".to_string(),
            "-i".to_string(),
            path_arg(&self.source),
        ];
        for track in &self.tracks {
            args.push("-i".to_string());
            args.push(path_arg(&track.asset));
        }
        args.extend([
            "-filter_complex".to_string(),
            self.filter_graph(),
            "-map".to_string(),
            "0:v".to_string(),
            "-map".to_string(),
            "[aout]".to_string(),
            "-c:v".to_string(),
            "copy".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            "320k".to_string(),
            path_arg(&self.output),
        ]);
        args
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Run the export to completion. Cancelling kills ffmpeg.
pub fn run_mix_export(
    plan: &ExportPlan,
    tools: &ToolSettings,
    timeout: Duration,
    cancel: &CancelHandle,
) -> Result<(), ExportError> {
    tracing::info!(
        tracks = plan.tracks.len(),
        "Exporting mix to {}",
        plan.output.display()
    );

    let runner = ToolRunner::new(&tools.ffmpeg, timeout);
    let output = runner.run(plan.build_args(), cancel)?;
    if !output.success() {
        return Err(ExportError::Failed {
            code: output.code,
            stderr: output.stderr_tail(10),
        });
    }

    tracing::info!("Export finished: {}", plan.output.display());
    Ok(())
}
