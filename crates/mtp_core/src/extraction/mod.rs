//! Track extraction: probing a container and producing one decodable
//! audio asset per audio stream.
//!
//! The external tools sit behind [`ProbeEngine`] and [`TranscodeEngine`];
//! [`TrackExtractor`] applies the partial-success policy on top of them.

mod cancel;
mod probe;
mod runner;
mod service;
mod transcode;
mod types;

pub use cancel::CancelHandle;
pub use probe::{parse_dimensions, parse_probe_json, FfprobeEngine, ProbeEngine};
pub use runner::{RunError, ToolOutput, ToolRunner};
pub use service::TrackExtractor;
pub use transcode::{FfmpegTranscoder, TranscodeEngine};
pub use types::{
    ExtractedAsset, ExtractionError, ExtractionReport, LoadedMedia, ProbeError, TranscodeRequest,
};
