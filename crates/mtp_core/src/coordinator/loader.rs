//! Background load worker.
//!
//! Probing and extraction run on their own thread so transport commands
//! stay responsive. Each load carries the generation it was started for;
//! the coordinator drops results whose generation is no longer current.

use std::io;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use crate::extraction::{CancelHandle, ExtractionError, LoadedMedia, TrackExtractor};
use crate::logging::LoadLogger;

type LoadResult = Result<LoadedMedia, ExtractionError>;

pub struct LoadTask {
    generation: u64,
    path: PathBuf,
    cancel: CancelHandle,
    handle: JoinHandle<LoadResult>,
}

impl LoadTask {
    /// Start loading `path` on a worker thread.
    pub fn spawn(
        generation: u64,
        path: PathBuf,
        extractor: TrackExtractor,
        logger: LoadLogger,
    ) -> Self {
        let cancel = CancelHandle::new();
        let worker_cancel = cancel.clone();
        let worker_path = path.clone();

        let handle = thread::spawn(move || {
            tracing::debug!(generation, "Load worker started for {}", worker_path.display());
            let result = extractor.load(&worker_path, &worker_cancel, &logger);
            logger.flush();
            result
        });

        Self {
            generation,
            path,
            cancel,
            handle,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Ask the worker to stop. Kills the running tool, if any.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the worker and take its result.
    pub fn join(self) -> LoadResult {
        self.handle.join().unwrap_or_else(|_| {
            Err(ExtractionError::Io(io::Error::other("load worker panicked")))
        })
    }
}
