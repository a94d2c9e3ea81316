//! MTP Core - Backend logic for Multitrack Player
//!
//! Plays one video while N separately extracted audio tracks follow its
//! clock. This crate contains all orchestration logic with zero UI
//! dependencies; decoding, transcoding and probing are delegated to external
//! engines behind traits.
//!
//! ```text
//! extraction ──► assets ──► coordinator ──► decoder handles (video + N audio)
//!                              ▲   │
//!              shell commands ─┘   └─► PlayerEvent notifications
//! ```

pub mod config;
pub mod coordinator;
pub mod decoder;
pub mod drift;
pub mod export;
pub mod extraction;
pub mod logging;
pub mod models;
pub mod scrub;
pub mod volume;

#[cfg(test)]
pub(crate) mod test_support;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_returns_value() {
        assert!(!version().is_empty());
    }
}
