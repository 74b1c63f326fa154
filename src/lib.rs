//! narrate - Sentence-wise speech synthesis stitched into one WAV
//!
//! Text is split into segments, each segment is synthesized by a remote
//! provider with bounded retry, and the fragments are decoded, spliced with
//! optional sound effects, mixed over an optional background track and
//! encoded as a single 16-bit PCM WAV.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
pub mod cancel;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
#[cfg(feature = "cli")]
pub mod output;
pub mod pipeline;
pub mod provider;
pub mod retry;
pub mod segmenter;

// L4 composition root - needs everything
#[cfg(all(feature = "cli", feature = "remote"))]
pub mod app;

// Collaborator traits (text → fragment → clip)
pub use audio::clip::ClipLoader;
pub use provider::{FragmentGenerator, SfxAnalyzer};

// Pipeline
pub use cancel::CancellationSignal;
pub use pipeline::{
    AudioResource, Enhancements, GenerationProgress, GenerationRequest, Orchestrator,
    ResourceRegistry,
};
pub use provider::{Fragment, FragmentRequest, ReferenceAudio, SfxMarker, VoiceParams};
pub use retry::RetryPolicy;
pub use segmenter::SegmentMode;

// Audio
pub use audio::AudioBuffer;

// Error handling
pub use error::{NarrateError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
