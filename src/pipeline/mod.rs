//! Generation pipeline: segments in, one playable WAV out.
//!
//! Segments are synthesized one at a time through the retry wrapper, decoded,
//! optionally followed by an effect clip, concatenated, optionally mixed over
//! a background track, then encoded and published as a resource handle.

pub mod orchestrator;
pub mod resource;
pub mod types;

pub use orchestrator::Orchestrator;
pub use resource::{AudioResource, ResourceRegistry};
pub use types::{AssemblySettings, Enhancements, GenerationProgress, GenerationRequest};
