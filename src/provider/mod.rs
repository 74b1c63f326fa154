//! Remote synthesis collaborators.
//!
//! The pipeline only sees the traits in this module; concrete providers
//! and test doubles live in submodules.

pub mod mock;

#[cfg(feature = "remote")]
pub mod gemini;

use crate::audio::pcm::encode_base64;
use crate::cancel::CancellationSignal;
use crate::defaults;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

#[cfg(feature = "remote")]
pub use gemini::GeminiClient;
pub use mock::{ScriptStep, ScriptedGenerator, StaticAnalyzer};

/// Reference sample for voice cloning, already base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceAudio {
    pub mime_type: String,
    pub data_base64: String,
}

impl ReferenceAudio {
    pub fn from_wav_bytes(bytes: &[u8]) -> Self {
        Self {
            mime_type: crate::audio::wav::WAV_MIME.to_string(),
            data_base64: encode_base64(bytes),
        }
    }

    /// Read a WAV reference sample from disk.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        Ok(Self::from_wav_bytes(&bytes))
    }
}

/// Voice selection and delivery settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceParams {
    pub voice: String,
    pub language: String,
    pub speed: f32,
    pub pitch: String,
    pub style: Option<String>,
    /// When set, the run clones this voice instead of using `voice`.
    pub reference: Option<ReferenceAudio>,
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            voice: defaults::DEFAULT_VOICE.to_string(),
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            speed: defaults::DEFAULT_SPEED,
            pitch: defaults::DEFAULT_PITCH.to_string(),
            style: None,
            reference: None,
        }
    }
}

impl VoiceParams {
    pub fn is_cloning(&self) -> bool {
        self.reference.is_some()
    }
}

/// One segment's worth of work for a generator.
#[derive(Debug, Clone, Copy)]
pub struct FragmentRequest<'a> {
    pub text: &'a str,
    pub voice: &'a VoiceParams,
    /// 0-based position of the segment.
    pub index: usize,
    pub total: usize,
}

/// Raw synthesis output: base64 16-bit PCM plus its layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub data: String,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Fragment {
    /// Fragment in the provider's default layout (24 kHz mono).
    pub fn speech(data: String) -> Self {
        Self {
            data,
            sample_rate: defaults::FRAGMENT_SAMPLE_RATE,
            channels: defaults::FRAGMENT_CHANNELS,
        }
    }
}

/// Request to splice a named effect after a segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SfxMarker {
    #[serde(rename = "index")]
    pub segment_index: usize,
    #[serde(rename = "sfxType")]
    pub sfx_type: String,
}

/// Turns one text segment into speech.
#[async_trait]
pub trait FragmentGenerator: Send + Sync {
    /// Synthesize `request.text`.
    ///
    /// `Ok(None)` means the provider answered without audio. The signal is
    /// advisory here; callers race it anyway and drop the future on cancel.
    async fn generate(
        &self,
        request: &FragmentRequest<'_>,
        signal: &CancellationSignal,
    ) -> Result<Option<Fragment>>;

    fn name(&self) -> &str;
}

#[async_trait]
impl<T: FragmentGenerator> FragmentGenerator for Arc<T> {
    async fn generate(
        &self,
        request: &FragmentRequest<'_>,
        signal: &CancellationSignal,
    ) -> Result<Option<Fragment>> {
        (**self).generate(request, signal).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Picks places in a script where sound effects fit.
#[async_trait]
pub trait SfxAnalyzer: Send + Sync {
    /// Suggest markers for `segments`, choosing only from `effect_keys`.
    async fn analyze(
        &self,
        segments: &[String],
        effect_keys: &[String],
        signal: &CancellationSignal,
    ) -> Result<Vec<SfxMarker>>;
}

#[async_trait]
impl<T: SfxAnalyzer> SfxAnalyzer for Arc<T> {
    async fn analyze(
        &self,
        segments: &[String],
        effect_keys: &[String],
        signal: &CancellationSignal,
    ) -> Result<Vec<SfxMarker>> {
        (**self).analyze(segments, effect_keys, signal).await
    }
}
