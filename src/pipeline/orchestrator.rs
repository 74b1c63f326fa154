//! Turns one generation request into one published WAV.

use crate::audio::buffer::AudioBuffer;
use crate::audio::clip::ClipLoader;
use crate::audio::mix::{concatenate, mix};
use crate::audio::pcm::decode_fragment;
use crate::audio::wav::encode_wav;
use crate::cancel::CancellationSignal;
use crate::config::Config;
use crate::error::{NarrateError, Result};
use crate::pipeline::resource::{AudioResource, ResourceRegistry};
use crate::pipeline::types::{AssemblySettings, GenerationProgress, GenerationRequest};
use crate::provider::{FragmentGenerator, FragmentRequest, SfxAnalyzer, SfxMarker};
use crate::retry::{RetryPolicy, call_with_retry};
use crate::segmenter::{SegmentMode, segment};
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Sequential generation pipeline.
///
/// Segments are generated strictly one after another. The orchestrator holds
/// no per-run state, so one instance can serve several runs.
pub struct Orchestrator {
    generator: Arc<dyn FragmentGenerator>,
    analyzer: Option<Arc<dyn SfxAnalyzer>>,
    clips: Arc<dyn ClipLoader>,
    effects: BTreeMap<String, String>,
    settings: AssemblySettings,
    retry: RetryPolicy,
    resources: ResourceRegistry,
}

impl Orchestrator {
    /// Orchestrator with default settings and the built-in effect clips.
    pub fn new(generator: Arc<dyn FragmentGenerator>, clips: Arc<dyn ClipLoader>) -> Self {
        Self {
            generator,
            analyzer: None,
            clips,
            effects: Config::default().effect_clips(),
            settings: AssemblySettings::default(),
            retry: RetryPolicy::default(),
            resources: ResourceRegistry::new(),
        }
    }

    /// Apply generation settings and effect clips from `config`.
    pub fn with_config(self, config: &Config) -> Self {
        self.with_settings(AssemblySettings::from(&config.generation))
            .with_retry_policy(RetryPolicy::from_config(&config.generation))
            .with_effects(config.effect_clips())
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn SfxAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    /// Replace the effect table (key → clip source).
    pub fn with_effects(mut self, effects: BTreeMap<String, String>) -> Self {
        self.effects = effects;
        self
    }

    /// Replace the assembly settings. They are validated when a run starts.
    pub fn with_settings(mut self, settings: AssemblySettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Publish into a shared registry instead of a private one.
    pub fn with_resources(mut self, resources: ResourceRegistry) -> Self {
        self.resources = resources;
        self
    }

    pub fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    pub fn effect_keys(&self) -> Vec<String> {
        self.effects.keys().cloned().collect()
    }

    /// Segments a request would be split into.
    pub fn segments_for(&self, request: &GenerationRequest) -> Vec<String> {
        let mode = if request.voice.is_cloning() {
            SegmentMode::SizeCapped {
                max_chars: self.settings.clone_chunk_chars,
            }
        } else {
            SegmentMode::Sentence
        };
        segment(&request.text, mode)
    }

    /// Generate, encode and publish.
    ///
    /// `on_progress` fires once at the start of every segment. No resource
    /// is published unless the whole run succeeds.
    pub async fn run<F>(
        &self,
        request: &GenerationRequest,
        signal: Option<&CancellationSignal>,
        on_progress: F,
    ) -> Result<AudioResource>
    where
        F: FnMut(GenerationProgress),
    {
        let local = CancellationSignal::new();
        let signal = signal.unwrap_or(&local);

        let buffer = self.assemble(request, Some(signal), on_progress).await?;
        if signal.is_cancelled() {
            return Err(NarrateError::Aborted);
        }

        let bytes = encode_wav(&buffer)?;
        let resource = self.resources.publish(bytes, buffer.duration());
        info!(
            "Published {} ({:.2}s, {} bytes)",
            resource.url(),
            resource.duration().as_secs_f64(),
            resource.bytes().len()
        );
        Ok(resource)
    }

    /// Generate and mix, stopping short of encoding.
    pub async fn assemble<F>(
        &self,
        request: &GenerationRequest,
        signal: Option<&CancellationSignal>,
        mut on_progress: F,
    ) -> Result<AudioBuffer>
    where
        F: FnMut(GenerationProgress),
    {
        self.settings.validate()?;
        let local = CancellationSignal::new();
        let signal = signal.unwrap_or(&local);

        let segments = self.segments_for(request);
        let total = segments.len();
        info!(
            "Generating {} segment(s) with {} (voice {})",
            total,
            self.generator.name(),
            request.voice.voice
        );

        let markers = if request.enhancements.smart_effects {
            self.markers(&segments, signal).await?
        } else {
            Vec::new()
        };

        let mut parts: Vec<AudioBuffer> = Vec::with_capacity(total + markers.len());
        let mut clip_cache: HashMap<String, AudioBuffer> = HashMap::new();

        for (index, text) in segments.iter().enumerate() {
            if signal.is_cancelled() {
                info!("Cancelled before segment {}/{}", index + 1, total);
                return Err(NarrateError::Aborted);
            }
            on_progress(GenerationProgress {
                current: index + 1,
                total,
            });

            let fragment_request = FragmentRequest {
                text,
                voice: &request.voice,
                index,
                total,
            };
            let fragment = call_with_retry(&self.retry, signal, |attempt| {
                debug!("Segment {}/{} attempt {}", index + 1, total, attempt);
                self.generator.generate(&fragment_request, signal)
            })
            .await?;

            match fragment {
                Some(fragment) => {
                    match decode_fragment(&fragment.data, fragment.sample_rate, fragment.channels) {
                        Ok(buffer) => {
                            parts.push(buffer.with_channel_count(self.settings.channels));
                        }
                        Err(e) => warn!("Skipping segment {}/{}: {}", index + 1, total, e),
                    }
                }
                None => warn!("Segment {}/{} returned no audio, skipping", index + 1, total),
            }

            if let Some(marker) = markers.iter().find(|m| m.segment_index == index)
                && let Some(effect) = self
                    .load_effect(&marker.sfx_type, signal, &mut clip_cache)
                    .await?
            {
                parts.push(effect);
            }
        }

        if parts.is_empty() {
            return Err(NarrateError::GenerationFailed {
                message: format!("no audio was produced for {total} segment(s)"),
            });
        }

        let narration = concatenate(parts)?;

        let Some(source) = request.enhancements.background.as_deref() else {
            return Ok(narration);
        };
        let gain = request
            .enhancements
            .background_gain
            .unwrap_or(self.settings.background_gain);

        match self.load_clip(source, signal).await? {
            Some(background) => {
                debug!("Mixing background {source} at gain {gain}");
                Ok(mix(&narration, &background, gain))
            }
            None => Ok(narration),
        }
    }

    /// Effect markers for `segments`; analysis failures yield none.
    async fn markers(
        &self,
        segments: &[String],
        signal: &CancellationSignal,
    ) -> Result<Vec<SfxMarker>> {
        let Some(analyzer) = &self.analyzer else {
            debug!("Smart effects requested but no analyzer configured");
            return Ok(Vec::new());
        };
        let keys = self.effect_keys();

        let outcome = tokio::select! {
            biased;
            _ = signal.cancelled() => return Err(NarrateError::Aborted),
            outcome = analyzer.analyze(segments, &keys, signal) => outcome,
        };

        match outcome {
            Ok(markers) => {
                debug!("Analyzer placed {} effect(s)", markers.len());
                Ok(markers)
            }
            Err(e) => {
                warn!("Effect analysis skipped: {e}");
                Ok(Vec::new())
            }
        }
    }

    /// Load an effect clip by key, conformed to the output layout.
    ///
    /// Unknown keys and load failures yield `None`; only cancellation is an
    /// error.
    async fn load_effect(
        &self,
        key: &str,
        signal: &CancellationSignal,
        cache: &mut HashMap<String, AudioBuffer>,
    ) -> Result<Option<AudioBuffer>> {
        if let Some(clip) = cache.get(key) {
            return Ok(Some(clip.clone()));
        }
        let Some(source) = self.effects.get(key) else {
            debug!("Ignoring unknown effect {key:?}");
            return Ok(None);
        };

        let Some(clip) = self.load_clip(source, signal).await? else {
            return Ok(None);
        };
        let clip = clip.with_channel_count(self.settings.channels);
        cache.insert(key.to_string(), clip.clone());
        Ok(Some(clip))
    }

    /// Fetch and decode a clip, logging and swallowing failures.
    async fn load_clip(
        &self,
        source: &str,
        signal: &CancellationSignal,
    ) -> Result<Option<AudioBuffer>> {
        let outcome = tokio::select! {
            biased;
            _ = signal.cancelled() => return Err(NarrateError::Aborted),
            outcome = self.clips.load(source) => outcome,
        };
        match outcome {
            Ok(clip) => Ok(Some(clip)),
            Err(e) => {
                warn!("Skipping clip {source}: {e}");
                Ok(None)
            }
        }
    }
}
