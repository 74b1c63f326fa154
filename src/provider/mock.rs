//! In-process stand-ins for remote providers.
//!
//! Used by the test suites. They never touch the network.

use super::{Fragment, FragmentGenerator, FragmentRequest, SfxAnalyzer, SfxMarker};
use crate::audio::pcm::encode_base64;
use crate::cancel::CancellationSignal;
use crate::defaults::FRAGMENT_SAMPLE_RATE;
use crate::error::{NarrateError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Base64 PCM of `seconds` of mono audio at the fragment rate, every
/// sample set to `value`.
pub fn constant_fragment(seconds: f64, value: i16) -> Fragment {
    let frames = (seconds * f64::from(FRAGMENT_SAMPLE_RATE)).round() as usize;
    let bytes: Vec<u8> = std::iter::repeat_n(value.to_le_bytes(), frames)
        .flatten()
        .collect();
    Fragment::speech(encode_base64(&bytes))
}

/// `seconds` of silence in the fragment layout.
pub fn silent_fragment(seconds: f64) -> Fragment {
    constant_fragment(seconds, 0)
}

/// What a [`ScriptedGenerator`] does on one call.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Audio(Fragment),
    NoAudio,
    /// Fail with a `Provider` error carrying this message.
    Fail(String),
}

/// Generator that replays a fixed script, one step per call.
///
/// Once the script runs out every call uses the fallback step.
#[derive(Debug)]
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<ScriptStep>>,
    fallback: ScriptStep,
    latency: Option<Duration>,
    calls: AtomicUsize,
    texts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    /// Generator whose every call returns `fallback`.
    pub fn new(fallback: ScriptStep) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            latency: None,
            calls: AtomicUsize::new(0),
            texts: Mutex::new(Vec::new()),
        }
    }

    /// Generator returning `seconds` of silence on every call.
    pub fn silent(seconds: f64) -> Self {
        Self::new(ScriptStep::Audio(silent_fragment(seconds)))
    }

    /// Queue a step ahead of the fallback.
    pub fn then(self, step: ScriptStep) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(step);
        }
        self
    }

    /// Sleep this long inside every call before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Segment texts received, in call order.
    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().map(|t| t.clone()).unwrap_or_default()
    }

    fn next_step(&self) -> ScriptStep {
        self.script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front())
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl FragmentGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        request: &FragmentRequest<'_>,
        _signal: &CancellationSignal,
    ) -> Result<Option<Fragment>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut texts) = self.texts.lock() {
            texts.push(request.text.to_string());
        }
        let step = self.next_step();

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match step {
            ScriptStep::Audio(fragment) => Ok(Some(fragment)),
            ScriptStep::NoAudio => Ok(None),
            ScriptStep::Fail(message) => Err(NarrateError::Provider { message }),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Analyzer returning a fixed marker list, or a fixed failure.
#[derive(Debug, Clone, Default)]
pub struct StaticAnalyzer {
    markers: Vec<SfxMarker>,
    failure: Option<String>,
}

impl StaticAnalyzer {
    pub fn new(markers: Vec<SfxMarker>) -> Self {
        Self {
            markers,
            failure: None,
        }
    }

    /// Place effect `sfx_type` after segment `segment_index`.
    pub fn with_marker(mut self, segment_index: usize, sfx_type: &str) -> Self {
        self.markers.push(SfxMarker {
            segment_index,
            sfx_type: sfx_type.to_string(),
        });
        self
    }

    pub fn with_failure(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }
}

#[async_trait]
impl SfxAnalyzer for StaticAnalyzer {
    async fn analyze(
        &self,
        _segments: &[String],
        _effect_keys: &[String],
        _signal: &CancellationSignal,
    ) -> Result<Vec<SfxMarker>> {
        match &self.failure {
            Some(message) => Err(NarrateError::Provider {
                message: message.clone(),
            }),
            None => Ok(self.markers.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::pcm::decode_fragment;
    use crate::provider::VoiceParams;

    fn request<'a>(text: &'a str, voice: &'a VoiceParams) -> FragmentRequest<'a> {
        FragmentRequest {
            text,
            voice,
            index: 0,
            total: 1,
        }
    }

    #[test]
    fn silent_fragment_has_expected_length() {
        let fragment = silent_fragment(1.0);
        let buffer = decode_fragment(&fragment.data, fragment.sample_rate, fragment.channels)
            .unwrap();
        assert_eq!(buffer.frame_count(), 24000);
        assert!(buffer.channel(0).unwrap().iter().all(|&s| s == 0.0));
    }

    #[tokio::test]
    async fn script_plays_in_order_then_falls_back() {
        let generator = ScriptedGenerator::silent(0.01)
            .then(ScriptStep::Fail("first".to_string()))
            .then(ScriptStep::NoAudio);
        let voice = VoiceParams::default();
        let signal = CancellationSignal::new();

        assert!(generator.generate(&request("a", &voice), &signal).await.is_err());
        assert!(
            generator
                .generate(&request("b", &voice), &signal)
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            generator
                .generate(&request("c", &voice), &signal)
                .await
                .unwrap()
                .is_some()
        );

        assert_eq!(generator.calls(), 3);
        assert_eq!(generator.texts(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn static_analyzer_returns_markers_or_failure() {
        let signal = CancellationSignal::new();
        let analyzer = StaticAnalyzer::default().with_marker(1, "bell");
        let markers = analyzer.analyze(&[], &[], &signal).await.unwrap();
        assert_eq!(markers[0].segment_index, 1);

        let failing = StaticAnalyzer::default().with_failure("offline");
        assert!(failing.analyze(&[], &[], &signal).await.is_err());
    }
}
