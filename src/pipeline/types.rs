//! Data types for a generation run.

use crate::audio::wav::MAX_WAV_CHANNELS;
use crate::config::GenerationConfig;
use crate::defaults;
use crate::error::{NarrateError, Result};
use crate::provider::VoiceParams;

/// Optional layers on top of the narration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enhancements {
    /// Background track (URL or path), looped under the narration.
    pub background: Option<String>,
    /// Background gain; `None` uses the configured default.
    pub background_gain: Option<f32>,
    /// Ask the analyzer where sound effects fit.
    pub smart_effects: bool,
}

/// Everything needed for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationRequest {
    pub text: String,
    pub voice: VoiceParams,
    pub enhancements: Enhancements,
}

impl GenerationRequest {
    pub fn new(text: impl Into<String>, voice: VoiceParams) -> Self {
        Self {
            text: text.into(),
            voice,
            enhancements: Enhancements::default(),
        }
    }

    pub fn with_enhancements(mut self, enhancements: Enhancements) -> Self {
        self.enhancements = enhancements;
        self
    }
}

/// Progress through a run, reported once per segment start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationProgress {
    /// 1-based index of the segment being generated.
    pub current: usize,
    pub total: usize,
}

impl GenerationProgress {
    /// Completed share in [0, 1] counting the current segment as done.
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            return 1.0;
        }
        self.current as f32 / self.total as f32
    }
}

/// Layout and tuning for assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblySettings {
    /// Output channel count; fragments and effect clips are conformed to it.
    pub channels: u16,
    pub background_gain: f32,
    /// Size cap for segments when cloning.
    pub clone_chunk_chars: usize,
}

impl Default for AssemblySettings {
    fn default() -> Self {
        Self {
            channels: defaults::FRAGMENT_CHANNELS,
            background_gain: defaults::BACKGROUND_GAIN,
            clone_chunk_chars: defaults::CLONE_CHUNK_CHARS,
        }
    }
}

impl AssemblySettings {
    /// Reject layouts the run could not encode or segment.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_WAV_CHANNELS).contains(&self.channels) {
            return Err(NarrateError::ConfigInvalidValue {
                key: "generation.channels".to_string(),
                message: format!(
                    "must be between 1 and {MAX_WAV_CHANNELS}, got {}",
                    self.channels
                ),
            });
        }
        if self.clone_chunk_chars == 0 {
            return Err(NarrateError::ConfigInvalidValue {
                key: "generation.clone_chunk_chars".to_string(),
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

impl From<&GenerationConfig> for AssemblySettings {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            channels: config.channels,
            background_gain: config.background_gain,
            clone_chunk_chars: config.clone_chunk_chars,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_fraction() {
        assert_eq!(GenerationProgress { current: 1, total: 4 }.fraction(), 0.25);
        assert_eq!(GenerationProgress { current: 0, total: 0 }.fraction(), 1.0);
    }

    #[test]
    fn settings_follow_generation_config() {
        let config = GenerationConfig {
            channels: 2,
            background_gain: 0.5,
            ..GenerationConfig::default()
        };
        let settings = AssemblySettings::from(&config);
        assert_eq!(settings.channels, 2);
        assert_eq!(settings.background_gain, 0.5);
        assert_eq!(settings.clone_chunk_chars, 1000);
    }

    #[test]
    fn settings_validate_channel_range() {
        assert!(AssemblySettings::default().validate().is_ok());
        let stereo = AssemblySettings {
            channels: 2,
            ..AssemblySettings::default()
        };
        assert!(stereo.validate().is_ok());

        for channels in [0, 3, 6] {
            let settings = AssemblySettings {
                channels,
                ..AssemblySettings::default()
            };
            assert!(matches!(
                settings.validate(),
                Err(NarrateError::ConfigInvalidValue { ref key, .. }) if key == "generation.channels"
            ));
        }
    }

    #[test]
    fn request_defaults_to_no_enhancements() {
        let request = GenerationRequest::new("Hi.", VoiceParams::default());
        assert_eq!(request.enhancements, Enhancements::default());
        assert!(!request.enhancements.smart_effects);
    }
}
