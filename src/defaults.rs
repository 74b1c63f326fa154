//! Default configuration constants for narrate.
//!
//! Shared between the config types, the pipeline and the CLI so the values
//! only live in one place.

/// Sample rate of speech fragments returned by the provider, in Hz.
pub const FRAGMENT_SAMPLE_RATE: u32 = 24000;

/// Channel count of speech fragments returned by the provider.
pub const FRAGMENT_CHANNELS: u16 = 1;

/// Total attempts per remote call, including the first one.
pub const MAX_RETRIES: u32 = 2;

/// Backoff base in milliseconds; attempt `n` waits `2^n × base`.
pub const BACKOFF_BASE_MS: u64 = 1000;

/// Character cap per chunk when synthesizing with a cloned voice.
pub const CLONE_CHUNK_CHARS: usize = 1000;

/// Linear gain applied to the background track when mixing.
pub const BACKGROUND_GAIN: f32 = 0.2;

/// Default prebuilt voice.
pub const DEFAULT_VOICE: &str = "Kore";

/// Default spoken language passed to the provider prompt.
pub const DEFAULT_LANGUAGE: &str = "English";

/// Default pitch hint.
pub const DEFAULT_PITCH: &str = "normal";

/// Default speaking rate multiplier.
pub const DEFAULT_SPEED: f32 = 1.0;

/// Provider REST endpoint root.
pub const PROVIDER_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Model used for narrated speech.
pub const TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";

/// Model used for voice cloning from a reference sample.
pub const CLONE_MODEL: &str = "gemini-2.5-flash-native-audio-preview-09-2025";

/// Model used to place sound effects.
pub const ANALYSIS_MODEL: &str = "gemini-3-flash-preview";

/// Per-request timeout for provider calls, in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Built-in effect clips: key and source URL.
pub const EFFECT_CLIPS: &[(&str, &str)] = &[
    (
        "applause",
        "https://actions.google.com/sounds/v1/crowds/crowd_applause_clapping_only.ogg",
    ),
    (
        "bell",
        "https://actions.google.com/sounds/v1/alarms/beep_short.ogg",
    ),
    (
        "notification",
        "https://actions.google.com/sounds/v1/alarms/digital_watch_alarm_long.ogg",
    ),
    (
        "laugh",
        "https://actions.google.com/sounds/v1/human_voices/man_laughing_hard.ogg",
    ),
    (
        "ding",
        "https://actions.google.com/sounds/v1/alarms/alarm_clock_short.ogg",
    ),
    (
        "suspense",
        "https://actions.google.com/sounds/v1/impacts/crash_impact.ogg",
    ),
];
