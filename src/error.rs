//! Error types for narrate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NarrateError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Run outcomes
    #[error("Generation aborted")]
    Aborted,

    #[error("Provider quota exceeded: {message}")]
    QuotaExceeded { message: String },

    #[error("Provider rejected the credential: {message}")]
    InvalidCredential { message: String },

    #[error("No API key configured (set NARRATE_API_KEY or provider.api_key)")]
    MissingCredential,

    #[error("Generation failed: {message}")]
    GenerationFailed { message: String },

    // Remote provider errors (unclassified, eligible for retry)
    #[error("Provider error: {message}")]
    Provider { message: String },

    // Audio errors
    #[error("Malformed audio: {message}")]
    MalformedAudio { message: String },

    #[error("Channel count mismatch: expected {expected}, got {actual}")]
    ChannelMismatch { expected: u16, actual: u16 },

    #[error("Failed to load clip {source_ref}: {message}")]
    ClipLoad { source_ref: String, message: String },

    #[error("Failed to decode clip: {message}")]
    ClipDecode { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl NarrateError {
    /// True for a cooperative stop requested by the caller.
    pub fn is_aborted(&self) -> bool {
        matches!(self, NarrateError::Aborted)
    }

    /// True for errors that make every further request pointless.
    pub fn is_fatal_to_session(&self) -> bool {
        matches!(
            self,
            NarrateError::QuotaExceeded { .. }
                | NarrateError::InvalidCredential { .. }
                | NarrateError::MissingCredential
                | NarrateError::Aborted
        )
    }

    /// Message suitable for showing to an end user.
    ///
    /// Aborted runs get a neutral wording; they are not failures.
    pub fn user_message(&self) -> String {
        match self {
            NarrateError::Aborted => "Generation stopped.".to_string(),
            NarrateError::QuotaExceeded { .. } => {
                "Usage limit reached. Try again later or use a paid API key.".to_string()
            }
            NarrateError::InvalidCredential { .. } => {
                "The API key was rejected. Check the key and select it again.".to_string()
            }
            NarrateError::MissingCredential => {
                "No API key configured. Set NARRATE_API_KEY or provider.api_key.".to_string()
            }
            NarrateError::GenerationFailed { .. } | NarrateError::Provider { .. } => {
                "Could not generate audio. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, NarrateError>;
