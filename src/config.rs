use crate::audio::wav::MAX_WAV_CHANNELS;
use crate::defaults;
use crate::error::{NarrateError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub generation: GenerationConfig,
    /// Extra or overriding effect clips, keyed by effect name.
    pub effects: BTreeMap<String, String>,
}

/// Remote provider configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub base_url: String,
    pub tts_model: String,
    pub clone_model: String,
    pub analysis_model: String,
    pub request_timeout_secs: u64,
}

/// Pipeline and assembly configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub clone_chunk_chars: usize,
    pub background_gain: f32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: defaults::PROVIDER_BASE_URL.to_string(),
            tts_model: defaults::TTS_MODEL.to_string(),
            clone_model: defaults::CLONE_MODEL.to_string(),
            analysis_model: defaults::ANALYSIS_MODEL.to_string(),
            request_timeout_secs: defaults::REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::FRAGMENT_SAMPLE_RATE,
            channels: defaults::FRAGMENT_CHANNELS,
            max_retries: defaults::MAX_RETRIES,
            backoff_base_ms: defaults::BACKOFF_BASE_MS,
            clone_chunk_chars: defaults::CLONE_CHUNK_CHARS,
            background_gain: defaults::BACKGROUND_GAIN,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                NarrateError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                NarrateError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(NarrateError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            other => other,
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - NARRATE_API_KEY (or GEMINI_API_KEY) → provider.api_key
    /// - NARRATE_TTS_MODEL → provider.tts_model
    /// - NARRATE_BASE_URL → provider.base_url
    pub fn with_env_overrides(mut self) -> Self {
        let key = env_non_empty("NARRATE_API_KEY").or_else(|| env_non_empty("GEMINI_API_KEY"));
        if let Some(key) = key {
            self.provider.api_key = Some(key);
        }

        if let Some(model) = env_non_empty("NARRATE_TTS_MODEL") {
            self.provider.tts_model = model;
        }

        if let Some(url) = env_non_empty("NARRATE_BASE_URL") {
            self.provider.base_url = url;
        }

        self
    }

    /// Check values that would make a run fail later.
    pub fn validate(&self) -> Result<()> {
        let invalid = |key: &str, message: &str| NarrateError::ConfigInvalidValue {
            key: key.to_string(),
            message: message.to_string(),
        };

        let generation = &self.generation;
        if generation.sample_rate == 0 {
            return Err(invalid("generation.sample_rate", "must be positive"));
        }
        if !(1..=MAX_WAV_CHANNELS).contains(&generation.channels) {
            return Err(invalid("generation.channels", "must be 1 or 2"));
        }
        if generation.max_retries == 0 {
            return Err(invalid("generation.max_retries", "must be at least 1"));
        }
        if generation.clone_chunk_chars == 0 {
            return Err(invalid("generation.clone_chunk_chars", "must be positive"));
        }
        if !generation.background_gain.is_finite() || generation.background_gain < 0.0 {
            return Err(invalid(
                "generation.background_gain",
                "must be a non-negative number",
            ));
        }
        if self.provider.request_timeout_secs == 0 {
            return Err(invalid("provider.request_timeout_secs", "must be positive"));
        }
        if !self.provider.base_url.starts_with("http://")
            && !self.provider.base_url.starts_with("https://")
        {
            return Err(invalid("provider.base_url", "must be an http(s) URL"));
        }
        if let Some((name, _)) = self.effects.iter().find(|(_, src)| src.trim().is_empty()) {
            return Err(invalid(&format!("effects.{name}"), "source must not be empty"));
        }
        Ok(())
    }

    /// Built-in effect clips overlaid with the configured ones.
    pub fn effect_clips(&self) -> BTreeMap<String, String> {
        let mut clips: BTreeMap<String, String> = defaults::EFFECT_CLIPS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        clips.extend(self.effects.clone());
        clips
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/narrate/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("narrate")
            .join("config.toml")
    }

    /// Render one value addressed by a dotted key such as `generation.sample_rate`.
    ///
    /// A section key renders the whole section as TOML.
    pub fn get_value_by_path(&self, key: &str) -> Result<String> {
        let root = self.to_toml_value()?;
        match lookup(&root, key) {
            Some(toml::Value::String(s)) => Ok(s.clone()),
            Some(toml::Value::Table(table)) => toml::to_string_pretty(table).map_err(|e| {
                NarrateError::Other(format!("Failed to render {key}: {e}"))
            }),
            Some(value) => Ok(value.to_string()),
            None if key == "provider.api_key" => Ok(String::new()),
            None => Err(unknown_key(key)),
        }
    }

    /// Write one dotted key into the file at `path`, keeping everything else.
    ///
    /// The value is parsed according to the type of the existing setting;
    /// the resulting file must still load and validate.
    pub fn set_value_by_path(path: &Path, key: &str, value: &str) -> Result<()> {
        let mut table: toml::Table = match fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => toml::Table::new(),
            Err(e) => return Err(e.into()),
        };

        let template = Self::default().to_toml_value()?;
        let parsed = match lookup(&template, key) {
            Some(toml::Value::Table(_)) => {
                return Err(NarrateError::ConfigInvalidValue {
                    key: key.to_string(),
                    message: "is a section, set one of its keys instead".to_string(),
                });
            }
            Some(existing) => parse_like(existing, key, value)?,
            None if key == "provider.api_key" || is_effect_key(key) => {
                toml::Value::String(value.to_string())
            }
            None => return Err(unknown_key(key)),
        };

        insert(&mut table, key, parsed)?;

        let rendered = toml::to_string_pretty(&table)
            .map_err(|e| NarrateError::Other(format!("Failed to render config: {e}")))?;
        let config: Config = toml::from_str(&rendered)?;
        config.validate()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, rendered)?;
        Ok(())
    }

    fn to_toml_value(&self) -> Result<toml::Value> {
        toml::Value::try_from(self)
            .map_err(|e| NarrateError::Other(format!("Failed to serialize config: {e}")))
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn unknown_key(key: &str) -> NarrateError {
    NarrateError::ConfigInvalidValue {
        key: key.to_string(),
        message: "unknown configuration key".to_string(),
    }
}

fn is_effect_key(key: &str) -> bool {
    key.strip_prefix("effects.")
        .is_some_and(|name| !name.is_empty() && !name.contains('.'))
}

fn lookup<'a>(root: &'a toml::Value, key: &str) -> Option<&'a toml::Value> {
    key.split('.')
        .try_fold(root, |node, part| node.as_table()?.get(part))
}

fn insert(table: &mut toml::Table, key: &str, value: toml::Value) -> Result<()> {
    let mut parts: Vec<&str> = key.split('.').collect();
    let Some(leaf) = parts.pop() else {
        return Err(unknown_key(key));
    };

    let mut node = table;
    for part in parts {
        let entry = node
            .entry(part.to_string())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        node = entry.as_table_mut().ok_or_else(|| NarrateError::ConfigInvalidValue {
            key: key.to_string(),
            message: format!("{part} is not a section"),
        })?;
    }
    node.insert(leaf.to_string(), value);
    Ok(())
}

fn parse_like(existing: &toml::Value, key: &str, raw: &str) -> Result<toml::Value> {
    let bad = |expected: &str| NarrateError::ConfigInvalidValue {
        key: key.to_string(),
        message: format!("expected {expected}, got {raw:?}"),
    };
    Ok(match existing {
        toml::Value::Integer(_) => toml::Value::Integer(raw.parse().map_err(|_| bad("an integer"))?),
        toml::Value::Float(_) => toml::Value::Float(raw.parse().map_err(|_| bad("a number"))?),
        toml::Value::Boolean(_) => toml::Value::Boolean(raw.parse().map_err(|_| bad("true or false"))?),
        _ => toml::Value::String(raw.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // SAFETY: These helpers are only used in tests with ENV_LOCK held,
    // ensuring no concurrent access to environment variables.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn clear_narrate_env() {
        remove_env("NARRATE_API_KEY");
        remove_env("GEMINI_API_KEY");
        remove_env("NARRATE_TTS_MODEL");
        remove_env("NARRATE_BASE_URL");
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();

        assert_eq!(config.provider.api_key, None);
        assert_eq!(config.provider.tts_model, "gemini-2.5-flash-preview-tts");
        assert_eq!(config.provider.request_timeout_secs, 120);

        assert_eq!(config.generation.sample_rate, 24000);
        assert_eq!(config.generation.channels, 1);
        assert_eq!(config.generation.max_retries, 2);
        assert_eq!(config.generation.backoff_base_ms, 1000);
        assert_eq!(config.generation.clone_chunk_chars, 1000);
        assert_eq!(config.generation.background_gain, 0.2);

        assert!(config.effects.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let toml_content = r#"
            [provider]
            api_key = "secret"
            base_url = "http://localhost:8080/v1beta"
            request_timeout_secs = 30

            [generation]
            channels = 2
            max_retries = 4
            background_gain = 0.35

            [effects]
            gong = "/usr/share/sounds/gong.ogg"
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.provider.api_key.as_deref(), Some("secret"));
        assert_eq!(config.provider.base_url, "http://localhost:8080/v1beta");
        assert_eq!(config.provider.request_timeout_secs, 30);
        assert_eq!(config.generation.channels, 2);
        assert_eq!(config.generation.max_retries, 4);
        assert_eq!(config.generation.background_gain, 0.35);
        assert_eq!(config.generation.sample_rate, 24000);
        assert_eq!(
            config.effects.get("gong").map(String::as_str),
            Some("/usr/share/sounds/gong.ogg")
        );
    }

    #[test]
    fn test_custom_effects_extend_builtins() {
        let mut config = Config::default();
        config
            .effects
            .insert("gong".to_string(), "gong.ogg".to_string());
        config
            .effects
            .insert("bell".to_string(), "my-bell.wav".to_string());

        let clips = config.effect_clips();
        assert_eq!(clips.get("gong").map(String::as_str), Some("gong.ogg"));
        assert_eq!(clips.get("bell").map(String::as_str), Some("my-bell.wav"));
        assert!(clips.contains_key("applause"));
        assert_eq!(clips.len(), defaults::EFFECT_CLIPS.len() + 1);
    }

    #[test]
    fn test_env_override_api_key_prefers_narrate() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_narrate_env();

        set_env("GEMINI_API_KEY", "fallback");
        let config = Config::default().with_env_overrides();
        assert_eq!(config.provider.api_key.as_deref(), Some("fallback"));

        set_env("NARRATE_API_KEY", "primary");
        let config = Config::default().with_env_overrides();
        assert_eq!(config.provider.api_key.as_deref(), Some("primary"));

        clear_narrate_env();
    }

    #[test]
    fn test_env_override_model_and_url() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_narrate_env();

        set_env("NARRATE_TTS_MODEL", "tts-next");
        set_env("NARRATE_BASE_URL", "http://127.0.0.1:1/v1beta");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.provider.tts_model, "tts-next");
        assert_eq!(config.provider.base_url, "http://127.0.0.1:1/v1beta");

        clear_narrate_env();
    }

    #[test]
    fn test_env_override_empty_string_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_narrate_env();

        set_env("NARRATE_TTS_MODEL", "");
        set_env("NARRATE_API_KEY", "");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.provider.tts_model, defaults::TTS_MODEL);
        assert_eq!(config.provider.api_key, None);

        clear_narrate_env();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[generation\nsample_rate = \"broken")
            .unwrap();

        assert!(Config::load(temp_file.path()).is_err());
        assert!(Config::load_or_default(temp_file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_returns_default_for_missing_file() {
        let missing_path = Path::new("/tmp/nonexistent_narrate_config_12345.toml");
        assert!(matches!(
            Config::load(missing_path),
            Err(NarrateError::ConfigFileNotFound { .. })
        ));
        assert_eq!(Config::load_or_default(missing_path).unwrap(), Config::default());
    }

    #[test]
    fn test_default_path_ends_in_narrate_config() {
        let path = Config::default_path();
        assert!(path.ends_with("narrate/config.toml"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.generation.channels = 3;
        assert!(matches!(
            config.validate(),
            Err(NarrateError::ConfigInvalidValue { ref key, .. }) if key == "generation.channels"
        ));

        let mut config = Config::default();
        config.generation.background_gain = -1.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.generation.max_retries = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.provider.base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.effects.insert("blank".to_string(), " ".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_get_value_by_path() {
        let config = Config::default();
        assert_eq!(config.get_value_by_path("generation.sample_rate").unwrap(), "24000");
        assert_eq!(
            config.get_value_by_path("provider.tts_model").unwrap(),
            "gemini-2.5-flash-preview-tts"
        );
        assert_eq!(config.get_value_by_path("provider.api_key").unwrap(), "");
        assert!(
            config
                .get_value_by_path("generation")
                .unwrap()
                .contains("max_retries = 2")
        );
        assert!(config.get_value_by_path("generation.nope").is_err());
    }

    #[test]
    fn test_set_value_by_path_creates_and_updates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");

        Config::set_value_by_path(&path, "generation.max_retries", "5").unwrap();
        Config::set_value_by_path(&path, "generation.background_gain", "0.5").unwrap();
        Config::set_value_by_path(&path, "provider.api_key", "abc").unwrap();
        Config::set_value_by_path(&path, "effects.gong", "gong.ogg").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.generation.max_retries, 5);
        assert_eq!(config.generation.background_gain, 0.5);
        assert_eq!(config.provider.api_key.as_deref(), Some("abc"));
        assert_eq!(config.effects.get("gong").map(String::as_str), Some("gong.ogg"));
        assert_eq!(config.generation.sample_rate, 24000);
    }

    #[test]
    fn test_set_value_by_path_rejects_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        assert!(Config::set_value_by_path(&path, "generation.max_retries", "many").is_err());
        assert!(Config::set_value_by_path(&path, "generation.unknown", "1").is_err());
        assert!(Config::set_value_by_path(&path, "generation", "1").is_err());
        assert!(Config::set_value_by_path(&path, "generation.channels", "6").is_err());
        assert!(!path.exists());
    }
}
