//! Gemini `generateContent` REST client.
//!
//! Speech comes back as base64 PCM in
//! `candidates[0].content.parts[0].inlineData`.

use super::{Fragment, FragmentGenerator, FragmentRequest, SfxAnalyzer, SfxMarker, VoiceParams};
use crate::cancel::CancellationSignal;
use crate::config::ProviderConfig;
use crate::error::{NarrateError, Result};
use async_trait::async_trait;
use log::debug;
use serde_json::{Value, json};
use std::time::Duration;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Client for the Gemini text-to-speech and analysis models.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    tts_model: String,
    clone_model: String,
    analysis_model: String,
    fragment_rate: u32,
}

impl GeminiClient {
    /// Build a client from provider settings.
    ///
    /// # Errors
    /// `MissingCredential` when no API key is configured.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(NarrateError::MissingCredential)?
            .to_string();

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| NarrateError::Provider {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tts_model: config.tts_model.clone(),
            clone_model: config.clone_model.clone(),
            analysis_model: config.analysis_model.clone(),
            fragment_rate: crate::defaults::FRAGMENT_SAMPLE_RATE,
        })
    }

    /// Rate to assume when a response does not state one.
    pub fn with_fragment_rate(mut self, sample_rate: u32) -> Self {
        self.fragment_rate = sample_rate;
        self
    }

    /// Underlying HTTP client, shared with the clip loader.
    pub fn http_client(&self) -> reqwest::Client {
        self.http.clone()
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    async fn generate_content(&self, model: &str, body: &Value) -> Result<Value> {
        let response = self
            .http
            .post(self.endpoint(model))
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| NarrateError::Provider {
                message: format!("request failed: {e}"),
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| NarrateError::Provider {
            message: format!("failed to read response: {e}"),
        })?;

        if !status.is_success() {
            return Err(NarrateError::Provider {
                message: error_message(status.as_u16(), &text),
            });
        }

        serde_json::from_str(&text).map_err(|e| NarrateError::Provider {
            message: format!("invalid JSON response: {e}"),
        })
    }
}

/// Prompt for narration with a prebuilt voice.
pub fn narration_prompt(text: &str, voice: &VoiceParams) -> String {
    let style = voice
        .style
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!(" Tone: {s}."))
        .unwrap_or_default();
    format!(
        "Speak in {}, speed {}x, pitch {}.{} Text: {}",
        voice.language, voice.speed, voice.pitch, style, text
    )
}

/// Request body for narration with a prebuilt voice.
pub fn narration_body(text: &str, voice: &VoiceParams) -> Value {
    json!({
        "contents": [{ "parts": [{ "text": narration_prompt(text, voice) }] }],
        "generationConfig": {
            "responseModalities": ["AUDIO"],
            "speechConfig": {
                "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": voice.voice } }
            }
        }
    })
}

/// Request body for cloning the voice in `reference_base64`.
pub fn clone_body(text: &str, mime_type: &str, reference_base64: &str) -> Value {
    json!({
        "contents": [{
            "parts": [
                { "inlineData": { "mimeType": mime_type, "data": reference_base64 } },
                { "text": format!("Mimic this voice tone perfectly for this script: \"{text}\"") }
            ]
        }],
        "generationConfig": {
            "responseModalities": ["AUDIO"],
            "temperature": 0.4
        }
    })
}

/// Request body asking where sound effects fit.
pub fn analysis_body(segments: &[String], effect_keys: &[String]) -> Value {
    let numbered: Vec<String> = segments
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{i}: {s}"))
        .collect();
    let prompt = format!(
        "Analyze these sentences and identify sentence indices (starting from 0) that need sound effects.\n\
         Available: {}.\n\
         Sentences:\n{}\n\
         Return JSON array: [{{\"index\": 2, \"sfxType\": \"{}\"}}]",
        effect_keys.join(", "),
        numbered.join("\n"),
        effect_keys.first().map_or("applause", String::as_str),
    );
    json!({
        "contents": [{ "parts": [{ "text": prompt }] }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "index": { "type": "INTEGER" },
                        "sfxType": { "type": "STRING" }
                    },
                    "required": ["index", "sfxType"]
                }
            }
        }
    })
}

fn first_part(response: &Value) -> Option<&Value> {
    response
        .pointer("/candidates/0/content/parts")?
        .as_array()?
        .first()
}

/// Pull the inline audio out of a response, if any.
///
/// `default_rate` applies when the mime type carries no `rate=`.
pub fn extract_inline_audio(response: &Value, default_rate: u32) -> Option<Fragment> {
    let inline = response
        .pointer("/candidates/0/content/parts")?
        .as_array()?
        .iter()
        .find_map(|part| part.get("inlineData"))?;
    let data = inline.get("data")?.as_str()?;
    if data.is_empty() {
        return None;
    }

    let mut fragment = Fragment::speech(data.to_string());
    fragment.sample_rate = inline
        .get("mimeType")
        .and_then(Value::as_str)
        .and_then(sample_rate_from_mime)
        .unwrap_or(default_rate);
    Some(fragment)
}

/// Parse `rate=NNNN` from a mime type such as `audio/L16;codec=pcm;rate=24000`.
pub fn sample_rate_from_mime(mime: &str) -> Option<u32> {
    mime.split(';')
        .filter_map(|p| p.trim().strip_prefix("rate="))
        .find_map(|r| r.parse::<u32>().ok())
        .filter(|&r| r > 0)
}

/// Text of the first candidate part.
fn extract_text(response: &Value) -> Option<&str> {
    first_part(response)?.get("text")?.as_str()
}

/// Render a failed response as `HTTP {code}: {STATUS}: {message}`.
///
/// The provider's status and message are kept verbatim so error
/// classification can match on them.
pub fn error_message(code: u16, body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let error = parsed.as_ref().and_then(|v| v.get("error"));
    let status = error
        .and_then(|e| e.get("status"))
        .and_then(Value::as_str);
    let message = error
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str);

    match (status, message) {
        (Some(status), Some(message)) => format!("HTTP {code}: {status}: {message}"),
        (None, Some(message)) => format!("HTTP {code}: {message}"),
        _ => {
            let body = body.trim();
            if body.is_empty() {
                format!("HTTP {code}")
            } else {
                format!("HTTP {code}: {body}")
            }
        }
    }
}

#[async_trait]
impl FragmentGenerator for GeminiClient {
    async fn generate(
        &self,
        request: &FragmentRequest<'_>,
        _signal: &CancellationSignal,
    ) -> Result<Option<Fragment>> {
        let (model, body) = match &request.voice.reference {
            Some(reference) => (
                &self.clone_model,
                clone_body(request.text, &reference.mime_type, &reference.data_base64),
            ),
            None => (&self.tts_model, narration_body(request.text, request.voice)),
        };

        debug!(
            "Requesting segment {}/{} from {} ({} chars)",
            request.index + 1,
            request.total,
            model,
            request.text.chars().count()
        );
        let response = self.generate_content(model, &body).await?;
        Ok(extract_inline_audio(&response, self.fragment_rate))
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[async_trait]
impl SfxAnalyzer for GeminiClient {
    async fn analyze(
        &self,
        segments: &[String],
        effect_keys: &[String],
        _signal: &CancellationSignal,
    ) -> Result<Vec<SfxMarker>> {
        let body = analysis_body(segments, effect_keys);
        let response = self.generate_content(&self.analysis_model, &body).await?;
        let text = extract_text(&response).unwrap_or("[]");
        serde_json::from_str(text).map_err(|e| NarrateError::Provider {
            message: format!("invalid effect markers: {e}"),
        })
    }
}
