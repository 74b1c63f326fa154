//! Raw PCM fragment decoding.
//!
//! Speech fragments arrive as base64-encoded interleaved signed 16-bit
//! little-endian samples with no header.

use crate::audio::buffer::AudioBuffer;
use crate::error::{NarrateError, Result};
use base64::{Engine, engine::general_purpose};

/// Decode a base64 payload into raw bytes.
pub fn decode_base64(payload: &str) -> Result<Vec<u8>> {
    general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| NarrateError::MalformedAudio {
            message: format!("invalid base64 payload: {e}"),
        })
}

/// Encode raw bytes as base64.
pub fn encode_base64(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

/// Decode interleaved 16-bit PCM into a float buffer.
///
/// Each sample becomes `value / 32768.0`. A byte count that is not a whole
/// number of frames is rejected rather than truncated.
pub fn decode_pcm16(bytes: &[u8], sample_rate: u32, channels: u16) -> Result<AudioBuffer> {
    if channels == 0 {
        return Err(NarrateError::MalformedAudio {
            message: "channel count must be positive".to_string(),
        });
    }
    let frame_bytes = 2 * usize::from(channels);
    if bytes.len() % frame_bytes != 0 {
        return Err(NarrateError::MalformedAudio {
            message: format!(
                "{} bytes is not a whole number of {}-byte frames",
                bytes.len(),
                frame_bytes
            ),
        });
    }

    let samples: Vec<f32> = bytes
        .chunks_exact(2)
        .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / 32768.0)
        .collect();

    AudioBuffer::from_interleaved(&samples, channels, sample_rate)
}

/// Decode a base64 PCM fragment in one step.
pub fn decode_fragment(payload: &str, sample_rate: u32, channels: u16) -> Result<AudioBuffer> {
    let bytes = decode_base64(payload)?;
    decode_pcm16(&bytes, sample_rate, channels)
}
