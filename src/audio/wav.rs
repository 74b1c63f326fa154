//! WAV serialization of float buffers.

use crate::audio::buffer::AudioBuffer;
use crate::error::{NarrateError, Result};
use std::io::Cursor;

/// Size of the canonical RIFF/WAVE header written for mono and stereo PCM.
pub const WAV_HEADER_LEN: usize = 44;

/// MIME type of encoded output.
pub const WAV_MIME: &str = "audio/wav";

/// Widest layout that still gets the canonical PCM header. Beyond stereo
/// the writer would switch to WAVE_FORMAT_EXTENSIBLE.
pub const MAX_WAV_CHANNELS: u16 = 2;

/// Convert one float sample to 16-bit PCM.
///
/// Clamps to [-1, 1] first; negative values scale by 32768 and the rest by
/// 32767 so both ends of the i16 range are reachable.
pub fn to_pcm16(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// Encode a buffer as 16-bit PCM WAV.
///
/// Output is a 44-byte header followed by interleaved samples. This is the
/// only place where out-of-range samples from mixing get clamped.
///
/// # Errors
/// `MalformedAudio` for more than [`MAX_WAV_CHANNELS`] channels.
pub fn encode_wav(buffer: &AudioBuffer) -> Result<Vec<u8>> {
    let channels = buffer.number_of_channels();
    if channels > MAX_WAV_CHANNELS {
        return Err(NarrateError::MalformedAudio {
            message: format!(
                "WAV output supports at most {MAX_WAV_CHANNELS} channels, got {channels}"
            ),
        });
    }
    let spec = hound::WavSpec {
        channels,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let data_len = buffer.frame_count() * usize::from(channels) * 2;
    let mut cursor = Cursor::new(Vec::with_capacity(WAV_HEADER_LEN + data_len));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| NarrateError::Other(format!("Failed to start WAV stream: {e}")))?;

        for sample in buffer.to_interleaved() {
            writer
                .write_sample(to_pcm16(sample))
                .map_err(|e| NarrateError::Other(format!("Failed to write WAV sample: {e}")))?;
        }

        writer
            .finalize()
            .map_err(|e| NarrateError::Other(format!("Failed to finalize WAV stream: {e}")))?;
    }

    Ok(cursor.into_inner())
}
