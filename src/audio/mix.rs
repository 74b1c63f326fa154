//! Buffer algebra: splicing and overlaying audio.
//!
//! All functions are pure. None of them clip; the WAV encoder clamps.

use crate::audio::buffer::AudioBuffer;
use crate::defaults::FRAGMENT_SAMPLE_RATE;
use crate::error::{NarrateError, Result};

/// Where an effect clip goes relative to the main buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EffectPosition {
    #[default]
    Start,
    End,
}

/// Splice buffers end to end.
///
/// The result takes its rate and channel count from the first buffer; rates
/// are not reconciled. An empty list yields one silent mono frame, a single
/// buffer is handed back as-is.
///
/// # Errors
/// `ChannelMismatch` if any buffer's channel count differs from the first.
pub fn concatenate(mut buffers: Vec<AudioBuffer>) -> Result<AudioBuffer> {
    match buffers.len() {
        0 => return Ok(AudioBuffer::silent(1, 1, FRAGMENT_SAMPLE_RATE)),
        1 => {
            if let Some(only) = buffers.pop() {
                return Ok(only);
            }
        }
        _ => {}
    }

    let channels = buffers[0].number_of_channels();
    let sample_rate = buffers[0].sample_rate();
    if let Some(bad) = buffers
        .iter()
        .find(|b| b.number_of_channels() != channels)
    {
        return Err(NarrateError::ChannelMismatch {
            expected: channels,
            actual: bad.number_of_channels(),
        });
    }

    let total: usize = buffers.iter().map(AudioBuffer::frame_count).sum();
    let mut out: Vec<Vec<f32>> = (0..channels).map(|_| Vec::with_capacity(total)).collect();
    for buffer in buffers {
        for (dst, src) in out.iter_mut().zip(buffer.into_channels()) {
            dst.extend_from_slice(&src);
        }
    }

    AudioBuffer::from_channels(sample_rate, out)
}

/// Overlay `background` onto `main` at `gain`.
///
/// The output has `main`'s length, channels and rate. A shorter background
/// loops, a longer one is cut. An empty background leaves `main` unchanged.
pub fn mix(main: &AudioBuffer, background: &AudioBuffer, gain: f32) -> AudioBuffer {
    let bg_len = background.frame_count();
    if bg_len == 0 {
        return main.clone();
    }
    let bg_channels: Vec<&[f32]> = background.channels().collect();

    let channels = main
        .channels()
        .enumerate()
        .map(|(c, samples)| {
            let bg = bg_channels[c % bg_channels.len()];
            samples
                .iter()
                .enumerate()
                .map(|(i, &s)| s + bg[i % bg_len] * gain)
                .collect()
        })
        .collect();

    // Same shape as `main`, which already passed validation.
    AudioBuffer::from_channels(main.sample_rate(), channels).unwrap_or_else(|_| main.clone())
}

/// Put `effect` before or after `main` with no cross-fade.
///
/// The result keeps `main`'s rate and channel count; effect channel
/// `c % effect_channels` fills output channel `c`.
pub fn add_effect(main: &AudioBuffer, effect: &AudioBuffer, position: EffectPosition) -> AudioBuffer {
    let fx_channels: Vec<&[f32]> = effect.channels().collect();
    let total = main.frame_count() + effect.frame_count();

    let channels = main
        .channels()
        .enumerate()
        .map(|(c, samples)| {
            let fx = fx_channels[c % fx_channels.len()];
            let mut out = Vec::with_capacity(total);
            match position {
                EffectPosition::Start => {
                    out.extend_from_slice(fx);
                    out.extend_from_slice(samples);
                }
                EffectPosition::End => {
                    out.extend_from_slice(samples);
                    out.extend_from_slice(fx);
                }
            }
            out
        })
        .collect();

    AudioBuffer::from_channels(main.sample_rate(), channels).unwrap_or_else(|_| main.clone())
}
