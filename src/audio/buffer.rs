//! Planar floating-point audio buffer.

use crate::error::{NarrateError, Result};
use std::time::Duration;

/// Owned audio: `channels × frames` samples in [-1.0, 1.0] at a fixed rate.
///
/// Every channel holds the same number of frames. Buffers are built once
/// (by the decoder, the clip loader, or the functions in [`crate::audio::mix`])
/// and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    /// Build from per-channel sample vectors.
    ///
    /// # Errors
    /// `MalformedAudio` if there are no channels, the rate is zero, or the
    /// channels differ in length.
    pub fn from_channels(sample_rate: u32, channels: Vec<Vec<f32>>) -> Result<Self> {
        if sample_rate == 0 {
            return Err(NarrateError::MalformedAudio {
                message: "sample rate must be positive".to_string(),
            });
        }
        let Some(first) = channels.first() else {
            return Err(NarrateError::MalformedAudio {
                message: "buffer needs at least one channel".to_string(),
            });
        };
        if channels.len() > usize::from(u16::MAX) {
            return Err(NarrateError::MalformedAudio {
                message: format!("too many channels: {}", channels.len()),
            });
        }
        let frames = first.len();
        if let Some(bad) = channels.iter().position(|c| c.len() != frames) {
            return Err(NarrateError::MalformedAudio {
                message: format!(
                    "channel {} has {} frames, expected {}",
                    bad,
                    channels[bad].len(),
                    frames
                ),
            });
        }
        Ok(Self {
            sample_rate,
            channels,
        })
    }

    /// Build from interleaved samples (`L R L R ...`).
    pub fn from_interleaved(samples: &[f32], channels: u16, sample_rate: u32) -> Result<Self> {
        if channels == 0 {
            return Err(NarrateError::MalformedAudio {
                message: "channel count must be positive".to_string(),
            });
        }
        let n = usize::from(channels);
        if samples.len() % n != 0 {
            return Err(NarrateError::MalformedAudio {
                message: format!(
                    "{} interleaved samples do not divide into {} channels",
                    samples.len(),
                    n
                ),
            });
        }
        let frames = samples.len() / n;
        let mut planar = vec![Vec::with_capacity(frames); n];
        for frame in samples.chunks_exact(n) {
            for (channel, &sample) in planar.iter_mut().zip(frame) {
                channel.push(sample);
            }
        }
        Self::from_channels(sample_rate, planar)
    }

    /// A buffer of digital silence.
    pub fn silent(channels: u16, frames: usize, sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            channels: vec![vec![0.0; frames]; usize::from(channels.max(1))],
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn number_of_channels(&self) -> u16 {
        // Bounded by the constructors.
        u16::try_from(self.channels.len()).unwrap_or(u16::MAX)
    }

    pub fn frame_count(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.frame_count() == 0
    }

    /// Playback length.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frame_count() as f64 / f64::from(self.sample_rate))
    }

    /// Samples of one channel, or `None` if out of range.
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// Iterate over all channels in order.
    pub fn channels(&self) -> impl Iterator<Item = &[f32]> {
        self.channels.iter().map(Vec::as_slice)
    }

    /// Interleave all channels into one vector.
    pub fn to_interleaved(&self) -> Vec<f32> {
        let frames = self.frame_count();
        let mut out = Vec::with_capacity(frames * self.channels.len());
        for i in 0..frames {
            for channel in &self.channels {
                out.push(channel[i]);
            }
        }
        out
    }

    /// Re-layout to `target` channels; output channel `c` copies source
    /// channel `c % source_channels`.
    ///
    /// Returns `self` untouched when the count already matches.
    pub fn with_channel_count(self, target: u16) -> Self {
        let target = usize::from(target.max(1));
        if target == self.channels.len() {
            return self;
        }
        let source = self.channels.len();
        let channels = (0..target)
            .map(|c| self.channels[c % source].clone())
            .collect();
        Self {
            sample_rate: self.sample_rate,
            channels,
        }
    }

    pub(crate) fn into_channels(self) -> Vec<Vec<f32>> {
        self.channels
    }
}
