//! Effect and background clip loading.
//!
//! Clips are compressed or containerized audio (ogg, mp3, wav, flac) that
//! live on the network or on disk. They are decoded at their native rate.

use crate::audio::buffer::AudioBuffer;
use crate::error::{NarrateError, Result};
use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Trait for fetching and decoding a clip by source reference.
///
/// Implementations must be cheap to share across runs.
#[async_trait]
pub trait ClipLoader: Send + Sync {
    /// Load and decode the clip at `source` (URL or path).
    async fn load(&self, source: &str) -> Result<AudioBuffer>;
}

/// Guess a container hint from the last path segment.
fn extension_hint(source: &str) -> Option<&str> {
    let path = source.split(['?', '#']).next().unwrap_or(source);
    Path::new(path).extension().and_then(|e| e.to_str())
}

/// Decode an encoded clip held in memory.
///
/// `extension` narrows format probing but is not required.
pub fn decode_clip(bytes: Vec<u8>, extension: Option<&str>) -> Result<AudioBuffer> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| NarrateError::ClipDecode {
            message: format!("unrecognized format: {e}"),
        })?;
    let mut format = probed.format;

    let (track_id, codec_params) = {
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| NarrateError::ClipDecode {
                message: "no audio track".to_string(),
            })?;
        (track.id, track.codec_params.clone())
    };

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| NarrateError::ClipDecode {
            message: format!("unsupported codec: {e}"),
        })?;

    let mut sample_rate = codec_params.sample_rate;
    let mut planar: Vec<Vec<f32>> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::ResetRequired) => break,
            Err(SymphoniaError::IoError(ref err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(err) => {
                return Err(NarrateError::ClipDecode {
                    message: format!("packet read failed: {err}"),
                });
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let n = spec.channels.count().max(1);
                if planar.is_empty() {
                    planar = vec![Vec::new(); n];
                }
                sample_rate.get_or_insert(spec.rate);

                let mut interleaved = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                interleaved.copy_interleaved_ref(decoded);
                for frame in interleaved.samples().chunks_exact(n) {
                    for (channel, &sample) in planar.iter_mut().zip(frame) {
                        channel.push(sample);
                    }
                }
            }
            Err(SymphoniaError::DecodeError(msg)) => {
                debug!("Skipping undecodable clip packet: {msg}");
            }
            Err(SymphoniaError::IoError(ref err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(err) => {
                return Err(NarrateError::ClipDecode {
                    message: format!("decode failed: {err}"),
                });
            }
        }
    }

    if planar.first().is_none_or(Vec::is_empty) {
        return Err(NarrateError::ClipDecode {
            message: "clip contains no samples".to_string(),
        });
    }

    let sample_rate = sample_rate.ok_or_else(|| NarrateError::ClipDecode {
        message: "clip has no sample rate".to_string(),
    })?;

    AudioBuffer::from_channels(sample_rate, planar)
}

/// Loads clips from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileClipLoader;

impl FileClipLoader {
    async fn read(source: &str) -> Result<Vec<u8>> {
        let path = source.strip_prefix("file://").unwrap_or(source);
        tokio::fs::read(path)
            .await
            .map_err(|e| NarrateError::ClipLoad {
                source_ref: source.to_string(),
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl ClipLoader for FileClipLoader {
    async fn load(&self, source: &str) -> Result<AudioBuffer> {
        let bytes = Self::read(source).await?;
        let ext = extension_hint(source).map(str::to_owned);
        tokio::task::spawn_blocking(move || decode_clip(bytes, ext.as_deref()))
            .await
            .map_err(|e| NarrateError::ClipDecode {
                message: format!("decode task panicked: {e}"),
            })?
    }
}

/// Loads `http(s)://` clips over the network and everything else from disk.
#[cfg(feature = "remote")]
#[derive(Debug, Clone, Default)]
pub struct HttpClipLoader {
    client: reqwest::Client,
}

#[cfg(feature = "remote")]
impl HttpClipLoader {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let clip_err = |message: String| NarrateError::ClipLoad {
            source_ref: url.to_string(),
            message,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| clip_err(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(clip_err(format!("status {}", response.status())));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| clip_err(format!("body read failed: {e}")))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(feature = "remote")]
#[async_trait]
impl ClipLoader for HttpClipLoader {
    async fn load(&self, source: &str) -> Result<AudioBuffer> {
        if !(source.starts_with("http://") || source.starts_with("https://")) {
            return FileClipLoader.load(source).await;
        }
        let bytes = self.fetch(source).await?;
        let ext = extension_hint(source).map(str::to_owned);
        tokio::task::spawn_blocking(move || decode_clip(bytes, ext.as_deref()))
            .await
            .map_err(|e| NarrateError::ClipDecode {
                message: format!("decode task panicked: {e}"),
            })?
    }
}

/// In-memory clip loader for tests and offline runs.
#[derive(Debug, Clone, Default)]
pub struct StaticClipLoader {
    clips: HashMap<String, AudioBuffer>,
}

impl StaticClipLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a clip under `source`.
    pub fn with_clip(mut self, source: &str, clip: AudioBuffer) -> Self {
        self.clips.insert(source.to_string(), clip);
        self
    }
}

#[async_trait]
impl ClipLoader for StaticClipLoader {
    async fn load(&self, source: &str) -> Result<AudioBuffer> {
        self.clips
            .get(source)
            .cloned()
            .ok_or_else(|| NarrateError::ClipLoad {
                source_ref: source.to_string(),
                message: "no such clip".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_wav_data(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
        cursor.into_inner()
    }

    #[test]
    fn decodes_wav_clip_at_native_rate() {
        let wav = make_wav_data(44100, 1, &[0, 16384, -16384, 0]);
        let clip = decode_clip(wav, Some("wav")).unwrap();

        assert_eq!(clip.sample_rate(), 44100);
        assert_eq!(clip.number_of_channels(), 1);
        assert_eq!(clip.frame_count(), 4);
        assert!((clip.channel(0).unwrap()[1] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn decodes_stereo_wav_clip() {
        let wav = make_wav_data(22050, 2, &[100, -100, 200, -200, 300, -300]);
        let clip = decode_clip(wav, None).unwrap();

        assert_eq!(clip.number_of_channels(), 2);
        assert_eq!(clip.frame_count(), 3);
        assert!(clip.channel(0).unwrap()[2] > 0.0);
        assert!(clip.channel(1).unwrap()[2] < 0.0);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let garbage: Vec<u8> = (0..500).map(|i| ((i * 17 + 42) % 256) as u8).collect();
        let result = decode_clip(garbage, Some("ogg"));
        assert!(result.is_err(), "random bytes should not decode");
    }

    #[test]
    fn extension_hint_ignores_query() {
        assert_eq!(
            extension_hint("https://example.com/sfx/bell.ogg?x=1"),
            Some("ogg")
        );
        assert_eq!(extension_hint("/tmp/bed.mp3"), Some("mp3"));
        assert_eq!(extension_hint("noext"), None);
    }

    #[tokio::test]
    async fn file_loader_reads_and_decodes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ding.wav");
        std::fs::write(&path, make_wav_data(24000, 1, &[1000; 240])).unwrap();

        let clip = FileClipLoader.load(path.to_str().unwrap()).await.unwrap();
        assert_eq!(clip.frame_count(), 240);
    }

    #[tokio::test]
    async fn file_loader_reports_missing_file() {
        let result = FileClipLoader.load("/nonexistent/narrate/clip.wav").await;
        match result {
            Err(NarrateError::ClipLoad { source_ref, .. }) => {
                assert_eq!(source_ref, "/nonexistent/narrate/clip.wav");
            }
            other => panic!("expected ClipLoad, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn static_loader_serves_registered_clips() {
        let loader = StaticClipLoader::new().with_clip("bell", AudioBuffer::silent(1, 5, 24000));
        assert_eq!(loader.load("bell").await.unwrap().frame_count(), 5);
        assert!(loader.load("gong").await.is_err());
    }
}
