//! Audio buffers and the codecs around them.

pub mod buffer;
pub mod clip;
pub mod mix;
pub mod pcm;
pub mod wav;

pub use buffer::AudioBuffer;
pub use clip::{ClipLoader, FileClipLoader, StaticClipLoader, decode_clip};
#[cfg(feature = "remote")]
pub use clip::HttpClipLoader;
pub use mix::{EffectPosition, add_effect, concatenate, mix};
pub use pcm::{decode_fragment, decode_pcm16};
pub use wav::encode_wav;
