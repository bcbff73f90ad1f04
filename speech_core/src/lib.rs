//! Read-aloud speech for generated stories.
//!
//! Speech arrives from a generative speech service as base64 PCM. This crate
//! caches it per text with single-flight fetching, prefetches a story's
//! sentences and words, decodes the PCM and plays it on one shared output.

mod cache;
#[cfg(feature = "device")]
mod device;
mod error;
mod narrator;
mod pcm;
mod playback;
mod prefetch;
mod session;
mod story;
mod wav;

pub use cache::{CacheStats, SpeechCache, SpeechSource};
#[cfg(feature = "device")]
pub use device::DeviceOutput;
pub use error::{FetchError, NarrationError, PlaybackError};
pub use narrator::{Narrator, PlaybackSession, SpeakOutcome, SpeechToken};
pub use pcm::{decode, DecodeError, DecodedAudio, EncodedAudio, SPEECH_CHANNELS, SPEECH_SAMPLE_RATE};
pub use playback::{AudioOutput, Completion, NullOutput, OutputState, PlaybackEngine};
pub use prefetch::Prefetcher;
pub use session::StorySession;
pub use story::{Sentence, Story, Term};
pub use wav::{encode_wav, write_wav};
