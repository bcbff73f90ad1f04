//! Raw PCM decoding.
//!
//! The speech service answers with headerless signed 16-bit little-endian
//! samples wrapped in base64. This module turns those bytes into normalized
//! `f32` frames ready for an output device.

use std::fmt;

use base64::Engine;
use thiserror::Error;

/// Sample rate of every utterance produced by the speech service.
pub const SPEECH_SAMPLE_RATE: u32 = 24_000;
/// The speech service always answers in mono.
pub const SPEECH_CHANNELS: u16 = 1;

const I16_SCALE: f32 = 32768.0;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("audio payload is empty")]
    Empty,

    #[error("audio payload has odd length ({0} bytes), expected 16-bit samples")]
    OddLength(usize),

    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("invalid channel count: {0}")]
    InvalidChannelCount(u16),

    #[error("audio payload is not valid base64: {0}")]
    Base64(String),
}

/// Base64 text wrapping raw PCM, exactly as received from the speech service.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedAudio(String);

impl EncodedAudio {
    pub fn new(base64_text: impl Into<String>) -> Self {
        Self(base64_text.into())
    }

    /// Wrap raw PCM bytes (used by tests and by the WAV round trip helpers).
    pub fn from_pcm_bytes(bytes: &[u8]) -> Self {
        Self(base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decode the base64 wrapper, returning the raw little-endian bytes.
    pub fn to_pcm_bytes(&self) -> Result<Vec<u8>, DecodeError> {
        base64::engine::general_purpose::STANDARD
            .decode(self.0.trim())
            .map_err(|e| DecodeError::Base64(e.to_string()))
    }

    /// Decode into a playable buffer using the speech service's fixed format.
    pub fn decode(&self) -> Result<DecodedAudio, DecodeError> {
        let bytes = self.to_pcm_bytes()?;
        decode(&bytes, SPEECH_SAMPLE_RATE, SPEECH_CHANNELS)
    }
}

// Payloads are hundreds of kilobytes; keep logs readable.
impl fmt::Debug for EncodedAudio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedAudio")
            .field("base64_len", &self.0.len())
            .finish()
    }
}

/// Normalized floating point audio, one `Vec` per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl DecodedAudio {
    /// A buffer with no frames. Still valid for playback.
    pub fn silent(sample_rate: u32, channel_count: u16) -> Self {
        Self {
            sample_rate,
            channels: vec![Vec::new(); channel_count.max(1) as usize],
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> u16 {
        self.channels.len() as u16
    }

    pub fn frame_count(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.frame_count() == 0
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.frame_count() as u64 * 1000 / self.sample_rate as u64
    }

    /// Average all channels down to a single mono track.
    pub fn to_mono(&self) -> Vec<f32> {
        let channels = self.channels.len().max(1) as f32;
        (0..self.frame_count())
            .map(|i| self.channels.iter().map(|c| c[i]).sum::<f32>() / channels)
            .collect()
    }
}

/// Decode interleaved signed 16-bit little-endian PCM.
///
/// Samples that do not fill a whole frame are dropped.
pub fn decode(bytes: &[u8], sample_rate: u32, channel_count: u16) -> Result<DecodedAudio, DecodeError> {
    if sample_rate == 0 {
        return Err(DecodeError::InvalidSampleRate(sample_rate));
    }
    if channel_count == 0 {
        return Err(DecodeError::InvalidChannelCount(channel_count));
    }
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    if bytes.len() % 2 != 0 {
        return Err(DecodeError::OddLength(bytes.len()));
    }

    let stride = channel_count as usize;
    let total_samples = bytes.len() / 2;
    let frame_count = total_samples / stride;

    let mut channels = vec![Vec::with_capacity(frame_count); stride];
    for frame in bytes.chunks_exact(2 * stride).take(frame_count) {
        for (c, sample) in frame.chunks_exact(2).enumerate() {
            let raw = i16::from_le_bytes([sample[0], sample[1]]);
            channels[c].push(raw as f32 / I16_SCALE);
        }
    }

    Ok(DecodedAudio {
        sample_rate,
        channels,
    })
}
