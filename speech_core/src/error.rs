use thiserror::Error;

use crate::pcm::DecodeError;

/// Why the speech service produced no audio for a text.
///
/// Never surfaced to the reader as a failure: the cache turns every variant
/// into "no audio" and the item simply stays silent.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("speech service is not configured: {0}")]
    Unavailable(String),

    #[error("speech service returned no audio")]
    Empty,

    #[error("speech request failed: {0}")]
    Transport(String),

    #[error("speech service answered with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed speech response: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("audio output unavailable: {0}")]
    OutputUnavailable(String),

    #[error("audio decode error: {0}")]
    Decode(#[from] DecodeError),
}

#[derive(Debug, Error)]
pub enum NarrationError {
    #[error("another item is already loading or speaking")]
    Busy,

    #[error("no sentence at index {0}")]
    UnknownSentence(usize),

    #[error(transparent)]
    Playback(#[from] PlaybackError),
}
