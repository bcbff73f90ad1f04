//! Playback engine and audio output handles.
//!
//! An [`AudioOutput`] is the single process-wide output destination. The
//! [`PlaybackEngine`] opens it lazily on first use, resumes it when it is
//! suspended, schedules a decoded buffer and waits for playback to finish.
//! There is no cancellation: once scheduled, a buffer plays to the end.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{oneshot, OnceCell};
use tracing::{debug, info};

use crate::error::PlaybackError;
use crate::pcm::{DecodedAudio, EncodedAudio};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputState {
    Running,
    Suspended,
}

/// Fires once when a scheduled buffer has been fully rendered.
pub type Completion = oneshot::Receiver<()>;

#[async_trait]
pub trait AudioOutput: Send + Sync {
    fn state(&self) -> OutputState;

    /// Bring a suspended output back to the running state.
    async fn resume(&self) -> Result<(), PlaybackError>;

    /// Start rendering `audio` immediately on the output destination.
    fn schedule(&self, audio: DecodedAudio) -> Result<Completion, PlaybackError>;
}

type OpenOutput = Box<dyn Fn() -> Result<Arc<dyn AudioOutput>, PlaybackError> + Send + Sync>;

/// Plays decoded speech on a lazily opened output.
pub struct PlaybackEngine {
    output: OnceCell<Arc<dyn AudioOutput>>,
    open: OpenOutput,
}

impl PlaybackEngine {
    /// Create an engine that opens its output on the first `play` call.
    /// A failed open is retried on the next call.
    pub fn new<F>(open: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn AudioOutput>, PlaybackError> + Send + Sync + 'static,
    {
        Self {
            output: OnceCell::new(),
            open: Box::new(open),
        }
    }

    /// Create an engine around an output that is already open.
    pub fn with_output(output: Arc<dyn AudioOutput>) -> Self {
        Self {
            output: OnceCell::new_with(Some(output.clone())),
            open: Box::new(move || Ok(output.clone())),
        }
    }

    pub fn is_open(&self) -> bool {
        self.output.initialized()
    }

    async fn output(&self) -> Result<Arc<dyn AudioOutput>, PlaybackError> {
        let output = self
            .output
            .get_or_try_init(|| async {
                info!("Opening audio output");
                (self.open)()
            })
            .await?;
        Ok(output.clone())
    }

    /// Play a decoded buffer and return once it has finished.
    pub async fn play(&self, audio: DecodedAudio) -> Result<(), PlaybackError> {
        let output = self.output().await?;

        if output.state() == OutputState::Suspended {
            debug!("Audio output suspended, resuming before playback");
            output.resume().await?;
        }

        debug!(
            "Scheduling {} frames ({} ms) for playback",
            audio.frame_count(),
            audio.duration_ms()
        );
        let done = output.schedule(audio)?;
        done.await.map_err(|_| {
            PlaybackError::OutputUnavailable("output closed before playback finished".to_string())
        })
    }

    /// Decode speech service audio and play it.
    pub async fn play_encoded(&self, audio: &EncodedAudio) -> Result<(), PlaybackError> {
        let decoded = audio.decode()?;
        self.play(decoded).await
    }
}

/// An output without a sound card.
///
/// Buffers "play" for their real duration (or instantly when built with
/// [`NullOutput::instant`]), which keeps the reader usable on headless
/// machines. Starts suspended, like a browser audio context before the first
/// user gesture.
pub struct NullOutput {
    suspended: AtomicBool,
    realtime: bool,
    scheduled: AtomicU64,
    resumes: AtomicU64,
}

impl NullOutput {
    pub fn new() -> Self {
        Self {
            suspended: AtomicBool::new(true),
            realtime: true,
            scheduled: AtomicU64::new(0),
            resumes: AtomicU64::new(0),
        }
    }

    /// Complete every buffer without waiting for its duration.
    pub fn instant() -> Self {
        Self {
            realtime: false,
            ..Self::new()
        }
    }

    /// Number of buffers scheduled so far.
    pub fn scheduled(&self) -> u64 {
        self.scheduled.load(Ordering::Relaxed)
    }

    /// Number of times the output was resumed.
    pub fn resumes(&self) -> u64 {
        self.resumes.load(Ordering::Relaxed)
    }
}

impl Default for NullOutput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioOutput for NullOutput {
    fn state(&self) -> OutputState {
        if self.suspended.load(Ordering::SeqCst) {
            OutputState::Suspended
        } else {
            OutputState::Running
        }
    }

    async fn resume(&self) -> Result<(), PlaybackError> {
        self.suspended.store(false, Ordering::SeqCst);
        self.resumes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn schedule(&self, audio: DecodedAudio) -> Result<Completion, PlaybackError> {
        if self.suspended.load(Ordering::SeqCst) {
            return Err(PlaybackError::OutputUnavailable(
                "output is suspended".to_string(),
            ));
        }
        self.scheduled.fetch_add(1, Ordering::Relaxed);

        let (tx, rx) = oneshot::channel();
        let duration = if self.realtime {
            Duration::from_millis(audio.duration_ms())
        } else {
            Duration::ZERO
        };

        if duration.is_zero() {
            let _ = tx.send(());
        } else {
            tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                let _ = tx.send(());
            });
        }
        Ok(rx)
    }
}
