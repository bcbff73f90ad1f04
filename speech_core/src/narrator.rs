//! On-demand read-aloud of a single sentence or word.
//!
//! Only one item may be loading or speaking at a time; a second request is
//! rejected with [`NarrationError::Busy`]. Whatever happens between fetch and
//! the end of playback, the loading/speaking indicators are cleared when
//! `speak` returns.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};

use crate::cache::SpeechCache;
use crate::error::{NarrationError, PlaybackError};
use crate::playback::PlaybackEngine;

/// What is being read aloud.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SpeechToken {
    Sentence(usize),
    Word(String),
}

impl fmt::Display for SpeechToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeechToken::Sentence(index) => write!(f, "sentence {}", index + 1),
            SpeechToken::Word(word) => write!(f, "word {:?}", word),
        }
    }
}

/// Loading and speaking indicators shown next to each item.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PlaybackSession {
    pub loading: Option<SpeechToken>,
    pub speaking: Option<SpeechToken>,
}

impl PlaybackSession {
    pub fn is_idle(&self) -> bool {
        self.loading.is_none() && self.speaking.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakOutcome {
    Spoken,
    /// No audio could be obtained; the item stays silent.
    Silent,
}

pub struct Narrator {
    cache: SpeechCache,
    engine: Arc<PlaybackEngine>,
    session: watch::Sender<PlaybackSession>,
}

/// Clears both indicators on drop.
struct ActiveItem<'a> {
    session: &'a watch::Sender<PlaybackSession>,
}

impl Drop for ActiveItem<'_> {
    fn drop(&mut self) {
        self.session.send_modify(|s| {
            s.loading = None;
            s.speaking = None;
        });
    }
}

impl Narrator {
    pub fn new(cache: SpeechCache, engine: Arc<PlaybackEngine>) -> Self {
        let (session, _) = watch::channel(PlaybackSession::default());
        Self {
            cache,
            engine,
            session,
        }
    }

    /// Snapshot of the indicators.
    pub fn session(&self) -> PlaybackSession {
        self.session.borrow().clone()
    }

    /// Follow indicator changes.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackSession> {
        self.session.subscribe()
    }

    fn claim(&self, token: &SpeechToken) -> Result<ActiveItem<'_>, NarrationError> {
        let mut claimed = false;
        self.session.send_if_modified(|s| {
            if !s.is_idle() {
                return false;
            }
            s.loading = Some(token.clone());
            claimed = true;
            true
        });
        if !claimed {
            return Err(NarrationError::Busy);
        }
        Ok(ActiveItem {
            session: &self.session,
        })
    }

    /// Fetch (or reuse) the audio for `text` and play it to the end.
    pub async fn speak(&self, token: SpeechToken, text: &str) -> Result<SpeakOutcome, NarrationError> {
        let _active = self.claim(&token)?;

        let result = self.fetch_and_play(&token, text).await;
        if let Err(e) = &result {
            error!("Playback of {} failed: {}", token, e);
        }
        Ok(result?)
    }

    async fn fetch_and_play(&self, token: &SpeechToken, text: &str) -> Result<SpeakOutcome, PlaybackError> {
        let Some(audio) = self.cache.obtain(text).await else {
            info!("No speech available for {}, staying silent", token);
            return Ok(SpeakOutcome::Silent);
        };

        let decoded = audio.decode()?;
        self.session.send_modify(|s| {
            s.loading = None;
            s.speaking = Some(token.clone());
        });
        self.engine.play(decoded).await?;
        Ok(SpeakOutcome::Spoken)
    }

    /// Read several sentences back to back. Stops at the first playback
    /// error; silent sentences are skipped.
    pub async fn read_all(&self, sentences: &[(usize, String)]) -> Result<Vec<SpeakOutcome>, NarrationError> {
        let mut outcomes = Vec::with_capacity(sentences.len());
        for (index, text) in sentences {
            outcomes.push(self.speak(SpeechToken::Sentence(*index), text).await?);
        }
        Ok(outcomes)
    }
}
