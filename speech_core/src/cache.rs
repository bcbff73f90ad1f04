//! Speech cache with single-flight fetching.
//!
//! Maps the exact text of a sentence or word to the audio the speech service
//! produced for it. Concurrent requests for the same text share one fetch.
//! Both maps live under one lock so a story change resets them together.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use futures::future::{self, BoxFuture, FutureExt, Shared};
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::pcm::EncodedAudio;

/// The external speech generator.
#[async_trait]
pub trait SpeechSource: Send + Sync {
    /// Synthesize `text` (never empty) into base64 PCM, 16-bit LE mono 24 kHz.
    async fn fetch_speech(&self, text: &str) -> Result<EncodedAudio, FetchError>;
}

type PendingSpeech = Shared<BoxFuture<'static, Option<EncodedAudio>>>;

#[derive(Default)]
struct CacheState {
    // bumped on every reset; completions from older generations are dropped
    generation: u64,
    entries: HashMap<String, EncodedAudio>,
    in_flight: HashMap<String, PendingSpeech>,
}

#[derive(Default)]
struct Counters {
    fetches: AtomicU64,
    hits: AtomicU64,
    joins: AtomicU64,
    failures: AtomicU64,
}

/// Point-in-time view of the cache, for status output and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub in_flight: usize,
    pub fetches: u64,
    pub hits: u64,
    pub joins: u64,
    pub failures: u64,
}

#[derive(Clone)]
pub struct SpeechCache {
    source: Arc<dyn SpeechSource>,
    state: Arc<Mutex<CacheState>>,
    counters: Arc<Counters>,
}

impl SpeechCache {
    pub fn new(source: Arc<dyn SpeechSource>) -> Self {
        Self {
            source,
            state: Arc::new(Mutex::new(CacheState::default())),
            counters: Arc::new(Counters::default()),
        }
    }

    // A panic while holding the lock cannot leave the maps half-updated.
    fn lock(state: &Mutex<CacheState>) -> MutexGuard<'_, CacheState> {
        state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Look up `text` and, when needed, start its fetch.
    ///
    /// The lookup and the in-flight registration happen before this returns,
    /// so requests issued in order are served in order. Must be called from
    /// within a tokio runtime.
    pub fn request(&self, text: &str) -> BoxFuture<'static, Option<EncodedAudio>> {
        if text.is_empty() {
            return future::ready(None).boxed();
        }

        let mut state = Self::lock(&self.state);

        if let Some(audio) = state.entries.get(text) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Speech cache hit for {:?}", text);
            return future::ready(Some(audio.clone())).boxed();
        }

        if let Some(pending) = state.in_flight.get(text) {
            self.counters.joins.fetch_add(1, Ordering::Relaxed);
            debug!("Joining in-flight speech fetch for {:?}", text);
            return pending.clone().boxed();
        }

        self.counters.fetches.fetch_add(1, Ordering::Relaxed);
        debug!("Fetching speech for {:?}", text);

        let generation = state.generation;
        let owned = text.to_string();
        let source = self.source.clone();
        let shared_state = self.state.clone();
        let counters = self.counters.clone();

        let task = tokio::spawn(async move {
            let audio = match source.fetch_speech(&owned).await {
                Ok(audio) if !audio.is_empty() => Some(audio),
                Ok(_) => {
                    warn!("Speech service returned empty audio for {:?}", owned);
                    None
                }
                Err(e) => {
                    warn!("Speech fetch failed for {:?}: {}", owned, e);
                    None
                }
            };
            if audio.is_none() {
                counters.failures.fetch_add(1, Ordering::Relaxed);
            }
            Self::complete(&shared_state, generation, &owned, audio.clone());
            audio
        });

        let pending: PendingSpeech = async move {
            task.await.unwrap_or_else(|e| {
                warn!("Speech fetch task ended abnormally: {}", e);
                None
            })
        }
        .boxed()
        .shared();

        state.in_flight.insert(text.to_string(), pending.clone());
        pending.boxed()
    }

    /// Cache-aware fetch. `None` means speech is unavailable for `text`.
    pub async fn obtain(&self, text: &str) -> Option<EncodedAudio> {
        self.request(text).await
    }

    fn complete(state: &Mutex<CacheState>, generation: u64, text: &str, audio: Option<EncodedAudio>) {
        let mut state = Self::lock(state);
        if state.generation != generation {
            debug!("Discarding speech for {:?} fetched for a previous story", text);
            return;
        }
        // Failed fetches are pruned too, so the next request retries.
        state.in_flight.remove(text);
        if let Some(audio) = audio {
            state.entries.insert(text.to_string(), audio);
        }
    }

    /// Drop every cached and in-flight entry. Pending fetches still resolve
    /// for their callers but no longer populate the cache.
    pub fn reset(&self) {
        let mut state = Self::lock(&self.state);
        state.generation += 1;
        state.entries.clear();
        state.in_flight.clear();
        debug!("Speech cache reset (generation {})", state.generation);
    }

    /// Whether audio for `text` is already cached.
    pub fn contains(&self, text: &str) -> bool {
        Self::lock(&self.state).entries.contains_key(text)
    }

    pub fn stats(&self) -> CacheStats {
        let state = Self::lock(&self.state);
        CacheStats {
            entries: state.entries.len(),
            in_flight: state.in_flight.len(),
            fetches: self.counters.fetches.load(Ordering::Relaxed),
            hits: self.counters.hits.load(Ordering::Relaxed),
            joins: self.counters.joins.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }
}
