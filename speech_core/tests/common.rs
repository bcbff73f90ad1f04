//! Common utilities for integration tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use speech_core::{
    EncodedAudio, FetchError, Narrator, NullOutput, PlaybackEngine, Sentence, SpeechCache,
    SpeechSource, Story, StorySession, Term,
};
use tokio::sync::Semaphore;

/// Stand-in for the speech service.
///
/// Answers every text with a short PCM clip, counts calls per text, can hold
/// fetches until released and can refuse selected texts.
#[derive(Default)]
pub struct FakeSpeech {
    calls: Mutex<HashMap<String, usize>>,
    total: AtomicUsize,
    gate: Option<Semaphore>,
    refused: Mutex<HashSet<String>>,
}

impl FakeSpeech {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    pub fn refuse(&self, text: &str) {
        self.refused.lock().unwrap().insert(text.to_string());
    }

    pub fn allow(&self, text: &str) {
        self.refused.lock().unwrap().remove(text);
    }

    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    pub fn calls_for(&self, text: &str) -> usize {
        self.calls.lock().unwrap().get(text).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    /// 10 ms of a quiet ramp, as the speech service would encode it.
    pub fn clip() -> EncodedAudio {
        let bytes: Vec<u8> = (0..240i16).flat_map(|i| (i * 10).to_le_bytes()).collect();
        EncodedAudio::from_pcm_bytes(&bytes)
    }
}

#[async_trait]
impl SpeechSource for FakeSpeech {
    async fn fetch_speech(&self, text: &str) -> Result<EncodedAudio, FetchError> {
        *self.calls.lock().unwrap().entry(text.to_string()).or_insert(0) += 1;
        self.total.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        if self.refused.lock().unwrap().contains(text) {
            return Err(FetchError::Status {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        Ok(Self::clip())
    }
}

pub fn story(sentences: &[&str], keywords: &[&str], vocabulary: &[&str]) -> Story {
    let term = |w: &&str| Term {
        word: w.to_string(),
        translation: String::new(),
    };
    Story {
        title: "Test story".to_string(),
        sentences: sentences
            .iter()
            .map(|s| Sentence {
                text: s.to_string(),
                translation: String::new(),
            })
            .collect(),
        keywords: keywords.iter().map(term).collect(),
        vocabulary: vocabulary.iter().map(term).collect(),
    }
}

pub struct Harness {
    pub speech: Arc<FakeSpeech>,
    pub output: Arc<NullOutput>,
    pub session: StorySession,
    pub narrator: Arc<Narrator>,
}

pub fn harness(speech: FakeSpeech) -> Harness {
    let speech = Arc::new(speech);
    let output = Arc::new(NullOutput::instant());
    let cache = SpeechCache::new(speech.clone());
    let engine = Arc::new(PlaybackEngine::with_output(output.clone()));
    Harness {
        speech,
        output,
        session: StorySession::new(cache.clone()),
        narrator: Arc::new(Narrator::new(cache, engine)),
    }
}
