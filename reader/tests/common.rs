//! Common utilities for integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reader::app::Reader;
use speech_core::{EncodedAudio, FetchError, NullOutput, PlaybackEngine, SpeechSource};
use tempfile::TempDir;
use tokio::sync::Semaphore;

/// Speech service stand-in that counts calls per text.
#[derive(Default)]
pub struct CountingSpeech {
    calls: Mutex<HashMap<String, usize>>,
    gate: Option<Semaphore>,
}

impl CountingSpeech {
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
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
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl SpeechSource for CountingSpeech {
    async fn fetch_speech(&self, text: &str) -> Result<EncodedAudio, FetchError> {
        *self.calls.lock().unwrap().entry(text.to_string()).or_insert(0) += 1;
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        if text == "silence" {
            return Err(FetchError::Empty);
        }
        // 20 ms of 24 kHz mono PCM
        let bytes: Vec<u8> = (0..480i16).flat_map(|i| (i * 50).to_le_bytes()).collect();
        Ok(EncodedAudio::from_pcm_bytes(&bytes))
    }
}

pub const STORY_JSON: &str = r#"{
  "title": "Der Hund",
  "sentences": [
    { "text": "Der Hund rennt.", "translation": "The dog runs." },
    { "text": "Der Hund schläft.", "translation": "The dog sleeps." }
  ],
  "keywords": [{ "word": "Hund", "translation": "dog" }],
  "vocabulary": [{ "word": "rennen", "translation": "to run" }]
}"#;

pub struct TestReader {
    pub reader: Reader,
    pub speech: Arc<CountingSpeech>,
    pub output: Arc<NullOutput>,
    pub dir: TempDir,
}

impl TestReader {
    pub fn new(speech: CountingSpeech, prefetch: bool) -> Self {
        let speech = Arc::new(speech);
        let output = Arc::new(NullOutput::instant());
        let engine = Arc::new(PlaybackEngine::with_output(output.clone()));
        Self {
            reader: Reader::new(speech.clone(), engine, prefetch),
            speech,
            output,
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn write_file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    pub fn story_file(&self) -> PathBuf {
        self.write_file("story.json", STORY_JSON)
    }
}
