use std::{fs, path::Path};

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentence {
    pub text: String,
    // The bilingual line shown under the sentence; never spoken
    #[serde(default)]
    pub translation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    pub word: String,
    #[serde(default)]
    pub translation: String,
}

/// A generated story as shown to the reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    #[serde(default)]
    pub title: String,
    pub sentences: Vec<Sentence>,
    /// Highlighted words from the sentences (flashcards)
    #[serde(default)]
    pub keywords: Vec<Term>,
    /// Extra vocabulary related to the story
    #[serde(default)]
    pub vocabulary: Vec<Term>,
}

impl Story {
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).with_context(|| "story is not valid JSON")
    }

    /// Load a story from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to load {}", path.as_ref().display()))?;
        Self::from_json_str(&text)
            .with_context(|| format!("Invalid story file {}", path.as_ref().display()))
    }

    /// Every speakable text in prefetch priority order: sentences, then
    /// keywords, then vocabulary. Empty texts are skipped; duplicates are kept.
    pub fn speech_texts(&self) -> Vec<&str> {
        self.sentences
            .iter()
            .map(|s| s.text.as_str())
            .chain(self.keywords.iter().map(|t| t.word.as_str()))
            .chain(self.vocabulary.iter().map(|t| t.word.as_str()))
            .filter(|text| !text.is_empty())
            .collect()
    }

    /// Find a keyword or vocabulary term by its word.
    pub fn find_term(&self, word: &str) -> Option<&Term> {
        self.keywords
            .iter()
            .chain(self.vocabulary.iter())
            .find(|t| t.word == word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STORY: &str = r#"{
        "title": "The Cat",
        "sentences": [
            {"text": "A cat sat.", "translation": "Un gato se sentó."},
            {"text": ""},
            {"text": "It was happy.", "translation": "Estaba feliz."}
        ],
        "keywords": [{"word": "cat", "translation": "gato"}],
        "vocabulary": [{"word": "happy", "translation": "feliz"}, {"word": ""}]
    }"#;

    #[test]
    fn test_speech_texts_priority_order() {
        let story = Story::from_json_str(STORY).unwrap();
        assert_eq!(
            story.speech_texts(),
            vec!["A cat sat.", "It was happy.", "cat", "happy"]
        );
    }

    #[test]
    fn test_optional_sections_default_to_empty() {
        let story = Story::from_json_str(r#"{"sentences": [{"text": "Hi."}]}"#).unwrap();
        assert!(story.keywords.is_empty());
        assert!(story.vocabulary.is_empty());
        assert_eq!(story.sentences[0].translation, "");
    }

    #[test]
    fn test_invalid_story_json() {
        assert!(Story::from_json_str("{\"title\": 3}").is_err());
    }

    #[test]
    fn test_find_term() {
        let story = Story::from_json_str(STORY).unwrap();
        assert_eq!(story.find_term("happy").unwrap().translation, "feliz");
        assert!(story.find_term("dog").is_none());
    }
}
