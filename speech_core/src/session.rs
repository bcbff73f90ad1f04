use tracing::{debug, info};

use crate::cache::SpeechCache;
use crate::error::NarrationError;
use crate::prefetch::Prefetcher;
use crate::story::Story;

/// The story currently on screen, with its speech cache and prefetcher.
///
/// Loading a story gives it a new identity: the cache is cleared and a
/// prefetch pass starts. While editing, prefetch is held back; finishing an
/// edit prefetches again without clearing the cache.
pub struct StorySession {
    story: Option<Story>,
    story_id: u64,
    editing: bool,
    prefetch_enabled: bool,
    cache: SpeechCache,
    prefetcher: Prefetcher,
}

impl StorySession {
    pub fn new(cache: SpeechCache) -> Self {
        Self {
            story: None,
            story_id: 0,
            editing: false,
            prefetch_enabled: true,
            prefetcher: Prefetcher::new(cache.clone()),
            cache,
        }
    }

    pub fn set_prefetch_enabled(&mut self, enabled: bool) {
        self.prefetch_enabled = enabled;
    }

    /// Make `story` the active story. Returns its identity.
    pub fn load(&mut self, story: Story) -> u64 {
        self.story_id += 1;
        self.cache.reset();
        self.prefetcher.detach();
        self.editing = false;
        info!(
            "Story {} loaded: {:?} ({} sentences)",
            self.story_id,
            story.title,
            story.sentences.len()
        );
        self.story = Some(story);
        self.prefetch();
        self.story_id
    }

    /// Run a prefetch pass over the active story unless editing.
    pub fn prefetch(&self) -> usize {
        if self.editing || !self.prefetch_enabled {
            debug!("Prefetch skipped (editing={})", self.editing);
            return 0;
        }
        match &self.story {
            Some(story) => self.prefetcher.prefetch_story(story),
            None => 0,
        }
    }

    pub fn begin_edit(&mut self) {
        self.editing = true;
    }

    /// Replace the text of a sentence. The new text is a new cache key; the
    /// old entry is left as is.
    pub fn edit_sentence(&mut self, index: usize, text: impl Into<String>) -> Result<(), NarrationError> {
        let sentence = self
            .story
            .as_mut()
            .and_then(|story| story.sentences.get_mut(index))
            .ok_or(NarrationError::UnknownSentence(index))?;
        sentence.text = text.into();
        Ok(())
    }

    /// Leave edit mode and prefetch the (possibly changed) texts.
    pub fn finish_edit(&mut self) -> usize {
        self.editing = false;
        self.prefetch()
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    pub fn story(&self) -> Option<&Story> {
        self.story.as_ref()
    }

    pub fn story_id(&self) -> u64 {
        self.story_id
    }

    pub fn sentence_text(&self, index: usize) -> Result<&str, NarrationError> {
        self.story
            .as_ref()
            .and_then(|story| story.sentences.get(index))
            .map(|s| s.text.as_str())
            .ok_or(NarrationError::UnknownSentence(index))
    }

    pub fn cache(&self) -> &SpeechCache {
        &self.cache
    }

    pub fn prefetcher(&self) -> &Prefetcher {
        &self.prefetcher
    }
}
