//! Command execution for the interactive reader.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use speech_core::{
    write_wav, NarrationError, Narrator, PlaybackEngine, SpeakOutcome, SpeechCache, SpeechSource,
    SpeechToken, Story, StorySession,
};
use tokio::task::JoinHandle;
use tracing::info;

use crate::commands::{Command, HELP};
use crate::error::ReaderError;
use crate::validation::validate_sentence_index;

pub type Playing = JoinHandle<Result<Vec<SpeakOutcome>, NarrationError>>;

/// Result of one command.
pub enum Reply {
    Message(String),
    /// Speech is running in the background; the task resolves when it ends.
    Playing { label: String, task: Playing },
    Quit,
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reply::Message(msg) => f.debug_tuple("Message").field(msg).finish(),
            Reply::Playing { label, .. } => f.debug_struct("Playing").field("label", label).finish(),
            Reply::Quit => f.write_str("Quit"),
        }
    }
}

/// One line per outcome, for the terminal.
pub fn describe_outcomes(label: &str, result: &Result<Vec<SpeakOutcome>, NarrationError>) -> String {
    match result {
        Ok(outcomes) => {
            let silent = outcomes.iter().filter(|o| **o == SpeakOutcome::Silent).count();
            if silent == 0 {
                format!("Finished {label}")
            } else if silent == outcomes.len() {
                format!("No speech available for {label}")
            } else {
                format!("Finished {label} ({silent} of {} silent)", outcomes.len())
            }
        }
        Err(NarrationError::Busy) => "Still reading, try again in a moment".to_string(),
        Err(e) => format!("Could not play {label}: {e}"),
    }
}

pub struct Reader {
    session: StorySession,
    narrator: Arc<Narrator>,
}

impl Reader {
    pub fn new(source: Arc<dyn SpeechSource>, engine: Arc<PlaybackEngine>, prefetch: bool) -> Self {
        let cache = SpeechCache::new(source);
        let mut session = StorySession::new(cache.clone());
        session.set_prefetch_enabled(prefetch);
        Self {
            session,
            narrator: Arc::new(Narrator::new(cache, engine)),
        }
    }

    pub fn session(&self) -> &StorySession {
        &self.session
    }

    pub fn narrator(&self) -> &Arc<Narrator> {
        &self.narrator
    }

    /// Load a story file and make it the active story.
    pub fn load_story(&mut self, path: &Path) -> Result<String, ReaderError> {
        let story = Story::load(path)?;
        let title = story.title.clone();
        let count = story.sentences.len();
        let id = self.session.load(story);
        let pending = self.session.prefetcher().pending();
        info!("Loaded {} as story {}", path.display(), id);
        Ok(format!(
            "Loaded \"{title}\" ({count} sentences, prefetching {pending} texts)"
        ))
    }

    fn sentence_count(&self) -> Option<usize> {
        self.session.story().map(|s| s.sentences.len())
    }

    /// Sentence text for a 1-based sentence number.
    fn sentence(&self, number: usize) -> Result<(usize, String), ReaderError> {
        let index = number.saturating_sub(1);
        validate_sentence_index(index, self.sentence_count())?;
        Ok((index, self.session.sentence_text(index)?.to_string()))
    }

    // The narrator rejects overlapping items too; checking here gives an
    // immediate answer instead of a background failure.
    fn ensure_idle(&self) -> Result<(), ReaderError> {
        if self.narrator.session().is_idle() {
            Ok(())
        } else {
            Err(NarrationError::Busy.into())
        }
    }

    fn spawn_speak(&self, token: SpeechToken, text: String) -> Reply {
        let narrator = self.narrator.clone();
        let label = token.to_string();
        let task = tokio::spawn(async move { narrator.speak(token, &text).await.map(|o| vec![o]) });
        Reply::Playing { label, task }
    }

    pub async fn execute(&mut self, command: Command) -> Result<Reply, ReaderError> {
        let reply = match command {
            Command::Load(path) => Reply::Message(self.load_story(&path)?),
            Command::List => Reply::Message(self.listing()?),
            Command::Read(number) => {
                let (index, text) = self.sentence(number)?;
                self.ensure_idle()?;
                self.spawn_speak(SpeechToken::Sentence(index), text)
            }
            Command::ReadAll => {
                let sentences: Vec<(usize, String)> = self
                    .session
                    .story()
                    .ok_or_else(|| ReaderError::InvalidInput("No story loaded".to_string()))?
                    .sentences
                    .iter()
                    .enumerate()
                    .map(|(i, s)| (i, s.text.clone()))
                    .collect();
                self.ensure_idle()?;
                let narrator = self.narrator.clone();
                let task = tokio::spawn(async move { narrator.read_all(&sentences).await });
                Reply::Playing {
                    label: "the story".to_string(),
                    task,
                }
            }
            Command::Word(word) => {
                self.ensure_idle()?;
                if let Some(term) = self.session.story().and_then(|s| s.find_term(&word)) {
                    if !term.translation.is_empty() {
                        info!("{} = {}", term.word, term.translation);
                    }
                }
                self.spawn_speak(SpeechToken::Word(word.clone()), word)
            }
            Command::BeginEdit => {
                self.session.begin_edit();
                Reply::Message("Editing, prefetch paused until 'done'".to_string())
            }
            Command::Edit(number, text) => {
                let (index, _) = self.sentence(number)?;
                if !self.session.is_editing() {
                    self.session.begin_edit();
                }
                self.session.edit_sentence(index, text)?;
                Reply::Message(format!("Sentence {number} updated"))
            }
            Command::Done => {
                if !self.session.is_editing() {
                    return Err(ReaderError::InvalidInput("Not editing".to_string()));
                }
                let scheduled = self.session.finish_edit();
                Reply::Message(format!("Edits saved, prefetching {scheduled} texts"))
            }
            Command::Export(number, path) => {
                let (_, text) = self.sentence(number)?;
                Reply::Message(self.export(number, &text, &path).await?)
            }
            Command::Status => Reply::Message(self.status()),
            Command::Help => Reply::Message(HELP.to_string()),
            Command::Quit => Reply::Quit,
        };
        Ok(reply)
    }

    async fn export(&self, number: usize, text: &str, path: &Path) -> Result<String, ReaderError> {
        let audio = self
            .session
            .cache()
            .obtain(text)
            .await
            .ok_or_else(|| ReaderError::Export(format!("no speech available for sentence {number}")))?;
        let decoded = audio
            .decode()
            .map_err(|e| ReaderError::Export(e.to_string()))?;
        write_wav(&decoded, path)
            .with_context(|| format!("Failed to write {}", path.display()))
            .map_err(|e| ReaderError::Export(format!("{e:#}")))?;
        Ok(format!(
            "Wrote sentence {number} ({} ms) to {}",
            decoded.duration_ms(),
            path.display()
        ))
    }

    fn listing(&self) -> Result<String, ReaderError> {
        let story = self
            .session
            .story()
            .ok_or_else(|| ReaderError::InvalidInput("No story loaded".to_string()))?;
        let mut out = format!("{}\n", story.title);
        for (i, sentence) in story.sentences.iter().enumerate() {
            let _ = write!(out, "{:>3}. {}", i + 1, sentence.text);
            if !sentence.translation.is_empty() {
                let _ = write!(out, "  ({})", sentence.translation);
            }
            out.push('\n');
        }
        if !story.keywords.is_empty() {
            let words: Vec<&str> = story.keywords.iter().map(|t| t.word.as_str()).collect();
            let _ = writeln!(out, "Keywords: {}", words.join(", "));
        }
        if !story.vocabulary.is_empty() {
            let words: Vec<&str> = story.vocabulary.iter().map(|t| t.word.as_str()).collect();
            let _ = writeln!(out, "Vocabulary: {}", words.join(", "));
        }
        Ok(out.trim_end().to_string())
    }

    /// Playback indicators plus cache statistics.
    pub fn status(&self) -> String {
        let show = |token: &Option<SpeechToken>| {
            token
                .as_ref()
                .map_or_else(|| "-".to_string(), ToString::to_string)
        };
        let playback = self.narrator.session();
        let stats = self.session.cache().stats();

        let story = match self.session.story() {
            Some(story) => format!(
                "story {} \"{}\": {} sentences{}",
                self.session.story_id(),
                story.title,
                story.sentences.len(),
                if self.session.is_editing() { ", editing" } else { "" }
            ),
            None => "no story loaded".to_string(),
        };

        format!(
            "{story}\nloading: {}, speaking: {}\ncache: {} entries, {} in flight, {} fetches, {} hits, {} joins, {} failures",
            show(&playback.loading),
            show(&playback.speaking),
            stats.entries,
            stats.in_flight,
            stats.fetches,
            stats.hits,
            stats.joins,
            stats.failures,
        )
    }
}
