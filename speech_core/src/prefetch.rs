//! Background warm-up of the speech cache.
//!
//! Each pass issues one cache request per text, in priority order, without
//! waiting on any of them. The requests run as independent tasks in a
//! `JoinSet`; their results are discarded one by one and a failure never
//! affects the rest of the pass.

use std::sync::{Mutex, MutexGuard};

use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::cache::SpeechCache;
use crate::story::Story;

pub struct Prefetcher {
    cache: SpeechCache,
    tasks: Mutex<JoinSet<()>>,
}

impl Prefetcher {
    pub fn new(cache: SpeechCache) -> Self {
        Self {
            cache,
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    fn tasks(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start a pass over `texts`. Returns the number of requests issued.
    ///
    /// Tasks of the previous pass are detached, not aborted: their fetches
    /// finish on their own.
    pub fn schedule<'a, I>(&self, texts: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut tasks = self.tasks();
        tasks.detach_all();

        let mut issued = 0;
        for text in texts {
            if text.is_empty() {
                continue;
            }
            // The cache registers the fetch before we move on to the next text
            let pending = self.cache.request(text);
            let label = text.to_string();
            tasks.spawn(async move {
                if pending.await.is_none() {
                    debug!("Prefetch produced no audio for {:?}", label);
                }
            });
            issued += 1;
        }
        issued
    }

    /// Prefetch every speakable text of `story`.
    pub fn prefetch_story(&self, story: &Story) -> usize {
        let issued = self.schedule(story.speech_texts());
        info!("Prefetching speech for {} item(s) of {:?}", issued, story.title);
        issued
    }

    /// Forget the current pass without cancelling it.
    pub fn detach(&self) {
        self.tasks().detach_all();
    }

    /// Requests of the current pass that have not been collected yet.
    pub fn pending(&self) -> usize {
        self.tasks().len()
    }

    /// Wait until every request of the current pass has resolved.
    pub async fn settle(&self) {
        let mut tasks = std::mem::take(&mut *self.tasks());
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                debug!("Prefetch task ended abnormally: {}", e);
            }
        }
    }
}
