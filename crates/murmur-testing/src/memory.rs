use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use murmur_engine::Result;
use murmur_engine::contracts::MemoryStore;
use murmur_types::{Episode, OpenThread, UserFact};

/// Memory contract fake: serves fixed retrieval results and counts
/// commits.
#[derive(Default)]
pub struct StaticMemory {
    pub episodes: Vec<Episode>,
    pub facts: Vec<UserFact>,
    pub threads: Vec<OpenThread>,
    committed_episodes: Mutex<Vec<Episode>>,
    committed_facts: Mutex<Vec<UserFact>>,
}

impl StaticMemory {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_facts(mut self, facts: Vec<UserFact>) -> Self {
        self.facts = facts;
        self
    }

    pub fn with_episodes(mut self, episodes: Vec<Episode>) -> Self {
        self.episodes = episodes;
        self
    }

    pub fn committed_episode_count(&self) -> usize {
        self.committed_episodes.lock().unwrap().len()
    }

    pub fn committed_episodes(&self) -> Vec<Episode> {
        self.committed_episodes.lock().unwrap().clone()
    }
}

#[async_trait]
impl MemoryStore for StaticMemory {
    async fn retrieve_recent(&self, _since: DateTime<Utc>, limit: usize) -> Result<Vec<Episode>> {
        Ok(self.episodes.iter().take(limit).cloned().collect())
    }

    async fn retrieve_similar(
        &self,
        _query: &str,
        limit: usize,
        exclude_ids: &[String],
    ) -> Result<Vec<Episode>> {
        Ok(self
            .episodes
            .iter()
            .filter(|e| !exclude_ids.contains(&e.id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_relevant_facts(&self, _context: &str, limit: usize) -> Result<Vec<UserFact>> {
        Ok(self.facts.iter().take(limit).cloned().collect())
    }

    async fn get_open_threads(&self, limit: usize) -> Result<Vec<OpenThread>> {
        Ok(self.threads.iter().take(limit).cloned().collect())
    }

    async fn commit_episodes(&self, episodes: Vec<Episode>) -> Result<usize> {
        let count = episodes.len();
        self.committed_episodes.lock().unwrap().extend(episodes);
        Ok(count)
    }

    async fn commit_facts(&self, facts: Vec<UserFact>) -> Result<usize> {
        let count = facts.len();
        self.committed_facts.lock().unwrap().extend(facts);
        Ok(count)
    }
}
