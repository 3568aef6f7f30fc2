//! Curated per-mode word pool.
//!
//! Players and admins contribute free-text prompts that the resolver prefers
//! over the built-in deck. The store is a trait so a durable backend can be
//! swapped in; the crate ships the in-memory implementation.

use crate::catalog::Mode;
use crate::types::Difficulty;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WordOrigin {
    User,
    Admin,
}

/// One curated word. `(mode, word)` is unique, case-insensitively.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomWord {
    pub mode: Mode,
    pub word: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub origin: WordOrigin,
    pub created_at: String,
}

/// Filters for querying the pool. `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct WordFilter {
    pub difficulty: Option<Difficulty>,
    pub region: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum WordStoreError {
    #[error("this mode and word combination already exists")]
    Duplicate,

    #[error("word store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait WordStore: Send + Sync {
    /// Words for a mode matching the filter.
    async fn query(&self, mode: Mode, filter: &WordFilter) -> Vec<CustomWord>;

    /// Insert a word; duplicate `(mode, word)` pairs conflict.
    async fn insert(&self, word: CustomWord) -> Result<CustomWord, WordStoreError>;
}

/// In-memory word pool.
#[derive(Default)]
pub struct InMemoryWordStore {
    words: RwLock<Vec<CustomWord>>,
}

impl InMemoryWordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WordStore for InMemoryWordStore {
    async fn query(&self, mode: Mode, filter: &WordFilter) -> Vec<CustomWord> {
        let words = self.words.read().await;
        words
            .iter()
            .filter(|w| w.mode == mode)
            .filter(|w| filter.difficulty.is_none() || w.difficulty == filter.difficulty)
            .filter(|w| {
                filter
                    .region
                    .as_ref()
                    .map(|r| w.region.as_deref() == Some(r.as_str()))
                    .unwrap_or(true)
            })
            .cloned()
            .collect()
    }

    async fn insert(&self, word: CustomWord) -> Result<CustomWord, WordStoreError> {
        let mut words = self.words.write().await;
        let key = word.word.trim().to_lowercase();
        if words
            .iter()
            .any(|w| w.mode == word.mode && w.word.trim().to_lowercase() == key)
        {
            return Err(WordStoreError::Duplicate);
        }
        words.push(word.clone());
        Ok(word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(mode: Mode, text: &str) -> CustomWord {
        CustomWord {
            mode,
            word: text.to_string(),
            difficulty: None,
            region: None,
            origin: WordOrigin::User,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_query_by_mode() {
        let store = InMemoryWordStore::new();
        store.insert(word(Mode::Explain, "Atonement")).await.unwrap();
        store.insert(word(Mode::Sing, "Hallelujah")).await.unwrap();

        let explain = store.query(Mode::Explain, &WordFilter::default()).await;
        assert_eq!(explain.len(), 1);
        assert_eq!(explain[0].word, "Atonement");
    }

    #[tokio::test]
    async fn test_duplicate_mode_word_conflicts() {
        let store = InMemoryWordStore::new();
        store.insert(word(Mode::Explain, "Mercy")).await.unwrap();

        let result = store.insert(word(Mode::Explain, "  mercy ")).await;
        assert!(matches!(result, Err(WordStoreError::Duplicate)));

        // Same word under a different mode is fine.
        store.insert(word(Mode::OneWord, "Mercy")).await.unwrap();
    }

    #[tokio::test]
    async fn test_query_filters_difficulty_and_region() {
        let store = InMemoryWordStore::new();
        let mut easy = word(Mode::Hum, "Amazing Grace");
        easy.difficulty = Some(Difficulty::Easy);
        easy.region = Some("Nigeria".to_string());
        store.insert(easy).await.unwrap();

        let mut hard = word(Mode::Hum, "And Can It Be");
        hard.difficulty = Some(Difficulty::Hard);
        store.insert(hard).await.unwrap();

        let filter = WordFilter {
            difficulty: Some(Difficulty::Easy),
            region: None,
        };
        let hits = store.query(Mode::Hum, &filter).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].word, "Amazing Grace");

        let filter = WordFilter {
            difficulty: None,
            region: Some("Ghana".to_string()),
        };
        assert!(store.query(Mode::Hum, &filter).await.is_empty());
    }
}
