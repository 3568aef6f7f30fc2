//! Optional high-score board.
//!
//! Players may record a display name and score after a game; no account, no
//! auth, just a name on the board.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Hard cap on how many entries one query may return.
pub const MAX_LEADERBOARD_LIMIT: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_name: Option<String>,
    pub score: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub achieved_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LeaderboardSort {
    /// Highest score first.
    Score,
    /// Most recent first.
    #[default]
    Recency,
}

#[async_trait]
pub trait LeaderboardStore: Send + Sync {
    async fn insert(&self, entry: LeaderboardEntry) -> LeaderboardEntry;

    /// Top entries; `limit` is clamped to [`MAX_LEADERBOARD_LIMIT`].
    async fn top(&self, limit: usize, sort: LeaderboardSort) -> Vec<LeaderboardEntry>;
}

#[derive(Default)]
pub struct InMemoryLeaderboard {
    entries: RwLock<Vec<LeaderboardEntry>>,
}

impl InMemoryLeaderboard {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeaderboardStore for InMemoryLeaderboard {
    async fn insert(&self, entry: LeaderboardEntry) -> LeaderboardEntry {
        self.entries.write().await.push(entry.clone());
        entry
    }

    async fn top(&self, limit: usize, sort: LeaderboardSort) -> Vec<LeaderboardEntry> {
        let limit = limit.min(MAX_LEADERBOARD_LIMIT);
        let entries = self.entries.read().await;
        let mut sorted: Vec<LeaderboardEntry> = entries.clone();
        match sort {
            LeaderboardSort::Score => sorted.sort_by(|a, b| b.score.cmp(&a.score)),
            LeaderboardSort::Recency => sorted.sort_by(|a, b| b.achieved_at.cmp(&a.achieved_at)),
        }
        sorted.truncate(limit);
        sorted
    }
}
