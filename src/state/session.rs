//! Durable summary of a finished game.
//!
//! The in-memory game state is the source of truth during play; when a game
//! finishes (normally or by early end) a terminal snapshot is handed to the
//! session sink. Saves are idempotent by session id — re-submitting the same
//! id overwrites rather than duplicates — and failures never block gameplay.

use crate::catalog::Mode;
use crate::types::{Difficulty, GameState, Round, Team};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A serializable snapshot of one finished game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    #[serde(default = "default_played_at")]
    pub played_at: String,
    #[serde(default)]
    pub teams: Vec<Team>,
    /// Per-round records, including `source`, `durationMs`, and `skipped`.
    #[serde(default)]
    pub rounds: Vec<Round>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<String>,
    #[serde(default)]
    pub total_rounds: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_mode: Option<Mode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
}

fn default_played_at() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl SessionSummary {
    /// Build the terminal snapshot from a finished game. Returns None when
    /// the game never started (no session id to key by).
    pub fn from_game(game: &GameState) -> Option<Self> {
        let session_id = game.session_id.clone()?;
        Some(Self {
            session_id,
            played_at: chrono::Utc::now().to_rfc3339(),
            teams: game.teams.clone(),
            rounds: game.rounds.clone(),
            winner: game.winner(),
            total_rounds: game.rounds.len() as u32,
            selected_mode: game.set.as_ref().map(|s| s.mode),
            difficulty: game.difficulty,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert or overwrite the summary for its session id.
    async fn upsert(&self, summary: SessionSummary) -> Result<(), SessionStoreError>;

    /// Look up a summary by session id.
    async fn get(&self, session_id: &str) -> Result<Option<SessionSummary>, SessionStoreError>;
}

/// In-memory session sink.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, SessionSummary>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn upsert(&self, summary: SessionSummary) -> Result<(), SessionStoreError> {
        self.sessions
            .write()
            .await
            .insert(summary.session_id.clone(), summary);
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<SessionSummary>, SessionStoreError> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }
}
