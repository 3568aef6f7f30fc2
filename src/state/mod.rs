mod game;
mod round;
pub mod session;

use crate::config::SourcingConfig;
use crate::leaderboard::{InMemoryLeaderboard, LeaderboardStore};
use crate::resolver::CardResolver;
use crate::types::GameState;
use session::SessionStore;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state: one game per server, the sourcing pipeline, the
/// session sink, and the optional leaderboard.
#[derive(Clone)]
pub struct AppState {
    pub game: Arc<RwLock<GameState>>,
    pub resolver: Arc<CardResolver>,
    pub sessions: Arc<dyn SessionStore>,
    pub leaderboard: Arc<dyn LeaderboardStore>,
    pub config: Arc<RwLock<SourcingConfig>>,
}

impl AppState {
    pub fn new(
        resolver: Arc<CardResolver>,
        sessions: Arc<dyn SessionStore>,
        config: SourcingConfig,
    ) -> Self {
        Self {
            game: Arc::new(RwLock::new(GameState::default())),
            resolver,
            sessions,
            leaderboard: Arc::new(InMemoryLeaderboard::new()),
            config: Arc::new(RwLock::new(config)),
        }
    }

    /// Current game state, cloned.
    pub async fn snapshot(&self) -> GameState {
        self.game.read().await.clone()
    }

    pub async fn sourcing_config(&self) -> SourcingConfig {
        self.config.read().await.clone()
    }
}
