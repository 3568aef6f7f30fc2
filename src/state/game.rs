use super::AppState;
use crate::catalog::Mode;
use crate::state::session::SessionSummary;
use crate::types::*;

impl AppState {
    /// Check if a phase transition is valid
    pub(crate) fn is_valid_phase_transition(from: GamePhase, to: GamePhase) -> bool {
        use GamePhase::*;

        match (from, to) {
            // Normal forward flow
            (Setup, ModeSelected) => true,
            (ModeSelected, ShowRules) => true,
            (ShowRules, RoundActive) => true,
            (RoundActive, RoundResult) => true,

            // After a result: next round in the set, set finished, or game over
            (RoundResult, RoundActive) => true,
            (RoundResult, ModeComplete) => true,
            (RoundResult, GameComplete) => true,

            // A finished set goes back to mode selection
            (ModeComplete, ModeSelected) => true,

            // Any phase can end the game early (hard stop)
            (_, GameComplete) => true,

            // All other transitions are invalid
            _ => false,
        }
    }

    /// Apply a transition after checking it against the table. Leaves state
    /// untouched on rejection.
    pub(crate) fn advance(game: &mut GameState, to: GamePhase) -> Result<(), GameError> {
        if !Self::is_valid_phase_transition(game.phase, to) {
            return Err(GameError::InvalidTransition {
                from: game.phase,
                to,
            });
        }
        game.phase = to;
        Ok(())
    }

    /// Start a new game. Validates before any mutation: the previous game (if
    /// any) survives a rejected start untouched.
    pub async fn start_game(
        &self,
        teams: Vec<Team>,
        rounds_per_team: u32,
        difficulty: Option<Difficulty>,
        region: Option<String>,
    ) -> Result<GameState, GameError> {
        if teams.len() < 2 {
            return Err(GameError::NotEnoughTeams);
        }
        if rounds_per_team < 1 {
            return Err(GameError::BadRoundsPerTeam);
        }
        let mut seen = std::collections::HashSet::new();
        for team in &teams {
            let name = team.name.trim().to_lowercase();
            if name.is_empty() || !seen.insert(name) {
                return Err(GameError::BadTeamName(team.name.clone()));
            }
        }

        let fresh = GameState {
            session_id: Some(ulid::Ulid::new().to_string()),
            status: GameStatus::Playing,
            phase: GamePhase::ModeSelected,
            teams: teams
                .into_iter()
                .map(|t| Team { score: 0, ..t })
                .collect(),
            rounds_per_team,
            difficulty,
            region,
            ..GameState::default()
        };

        let mut game = self.game.write().await;
        *game = fresh;
        tracing::info!(session = ?game.session_id, teams = game.teams.len(), "game started");
        Ok(game.clone())
    }

    /// Lock a mode for the next block of rounds.
    pub async fn start_round_set(
        &self,
        mode: Mode,
        rounds_in_set: u32,
    ) -> Result<GameState, GameError> {
        let enabled = self.config.read().await.is_mode_enabled(mode);

        let mut game = self.game.write().await;
        if game.status != GameStatus::Playing {
            return Err(GameError::NotPlaying);
        }
        if game.phase != GamePhase::ModeSelected {
            return Err(GameError::InvalidTransition {
                from: game.phase,
                to: GamePhase::ShowRules,
            });
        }
        if !enabled {
            return Err(GameError::ModeDisabled(mode));
        }
        let remaining = game.remaining_rounds();
        if rounds_in_set < 1 || rounds_in_set > remaining {
            return Err(GameError::SetSizeOutOfRange {
                requested: rounds_in_set,
                remaining,
            });
        }

        Self::advance(&mut game, GamePhase::ShowRules)?;
        game.set = Some(RoundSet {
            mode,
            total_rounds: rounds_in_set,
            rounds_completed: 0,
        });
        tracing::info!(mode = %mode, rounds_in_set, "round set started");
        Ok(game.clone())
    }

    /// Leave the rules screen and make the first round of the set active.
    pub async fn dismiss_rules(&self) -> Result<GameState, GameError> {
        let mut game = self.game.write().await;
        if game.status != GameStatus::Playing {
            return Err(GameError::NotPlaying);
        }
        Self::advance(&mut game, GamePhase::RoundActive)?;
        Self::enter_round(&mut game);
        Ok(game.clone())
    }

    /// Acknowledge a finished set: back to mode selection, set lock cleared.
    pub async fn continue_after_set(&self) -> Result<GameState, GameError> {
        let mut game = self.game.write().await;
        if game.status != GameStatus::Playing {
            return Err(GameError::NotPlaying);
        }
        if game.remaining_rounds() == 0 {
            // The set closed on the game's last round; nothing left to pick.
            Self::advance(&mut game, GamePhase::GameComplete)?;
            game.status = GameStatus::Finished;
            let snapshot = game.clone();
            drop(game);
            self.record_session(&snapshot).await;
            return Ok(snapshot);
        }
        Self::advance(&mut game, GamePhase::ModeSelected)?;
        game.set = None;
        Ok(game.clone())
    }

    /// End the game early from any state. Idempotent on an already finished
    /// game. A round in progress is discarded, never half-recorded.
    pub async fn end_game(&self) -> Result<GameState, GameError> {
        let mut game = self.game.write().await;
        if game.status == GameStatus::Finished {
            return Ok(game.clone());
        }
        game.phase = GamePhase::GameComplete;
        game.status = GameStatus::Finished;
        game.current_card = None;
        game.card_pending = false;
        game.round_deadline = None;

        let snapshot = game.clone();
        drop(game);
        self.record_session(&snapshot).await;
        tracing::info!(session = ?snapshot.session_id, "game ended");
        Ok(snapshot)
    }

    /// Back to the initial idle state.
    pub async fn reset(&self) -> GameState {
        let mut game = self.game.write().await;
        *game = GameState::default();
        game.clone()
    }

    /// Hand the terminal snapshot to the session sink. Persistence failures
    /// are logged and swallowed — the in-memory state is the source of truth
    /// and gameplay must never block on the sink.
    pub(crate) async fn record_session(&self, game: &GameState) {
        let Some(summary) = SessionSummary::from_game(game) else {
            return;
        };
        if let Err(e) = self.sessions.upsert(summary).await {
            tracing::error!("failed to record finished session: {e}");
        }
    }
}
