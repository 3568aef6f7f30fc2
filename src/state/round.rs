use super::AppState;
use crate::catalog::POINTS_CORRECT;
use crate::resolver::{ResolveError, ResolveRequest, ResolvedCard};
use crate::types::*;
use chrono::Utc;

impl AppState {
    /// Arm the active round: fresh card slot, countdown started for timed
    /// modes.
    pub(crate) fn enter_round(game: &mut GameState) {
        game.current_card = None;
        game.card_pending = false;
        let now = Utc::now();
        game.round_started_at = Some(now);
        let duration = game
            .set
            .as_ref()
            .map(|s| s.mode.duration_secs())
            .unwrap_or(0);
        game.round_deadline =
            (duration > 0).then(|| now + chrono::Duration::seconds(i64::from(duration)));
    }

    /// Draw the card for the active round.
    ///
    /// At most one card per round: a draw already on the table is returned
    /// as-is, and a second request while one is in flight is rejected rather
    /// than double-spending the generative source.
    pub async fn request_card(&self) -> Result<ResolvedCard, GameError> {
        let (mode, request) = {
            let mut game = self.game.write().await;
            if game.status != GameStatus::Playing {
                return Err(GameError::NotPlaying);
            }
            if game.phase != GamePhase::RoundActive {
                return Err(GameError::NoActiveRound);
            }
            if let Some(drawn) = &game.current_card {
                return Ok(ResolvedCard {
                    card: drawn.card.clone(),
                    source: drawn.source,
                });
            }
            if game.card_pending {
                return Err(GameError::CardRequestPending);
            }
            let set = game.set.as_ref().ok_or(GameError::NoActiveRound)?;
            let mode = set.mode;
            game.card_pending = true;
            (
                mode,
                ResolveRequest {
                    difficulty: game.difficulty,
                    region: game.region.clone(),
                    excluded: game.used_keys.clone(),
                    session_id: game.session_id.clone(),
                },
            )
        };

        let config = self.config.read().await.clone();
        let result = self.resolver.resolve(mode, &request, &config).await;

        let mut game = self.game.write().await;
        game.card_pending = false;
        match result {
            Ok(resolved) => {
                // The round may have been ended underneath the draw; only a
                // still-active round keeps the card.
                if game.status == GameStatus::Playing && game.phase == GamePhase::RoundActive {
                    game.current_card = Some(DrawnCard {
                        card: resolved.card.clone(),
                        source: resolved.source,
                    });
                }
                Ok(resolved)
            }
            Err(ResolveError::ModeDisabled(mode)) => Err(GameError::ModeDisabled(mode)),
        }
    }

    /// Score the active round. A second call before the phase advances is a
    /// no-op returning the unchanged state, so a manual score racing the
    /// timer can never double-record.
    pub async fn score_round(
        &self,
        points: u32,
        card: Card,
        source: CardSource,
        duration_ms: Option<u64>,
    ) -> Result<GameState, GameError> {
        let mut game = self.game.write().await;
        Self::apply_score(&mut game, points, card, source, duration_ms, false)?;
        Ok(game.clone())
    }

    pub(crate) fn apply_score(
        game: &mut GameState,
        points: u32,
        card: Card,
        source: CardSource,
        duration_ms: Option<u64>,
        skipped: bool,
    ) -> Result<(), GameError> {
        if game.status != GameStatus::Playing {
            return Err(GameError::NotPlaying);
        }
        if game.phase == GamePhase::RoundResult {
            // Already scored; idempotency guard.
            return Ok(());
        }
        if game.phase != GamePhase::RoundActive {
            return Err(GameError::InvalidTransition {
                from: game.phase,
                to: GamePhase::RoundResult,
            });
        }
        if points != 0 && points != POINTS_CORRECT {
            return Err(GameError::InvalidPoints(points));
        }
        let mode = game.set.as_ref().ok_or(GameError::NoActiveRound)?.mode;
        let team_name = game
            .current_team()
            .ok_or(GameError::NotPlaying)?
            .name
            .clone();

        Self::advance(game, GamePhase::RoundResult)?;

        game.teams[game.current_team_index].score += points;
        game.used_keys.insert(card.normalized_key());
        game.rounds.push(Round {
            team_name,
            mode,
            card,
            points_earned: points,
            timestamp: Utc::now().to_rfc3339(),
            source,
            duration_ms,
            skipped,
        });
        if let Some(set) = game.set.as_mut() {
            set.rounds_completed += 1;
        }
        game.current_team_index = (game.current_team_index + 1) % game.teams.len();
        game.current_card = None;
        game.round_deadline = None;
        Ok(())
    }

    /// Advance past a round result: next round of the set, set complete, or
    /// game complete.
    pub async fn next_round(&self) -> Result<GameState, GameError> {
        let mut game = self.game.write().await;
        if game.status != GameStatus::Playing {
            return Err(GameError::NotPlaying);
        }
        if game.phase != GamePhase::RoundResult {
            return Err(GameError::InvalidTransition {
                from: game.phase,
                to: GamePhase::RoundActive,
            });
        }

        if game.remaining_rounds() == 0 {
            Self::advance(&mut game, GamePhase::GameComplete)?;
            game.status = GameStatus::Finished;
            let snapshot = game.clone();
            drop(game);
            self.record_session(&snapshot).await;
            tracing::info!(session = ?snapshot.session_id, "game complete");
            return Ok(snapshot);
        }

        let set_done = game
            .set
            .as_ref()
            .map(|s| s.rounds_completed >= s.total_rounds)
            .unwrap_or(true);
        if set_done {
            Self::advance(&mut game, GamePhase::ModeComplete)?;
            return Ok(game.clone());
        }

        Self::advance(&mut game, GamePhase::RoundActive)?;
        Self::enter_round(&mut game);
        Ok(game.clone())
    }

    /// Score an expired timed round as 0 points, skipped. Called by the
    /// deadline watcher; returns true when a round was recorded. Goes through
    /// the same guard as manual scoring, so the two can never both land.
    pub async fn auto_score_expired(&self) -> bool {
        let mut game = self.game.write().await;
        if game.status != GameStatus::Playing || game.phase != GamePhase::RoundActive {
            return false;
        }
        let Some(deadline) = game.round_deadline else {
            return false;
        };
        if Utc::now() < deadline {
            return false;
        }
        let Some(drawn) = game.current_card.clone() else {
            // Expired before any card landed; disarm the timer and let the
            // table resolve the round manually.
            game.round_deadline = None;
            return false;
        };
        let duration_ms = game
            .set
            .as_ref()
            .map(|s| u64::from(s.mode.duration_secs()) * 1000);
        Self::apply_score(&mut game, 0, drawn.card, drawn.source, duration_ms, true).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Mode;
    use crate::state::test_support::{offline_state, two_teams};

    async fn state_in_active_round(mode: Mode, rounds_per_team: u32, set_size: u32) -> AppState {
        let state = offline_state();
        state
            .start_game(two_teams(), rounds_per_team, None, None)
            .await
            .unwrap();
        state.start_round_set(mode, set_size).await.unwrap();
        state.dismiss_rules().await.unwrap();
        state
    }

    #[tokio::test]
    async fn test_request_card_returns_same_card_until_scored() {
        let state = state_in_active_round(Mode::OneWord, 2, 2).await;

        let first = state.request_card().await.unwrap();
        let second = state.request_card().await.unwrap();
        assert_eq!(first, second, "re-request must not draw a new card");
    }

    #[tokio::test]
    async fn test_request_card_outside_active_round() {
        let state = offline_state();
        assert_eq!(state.request_card().await, Err(GameError::NotPlaying));

        state.start_game(two_teams(), 2, None, None).await.unwrap();
        assert_eq!(state.request_card().await, Err(GameError::NoActiveRound));
    }

    #[tokio::test]
    async fn test_score_round_advances_team_and_records() {
        let state = state_in_active_round(Mode::OneWord, 1, 2).await;
        let drawn = state.request_card().await.unwrap();

        let game = state
            .score_round(2, drawn.card.clone(), drawn.source, Some(8_000))
            .await
            .unwrap();
        assert_eq!(game.phase, GamePhase::RoundResult);
        assert_eq!(game.teams[0].score, 2);
        assert_eq!(game.current_team_index, 1);
        assert_eq!(game.rounds.len(), 1);
        assert_eq!(game.rounds[0].team_name, "Red");
        assert_eq!(game.rounds[0].points_earned, 2);
        assert_eq!(game.rounds[0].duration_ms, Some(8_000));
        assert!(game.used_keys.contains(&drawn.card.normalized_key()));
        assert!(game.current_card.is_none());
    }

    #[tokio::test]
    async fn test_score_round_rejects_bad_points() {
        let state = state_in_active_round(Mode::OneWord, 1, 2).await;
        let drawn = state.request_card().await.unwrap();
        let result = state.score_round(3, drawn.card, drawn.source, None).await;
        assert_eq!(result, Err(GameError::InvalidPoints(3)));
        assert!(state.snapshot().await.rounds.is_empty());
    }

    #[tokio::test]
    async fn test_double_score_is_a_noop() {
        let state = state_in_active_round(Mode::OneWord, 1, 2).await;
        let drawn = state.request_card().await.unwrap();

        state
            .score_round(2, drawn.card.clone(), drawn.source, None)
            .await
            .unwrap();
        // The second score (e.g. timer racing the tap) changes nothing.
        let game = state
            .score_round(0, drawn.card.clone(), drawn.source, None)
            .await
            .unwrap();
        assert_eq!(game.rounds.len(), 1);
        assert_eq!(game.teams[0].score, 2);
        assert_eq!(game.rounds[0].points_earned, 2);
    }

    #[tokio::test]
    async fn test_next_round_stays_in_set() {
        let state = state_in_active_round(Mode::Act, 2, 3).await;
        let drawn = state.request_card().await.unwrap();
        state
            .score_round(2, drawn.card, drawn.source, None)
            .await
            .unwrap();

        let game = state.next_round().await.unwrap();
        assert_eq!(game.phase, GamePhase::RoundActive);
        assert_eq!(game.set.as_ref().unwrap().rounds_completed, 1);
        assert!(game.current_card.is_none(), "fresh round, fresh card");
        assert!(game.round_deadline.is_some(), "timed mode re-arms");
    }

    #[tokio::test]
    async fn test_next_round_closes_set() {
        let state = state_in_active_round(Mode::Act, 2, 1).await;
        let drawn = state.request_card().await.unwrap();
        state
            .score_round(0, drawn.card, drawn.source, None)
            .await
            .unwrap();

        let game = state.next_round().await.unwrap();
        assert_eq!(game.phase, GamePhase::ModeComplete);

        // Acknowledging the set returns to mode selection with the lock gone.
        let game = state.continue_after_set().await.unwrap();
        assert_eq!(game.phase, GamePhase::ModeSelected);
        assert!(game.set.is_none());
    }

    #[tokio::test]
    async fn test_full_completion_finishes_game() {
        // 2 teams x 1 round each, one 2-round set covers the whole game.
        let state = state_in_active_round(Mode::Trivia, 1, 2).await;

        for _ in 0..2 {
            let drawn = state.request_card().await.unwrap();
            state
                .score_round(2, drawn.card, drawn.source, None)
                .await
                .unwrap();
            state.next_round().await.unwrap();
        }

        let game = state.snapshot().await;
        assert_eq!(game.status, GameStatus::Finished);
        assert_eq!(game.phase, GamePhase::GameComplete);
        assert_eq!(game.rounds.len(), 2);
        assert_eq!(game.rounds.len() as u32, game.total_rounds());
    }

    #[tokio::test]
    async fn test_round_robin_pointer_wraps() {
        let state = state_in_active_round(Mode::Explain, 2, 4).await;
        for i in 0..4 {
            let drawn = state.request_card().await.unwrap();
            let game = state
                .score_round(0, drawn.card, drawn.source, None)
                .await
                .unwrap();
            assert_eq!(game.current_team_index, (i + 1) % 2);
            assert_eq!(game.rounds[i].team_name, if i % 2 == 0 { "Red" } else { "Blue" });
            if i < 3 {
                state.next_round().await.unwrap();
            }
        }
    }

    #[tokio::test]
    async fn test_auto_score_expired_records_skipped_round() {
        let state = state_in_active_round(Mode::OneWord, 2, 2).await;
        state.request_card().await.unwrap();

        // Force the deadline into the past.
        {
            let mut game = state.game.write().await;
            game.round_deadline = Some(Utc::now() - chrono::Duration::seconds(1));
        }

        assert!(state.auto_score_expired().await);
        let game = state.snapshot().await;
        assert_eq!(game.phase, GamePhase::RoundResult);
        assert_eq!(game.rounds.len(), 1);
        assert!(game.rounds[0].skipped);
        assert_eq!(game.rounds[0].points_earned, 0);
        assert_eq!(game.current_team_index, 1, "skipped round still consumes the turn");

        // The watcher ticking again must not double-record.
        assert!(!state.auto_score_expired().await);
        assert_eq!(state.snapshot().await.rounds.len(), 1);
    }

    #[tokio::test]
    async fn test_auto_score_without_card_disarms_timer() {
        let state = state_in_active_round(Mode::OneWord, 2, 2).await;
        {
            let mut game = state.game.write().await;
            game.round_deadline = Some(Utc::now() - chrono::Duration::seconds(1));
        }
        assert!(!state.auto_score_expired().await);
        let game = state.snapshot().await;
        assert!(game.round_deadline.is_none());
        assert!(game.rounds.is_empty(), "no half-recorded round");
    }

    #[tokio::test]
    async fn test_end_game_mid_round_drops_unscored_round() {
        let state = state_in_active_round(Mode::Act, 3, 2).await;
        state.request_card().await.unwrap();

        let game = state.end_game().await.unwrap();
        assert_eq!(game.status, GameStatus::Finished);
        assert!(game.rounds.is_empty(), "only fully scored rounds are kept");
        assert!(game.current_card.is_none());
    }

    #[tokio::test]
    async fn test_scores_sum_matches_round_points() {
        let state = state_in_active_round(Mode::Explain, 2, 4).await;
        let points = [2, 0, 2, 2];
        for (i, p) in points.iter().enumerate() {
            let drawn = state.request_card().await.unwrap();
            state
                .score_round(*p, drawn.card, drawn.source, None)
                .await
                .unwrap();
            if i < points.len() - 1 {
                state.next_round().await.unwrap();
            }
        }
        let game = state.snapshot().await;
        let team_total: u32 = game.teams.iter().map(|t| t.score).sum();
        let round_total: u32 = game.rounds.iter().map(|r| r.points_earned).sum();
        assert_eq!(team_total, round_total);
        assert_eq!(team_total, 6);
    }
}
