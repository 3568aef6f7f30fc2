use crate::state::AppState;
use std::time::Duration;

/// Spawn a background task that auto-scores timed rounds once their deadline
/// passes. The scoring itself goes through the state machine's idempotency
/// guard, so a manual score landing in the same tick wins harmlessly.
pub fn spawn_round_deadline_watcher(state: AppState) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_millis(250)).await;

            if state.auto_score_expired().await {
                let game = state.snapshot().await;
                tracing::info!(
                    round = game.rounds.len(),
                    team = game
                        .rounds
                        .last()
                        .map(|r| r.team_name.as_str())
                        .unwrap_or(""),
                    "round timer expired, scored 0"
                );
            }
        }
    });
}
