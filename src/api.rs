//! HTTP API: the game boundary for the table UI plus the word pool, session,
//! leaderboard, usage, and config routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;

use crate::catalog::{Mode, ALL_MODES};
use crate::config::{SourcingConfig, SourcingConfigUpdate};
use crate::leaderboard::{LeaderboardEntry, LeaderboardSort};
use crate::resolver::ResolveRequest;
use crate::state::session::SessionSummary;
use crate::state::AppState;
use crate::types::{Card, CardSource, Difficulty, GameError, GameState, Team};
use crate::words::{CustomWord, WordFilter, WordOrigin, WordStoreError};

/// Error body shape shared by every route: `{"error": "..."}`.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("request failed: {}", self.message);
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<GameError> for ApiError {
    fn from(err: GameError) -> Self {
        let status = match err {
            GameError::CardRequestPending => StatusCode::CONFLICT,
            _ => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<WordStoreError> for ApiError {
    fn from(err: WordStoreError) -> Self {
        let status = match err {
            WordStoreError::Duplicate => StatusCode::CONFLICT,
            WordStoreError::Unavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

fn parse_mode(key: &str) -> Result<Mode, ApiError> {
    Mode::from_key(key).ok_or_else(|| {
        let valid: Vec<&str> = ALL_MODES.iter().map(|m| m.key()).collect();
        ApiError::bad_request(format!(
            "Invalid or missing mode. Use one of: {}",
            valid.join(", ")
        ))
    })
}

// ---------- game ----------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamInput {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

fn default_rounds_per_team() -> u32 {
    5
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartGameRequest {
    pub teams: Vec<TeamInput>,
    #[serde(default = "default_rounds_per_team")]
    pub rounds_per_team: u32,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub region: Option<String>,
}

async fn start_game(
    State(state): State<AppState>,
    Json(body): Json<StartGameRequest>,
) -> Result<Json<GameState>, ApiError> {
    let teams = body
        .teams
        .into_iter()
        .map(|t| Team {
            name: t.name,
            color: t.color,
            score: 0,
        })
        .collect();
    let game = state
        .start_game(teams, body.rounds_per_team, body.difficulty, body.region)
        .await?;
    Ok(Json(game))
}

async fn get_game(State(state): State<AppState>) -> Json<GameState> {
    Json(state.snapshot().await)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundSetRequest {
    pub mode: String,
    pub rounds_in_set: u32,
}

async fn start_round_set(
    State(state): State<AppState>,
    Json(body): Json<RoundSetRequest>,
) -> Result<Json<GameState>, ApiError> {
    let mode = parse_mode(&body.mode)?;
    let game = state.start_round_set(mode, body.rounds_in_set).await?;
    Ok(Json(game))
}

async fn dismiss_rules(State(state): State<AppState>) -> Result<Json<GameState>, ApiError> {
    Ok(Json(state.dismiss_rules().await?))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardResponse {
    pub card: Card,
    pub source: CardSource,
}

async fn draw_round_card(State(state): State<AppState>) -> Result<Json<CardResponse>, ApiError> {
    let resolved = state.request_card().await?;
    Ok(Json(CardResponse {
        card: resolved.card,
        source: resolved.source,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRequest {
    pub points: u32,
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

async fn score_round(
    State(state): State<AppState>,
    Json(body): Json<ScoreRequest>,
) -> Result<Json<GameState>, ApiError> {
    let snapshot = state.snapshot().await;
    if snapshot.phase == crate::types::GamePhase::RoundResult {
        // Already scored (e.g. the timer beat the tap); idempotent no-op.
        return Ok(Json(snapshot));
    }
    let drawn = snapshot.current_card.ok_or(GameError::NoCardDrawn)?;
    let game = state
        .score_round(body.points, drawn.card, drawn.source, body.duration_ms)
        .await?;
    Ok(Json(game))
}

async fn next_round(State(state): State<AppState>) -> Result<Json<GameState>, ApiError> {
    Ok(Json(state.next_round().await?))
}

async fn continue_after_set(State(state): State<AppState>) -> Result<Json<GameState>, ApiError> {
    Ok(Json(state.continue_after_set().await?))
}

async fn end_game(State(state): State<AppState>) -> Result<Json<GameState>, ApiError> {
    Ok(Json(state.end_game().await?))
}

async fn reset_game(State(state): State<AppState>) -> Json<GameState> {
    Json(state.reset().await)
}

// ---------- stateless card generation ----------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCardRequest {
    pub mode: String,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub region: Option<String>,
    /// Already-seen cards: plain strings or structured card objects.
    #[serde(default)]
    pub used_prompts: Vec<serde_json::Value>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Normalize the caller-supplied used-prompts list into exclusion keys.
fn build_used_set(used_prompts: &[serde_json::Value]) -> HashSet<String> {
    used_prompts
        .iter()
        .filter_map(|value| match value {
            serde_json::Value::String(s) => Some(s.trim().to_lowercase()),
            serde_json::Value::Object(_) => serde_json::from_value::<Card>(value.clone())
                .ok()
                .map(|card| card.normalized_key()),
            _ => None,
        })
        .filter(|key| !key.is_empty())
        .collect()
}

async fn generate_card(
    State(state): State<AppState>,
    Json(body): Json<GenerateCardRequest>,
) -> Result<Json<CardResponse>, ApiError> {
    let mode = parse_mode(&body.mode)?;
    let config = state.sourcing_config().await;
    let request = ResolveRequest {
        difficulty: body.difficulty,
        region: body.region,
        excluded: build_used_set(&body.used_prompts),
        session_id: body.session_id,
    };
    let resolved = state
        .resolver
        .resolve(mode, &request, &config)
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    Ok(Json(CardResponse {
        card: resolved.card,
        source: resolved.source,
    }))
}

// ---------- sessions ----------

async fn upsert_session(
    State(state): State<AppState>,
    Json(summary): Json<SessionSummary>,
) -> Result<impl IntoResponse, ApiError> {
    if summary.session_id.trim().is_empty() {
        return Err(ApiError::bad_request("sessionId is required"));
    }
    let session_id = summary.session_id.clone();
    state
        .sessions
        .upsert(summary)
        .await
        .map_err(|e| ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: e.to_string(),
        })?;
    Ok((StatusCode::CREATED, Json(json!({ "sessionId": session_id }))))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSummary>, ApiError> {
    let summary = state
        .sessions
        .get(&id)
        .await
        .map_err(|e| ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: e.to_string(),
        })?
        .ok_or_else(|| ApiError::not_found("Session not found"))?;
    Ok(Json(summary))
}

// ---------- custom words ----------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordQuery {
    pub mode: String,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub region: Option<String>,
}

async fn list_words(
    State(state): State<AppState>,
    Query(query): Query<WordQuery>,
) -> Result<Json<Vec<CustomWord>>, ApiError> {
    let mode = parse_mode(&query.mode)?;
    let filter = WordFilter {
        difficulty: query.difficulty,
        region: query.region,
    };
    Ok(Json(state.resolver.word_store().query(mode, &filter).await))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertWordRequest {
    pub mode: String,
    pub word: String,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub region: Option<String>,
}

async fn insert_word(
    State(state): State<AppState>,
    Json(body): Json<InsertWordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mode = parse_mode(&body.mode)?;
    let word = body.word.trim();
    if word.is_empty() {
        return Err(ApiError::bad_request(
            "word is required and must be non-empty",
        ));
    }
    let created = state
        .resolver
        .word_store()
        .insert(CustomWord {
            mode,
            word: word.to_string(),
            difficulty: body.difficulty,
            region: body.region,
            origin: WordOrigin::User,
            created_at: chrono::Utc::now().to_rfc3339(),
        })
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

// ---------- leaderboard ----------

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub sort: Option<String>,
}

async fn list_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Json<Vec<LeaderboardEntry>> {
    let sort = match query.sort.as_deref() {
        Some("score") => LeaderboardSort::Score,
        _ => LeaderboardSort::Recency,
    };
    Json(
        state
            .leaderboard
            .top(query.limit.unwrap_or(10), sort)
            .await,
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardInsertRequest {
    pub display_name: String,
    #[serde(default)]
    pub team_name: Option<String>,
    pub score: u32,
    #[serde(default)]
    pub session_id: Option<String>,
}

async fn insert_leaderboard_entry(
    State(state): State<AppState>,
    Json(body): Json<LeaderboardInsertRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = body.display_name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("displayName is required"));
    }
    let entry = state
        .leaderboard
        .insert(LeaderboardEntry {
            display_name: name.to_string(),
            team_name: body.team_name,
            score: body.score,
            session_id: body.session_id,
            achieved_at: chrono::Utc::now().to_rfc3339(),
        })
        .await;
    Ok((StatusCode::CREATED, Json(entry)))
}

// ---------- usage & config ----------

async fn get_usage(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.resolver.usage_store().all().await)
}

async fn get_config(State(state): State<AppState>) -> Json<SourcingConfig> {
    Json(state.sourcing_config().await)
}

async fn patch_config(
    State(state): State<AppState>,
    Json(update): Json<SourcingConfigUpdate>,
) -> Json<SourcingConfig> {
    let mut config = state.config.write().await;
    config.apply(update);
    Json(config.clone())
}

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/game", get(get_game))
        .route("/api/game/start", post(start_game))
        .route("/api/game/round-set", post(start_round_set))
        .route("/api/game/rules/dismiss", post(dismiss_rules))
        .route("/api/game/card", post(draw_round_card))
        .route("/api/game/score", post(score_round))
        .route("/api/game/next", post(next_round))
        .route("/api/game/continue", post(continue_after_set))
        .route("/api/game/end", post(end_game))
        .route("/api/game/reset", post(reset_game))
        .route("/api/cards/generate", post(generate_card))
        .route("/api/sessions", post(upsert_session))
        .route("/api/sessions/{id}", get(get_session))
        .route("/api/words", get(list_words).post(insert_word))
        .route(
            "/api/leaderboard",
            get(list_leaderboard).post(insert_leaderboard_entry),
        )
        .route("/api/usage", get(get_usage))
        .route("/api/config", get(get_config).patch(patch_config))
        .with_state(state)
}
