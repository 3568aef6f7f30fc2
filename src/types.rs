use crate::catalog::Mode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A team playing the game. Created at setup, scored during play, never
/// removed mid-game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Team {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub score: u32,
}

/// A multiple-choice trivia question. Wire shape: `{"q", "a", "options"}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TriviaCard {
    #[serde(rename = "q")]
    pub question: String,
    #[serde(rename = "a")]
    pub correct_answer: String,
    pub options: Vec<String>,
}

/// A fill-in-the-blank verse. Wire shape: `{"verse", "answer", "ref"}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FillInBlankCard {
    pub verse: String,
    pub answer: String,
    #[serde(rename = "ref")]
    pub reference: String,
}

/// A taboo card: get the team to say `word` without the forbidden words.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TabooCard {
    pub word: String,
    pub forbidden: Vec<String>,
}

/// One challenge card. Free-text modes carry a plain prompt; trivia,
/// fill-in-the-blank, and taboo carry structured data. Serialized untagged so
/// the wire format is either a bare string or the structured object, matching
/// what the card screens consume.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Card {
    Trivia(TriviaCard),
    FillInBlank(FillInBlankCard),
    Taboo(TabooCard),
    Plain(String),
}

impl Card {
    /// Canonical key used for session-scoped deduplication.
    ///
    /// Plain cards: trimmed, lowercased text. Structured cards: JSON in
    /// declared field order, trimmed and lowercased. Two cards are "the same"
    /// for repeat-avoidance exactly when their keys are equal.
    pub fn normalized_key(&self) -> String {
        match self {
            Card::Plain(text) => text.trim().to_lowercase(),
            other => serde_json::to_string(other)
                .unwrap_or_default()
                .trim()
                .to_lowercase(),
        }
    }
}

/// Which step of the sourcing pipeline supplied a card.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CardSource {
    Generated,
    Custom,
    Builtin,
}

/// Requested difficulty for generated cards.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Mixed,
}

impl Difficulty {
    /// Hint sentence appended to generation prompts.
    pub fn hint(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Use very common, well-known references only.",
            Difficulty::Medium => "Use a mix of common and moderately known references.",
            Difficulty::Hard => "Use some lesser-known or deeper references.",
            Difficulty::Mixed => "Vary between easy and hard.",
        }
    }
}

/// A finished round. Appended exactly once when the active team's card is
/// scored or times out; immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    pub team_name: String,
    pub mode: Mode,
    pub card: Card,
    pub points_earned: u32,
    pub timestamp: String,
    pub source: CardSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub skipped: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Idle,
    Playing,
    Finished,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GamePhase {
    Setup,
    ModeSelected,
    ShowRules,
    RoundActive,
    RoundResult,
    ModeComplete,
    GameComplete,
}

/// The mode lock for a contiguous block of rounds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoundSet {
    pub mode: Mode,
    /// Fixed for the lifetime of the set; never exceeds the rounds the game
    /// still has left when the set starts.
    pub total_rounds: u32,
    /// Monotonically counts up to `total_rounds`, then the set closes.
    pub rounds_completed: u32,
}

/// The card currently on the table for the active round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DrawnCard {
    pub card: Card,
    pub source: CardSource,
}

/// The full aggregate state of one game session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub session_id: Option<String>,
    pub status: GameStatus,
    pub phase: GamePhase,
    pub teams: Vec<Team>,
    pub rounds: Vec<Round>,
    /// Round-robin pointer; advances by exactly one (mod team count) per
    /// completed round.
    pub current_team_index: usize,
    pub rounds_per_team: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set: Option<RoundSet>,
    /// Normalized keys of every card seen this session.
    pub used_keys: HashSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_card: Option<DrawnCard>,
    /// True while a card request for the active round is in flight.
    #[serde(skip)]
    pub card_pending: bool,
    /// When the active round auto-scores as skipped. None for self-paced
    /// modes.
    #[serde(skip)]
    pub round_deadline: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub round_started_at: Option<DateTime<Utc>>,
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            session_id: None,
            status: GameStatus::Idle,
            phase: GamePhase::Setup,
            teams: Vec::new(),
            rounds: Vec::new(),
            current_team_index: 0,
            rounds_per_team: 5,
            difficulty: None,
            region: None,
            set: None,
            used_keys: HashSet::new(),
            current_card: None,
            card_pending: false,
            round_deadline: None,
            round_started_at: None,
        }
    }
}

impl GameState {
    /// Total rounds the game will have when played to completion.
    pub fn total_rounds(&self) -> u32 {
        self.teams.len() as u32 * self.rounds_per_team
    }

    /// Rounds not yet played.
    pub fn remaining_rounds(&self) -> u32 {
        self.total_rounds().saturating_sub(self.rounds.len() as u32)
    }

    /// The team whose turn it is.
    pub fn current_team(&self) -> Option<&Team> {
        self.teams.get(self.current_team_index)
    }

    /// Name of the leading team, ties broken by setup order.
    pub fn winner(&self) -> Option<String> {
        self.teams
            .iter()
            .min_by_key(|t| std::cmp::Reverse(t.score))
            .map(|t| t.name.clone())
    }
}

/// Failures of the game state machine and its validation guards.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum GameError {
    #[error("at least 2 teams are required")]
    NotEnoughTeams,

    #[error("team name '{0}' is empty or duplicated")]
    BadTeamName(String),

    #[error("roundsPerTeam must be at least 1")]
    BadRoundsPerTeam,

    #[error("invalid phase transition from {from:?} to {to:?}")]
    InvalidTransition { from: GamePhase, to: GamePhase },

    #[error("mode '{0}' is currently disabled")]
    ModeDisabled(Mode),

    #[error("roundsInSet must be between 1 and {remaining}, got {requested}")]
    SetSizeOutOfRange { requested: u32, remaining: u32 },

    #[error("no game in progress")]
    NotPlaying,

    #[error("no round is active")]
    NoActiveRound,

    #[error("points must be 0 or {max}", max = crate::catalog::POINTS_CORRECT)]
    InvalidPoints(u32),

    #[error("no card has been drawn for this round")]
    NoCardDrawn,

    #[error("a card request is already in flight for this round")]
    CardRequestPending,
}
