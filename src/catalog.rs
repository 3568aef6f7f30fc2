//! The fixed catalog of challenge modes.
//!
//! The resolver, the state machine's duration table, and the configuration
//! allow-list all key off this one enum so they cannot drift apart.

use serde::{Deserialize, Serialize};

/// One of the ten challenge types a round set can lock in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Sing,
    Act,
    Explain,
    Trivia,
    Hum,
    WhoAmI,
    FillInBlank,
    Taboo,
    OneWord,
    Draw,
}

/// All modes, in the order the mode-selection screen presents them.
pub const ALL_MODES: [Mode; 10] = [
    Mode::Sing,
    Mode::Act,
    Mode::Explain,
    Mode::Trivia,
    Mode::Hum,
    Mode::WhoAmI,
    Mode::FillInBlank,
    Mode::Taboo,
    Mode::OneWord,
    Mode::Draw,
];

/// Points awarded for a correct answer. Incorrect answers score 0.
pub const POINTS_CORRECT: u32 = 2;

impl Mode {
    /// The wire/API name of this mode.
    pub fn key(&self) -> &'static str {
        match self {
            Mode::Sing => "sing",
            Mode::Act => "act",
            Mode::Explain => "explain",
            Mode::Trivia => "trivia",
            Mode::Hum => "hum",
            Mode::WhoAmI => "whoami",
            Mode::FillInBlank => "fillinblank",
            Mode::Taboo => "taboo",
            Mode::OneWord => "oneword",
            Mode::Draw => "draw",
        }
    }

    /// Parse a wire/API name back into a mode.
    pub fn from_key(key: &str) -> Option<Mode> {
        ALL_MODES.into_iter().find(|m| m.key() == key)
    }

    /// Round duration in whole seconds. 0 means self-paced: the card itself
    /// carries the completion signal (trivia answer, verse reveal).
    pub fn duration_secs(&self) -> u32 {
        match self {
            Mode::Sing => 60,
            Mode::Act => 60,
            Mode::Explain => 60,
            Mode::Trivia => 0,
            Mode::Hum => 60,
            Mode::WhoAmI => 90,
            Mode::FillInBlank => 0,
            Mode::Taboo => 60,
            Mode::OneWord => 30,
            Mode::Draw => 90,
        }
    }

    /// Whether the generative source must return structured JSON for this
    /// mode. Structured modes never draw from the free-text custom pool.
    pub fn is_structured(&self) -> bool {
        matches!(self, Mode::Trivia | Mode::FillInBlank | Mode::Taboo)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Mode::Sing => "Sing",
            Mode::Act => "Act",
            Mode::Explain => "Explain",
            Mode::Trivia => "Trivia",
            Mode::Hum => "Hum a Hymn",
            Mode::WhoAmI => "Who Am I?",
            Mode::FillInBlank => "Fill in the Blank",
            Mode::Taboo => "Taboo",
            Mode::OneWord => "One Word",
            Mode::Draw => "Draw",
        }
    }

    /// Accent color swatch used by the mode-selection screen.
    pub fn color(&self) -> &'static str {
        match self {
            Mode::Sing => "#FFD700",
            Mode::Act => "#DC2626",
            Mode::Explain => "#2563EB",
            Mode::Trivia => "#16A34A",
            Mode::Hum => "#9333EA",
            Mode::WhoAmI => "#FB923C",
            Mode::FillInBlank => "#14B8A6",
            Mode::Taboo => "#DC2626",
            Mode::OneWord => "#1E3A8A",
            Mode::Draw => "#F59E0B",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Mode::Sing => "🎵",
            Mode::Act => "🎭",
            Mode::Explain => "💬",
            Mode::Trivia => "📖",
            Mode::Hum => "🎶",
            Mode::WhoAmI => "👤",
            Mode::FillInBlank => "✍️",
            Mode::Taboo => "🚫",
            Mode::OneWord => "💡",
            Mode::Draw => "🎨",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Mode::Sing => "Belt out a worship song — your team guesses the title",
            Mode::Act => "Act out a Bible story, no talking allowed",
            Mode::Explain => "Describe the word without saying it",
            Mode::Trivia => "Answer a faith-based multiple choice question",
            Mode::Hum => "Hum a hymn — your team names the tune",
            Mode::WhoAmI => "Guess who you are from your team's yes/no clues",
            Mode::FillInBlank => "Complete the missing word in a Bible verse",
            Mode::Taboo => "Describe the word without saying the forbidden words",
            Mode::OneWord => "One word only — make your team guess",
            Mode::Draw => "Sketch it — no letters or numbers allowed",
        }
    }

    /// Full rules text shown on the SHOW_RULES screen before a set begins.
    pub fn rules(&self) -> &'static str {
        match self {
            Mode::Sing => {
                "One player sings a line from the song on the card — any line \
                 that contains the card's word. The rest of the team guesses the \
                 song. Humming or saying the title is not allowed. 60 seconds."
            }
            Mode::Act => {
                "One player acts out the story or character on the card. \
                 No talking, no mouthing words, no pointing at objects in the \
                 room. The team guesses. 60 seconds."
            }
            Mode::Explain => {
                "One player describes the word on the card without saying the \
                 word itself or any part of it. The team guesses. 60 seconds."
            }
            Mode::Trivia => {
                "The whole team answers one multiple-choice question together. \
                 Four options, one correct. No time limit — lock in your answer \
                 when you agree."
            }
            Mode::Hum => {
                "One player hums the hymn or worship song on the card — no \
                 words, no la-la-las. The team names the tune. 60 seconds."
            }
            Mode::WhoAmI => {
                "One player is the character on the card but doesn't know it. \
                 They ask yes/no questions; the team may only answer yes or no. \
                 90 seconds to figure out who you are."
            }
            Mode::FillInBlank => {
                "The team hears the verse with one word missing and supplies \
                 the missing word. The reference is revealed afterwards. No \
                 time limit."
            }
            Mode::Taboo => {
                "One player gets the team to say the target word without using \
                 the word itself or any of the five forbidden words. 60 seconds."
            }
            Mode::OneWord => {
                "One player may say exactly one word as a clue. The team gets \
                 one guess. Choose wisely — 30 seconds."
            }
            Mode::Draw => {
                "One player draws the scene or object on the card. No letters, \
                 no numbers, no talking. The team guesses. 90 seconds."
            }
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}
