//! Generative card source.
//!
//! Providers implement [`GenProvider`] (OpenAI via `async-openai`, Ollama via
//! plain HTTP). [`CardGenerator`] builds the per-mode prompt, runs one
//! provider with a timeout, and parses structured modes strictly. It never
//! returns an error to the caller: every failure collapses into an
//! unsuccessful [`GenAttempt`] that the resolver records and falls back from.

mod ollama;
mod openai;

use crate::catalog::Mode;
use crate::types::{Card, Difficulty, FillInBlankCard, TabooCard, TriviaCard};
use async_trait::async_trait;
use std::time::Duration;

pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

/// Result type for provider operations
pub type GenResult<T> = Result<T, GenerateError>;

/// Errors that can occur while generating a card
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("API request failed: {0}")]
    Api(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("response parsing failed: {0}")]
    Parse(String),

    #[error("empty response from provider")]
    Empty,
}

/// Request to generate card text
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// The fully built prompt text
    pub prompt: String,
    /// Maximum response length in tokens (provider-dependent)
    pub max_tokens: u32,
    /// Timeout for the request
    pub timeout: Duration,
}

/// Raw response from a provider
#[derive(Debug, Clone)]
pub struct GenerateResponse {
    /// The generated text
    pub text: String,
    /// Provider-specific metadata (model used, tokens consumed, etc.)
    pub metadata: ResponseMetadata,
}

/// Metadata about the provider response
#[derive(Debug, Clone)]
pub struct ResponseMetadata {
    /// Name of the provider (e.g., "openai", "ollama")
    pub provider: String,
    /// Model name used
    pub model: String,
    /// Tokens consumed, if the provider reports them
    pub tokens_used: Option<u32>,
    /// Latency in milliseconds
    pub latency_ms: u64,
}

/// Trait that all generative providers must implement
#[async_trait]
pub trait GenProvider: Send + Sync {
    /// Generate raw card text for the given prompt
    async fn generate(&self, request: GenerateRequest) -> GenResult<GenerateResponse>;

    /// Get the name of this provider
    fn name(&self) -> &str;
}

/// Configuration for generative providers
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// OpenAI API key
    pub openai_api_key: Option<String>,
    /// OpenAI model to use
    pub openai_model: String,
    /// Ollama base URL
    pub ollama_base_url: Option<String>,
    /// Ollama model to use
    pub ollama_model: String,
    /// Default timeout for generation requests
    pub timeout: Duration,
    /// Default max tokens for responses
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_model: "gpt-4o-mini".to_string(),
            ollama_base_url: None,
            ollama_model: "llama3.2".to_string(),
            timeout: Duration::from_secs(30),
            max_tokens: 300,
        }
    }
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

impl LlmConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            openai_api_key: env_nonempty("OPENAI_API_KEY"),
            openai_model: env_nonempty("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            ollama_base_url: env_nonempty("OLLAMA_BASE_URL"),
            ollama_model: env_nonempty("OLLAMA_MODEL").unwrap_or_else(|| "llama3.2".to_string()),
            timeout: env_nonempty("LLM_TIMEOUT")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(30)),
            max_tokens: env_nonempty("LLM_MAX_TOKENS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
        }
    }

    /// Pick one provider: OpenAI when a key is configured, otherwise Ollama
    /// when a base URL is configured, otherwise none.
    pub fn build_provider(&self) -> Option<Box<dyn GenProvider>> {
        if let Some(api_key) = &self.openai_api_key {
            return Some(Box::new(OpenAiProvider::new(
                api_key.clone(),
                self.openai_model.clone(),
            )));
        }
        if let Some(base_url) = &self.ollama_base_url {
            return Some(Box::new(OllamaProvider::new(
                base_url.clone(),
                self.ollama_model.clone(),
            )));
        }
        None
    }
}

/// Context for one generation attempt.
#[derive(Debug, Clone, Default)]
pub struct CardPrompt {
    pub difficulty: Option<Difficulty>,
    pub region: Option<String>,
    /// Normalized keys the model is told not to repeat (capped at 20).
    pub exclude: Vec<String>,
}

/// Outcome of one generation attempt. `tokens` is credited even for failed
/// attempts when the provider reported usage before the failure.
#[derive(Debug, Clone)]
pub struct GenAttempt {
    pub card: Option<Card>,
    pub tokens: u64,
    pub success: bool,
}

impl GenAttempt {
    fn failed(tokens: u64) -> Self {
        Self {
            card: None,
            tokens,
            success: false,
        }
    }
}

/// Mode-aware wrapper around a single provider.
pub struct CardGenerator {
    provider: Option<Box<dyn GenProvider>>,
    timeout: Duration,
    max_tokens: u32,
}

impl CardGenerator {
    pub fn new(provider: Option<Box<dyn GenProvider>>, timeout: Duration, max_tokens: u32) -> Self {
        Self {
            provider,
            timeout,
            max_tokens,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(config.build_provider(), config.timeout, config.max_tokens)
    }

    /// A generator with no provider: every attempt fails, so draws always
    /// fall through to the custom pool or deck.
    pub fn disabled() -> Self {
        Self::new(None, Duration::from_secs(1), 0)
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    /// Run one generation attempt. Never panics, never propagates errors.
    pub async fn generate(&self, mode: Mode, prompt: &CardPrompt) -> GenAttempt {
        let provider = match &self.provider {
            Some(p) => p,
            None => {
                tracing::debug!("no generative provider configured, skipping");
                return GenAttempt::failed(0);
            }
        };

        let request = GenerateRequest {
            prompt: build_prompt(mode, prompt),
            max_tokens: self.max_tokens,
            timeout: self.timeout,
        };

        let response = match provider.generate(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(provider = provider.name(), mode = %mode, "generation failed: {e}");
                return GenAttempt::failed(0);
            }
        };

        let tokens = response.metadata.tokens_used.unwrap_or(0) as u64;
        let text = response.text.trim();
        if text.is_empty() {
            tracing::warn!(mode = %mode, "empty generation response");
            return GenAttempt::failed(tokens);
        }

        match parse_card(mode, text) {
            Ok(card) => GenAttempt {
                card: Some(card),
                tokens,
                success: true,
            },
            Err(e) => {
                tracing::warn!(mode = %mode, "unparsable generation response: {e}");
                GenAttempt::failed(tokens)
            }
        }
    }
}

/// Build the full prompt for one mode, with the difficulty hint, the
/// region preference for song modes, and a do-not-repeat clause listing at
/// most 20 already-seen cards.
pub fn build_prompt(mode: Mode, context: &CardPrompt) -> String {
    let base = match mode {
        Mode::Trivia => {
            "Generate one Bible trivia question as JSON only, no markdown. Use this exact shape: \
             {\"q\": \"question text\", \"a\": \"correct answer\", \"options\": [\"option1\", \
             \"option2\", \"option3\", \"option4\"]}. Four options, one correct. JSON only."
        }
        Mode::FillInBlank => {
            "Generate one fill-in-the-blank Bible verse as JSON only. Use this shape: \
             {\"verse\": \"sentence with _____ for the missing word\", \"answer\": \"the missing \
             word\", \"ref\": \"Book chapter:verse\"}. JSON only, no markdown."
        }
        Mode::Taboo => {
            "Generate one Bible taboo card as JSON only. Use this shape: {\"word\": \"main word\", \
             \"forbidden\": [\"word1\", \"word2\", \"word3\", \"word4\", \"word5\"]}. Five \
             forbidden words. JSON only, no markdown."
        }
        Mode::Sing => {
            "Give one single WORD (e.g. Grace, Love, Peace) that must appear in the lyrics of a \
             worship or Christian song. The team will sing a line containing this word — not the \
             song title. Plain text only, one word, no JSON, no quotes."
        }
        Mode::Act => "Give one Bible charades prompt: a character, story, or concept in 3-5 words. Plain text only.",
        Mode::Explain => "Give one Bible word, place, or concept (1-3 words). Plain text only.",
        Mode::Hum => "Give one well-known Christian hymn or worship song title. Plain text only.",
        Mode::WhoAmI => "Give one Bible character name. Plain text only.",
        Mode::OneWord => "Give one abstract Christian or faith concept, one word. Plain text only.",
        Mode::Draw => "Give one Bible scene or object to draw, 3-5 words. Plain text only.",
    };

    let mut prompt = base.to_string();
    if let Some(difficulty) = context.difficulty {
        prompt.push_str(&format!(" Difficulty: {}", difficulty.hint()));
    }
    if let Some(region) = &context.region {
        if matches!(mode, Mode::Hum | Mode::Sing) {
            prompt.push_str(&format!(" Prefer songs or hymns commonly known in {region}."));
        }
    }
    if !context.exclude.is_empty() {
        let exclude: Vec<&str> = context
            .exclude
            .iter()
            .take(20)
            .map(String::as_str)
            .collect();
        prompt.push_str(&format!(" Do not use any of these: {}.", exclude.join(", ")));
    }
    prompt
}

fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

/// Parse raw provider output into a card. Structured modes parse as strict
/// JSON in the documented shapes; anything else is a generation failure.
pub fn parse_card(mode: Mode, text: &str) -> GenResult<Card> {
    if !mode.is_structured() {
        return Ok(Card::Plain(text.trim().to_string()));
    }

    let cleaned = strip_code_fences(text);
    match mode {
        Mode::Trivia => {
            let card: TriviaCard =
                serde_json::from_str(&cleaned).map_err(|e| GenerateError::Parse(e.to_string()))?;
            if card.options.len() != 4 {
                return Err(GenerateError::Parse(format!(
                    "expected 4 options, got {}",
                    card.options.len()
                )));
            }
            Ok(Card::Trivia(card))
        }
        Mode::FillInBlank => {
            let card: FillInBlankCard =
                serde_json::from_str(&cleaned).map_err(|e| GenerateError::Parse(e.to_string()))?;
            Ok(Card::FillInBlank(card))
        }
        Mode::Taboo => {
            let card: TabooCard =
                serde_json::from_str(&cleaned).map_err(|e| GenerateError::Parse(e.to_string()))?;
            if card.forbidden.is_empty() {
                return Err(GenerateError::Parse("no forbidden words".to_string()));
            }
            Ok(Card::Taboo(card))
        }
        _ => unreachable!("structured parse called for free-text mode"),
    }
}
