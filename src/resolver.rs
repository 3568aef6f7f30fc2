//! Card source resolution.
//!
//! Given a mode and the set of cards already seen this session, the resolver
//! produces exactly one card and says where it came from. Order of
//! preference: generative source (probabilistic, usage-gated), curated word
//! pool (free-text modes only), built-in deck (always succeeds).

use crate::catalog::Mode;
use crate::config::SourcingConfig;
use crate::deck;
use crate::llm::{CardGenerator, CardPrompt};
use crate::types::{Card, CardSource, Difficulty};
use crate::usage::UsageStore;
use crate::words::{WordFilter, WordStore};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// One card request.
#[derive(Debug, Clone, Default)]
pub struct ResolveRequest {
    pub difficulty: Option<Difficulty>,
    pub region: Option<String>,
    /// Normalized keys of cards already seen this session.
    pub excluded: HashSet<String>,
    pub session_id: Option<String>,
}

/// A resolved card with its source attribution.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCard {
    pub card: Card,
    pub source: CardSource,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ResolveError {
    #[error("mode '{0}' is currently disabled")]
    ModeDisabled(Mode),
}

pub struct CardResolver {
    generator: CardGenerator,
    words: Arc<dyn WordStore>,
    usage: Arc<dyn UsageStore>,
    rng: Mutex<StdRng>,
}

impl CardResolver {
    pub fn new(
        generator: CardGenerator,
        words: Arc<dyn WordStore>,
        usage: Arc<dyn UsageStore>,
    ) -> Self {
        Self::with_rng(generator, words, usage, StdRng::from_os_rng())
    }

    /// Construct with a seeded RNG so tests can pin the probability roll and
    /// the deck/pool picks.
    pub fn with_rng(
        generator: CardGenerator,
        words: Arc<dyn WordStore>,
        usage: Arc<dyn UsageStore>,
        rng: StdRng,
    ) -> Self {
        Self {
            generator,
            words,
            usage,
            rng: Mutex::new(rng),
        }
    }

    pub fn usage_store(&self) -> Arc<dyn UsageStore> {
        self.usage.clone()
    }

    pub fn word_store(&self) -> Arc<dyn WordStore> {
        self.words.clone()
    }

    /// Resolve one card. Infallible apart from the disabled-mode guard: the
    /// built-in deck is the guaranteed last resort.
    pub async fn resolve(
        &self,
        mode: Mode,
        request: &ResolveRequest,
        config: &SourcingConfig,
    ) -> Result<ResolvedCard, ResolveError> {
        if !config.is_mode_enabled(mode) {
            return Err(ResolveError::ModeDisabled(mode));
        }

        let session_id = request.session_id.as_deref();

        // Step 1: probabilistic generative attempt, gated by soft limits.
        let mut attempt = None;
        if self.roll(config.top_up_rate) {
            let usage = self.usage.usage(session_id).await;
            if config.limits.is_over(&usage) {
                tracing::debug!(session = ?session_id, "generative source over soft limit, skipping");
            } else {
                let prompt = CardPrompt {
                    difficulty: request.difficulty,
                    region: request.region.clone(),
                    exclude: request.excluded.iter().cloned().collect(),
                };
                attempt = Some(self.generator.generate(mode, &prompt).await);
            }
        }

        let mut resolved: Option<ResolvedCard> = None;
        if let Some(attempt) = &attempt {
            if let Some(card) = &attempt.card {
                // A duplicate of an already-seen card is discarded, not
                // counted as a failure.
                if request.excluded.contains(&card.normalized_key()) {
                    tracing::debug!(mode = %mode, "generated card was a duplicate, discarding");
                } else {
                    resolved = Some(ResolvedCard {
                        card: card.clone(),
                        source: CardSource::Generated,
                    });
                }
            }
        }

        // Step 2: curated word pool, free-text modes only.
        if resolved.is_none() && !mode.is_structured() {
            let filter = WordFilter {
                difficulty: request.difficulty,
                region: request.region.clone(),
            };
            let available: Vec<String> = self
                .words
                .query(mode, &filter)
                .await
                .into_iter()
                .map(|w| w.word)
                .filter(|w| !request.excluded.contains(&w.trim().to_lowercase()))
                .collect();
            if !available.is_empty() {
                let pick = self.pick_index(available.len());
                resolved = Some(ResolvedCard {
                    card: Card::Plain(available[pick].clone()),
                    source: CardSource::Custom,
                });
            }
        }

        // Step 3: built-in deck, the guaranteed last resort.
        let resolved = match resolved {
            Some(resolved) => resolved,
            None => {
                let card = {
                    let mut rng = self.rng.lock().expect("resolver rng poisoned");
                    deck::draw(mode, &request.excluded, &mut *rng)
                };
                ResolvedCard {
                    card,
                    source: CardSource::Builtin,
                }
            }
        };

        // Exactly one usage record per generative attempt, with the fallback
        // flag reflecting the source that actually supplied the card.
        if let Some(attempt) = attempt {
            self.usage
                .record(
                    session_id,
                    attempt.tokens,
                    attempt.success,
                    resolved.source != CardSource::Generated,
                )
                .await;
        }

        tracing::debug!(mode = %mode, source = ?resolved.source, "card resolved");
        Ok(resolved)
    }

    fn roll(&self, top_up_rate: f64) -> bool {
        let mut rng = self.rng.lock().expect("resolver rng poisoned");
        rng.random::<f64>() < top_up_rate
    }

    fn pick_index(&self, len: usize) -> usize {
        let mut rng = self.rng.lock().expect("resolver rng poisoned");
        rng.random_range(0..len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{GenProvider, GenResult, GenerateRequest, GenerateResponse, ResponseMetadata};
    use crate::usage::{InMemoryUsageStore, UsageLimits};
    use crate::words::{CustomWord, InMemoryWordStore, WordOrigin};
    use async_trait::async_trait;
    use std::time::Duration;

    /// Canned provider: returns the configured text, or errors.
    struct FakeProvider {
        text: Option<String>,
        tokens: u32,
    }

    #[async_trait]
    impl GenProvider for FakeProvider {
        async fn generate(&self, _request: GenerateRequest) -> GenResult<GenerateResponse> {
            match &self.text {
                Some(text) => Ok(GenerateResponse {
                    text: text.clone(),
                    metadata: ResponseMetadata {
                        provider: "fake".to_string(),
                        model: "fake-1".to_string(),
                        tokens_used: Some(self.tokens),
                        latency_ms: 1,
                    },
                }),
                None => Err(crate::llm::GenerateError::Api("synthetic outage".to_string())),
            }
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    fn generator_with(text: Option<&str>, tokens: u32) -> CardGenerator {
        CardGenerator::new(
            Some(Box::new(FakeProvider {
                text: text.map(String::from),
                tokens,
            })),
            Duration::from_secs(1),
            300,
        )
    }

    fn resolver(generator: CardGenerator) -> CardResolver {
        CardResolver::with_rng(
            generator,
            Arc::new(InMemoryWordStore::new()),
            Arc::new(InMemoryUsageStore::new()),
            StdRng::seed_from_u64(42),
        )
    }

    fn always_generate() -> SourcingConfig {
        SourcingConfig {
            top_up_rate: 1.0,
            ..SourcingConfig::default()
        }
    }

    fn never_generate() -> SourcingConfig {
        SourcingConfig {
            top_up_rate: 0.0,
            ..SourcingConfig::default()
        }
    }

    #[tokio::test]
    async fn test_disabled_mode_is_rejected() {
        let resolver = resolver(CardGenerator::disabled());
        let config = SourcingConfig {
            enabled_modes: vec![Mode::Trivia],
            ..SourcingConfig::default()
        };
        let result = resolver
            .resolve(Mode::Sing, &ResolveRequest::default(), &config)
            .await;
        assert_eq!(result, Err(ResolveError::ModeDisabled(Mode::Sing)));
    }

    #[tokio::test]
    async fn test_generated_card_wins_when_attempt_succeeds() {
        let resolver = resolver(generator_with(Some("Hezekiah"), 42));
        let resolved = resolver
            .resolve(Mode::WhoAmI, &ResolveRequest::default(), &always_generate())
            .await
            .unwrap();
        assert_eq!(resolved.source, CardSource::Generated);
        assert_eq!(resolved.card, Card::Plain("Hezekiah".to_string()));

        let usage = resolver.usage_store().usage(None).await;
        assert_eq!(usage.calls, 1);
        assert_eq!(usage.tokens, 42);
        assert_eq!(usage.failures, 0);
        assert_eq!(usage.fallbacks, 0);
    }

    #[tokio::test]
    async fn test_zero_top_up_rate_never_generates() {
        let resolver = resolver(generator_with(Some("should never be drawn"), 10));
        for _ in 0..25 {
            let resolved = resolver
                .resolve(Mode::Act, &ResolveRequest::default(), &never_generate())
                .await
                .unwrap();
            assert_ne!(resolved.source, CardSource::Generated);
        }
        // No attempt means no usage records at all.
        assert_eq!(resolver.usage_store().usage(None).await.calls, 0);
    }

    #[tokio::test]
    async fn test_failed_generation_falls_back_and_records_failure() {
        let resolver = resolver(generator_with(None, 0));
        let resolved = resolver
            .resolve(Mode::Explain, &ResolveRequest::default(), &always_generate())
            .await
            .unwrap();
        assert_eq!(resolved.source, CardSource::Builtin);

        let usage = resolver.usage_store().usage(None).await;
        assert_eq!(usage.calls, 1);
        assert_eq!(usage.failures, 1);
        assert_eq!(usage.fallbacks, 1);
    }

    #[tokio::test]
    async fn test_duplicate_generation_is_discarded_without_failure() {
        let resolver = resolver(generator_with(Some("Moses"), 17));
        let request = ResolveRequest {
            excluded: HashSet::from(["moses".to_string()]),
            ..ResolveRequest::default()
        };
        let resolved = resolver
            .resolve(Mode::WhoAmI, &request, &always_generate())
            .await
            .unwrap();
        assert_eq!(resolved.source, CardSource::Builtin);
        assert_ne!(resolved.card.normalized_key(), "moses");

        let usage = resolver.usage_store().usage(None).await;
        assert_eq!(usage.calls, 1);
        assert_eq!(usage.failures, 0, "duplicates are not failures");
        assert_eq!(usage.fallbacks, 1);
    }

    #[tokio::test]
    async fn test_soft_limit_skips_generation() {
        let usage = Arc::new(InMemoryUsageStore::new());
        let resolver = CardResolver::with_rng(
            generator_with(Some("never drawn"), 5),
            Arc::new(InMemoryWordStore::new()),
            usage.clone(),
            StdRng::seed_from_u64(1),
        );
        let config = SourcingConfig {
            top_up_rate: 1.0,
            limits: UsageLimits {
                soft_call_limit: 1,
                soft_token_limit: 0,
            },
            ..SourcingConfig::default()
        };
        let request = ResolveRequest {
            session_id: Some("s1".to_string()),
            ..ResolveRequest::default()
        };

        // First draw generates and uses up the call budget.
        let first = resolver.resolve(Mode::Hum, &request, &config).await.unwrap();
        assert_eq!(first.source, CardSource::Generated);

        // Every later draw must skip the generative step entirely.
        for _ in 0..5 {
            let next = resolver.resolve(Mode::Hum, &request, &config).await.unwrap();
            assert_ne!(next.source, CardSource::Generated);
        }
        assert_eq!(usage.usage(Some("s1")).await.calls, 1);
    }

    #[tokio::test]
    async fn test_custom_pool_preferred_over_deck_for_free_text_modes() {
        let words = Arc::new(InMemoryWordStore::new());
        words
            .insert(CustomWord {
                mode: Mode::Explain,
                word: "Propitiation".to_string(),
                difficulty: None,
                region: None,
                origin: WordOrigin::Admin,
                created_at: chrono::Utc::now().to_rfc3339(),
            })
            .await
            .unwrap();
        let resolver = CardResolver::with_rng(
            CardGenerator::disabled(),
            words,
            Arc::new(InMemoryUsageStore::new()),
            StdRng::seed_from_u64(9),
        );

        let resolved = resolver
            .resolve(Mode::Explain, &ResolveRequest::default(), &always_generate())
            .await
            .unwrap();
        assert_eq!(resolved.source, CardSource::Custom);
        assert_eq!(resolved.card, Card::Plain("Propitiation".to_string()));
    }

    #[tokio::test]
    async fn test_structured_modes_skip_custom_pool() {
        let words = Arc::new(InMemoryWordStore::new());
        words
            .insert(CustomWord {
                mode: Mode::Trivia,
                word: "not a trivia question".to_string(),
                difficulty: None,
                region: None,
                origin: WordOrigin::User,
                created_at: chrono::Utc::now().to_rfc3339(),
            })
            .await
            .unwrap();
        let resolver = CardResolver::with_rng(
            CardGenerator::disabled(),
            words,
            Arc::new(InMemoryUsageStore::new()),
            StdRng::seed_from_u64(3),
        );

        let resolved = resolver
            .resolve(Mode::Trivia, &ResolveRequest::default(), &never_generate())
            .await
            .unwrap();
        assert_eq!(resolved.source, CardSource::Builtin);
        assert!(matches!(resolved.card, Card::Trivia(_)));
    }

    #[tokio::test]
    async fn test_fallback_totality_with_everything_unavailable() {
        // No provider, empty pool, every deck card already used: still a card.
        let resolver = resolver(CardGenerator::disabled());
        let excluded: HashSet<String> = crate::deck::deck(Mode::Draw)
            .iter()
            .map(Card::normalized_key)
            .collect();
        let request = ResolveRequest {
            excluded,
            ..ResolveRequest::default()
        };
        let resolved = resolver
            .resolve(Mode::Draw, &request, &always_generate())
            .await
            .unwrap();
        assert_eq!(resolved.source, CardSource::Builtin);
    }

    #[tokio::test]
    async fn test_dedup_across_successive_draws() {
        let resolver = resolver(CardGenerator::disabled());
        let config = never_generate();
        let mut request = ResolveRequest::default();
        let deck_size = crate::deck::deck(Mode::OneWord).len();

        let mut seen = HashSet::new();
        for _ in 0..deck_size {
            let resolved = resolver
                .resolve(Mode::OneWord, &request, &config)
                .await
                .unwrap();
            let key = resolved.card.normalized_key();
            assert!(seen.insert(key.clone()), "repeated card within session");
            request.excluded.insert(key);
        }
    }
}
