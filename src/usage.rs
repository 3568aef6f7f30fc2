//! Per-session generative-source usage tracking.
//!
//! Counters only ever increment. The store is the single writer for its
//! backing data; reads of unknown sessions are zero usage, never an error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Sessions that never identified themselves share one bucket.
const ANONYMOUS_SESSION: &str = "anonymous";

/// Monotonic per-session counters.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub calls: u64,
    pub tokens: u64,
    pub failures: u64,
    pub fallbacks: u64,
}

/// Soft ceilings that disable the generative source without erroring.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UsageLimits {
    pub soft_call_limit: u64,
    /// 0 disables the token ceiling.
    pub soft_token_limit: u64,
}

impl Default for UsageLimits {
    fn default() -> Self {
        Self {
            soft_call_limit: 1000,
            soft_token_limit: 500_000,
        }
    }
}

impl UsageLimits {
    pub fn is_over(&self, usage: &Usage) -> bool {
        if usage.calls >= self.soft_call_limit {
            return true;
        }
        self.soft_token_limit > 0 && usage.tokens >= self.soft_token_limit
    }
}

fn session_key(session_id: Option<&str>) -> &str {
    match session_id {
        Some(id) if !id.trim().is_empty() => id,
        _ => ANONYMOUS_SESSION,
    }
}

#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Record one generative attempt: `calls` always increments, `tokens` by
    /// the given amount, `failures` when the attempt did not succeed,
    /// `fallbacks` when another source ultimately supplied the card.
    async fn record(&self, session_id: Option<&str>, tokens: u64, success: bool, fallback: bool);

    /// Usage for one session; unknown sessions read as zero.
    async fn usage(&self, session_id: Option<&str>) -> Usage;

    /// All sessions with recorded usage.
    async fn all(&self) -> HashMap<String, Usage>;
}

/// In-memory usage store. Increments are in-place under one write lock, so
/// each field is updated atomically with respect to concurrent recorders.
#[derive(Default)]
pub struct InMemoryUsageStore {
    sessions: RwLock<HashMap<String, Usage>>,
}

impl InMemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UsageStore for InMemoryUsageStore {
    async fn record(&self, session_id: Option<&str>, tokens: u64, success: bool, fallback: bool) {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .entry(session_key(session_id).to_string())
            .or_default();
        entry.calls += 1;
        entry.tokens += tokens;
        if !success {
            entry.failures += 1;
        }
        if fallback {
            entry.fallbacks += 1;
        }
    }

    async fn usage(&self, session_id: Option<&str>) -> Usage {
        self.sessions
            .read()
            .await
            .get(session_key(session_id))
            .copied()
            .unwrap_or_default()
    }

    async fn all(&self) -> HashMap<String, Usage> {
        self.sessions.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_session_reads_as_zero() {
        let store = InMemoryUsageStore::new();
        let usage = store.usage(Some("never-seen")).await;
        assert_eq!(usage, Usage::default());
    }

    #[tokio::test]
    async fn test_record_increments_each_field() {
        let store = InMemoryUsageStore::new();
        store.record(Some("s1"), 120, true, false).await;
        store.record(Some("s1"), 80, false, true).await;

        let usage = store.usage(Some("s1")).await;
        assert_eq!(usage.calls, 2);
        assert_eq!(usage.tokens, 200);
        assert_eq!(usage.failures, 1);
        assert_eq!(usage.fallbacks, 1);
    }

    #[tokio::test]
    async fn test_missing_session_id_uses_anonymous_bucket() {
        let store = InMemoryUsageStore::new();
        store.record(None, 10, true, false).await;
        store.record(Some("  "), 5, true, false).await;

        let usage = store.usage(None).await;
        assert_eq!(usage.calls, 2);
        assert_eq!(usage.tokens, 15);
        assert!(store.all().await.contains_key("anonymous"));
    }

    #[test]
    fn test_call_limit_gates() {
        let limits = UsageLimits {
            soft_call_limit: 1,
            soft_token_limit: 0,
        };
        assert!(!limits.is_over(&Usage::default()));
        assert!(limits.is_over(&Usage {
            calls: 1,
            ..Usage::default()
        }));
    }

    #[test]
    fn test_zero_token_limit_is_disabled() {
        let limits = UsageLimits {
            soft_call_limit: 1000,
            soft_token_limit: 0,
        };
        assert!(!limits.is_over(&Usage {
            tokens: u64::MAX,
            ..Usage::default()
        }));
    }

    #[test]
    fn test_token_limit_gates() {
        let limits = UsageLimits::default();
        assert!(limits.is_over(&Usage {
            tokens: 500_000,
            ..Usage::default()
        }));
    }
}
