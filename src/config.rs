//! Card-sourcing configuration.
//!
//! Explicitly injected wherever the resolver or the state machine needs it —
//! never ambient global state — so tests can vary it per call. The admin
//! surface PATCHes a shared copy at runtime.

use crate::catalog::{Mode, ALL_MODES};
use crate::usage::UsageLimits;
use serde::{Deserialize, Serialize};

/// Default probability of attempting the generative source for a draw.
const DEFAULT_TOP_UP_RATE: f64 = 0.3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourcingConfig {
    /// Probability in [0, 1] that a draw attempts the generative source.
    pub top_up_rate: f64,
    /// Allow-list of playable modes. Defaults to the full catalog.
    pub enabled_modes: Vec<Mode>,
    pub limits: UsageLimits,
}

impl Default for SourcingConfig {
    fn default() -> Self {
        Self {
            top_up_rate: DEFAULT_TOP_UP_RATE,
            enabled_modes: ALL_MODES.to_vec(),
            limits: UsageLimits::default(),
        }
    }
}

/// Partial update from the admin surface. Unknown modes are dropped; an
/// update that would empty the allow-list is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcingConfigUpdate {
    pub top_up_rate: Option<f64>,
    pub enabled_modes: Option<Vec<String>>,
}

impl SourcingConfig {
    /// Read configuration from the environment, falling back to defaults for
    /// anything unset or unparsable.
    pub fn from_env() -> Self {
        let top_up_rate = std::env::var("GEN_TOP_UP_RATE")
            .ok()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .map(|r| r.clamp(0.0, 1.0))
            .unwrap_or(DEFAULT_TOP_UP_RATE);

        let enabled_modes = std::env::var("ENABLED_MODES")
            .ok()
            .map(|csv| {
                csv.split(',')
                    .filter_map(|k| Mode::from_key(k.trim()))
                    .collect::<Vec<_>>()
            })
            .filter(|modes| !modes.is_empty())
            .unwrap_or_else(|| ALL_MODES.to_vec());

        let limits = UsageLimits {
            soft_call_limit: std::env::var("GEN_SOFT_LIMIT_CALLS")
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or_else(|| UsageLimits::default().soft_call_limit),
            soft_token_limit: std::env::var("GEN_SOFT_LIMIT_TOKENS")
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or_else(|| UsageLimits::default().soft_token_limit),
        };

        Self {
            top_up_rate,
            enabled_modes,
            limits,
        }
    }

    pub fn is_mode_enabled(&self, mode: Mode) -> bool {
        self.enabled_modes.contains(&mode)
    }

    /// Apply an admin update in place, clamping and validating each field.
    pub fn apply(&mut self, update: SourcingConfigUpdate) {
        if let Some(rate) = update.top_up_rate {
            if rate.is_finite() {
                self.top_up_rate = rate.clamp(0.0, 1.0);
            }
        }
        if let Some(keys) = update.enabled_modes {
            let modes: Vec<Mode> = keys
                .iter()
                .filter_map(|k| Mode::from_key(k.trim()))
                .collect();
            if !modes.is_empty() {
                self.enabled_modes = modes;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for var in [
            "GEN_TOP_UP_RATE",
            "ENABLED_MODES",
            "GEN_SOFT_LIMIT_CALLS",
            "GEN_SOFT_LIMIT_TOKENS",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = SourcingConfig::from_env();
        assert_eq!(config.top_up_rate, 0.3);
        assert_eq!(config.enabled_modes.len(), 10);
        assert_eq!(config.limits.soft_call_limit, 1000);
        assert_eq!(config.limits.soft_token_limit, 500_000);
    }

    #[test]
    #[serial]
    fn test_from_env_clamps_rate() {
        clear_env();
        std::env::set_var("GEN_TOP_UP_RATE", "3.5");
        let config = SourcingConfig::from_env();
        assert_eq!(config.top_up_rate, 1.0);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_parses_mode_list() {
        clear_env();
        std::env::set_var("ENABLED_MODES", "trivia, act ,nonsense");
        let config = SourcingConfig::from_env();
        assert_eq!(config.enabled_modes, vec![Mode::Trivia, Mode::Act]);
        clear_env();
    }

    #[test]
    fn test_apply_ignores_empty_mode_list() {
        let mut config = SourcingConfig::default();
        config.apply(SourcingConfigUpdate {
            top_up_rate: None,
            enabled_modes: Some(vec!["bogus".to_string()]),
        });
        assert_eq!(config.enabled_modes.len(), 10);
    }

    #[test]
    fn test_apply_updates_rate_and_modes() {
        let mut config = SourcingConfig::default();
        config.apply(SourcingConfigUpdate {
            top_up_rate: Some(-0.2),
            enabled_modes: Some(vec!["sing".to_string(), "hum".to_string()]),
        });
        assert_eq!(config.top_up_rate, 0.0);
        assert_eq!(config.enabled_modes, vec![Mode::Sing, Mode::Hum]);
    }
}
