//! Search and context-retrieval configuration.
//!
//! Every knob has a documented default and an environment key, so a deployed
//! instance can be tuned without code changes while tests use the builder.

use std::collections::BTreeMap;

use lorekeep_world::MemoryKind;
use lorekeep_world::scoring::{DEFAULT_HALF_LIFE_HOURS, Weights, default_type_bonus_map};

use crate::types::SearchMode;

/// Configuration for the public search surface.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    /// Mode used when a query does not specify one (`SEARCH_MODE_DEFAULT`).
    pub mode_default: SearchMode,
    /// Component weights (`SEARCH_W_SIM` / `W_LITERAL` / `W_REC` / `W_TYPE`).
    pub weights: Weights,
    /// Recency half-life in hours (`SEARCH_HALF_LIFE_HOURS`).
    pub half_life_hours: f32,
    /// Type bonus table (`SEARCH_TYPE_BONUS`, a JSON map).
    pub type_bonus_map: BTreeMap<MemoryKind, f32>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            mode_default: SearchMode::Hybrid,
            weights: Weights::default(),
            half_life_hours: DEFAULT_HALF_LIFE_HOURS,
            type_bonus_map: default_type_bonus_map(),
        }
    }
}

impl SearchConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a builder.
    #[must_use]
    pub fn builder() -> SearchConfigBuilder {
        SearchConfigBuilder::default()
    }

    /// Loads configuration from `SEARCH_*` environment variables, falling
    /// back to defaults for unset or unparseable values.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var("SEARCH_MODE_DEFAULT") {
            if let Ok(mode) = raw.parse() {
                config.mode_default = mode;
            }
        }
        config.weights.sim = env_f32("SEARCH_W_SIM", config.weights.sim);
        config.weights.literal = env_f32("SEARCH_W_LITERAL", config.weights.literal);
        config.weights.recency = env_f32("SEARCH_W_REC", config.weights.recency);
        config.weights.kind = env_f32("SEARCH_W_TYPE", config.weights.kind);
        config.half_life_hours = env_f32("SEARCH_HALF_LIFE_HOURS", config.half_life_hours);
        if let Ok(raw) = std::env::var("SEARCH_TYPE_BONUS") {
            match serde_json::from_str(&raw) {
                Ok(map) => config.type_bonus_map = map,
                Err(error) => {
                    tracing::warn!(error = %error, "ignoring malformed SEARCH_TYPE_BONUS");
                    config.type_bonus_map = BTreeMap::new();
                }
            }
        }
        config
    }

    /// The literal boost value; by convention the literal weight itself.
    #[must_use]
    pub const fn literal_boost_value(&self) -> f32 {
        self.weights.literal
    }
}

/// Builder for [`SearchConfig`].
#[derive(Debug, Default)]
pub struct SearchConfigBuilder {
    config: Option<SearchConfig>,
}

impl SearchConfigBuilder {
    fn config(&mut self) -> &mut SearchConfig {
        self.config.get_or_insert_with(SearchConfig::default)
    }

    /// Sets the default mode.
    #[must_use]
    pub fn mode_default(mut self, mode: SearchMode) -> Self {
        self.config().mode_default = mode;
        self
    }

    /// Sets the component weights.
    #[must_use]
    pub fn weights(mut self, weights: Weights) -> Self {
        self.config().weights = weights;
        self
    }

    /// Sets the recency half-life in hours.
    #[must_use]
    pub fn half_life_hours(mut self, hours: f32) -> Self {
        self.config().half_life_hours = hours;
        self
    }

    /// Sets the type bonus table.
    #[must_use]
    pub fn type_bonus_map(mut self, map: BTreeMap<MemoryKind, f32>) -> Self {
        self.config().type_bonus_map = map;
        self
    }

    /// Finalizes the configuration.
    #[must_use]
    pub fn build(mut self) -> SearchConfig {
        self.config.take().unwrap_or_default()
    }
}

/// Quotas and threshold for multi-index context retrieval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextRetrievalConfig {
    /// General top-k (`MEMORY_K_GENERAL`).
    pub k_general: usize,
    /// Per-entity quota (`MEMORY_K_PER_ENTITY`).
    pub k_per_entity: usize,
    /// Per-type quota (`MEMORY_K_PER_TYPE`).
    pub k_per_type: usize,
    /// Threshold on the combined score (`MEMORY_MIN_TOTAL_SCORE`).
    pub min_total_score: Option<f32>,
}

impl Default for ContextRetrievalConfig {
    fn default() -> Self {
        Self {
            k_general: 25,
            k_per_entity: 5,
            k_per_type: 3,
            min_total_score: Some(0.75),
        }
    }
}

impl ContextRetrievalConfig {
    /// Loads quotas from `MEMORY_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            k_general: env_usize("MEMORY_K_GENERAL", defaults.k_general),
            k_per_entity: env_usize("MEMORY_K_PER_ENTITY", defaults.k_per_entity),
            k_per_type: env_usize("MEMORY_K_PER_TYPE", defaults.k_per_type),
            min_total_score: Some(env_f32(
                "MEMORY_MIN_TOTAL_SCORE",
                defaults.min_total_score.unwrap_or(0.75),
            )),
        }
    }

    /// Replaces the threshold.
    #[must_use]
    pub const fn with_min_total_score(mut self, threshold: Option<f32>) -> Self {
        self.min_total_score = threshold;
        self
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}
