//! Pure scoring primitives for hybrid retrieval.
//!
//! Everything here is stateless: similarity, literal and recency boosts,
//! type bonuses, and the weighted combination. Stored vectors are unit-norm,
//! so similarity is a dot product; the kernel still normalizes defensively
//! for callers (tests, external tools) that pass raw vectors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{MemoryKind, epoch_now};

/// Default half-life for the long recency decay, in hours.
pub const DEFAULT_HALF_LIFE_HOURS: f32 = 72.0;

/// Half-life of the short ingest-side recency bonus, in seconds.
pub const SHORT_RECENCY_HALF_LIFE_SECS: f64 = 600.0;

/// Peak value of the short ingest-side recency bonus.
pub const SHORT_RECENCY_SCALE: f32 = 0.05;

/// Linear weights for combining score components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    /// Weight on semantic similarity.
    pub sim: f32,
    /// Weight on the literal substring boost.
    pub literal: f32,
    /// Weight on the recency bonus.
    pub recency: f32,
    /// Weight on the type bonus.
    pub kind: f32,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            sim: 1.0,
            literal: 0.2,
            recency: 0.15,
            kind: 0.05,
        }
    }
}

impl Weights {
    /// Weights that reduce the combination to pure similarity.
    #[must_use]
    pub const fn similarity_only() -> Self {
        Self {
            sim: 1.0,
            literal: 0.0,
            recency: 0.0,
            kind: 0.0,
        }
    }
}

/// Per-result component breakdown returned with search responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Combined weighted score.
    pub total: f32,
    /// Semantic similarity in [0, 1].
    pub similarity: f32,
    /// Literal substring boost.
    pub literal_boost: f32,
    /// Recency bonus in [0, 1].
    pub recency_bonus: f32,
    /// Type-specific bonus.
    pub type_bonus: f32,
}

/// Default type-bonus table for hybrid search.
#[must_use]
pub fn default_type_bonus_map() -> BTreeMap<MemoryKind, f32> {
    BTreeMap::from([(MemoryKind::Npc, 0.02), (MemoryKind::Location, 0.01)])
}

/// Plain dot product over the shared prefix of two vectors.
#[must_use]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Cosine similarity clipped to [0, 1].
///
/// Returns 0.0 when either vector is empty or zero-norm. Inputs are
/// normalized before the dot product so raw vectors score correctly.
#[must_use]
pub fn similarity(query: &[f32], item: &[f32]) -> f32 {
    if query.is_empty() || item.is_empty() {
        return 0.0;
    }
    let qn: f32 = query.iter().map(|x| x * x).sum::<f32>().sqrt();
    let inorm: f32 = item.iter().map(|x| x * x).sum::<f32>().sqrt();
    if qn == 0.0 || inorm == 0.0 {
        return 0.0;
    }
    (dot(query, item) / (qn * inorm)).clamp(0.0, 1.0)
}

/// Returns `boost` when `query` occurs in `text` case-insensitively, else 0.
#[must_use]
pub fn literal_boost(query: &str, text: &str, boost: f32) -> f32 {
    if query.is_empty() || text.is_empty() {
        return 0.0;
    }
    let needle = query.trim().to_lowercase();
    if !needle.is_empty() && text.to_lowercase().contains(&needle) {
        boost
    } else {
        0.0
    }
}

/// Exponential recency decay with the given half-life in hours.
///
/// Future timestamps return the maximum bonus of 1.0.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn recency_bonus(timestamp: f64, half_life_hours: f32) -> f32 {
    let age_hours = (epoch_now() - timestamp) / 3600.0;
    if age_hours <= 0.0 {
        return 1.0;
    }
    (-age_hours / f64::from(half_life_hours)).exp() as f32
}

/// Short-half-life bonus favoring just-ingested or just-seen items.
///
/// `0.5^(age_seconds / 600) · 0.05`, the decay used for ingest-side context
/// retrieval and NPC snapshot scoring.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn short_recency_bonus(timestamp: f64) -> f32 {
    let age_secs = (epoch_now() - timestamp).max(0.0);
    (0.5_f64.powf(age_secs / SHORT_RECENCY_HALF_LIFE_SECS) * f64::from(SHORT_RECENCY_SCALE)) as f32
}

/// Looks up a kind's bonus in the configured table, defaulting to 0.
#[must_use]
pub fn type_bonus(kind: MemoryKind, map: &BTreeMap<MemoryKind, f32>) -> f32 {
    map.get(&kind).copied().unwrap_or(0.0)
}

/// Fixed type-bonus table used by context retrieval (not configurable).
#[must_use]
pub const fn context_type_bonus(kind: MemoryKind) -> f32 {
    match kind {
        MemoryKind::Threat => 0.06,
        MemoryKind::Npc | MemoryKind::Relationship => 0.05,
        MemoryKind::Goal => 0.04,
        MemoryKind::Item => 0.02,
        _ => 0.0,
    }
}

/// Combines the four components with linear weights.
#[must_use]
pub fn combine(sim: f32, literal: f32, recency: f32, kind: f32, weights: &Weights) -> f32 {
    weights.sim * sim
        + weights.literal * literal
        + weights.recency * recency
        + weights.kind * kind
}
