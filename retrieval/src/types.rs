//! Public search surface types.

use serde::{Deserialize, Serialize};

use lorekeep_world::MemoryKind;
use lorekeep_world::scoring::ScoreBreakdown;

use crate::error::SearchError;

/// Query surface bounds.
pub const QUERY_MAX_CHARS: usize = 512;

/// Upper clamp for `k`.
pub const K_MAX: usize = 100;

/// Search mode selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Substring match only, ordered by recency.
    Literal,
    /// Pure embedding similarity.
    Semantic,
    /// Weighted combination of all components.
    #[default]
    Hybrid,
}

impl SearchMode {
    /// Wire name of the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Literal => "literal",
            Self::Semantic => "semantic",
            Self::Hybrid => "hybrid",
        }
    }
}

impl core::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for SearchMode {
    type Err = SearchError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_lowercase().as_str() {
            "literal" => Ok(Self::Literal),
            "semantic" => Ok(Self::Semantic),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(SearchError::InvalidMode(other.to_string())),
        }
    }
}

/// Where a search hit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// A persistent shard produced during ingest.
    Ingest,
    /// The live session memory layer.
    Memory,
}

/// Source attribution of a search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Shard id, or `"session"` for session memories.
    pub shard: String,
    /// Origin layer.
    pub origin: Origin,
}

impl SourceInfo {
    /// Attribution for a session memory.
    #[must_use]
    pub fn session() -> Self {
        Self {
            shard: "session".to_string(),
            origin: Origin::Memory,
        }
    }

    /// Attribution for a shard memory.
    #[must_use]
    pub fn shard(id: impl Into<String>) -> Self {
        Self {
            shard: id.into(),
            origin: Origin::Ingest,
        }
    }
}

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    /// Memory id.
    pub item_id: String,
    /// Memory category.
    #[serde(rename = "type")]
    pub kind: MemoryKind,
    /// Searchable text of the memory.
    pub text: String,
    /// Combined score.
    pub score: f32,
    /// Component breakdown.
    pub explanation: ScoreBreakdown,
    /// Last update, ISO-8601 UTC.
    pub updated_at: String,
    /// Source attribution.
    pub source: SourceInfo,
}

/// Response envelope of the public search surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    /// Original query string.
    pub query: String,
    /// Mode that was used.
    pub mode: SearchMode,
    /// Effective `k` after clamping.
    pub k: usize,
    /// Ranked results.
    pub results: Vec<SearchHit>,
}
