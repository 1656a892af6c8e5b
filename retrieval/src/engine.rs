//! The hybrid retrieval engine.

use std::sync::Arc;

use lorekeep_core::Embedder;
use lorekeep_world::scoring::{self, ScoreBreakdown, Weights};
use lorekeep_world::store::CandidateMemory;
use lorekeep_world::{MemoryKind, WorldStore};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::types::{K_MAX, QUERY_MAX_CHARS, SearchHit, SearchMode, SearchResponse, SourceInfo};

/// Ranked retrieval over session plus shard memories.
#[derive(Debug)]
pub struct RetrievalEngine<E> {
    store: Arc<WorldStore<E>>,
    config: SearchConfig,
}

impl<E: Embedder> RetrievalEngine<E> {
    /// Creates an engine with the default configuration.
    #[must_use]
    pub fn new(store: Arc<WorldStore<E>>) -> Self {
        Self::with_config(store, SearchConfig::default())
    }

    /// Creates an engine with a custom configuration.
    #[must_use]
    pub const fn with_config(store: Arc<WorldStore<E>>, config: SearchConfig) -> Self {
        Self { store, config }
    }

    /// Returns the active configuration.
    #[must_use]
    pub const fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<WorldStore<E>> {
        &self.store
    }

    /// Executes a search over all candidate memories.
    ///
    /// `k` clamps to 100. `types` is a comma-separated kind filter. `since`
    /// must be ISO-8601 **with offset**; offset-less input is rejected with
    /// [`SearchError::InvalidTimezone`].
    pub async fn search(
        &self,
        query: &str,
        mode: Option<SearchMode>,
        k: usize,
        types: Option<&str>,
        since: Option<&str>,
    ) -> Result<SearchResponse, SearchError> {
        let char_count = query.chars().count();
        if char_count == 0 || char_count > QUERY_MAX_CHARS {
            return Err(SearchError::InvalidQuery);
        }
        let mode = mode.unwrap_or(self.config.mode_default);
        let k = k.clamp(1, K_MAX);

        let kinds = types.and_then(parse_kinds);
        let since_ts = since.map(parse_since).transpose()?;

        let mut candidates = self.store.collect_candidates().await?;
        candidates.retain(|candidate| {
            if let Some(kinds) = &kinds {
                if !kinds.contains(&candidate.entry.kind) {
                    return false;
                }
            }
            if let Some(since_ts) = since_ts {
                if candidate.entry.timestamp < since_ts {
                    return false;
                }
            }
            true
        });

        let results = match mode {
            SearchMode::Literal => literal_hits(query, candidates, k),
            SearchMode::Semantic => {
                let query_vector = self.store.embed_text(query).await?;
                self.weighted_hits(
                    query,
                    &query_vector,
                    candidates,
                    k,
                    &Weights::similarity_only(),
                )
            }
            SearchMode::Hybrid => {
                let query_vector = self.store.embed_text(query).await?;
                let weights = self.config.weights;
                self.weighted_hits(query, &query_vector, candidates, k, &weights)
            }
        };

        Ok(SearchResponse {
            query: query.to_string(),
            mode,
            k,
            results,
        })
    }

    /// Scores one candidate against a query vector.
    pub(crate) fn breakdown(
        &self,
        query: &str,
        query_vector: &[f32],
        candidate: &CandidateMemory,
        weights: &Weights,
    ) -> ScoreBreakdown {
        let entry = &candidate.entry;
        let similarity = entry
            .vector
            .as_deref()
            .map_or(0.0, |v| scoring::similarity(query_vector, v));
        let text = entry.canonical_text();
        let literal = scoring::literal_boost(query, &text, self.config.literal_boost_value());
        let recency = scoring::recency_bonus(entry.timestamp, self.config.half_life_hours);
        let kind = scoring::type_bonus(entry.kind, &self.config.type_bonus_map);
        ScoreBreakdown {
            total: scoring::combine(similarity, literal, recency, kind, weights),
            similarity,
            literal_boost: literal,
            recency_bonus: recency,
            type_bonus: kind,
        }
    }

    fn weighted_hits(
        &self,
        query: &str,
        query_vector: &[f32],
        candidates: Vec<CandidateMemory>,
        k: usize,
        weights: &Weights,
    ) -> Vec<SearchHit> {
        let mut scored: Vec<(ScoreBreakdown, CandidateMemory)> = candidates
            .into_iter()
            .map(|candidate| {
                let breakdown = self.breakdown(query, query_vector, &candidate, weights);
                (breakdown, candidate)
            })
            .collect();
        // Stable sort: ties keep candidate-pool order.
        scored.sort_by(|a, b| b.0.total.total_cmp(&a.0.total));
        scored
            .into_iter()
            .take(k)
            .map(|(breakdown, candidate)| hit(candidate, breakdown))
            .collect()
    }
}

fn literal_hits(query: &str, candidates: Vec<CandidateMemory>, k: usize) -> Vec<SearchHit> {
    let needle = query.trim().to_lowercase();
    let mut matches: Vec<CandidateMemory> = candidates
        .into_iter()
        .filter(|candidate| {
            candidate
                .entry
                .canonical_text()
                .to_lowercase()
                .contains(&needle)
        })
        .collect();
    matches.sort_by(|a, b| b.entry.timestamp.total_cmp(&a.entry.timestamp));
    matches
        .into_iter()
        .take(k)
        .map(|candidate| {
            hit(
                candidate,
                ScoreBreakdown {
                    total: 1.0,
                    similarity: 0.0,
                    literal_boost: 1.0,
                    recency_bonus: 0.0,
                    type_bonus: 0.0,
                },
            )
        })
        .collect()
}

fn hit(candidate: CandidateMemory, breakdown: ScoreBreakdown) -> SearchHit {
    let entry = candidate.entry;
    let item_id = if entry.id.trim().is_empty() {
        Uuid::new_v4().to_string()
    } else {
        entry.id.clone()
    };
    SearchHit {
        item_id,
        kind: entry.kind,
        text: entry.canonical_text(),
        score: breakdown.total,
        explanation: breakdown,
        updated_at: iso_utc(entry.timestamp),
        source: candidate
            .shard
            .map_or_else(SourceInfo::session, SourceInfo::shard),
    }
}

/// Parses a comma-separated kind filter.
///
/// `None` (no filter) when the input has no non-empty tokens. Tokens that
/// are not exact kind names are dropped without falling back to `other`, so
/// a filter made entirely of unknown names yields `Some(vec![])` and
/// matches nothing.
fn parse_kinds(raw: &str) -> Option<Vec<MemoryKind>> {
    let tokens: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .collect();
    if tokens.is_empty() {
        return None;
    }
    Some(
        tokens
            .into_iter()
            .filter_map(MemoryKind::from_wire)
            .collect(),
    )
}

#[allow(clippy::cast_precision_loss)]
fn parse_since(raw: &str) -> Result<f64, SearchError> {
    OffsetDateTime::parse(raw, &Rfc3339)
        .map(|dt| dt.unix_timestamp_nanos() as f64 / 1e9)
        .map_err(|_| SearchError::InvalidTimezone(raw.to_string()))
}

fn iso_utc(timestamp: f64) -> String {
    #[allow(clippy::cast_possible_truncation)]
    let nanos = (timestamp * 1e9) as i128;
    OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lorekeep_core::l2_normalize;
    use lorekeep_world::types::epoch_now;
    use lorekeep_world::{MemoryEntry, NewMemory};
    use std::collections::BTreeMap;

    pub(crate) struct AxisEmbedder;

    impl Embedder for AxisEmbedder {
        fn dim(&self) -> usize {
            4
        }

        async fn embed(&self, text: &str) -> lorekeep_core::Result<Vec<f32>> {
            let lower = text.to_lowercase();
            let mut v = if lower.contains("ledger") || lower.contains("book") {
                vec![1.0, 0.2, 0.0, 0.0]
            } else if lower.contains("dinner") || lower.contains("cook") {
                vec![0.0, 0.0, 1.0, 0.0]
            } else if lower.contains("equal") {
                // Two "equal" memories land on the same axis as the query.
                vec![0.0, 1.0, 0.0, 0.0]
            } else {
                vec![0.2, 0.2, 0.2, 1.0]
            };
            l2_normalize(&mut v);
            Ok(v)
        }
    }

    async fn seeded_engine() -> RetrievalEngine<AxisEmbedder> {
        let store = Arc::new(WorldStore::new(AxisEmbedder));
        for (summary, kind) in [
            ("steal the ledger", MemoryKind::Goal),
            ("take the book", MemoryKind::Item),
            ("cook dinner", MemoryKind::Other),
        ] {
            store
                .add_memory(NewMemory::new(summary, kind))
                .await
                .unwrap();
        }
        RetrievalEngine::new(store)
    }

    #[tokio::test]
    async fn literal_mode_returns_only_substring_matches() {
        let engine = seeded_engine().await;
        let response = engine
            .search("ledger", Some(SearchMode::Literal), 10, None, None)
            .await
            .unwrap();
        assert_eq!(response.results.len(), 1);
        let hit = &response.results[0];
        assert!(hit.text.contains("steal the ledger"));
        assert!((hit.score - 1.0).abs() < 1e-6);
        assert!((hit.explanation.literal_boost - 1.0).abs() < 1e-6);
        assert_eq!(hit.explanation.similarity, 0.0);
        assert_eq!(hit.source, SourceInfo::session());
    }

    #[tokio::test]
    async fn semantic_mode_scores_are_pure_similarity() {
        let engine = seeded_engine().await;
        let response = engine
            .search("where is the ledger", Some(SearchMode::Semantic), 3, None, None)
            .await
            .unwrap();
        assert!(response.results[0].text.contains("ledger"));
        for hit in &response.results {
            assert!((hit.score - hit.explanation.similarity).abs() < 1e-6);
            assert!(hit.explanation.similarity >= 0.0 && hit.explanation.similarity <= 1.0);
            // Components are still reported for the breakdown.
            assert!(hit.explanation.recency_bonus > 0.0);
        }
    }

    #[tokio::test]
    async fn hybrid_with_zeroed_extras_equals_semantic() {
        let store = Arc::new(WorldStore::new(AxisEmbedder));
        for (summary, kind) in [
            ("steal the ledger", MemoryKind::Goal),
            ("take the book", MemoryKind::Item),
            ("cook dinner", MemoryKind::Other),
        ] {
            store
                .add_memory(NewMemory::new(summary, kind))
                .await
                .unwrap();
        }
        let zeroed = SearchConfig::builder()
            .weights(Weights {
                sim: 1.0,
                literal: 0.0,
                recency: 0.0,
                kind: 0.0,
            })
            .build();
        let engine = RetrievalEngine::with_config(store, zeroed);

        let hybrid = engine
            .search("the ledger", Some(SearchMode::Hybrid), 5, None, None)
            .await
            .unwrap();
        let semantic = engine
            .search("the ledger", Some(SearchMode::Semantic), 5, None, None)
            .await
            .unwrap();
        let hybrid_view: Vec<(&str, f32)> = hybrid
            .results
            .iter()
            .map(|h| (h.item_id.as_str(), h.score))
            .collect();
        let semantic_view: Vec<(&str, f32)> = semantic
            .results
            .iter()
            .map(|h| (h.item_id.as_str(), h.score))
            .collect();
        assert_eq!(hybrid_view, semantic_view);
    }

    #[tokio::test]
    async fn hybrid_type_bonus_breaks_similarity_ties() {
        let store = Arc::new(WorldStore::new(AxisEmbedder));
        store
            .add_memory(NewMemory::new("equal menace", MemoryKind::Threat))
            .await
            .unwrap();
        store
            .add_memory(NewMemory::new("equal trinket", MemoryKind::Item))
            .await
            .unwrap();
        let config = SearchConfig::builder()
            .type_bonus_map(BTreeMap::from([
                (MemoryKind::Threat, 0.06),
                (MemoryKind::Item, 0.02),
            ]))
            .build();
        let engine = RetrievalEngine::with_config(store, config);

        let response = engine
            .search("equal", Some(SearchMode::Hybrid), 2, None, None)
            .await
            .unwrap();
        assert_eq!(response.results[0].kind, MemoryKind::Threat);
        assert_eq!(response.results[1].kind, MemoryKind::Item);
        assert!(response.results[0].score > response.results[1].score);
    }

    #[tokio::test]
    async fn type_filter_restricts_candidates() {
        let engine = seeded_engine().await;
        let response = engine
            .search("anything", Some(SearchMode::Hybrid), 10, Some("goal,item"), None)
            .await
            .unwrap();
        assert_eq!(response.results.len(), 2);
        assert!(
            response
                .results
                .iter()
                .all(|h| matches!(h.kind, MemoryKind::Goal | MemoryKind::Item))
        );
    }

    #[tokio::test]
    async fn unknown_type_token_matches_nothing() {
        let engine = seeded_engine().await;
        // A typo'd or bogus kind must not widen to `other`-kind memories.
        let response = engine
            .search("anything", Some(SearchMode::Hybrid), 10, Some("threats"), None)
            .await
            .unwrap();
        assert!(response.results.is_empty());
        let response = engine
            .search("anything", Some(SearchMode::Hybrid), 10, Some("bogus,goal"), None)
            .await
            .unwrap();
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].kind, MemoryKind::Goal);
        // A blank filter means no filter at all.
        let response = engine
            .search("anything", Some(SearchMode::Hybrid), 10, Some(" , "), None)
            .await
            .unwrap();
        assert_eq!(response.results.len(), 3);
    }

    #[tokio::test]
    async fn since_filter_requires_offset() {
        let engine = seeded_engine().await;
        let err = engine
            .search("x", Some(SearchMode::Hybrid), 5, None, Some("2025-01-01T00:00:00"))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::InvalidTimezone(_)));

        // With an offset, recent memories pass the filter.
        let response = engine
            .search("x", Some(SearchMode::Hybrid), 5, None, Some("2020-01-01T00:00:00Z"))
            .await
            .unwrap();
        assert_eq!(response.results.len(), 3);

        // A future cutoff filters everything.
        let future = iso_utc(epoch_now() + 3600.0);
        let response = engine
            .search("x", Some(SearchMode::Hybrid), 5, None, Some(&future))
            .await
            .unwrap();
        assert!(response.results.is_empty());
    }

    #[tokio::test]
    async fn query_bounds_are_enforced_and_k_clamped() {
        let engine = seeded_engine().await;
        assert!(matches!(
            engine.search("", None, 5, None, None).await,
            Err(SearchError::InvalidQuery)
        ));
        let long = "q".repeat(513);
        assert!(matches!(
            engine.search(&long, None, 5, None, None).await,
            Err(SearchError::InvalidQuery)
        ));
        let response = engine.search("ok", None, 5000, None, None).await.unwrap();
        assert_eq!(response.k, 100);
        assert_eq!(response.mode, SearchMode::Hybrid);
    }

    #[tokio::test]
    async fn updated_at_is_iso_utc() {
        let engine = seeded_engine().await;
        let response = engine
            .search("ledger", Some(SearchMode::Literal), 1, None, None)
            .await
            .unwrap();
        let updated = &response.results[0].updated_at;
        assert!(updated.ends_with('Z'), "expected UTC suffix: {updated}");
        assert!(OffsetDateTime::parse(updated, &Rfc3339).is_ok());
    }

    #[tokio::test]
    async fn shard_memories_carry_shard_attribution() {
        let store = Arc::new(WorldStore::new(AxisEmbedder));
        store
            .add_shard_memory(
                "shard-7",
                MemoryEntry {
                    id: "m1".into(),
                    summary: "the ledger sits in the vault".into(),
                    kind: MemoryKind::Item,
                    timestamp: epoch_now(),
                    ..MemoryEntry::default()
                },
            )
            .await;
        let engine = RetrievalEngine::new(store);
        let response = engine
            .search("ledger", Some(SearchMode::Hybrid), 5, None, None)
            .await
            .unwrap();
        assert_eq!(response.results[0].source, SourceInfo::shard("shard-7"));
    }
}
