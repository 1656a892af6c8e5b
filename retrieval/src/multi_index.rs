//! Multi-index context retrieval.
//!
//! Prompt assembly needs diverse context, not just the global top-k: a
//! threat two ranks below the cutoff matters more than a third restatement
//! of the same fact. This selection scores every candidate once, takes the
//! general top-k, then tops up from a relaxed pool with per-entity and
//! per-type quotas before a final rank by total score.

use std::collections::BTreeMap;

use lorekeep_core::Embedder;
use lorekeep_world::scoring;
use lorekeep_world::store::CandidateMemory;
use lorekeep_world::types::MemoryKind;

use crate::config::ContextRetrievalConfig;
use crate::engine::RetrievalEngine;
use crate::error::SearchError;

/// Pool size the entity/type top-up draws from.
const RELAXED_POOL: usize = 100;

/// How many distinct entities get a quota.
const TOP_ENTITIES: usize = 3;

/// Kinds that get a per-type quota, in priority order.
const QUOTA_KINDS: [MemoryKind; 4] = [
    MemoryKind::Threat,
    MemoryKind::Npc,
    MemoryKind::Goal,
    MemoryKind::Location,
];

/// A context-retrieval result with its score components.
#[derive(Debug, Clone)]
pub struct ScoredMemory {
    /// Combined score (`similarity + recency + bonus`).
    pub total: f32,
    /// Max of explanation- and window-vector similarity.
    pub similarity: f32,
    /// Short-half-life recency bonus.
    pub recency: f32,
    /// Context type bonus.
    pub bonus: f32,
    /// The underlying candidate.
    pub candidate: CandidateMemory,
}

impl ScoredMemory {
    /// Dedupe key: memory id, else `summary|timestamp`.
    #[must_use]
    pub fn key(&self) -> String {
        let id = self.candidate.entry.id.trim();
        if id.is_empty() {
            format!(
                "{}|{}",
                self.candidate.entry.summary, self.candidate.entry.timestamp
            )
        } else {
            id.to_string()
        }
    }
}

impl<E: Embedder> RetrievalEngine<E> {
    /// Retrieves diverse context memories for prompt assembly.
    ///
    /// Selection: global top `k_general` after thresholding (when the
    /// threshold empties the set, the unfiltered top `max(k_general, 10)`
    /// is kept); up to `k_per_entity` extra memories for each of the three
    /// most frequent entities in the leading results; up to `k_per_type`
    /// for each of threat/npc/goal/location — both drawn from the top-100
    /// pool under a relaxed threshold. Results dedupe by id and come back
    /// sorted by total score.
    pub async fn context_memories(
        &self,
        query: &str,
        config: &ContextRetrievalConfig,
    ) -> Result<Vec<ScoredMemory>, SearchError> {
        let candidates = self.store().collect_candidates().await?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let query_vector = self.store().embed_text(query).await?;

        let mut all_scored: Vec<ScoredMemory> = candidates
            .into_iter()
            .map(|candidate| score_for_context(&query_vector, candidate))
            .collect();
        all_scored.sort_by(|a, b| b.total.total_cmp(&a.total));

        let thresholded: Vec<&ScoredMemory> = match config.min_total_score {
            Some(threshold) => {
                let kept: Vec<&ScoredMemory> = all_scored
                    .iter()
                    .filter(|m| m.total >= threshold)
                    .collect();
                if kept.is_empty() {
                    // Keep enough unfiltered results for entity extraction.
                    all_scored.iter().take(config.k_general.max(10)).collect()
                } else {
                    kept
                }
            }
            None => all_scored.iter().collect(),
        };

        let mut selected_keys: Vec<String> = Vec::new();
        let mut results: Vec<ScoredMemory> = Vec::new();
        for scored in thresholded.iter().take(config.k_general).copied() {
            push_unique(&mut results, &mut selected_keys, scored);
        }

        let pool: Vec<&ScoredMemory> = all_scored.iter().take(RELAXED_POOL).collect();
        let relaxed_min = config
            .min_total_score
            .map_or(0.0, |threshold| (threshold * 0.5).min(0.1));

        // Entity quotas: most frequent entities across the leading results.
        let mut entity_counts: BTreeMap<String, usize> = BTreeMap::new();
        for scored in thresholded.iter().take(config.k_general * 3) {
            for entity in &scored.candidate.entry.entities {
                let entity = entity.trim();
                if !entity.is_empty() {
                    *entity_counts.entry(entity.to_string()).or_default() += 1;
                }
            }
        }
        let mut top_entities: Vec<(String, usize)> = entity_counts.into_iter().collect();
        top_entities.sort_by(|a, b| b.1.cmp(&a.1));
        for (entity, _) in top_entities.into_iter().take(TOP_ENTITIES) {
            let entity_lower = entity.to_lowercase();
            let mut added = 0;
            for scored in pool.iter().copied() {
                if added >= config.k_per_entity {
                    break;
                }
                if scored.total < relaxed_min {
                    continue;
                }
                let mentions = scored
                    .candidate
                    .entry
                    .entities
                    .iter()
                    .any(|e| e.to_lowercase() == entity_lower);
                if mentions && push_unique(&mut results, &mut selected_keys, scored) {
                    added += 1;
                }
            }
        }

        // Type quotas for the kinds that matter in play.
        for kind in QUOTA_KINDS {
            let mut added = 0;
            for scored in pool.iter().copied() {
                if added >= config.k_per_type {
                    break;
                }
                if scored.total < relaxed_min || scored.candidate.entry.kind != kind {
                    continue;
                }
                if push_unique(&mut results, &mut selected_keys, scored) {
                    added += 1;
                }
            }
        }

        results.sort_by(|a, b| b.total.total_cmp(&a.total));
        Ok(results)
    }
}

fn score_for_context(query_vector: &[f32], candidate: CandidateMemory) -> ScoredMemory {
    let entry = &candidate.entry;
    let base = entry
        .vector
        .as_deref()
        .map_or(0.0, |v| scoring::similarity(query_vector, v));
    let window = entry
        .window_vector
        .as_deref()
        .map_or(f32::NEG_INFINITY, |v| scoring::similarity(query_vector, v));
    let similarity = base.max(window);
    let recency = scoring::short_recency_bonus(entry.timestamp);
    let bonus = scoring::context_type_bonus(entry.kind);
    ScoredMemory {
        total: similarity + recency + bonus,
        similarity,
        recency,
        bonus,
        candidate,
    }
}

fn push_unique(
    results: &mut Vec<ScoredMemory>,
    keys: &mut Vec<String>,
    scored: &ScoredMemory,
) -> bool {
    let key = scored.key();
    if keys.contains(&key) {
        return false;
    }
    keys.push(key);
    results.push(scored.clone());
    true
}
