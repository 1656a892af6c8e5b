//! The world store: session memories, NPC index, location graph, and the
//! in-memory side of ingest shards.
//!
//! One async mutex guards all mutable state. Embedding calls happen while
//! holding it, which serializes insertions; at the intended scale (up to
//! ~10^5 memories, milliseconds per embed) that is the simplest correct
//! arrangement. Internal helpers operate on the locked state directly so no
//! code path ever re-locks.

use std::collections::BTreeMap;

use lorekeep_core::{Embedder, Embedding, l2_normalize};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, WorldError};
use crate::graph::{LocationNode, WorldGraph};
use crate::scoring;
use crate::shard::ShardData;
use crate::types::{
    MemoryEntry, MemoryKind, NpcPayload, NpcSnapshot, canonical_name, canonical_text,
    clip_chars, content_hash, epoch_now, sanitize_entities, squash_whitespace,
};

/// Default similarity threshold for insert-time dedupe.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.75;

/// How many recent entries the insert-time dedupe scans.
const DEDUPE_WINDOW: usize = 10;

/// Maximum stored length of a shard name.
const SHARD_NAME_MAX: usize = 120;

/// A fact waiting to be inserted via [`WorldStore::add_memory`].
#[derive(Debug, Clone)]
pub struct NewMemory {
    summary: String,
    kind: MemoryKind,
    entities: Vec<String>,
    confidence: f32,
    npc: Option<NpcPayload>,
    source_context: Option<String>,
    dedupe_check: bool,
    similarity_threshold: f32,
}

impl NewMemory {
    /// Starts a new fact with the given summary and kind.
    #[must_use]
    pub fn new(summary: impl Into<String>, kind: MemoryKind) -> Self {
        Self {
            summary: summary.into(),
            kind,
            entities: Vec::new(),
            confidence: 0.0,
            npc: None,
            source_context: None,
            dedupe_check: false,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }

    /// Sets the entity mentions (sanitized on insert).
    #[must_use]
    pub fn with_entities<I, S>(mut self, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entities = entities.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the extractor confidence.
    #[must_use]
    pub const fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    /// Attaches a structured NPC payload.
    #[must_use]
    pub fn with_npc(mut self, npc: NpcPayload) -> Self {
        self.npc = Some(npc);
        self
    }

    /// Attaches a short provenance string.
    #[must_use]
    pub fn with_source_context(mut self, context: impl Into<String>) -> Self {
        self.source_context = Some(context.into());
        self
    }

    /// Enables the recent-window dedupe check.
    #[must_use]
    pub const fn with_dedupe(mut self, dedupe: bool) -> Self {
        self.dedupe_check = dedupe;
        self
    }

    /// Overrides the dedupe similarity threshold.
    #[must_use]
    pub const fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }
}

/// An NPC snapshot with its retrieval score.
#[derive(Debug, Clone)]
pub struct ScoredNpc {
    /// Combined similarity-plus-recency score.
    pub score: f32,
    /// The snapshot itself.
    pub snapshot: NpcSnapshot,
}

/// A memory entry paired with its origin for retrieval.
#[derive(Debug, Clone)]
pub struct CandidateMemory {
    /// Shard id the entry came from; `None` for session memories.
    pub shard: Option<String>,
    /// The entry, with vectors present.
    pub entry: MemoryEntry,
}

/// Count-only view of store state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StateSummary {
    /// Session memories.
    pub memories: usize,
    /// NPC snapshots in the session index.
    pub npcs: usize,
    /// Nodes in the live location graph.
    pub locations: usize,
    /// In-memory shards.
    pub shards: usize,
    /// Memories across all in-memory shards.
    pub shard_memories: usize,
}

/// Serializable session world state, used by snapshot export/import.
///
/// Entry vectors are `#[serde(skip)]`, so a snapshot never contains them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Session memories, vectors stripped.
    #[serde(default)]
    pub memories: Vec<MemoryEntry>,
    /// Session NPC index.
    #[serde(default)]
    pub npc_index: BTreeMap<String, NpcSnapshot>,
    /// Live location graph.
    #[serde(default)]
    pub location_graph: WorldGraph,
}

#[derive(Debug, Default)]
struct ShardState {
    name: Option<String>,
    subgraph: BTreeMap<String, LocationNode>,
    memories: Vec<MemoryEntry>,
    npc_index: BTreeMap<String, NpcSnapshot>,
}

#[derive(Debug, Default)]
struct WorldState {
    memories: Vec<MemoryEntry>,
    npc_index: BTreeMap<String, NpcSnapshot>,
    graph: WorldGraph,
    shards: BTreeMap<String, ShardState>,
}

/// Thread-safe world memory over any [`Embedder`].
#[derive(Debug)]
pub struct WorldStore<E> {
    embedder: E,
    state: async_lock::Mutex<WorldState>,
}

impl<E: Embedder> WorldStore<E> {
    /// Creates an empty store owning the given embedder.
    #[must_use]
    pub fn new(embedder: E) -> Self {
        Self {
            embedder,
            state: async_lock::Mutex::new(WorldState::default()),
        }
    }

    /// Returns the embedder.
    pub const fn embedder(&self) -> &E {
        &self.embedder
    }

    /// Embeds text and normalizes the result to unit length.
    ///
    /// # Errors
    /// Returns [`WorldError::Embedding`] when the backend fails.
    pub async fn embed_text(&self, text: &str) -> Result<Embedding> {
        let mut vector = self
            .embedder
            .embed(text)
            .await
            .map_err(WorldError::Embedding)?;
        l2_normalize(&mut vector);
        Ok(vector)
    }

    /// Stores a durable world fact, returning its id.
    ///
    /// With dedupe enabled, the candidate vector is compared against the
    /// last [`DEDUPE_WINDOW`] entries first; a hit returns the existing id
    /// without inserting. An `npc`-kind fact with a payload also upserts the
    /// NPC snapshot index and, when the payload names a live graph node,
    /// records the NPC as present there.
    pub async fn add_memory(&self, new: NewMemory) -> Result<String> {
        let entities = sanitize_entities(&new.entities);
        let text = canonical_text(new.kind, &new.summary, &entities, new.source_context.as_deref());

        let mut state = self.state.lock().await;
        let vector = self.embed_text(&text).await?;

        if new.dedupe_check {
            let recent = state.memories.iter().rev().take(DEDUPE_WINDOW);
            for existing in recent {
                if let Some(existing_vector) = &existing.vector {
                    if scoring::similarity(&vector, existing_vector) >= new.similarity_threshold {
                        return Ok(existing.id.clone());
                    }
                }
            }
        }

        let now = epoch_now();
        let id = Uuid::new_v4().to_string();
        let entry = MemoryEntry {
            id: id.clone(),
            summary: new.summary.clone(),
            kind: new.kind,
            entities,
            confidence: new.confidence,
            timestamp: now,
            source_context: new.source_context,
            explanation: None,
            window_text: None,
            npc: new.npc.clone(),
            vector: Some(vector),
            window_vector: None,
        };
        state.memories.push(entry);

        if new.kind == MemoryKind::Npc {
            if let Some(payload) = &new.npc {
                upsert_npc(&mut state, payload, Some(&new.summary), now);
            }
        }

        Ok(id)
    }

    /// Returns the top-k session memories by raw semantic similarity.
    ///
    /// This is the raw semantic channel over the session layer only; ranked
    /// retrieval across shards lives in the retrieval engine.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<MemoryEntry>> {
        let query_vector = self.embed_text(query).await?;
        let state = self.state.lock().await;
        let mut scored: Vec<(f32, &MemoryEntry)> = state
            .memories
            .iter()
            .map(|m| {
                let score = m
                    .vector
                    .as_deref()
                    .map_or(0.0, |v| scoring::similarity(&query_vector, v));
                (score, m)
            })
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        Ok(scored.into_iter().take(k).map(|(_, m)| m.clone()).collect())
    }

    /// Scores NPC snapshots against a query and returns the top-k.
    ///
    /// The candidate set is the session index merged over every shard index,
    /// session entries winning on key collision. Score is embedding
    /// similarity of a compact text representation plus the short recency
    /// bonus. When `min_score` filters everything out, the single best
    /// snapshot is kept so callers always get context if any NPCs exist.
    pub async fn npc_snapshots_scored(
        &self,
        query: &str,
        k: usize,
        min_score: Option<f32>,
    ) -> Result<Vec<ScoredNpc>> {
        let query_vector = self.embed_text(query).await?;
        let state = self.state.lock().await;

        let mut combined: BTreeMap<&str, &NpcSnapshot> = BTreeMap::new();
        for (key, snapshot) in &state.npc_index {
            combined.insert(key.as_str(), snapshot);
        }
        for shard in state.shards.values() {
            for (key, snapshot) in &shard.npc_index {
                combined.entry(key.as_str()).or_insert(snapshot);
            }
        }
        if combined.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<ScoredNpc> = Vec::with_capacity(combined.len());
        for snapshot in combined.into_values() {
            let text = npc_text_representation(snapshot);
            let similarity = if text.is_empty() {
                1.0
            } else {
                let vector = self.embed_text(&text).await?;
                scoring::similarity(&query_vector, &vector)
            };
            let score = similarity + scoring::short_recency_bonus(snapshot.last_seen_time);
            scored.push(ScoredNpc {
                score,
                snapshot: snapshot.clone(),
            });
        }

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        if let Some(threshold) = min_score {
            let kept: Vec<ScoredNpc> = scored
                .iter()
                .filter(|s| s.score >= threshold)
                .cloned()
                .collect();
            scored = if kept.is_empty() {
                scored.into_iter().take(1).collect()
            } else {
                kept
            };
        }
        scored.truncate(k);
        Ok(scored)
    }

    /// Gathers every session and shard memory, computing and caching any
    /// missing vectors on the way.
    ///
    /// Entries whose embedding fails are skipped (and logged) so one bad
    /// entry cannot take retrieval down.
    pub async fn collect_candidates(&self) -> Result<Vec<CandidateMemory>> {
        let mut state = self.state.lock().await;
        let mut out: Vec<CandidateMemory> = state
            .memories
            .iter()
            .map(|entry| CandidateMemory {
                shard: None,
                entry: entry.clone(),
            })
            .collect();

        let shard_ids: Vec<String> = state.shards.keys().cloned().collect();
        for shard_id in shard_ids {
            let Some(shard) = state.shards.get_mut(&shard_id) else {
                continue;
            };
            for entry in &mut shard.memories {
                if entry.vector.is_none() {
                    let text = entry.embedding_text();
                    match embed_unit(&self.embedder, &text).await {
                        Ok(vector) => entry.vector = Some(vector),
                        Err(error) => {
                            tracing::debug!(shard = %shard_id, error = %error, "skipping entry with failed embedding");
                            continue;
                        }
                    }
                }
                if entry.window_vector.is_none() {
                    if let Some(window) = entry.window_text.as_deref() {
                        if !window.trim().is_empty() {
                            if let Ok(vector) = embed_unit(&self.embedder, window).await {
                                entry.window_vector = Some(vector);
                            }
                        }
                    }
                }
                out.push(CandidateMemory {
                    shard: Some(shard_id.clone()),
                    entry: entry.clone(),
                });
            }
        }
        Ok(out)
    }

    // ---------------- Shard layer ----------------

    /// Creates empty shard containers for an id if they do not exist.
    pub async fn ensure_shard(&self, shard_id: &str) {
        let mut state = self.state.lock().await;
        state.shards.entry(shard_id.to_string()).or_default();
    }

    /// Appends a memory entry to a shard.
    pub async fn add_shard_memory(&self, shard_id: &str, entry: MemoryEntry) {
        let mut state = self.state.lock().await;
        state
            .shards
            .entry(shard_id.to_string())
            .or_default()
            .memories
            .push(entry);
    }

    /// Inserts or replaces a location node in a shard's subgraph.
    pub async fn upsert_shard_location(&self, shard_id: &str, node: LocationNode) {
        let mut state = self.state.lock().await;
        state
            .shards
            .entry(shard_id.to_string())
            .or_default()
            .subgraph
            .insert(node.name.clone(), node);
    }

    /// Returns whether a shard subgraph already has a node by name.
    pub async fn shard_has_location(&self, shard_id: &str, name: &str) -> bool {
        let state = self.state.lock().await;
        state
            .shards
            .get(shard_id)
            .is_some_and(|s| s.subgraph.contains_key(name))
    }

    /// Upserts an NPC snapshot into a shard's index.
    pub async fn add_shard_npc_update(
        &self,
        shard_id: &str,
        payload: &NpcPayload,
        source_summary: Option<&str>,
    ) {
        let name = payload.name.trim();
        if name.is_empty() {
            return;
        }
        let key = canonical_name(name);
        let now = epoch_now();
        let mut state = self.state.lock().await;
        let shard = state.shards.entry(shard_id.to_string()).or_default();
        let snapshot = shard
            .npc_index
            .entry(key)
            .or_insert_with(|| NpcSnapshot::new(name));
        snapshot.apply(payload, source_summary, now);
    }

    /// Sets a shard's display name, normalized and capped at 120 chars.
    ///
    /// Returns the stored name; `None` when the input normalizes to empty.
    pub async fn set_shard_name(&self, shard_id: &str, name: &str) -> Option<String> {
        let cleaned = clip_chars(&squash_whitespace(name), SHARD_NAME_MAX);
        if cleaned.is_empty() {
            return None;
        }
        let mut state = self.state.lock().await;
        state.shards.entry(shard_id.to_string()).or_default().name = Some(cleaned.clone());
        Some(cleaned)
    }

    /// Returns a shard's display name, if set.
    pub async fn shard_name(&self, shard_id: &str) -> Option<String> {
        let state = self.state.lock().await;
        state.shards.get(shard_id).and_then(|s| s.name.clone())
    }

    /// Number of memories currently in a shard.
    pub async fn shard_memory_count(&self, shard_id: &str) -> usize {
        let state = self.state.lock().await;
        state.shards.get(shard_id).map_or(0, |s| s.memories.len())
    }

    /// Collapses duplicate shard entries.
    ///
    /// Runs only once a shard holds at least `min_len` entries. Entries
    /// grouped by `(lowercased summary, sorted lowercased entities)` are
    /// reduced to the highest-confidence member, keeping first-seen group
    /// order.
    pub async fn consolidate_shard(&self, shard_id: &str, min_len: usize) {
        let mut state = self.state.lock().await;
        let Some(shard) = state.shards.get_mut(shard_id) else {
            return;
        };
        if shard.memories.len() < min_len {
            return;
        }

        let mut groups: Vec<(String, MemoryEntry)> = Vec::new();
        for entry in shard.memories.drain(..) {
            let summary_key = canonical_name(&entry.summary);
            let mut entity_keys: Vec<String> = sanitize_entities(&entry.entities)
                .iter()
                .map(|e| e.to_lowercase())
                .collect();
            entity_keys.sort();
            let key = format!("{summary_key}##{}", entity_keys.join("|"));

            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, kept)) => {
                    if entry.confidence >= kept.confidence {
                        *kept = entry;
                    }
                }
                None => groups.push((key, entry)),
            }
        }
        shard.memories = groups.into_iter().map(|(_, entry)| entry).collect();
    }

    /// Clones a shard's contents for persistence.
    ///
    /// # Errors
    /// Returns [`WorldError::ShardNotFound`] when the shard is not in memory.
    pub async fn export_shard(&self, shard_id: &str) -> Result<ShardData> {
        let state = self.state.lock().await;
        let shard = state
            .shards
            .get(shard_id)
            .ok_or_else(|| WorldError::ShardNotFound(shard_id.to_string()))?;
        Ok(ShardData {
            name: shard.name.clone(),
            subgraph: shard.subgraph.clone(),
            memories: shard.memories.clone(),
            npc_index: shard.npc_index.clone(),
        })
    }

    /// Installs shard data loaded from disk, eagerly rebuilding vectors.
    ///
    /// Each entry gets a stable id if missing, a primary vector from its
    /// explanation (else canonical text), a window vector when window text
    /// exists, and a timestamp anchored at load time. Entries whose
    /// embedding fails stay vectorless and are computed on demand later.
    ///
    /// Returns `(locations, memories)` counts.
    pub async fn install_shard(&self, shard_id: &str, data: ShardData) -> Result<(usize, usize)> {
        let mut state = self.state.lock().await;
        let now = epoch_now();
        let mut memories = data.memories;
        for entry in &mut memories {
            if entry.id.trim().is_empty() {
                entry.id = Uuid::new_v4().to_string();
            }
            let text = entry.embedding_text();
            match embed_unit(&self.embedder, &text).await {
                Ok(vector) => entry.vector = Some(vector),
                Err(error) => {
                    tracing::warn!(shard = %shard_id, error = %error, "failed to rebuild entry vector on load");
                    continue;
                }
            }
            if let Some(window) = entry.window_text.as_deref() {
                if !window.trim().is_empty() {
                    if let Ok(vector) = embed_unit(&self.embedder, window).await {
                        entry.window_vector = Some(vector);
                    }
                }
            }
            entry.timestamp = now;
        }

        let locations = data.subgraph.len();
        let count = memories.len();
        let name = data
            .name
            .map(|n| clip_chars(&squash_whitespace(&n), SHARD_NAME_MAX))
            .filter(|n| !n.is_empty());
        state.shards.insert(
            shard_id.to_string(),
            ShardState {
                name,
                subgraph: data.subgraph,
                memories,
                npc_index: data.npc_index,
            },
        );
        Ok((locations, count))
    }

    /// Drops a shard's in-memory containers. Disk files are untouched.
    pub async fn remove_shard(&self, shard_id: &str) -> bool {
        let mut state = self.state.lock().await;
        state.shards.remove(shard_id).is_some()
    }

    // ---------------- Live graph access ----------------

    /// Clones the node the player currently occupies.
    pub async fn current_location(&self) -> Option<LocationNode> {
        let state = self.state.lock().await;
        state.graph.current_location().cloned()
    }

    /// Returns the current player location name.
    pub async fn player_location(&self) -> Option<String> {
        let state = self.state.lock().await;
        state.graph.player_location.clone()
    }

    /// Moves the player to a node that must already exist.
    pub async fn move_player(&self, target: &str) -> bool {
        let mut state = self.state.lock().await;
        state.graph.move_player(target)
    }

    /// Adds a location node to the live graph if the name is unused.
    pub async fn add_location_if_absent(&self, node: LocationNode) -> bool {
        let mut state = self.state.lock().await;
        state.graph.add_location_if_absent(node)
    }

    /// Adds an edge between existing live-graph nodes.
    pub async fn add_connection(
        &self,
        from: &str,
        to: &str,
        description: &str,
        travel_verb: Option<String>,
    ) -> bool {
        let mut state = self.state.lock().await;
        state.graph.add_connection(from, to, description, travel_verb)
    }

    // ---------------- Snapshot support ----------------

    /// Exports the session layer (memories, NPC index, live graph).
    pub async fn export_world(&self) -> WorldSnapshot {
        let state = self.state.lock().await;
        WorldSnapshot {
            memories: state.memories.clone(),
            npc_index: state.npc_index.clone(),
            location_graph: state.graph.clone(),
        }
    }

    /// Replaces the session layer with a snapshot and rebuilds embeddings.
    pub async fn replace_world(&self, snapshot: WorldSnapshot) -> Result<StateSummary> {
        let mut state = self.state.lock().await;
        let now = epoch_now();
        state.npc_index = snapshot.npc_index;
        state.graph = snapshot.location_graph;
        state.memories = snapshot.memories;
        for entry in &mut state.memories {
            if entry.id.trim().is_empty() {
                entry.id = Uuid::new_v4().to_string();
            }
            if entry.timestamp == 0.0 {
                entry.timestamp = now;
            }
            rebuild_vectors(&self.embedder, entry).await;
        }
        Ok(summarize(&state))
    }

    /// Merges a snapshot into the session layer without clearing anything.
    ///
    /// Memories deduplicate by id when present, else by a hash of the
    /// lowercased canonical text; only newly added entries are embedded. NPC
    /// snapshots union by key with field-level updates on collision. The
    /// location graph unions per [`WorldGraph::absorb`].
    pub async fn merge_world(&self, snapshot: WorldSnapshot) -> Result<StateSummary> {
        let mut state = self.state.lock().await;
        let now = epoch_now();

        let mut known: Vec<String> = state.memories.iter().map(memory_merge_key).collect();
        for mut incoming in snapshot.memories {
            let key = memory_merge_key(&incoming);
            if known.contains(&key) {
                continue;
            }
            if incoming.id.trim().is_empty() {
                incoming.id = Uuid::new_v4().to_string();
            }
            if incoming.timestamp == 0.0 {
                incoming.timestamp = now;
            }
            rebuild_vectors(&self.embedder, &mut incoming).await;
            known.push(key);
            state.memories.push(incoming);
        }

        for (key, incoming) in snapshot.npc_index {
            match state.npc_index.entry(key) {
                std::collections::btree_map::Entry::Vacant(slot) => {
                    slot.insert(incoming);
                }
                std::collections::btree_map::Entry::Occupied(mut slot) => {
                    update_npc_fields(slot.get_mut(), incoming);
                }
            }
        }

        state.graph.absorb(snapshot.location_graph);
        Ok(summarize(&state))
    }

    /// Replaces all state (session and in-memory shards) with empty.
    ///
    /// Shards on disk are untouched.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        *state = WorldState::default();
    }

    /// Count-only summary without blocking.
    ///
    /// Returns `None` when the store lock is currently held elsewhere.
    pub fn state_summary(&self) -> Option<StateSummary> {
        self.state.try_lock().map(|state| summarize(&state))
    }
}

fn summarize(state: &WorldState) -> StateSummary {
    StateSummary {
        memories: state.memories.len(),
        npcs: state.npc_index.len(),
        locations: state.graph.locations.len(),
        shards: state.shards.len(),
        shard_memories: state.shards.values().map(|s| s.memories.len()).sum(),
    }
}

fn memory_merge_key(entry: &MemoryEntry) -> String {
    let id = entry.id.trim();
    if !id.is_empty() {
        return format!("id:{id}");
    }
    let text = entry.canonical_text().trim().to_lowercase();
    format!("txt:{:016x}", content_hash(&text))
}

/// Field-level NPC update for snapshot merges: incoming wins for every field
/// it actually carries; absent or default fields leave the current value.
fn update_npc_fields(current: &mut NpcSnapshot, incoming: NpcSnapshot) {
    if !incoming.name.trim().is_empty() {
        current.name = incoming.name;
    }
    if !incoming.aliases.is_empty() {
        current.aliases = incoming.aliases;
    }
    if incoming.last_seen_location.is_some() {
        current.last_seen_location = incoming.last_seen_location;
    }
    if incoming.last_seen_time > 0.0 {
        current.last_seen_time = incoming.last_seen_time;
    }
    if incoming.intent.is_some() {
        current.intent = incoming.intent;
    }
    if incoming.relationship_to_player != crate::types::Relationship::Unknown {
        current.relationship_to_player = incoming.relationship_to_player;
    }
    if !incoming.history.is_empty() {
        current.history = incoming.history;
    }
    if incoming.confidence > 0.0 {
        current.confidence = incoming.confidence;
    }
}

async fn embed_unit<E: Embedder>(embedder: &E, text: &str) -> lorekeep_core::Result<Embedding> {
    let mut vector = embedder.embed(text).await?;
    l2_normalize(&mut vector);
    Ok(vector)
}

async fn rebuild_vectors<E: Embedder>(embedder: &E, entry: &mut MemoryEntry) {
    let text = entry.embedding_text();
    match embed_unit(embedder, &text).await {
        Ok(vector) => entry.vector = Some(vector),
        Err(error) => {
            tracing::warn!(memory = %entry.id, error = %error, "failed to rebuild memory vector");
        }
    }
    if let Some(window) = entry.window_text.as_deref() {
        if !window.trim().is_empty() {
            if let Ok(vector) = embed_unit(embedder, window).await {
                entry.window_vector = Some(vector);
            }
        }
    }
}

fn upsert_npc(state: &mut WorldState, payload: &NpcPayload, history_line: Option<&str>, now: f64) {
    let name = payload.name.trim();
    if name.is_empty() {
        return;
    }
    let key = canonical_name(name);
    let snapshot = state
        .npc_index
        .entry(key.clone())
        .or_insert_with(|| NpcSnapshot::new(name));
    snapshot.apply(payload, history_line, now);

    // Reflect presence on the matching live node for the location block.
    if let Some(location) = payload.last_seen_location.as_deref() {
        let location = location.trim();
        if let Some(node) = state.graph.locations.get_mut(location) {
            if !node.npcs_present.contains(&key) {
                node.npcs_present.push(key);
            }
        }
    }
}

/// Compact text representation of an NPC used for snapshot scoring:
/// `name | aliases… | intent | last seen | canonical last seen`.
fn npc_text_representation(snapshot: &NpcSnapshot) -> String {
    let mut parts: Vec<String> = vec![snapshot.name.clone()];
    parts.extend(snapshot.aliases.iter().cloned());
    if let Some(intent) = snapshot.intent.as_deref() {
        parts.push(intent.to_string());
    }
    if let Some(location) = snapshot.last_seen_location.as_deref() {
        if !location.is_empty() {
            parts.push(location.to_string());
            let canon = canonical_name(location);
            if canon != location {
                parts.push(canon);
            }
        }
    }
    parts.retain(|p| !p.is_empty());
    parts.join(" | ")
}
