//! Core data model: memory entries, NPC snapshots, and canonical text rules.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use lorekeep_core::Embedding;

/// Maximum number of history fragments kept per NPC snapshot.
pub const NPC_HISTORY_CAP: usize = 10;

/// Maximum length (in chars) of a single NPC history fragment.
pub const NPC_HISTORY_LINE_MAX: usize = 160;

/// Category of a stored memory.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// A named character fact; usually carries an [`NpcPayload`].
    Npc,
    /// A place in the world.
    Location,
    /// A notable object.
    Item,
    /// Something the player wants.
    Goal,
    /// A danger to the player.
    Threat,
    /// A durable change to the world at large.
    WorldState,
    /// A bond or rivalry between characters.
    Relationship,
    /// Anything else worth keeping.
    #[default]
    #[serde(other)]
    Other,
}

impl MemoryKind {
    /// Parses an exact wire name into a kind.
    ///
    /// Unlike deserialization, where unknown names degrade to
    /// [`MemoryKind::Other`] so stored data always loads, this returns
    /// `None` for anything that is not a concrete kind name. Filter tokens
    /// go through here so a typo selects nothing instead of every
    /// `other`-kind memory.
    #[must_use]
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "npc" => Some(Self::Npc),
            "location" => Some(Self::Location),
            "item" => Some(Self::Item),
            "goal" => Some(Self::Goal),
            "threat" => Some(Self::Threat),
            "world_state" => Some(Self::WorldState),
            "relationship" => Some(Self::Relationship),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    /// Returns the wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Npc => "npc",
            Self::Location => "location",
            Self::Item => "item",
            Self::Goal => "goal",
            Self::Threat => "threat",
            Self::WorldState => "world_state",
            Self::Relationship => "relationship",
            Self::Other => "other",
        }
    }
}

impl core::fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// NPC disposition toward the player.
///
/// [`Relationship::rank`] defines the escalation ranking: upserts may only
/// move a snapshot toward `Hostile`, never back down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    /// Indifferent.
    Neutral,
    /// Allied or warm.
    Friendly,
    /// Actively dangerous.
    Hostile,
    /// Disposition not yet established.
    #[default]
    #[serde(other)]
    Unknown,
}

impl Relationship {
    /// Numeric escalation rank (`hostile` highest).
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Neutral => 1,
            Self::Friendly => 2,
            Self::Hostile => 3,
        }
    }
}

impl PartialOrd for Relationship {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Relationship {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

/// Structured NPC data attached to an extracted memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NpcPayload {
    /// Display name.
    pub name: String,
    /// Alternate names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    /// Where the NPC was last seen, if mentioned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen_location: Option<String>,
    /// What the NPC seems to want.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    /// Disposition toward the player, if implied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_to_player: Option<Relationship>,
    /// Extractor confidence for this payload.
    #[serde(default)]
    pub confidence: f32,
}

/// A raw fact candidate as returned by an extraction prompt.
///
/// Drafts are lenient on purpose: unknown kinds fall back to
/// [`MemoryKind::Other`] and every field is defaulted, so a sloppy model
/// reply still parses and is filtered by confidence downstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MemoryDraft {
    /// Concise fact text.
    #[serde(default)]
    pub summary: String,
    /// Entities the fact mentions.
    #[serde(default)]
    pub entities: Vec<String>,
    /// Memory category.
    #[serde(rename = "type", default)]
    pub kind: MemoryKind,
    /// Extractor confidence in [0, 1].
    #[serde(default)]
    pub confidence: f32,
    /// Structured NPC data when a named character is involved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub npc: Option<NpcPayload>,
}

impl MemoryDraft {
    /// Whether the extractor explicitly reported nothing worth keeping.
    #[must_use]
    pub fn is_no_change(&self) -> bool {
        self.summary.trim().is_empty() || self.summary == "NO_CHANGES"
    }
}

/// Accumulated snapshot of an NPC, keyed by canonical name in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpcSnapshot {
    /// Display name as first seen.
    pub name: String,
    /// Alternate names, deduplicated by canonical form.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Most recent known location.
    #[serde(default)]
    pub last_seen_location: Option<String>,
    /// Epoch seconds of the last location update.
    #[serde(default)]
    pub last_seen_time: f64,
    /// Most recent known intent.
    #[serde(default)]
    pub intent: Option<String>,
    /// Disposition toward the player; escalates monotonically.
    #[serde(default)]
    pub relationship_to_player: Relationship,
    /// Ring of recent summary fragments, newest last.
    #[serde(default)]
    pub history: Vec<String>,
    /// Highest confidence seen across upserts.
    #[serde(default)]
    pub confidence: f32,
}

impl NpcSnapshot {
    /// Creates an empty snapshot for a display name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            last_seen_location: None,
            last_seen_time: 0.0,
            intent: None,
            relationship_to_player: Relationship::Unknown,
            history: Vec::new(),
            confidence: 0.0,
        }
    }

    /// Merges an incoming payload into this snapshot.
    ///
    /// Field precedence: aliases union by canonical form (the canonical name
    /// itself is never an alias); location and intent overwrite only when
    /// non-empty; relationship escalates monotonically; confidence keeps the
    /// maximum; `history_line` appends to a ring of the last
    /// [`NPC_HISTORY_CAP`] fragments.
    pub fn apply(&mut self, payload: &NpcPayload, history_line: Option<&str>, now: f64) {
        let own_key = canonical_name(&self.name);
        let mut known: Vec<String> = self.aliases.iter().map(|a| canonical_name(a)).collect();
        for alias in &payload.aliases {
            let key = canonical_name(alias);
            if !key.is_empty() && key != own_key && !known.contains(&key) {
                self.aliases.push(alias.clone());
                known.push(key);
            }
        }

        if let Some(location) = payload.last_seen_location.as_deref() {
            let location = location.trim();
            if !location.is_empty() {
                self.last_seen_location = Some(location.to_string());
                self.last_seen_time = now;
            }
        }

        if let Some(intent) = payload.intent.as_deref() {
            let intent = intent.trim();
            if !intent.is_empty() {
                self.intent = Some(intent.to_string());
            }
        }

        if let Some(relationship) = payload.relationship_to_player {
            if relationship.rank() >= self.relationship_to_player.rank() {
                self.relationship_to_player = relationship;
            }
        }

        self.confidence = self.confidence.max(payload.confidence);

        if let Some(line) = history_line {
            if !line.is_empty() {
                self.history.push(clip_chars(line, NPC_HISTORY_LINE_MAX));
                if self.history.len() > NPC_HISTORY_CAP {
                    let excess = self.history.len() - NPC_HISTORY_CAP;
                    self.history.drain(..excess);
                }
            }
        }
    }
}

/// A single durable world fact with dual optional embeddings.
///
/// The embeddings are deliberately `#[serde(skip)]`: they never reach disk
/// and are recomputed from `explanation` / `window_text` (or the canonical
/// text) whenever an entry is loaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Opaque unique identifier, stable across persistence.
    #[serde(default)]
    pub id: String,
    /// Short natural-language fact.
    pub summary: String,
    /// Memory category.
    #[serde(rename = "type", default = "default_kind")]
    pub kind: MemoryKind,
    /// Ordered, deduplicated entity mentions.
    #[serde(default)]
    pub entities: Vec<String>,
    /// Extractor confidence in [0, 1].
    #[serde(default)]
    pub confidence: f32,
    /// Epoch seconds; refreshed whenever the vector is recomputed.
    #[serde(default)]
    pub timestamp: f64,
    /// Short human-readable provenance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_context: Option<String>,
    /// One-line explanation derived from the provenance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    /// Full chunk text the fact was extracted from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_text: Option<String>,
    /// Structured NPC data when `kind == Npc`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub npc: Option<NpcPayload>,
    /// Primary embedding (explanation, else canonical text). Never persisted.
    #[serde(skip)]
    pub vector: Option<Embedding>,
    /// Secondary embedding of `window_text`. Never persisted.
    #[serde(skip)]
    pub window_vector: Option<Embedding>,
}

const fn default_kind() -> MemoryKind {
    MemoryKind::Other
}

impl MemoryEntry {
    /// Returns the canonical text used for the primary embedding fallback
    /// and for literal search.
    #[must_use]
    pub fn canonical_text(&self) -> String {
        canonical_text(
            self.kind,
            &self.summary,
            &self.entities,
            self.source_context.as_deref(),
        )
    }

    /// Text preferred for the primary embedding: the explanation when
    /// present, else the canonical text.
    #[must_use]
    pub fn embedding_text(&self) -> String {
        match self.explanation.as_deref().map(str::trim) {
            Some(explanation) if !explanation.is_empty() => explanation.to_string(),
            _ => self.canonical_text(),
        }
    }
}

/// Builds the canonical concatenation `[type] summary + entities + context`.
#[must_use]
pub fn canonical_text(
    kind: MemoryKind,
    summary: &str,
    entities: &[String],
    source_context: Option<&str>,
) -> String {
    let mut parts: Vec<String> = vec![format!("[{kind}]")];
    if !summary.is_empty() {
        parts.push(summary.to_string());
    }
    let entity_list = entities
        .iter()
        .filter(|e| !e.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    if !entity_list.is_empty() {
        parts.push(format!("Entities: {entity_list}"));
    }
    if let Some(context) = source_context.map(str::trim) {
        if !context.is_empty() {
            parts.push(format!("Context: {context}"));
        }
    }
    parts.join(" ")
}

/// Lowercased, single-spaced trim of a display name; the NPC index key and
/// alias comparison form.
#[must_use]
pub fn canonical_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Single-spaced trim that preserves case; used for shard names.
#[must_use]
pub fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trims, drops empties, and deduplicates case-insensitively while keeping
/// the first occurrence's spelling and position.
#[must_use]
pub fn sanitize_entities<I, S>(entities: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen: Vec<String> = Vec::new();
    let mut out = Vec::new();
    for entity in entities {
        let trimmed = entity.as_ref().trim();
        if trimmed.is_empty() {
            continue;
        }
        let key = trimmed.to_lowercase();
        if !seen.contains(&key) {
            seen.push(key);
            out.push(trimmed.to_string());
        }
    }
    out
}

/// Derives a one-line explanation from a memory's source context.
///
/// Contexts shaped like `"Player said: …\n\nDM responded: …"` collapse to
/// `"Player: … ; DM: …"`; anything else is compacted to a single line.
/// Output is capped at `max_len` chars with a trailing ellipsis. Returns
/// `None` for blank input.
#[must_use]
pub fn explanation_line(context: &str, max_len: usize) -> Option<String> {
    if context.trim().is_empty() {
        return None;
    }

    let mut player_part: Option<&str> = None;
    let mut dm_part: Option<&str> = None;
    for line in context.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let lower = line.to_lowercase();
        if player_part.is_none() && lower.starts_with("player said:") {
            player_part = Some(line["player said:".len()..].trim());
        } else if dm_part.is_none() && lower.starts_with("dm responded:") {
            dm_part = Some(line["dm responded:".len()..].trim());
        }
    }

    let text = if player_part.is_some() || dm_part.is_some() {
        let mut parts = Vec::new();
        if let Some(player) = player_part {
            parts.push(format!("Player: {player}"));
        }
        if let Some(dm) = dm_part {
            parts.push(format!("DM: {dm}"));
        }
        parts.join("; ")
    } else {
        context.trim().to_string()
    };

    let one_line = squash_whitespace(&text);
    if one_line.chars().count() > max_len {
        let mut clipped = clip_chars(&one_line, max_len.saturating_sub(1));
        clipped.push('…');
        Some(clipped)
    } else {
        Some(one_line)
    }
}

/// Truncates to at most `max` chars without splitting a code point.
#[must_use]
pub fn clip_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    text.chars().take(max).collect()
}

/// Current wall-clock time as fractional epoch seconds.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn epoch_now() -> f64 {
    time::OffsetDateTime::now_utc().unix_timestamp_nanos() as f64 / 1e9
}

/// Content hash used for text-level dedupe keys.
#[must_use]
pub fn content_hash(text: &str) -> u64 {
    xxhash_rust::xxh3::xxh3_64(text.as_bytes())
}
