//! # lorekeep-conversation
//!
//! Orchestration of one chat turn: gather diverse context (world facts, NPC
//! cards, the current location), ask the planner for the narrator's reply,
//! then run the post-turn extractors — memory capture, movement inference,
//! and graph growth — as isolated best-effort tasks. A post-turn failure is
//! logged and swallowed; the reply always reaches the player.

pub mod context;

use std::sync::Arc;

use lorekeep_core::{Embedder, Message, Planner, Role, oneshot};
use lorekeep_retrieval::{ContextRetrievalConfig, RetrievalEngine, ScoredMemory};
use lorekeep_session::ChatLog;
use lorekeep_world::types::explanation_line;
use lorekeep_world::{
    LocationNode, MemoryDraft, MemoryKind, NewMemory, NpcPayload, Relationship, ScoredNpc,
    WorldStore, sanitize_entities,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::context::{
    LOCATION_CAP, NPC_CARD_LINE_CAP, WORLD_FACTS_CAP, format_location_context, format_npc_cards,
    format_world_facts, merge_context_blocks,
};

const ANALYZE_SYSTEM: &str = "You are analyzing a conversation between a player and DM to extract ONE important persistent fact.\n\
     Prefer new NPCs, threats, player goals, new locations, and important items.\n\
     Return ONLY a JSON object with keys summary, entities, type, confidence, and optional npc.\n\
     Types: npc|location|item|goal|threat|world_state|relationship|other.\n\
     If NO new persistent information, return {\"summary\": \"NO_CHANGES\", \"entities\": [], \"type\": \"other\", \"confidence\": 0.0}.";

const MOVEMENT_SYSTEM: &str = "You are a movement detector for a text RPG.\n\
     Given the player's message and the DM reply, decide if the player moved to one of the available exits.\n\
     Return ONLY JSON with keys move (bool), target (string or null), reason, confidence.";

const GRAPH_SYSTEM: &str = "You are a world graph extractor.\n\
     From the player's message and DM reply, extract any NEW locations and NEW connections.\n\
     Keep it conservative; only include clear, explicit additions.\n\
     Return ONLY JSON with keys new_locations (list of {name, description}), \
     new_connections (list of {from, to, description, verb}), confidence (0-1).";

const TRAVEL_PHRASES: [&str; 5] = [
    "you go to",
    "you walk to",
    "you head to",
    "you enter",
    "you move to",
];

/// Planner verdict on whether the player moved this turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct MovementDecision {
    /// Whether a move happened.
    #[serde(rename = "move", default)]
    pub moved: bool,
    /// Target location name when moving.
    #[serde(default)]
    pub target: Option<String>,
    /// Short rationale.
    #[serde(default)]
    pub reason: Option<String>,
    /// Detector confidence in [0, 1].
    #[serde(default)]
    pub confidence: f32,
}

/// A location proposed by the graph extractor.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct GraphLocation {
    /// Canonical location name.
    #[serde(default)]
    pub name: String,
    /// Short description.
    #[serde(default)]
    pub description: String,
}

/// A connection proposed by the graph extractor.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct GraphConnection {
    /// Source node name.
    #[serde(default)]
    pub from: String,
    /// Target node name.
    #[serde(default)]
    pub to: String,
    /// Route description.
    #[serde(default)]
    pub description: String,
    /// Optional travel verb.
    #[serde(default)]
    pub verb: Option<String>,
}

/// Graph changes extracted from one turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct GraphDelta {
    /// Locations to add.
    #[serde(default)]
    pub new_locations: Vec<GraphLocation>,
    /// Connections to add (endpoints must already exist).
    #[serde(default)]
    pub new_connections: Vec<GraphConnection>,
    /// Extractor confidence in [0, 1].
    #[serde(default)]
    pub confidence: f32,
}

/// Thresholds and quotas for turn handling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConversationConfig {
    /// Multi-index retrieval quotas for the world-facts block.
    pub retrieval: ContextRetrievalConfig,
    /// NPC cards to select (`NPC_K_DEFAULT`).
    pub npc_k: usize,
    /// NPC score threshold (`NPC_MIN_SCORE`).
    pub npc_min_score: f32,
    /// Post-turn memory gate, exclusive (`CONFIDENCE_THRESHOLD_MEMORY`).
    pub memory_confidence: f32,
    /// Movement/graph gate, inclusive (`CONFIDENCE_THRESHOLD_LOCATION`).
    pub location_confidence: f32,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            retrieval: ContextRetrievalConfig::default(),
            npc_k: 3,
            npc_min_score: 0.55,
            memory_confidence: 0.6,
            location_confidence: 0.7,
        }
    }
}

impl ConversationConfig {
    /// Loads thresholds from `NPC_*` / `CONFIDENCE_*` environment keys.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            retrieval: ContextRetrievalConfig::from_env(),
            npc_k: env_parse("NPC_K_DEFAULT", defaults.npc_k),
            npc_min_score: env_parse("NPC_MIN_SCORE", defaults.npc_min_score),
            memory_confidence: env_parse("CONFIDENCE_THRESHOLD_MEMORY", defaults.memory_confidence),
            location_confidence: env_parse(
                "CONFIDENCE_THRESHOLD_LOCATION",
                defaults.location_confidence,
            ),
        }
    }
}

fn env_parse<T: core::str::FromStr + Copy>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

/// One retrieved memory as shown to UI/debug consumers.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryRelevance {
    /// Fact text.
    pub summary: String,
    /// Memory category.
    #[serde(rename = "type")]
    pub kind: MemoryKind,
    /// Entity mentions.
    pub entities: Vec<String>,
    /// Combined score, rounded to 2 decimals.
    pub score: f32,
    /// One-line provenance, when derivable.
    pub explanation: Option<String>,
}

/// One retrieved NPC as shown to UI/debug consumers.
#[derive(Debug, Clone, Serialize)]
pub struct NpcRelevance {
    /// Display name.
    pub name: String,
    /// Known intent.
    pub intent: Option<String>,
    /// Last seen location.
    pub last_seen_location: Option<String>,
    /// Disposition toward the player.
    pub relationship_to_player: Relationship,
    /// Score, rounded to 2 decimals.
    pub score: f32,
}

/// The fact stored as a side effect of this turn, if any.
#[derive(Debug, Clone, Serialize)]
pub struct SavedThisTurn {
    /// Fact text.
    pub summary: String,
    /// Memory category.
    #[serde(rename = "type")]
    pub kind: MemoryKind,
    /// Sanitized entities.
    pub entities: Vec<String>,
    /// NPC payload, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub npc: Option<NpcPayload>,
    /// Extractor confidence.
    pub confidence: f32,
}

/// What context fed the turn, for UI/debug.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RelevancePayload {
    /// Retrieved memories.
    pub memories: Vec<MemoryRelevance>,
    /// Retrieved NPC snapshots.
    pub npcs: Vec<NpcRelevance>,
    /// Fact stored this turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved: Option<SavedThisTurn>,
}

/// Result of one handled turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// The narrator's reply.
    pub reply: String,
    /// The merged context block injected before the message, if any.
    pub context: Option<String>,
    /// Retrieval details for UI/debug.
    pub relevance: RelevancePayload,
}

/// Chat-turn coordinator over a planner, retrieval engine, and chat log.
#[derive(Debug)]
pub struct Coordinator<P, E> {
    planner: Arc<P>,
    engine: RetrievalEngine<E>,
    chat: ChatLog,
    config: ConversationConfig,
}

impl<P, E> Coordinator<P, E>
where
    P: Planner + Send + Sync + 'static,
    E: Embedder + Send + Sync + 'static,
{
    /// Creates a coordinator with default thresholds.
    #[must_use]
    pub fn new(planner: Arc<P>, engine: RetrievalEngine<E>, chat: ChatLog) -> Self {
        Self {
            planner,
            engine,
            chat,
            config: ConversationConfig::default(),
        }
    }

    /// Overrides the configuration.
    #[must_use]
    pub const fn with_config(mut self, config: ConversationConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the chat log.
    #[must_use]
    pub const fn chat(&self) -> &ChatLog {
        &self.chat
    }

    /// Returns a mutable chat log (snapshot import wiring).
    pub const fn chat_mut(&mut self) -> &mut ChatLog {
        &mut self.chat
    }

    fn store(&self) -> &Arc<WorldStore<E>> {
        self.engine.store()
    }

    /// Handles one player message end to end.
    ///
    /// # Errors
    ///
    /// Only the reply generation itself can fail; every post-turn side
    /// effect is isolated and logged.
    pub async fn handle_message(&mut self, user_message: &str) -> lorekeep_core::Result<TurnOutcome> {
        let (merged_context, memories, npcs) = self.assemble_context(user_message).await;

        let mut messages = self.chat.to_planner_messages();
        if let Some(context) = &merged_context {
            messages.push(Message::system(context.clone()));
        }
        messages.push(Message::user(user_message.to_string()));
        let reply = self
            .planner
            .respond(lorekeep_core::PlannerRequest::new(messages))
            .await?;

        self.chat.push(Role::User, user_message);
        self.chat.push(Role::Assistant, reply.clone());

        let saved = self.capture_memory(user_message, &reply).await;
        if !self.apply_llm_world_updates(user_message, &reply).await {
            self.apply_movement_heuristic(user_message, &reply).await;
        }

        Ok(TurnOutcome {
            reply,
            context: merged_context,
            relevance: RelevancePayload {
                memories,
                npcs,
                saved,
            },
        })
    }

    async fn assemble_context(
        &self,
        user_message: &str,
    ) -> (Option<String>, Vec<MemoryRelevance>, Vec<NpcRelevance>) {
        let scored_memories: Vec<ScoredMemory> = match self
            .engine
            .context_memories(user_message, &self.config.retrieval)
            .await
        {
            Ok(memories) => memories,
            Err(error) => {
                tracing::debug!(error = %error, "context retrieval failed");
                Vec::new()
            }
        };

        let scored_npcs: Vec<ScoredNpc> = match self
            .store()
            .npc_snapshots_scored(user_message, self.config.npc_k, Some(self.config.npc_min_score))
            .await
        {
            Ok(npcs) => npcs,
            Err(error) => {
                tracing::debug!(error = %error, "NPC snapshot scoring failed");
                Vec::new()
            }
        };

        let location = self.store().current_location().await;

        let merged = merge_context_blocks(&[
            format_npc_cards(&scored_npcs, NPC_CARD_LINE_CAP),
            format_world_facts(&scored_memories, WORLD_FACTS_CAP),
            format_location_context(location.as_ref(), LOCATION_CAP),
        ]);

        let memories = scored_memories
            .iter()
            .map(|memory| MemoryRelevance {
                summary: memory.candidate.entry.summary.clone(),
                kind: memory.candidate.entry.kind,
                entities: memory.candidate.entry.entities.clone(),
                score: round2(memory.total),
                explanation: memory
                    .candidate
                    .entry
                    .source_context
                    .as_deref()
                    .and_then(|context| explanation_line(context, 160)),
            })
            .collect();
        let npcs = scored_npcs
            .iter()
            .map(|npc| NpcRelevance {
                name: npc.snapshot.name.clone(),
                intent: npc.snapshot.intent.clone(),
                last_seen_location: npc.snapshot.last_seen_location.clone(),
                relationship_to_player: npc.snapshot.relationship_to_player,
                score: round2(npc.score),
            })
            .collect();

        (merged, memories, npcs)
    }

    /// Extracts and stores at most one fact from the turn.
    async fn capture_memory(&self, user_message: &str, reply: &str) -> Option<SavedThisTurn> {
        let prompt = format!(
            "Player: {user_message}\n\nDM: {reply}\n\n\
             Extract any persistent facts that should be remembered. Return the JSON object:"
        );
        let draft: MemoryDraft = match self.planner.generate(oneshot(ANALYZE_SYSTEM, prompt)).await
        {
            Ok(draft) => draft,
            Err(error) => {
                tracing::debug!(error = %error, "turn memory extraction failed");
                return None;
            }
        };
        if draft.is_no_change() || draft.confidence <= self.config.memory_confidence {
            return None;
        }

        let entities = sanitize_entities(&draft.entities);
        let source_context = format!("Player said: {user_message}\n\nDM responded: {reply}");
        let mut new = NewMemory::new(draft.summary.clone(), draft.kind)
            .with_entities(entities.clone())
            .with_confidence(draft.confidence)
            .with_source_context(source_context);
        if let Some(npc) = draft.npc.clone() {
            new = new.with_npc(npc);
        }
        match self.store().add_memory(new).await {
            Ok(_) => Some(SavedThisTurn {
                summary: draft.summary,
                kind: draft.kind,
                entities,
                npc: draft.npc,
                confidence: draft.confidence,
            }),
            Err(error) => {
                tracing::debug!(error = %error, "failed to store turn memory");
                None
            }
        }
    }

    /// Planner-guided movement and graph growth. Returns whether anything
    /// was applied.
    async fn apply_llm_world_updates(&self, user_message: &str, reply: &str) -> bool {
        let mut updated = false;
        let location = self.store().current_location().await;

        let exits_text = location.as_ref().map_or_else(
            || "(none)".to_string(),
            |node| {
                if node.connections.is_empty() {
                    "(none)".to_string()
                } else {
                    node.connections
                        .iter()
                        .map(|edge| format!("- {} -> {}", edge.description, edge.to_location))
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            },
        );
        let location_name = location
            .as_ref()
            .map_or("unknown", |node| node.name.as_str());

        let movement_prompt = format!(
            "Current location: {location_name}\n\
             Available exits (description -> target):\n{exits_text}\n\n\
             Player: {user_message}\nDM: {reply}\n\nAnswer with the JSON object."
        );
        match self
            .planner
            .generate::<MovementDecision>(oneshot(MOVEMENT_SYSTEM, movement_prompt))
            .await
        {
            Ok(decision) => {
                if decision.moved && decision.confidence >= self.config.location_confidence {
                    if let Some(target) = decision.target.as_deref() {
                        if self.store().move_player(target).await {
                            updated = true;
                        }
                    }
                }
            }
            Err(error) => {
                tracing::debug!(error = %error, "movement inference failed");
            }
        }

        let graph_prompt = format!(
            "Current location: {location_name}\n\
             Player: {user_message}\nDM: {reply}\n\nReturn the JSON object."
        );
        match self
            .planner
            .generate::<GraphDelta>(oneshot(GRAPH_SYSTEM, graph_prompt))
            .await
        {
            Ok(delta) if delta.confidence >= self.config.location_confidence => {
                for node in delta.new_locations {
                    let name = node.name.trim();
                    if name.is_empty() {
                        continue;
                    }
                    if self
                        .store()
                        .add_location_if_absent(LocationNode::new(name, node.description.trim()))
                        .await
                    {
                        updated = true;
                    }
                }
                for edge in delta.new_connections {
                    let from = edge.from.trim();
                    let to = edge.to.trim();
                    let description = edge.description.trim();
                    if from.is_empty() || to.is_empty() || description.is_empty() {
                        continue;
                    }
                    if self
                        .store()
                        .add_connection(from, to, description, edge.verb.clone())
                        .await
                    {
                        updated = true;
                    }
                }
            }
            Ok(_) => {}
            Err(error) => {
                tracing::debug!(error = %error, "graph extraction failed");
            }
        }

        updated
    }

    /// Conservative fallback: move only when the reply narrates travel and
    /// the message names a known exit.
    async fn apply_movement_heuristic(&self, user_message: &str, reply: &str) {
        let Some(location) = self.store().current_location().await else {
            return;
        };
        if location.connections.is_empty() {
            return;
        }

        let message = user_message.to_lowercase();
        let reply = reply.to_lowercase();
        let travel_ok = TRAVEL_PHRASES.iter().any(|phrase| reply.contains(phrase));

        for edge in &location.connections {
            let target = edge.to_location.to_lowercase();
            let description = edge.description.to_lowercase();
            if target.is_empty() {
                continue;
            }
            let mentioned = message.contains(&target)
                || (!description.is_empty() && message.contains(&description));
            if mentioned && (travel_ok || reply.contains(&target)) {
                self.store().move_player(&edge.to_location).await;
                break;
            }
        }
    }
}

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use lorekeep_core::PlannerRequest;
    use lorekeep_core::l2_normalize;
    use lorekeep_world::NewMemory;

    struct ConstEmbedder;

    impl Embedder for ConstEmbedder {
        fn dim(&self) -> usize {
            3
        }

        async fn embed(&self, _text: &str) -> lorekeep_core::Result<Vec<f32>> {
            let mut v = vec![1.0, 0.5, 0.25];
            l2_normalize(&mut v);
            Ok(v)
        }
    }

    /// Planner whose reply depends on which extractor is asking.
    struct ScriptedPlanner {
        reply: String,
        extraction: String,
        movement: String,
        graph: String,
    }

    impl Default for ScriptedPlanner {
        fn default() -> Self {
            Self {
                reply: "The alley is quiet tonight.".into(),
                extraction: r#"{"summary":"NO_CHANGES","entities":[],"type":"other","confidence":0.0}"#.into(),
                movement: r#"{"move":false,"target":null,"reason":"stayed","confidence":0.0}"#.into(),
                graph: r#"{"new_locations":[],"new_connections":[],"confidence":0.0}"#.into(),
            }
        }
    }

    impl Planner for ScriptedPlanner {
        async fn respond(&self, request: PlannerRequest) -> lorekeep_core::Result {
            let joined: String = request
                .messages()
                .iter()
                .map(|m| m.content().to_string())
                .collect::<Vec<_>>()
                .join("\n");
            if joined.contains("movement detector") {
                Ok(self.movement.clone())
            } else if joined.contains("world graph extractor") {
                Ok(self.graph.clone())
            } else if joined.contains("ONE important persistent fact") {
                Ok(self.extraction.clone())
            } else {
                Ok(self.reply.clone())
            }
        }
    }

    fn coordinator(planner: ScriptedPlanner) -> Coordinator<ScriptedPlanner, ConstEmbedder> {
        let store = Arc::new(WorldStore::new(ConstEmbedder));
        let engine = RetrievalEngine::new(store);
        let chat = ChatLog::new("You are the narrator of a grim city.");
        let config = ConversationConfig {
            retrieval: ContextRetrievalConfig::default().with_min_total_score(Some(0.0)),
            ..ConversationConfig::default()
        };
        Coordinator::new(Arc::new(planner), engine, chat).with_config(config)
    }

    async fn seed_graph(store: &WorldStore<ConstEmbedder>) {
        store
            .add_location_if_absent(LocationNode::new("Alley", "dark and narrow"))
            .await;
        store
            .add_location_if_absent(LocationNode::new("Docks", "smells of brine"))
            .await;
        store
            .add_connection("Alley", "Docks", "a cobbled lane", None)
            .await;
        store.move_player("Alley").await;
    }

    #[tokio::test]
    async fn reply_is_returned_and_logged() {
        let mut coordinator = coordinator(ScriptedPlanner::default());
        let outcome = coordinator.handle_message("look around").await.unwrap();
        assert_eq!(outcome.reply, "The alley is quiet tonight.");
        assert_eq!(coordinator.chat().len(), 2);
        assert_eq!(coordinator.chat().messages()[0].content, "look around");
    }

    #[tokio::test]
    async fn confident_extraction_is_stored_with_source_context() {
        let planner = ScriptedPlanner {
            extraction: r#"{"summary":"The ledger is hidden in the alley","entities":["ledger","alley"],"type":"item","confidence":0.9}"#.into(),
            ..ScriptedPlanner::default()
        };
        let mut coordinator = coordinator(planner);
        let outcome = coordinator
            .handle_message("where is the ledger?")
            .await
            .unwrap();

        let saved = outcome.relevance.saved.unwrap();
        assert_eq!(saved.kind, MemoryKind::Item);
        assert_eq!(saved.entities, vec!["ledger", "alley"]);

        let world = coordinator.store().export_world().await;
        assert_eq!(world.memories.len(), 1);
        let context = world.memories[0].source_context.as_deref().unwrap();
        assert!(context.starts_with("Player said: where is the ledger?"));
        assert!(context.contains("DM responded: The alley is quiet tonight."));
    }

    #[tokio::test]
    async fn low_confidence_extraction_is_dropped() {
        let planner = ScriptedPlanner {
            extraction: r#"{"summary":"maybe something","entities":[],"type":"other","confidence":0.5}"#.into(),
            ..ScriptedPlanner::default()
        };
        let mut coordinator = coordinator(planner);
        let outcome = coordinator.handle_message("hm").await.unwrap();
        assert!(outcome.relevance.saved.is_none());
        assert_eq!(coordinator.store().export_world().await.memories.len(), 0);
    }

    #[tokio::test]
    async fn extraction_garbage_never_breaks_the_reply() {
        let planner = ScriptedPlanner {
            extraction: "definitely not json at all".into(),
            movement: "also garbage".into(),
            graph: "broken too".into(),
            ..ScriptedPlanner::default()
        };
        let mut coordinator = coordinator(planner);
        let outcome = coordinator.handle_message("hello").await.unwrap();
        assert_eq!(outcome.reply, "The alley is quiet tonight.");
        assert!(outcome.relevance.saved.is_none());
    }

    #[tokio::test]
    async fn confident_movement_moves_the_player() {
        let planner = ScriptedPlanner {
            movement: r#"{"move":true,"target":"Docks","reason":"walked","confidence":0.9}"#.into(),
            ..ScriptedPlanner::default()
        };
        let mut coordinator = coordinator(planner);
        seed_graph(coordinator.store()).await;
        coordinator.handle_message("I head out").await.unwrap();
        assert_eq!(
            coordinator.store().player_location().await.as_deref(),
            Some("Docks")
        );
    }

    #[tokio::test]
    async fn movement_to_unknown_target_is_ignored() {
        let planner = ScriptedPlanner {
            movement: r#"{"move":true,"target":"The Moon","reason":"?","confidence":0.95}"#.into(),
            ..ScriptedPlanner::default()
        };
        let mut coordinator = coordinator(planner);
        seed_graph(coordinator.store()).await;
        coordinator.handle_message("I fly away").await.unwrap();
        assert_eq!(
            coordinator.store().player_location().await.as_deref(),
            Some("Alley")
        );
    }

    #[tokio::test]
    async fn graph_delta_adds_nodes_then_edges() {
        let planner = ScriptedPlanner {
            graph: r#"{"new_locations":[{"name":"Harbor","description":"salt and rope"}],
                       "new_connections":[{"from":"Alley","to":"Harbor","description":"a rope bridge","verb":"climb"}],
                       "confidence":0.9}"#
                .into(),
            ..ScriptedPlanner::default()
        };
        let mut coordinator = coordinator(planner);
        seed_graph(coordinator.store()).await;
        coordinator.handle_message("what lies beyond?").await.unwrap();

        let world = coordinator.store().export_world().await;
        let harbor = &world.location_graph.locations["Harbor"];
        assert_eq!(harbor.description, "salt and rope");
        let alley = &world.location_graph.locations["Alley"];
        assert!(
            alley
                .connections
                .iter()
                .any(|e| e.to_location == "Harbor" && e.travel_verb == "climb")
        );
    }

    #[tokio::test]
    async fn low_confidence_graph_delta_is_ignored() {
        let planner = ScriptedPlanner {
            graph: r#"{"new_locations":[{"name":"Mirage","description":""}],"new_connections":[],"confidence":0.3}"#.into(),
            ..ScriptedPlanner::default()
        };
        let mut coordinator = coordinator(planner);
        seed_graph(coordinator.store()).await;
        coordinator.handle_message("was that real?").await.unwrap();
        let world = coordinator.store().export_world().await;
        assert!(!world.location_graph.locations.contains_key("Mirage"));
    }

    #[tokio::test]
    async fn travel_phrase_heuristic_kicks_in_when_llm_declines() {
        let planner = ScriptedPlanner {
            reply: "You go to the Docks and smell the sea.".into(),
            ..ScriptedPlanner::default()
        };
        let mut coordinator = coordinator(planner);
        seed_graph(coordinator.store()).await;
        coordinator.handle_message("I walk to the docks").await.unwrap();
        assert_eq!(
            coordinator.store().player_location().await.as_deref(),
            Some("Docks")
        );
    }

    #[tokio::test]
    async fn context_blocks_and_footer_are_assembled() {
        let mut coordinator = coordinator(ScriptedPlanner::default());
        let store = Arc::clone(coordinator.store());
        seed_graph(&store).await;
        store
            .add_memory(
                NewMemory::new("Finnigan is hostile", MemoryKind::Npc)
                    .with_confidence(0.9)
                    .with_npc(NpcPayload {
                        name: "Finnigan".into(),
                        relationship_to_player: Some(Relationship::Hostile),
                        last_seen_location: Some("Alley".into()),
                        confidence: 0.9,
                        ..NpcPayload::default()
                    }),
            )
            .await
            .unwrap();

        let outcome = coordinator.handle_message("who is around?").await.unwrap();
        let context = outcome.context.unwrap();
        assert!(context.contains("NPC Cards:"));
        assert!(context.contains("World Facts"));
        assert!(context.contains("You are at: Alley"));
        assert!(context.contains("[Total: "));
        assert!(!outcome.relevance.npcs.is_empty());
        assert_eq!(outcome.relevance.npcs[0].relationship_to_player, Relationship::Hostile);
    }
}
