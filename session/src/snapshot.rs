//! Session snapshot export and import.
//!
//! A snapshot covers the session layer only — session memories (vectors
//! stripped), the NPC index, the location graph, and the chat history minus
//! the system prompt. Shards are persisted separately and never appear
//! here.

use lorekeep_core::Embedder;
use lorekeep_world::{WorldSnapshot, WorldStore};
use serde::{Deserialize, Serialize};

use crate::chat::{ChatLog, ChatMessage};
use crate::error::Result;

/// How an imported snapshot combines with live state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Wipe the session layer, truncate chat to the system prompt, then
    /// apply the snapshot and recompute all vectors.
    #[default]
    Replace,
    /// Union the snapshot into live state: memories dedupe by id else
    /// canonical-text hash, NPC fields update on collision, the graph
    /// unions, and chat appends without reset.
    Merge,
}

impl core::str::FromStr for ImportMode {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_lowercase().as_str() {
            "replace" | "" => Ok(Self::Replace),
            "merge" => Ok(Self::Merge),
            other => Err(format!("unknown import mode: {other}")),
        }
    }
}

/// The serialized form of a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Session world state.
    #[serde(default)]
    pub world_state: WorldSnapshot,
    /// Chat history, system prompt excluded.
    #[serde(default)]
    pub chat_messages: Vec<ChatMessage>,
    /// Reserved for future use.
    #[serde(default)]
    pub runtime_state: serde_json::Value,
}

/// Summary returned after an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    /// Session memories after the import.
    pub world_memories: usize,
    /// NPC snapshots after the import.
    pub npcs: usize,
    /// Graph nodes after the import.
    pub locations: usize,
    /// Chat messages carried by the snapshot.
    pub chat_messages: usize,
}

/// Exports the current session layer.
pub async fn export<E: Embedder>(store: &WorldStore<E>, chat: &ChatLog) -> SessionSnapshot {
    SessionSnapshot {
        world_state: store.export_world().await,
        chat_messages: chat.messages().to_vec(),
        runtime_state: serde_json::Value::Object(serde_json::Map::new()),
    }
}

/// Applies a snapshot to the live session.
pub async fn import<E: Embedder>(
    store: &WorldStore<E>,
    chat: &mut ChatLog,
    snapshot: SessionSnapshot,
    mode: ImportMode,
) -> Result<ImportSummary> {
    let incoming_chat = snapshot.chat_messages.len();
    let state = match mode {
        ImportMode::Replace => {
            chat.trim_to_system();
            store.replace_world(snapshot.world_state).await?
        }
        ImportMode::Merge => store.merge_world(snapshot.world_state).await?,
    };
    for message in snapshot.chat_messages {
        chat.append(message);
    }
    Ok(ImportSummary {
        world_memories: state.memories,
        npcs: state.npcs,
        locations: state.locations,
        chat_messages: incoming_chat,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lorekeep_core::{Role, l2_normalize};
    use lorekeep_world::{LocationNode, MemoryKind, NewMemory, NpcSnapshot};

    struct LenEmbedder;

    impl Embedder for LenEmbedder {
        fn dim(&self) -> usize {
            3
        }

        #[allow(clippy::cast_precision_loss)]
        async fn embed(&self, text: &str) -> lorekeep_core::Result<Vec<f32>> {
            let mut v = vec![1.0, (text.len() % 7) as f32, (text.len() % 3) as f32];
            l2_normalize(&mut v);
            Ok(v)
        }
    }

    async fn seeded() -> (WorldStore<LenEmbedder>, ChatLog) {
        let store = WorldStore::new(LenEmbedder);
        store
            .add_memory(
                NewMemory::new("the ledger is hidden", MemoryKind::Item).with_entities(["ledger"]),
            )
            .await
            .unwrap();
        store
            .add_location_if_absent(LocationNode::new("Alley", "narrow"))
            .await;
        store.move_player("Alley").await;
        let mut chat = ChatLog::new("you are the narrator");
        chat.push(Role::User, "where is the ledger?");
        chat.push(Role::Assistant, "hidden in the alley");
        (store, chat)
    }

    #[tokio::test]
    async fn export_excludes_system_and_vectors() {
        let (store, chat) = seeded().await;
        let snapshot = export(&store, &chat).await;
        assert_eq!(snapshot.chat_messages.len(), 2);
        assert!(
            snapshot
                .chat_messages
                .iter()
                .all(|m| m.content != "you are the narrator")
        );
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(!json.contains("\"vector\""));
        assert!(json.contains("\"runtime_state\":{}"));
    }

    #[tokio::test]
    async fn replace_round_trip_restores_equivalent_state() {
        let (store, mut chat) = seeded().await;
        let snapshot = export(&store, &chat).await;
        let serialized = serde_json::to_string(&snapshot).unwrap();

        store.reset().await;
        chat.trim_to_system();
        chat.push(Role::User, "stale message");

        let restored: SessionSnapshot = serde_json::from_str(&serialized).unwrap();
        let summary = import(&store, &mut chat, restored, ImportMode::Replace)
            .await
            .unwrap();
        assert_eq!(summary.world_memories, 1);
        assert_eq!(summary.locations, 1);
        assert_eq!(summary.chat_messages, 2);

        // Chat was truncated to the system prompt before applying.
        assert_eq!(chat.len(), 2);
        assert_eq!(chat.messages()[0].content, "where is the ledger?");

        // Vectors were rebuilt for retrieval.
        let candidates = store.collect_candidates().await.unwrap();
        assert!(candidates[0].entry.vector.is_some());
        assert_eq!(store.player_location().await.as_deref(), Some("Alley"));
    }

    #[tokio::test]
    async fn merge_appends_chat_and_unions_world() {
        let (store, mut chat) = seeded().await;

        let mut incoming = SessionSnapshot::default();
        incoming
            .world_state
            .npc_index
            .insert("goblin".into(), NpcSnapshot::new("Goblin"));
        incoming.chat_messages.push(ChatMessage {
            role: Role::User,
            content: "imported line".into(),
            active: true,
            timestamp: None,
        });

        let summary = import(&store, &mut chat, incoming, ImportMode::Merge)
            .await
            .unwrap();
        assert_eq!(summary.npcs, 1);
        assert_eq!(summary.world_memories, 1);
        // Existing chat kept, imported line appended.
        assert_eq!(chat.len(), 3);
        assert_eq!(chat.messages()[2].content, "imported line");
    }

    #[test]
    fn import_mode_parses() {
        use core::str::FromStr;
        assert_eq!(ImportMode::from_str("Replace").unwrap(), ImportMode::Replace);
        assert_eq!(ImportMode::from_str("merge").unwrap(), ImportMode::Merge);
        assert!(ImportMode::from_str("overwrite").is_err());
    }
}
