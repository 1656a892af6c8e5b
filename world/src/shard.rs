//! Shard persistence: one JSON file per ingest shard.
//!
//! A shard is an immutable-by-write bundle: any update rewrites the whole
//! file through a temp-file-then-rename so a crash can never leave a
//! half-written but loadable shard behind. Vectors never appear on disk;
//! [`WorldStore::install_shard`](crate::store::WorldStore::install_shard)
//! rebuilds them eagerly on load.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use lorekeep_core::Embedder;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WorldError};
use crate::graph::LocationNode;
use crate::store::WorldStore;
use crate::types::{MemoryEntry, NpcSnapshot};

/// Default shard directory when `INGESTS_DIR` is unset.
pub const DEFAULT_INGESTS_DIR: &str = "./data/ingests";

/// On-disk shape of a shard file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShardData {
    /// Optional display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Location subgraph keyed by node name.
    #[serde(default)]
    pub subgraph: BTreeMap<String, LocationNode>,
    /// Extracted memories (vectors stripped by serde).
    #[serde(default)]
    pub memories: Vec<MemoryEntry>,
    /// Shard-local NPC index keyed by canonical name.
    #[serde(default)]
    pub npc_index: BTreeMap<String, NpcSnapshot>,
}

/// Row returned by [`ShardStore::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardSummary {
    /// Shard id (the file stem).
    pub id: String,
    /// Display name; falls back to the id.
    pub name: String,
    /// Node count in the subgraph.
    pub locations: usize,
    /// Memory count.
    pub memories: usize,
    /// File size in bytes.
    pub bytes: u64,
}

/// Result of loading one shard into a store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShardLoadReport {
    /// Shard id.
    pub id: String,
    /// Display name after load, if any.
    pub name: Option<String>,
    /// Node count installed.
    pub locations: usize,
    /// Memory count installed.
    pub memories: usize,
    /// File size in bytes.
    pub bytes: u64,
    /// Wall-clock milliseconds spent rebuilding embeddings.
    pub embedding_ms: u64,
}

/// Disk store for ingest shards.
#[derive(Debug, Clone)]
pub struct ShardStore {
    base_dir: PathBuf,
}

impl ShardStore {
    /// Creates a store rooted at `base_dir`.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Creates a store rooted at `INGESTS_DIR`, else the default directory.
    #[must_use]
    pub fn from_env() -> Self {
        let base = std::env::var("INGESTS_DIR").unwrap_or_else(|_| DEFAULT_INGESTS_DIR.to_string());
        Self::new(base)
    }

    /// Returns the base directory.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn shard_path(&self, shard_id: &str) -> PathBuf {
        self.base_dir.join(format!("{shard_id}.json"))
    }

    /// Enumerates shard files, best-effort.
    ///
    /// Malformed files still produce a row with zero counts so operators can
    /// see (and delete) them. Rows sort by lowercased name.
    #[must_use]
    pub fn list(&self) -> Vec<ShardSummary> {
        let Ok(entries) = fs::read_dir(&self.base_dir) else {
            return Vec::new();
        };
        let mut rows = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(id) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_suffix(".json"))
            else {
                continue;
            };
            let bytes = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            let row = match read_shard_file(&path) {
                Ok(data) => ShardSummary {
                    id: id.to_string(),
                    name: data
                        .name
                        .filter(|n| !n.trim().is_empty())
                        .unwrap_or_else(|| id.to_string()),
                    locations: data.subgraph.len(),
                    memories: data.memories.len(),
                    bytes,
                },
                Err(error) => {
                    tracing::debug!(shard = %id, error = %error, "listing malformed shard file");
                    ShardSummary {
                        id: id.to_string(),
                        name: id.to_string(),
                        locations: 0,
                        memories: 0,
                        bytes,
                    }
                }
            };
            rows.push(row);
        }
        rows.sort_by_key(|row| row.name.to_lowercase());
        rows
    }

    /// Reads and parses a shard file.
    ///
    /// # Errors
    /// [`WorldError::ShardNotFound`] when the file does not exist;
    /// [`WorldError::Io`] / [`WorldError::Serialization`] otherwise.
    pub fn read(&self, shard_id: &str) -> Result<ShardData> {
        let path = self.shard_path(shard_id);
        if !path.exists() {
            return Err(WorldError::ShardNotFound(shard_id.to_string()));
        }
        read_shard_file(&path)
    }

    /// Writes a shard file atomically (temp file, then rename).
    pub fn write(&self, shard_id: &str, data: &ShardData) -> Result<()> {
        fs::create_dir_all(&self.base_dir)
            .map_err(|e| WorldError::io(&self.base_dir, e))?;
        let path = self.shard_path(shard_id);
        let tmp = self.base_dir.join(format!("{shard_id}.json.tmp"));
        let payload = serde_json::to_vec(data)?;
        fs::write(&tmp, payload).map_err(|e| WorldError::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| WorldError::io(&path, e))?;
        Ok(())
    }

    /// Deletes a shard file.
    pub fn delete(&self, shard_id: &str) -> Result<()> {
        let path = self.shard_path(shard_id);
        if !path.exists() {
            return Err(WorldError::ShardNotFound(shard_id.to_string()));
        }
        fs::remove_file(&path).map_err(|e| WorldError::io(&path, e))
    }

    /// File size of a shard in bytes, 0 when missing.
    #[must_use]
    pub fn file_size(&self, shard_id: &str) -> u64 {
        fs::metadata(self.shard_path(shard_id))
            .map(|m| m.len())
            .unwrap_or(0)
    }

    /// Persists a shard currently held by `store`.
    pub async fn persist_from<E: Embedder>(
        &self,
        shard_id: &str,
        store: &WorldStore<E>,
    ) -> Result<()> {
        let data = store.export_shard(shard_id).await?;
        self.write(shard_id, &data)
    }

    /// Renames a shard on disk and in memory.
    ///
    /// The name is normalized (single-spaced, capped at 120 chars). Returns
    /// the stored name.
    pub async fn rename<E: Embedder>(
        &self,
        shard_id: &str,
        name: &str,
        store: &WorldStore<E>,
    ) -> Result<String> {
        let mut data = self.read(shard_id)?;
        let cleaned = store
            .set_shard_name(shard_id, name)
            .await
            .unwrap_or_else(|| shard_id.to_string());
        data.name = Some(cleaned.clone());
        self.write(shard_id, &data)?;
        Ok(cleaned)
    }

    /// Deletes a shard file and drops its in-memory containers.
    pub async fn remove<E: Embedder>(&self, shard_id: &str, store: &WorldStore<E>) -> Result<()> {
        self.delete(shard_id)?;
        store.remove_shard(shard_id).await;
        Ok(())
    }

    /// Loads one shard from disk into `store`, rebuilding embeddings
    /// eagerly, and reports counts plus elapsed embedding time.
    pub async fn load_into<E: Embedder>(
        &self,
        shard_id: &str,
        store: &WorldStore<E>,
    ) -> Result<ShardLoadReport> {
        let data = self.read(shard_id)?;
        let started = Instant::now();
        let (locations, memories) = store.install_shard(shard_id, data).await?;
        let embedding_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        Ok(ShardLoadReport {
            id: shard_id.to_string(),
            name: store.shard_name(shard_id).await,
            locations,
            memories,
            bytes: self.file_size(shard_id),
            embedding_ms,
        })
    }

    /// Loads every parseable shard in the base directory into `store`.
    ///
    /// Corrupt files are skipped with a warning; returns the number of
    /// shards installed.
    pub async fn load_all_into<E: Embedder>(&self, store: &WorldStore<E>) -> usize {
        let mut loaded = 0;
        for row in self.list() {
            match self.load_into(&row.id, store).await {
                Ok(_) => loaded += 1,
                Err(error) => {
                    tracing::warn!(shard = %row.id, error = %error, "skipping unloadable shard");
                }
            }
        }
        loaded
    }
}

fn read_shard_file(path: &Path) -> Result<ShardData> {
    let raw = fs::read_to_string(path).map_err(|e| WorldError::io(path, e))?;
    Ok(serde_json::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::LocationEdge;
    use crate::store::NewMemory;
    use crate::types::{MemoryKind, NpcPayload};
    use lorekeep_core::l2_normalize;

    struct HashEmbedder;

    impl Embedder for HashEmbedder {
        fn dim(&self) -> usize {
            4
        }

        #[allow(clippy::cast_precision_loss)]
        async fn embed(&self, text: &str) -> lorekeep_core::Result<Vec<f32>> {
            let h = crate::types::content_hash(text);
            let mut v = vec![
                (h & 0xff) as f32 + 1.0,
                ((h >> 8) & 0xff) as f32 + 1.0,
                ((h >> 16) & 0xff) as f32 + 1.0,
                ((h >> 24) & 0xff) as f32 + 1.0,
            ];
            l2_normalize(&mut v);
            Ok(v)
        }
    }

    async fn populated_store() -> WorldStore<HashEmbedder> {
        let store = WorldStore::new(HashEmbedder);
        store.ensure_shard("s1").await;
        store.set_shard_name("s1", "Harbor  Chronicle").await;
        let mut node = LocationNode::new("Town Square", "The heart of town.");
        node.aliases.push("town square".into());
        store.upsert_shard_location("s1", node).await;
        let mut docks = LocationNode::new("Docks", "");
        docks
            .connections
            .push(LocationEdge::new("Town Square", "a cobbled lane"));
        store.upsert_shard_location("s1", docks).await;
        store
            .add_shard_memory(
                "s1",
                MemoryEntry {
                    id: "m-1".into(),
                    summary: "Town Square is the heart of town".into(),
                    kind: MemoryKind::Location,
                    entities: vec!["Town Square".into()],
                    confidence: 0.8,
                    timestamp: 1.0,
                    explanation: Some("Ingested: the square".into()),
                    window_text: Some("A long passage about the town square.".into()),
                    ..MemoryEntry::default()
                },
            )
            .await;
        store
            .add_shard_npc_update(
                "s1",
                &NpcPayload {
                    name: "Watchman".into(),
                    last_seen_location: Some("Town Square".into()),
                    confidence: 0.7,
                    ..NpcPayload::default()
                },
                Some("The watchman patrols the square"),
            )
            .await;
        store
    }

    #[tokio::test]
    async fn persist_then_load_round_trips_everything_but_vectors() {
        let dir = tempfile::tempdir().unwrap();
        let shards = ShardStore::new(dir.path());
        let store = populated_store().await;

        shards.persist_from("s1", &store).await.unwrap();

        // Raw file has no vectors.
        let raw = fs::read_to_string(dir.path().join("s1.json")).unwrap();
        assert!(!raw.contains("vector"));

        let fresh = WorldStore::new(HashEmbedder);
        let report = shards.load_into("s1", &fresh).await.unwrap();
        assert_eq!(report.locations, 2);
        assert_eq!(report.memories, 1);
        assert_eq!(report.name.as_deref(), Some("Harbor Chronicle"));

        let data = fresh.export_shard("s1").await.unwrap();
        assert_eq!(data.subgraph["Docks"].connections[0].to_location, "Town Square");
        assert_eq!(data.memories[0].id, "m-1");
        assert_eq!(data.memories[0].kind, MemoryKind::Location);
        assert!((data.memories[0].confidence - 0.8).abs() < 1e-6);
        assert!(data.npc_index.contains_key("watchman"));

        // Vectors were rebuilt eagerly and timestamps re-anchored.
        let candidates = fresh.collect_candidates().await.unwrap();
        assert!(candidates[0].entry.vector.is_some());
        assert!(candidates[0].entry.window_vector.is_some());
        assert!(candidates[0].entry.timestamp > 1.0);
    }

    #[tokio::test]
    async fn list_sorts_by_lowercased_name_and_reports_counts() {
        let dir = tempfile::tempdir().unwrap();
        let shards = ShardStore::new(dir.path());
        let store = populated_store().await;
        shards.persist_from("s1", &store).await.unwrap();

        store.ensure_shard("s2").await;
        store.set_shard_name("s2", "alpha tales").await;
        shards.persist_from("s2", &store).await.unwrap();

        let rows = shards.list();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "alpha tales");
        assert_eq!(rows[1].name, "Harbor Chronicle");
        assert_eq!(rows[1].locations, 2);
        assert_eq!(rows[1].memories, 1);
        assert!(rows[1].bytes > 0);
    }

    #[tokio::test]
    async fn list_tolerates_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
        let shards = ShardStore::new(dir.path());
        let rows = shards.list();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "broken");
        assert_eq!(rows[0].memories, 0);
    }

    #[tokio::test]
    async fn rename_normalizes_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let shards = ShardStore::new(dir.path());
        let store = populated_store().await;
        shards.persist_from("s1", &store).await.unwrap();

        let name = shards.rename("s1", "  the   long  road ", &store).await.unwrap();
        assert_eq!(name, "the long road");
        let data = shards.read("s1").unwrap();
        assert_eq!(data.name.as_deref(), Some("the long road"));
        assert_eq!(store.shard_name("s1").await.as_deref(), Some("the long road"));
    }

    #[tokio::test]
    async fn delete_removes_file_and_memory_state() {
        let dir = tempfile::tempdir().unwrap();
        let shards = ShardStore::new(dir.path());
        let store = populated_store().await;
        shards.persist_from("s1", &store).await.unwrap();

        shards.remove("s1", &store).await.unwrap();
        assert!(!dir.path().join("s1.json").exists());
        assert!(store.export_shard("s1").await.is_err());
        assert!(matches!(
            shards.delete("s1"),
            Err(WorldError::ShardNotFound(_))
        ));
    }

    #[tokio::test]
    async fn load_missing_shard_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let shards = ShardStore::new(dir.path());
        let store = WorldStore::new(HashEmbedder);
        assert!(matches!(
            shards.load_into("ghost", &store).await,
            Err(WorldError::ShardNotFound(_))
        ));
    }

    #[tokio::test]
    async fn load_all_skips_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        let shards = ShardStore::new(dir.path());
        let store = populated_store().await;
        shards.persist_from("s1", &store).await.unwrap();
        fs::write(dir.path().join("bad.json"), "[1, 2").unwrap();

        let fresh = WorldStore::new(HashEmbedder);
        let loaded = shards.load_all_into(&fresh).await;
        assert_eq!(loaded, 1);
    }

    #[test]
    fn dedupe_of_session_memory_uses_dedupe_flag() {
        // NewMemory builder defaults: dedupe off, threshold 0.75.
        let draft = NewMemory::new("x", MemoryKind::Other);
        let debug = format!("{draft:?}");
        assert!(debug.contains("dedupe_check: false"));
        assert!(debug.contains("0.75"));
    }
}
