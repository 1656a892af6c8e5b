//! # lorekeep-world
//!
//! The durable heart of the workspace: a typed memory store partitioned into
//! a live session layer plus persistent ingest shards, an NPC snapshot index
//! with field-precedence merges, and a location graph with movement
//! semantics.
//!
//! Memories carry dual embeddings — one for the extracted fact (or its
//! one-line explanation), one for the narrative window it came from — so a
//! query can hit either. Vectors are never persisted; they are recomputed
//! whenever a shard or snapshot is loaded.
//!
//! The main entry point is [`WorldStore`], generic over any
//! [`lorekeep_core::Embedder`]. Disk persistence for shards lives in
//! [`ShardStore`].

pub mod error;
pub mod graph;
pub mod scoring;
pub mod shard;
pub mod store;
pub mod types;

#[doc(inline)]
pub use error::{Result, WorldError};
#[doc(inline)]
pub use graph::{LocationEdge, LocationNode, WorldGraph};
#[doc(inline)]
pub use shard::{ShardData, ShardLoadReport, ShardStore, ShardSummary};
#[doc(inline)]
pub use store::{CandidateMemory, NewMemory, ScoredNpc, StateSummary, WorldSnapshot, WorldStore};
#[doc(inline)]
pub use types::{
    MemoryDraft, MemoryEntry, MemoryKind, NpcPayload, NpcSnapshot, Relationship, canonical_name,
    explanation_line, sanitize_entities,
};
