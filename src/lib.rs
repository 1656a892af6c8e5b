//! # lorekeep
//!
//! Facade crate for the lorekeep workspace: the persistent world-memory and
//! hybrid retrieval core of a long-running narrative assistant. It re-exports
//! [`lorekeep_core`] (the `Embedder` and `Planner` trait seams) plus the
//! feature-gated member crates.
//!
//! ## What's inside?
//!
//! - `world` — typed memory store, NPC snapshot index, location graph, and
//!   persistent ingest shards.
//! - `ingest` — windowed extraction over uploaded text with a streaming
//!   progress job.
//! - `retrieval` — literal/semantic/hybrid search and multi-index context
//!   retrieval.
//! - `session` — chat log, snapshot export/import, session directory store.
//! - `conversation` — chat-turn orchestration with best-effort post-turn
//!   world updates.
//!
//! ## Example
//!
//! ```rust,no_run
//! use lorekeep::world::{NewMemory, MemoryKind, WorldStore};
//! use lorekeep::{Embedder, l2_normalize};
//!
//! struct MiniEmbedder;
//!
//! impl Embedder for MiniEmbedder {
//!     fn dim(&self) -> usize {
//!         2
//!     }
//!
//!     async fn embed(&self, text: &str) -> lorekeep::Result<Vec<f32>> {
//!         let mut v = vec![1.0, text.len() as f32];
//!         l2_normalize(&mut v);
//!         Ok(v)
//!     }
//! }
//!
//! async fn demo() -> lorekeep::Result<String> {
//!     let store = WorldStore::new(MiniEmbedder);
//!     let id = store
//!         .add_memory(NewMemory::new("the ledger is hidden", MemoryKind::Item))
//!         .await?;
//!     Ok(id)
//! }
//! ```

pub use lorekeep_core::*;

#[cfg(feature = "world")]
pub use lorekeep_world as world;

#[cfg(feature = "ingest")]
pub use lorekeep_ingest as ingest;

#[cfg(feature = "retrieval")]
pub use lorekeep_retrieval as retrieval;

#[cfg(feature = "session")]
pub use lorekeep_session as session;

#[cfg(feature = "conversation")]
pub use lorekeep_conversation as conversation;
