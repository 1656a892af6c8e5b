//! # lorekeep-core
//!
//! Trait seams that the rest of the lorekeep workspace builds on. The world
//! store, ingest pipeline, and conversation coordinator never talk to a
//! concrete model runtime; they talk to two small traits:
//!
//! - [`Embedder`] — turns text into a unit-norm dense vector.
//! - [`Planner`] — generates free text or schema-constrained JSON from a
//!   conversation request.
//!
//! Any backend that implements these traits (a local GGUF runtime, a hosted
//! API, a test mock) plugs into every higher-level crate unchanged.
//!
//! ```rust
//! use lorekeep_core::{Embedder, l2_normalize};
//!
//! struct HashEmbedder;
//!
//! impl Embedder for HashEmbedder {
//!     fn dim(&self) -> usize {
//!         4
//!     }
//!
//!     async fn embed(&self, text: &str) -> lorekeep_core::Result<Vec<f32>> {
//!         let mut v = vec![text.len() as f32, 1.0, 0.0, 0.0];
//!         l2_normalize(&mut v);
//!         Ok(v)
//!     }
//! }
//! ```

pub mod embedding;
pub mod json;
pub mod message;
pub mod planner;

#[doc(inline)]
pub use embedding::{Embedder, Embedding, l2_normalize};
#[doc(inline)]
pub use message::{Message, Role};
#[doc(inline)]
pub use planner::{Planner, PlannerRequest, oneshot};

/// Result type used by the model-facing traits.
///
/// Backends report arbitrary failures (network, runtime, parse); callers that
/// need structured errors wrap this at their own boundary.
pub type Result<T = String> = anyhow::Result<T>;

pub use anyhow::Error;
