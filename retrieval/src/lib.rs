//! # lorekeep-retrieval
//!
//! Ranked retrieval over the union of session and shard memories. Three
//! query modes share one candidate pool:
//!
//! - `literal` — substring match only, ordered by recency;
//! - `semantic` — pure embedding similarity;
//! - `hybrid` — similarity + literal + recency + type, linearly weighted.
//!
//! On top of the public search surface sits multi-index context retrieval:
//! a global top-k supplemented with per-entity and per-type quotas so prompt
//! assembly gets diverse context even under aggressive thresholding.

pub mod config;
pub mod engine;
pub mod error;
pub mod multi_index;
pub mod types;

#[doc(inline)]
pub use config::{ContextRetrievalConfig, SearchConfig, SearchConfigBuilder};
#[doc(inline)]
pub use engine::RetrievalEngine;
#[doc(inline)]
pub use error::{ErrorBody, ErrorCode, SearchError};
#[doc(inline)]
pub use multi_index::ScoredMemory;
#[doc(inline)]
pub use types::{Origin, SearchHit, SearchMode, SearchResponse, SourceInfo};
