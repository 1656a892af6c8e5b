//! # lorekeep-ingest
//!
//! Turns raw narrative text into shard memories. Uploaded text is windowed
//! into fixed-size word chunks, each window runs through the planner's fact
//! extractor under a rolling context header, and surviving candidates are
//! embedded twice (explanation + window), recorded in the shard, and
//! announced over a progress stream. When the stream completes, duplicates
//! are consolidated and the shard is persisted atomically.
//!
//! The entry point is [`IngestPipeline`]; [`IngestPipeline::stream`] returns
//! an [`IngestJob`] that is both a `Future` (await completion) and a
//! `Stream` (consume [`IngestEvent`]s). Dropping the job cancels the run at
//! the next emission boundary.

pub mod chunking;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod snippet;
pub mod uploads;

#[doc(inline)]
pub use chunking::WindowPlan;
#[doc(inline)]
pub use context::RollingContext;
#[doc(inline)]
pub use error::{IngestError, Result};
#[doc(inline)]
pub use pipeline::{IngestEvent, IngestJob, IngestPipeline, IngestReport};
#[doc(inline)]
pub use uploads::{UploadStore, UploadTicket};
