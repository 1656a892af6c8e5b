//! The streaming ingest pipeline.
//!
//! One run walks the windows of an uploaded text, asks the planner for
//! durable facts in each, stores the survivors in the run's shard, and
//! reports progress over a channel. The returned [`IngestJob`] implements
//! both `Future` (completion) and `Stream` (events); polling the stream
//! also drives the work.
//!
//! Event ordering within a run: `info` first, every `saved` precedes the
//! `progress` of its step, consolidation happens before `done`, and `done`
//! is strictly last.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_channel::{Receiver, Sender, unbounded};
use futures_core::Stream;
use lorekeep_core::{Embedder, Planner, oneshot};
use lorekeep_world::shard::ShardStore;
use lorekeep_world::types::{
    MemoryDraft, MemoryEntry, MemoryKind, NpcPayload, canonical_name, epoch_now,
    explanation_line, sanitize_entities,
};
use lorekeep_world::{LocationNode, WorldStore};
use serde::Serialize;
use uuid::Uuid;

use crate::chunking::{DEFAULT_MAX_STRIDE, WindowPlan};
use crate::context::RollingContext;
use crate::error::{IngestError, Result};
use crate::snippet::select_relevant_snippet;
use crate::uploads::UploadStore;

/// Minimum extractor confidence for a draft to be saved.
const SAVE_CONFIDENCE: f32 = 0.7;

/// Minimum confidence for a saved draft to update the rolling context.
const CONTEXT_CONFIDENCE: f32 = 0.75;

/// Shard size at which end-of-run consolidation kicks in.
const CONSOLIDATION_MIN: usize = 6;

/// Char cap for the provenance snippet.
const SNIPPET_MAX_CHARS: usize = 300;

/// Char cap for the one-line explanation.
const EXPLANATION_MAX_CHARS: usize = 160;

/// Leading chars of the text used to generate a shard title.
const TITLE_SAMPLE_CHARS: usize = 1200;

const EXTRACT_SYSTEM: &str = "You analyze narrative or game text to extract IMPORTANT persistent facts.\n\
     Return ONLY a JSON array (max 5) of objects with keys: summary, entities, type, confidence, optional npc.\n\
     Types: npc|location|item|goal|threat|world_state|relationship|other.\n\
     If nothing durable, return [].";

const EXTRACT_SINGLE_SYSTEM: &str = "You analyze narrative text to extract ONE important persistent fact.\n\
     Return ONLY a JSON object with keys summary, entities, type, confidence, and optional npc.";

const TITLE_SYSTEM: &str = "Summarize the following text into a concise 4-8 word title that captures \
     its setting or theme. Output only the title without quotes.";

/// Window-plan announcement sent as the first event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanInfo {
    /// Total words in the upload.
    pub words: usize,
    /// Total lines in the upload.
    pub lines: usize,
    /// Estimated total tokens.
    pub approx_tokens: usize,
    /// Window size in words.
    pub window_words: usize,
    /// Stride in words.
    pub stride_words: usize,
    /// Number of extraction steps.
    pub total_steps: usize,
}

/// A fact that made it into the shard.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedFact {
    /// Shard receiving the fact.
    pub shard_id: String,
    /// Fact text.
    pub summary: String,
    /// Memory category.
    #[serde(rename = "type")]
    pub kind: MemoryKind,
    /// Sanitized entity mentions.
    pub entities: Vec<String>,
    /// Structured NPC data, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub npc: Option<NpcPayload>,
    /// Extractor confidence.
    pub confidence: f32,
    /// One-line provenance explanation, when derivable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Per-step progress update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    /// Zero-based step index.
    pub step: usize,
    /// Total steps in the run.
    pub total_steps: usize,
    /// Words consumed so far.
    pub consumed_words: usize,
    /// Completion ratio in [0, 1].
    pub progress: f64,
}

/// Final event of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoneSummary {
    /// Total words processed.
    pub words: usize,
    /// Total lines processed.
    pub lines: usize,
    /// Steps executed.
    pub steps: usize,
}

/// Events emitted over an ingest stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum IngestEvent {
    /// Window plan, sent once before any step.
    Info(PlanInfo),
    /// A fact was stored in the shard.
    Saved(SavedFact),
    /// A step finished.
    Progress(ProgressUpdate),
    /// The run completed; the shard has been consolidated and persisted.
    Done(DoneSummary),
}

/// Completion summary returned when awaiting an [`IngestJob`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    /// Total words processed.
    pub words: usize,
    /// Total lines processed.
    pub lines: usize,
    /// Steps executed.
    pub steps: usize,
    /// Facts saved (before consolidation).
    pub saved: usize,
}

/// A running ingest.
///
/// Implements `Future` for the final [`IngestReport`] and `Stream` for live
/// [`IngestEvent`]s; polling the stream drives the underlying work. Dropping
/// the job cancels the run at its next emission boundary — progress since
/// the last completed run stays in memory but is not persisted.
pub struct IngestJob {
    events: Pin<Box<Receiver<IngestEvent>>>,
    completion: Pin<Box<dyn Future<Output = Result<IngestReport>> + Send>>,
    completion_result: Option<Result<IngestReport>>,
}

impl std::fmt::Debug for IngestJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestJob").finish_non_exhaustive()
    }
}

impl IngestJob {
    fn new<F>(future: F, events: Receiver<IngestEvent>) -> Self
    where
        F: Future<Output = Result<IngestReport>> + Send + 'static,
    {
        Self {
            events: Box::pin(events),
            completion: Box::pin(future),
            completion_result: None,
        }
    }
}

impl Future for IngestJob {
    type Output = Result<IngestReport>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = unsafe { self.get_unchecked_mut() };
        if let Some(result) = this.completion_result.take() {
            return Poll::Ready(result);
        }
        this.completion.as_mut().poll(cx)
    }
}

impl Stream for IngestJob {
    type Item = IngestEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = unsafe { self.get_unchecked_mut() };

        // Drive the run itself so the stream makes progress on its own.
        if this.completion_result.is_none() {
            if let Poll::Ready(result) = this.completion.as_mut().poll(cx) {
                this.completion_result = Some(result);
            }
        }

        this.events.as_mut().poll_next(cx)
    }
}

/// Windowed extraction pipeline over a planner, a world store, and a shard
/// directory.
#[derive(Debug)]
pub struct IngestPipeline<P, E> {
    planner: Arc<P>,
    store: Arc<WorldStore<E>>,
    shards: ShardStore,
    uploads: Arc<UploadStore>,
    max_stride: usize,
}

impl<P, E> IngestPipeline<P, E>
where
    P: Planner + Send + Sync + 'static,
    E: Embedder + Send + Sync + 'static,
{
    /// Creates a pipeline with the default stride cap (`MAX_CHUNK_SIZE` from
    /// the environment, else 12000).
    #[must_use]
    pub fn new(planner: Arc<P>, store: Arc<WorldStore<E>>, shards: ShardStore) -> Self {
        let max_stride = std::env::var("MAX_CHUNK_SIZE")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(DEFAULT_MAX_STRIDE);
        Self {
            planner,
            store,
            shards,
            uploads: Arc::new(UploadStore::new()),
            max_stride,
        }
    }

    /// Overrides the stride clamp.
    #[must_use]
    pub const fn with_max_stride(mut self, max_stride: usize) -> Self {
        self.max_stride = max_stride;
        self
    }

    /// The upload map feeding this pipeline.
    #[must_use]
    pub fn uploads(&self) -> &UploadStore {
        &self.uploads
    }

    /// Starts an ingest run for a previously stashed upload.
    ///
    /// Consumes the upload: a second stream for the same id fails with
    /// [`IngestError::UploadNotFound`].
    pub fn stream(&self, upload_id: &str, stride_override: Option<usize>) -> Result<IngestJob> {
        let text = self
            .uploads
            .take(upload_id)
            .ok_or_else(|| IngestError::UploadNotFound(upload_id.to_string()))?;

        let (tx, rx) = unbounded();
        let run = Run {
            planner: Arc::clone(&self.planner),
            store: Arc::clone(&self.store),
            shards: self.shards.clone(),
            shard_id: upload_id.to_string(),
            max_stride: self.max_stride,
        };
        Ok(IngestJob::new(
            run.execute(text, stride_override, tx),
            rx,
        ))
    }
}

struct Run<P, E> {
    planner: Arc<P>,
    store: Arc<WorldStore<E>>,
    shards: ShardStore,
    shard_id: String,
    max_stride: usize,
}

impl<P, E> Run<P, E>
where
    P: Planner + Send + Sync + 'static,
    E: Embedder + Send + Sync + 'static,
{
    async fn execute(
        self,
        text: String,
        stride_override: Option<usize>,
        tx: Sender<IngestEvent>,
    ) -> Result<IngestReport> {
        let plan = WindowPlan::new(&text, stride_override, self.max_stride);
        let words: Vec<&str> = text.split_whitespace().collect();
        let mut report = IngestReport {
            words: plan.total_words,
            lines: plan.total_lines,
            steps: 0,
            saved: 0,
        };

        self.store.ensure_shard(&self.shard_id).await;
        self.generate_title(&text).await;

        if !emit(
            &tx,
            IngestEvent::Info(PlanInfo {
                words: plan.total_words,
                lines: plan.total_lines,
                approx_tokens: plan.approx_tokens,
                window_words: plan.window_words,
                stride_words: plan.stride_words,
                total_steps: plan.total_steps,
            }),
        )
        .await
        {
            return Ok(report);
        }

        let mut rolling = RollingContext::new();
        for step in 0..plan.total_steps {
            let (start, end) = plan.window_range(step);
            let window_text = words[start..end].join(" ");

            let drafts = self.extract(&rolling, &window_text).await;
            for draft in drafts {
                if draft.confidence < SAVE_CONFIDENCE || draft.is_no_change() {
                    continue;
                }
                match self.save_draft(&draft, &window_text).await {
                    Some(saved) => {
                        report.saved += 1;
                        if !emit(&tx, IngestEvent::Saved(saved)).await {
                            return Ok(report);
                        }
                        rolling.update(&draft, CONTEXT_CONFIDENCE);
                    }
                    None => continue,
                }
            }

            report.steps = step + 1;
            let consumed = plan.consumed_after(step);
            #[allow(clippy::cast_precision_loss)]
            let progress = if plan.total_words == 0 {
                0.0
            } else {
                (consumed as f64 / plan.total_words as f64).min(1.0)
            };
            if !emit(
                &tx,
                IngestEvent::Progress(ProgressUpdate {
                    step,
                    total_steps: plan.total_steps,
                    consumed_words: consumed,
                    progress,
                }),
            )
            .await
            {
                return Ok(report);
            }
        }

        self.store
            .consolidate_shard(&self.shard_id, CONSOLIDATION_MIN)
            .await;

        // Persist before `done` so the shard survives a restart; a write
        // failure is logged and the stream still finishes.
        if let Err(error) = self.shards.persist_from(&self.shard_id, &self.store).await {
            tracing::warn!(shard = %self.shard_id, error = %error, "failed to persist shard");
        }

        let _ = emit(
            &tx,
            IngestEvent::Done(DoneSummary {
                words: plan.total_words,
                lines: plan.total_lines,
                steps: plan.total_steps,
            }),
        )
        .await;
        Ok(report)
    }

    /// Names the shard from its leading text, once, best-effort.
    async fn generate_title(&self, text: &str) {
        if self.store.shard_name(&self.shard_id).await.is_some() {
            return;
        }
        let sample: String = text.trim().chars().take(TITLE_SAMPLE_CHARS).collect();
        if sample.is_empty() {
            return;
        }
        match self.planner.respond(oneshot(TITLE_SYSTEM, sample)).await {
            Ok(title) => {
                if let Some(first_line) = title.lines().next() {
                    let cleaned = first_line.trim().trim_matches(['#', '"', ' ']);
                    if !cleaned.is_empty() {
                        self.store.set_shard_name(&self.shard_id, cleaned).await;
                    }
                }
            }
            Err(error) => {
                tracing::debug!(shard = %self.shard_id, error = %error, "shard title generation failed");
            }
        }
    }

    /// Runs the multi-fact extractor, falling back to the single-fact one.
    async fn extract(&self, rolling: &RollingContext, window_text: &str) -> Vec<MemoryDraft> {
        let prompt = format!(
            "{}\n\nAnalyze this excerpt for new durable facts:\n{window_text}",
            rolling.header()
        );

        match self
            .planner
            .generate::<Vec<MemoryDraft>>(oneshot(EXTRACT_SYSTEM, prompt.clone()))
            .await
        {
            Ok(drafts) if !drafts.is_empty() => drafts,
            Ok(_) => Vec::new(),
            Err(error) => {
                tracing::debug!(shard = %self.shard_id, error = %error, "multi extraction failed, trying single");
                match self
                    .planner
                    .generate::<MemoryDraft>(oneshot(EXTRACT_SINGLE_SYSTEM, prompt))
                    .await
                {
                    Ok(draft) => vec![draft],
                    Err(error) => {
                        tracing::debug!(shard = %self.shard_id, error = %error, "extraction failed for window");
                        Vec::new()
                    }
                }
            }
        }
    }

    /// Builds, embeds, and stores one entry. Returns the event payload, or
    /// `None` when the entry was skipped (embedding failure).
    async fn save_draft(&self, draft: &MemoryDraft, window_text: &str) -> Option<SavedFact> {
        let entities = sanitize_entities(&draft.entities);

        let snippet = select_relevant_snippet(
            self.store.embedder(),
            window_text,
            &draft.summary,
            SNIPPET_MAX_CHARS,
        )
        .await;
        let source_context = (!snippet.is_empty()).then(|| format!("Ingested: {snippet}"));
        let explanation = source_context
            .as_deref()
            .and_then(|context| explanation_line(context, EXPLANATION_MAX_CHARS));

        let mut entry = MemoryEntry {
            id: Uuid::new_v4().to_string(),
            summary: draft.summary.clone(),
            kind: draft.kind,
            entities: entities.clone(),
            confidence: draft.confidence,
            timestamp: epoch_now(),
            source_context,
            explanation: explanation.clone(),
            window_text: Some(window_text.to_string()),
            npc: draft.npc.clone(),
            vector: None,
            window_vector: None,
        };

        // Embedding failure skips this memory; the stream continues.
        match self.store.embed_text(&entry.embedding_text()).await {
            Ok(vector) => entry.vector = Some(vector),
            Err(error) => {
                tracing::debug!(shard = %self.shard_id, error = %error, "skipping memory after embedding failure");
                return None;
            }
        }
        if let Ok(vector) = self.store.embed_text(window_text).await {
            entry.window_vector = Some(vector);
        }

        self.store.add_shard_memory(&self.shard_id, entry).await;

        if let Some(npc) = &draft.npc {
            self.store
                .add_shard_npc_update(&self.shard_id, npc, Some(&draft.summary))
                .await;
        }

        if draft.kind == MemoryKind::Location {
            self.upsert_location(draft, &entities).await;
        }

        Some(SavedFact {
            shard_id: self.shard_id.clone(),
            summary: draft.summary.clone(),
            kind: draft.kind,
            entities,
            npc: draft.npc.clone(),
            confidence: draft.confidence,
            explanation,
        })
    }

    /// Derives a canonical location name from a location draft and upserts a
    /// node (with recall aliases) into the shard subgraph.
    async fn upsert_location(&self, draft: &MemoryDraft, entities: &[String]) {
        let name = entities.first().map_or_else(
            || {
                draft
                    .summary
                    .split_once(" is ")
                    .map_or(draft.summary.as_str(), |(subject, _)| subject)
                    .trim()
                    .to_string()
            },
            Clone::clone,
        );
        if name.is_empty() || self.store.shard_has_location(&self.shard_id, &name).await {
            return;
        }

        let mut node = LocationNode::new(name.clone(), draft.summary.clone());
        let canon = canonical_name(&name);
        let article_stripped = canon.strip_prefix("the ").unwrap_or(&canon).to_string();
        for alias in [canon.clone(), article_stripped] {
            if !alias.is_empty() && alias != name && !node.aliases.contains(&alias) {
                node.aliases.push(alias);
            }
        }
        self.store.upsert_shard_location(&self.shard_id, node).await;
    }
}

/// Sends an event; `false` means the consumer is gone and the run should
/// stop at this boundary.
async fn emit(tx: &Sender<IngestEvent>, event: IngestEvent) -> bool {
    tx.send(event).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_lite::StreamExt;
    use lorekeep_core::{PlannerRequest, l2_normalize};
    use lorekeep_world::Relationship;

    struct TestEmbedder;

    impl Embedder for TestEmbedder {
        fn dim(&self) -> usize {
            4
        }

        #[allow(clippy::cast_precision_loss)]
        async fn embed(&self, text: &str) -> lorekeep_core::Result<Vec<f32>> {
            let mut v = if text.to_lowercase().contains("square") {
                vec![1.0, 0.2, 0.0, 0.0]
            } else {
                let len = text.len() as f32;
                vec![0.1, len.mul_add(0.001, 0.2), 1.0, 0.3]
            };
            l2_normalize(&mut v);
            Ok(v)
        }
    }

    /// Planner that answers the title prompt with a name and every
    /// extraction prompt with one location fact plus one NPC fact.
    struct TestPlanner;

    impl Planner for TestPlanner {
        async fn respond(&self, request: PlannerRequest) -> lorekeep_core::Result {
            let all_text: String = request
                .messages()
                .iter()
                .map(|m| m.content().to_string())
                .collect::<Vec<_>>()
                .join("\n");
            if all_text.contains("4-8 word title") {
                return Ok("  # \"Harbor Tales\" ".to_string());
            }
            Ok(r#"[
                {"summary": "Town Square is the heart of town", "entities": ["Town Square"], "type": "location", "confidence": 0.8},
                {"summary": "The watchman patrols at night", "entities": ["watchman"], "type": "npc", "confidence": 0.9,
                 "npc": {"name": "Watchman", "last_seen_location": "Town Square", "relationship_to_player": "neutral", "confidence": 0.9}},
                {"summary": "low confidence noise", "entities": [], "type": "other", "confidence": 0.3}
            ]"#
            .to_string())
        }
    }

    fn passage(words: usize) -> String {
        let sentence = "The Town Square sits at the heart of the town and the watchman patrols it. ";
        let mut text = String::new();
        while text.split_whitespace().count() < words {
            text.push_str(sentence);
        }
        text
    }

    fn pipeline(
        dir: &std::path::Path,
    ) -> (IngestPipeline<TestPlanner, TestEmbedder>, Arc<WorldStore<TestEmbedder>>) {
        let store = Arc::new(WorldStore::new(TestEmbedder));
        let shards = ShardStore::new(dir);
        (
            IngestPipeline::new(Arc::new(TestPlanner), Arc::clone(&store), shards),
            store,
        )
    }

    #[tokio::test]
    async fn unknown_upload_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, _) = pipeline(dir.path());
        assert!(matches!(
            pipeline.stream("missing", None),
            Err(IngestError::UploadNotFound(_))
        ));
    }

    #[tokio::test]
    async fn upload_is_consumed_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, _) = pipeline(dir.path());
        let ticket = pipeline.uploads().stash(passage(50));
        let job = pipeline.stream(&ticket.id, None).unwrap();
        job.await.unwrap();
        assert!(matches!(
            pipeline.stream(&ticket.id, None),
            Err(IngestError::UploadNotFound(_))
        ));
    }

    #[tokio::test]
    async fn event_order_is_info_saved_progress_done() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, _) = pipeline(dir.path());
        let ticket = pipeline.uploads().stash(passage(500));
        let mut job = pipeline.stream(&ticket.id, None).unwrap();

        let mut events = Vec::new();
        while let Some(event) = job.next().await {
            events.push(event);
        }
        let report = job.await.unwrap();
        assert!(report.saved > 0);

        assert!(matches!(events.first(), Some(IngestEvent::Info(_))));
        assert!(matches!(events.last(), Some(IngestEvent::Done(_))));

        // Saved events never trail the final progress, and nothing follows done.
        let last_saved = events
            .iter()
            .rposition(|e| matches!(e, IngestEvent::Saved(_)))
            .unwrap();
        let last_progress = events
            .iter()
            .rposition(|e| matches!(e, IngestEvent::Progress(_)))
            .unwrap();
        assert!(last_saved < last_progress);
        assert_eq!(last_progress, events.len() - 2);

        let progress_count = events
            .iter()
            .filter(|e| matches!(e, IngestEvent::Progress(_)))
            .count();
        let Some(IngestEvent::Info(info)) = events.first() else {
            panic!("first event must be info");
        };
        assert_eq!(progress_count, info.total_steps);
        for event in &events {
            if let IngestEvent::Progress(p) = event {
                assert!(p.progress <= 1.0);
            }
        }
    }

    #[tokio::test]
    async fn ingest_builds_location_node_with_aliases_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, store) = pipeline(dir.path());
        let ticket = pipeline.uploads().stash(passage(500));
        let job = pipeline.stream(&ticket.id, None).unwrap();
        job.await.unwrap();

        let data = store.export_shard(&ticket.id).await.unwrap();
        let node = &data.subgraph["Town Square"];
        assert_eq!(node.aliases, vec!["town square"]);
        assert!(
            data.memories
                .iter()
                .any(|m| m.kind == MemoryKind::Location && m.summary.contains("Town Square"))
        );
        // Low-confidence noise was gated out.
        assert!(!data.memories.iter().any(|m| m.summary.contains("noise")));
        // NPC landed in the shard index with its relationship.
        assert_eq!(
            data.npc_index["watchman"].relationship_to_player,
            Relationship::Neutral
        );
        // Consolidation collapsed repeated extractions of the same fact.
        let locations = data
            .memories
            .iter()
            .filter(|m| m.kind == MemoryKind::Location)
            .count();
        assert_eq!(locations, 1);

        // Shard file exists and carries the generated title.
        let shards = ShardStore::new(dir.path());
        let rows = shards.list();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Harbor Tales");
        assert_eq!(store.shard_name(&ticket.id).await.as_deref(), Some("Harbor Tales"));
    }

    #[tokio::test]
    async fn saved_entries_carry_dual_vectors_and_explanations() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, store) = pipeline(dir.path());
        let ticket = pipeline.uploads().stash(passage(100));
        let job = pipeline.stream(&ticket.id, None).unwrap();
        job.await.unwrap();

        let candidates = store.collect_candidates().await.unwrap();
        let ingested: Vec<_> = candidates
            .iter()
            .filter(|c| c.shard.as_deref() == Some(ticket.id.as_str()))
            .collect();
        assert!(!ingested.is_empty());
        for candidate in ingested {
            assert!(candidate.entry.vector.is_some());
            assert!(candidate.entry.window_vector.is_some());
            assert!(candidate.entry.window_text.is_some());
            let explanation = candidate.entry.explanation.as_deref().unwrap();
            assert!(explanation.starts_with("Ingested:"));
            assert!(explanation.chars().count() <= 160);
        }
    }

    #[tokio::test]
    async fn stride_override_shrinks_steps() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, _) = pipeline(dir.path());
        let ticket = pipeline.uploads().stash(passage(300));
        let mut job = pipeline.stream(&ticket.id, Some(200)).unwrap();
        let mut total_steps = 0;
        while let Some(event) = job.next().await {
            if let IngestEvent::Info(info) = event {
                total_steps = info.total_steps;
            }
        }
        job.await.unwrap();
        assert_eq!(total_steps, 2);
    }
}
