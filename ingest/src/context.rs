//! Rolling extraction context carried across ingest windows.
//!
//! The extractor sees a short header describing what earlier windows
//! established: the protagonist, the active goal, the current area, and the
//! most recently mentioned NPCs. Only confidently saved facts update it.

use lorekeep_world::{MemoryDraft, MemoryKind, sanitize_entities};

/// Header length cap, in chars.
const HEADER_MAX_CHARS: usize = 300;

/// Goal text cap, in chars.
const GOAL_MAX_CHARS: usize = 200;

/// How many recent NPC names the header lists.
const RECENT_NPC_CAP: usize = 5;

/// Context accumulated while walking the windows of one ingest run.
#[derive(Debug, Clone, Default)]
pub struct RollingContext {
    protagonist: Option<String>,
    goal: Option<String>,
    current_area: Option<String>,
    npcs: Vec<String>,
}

impl RollingContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the protagonist line for callers that know it up front.
    #[must_use]
    pub fn with_protagonist(mut self, name: impl Into<String>) -> Self {
        self.protagonist = Some(name.into());
        self
    }

    /// Renders the header block prepended to each extraction prompt.
    #[must_use]
    pub fn header(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if let Some(protagonist) = self.protagonist.as_deref() {
            parts.push(format!("- Protagonist: {protagonist}"));
        }
        if let Some(goal) = self.goal.as_deref() {
            parts.push(format!("- Goal: {goal}"));
        }
        if let Some(area) = self.current_area.as_deref() {
            parts.push(format!("- Current Area: {area}"));
        }
        if !self.npcs.is_empty() {
            let listed = self.npcs[..self.npcs.len().min(RECENT_NPC_CAP)].join(", ");
            parts.push(format!("- NPCs Mentioned: {listed}"));
        }

        let body = if parts.is_empty() {
            "- None".to_string()
        } else {
            parts.join("\n")
        };
        let header = format!("Context so far:\n{body}");
        header.chars().take(HEADER_MAX_CHARS).collect()
    }

    /// Folds a saved draft into the context.
    ///
    /// Drafts below `min_confidence` are ignored. Locations set the current
    /// area (first entity), goals replace the goal line, and NPC payloads
    /// move their name to the front of the recent list.
    pub fn update(&mut self, draft: &MemoryDraft, min_confidence: f32) {
        if draft.confidence < min_confidence {
            return;
        }

        let entities = sanitize_entities(&draft.entities);
        if draft.kind == MemoryKind::Location {
            if let Some(area) = entities.first() {
                self.current_area = Some(area.clone());
            }
        }
        if draft.kind == MemoryKind::Goal {
            let summary = draft.summary.trim();
            if !summary.is_empty() {
                self.goal = Some(summary.chars().take(GOAL_MAX_CHARS).collect());
            }
        }
        if let Some(npc) = &draft.npc {
            let name = npc.name.trim();
            if !name.is_empty() {
                self.npcs.retain(|existing| existing != name);
                self.npcs.insert(0, name.to_string());
                self.npcs.truncate(RECENT_NPC_CAP);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lorekeep_world::NpcPayload;

    fn draft(kind: MemoryKind, summary: &str, confidence: f32) -> MemoryDraft {
        MemoryDraft {
            summary: summary.into(),
            kind,
            confidence,
            ..MemoryDraft::default()
        }
    }

    #[test]
    fn empty_context_renders_none() {
        assert_eq!(RollingContext::new().header(), "Context so far:\n- None");
    }

    #[test]
    fn low_confidence_drafts_are_ignored() {
        let mut ctx = RollingContext::new();
        let mut d = draft(MemoryKind::Goal, "find the ledger", 0.5);
        ctx.update(&d, 0.75);
        assert!(!ctx.header().contains("Goal"));
        d.confidence = 0.8;
        ctx.update(&d, 0.75);
        assert!(ctx.header().contains("- Goal: find the ledger"));
    }

    #[test]
    fn location_sets_current_area_from_first_entity() {
        let mut ctx = RollingContext::new();
        let mut d = draft(MemoryKind::Location, "Town Square is busy", 0.9);
        d.entities = vec!["Town Square".into(), "market".into()];
        ctx.update(&d, 0.75);
        assert!(ctx.header().contains("- Current Area: Town Square"));
    }

    #[test]
    fn npcs_are_most_recent_first_capped_at_five() {
        let mut ctx = RollingContext::new();
        for name in ["A", "B", "C", "D", "E", "F"] {
            let mut d = draft(MemoryKind::Npc, "seen", 0.9);
            d.npc = Some(NpcPayload {
                name: name.into(),
                ..NpcPayload::default()
            });
            ctx.update(&d, 0.75);
        }
        let header = ctx.header();
        assert!(header.contains("- NPCs Mentioned: F, E, D, C, B"));
        assert!(!header.contains('A'));

        // Re-mentioning moves a name to the front instead of duplicating it.
        let mut d = draft(MemoryKind::Npc, "seen again", 0.9);
        d.npc = Some(NpcPayload {
            name: "D".into(),
            ..NpcPayload::default()
        });
        ctx.update(&d, 0.75);
        assert!(ctx.header().contains("- NPCs Mentioned: D, F, E, C, B"));
    }

    #[test]
    fn header_is_capped_at_300_chars() {
        let mut ctx = RollingContext::new().with_protagonist("x".repeat(400));
        ctx.update(&draft(MemoryKind::Goal, &"g".repeat(400), 0.9), 0.75);
        assert!(ctx.header().chars().count() <= 300);
    }
}
