//! Prompt block formatting for context assembly.
//!
//! Three compact blocks are injected ahead of the player's message: NPC
//! cards, world facts, and the current location. Each is capped so context
//! never crowds out the conversation itself.

use lorekeep_retrieval::ScoredMemory;
use lorekeep_world::{LocationNode, ScoredNpc};

/// Char cap for the world-facts block.
pub const WORLD_FACTS_CAP: usize = 800;

/// Char cap per NPC card line.
pub const NPC_CARD_LINE_CAP: usize = 350;

/// Char cap for the location block.
pub const LOCATION_CAP: usize = 600;

/// Formats retrieved memories as a world-facts block.
///
/// Lines are added greedily until `char_cap`; the heading always survives.
#[must_use]
pub fn format_world_facts(memories: &[ScoredMemory], char_cap: usize) -> String {
    if memories.is_empty() {
        return String::new();
    }
    let heading = "World Facts (use to stay consistent; do not contradict):";
    let mut lines: Vec<String> = vec![heading.to_string()];
    for memory in memories {
        let entry = &memory.candidate.entry;
        let mut line = format!("- [{}] {}", entry.kind, entry.summary.trim());
        if !entry.entities.is_empty() {
            line.push_str(&format!(" (entities: {})", entry.entities.join(", ")));
        }
        lines.push(line);
    }

    let mut kept: Vec<&str> = vec![&lines[0]];
    let mut length = lines[0].chars().count();
    for line in &lines[1..] {
        let added = line.chars().count() + 1;
        if length + added > char_cap {
            break;
        }
        kept.push(line);
        length += added;
    }
    kept.join("\n")
}

/// Formats scored NPC snapshots as cards.
#[must_use]
pub fn format_npc_cards(npcs: &[ScoredNpc], line_cap: usize) -> String {
    if npcs.is_empty() {
        return String::new();
    }
    let mut cards = vec!["NPC Cards:".to_string()];
    for scored in npcs {
        let snap = &scored.snapshot;
        let line = format!(
            "- {}: rel={}; last_seen={}; intent={}",
            snap.name,
            serde_name(&snap.relationship_to_player),
            snap.last_seen_location.as_deref().unwrap_or("unknown"),
            snap.intent.as_deref().unwrap_or("unknown"),
        );
        cards.push(line.chars().take(line_cap).collect());
    }
    cards.join("\n")
}

/// Formats the player's current location: description, exits, occupants.
#[must_use]
pub fn format_location_context(location: Option<&LocationNode>, char_cap: usize) -> String {
    let Some(location) = location else {
        return String::new();
    };
    let mut lines = vec![
        "Location Context:".to_string(),
        format!("You are at: {}", location.name),
    ];
    let description = location.description.trim();
    if !description.is_empty() {
        lines.push(format!("Description: {description}"));
    }
    if !location.connections.is_empty() {
        lines.push("Exits:".to_string());
        for edge in &location.connections {
            lines.push(format!("- {} (leads to {})", edge.description, edge.to_location));
        }
    }
    if !location.npcs_present.is_empty() {
        lines.push(format!("People here: {}", location.npcs_present.join(", ")));
    }

    let out = lines.join("\n");
    if out.chars().count() > char_cap {
        let mut clipped: String = out.chars().take(char_cap).collect();
        clipped.push_str("...");
        clipped
    } else {
        out
    }
}

/// Assembles the merged context injected before the player's message, with
/// the word-count footer.
#[must_use]
pub fn merge_context_blocks(blocks: &[String]) -> Option<String> {
    let non_empty: Vec<&str> = blocks
        .iter()
        .map(String::as_str)
        .filter(|block| !block.is_empty())
        .collect();
    if non_empty.is_empty() {
        return None;
    }
    let merged = non_empty.join("\n\n");
    let words = merged.split_whitespace().count();
    Some(format!("{merged}\n\n[Total: {words} words]"))
}

fn serde_name(relationship: &lorekeep_world::Relationship) -> String {
    serde_json::to_value(relationship)
        .ok()
        .and_then(|value| value.as_str().map(ToString::to_string))
        .unwrap_or_else(|| "unknown".to_string())
}
