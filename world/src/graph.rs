//! Location graph with movement semantics.
//!
//! Nodes are keyed by name and edges reference their target by name, so the
//! graph needs no shared ownership. Edges whose endpoints do not both exist
//! at insertion time are silently rejected, which keeps the graph free of
//! dangling references by construction.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Directed connection between two locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationEdge {
    /// Name of the target node.
    #[serde(rename = "to")]
    pub to_location: String,
    /// Short description of the route.
    pub description: String,
    /// Verb used when traveling this edge.
    #[serde(default = "default_travel_verb")]
    pub travel_verb: String,
}

fn default_travel_verb() -> String {
    "go".to_string()
}

impl LocationEdge {
    /// Creates an edge with the default travel verb.
    #[must_use]
    pub fn new(to_location: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            to_location: to_location.into(),
            description: description.into(),
            travel_verb: default_travel_verb(),
        }
    }

    /// Dedupe signature for merging: `(to, description, verb)`.
    #[must_use]
    pub fn signature(&self) -> (String, String, String) {
        (
            self.to_location.clone(),
            self.description.clone(),
            self.travel_verb.clone(),
        )
    }
}

/// A place in the world.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationNode {
    /// Unique node name.
    pub name: String,
    /// Prose description.
    #[serde(default)]
    pub description: String,
    /// Alternate names used for recall.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Outgoing edges, in insertion order.
    #[serde(default)]
    pub connections: Vec<LocationEdge>,
    /// Canonical names of NPCs believed present.
    #[serde(default)]
    pub npcs_present: Vec<String>,
}

impl LocationNode {
    /// Creates a node with no aliases, edges, or occupants.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            aliases: Vec::new(),
            connections: Vec::new(),
            npcs_present: Vec::new(),
        }
    }
}

/// The session's location graph plus the player's position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldGraph {
    /// Nodes keyed by name.
    #[serde(default)]
    pub locations: BTreeMap<String, LocationNode>,
    /// Name of the node the player occupies, if any.
    #[serde(default)]
    pub player_location: Option<String>,
}

impl WorldGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a node.
    pub fn add_location(&mut self, node: LocationNode) {
        self.locations.insert(node.name.clone(), node);
    }

    /// Inserts a node only when the name is unused.
    ///
    /// Returns `true` when the node was inserted.
    pub fn add_location_if_absent(&mut self, node: LocationNode) -> bool {
        if self.locations.contains_key(&node.name) {
            return false;
        }
        self.add_location(node);
        true
    }

    /// Adds an edge between two existing nodes.
    ///
    /// Returns `false` (and adds nothing) when either endpoint is missing.
    pub fn add_connection(
        &mut self,
        from: &str,
        to: &str,
        description: impl Into<String>,
        travel_verb: Option<String>,
    ) -> bool {
        if !self.locations.contains_key(to) {
            return false;
        }
        let Some(source) = self.locations.get_mut(from) else {
            return false;
        };
        source.connections.push(LocationEdge {
            to_location: to.to_string(),
            description: description.into(),
            travel_verb: travel_verb.unwrap_or_else(default_travel_verb),
        });
        true
    }

    /// Returns the node the player occupies.
    #[must_use]
    pub fn current_location(&self) -> Option<&LocationNode> {
        self.locations.get(self.player_location.as_deref()?)
    }

    /// Moves the player to an existing node.
    ///
    /// Returns `false` when the target is not in the graph.
    pub fn move_player(&mut self, target: &str) -> bool {
        if self.locations.contains_key(target) {
            self.player_location = Some(target.to_string());
            true
        } else {
            false
        }
    }

    /// Unions another graph into this one.
    ///
    /// New nodes are inserted whole. On collision the longer non-empty
    /// description wins; aliases, occupants, and edges are unioned (edges by
    /// `(to, description, verb)` signature). The player position is adopted
    /// only when this graph has none.
    pub fn absorb(&mut self, incoming: Self) {
        for (name, node) in incoming.locations {
            match self.locations.entry(name) {
                std::collections::btree_map::Entry::Vacant(slot) => {
                    slot.insert(node);
                }
                std::collections::btree_map::Entry::Occupied(mut slot) => {
                    let current = slot.get_mut();
                    if !node.description.is_empty()
                        && node.description.len() > current.description.len()
                    {
                        current.description = node.description;
                    }
                    for alias in node.aliases {
                        if !current.aliases.contains(&alias) {
                            current.aliases.push(alias);
                        }
                    }
                    let mut seen: Vec<_> =
                        current.connections.iter().map(LocationEdge::signature).collect();
                    for edge in node.connections {
                        let sig = edge.signature();
                        if !seen.contains(&sig) {
                            current.connections.push(edge);
                            seen.push(sig);
                        }
                    }
                    for npc in node.npcs_present {
                        if !current.npcs_present.contains(&npc) {
                            current.npcs_present.push(npc);
                        }
                    }
                }
            }
        }
        if self.player_location.is_none() {
            if let Some(player) = incoming.player_location {
                if self.locations.contains_key(&player) {
                    self.player_location = Some(player);
                }
            }
        }
    }
}
