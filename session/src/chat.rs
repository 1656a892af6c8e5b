//! Chat history anchored on a system prompt.
//!
//! The system prompt is held apart from the message list so snapshot export
//! naturally excludes it and a `replace` import can truncate back to it.

use lorekeep_core::{Message, Role};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// One logged chat message, in the shape snapshots persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Sender role.
    pub role: Role,
    /// Message text.
    pub content: String,
    /// Whether the message still participates in context assembly.
    #[serde(default = "default_active")]
    pub active: bool,
    /// ISO-8601 creation time, when known.
    #[serde(default)]
    pub timestamp: Option<String>,
}

const fn default_active() -> bool {
    true
}

/// Append-only conversation log with a fixed system prompt at the root.
#[derive(Debug, Clone)]
pub struct ChatLog {
    system_prompt: String,
    messages: Vec<ChatMessage>,
}

impl ChatLog {
    /// Creates a log with the given system prompt and no messages.
    #[must_use]
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            messages: Vec::new(),
        }
    }

    /// Returns the system prompt.
    #[must_use]
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Returns the logged messages (system prompt excluded).
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Number of logged messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether no messages are logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Appends a message stamped with the current time.
    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        let content = content.into();
        if content.is_empty() {
            return;
        }
        self.messages.push(ChatMessage {
            role,
            content,
            active: true,
            timestamp: now_iso(),
        });
    }

    /// Appends an already-timestamped message (snapshot import).
    pub fn append(&mut self, message: ChatMessage) {
        if message.content.is_empty() {
            return;
        }
        self.messages.push(message);
    }

    /// Truncates the history back to just the system prompt.
    pub fn trim_to_system(&mut self) {
        self.messages.clear();
    }

    /// Builds the planner conversation: system prompt, then every active
    /// message in order.
    #[must_use]
    pub fn to_planner_messages(&self) -> Vec<Message> {
        let mut out = vec![Message::system(self.system_prompt.clone())];
        for message in &self.messages {
            if !message.active {
                continue;
            }
            out.push(match message.role {
                Role::User => Message::user(message.content.clone()),
                Role::Assistant => Message::assistant(message.content.clone()),
                Role::System => Message::system(message.content.clone()),
            });
        }
        out
    }
}

fn now_iso() -> Option<String> {
    OffsetDateTime::now_utc().format(&Rfc3339).ok()
}
