//! Conversation message types shared across the workspace.

use serde::{Deserialize, Serialize};

/// Conversation participant role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Input from the player.
    User,
    /// The narrator's reply.
    Assistant,
    /// Context or instructions for the model.
    System,
}

/// A single message in a planner conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    /// Player message.
    User {
        /// Text content of the message.
        content: String,
    },
    /// Narrator message.
    Assistant {
        /// Text content of the message.
        content: String,
    },
    /// Instructions or injected context.
    System {
        /// Text content of the message.
        content: String,
    },
}

impl Message {
    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    /// Creates an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
        }
    }

    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    /// Returns the sender role.
    #[must_use]
    pub const fn role(&self) -> Role {
        match self {
            Self::User { .. } => Role::User,
            Self::Assistant { .. } => Role::Assistant,
            Self::System { .. } => Role::System,
        }
    }

    /// Returns the text content.
    #[must_use]
    pub fn content(&self) -> &str {
        match self {
            Self::User { content } | Self::Assistant { content } | Self::System { content } => {
                content
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_accessor() {
        assert_eq!(Message::user("hi").role(), Role::User);
        assert_eq!(Message::assistant("yo").role(), Role::Assistant);
        assert_eq!(Message::system("ctx").role(), Role::System);
    }

    #[test]
    fn serializes_with_role_tag() {
        let json = serde_json::to_string(&Message::user("go north")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"go north"}"#);
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back.content(), "go north");
    }
}
