//! # lorekeep-session
//!
//! The session lifecycle: a chat log anchored on a system prompt, snapshot
//! export/import of the session world state (with replace and merge
//! semantics and embedding rebuild on load), and a directory-per-session
//! disk store.

pub mod chat;
pub mod error;
pub mod snapshot;
pub mod store;

#[doc(inline)]
pub use chat::{ChatLog, ChatMessage};
#[doc(inline)]
pub use error::{Result, SessionError};
#[doc(inline)]
pub use snapshot::{ImportMode, ImportSummary, SessionSnapshot};
#[doc(inline)]
pub use store::{SessionMeta, SessionStore, SessionSummary};
