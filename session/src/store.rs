//! Directory-per-session disk store.
//!
//! Layout under the base directory:
//!
//! ```text
//! <base>/<session-id>/metadata.json   {id, name, notes, createdAt, updatedAt, schema}
//! <base>/<session-id>/world.json      exported world state
//! <base>/<session-id>/chat.jsonl      one message per line
//! <base>/<session-id>/runtime.json    reserved
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::macros::format_description;
use uuid::Uuid;

use crate::chat::ChatMessage;
use crate::error::{Result, SessionError};
use crate::snapshot::SessionSnapshot;

/// Default session directory when `SESSIONS_DIR` is unset.
pub const DEFAULT_SESSIONS_DIR: &str = "./data/sessions";

/// Current metadata schema version.
const SCHEMA_VERSION: u32 = 1;

/// Contents of `metadata.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMeta {
    /// Session id (the directory name).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Free-form notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// Creation time, ISO-8601 UTC.
    #[serde(default)]
    pub created_at: Option<String>,
    /// Last update time, ISO-8601 UTC.
    #[serde(default)]
    pub updated_at: Option<String>,
    /// Metadata schema version.
    #[serde(default)]
    pub schema: u32,
}

/// Row returned by [`SessionStore::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// Session id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Creation time, when known.
    pub created_at: Option<String>,
    /// Last update time, when known.
    pub updated_at: Option<String>,
    /// Total bytes on disk.
    pub bytes: u64,
}

/// Disk store for saved sessions.
#[derive(Debug, Clone)]
pub struct SessionStore {
    base_dir: PathBuf,
}

impl SessionStore {
    /// Creates a store rooted at `base_dir`.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Creates a store rooted at `SESSIONS_DIR`, else the default directory.
    #[must_use]
    pub fn from_env() -> Self {
        let base =
            std::env::var("SESSIONS_DIR").unwrap_or_else(|_| DEFAULT_SESSIONS_DIR.to_string());
        Self::new(base)
    }

    /// Returns the base directory.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn session_dir(&self, session_id: &str) -> PathBuf {
        self.base_dir.join(session_id)
    }

    /// Enumerates saved sessions, sorted by update time then name.
    #[must_use]
    pub fn list(&self) -> Vec<SessionSummary> {
        let Ok(entries) = fs::read_dir(&self.base_dir) else {
            return Vec::new();
        };
        let mut rows = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(id) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let meta = self.read_meta(id).ok();
            rows.push(SessionSummary {
                id: id.to_string(),
                name: meta
                    .as_ref()
                    .map_or_else(|| id.to_string(), |m| m.name.clone()),
                created_at: meta.as_ref().and_then(|m| m.created_at.clone()),
                updated_at: meta.as_ref().and_then(|m| m.updated_at.clone()),
                bytes: dir_size(&path),
            });
        }
        rows.sort_by(|a, b| {
            let a_key = a.updated_at.as_deref().or(a.created_at.as_deref()).unwrap_or("");
            let b_key = b.updated_at.as_deref().or(b.created_at.as_deref()).unwrap_or("");
            a_key.cmp(b_key).then_with(|| a.name.cmp(&b.name))
        });
        rows
    }

    /// Writes a snapshot as a session.
    ///
    /// With `overwrite_id` the existing session is rewritten, preserving its
    /// `createdAt` (and its name/notes when the new ones are empty);
    /// otherwise a fresh id is minted.
    pub fn save(
        &self,
        name: &str,
        notes: Option<&str>,
        overwrite_id: Option<&str>,
        snapshot: &SessionSnapshot,
    ) -> Result<SessionSummary> {
        let id = overwrite_id.map_or_else(|| Uuid::new_v4().to_string(), ToString::to_string);
        let dir = self.session_dir(&id);
        fs::create_dir_all(&dir).map_err(|e| SessionError::io(&dir, e))?;

        write_json(&dir.join("world.json"), &snapshot.world_state)?;
        write_chat(&dir.join("chat.jsonl"), &snapshot.chat_messages)?;
        write_json(&dir.join("runtime.json"), &snapshot.runtime_state)?;

        let now = now_iso();
        let previous = self.read_meta(&id).ok();
        let meta = SessionMeta {
            id: id.clone(),
            name: if name.is_empty() {
                previous
                    .as_ref()
                    .map_or_else(|| id.clone(), |m| m.name.clone())
            } else {
                name.to_string()
            },
            notes: match notes {
                Some(notes) => Some(notes.to_string()),
                None => previous.as_ref().and_then(|m| m.notes.clone()),
            },
            created_at: previous
                .as_ref()
                .and_then(|m| m.created_at.clone())
                .or_else(|| Some(now.clone())),
            updated_at: Some(now),
            schema: SCHEMA_VERSION,
        };
        write_json(&dir.join("metadata.json"), &meta)?;

        Ok(SessionSummary {
            id,
            name: meta.name,
            created_at: meta.created_at,
            updated_at: meta.updated_at,
            bytes: dir_size(&dir),
        })
    }

    /// Updates a session's name and/or notes, touching `updatedAt`.
    pub fn rename(
        &self,
        session_id: &str,
        name: Option<&str>,
        notes: Option<&str>,
    ) -> Result<SessionMeta> {
        let dir = self.session_dir(session_id);
        if !dir.is_dir() {
            return Err(SessionError::NotFound(session_id.to_string()));
        }
        let mut meta = self.read_meta(session_id).unwrap_or(SessionMeta {
            id: session_id.to_string(),
            name: session_id.to_string(),
            notes: None,
            created_at: None,
            updated_at: None,
            schema: SCHEMA_VERSION,
        });
        if let Some(name) = name {
            if !name.is_empty() {
                meta.name = name.to_string();
            }
        }
        if let Some(notes) = notes {
            meta.notes = Some(notes.to_string());
        }
        meta.updated_at = Some(now_iso());
        write_json(&dir.join("metadata.json"), &meta)?;
        Ok(meta)
    }

    /// Reads a session snapshot from disk and touches `updatedAt`.
    ///
    /// A missing `chat.jsonl` yields an empty chat; unreadable chat lines
    /// are skipped.
    pub fn load(&self, session_id: &str) -> Result<SessionSnapshot> {
        let dir = self.session_dir(session_id);
        if !dir.is_dir() {
            return Err(SessionError::NotFound(session_id.to_string()));
        }

        let world_path = dir.join("world.json");
        let raw = fs::read_to_string(&world_path).map_err(|e| SessionError::io(&world_path, e))?;
        let world_state = serde_json::from_str(&raw)?;

        let mut chat_messages = Vec::new();
        let chat_path = dir.join("chat.jsonl");
        if let Ok(raw) = fs::read_to_string(&chat_path) {
            for line in raw.lines() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<ChatMessage>(line) {
                    Ok(message) => chat_messages.push(message),
                    Err(error) => {
                        tracing::debug!(session = %session_id, error = %error, "skipping malformed chat line");
                    }
                }
            }
        }

        let runtime_state = fs::read_to_string(dir.join("runtime.json"))
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()));

        if let Err(error) = self.rename(session_id, None, None) {
            tracing::debug!(session = %session_id, error = %error, "failed to touch session metadata");
        }

        Ok(SessionSnapshot {
            world_state,
            chat_messages,
            runtime_state,
        })
    }

    /// Deletes a session directory.
    pub fn delete(&self, session_id: &str) -> Result<()> {
        let dir = self.session_dir(session_id);
        if !dir.is_dir() {
            return Err(SessionError::NotFound(session_id.to_string()));
        }
        fs::remove_dir_all(&dir).map_err(|e| SessionError::io(&dir, e))
    }

    fn read_meta(&self, session_id: &str) -> Result<SessionMeta> {
        let path = self.session_dir(session_id).join("metadata.json");
        let raw = fs::read_to_string(&path).map_err(|e| SessionError::io(&path, e))?;
        Ok(serde_json::from_str(&raw)?)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let payload = serde_json::to_vec(value)?;
    fs::write(path, payload).map_err(|e| SessionError::io(path, e))
}

fn write_chat(path: &Path, messages: &[ChatMessage]) -> Result<()> {
    let mut out = String::new();
    for message in messages {
        out.push_str(&serde_json::to_string(message)?);
        out.push('\n');
    }
    fs::write(path, out).map_err(|e| SessionError::io(path, e))
}

fn dir_size(path: &Path) -> u64 {
    let mut total = 0;
    let mut stack = vec![path.to_path_buf()];
    while let Some(current) = stack.pop() {
        let Ok(entries) = fs::read_dir(&current) else {
            continue;
        };
        for entry in entries.flatten() {
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if metadata.is_dir() {
                stack.push(entry.path());
            } else {
                total += metadata.len();
            }
        }
    }
    total
}

fn now_iso() -> String {
    let format = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");
    OffsetDateTime::now_utc()
        .format(&format)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
