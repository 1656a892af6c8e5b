//! Consume-once store for uploaded raw text.
//!
//! Uploads are held in memory keyed by a random id and handed out exactly
//! once when a stream starts; a second stream for the same id sees "not
//! found". This is also what forbids two concurrent ingests of one id.

use std::collections::HashMap;

use parking_lot::Mutex;
use uuid::Uuid;

/// Receipt returned when text is stashed.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct UploadTicket {
    /// Random id; also becomes the shard id of the ingest run.
    pub id: String,
    /// Whitespace-separated word count.
    pub total_words: usize,
    /// Newline count plus one (0 for empty text).
    pub total_lines: usize,
}

/// In-process upload map.
#[derive(Debug, Default)]
pub struct UploadStore {
    inner: Mutex<HashMap<String, String>>,
}

impl UploadStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores text under a fresh id and returns its ticket.
    pub fn stash(&self, text: String) -> UploadTicket {
        let id = Uuid::new_v4().to_string();
        let total_words = text.split_whitespace().count();
        let total_lines = if text.is_empty() {
            0
        } else {
            text.matches('\n').count() + 1
        };
        self.inner.lock().insert(id.clone(), text);
        UploadTicket {
            id,
            total_words,
            total_lines,
        }
    }

    /// Removes and returns the text for an id.
    #[must_use]
    pub fn take(&self, id: &str) -> Option<String> {
        self.inner.lock().remove(id)
    }

    /// Number of pending uploads.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether no uploads are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
