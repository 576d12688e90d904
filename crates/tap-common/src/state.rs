//! Bookmark store
//!
//! Singer-compatible state: one bookmark per stream plus a single global
//! `currently_syncing` marker. The store never persists itself; callers hand
//! it to an [`crate::messages::Emitter`] after every mutation.

use crate::error::{Result, TapError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Resumable cursors for one stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    /// In-flight bulk export, paired with `export_end`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_id: Option<String>,

    /// End of the window the in-flight export covers (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_end: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,

    /// Replication cursors, keyed by replication key name
    #[serde(flatten)]
    pub values: BTreeMap<String, Value>,
}

/// Whole-run state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    #[serde(default)]
    pub bookmarks: BTreeMap<String, Bookmark>,

    #[serde(default)]
    pub currently_syncing: Option<String>,
}

impl State {
    /// Load state from a JSON file; an empty file yields empty state
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(&raw)
            .map_err(|e| TapError::InvalidState(format!("{}: {}", path.display(), e)))
    }

    pub fn bookmark(&self, stream: &str) -> Option<&Bookmark> {
        self.bookmarks.get(stream)
    }

    fn bookmark_mut(&mut self, stream: &str) -> &mut Bookmark {
        self.bookmarks.entry(stream.to_string()).or_default()
    }

    /// Replication cursor of `stream`, if it is a string
    pub fn replication_value(&self, stream: &str, key: &str) -> Option<&str> {
        self.bookmark(stream)?.values.get(key)?.as_str()
    }

    pub fn set_replication_value(&mut self, stream: &str, key: &str, value: impl Into<String>) {
        self.bookmark_mut(stream)
            .values
            .insert(key.to_string(), Value::String(value.into()));
    }

    /// Seed the replication cursor when the stream has none yet
    pub fn ensure_replication_value(&mut self, stream: &str, key: &str, default: &str) {
        if self.replication_value(stream, key).is_none() {
            self.set_replication_value(stream, key, default);
        }
    }

    /// Bookmarked export id and window end; both or neither
    pub fn export(&self, stream: &str) -> Option<(&str, &str)> {
        let bookmark = self.bookmark(stream)?;
        match (&bookmark.export_id, &bookmark.export_end) {
            (Some(id), Some(end)) => Some((id.as_str(), end.as_str())),
            _ => None,
        }
    }

    pub fn set_export(
        &mut self,
        stream: &str,
        export_id: impl Into<String>,
        export_end: impl Into<String>,
    ) {
        let bookmark = self.bookmark_mut(stream);
        bookmark.export_id = Some(export_id.into());
        bookmark.export_end = Some(export_end.into());
    }

    pub fn clear_export(&mut self, stream: &str) {
        let bookmark = self.bookmark_mut(stream);
        bookmark.export_id = None;
        bookmark.export_end = None;
    }

    pub fn next_page_token(&self, stream: &str) -> Option<&str> {
        self.bookmark(stream)?.next_page_token.as_deref()
    }

    pub fn set_next_page_token(&mut self, stream: &str, token: Option<String>) {
        self.bookmark_mut(stream).next_page_token = token;
    }

    pub fn currently_syncing(&self) -> Option<&str> {
        self.currently_syncing.as_deref()
    }

    pub fn set_currently_syncing(&mut self, stream: Option<&str>) {
        self.currently_syncing = stream.map(str::to_string);
    }
}
