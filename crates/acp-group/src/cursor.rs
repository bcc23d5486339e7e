//! Pluggable per-group `(msg_cursor, event_cursor)` persistence (spec §4.13).

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Cursor {
    pub msg_cursor: i64,
    pub event_cursor: i64,
}

/// Capability-set contract over per-group cursor state; all entries are
/// accessed under the implementation's own internal lock (spec §4.13).
#[async_trait]
pub trait CursorStore: Send + Sync {
    async fn save_msg_cursor(&self, group_id: &str, msg_cursor: i64);
    async fn save_event_cursor(&self, group_id: &str, event_cursor: i64);
    async fn load_cursor(&self, group_id: &str) -> Cursor;
    async fn remove_cursor(&self, group_id: &str);
    async fn flush(&self, group_id: &str);
    async fn close(&self);
}

/// Built-in implementation: an in-memory map, optionally mirrored to a JSON
/// file (written on `flush`, read once on construction). An empty file path
/// means memory-only (spec §4.13).
pub struct LocalCursorStore {
    file_path: Option<PathBuf>,
    entries: Mutex<HashMap<String, Cursor>>,
}

impl LocalCursorStore {
    /// Memory-only store; nothing is ever written to disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self { file_path: None, entries: Mutex::new(HashMap::new()) }
    }

    /// Mirrors to `path`, reading its current contents (if any) immediately.
    #[must_use]
    pub fn with_file(path: PathBuf) -> Self {
        let entries = std::fs::read_to_string(&path)
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok())
            .unwrap_or_default();
        Self { file_path: Some(path), entries: Mutex::new(entries) }
    }

    fn write_file(&self) {
        let Some(path) = &self.file_path else { return };
        let entries = self.entries.lock().clone();
        match serde_json::to_string_pretty(&entries) {
            Ok(text) => {
                if let Err(e) = std::fs::write(path, text) {
                    warn!(error = %e, path = %path.display(), "failed to mirror cursor store to disk");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize cursor store"),
        }
    }
}

#[async_trait]
impl CursorStore for LocalCursorStore {
    async fn save_msg_cursor(&self, group_id: &str, msg_cursor: i64) {
        self.entries.lock().entry(group_id.to_string()).or_default().msg_cursor = msg_cursor;
    }

    async fn save_event_cursor(&self, group_id: &str, event_cursor: i64) {
        self.entries.lock().entry(group_id.to_string()).or_default().event_cursor = event_cursor;
    }

    async fn load_cursor(&self, group_id: &str) -> Cursor {
        self.entries.lock().get(group_id).copied().unwrap_or_default()
    }

    async fn remove_cursor(&self, group_id: &str) {
        self.entries.lock().remove(group_id);
        self.write_file();
    }

    async fn flush(&self, _group_id: &str) {
        self.write_file();
    }

    async fn close(&self) {
        self.write_file();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_only_round_trips_without_touching_disk() {
        let store = LocalCursorStore::in_memory();
        store.save_msg_cursor("g1", 10).await;
        store.save_event_cursor("g1", 3).await;
        let cursor = store.load_cursor("g1").await;
        assert_eq!(cursor.msg_cursor, 10);
        assert_eq!(cursor.event_cursor, 3);
    }

    #[tokio::test]
    async fn file_backed_store_survives_reconstruction() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cursors.json");

        let store = LocalCursorStore::with_file(path.clone());
        store.save_msg_cursor("g1", 42).await;
        store.flush("g1").await;

        let reopened = LocalCursorStore::with_file(path);
        let cursor = reopened.load_cursor("g1").await;
        assert_eq!(cursor.msg_cursor, 42);
    }

    #[tokio::test]
    async fn missing_group_returns_zeroed_cursor() {
        let store = LocalCursorStore::in_memory();
        let cursor = store.load_cursor("unknown").await;
        assert_eq!(cursor.msg_cursor, 0);
        assert_eq!(cursor.event_cursor, 0);
    }
}
