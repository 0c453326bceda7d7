//! In-memory snapshot store.
//!
//! Scoped to whoever creates it: build one per experiment run and hand it to
//! the session runner explicitly.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::models::PageSnapshot;
use crate::domain::ports::SnapshotStore;

#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    entries: RwLock<HashMap<String, PageSnapshot>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Keys currently stored, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn put(&self, key: String, value: PageSnapshot) {
        self.entries.write().await.insert(key, value);
    }

    async fn get(&self, key: &str) -> Option<PageSnapshot> {
        self.entries.read().await.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(title: &str) -> PageSnapshot {
        PageSnapshot {
            url: "https://example.com".to_string(),
            title: title.to_string(),
            visible_text: String::new(),
            clickable_targets: vec![],
            scroll_position_px: 0,
            page_height_px: 2_000,
            viewport_height_px: 800,
            load_time_ms: 250,
        }
    }

    #[tokio::test]
    async fn test_put_get_overwrite() {
        let store = InMemorySnapshotStore::new();
        assert!(store.is_empty().await);
        assert!(store.get("exp/a").await.is_none());

        store.put("exp/a".to_string(), snapshot("first")).await;
        store.put("exp/b".to_string(), snapshot("other")).await;
        store.put("exp/a".to_string(), snapshot("second")).await;

        assert_eq!(store.get("exp/a").await.unwrap().title, "second");
        assert_eq!(store.keys().await, vec!["exp/a", "exp/b"]);
    }

    #[tokio::test]
    async fn test_stores_are_independent() {
        let first = InMemorySnapshotStore::new();
        let second = InMemorySnapshotStore::new();
        first.put("exp/a".to_string(), snapshot("first")).await;
        assert!(second.get("exp/a").await.is_none());
    }
}
