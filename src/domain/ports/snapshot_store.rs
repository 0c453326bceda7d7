//! Snapshot store port - explicit, caller-scoped key/value storage.

use async_trait::async_trait;

use crate::domain::models::PageSnapshot;

/// Stores page snapshots for the lifetime of one request or process.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn put(&self, key: String, value: PageSnapshot);

    async fn get(&self, key: &str) -> Option<PageSnapshot>;
}
