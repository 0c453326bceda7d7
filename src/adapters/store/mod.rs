//! Snapshot store adapters.

pub mod memory;

pub use memory::InMemorySnapshotStore;
