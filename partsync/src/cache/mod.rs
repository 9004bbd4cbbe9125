//! Durable cache for remote lookups and per-component sync snapshots.

pub mod store;

pub use store::{StoreError, StoreStats, SyncStore};
