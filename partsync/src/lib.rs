//! PartSync - Part-DB inventory synchronization engine for KiCad designs
//!
//! This library resolves design components to canonical records in a
//! Part-DB instance and propagates selected attributes (manufacturer
//! part number, datasheet, stock, price, footprint/symbol references,
//! storage location) into the design's per-component fields, without
//! silently clobbering user edits.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use partsync::{FieldStore, PartDbClient, SyncEngine, SyncOptions, SyncStore};
//! use partsync::design::JsonFieldStore;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = PartDbClient::new("https://partdb.example.com/api", "token")?;
//! let store = SyncStore::open(std::path::Path::new("cache"))?;
//! let engine = SyncEngine::new(Arc::new(client), store, SyncOptions::default());
//!
//! let fields = JsonFieldStore::load(std::path::Path::new("fields.json"))?;
//! let components = fields.component_ids().await?;
//! let report = engine.sync(&components, &fields).await?;
//!
//! for outcome in &report.outcomes {
//!     println!("{}: {:?}", outcome.component_id, outcome.outcome);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Matching**: existing inventory ids trusted, MPN search fallback,
//!   ambiguity reported instead of guessed
//! - **Three-way reconciliation**: user edits survive a sync; divergent
//!   edits surface as conflicts under a configurable policy
//! - **Durable caching**: TTL-bounded part cache and per-component
//!   snapshots survive restarts; stale entries serve as fallback when
//!   the backend is down

pub mod cache;
pub mod config;
pub mod core;
pub mod design;
pub mod matcher;
pub mod reconcile;
pub mod record;
pub mod remote;
pub mod sync;

// Re-export main types
pub use cache::{StoreError, StoreStats, SyncStore};
pub use config::SyncConfig;
pub use crate::core::{
    ComponentOutcome, ComponentReport, SyncError, SyncOptions, SyncReport, SyncStats,
};
pub use design::{ComponentFields, FieldStore, FieldStoreError};
pub use matcher::{MatchResult, Matcher};
pub use reconcile::{reconcile, ConflictPolicy, FieldChange, FieldConflict, UpdatePlan};
pub use record::{PartRecord, MANAGED_FIELDS};
pub use remote::{InventoryClient, PartDbClient, RemoteError, SearchHit, SearchQuery};
pub use sync::SyncEngine;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        ComponentOutcome, ConflictPolicy, FieldStore, InventoryClient, MatchResult, PartRecord,
        SyncEngine, SyncError, SyncOptions, SyncReport, SyncStore,
    };
}
