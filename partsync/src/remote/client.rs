//! Inventory Client Trait
//!
//! Defines the contract the sync engine consumes for remote lookups.
//! Implementations own transport, authentication, and retry behavior.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::record::PartRecord;
use crate::remote::RemoteError;

/// Identifying fields used for a search against the backend, in
/// descending match priority.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub manufacturer_part_number: Option<String>,
    pub description: Option<String>,
}

impl SearchQuery {
    pub fn is_empty(&self) -> bool {
        self.manufacturer_part_number.is_none() && self.description.is_none()
    }
}

/// A single search result with its backend-assigned relevance.
/// Higher relevance means a better match; equal relevance means the
/// backend cannot distinguish the candidates.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub record: PartRecord,
    pub relevance: f32,
}

/// Common trait for inventory backends.
#[async_trait]
pub trait InventoryClient: Send + Sync {
    /// Backend name for logging and status output.
    fn name(&self) -> &str;

    /// Check whether the backend is reachable and the credentials work.
    async fn is_available(&self) -> bool;

    /// Fetch a part record by its stable inventory identifier.
    /// `Ok(None)` means the backend has no such record.
    async fn fetch_by_id(&self, id: &str) -> Result<Option<PartRecord>, RemoteError>;

    /// Search for candidate records, ordered by descending relevance.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, RemoteError>;
}
