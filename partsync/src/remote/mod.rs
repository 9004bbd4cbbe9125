//! Remote inventory backend boundary.
//!
//! The engine consumes the [`InventoryClient`] trait; transport and
//! authentication live behind it. [`PartDbClient`] is the concrete
//! Part-DB REST implementation.

pub mod client;
pub mod partdb;

pub use client::{InventoryClient, SearchHit, SearchQuery};
pub use partdb::PartDbClient;

/// Errors from the remote inventory backend.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("failed to parse response: {0}")]
    Parse(String),
    #[error("missing or empty API token")]
    MissingToken,
}
