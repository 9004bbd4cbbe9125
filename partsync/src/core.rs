//! Shared engine types: errors, options, and the sync report.
//! No CLI or transport dependencies.

use std::time::Duration;

use serde::Serialize;

use crate::cache::StoreError;
use crate::reconcile::{ConflictPolicy, FieldChange, FieldConflict};
use crate::remote::RemoteError;

/// Default TTL before a cached part record is considered stale.
pub const DEFAULT_CACHE_TTL_HOURS: u64 = 6;
/// Default number of components synced in parallel.
pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("cache store error: {0}")]
    Store(#[from] StoreError),
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Options for one sync pass.
#[derive(Clone, Debug)]
pub struct SyncOptions {
    /// Upper bound on components processed concurrently.
    pub concurrency: usize,
    /// Freshness window for cached part records.
    pub cache_ttl: Duration,
    pub conflict_policy: ConflictPolicy,
    /// Compute plans and report, but write nothing.
    pub dry_run: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_HOURS * 3600),
            conflict_policy: ConflictPolicy::default(),
            dry_run: false,
        }
    }
}

/// Outcome of syncing one component. No outcome is ever dropped: every
/// component handed to a pass shows up in the report with one of these.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ComponentOutcome {
    /// Reconciled cleanly; `changes` is empty on an idempotent re-run.
    Applied { changes: Vec<FieldChange> },
    /// At least one field conflicted; non-conflicting changes were
    /// still applied.
    ConflictsFound {
        conflicts: Vec<FieldConflict>,
        applied: Vec<FieldChange>,
    },
    /// No inventory record could be determined.
    Unresolved,
    /// Several equally plausible records; left for manual resolution.
    Ambiguous { candidates: Vec<String> },
    /// Component-level failure; the rest of the batch continued.
    Failed { error: String },
    /// Pass was cancelled before this component started.
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentReport {
    pub component_id: String,
    pub outcome: ComponentOutcome,
    /// True when the outcome was computed from an expired cache entry
    /// served after a failed re-fetch.
    pub stale: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncStats {
    /// Components where field changes were written.
    pub applied: usize,
    /// Components already in sync (empty change set).
    pub unchanged: usize,
    pub conflicts: usize,
    pub unresolved: usize,
    pub ambiguous: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Aggregated result of one sync pass.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub outcomes: Vec<ComponentReport>,
    pub stats: SyncStats,
    /// True when the pass stopped early on cancellation.
    pub cancelled: bool,
}

impl SyncReport {
    pub fn new(outcomes: Vec<ComponentReport>, cancelled: bool) -> Self {
        let stats = outcomes_to_stats(&outcomes);
        Self {
            outcomes,
            stats,
            cancelled,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.stats.failed > 0
    }

    pub fn has_conflicts(&self) -> bool {
        self.stats.conflicts > 0
    }

    pub fn total_components(&self) -> usize {
        self.outcomes.len()
    }

    /// Total number of field changes written in this pass.
    pub fn total_changes(&self) -> usize {
        self.outcomes
            .iter()
            .map(|r| match &r.outcome {
                ComponentOutcome::Applied { changes } => changes.len(),
                ComponentOutcome::ConflictsFound { applied, .. } => applied.len(),
                _ => 0,
            })
            .sum()
    }
}

fn outcomes_to_stats(outcomes: &[ComponentReport]) -> SyncStats {
    let mut stats = SyncStats::default();
    for report in outcomes {
        match &report.outcome {
            ComponentOutcome::Applied { changes } if changes.is_empty() => stats.unchanged += 1,
            ComponentOutcome::Applied { .. } => stats.applied += 1,
            ComponentOutcome::ConflictsFound { .. } => stats.conflicts += 1,
            ComponentOutcome::Unresolved => stats.unresolved += 1,
            ComponentOutcome::Ambiguous { .. } => stats.ambiguous += 1,
            ComponentOutcome::Failed { .. } => stats.failed += 1,
            ComponentOutcome::Skipped => stats.skipped += 1,
        }
    }
    stats
}
