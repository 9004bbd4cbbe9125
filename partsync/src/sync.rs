//! Sync Orchestrator
//!
//! Drives the per-component pipeline (match → fetch/cache → reconcile →
//! apply) over a bounded pool of concurrent workers and aggregates
//! per-component outcomes into a [`SyncReport`]. One component's
//! failure never aborts the batch; only a broken cache store does.

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{StreamExt, TryStreamExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::cache::SyncStore;
use crate::core::{ComponentOutcome, ComponentReport, SyncError, SyncOptions, SyncReport};
use crate::design::FieldStore;
use crate::matcher::{MatchResult, Matcher};
use crate::reconcile::reconcile;
use crate::record::PartRecord;
use crate::remote::InventoryClient;

/// Result of resolving a part record through the cache.
enum FetchOutcome {
    /// Fresh from cache or just fetched.
    Fresh(PartRecord),
    /// Remote unreachable; an expired cache entry was served instead.
    Stale(PartRecord),
    /// The backend has no record under this id.
    NotFound,
    /// Remote unreachable and nothing cached.
    Unavailable(String),
}

/// The synchronization engine. Holds the remote client, the durable
/// cache/snapshot store, and the pass options; one engine serves any
/// number of passes.
pub struct SyncEngine {
    client: Arc<dyn InventoryClient>,
    store: SyncStore,
    options: SyncOptions,
    matcher: Matcher,
    /// At most one in-flight remote fetch per inventory id; workers for
    /// the same id queue here and re-check the cache afterwards.
    fetch_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SyncEngine {
    pub fn new(client: Arc<dyn InventoryClient>, store: SyncStore, options: SyncOptions) -> Self {
        let matcher = Matcher::new(client.clone());
        Self {
            client,
            store,
            options,
            matcher,
            fetch_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Run one sync pass over `components`.
    pub async fn sync(
        &self,
        components: &[String],
        fields: &dyn FieldStore,
    ) -> Result<SyncReport, SyncError> {
        self.sync_cancellable(components, fields, CancellationToken::new())
            .await
    }

    /// Run one sync pass with cooperative cancellation: in-flight
    /// components finish, unstarted ones are reported as skipped. A
    /// component is never interrupted mid-write.
    pub async fn sync_cancellable(
        &self,
        components: &[String],
        fields: &dyn FieldStore,
        cancel: CancellationToken,
    ) -> Result<SyncReport, SyncError> {
        let unique = dedupe(components);
        tracing::info!(
            "Starting sync pass over {} component(s), concurrency {}",
            unique.len(),
            self.options.concurrency
        );

        let limit = self.options.concurrency.max(1);
        let mut reports: Vec<(usize, ComponentReport)> = futures::stream::iter(
            unique.into_iter().enumerate().map(|(index, component_id)| {
                let cancel = cancel.clone();
                async move {
                    let (outcome, stale) = if cancel.is_cancelled() {
                        (ComponentOutcome::Skipped, false)
                    } else {
                        self.sync_component(&component_id, fields).await?
                    };
                    Ok::<_, SyncError>((
                        index,
                        ComponentReport {
                            component_id,
                            outcome,
                            stale,
                        },
                    ))
                }
            }),
        )
        .buffer_unordered(limit)
        .try_collect()
        .await?;

        // buffer_unordered yields in completion order; restore the
        // caller's ordering for stable reports.
        reports.sort_by_key(|(index, _)| *index);
        let outcomes: Vec<ComponentReport> = reports.into_iter().map(|(_, r)| r).collect();

        let report = SyncReport::new(outcomes, cancel.is_cancelled());
        tracing::info!(
            "Sync pass done: {} applied, {} unchanged, {} conflicts, {} unresolved, {} ambiguous, {} failed, {} skipped",
            report.stats.applied,
            report.stats.unchanged,
            report.stats.conflicts,
            report.stats.unresolved,
            report.stats.ambiguous,
            report.stats.failed,
            report.stats.skipped,
        );
        Ok(report)
    }

    /// The four-stage pipeline for one component, strictly sequential.
    /// Component-level failures come back as outcomes; only store
    /// errors propagate and abort the pass. The returned flag marks
    /// outcomes computed from a stale cache entry.
    async fn sync_component(
        &self,
        component_id: &str,
        fields: &dyn FieldStore,
    ) -> Result<(ComponentOutcome, bool), SyncError> {
        let current = match fields.read_fields(component_id).await {
            Ok(current) => current,
            Err(e) => {
                return Ok((
                    ComponentOutcome::Failed {
                        error: format!("field read failed: {}", e),
                    },
                    false,
                ))
            }
        };

        let matched = match self.matcher.match_component(component_id, &current).await {
            Ok(matched) => matched,
            Err(e) => {
                return Ok((
                    ComponentOutcome::Failed {
                        error: format!("match failed: {}", e),
                    },
                    false,
                ))
            }
        };
        let inventory_id = match matched {
            MatchResult::Resolved(id) => id,
            MatchResult::Ambiguous(candidates) => {
                return Ok((ComponentOutcome::Ambiguous { candidates }, false))
            }
            MatchResult::Unresolved => return Ok((ComponentOutcome::Unresolved, false)),
        };

        let (record, stale) = match self.fetch_part(&inventory_id).await? {
            FetchOutcome::Fresh(record) => (record, false),
            FetchOutcome::Stale(record) => {
                tracing::warn!(
                    "{}: serving stale cache entry for {} after failed re-fetch",
                    component_id,
                    inventory_id
                );
                (record, true)
            }
            FetchOutcome::NotFound => {
                tracing::warn!(
                    "{}: inventory id {} no longer exists",
                    component_id,
                    inventory_id
                );
                return Ok((ComponentOutcome::Unresolved, false));
            }
            FetchOutcome::Unavailable(error) => {
                return Ok((ComponentOutcome::Failed { error }, false))
            }
        };

        let snapshot = self.store.snapshot(component_id)?;
        let plan = reconcile(
            &current,
            snapshot.as_ref(),
            &record,
            self.options.conflict_policy,
        );

        if !self.options.dry_run {
            if !plan.changes.is_empty() {
                let mut updated = current.clone();
                for change in &plan.changes {
                    updated.insert(change.field.clone(), change.new.clone());
                }
                if let Err(e) = fields.write_fields(component_id, &updated).await {
                    // Snapshot must not move if the design write failed.
                    return Ok((
                        ComponentOutcome::Failed {
                            error: format!("field write failed: {}", e),
                        },
                        stale,
                    ));
                }
            }
            if snapshot.as_ref() != Some(&plan.snapshot) {
                self.store.put_snapshot(component_id, &plan.snapshot)?;
            }
        }

        if plan.conflicts.is_empty() {
            Ok((
                ComponentOutcome::Applied {
                    changes: plan.changes,
                },
                stale,
            ))
        } else {
            Ok((
                ComponentOutcome::ConflictsFound {
                    conflicts: plan.conflicts,
                    applied: plan.changes,
                },
                stale,
            ))
        }
    }

    /// Resolve a record through the cache, fetching on a miss. A fresh
    /// fetch always overwrites; on fetch failure a stale entry is
    /// served rather than failing the component.
    async fn fetch_part(&self, inventory_id: &str) -> Result<FetchOutcome, SyncError> {
        let ttl = self.options.cache_ttl;
        if let Some(record) = self.store.get_part_fresh(inventory_id, ttl)? {
            tracing::debug!("cache hit for {}", inventory_id);
            return Ok(FetchOutcome::Fresh(record));
        }

        let lock = {
            let mut locks = self.fetch_locks.lock().await;
            locks
                .entry(inventory_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let outcome = {
            let _guard = lock.lock().await;
            self.fetch_part_locked(inventory_id).await
        };
        // Queued workers hold their own Arc to the lock; dropping the
        // map entry only means the next cache miss starts a new flight.
        self.fetch_locks.lock().await.remove(inventory_id);
        outcome
    }

    async fn fetch_part_locked(&self, inventory_id: &str) -> Result<FetchOutcome, SyncError> {
        let ttl = self.options.cache_ttl;

        // Another worker may have fetched while we queued.
        if let Some(record) = self.store.get_part_fresh(inventory_id, ttl)? {
            return Ok(FetchOutcome::Fresh(record));
        }

        match self.client.fetch_by_id(inventory_id).await {
            Ok(Some(record)) => {
                self.store.put_part(&record)?;
                Ok(FetchOutcome::Fresh(record))
            }
            Ok(None) => {
                self.store.invalidate_part(inventory_id)?;
                Ok(FetchOutcome::NotFound)
            }
            Err(e) => match self.store.get_part_any(inventory_id)? {
                Some((record, fetched_at)) => {
                    tracing::warn!(
                        "fetch of {} failed ({}), falling back to entry from {}",
                        inventory_id,
                        e,
                        fetched_at
                    );
                    Ok(FetchOutcome::Stale(record))
                }
                None => Ok(FetchOutcome::Unavailable(e.to_string())),
            },
        }
    }
}

/// Keep the first occurrence of each component id; later duplicates
/// would race on the same field set.
fn dedupe(components: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut unique = Vec::with_capacity(components.len());
    for id in components {
        if seen.insert(id.as_str()) {
            unique.push(id.clone());
        } else {
            tracing::warn!("duplicate component id {} in sync pass, ignoring", id);
        }
    }
    unique
}
