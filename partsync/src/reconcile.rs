//! Field Reconciler
//!
//! Per-field three-way merge between the component's current values,
//! the last-applied snapshot, and a freshly fetched remote record.
//! Fields never interact: components carry a mix of engine-managed and
//! hand-curated data, and a plain overwrite-on-sync would destroy
//! manual corrections.

use serde::{Deserialize, Serialize};

use crate::design::ComponentFields;
use crate::record::{PartRecord, MANAGED_FIELDS};

/// What wins when both sides changed a field since the last sync.
/// Either way the conflict is recorded in the plan; a user edit is
/// never overwritten without being signaled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    #[default]
    PreferLocal,
    PreferRemote,
}

/// One field value update the plan will apply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub field: String,
    pub old: String,
    pub new: String,
}

/// A field where local and remote both diverged from the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldConflict {
    pub field: String,
    /// Snapshot value both sides started from.
    pub base: String,
    pub local: String,
    pub remote: String,
    /// Value kept under the active policy.
    pub kept: String,
}

/// Ephemeral per-component merge result for one sync pass.
#[derive(Debug, Clone, Default)]
pub struct UpdatePlan {
    pub changes: Vec<FieldChange>,
    pub conflicts: Vec<FieldConflict>,
    /// Snapshot to persist once the changes are applied.
    pub snapshot: ComponentFields,
}

impl UpdatePlan {
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty() && self.conflicts.is_empty()
    }
}

/// Merge one component against a fetched record.
///
/// Per managed field, independently:
/// - no snapshot yet (first sync) or the user left the field untouched:
///   the remote value applies;
/// - only the local side changed: the user edit is preserved;
/// - both sides changed to the same value: converged, no conflict;
/// - both sides diverged: a conflict is recorded and `policy` picks the
///   survivor.
///
/// The plan's snapshot records the remote value for every field, so a
/// preserved local edit reads as "locally changed" again on the next
/// pass instead of re-raising the same conflict.
pub fn reconcile(
    current: &ComponentFields,
    snapshot: Option<&ComponentFields>,
    remote: &PartRecord,
    policy: ConflictPolicy,
) -> UpdatePlan {
    let mut plan = UpdatePlan::default();

    for field in MANAGED_FIELDS {
        let local = current.get(field).cloned().unwrap_or_default();
        let remote_value = remote.field_value(field);
        let base = snapshot.and_then(|s| s.get(field).cloned());

        let desired = match base {
            // First sync of this component: the remote record seeds the
            // managed fields.
            None => remote_value.clone(),
            Some(ref base) => {
                if local == *base {
                    remote_value.clone()
                } else if remote_value == *base {
                    local.clone()
                } else if local == remote_value {
                    local.clone()
                } else {
                    let kept = match policy {
                        ConflictPolicy::PreferLocal => local.clone(),
                        ConflictPolicy::PreferRemote => remote_value.clone(),
                    };
                    plan.conflicts.push(FieldConflict {
                        field: field.to_string(),
                        base: base.clone(),
                        local: local.clone(),
                        remote: remote_value.clone(),
                        kept: kept.clone(),
                    });
                    kept
                }
            }
        };

        if desired != local {
            plan.changes.push(FieldChange {
                field: field.to_string(),
                old: local,
                new: desired,
            });
        }
        plan.snapshot.insert(field.to_string(), remote_value);
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{
        FIELD_DESCRIPTION, FIELD_MPN, FIELD_PARTDB_ID, FIELD_STOCK, FIELD_STORAGE_LOCATION,
    };

    fn remote() -> PartRecord {
        PartRecord {
            inventory_id: "42".to_string(),
            name: "10k resistor".to_string(),
            manufacturer_part_number: Some("R-1206-10K".to_string()),
            description: Some("Thick film, 1%".to_string()),
            datasheet_url: None,
            stock_quantity: 500,
            unit_price: None,
            footprint_ref: None,
            symbol_ref: None,
            storage_location: Some("Shelf A3".to_string()),
            last_modified: None,
        }
    }

    fn change_for<'a>(plan: &'a UpdatePlan, field: &str) -> Option<&'a FieldChange> {
        plan.changes.iter().find(|c| c.field == field)
    }

    #[test]
    fn first_sync_takes_remote_values() {
        let mut current = ComponentFields::new();
        current.insert(FIELD_MPN.to_string(), "R-1206-10K".to_string());

        let plan = reconcile(&current, None, &remote(), ConflictPolicy::PreferLocal);

        assert!(plan.conflicts.is_empty());
        assert_eq!(change_for(&plan, FIELD_STOCK).unwrap().new, "500");
        assert_eq!(change_for(&plan, FIELD_PARTDB_ID).unwrap().new, "42");
        // MPN already matches the record; no change for it.
        assert!(change_for(&plan, FIELD_MPN).is_none());
        assert_eq!(
            plan.snapshot.get(FIELD_STORAGE_LOCATION).map(String::as_str),
            Some("Shelf A3")
        );
    }

    #[test]
    fn untouched_field_follows_remote() {
        let record = remote();
        let snapshot = record.managed_fields();
        let current = snapshot.clone();

        let mut updated = record.clone();
        updated.stock_quantity = 350;

        let plan = reconcile(&current, Some(&snapshot), &updated, ConflictPolicy::PreferLocal);
        assert!(plan.conflicts.is_empty());
        let change = change_for(&plan, FIELD_STOCK).unwrap();
        assert_eq!(change.old, "500");
        assert_eq!(change.new, "350");
    }

    #[test]
    fn local_edit_is_preserved_without_conflict() {
        let record = remote();
        let snapshot = record.managed_fields();
        let mut current = snapshot.clone();
        current.insert(
            FIELD_DESCRIPTION.to_string(),
            "hand-checked: 0.1%".to_string(),
        );

        let plan = reconcile(&current, Some(&snapshot), &record, ConflictPolicy::PreferLocal);
        assert!(plan.is_noop(), "unexpected plan: {:?}", plan);
    }

    #[test]
    fn divergent_edits_conflict_and_local_wins_by_default() {
        let record = remote();
        let snapshot = record.managed_fields();
        let mut current = snapshot.clone();
        current.insert(
            FIELD_DESCRIPTION.to_string(),
            "hand-checked: 0.1%".to_string(),
        );

        let mut updated = record.clone();
        updated.description = Some("Thin film, 1%".to_string());
        updated.stock_quantity = 350;

        let plan = reconcile(&current, Some(&snapshot), &updated, ConflictPolicy::PreferLocal);

        assert_eq!(plan.conflicts.len(), 1);
        let conflict = &plan.conflicts[0];
        assert_eq!(conflict.field, FIELD_DESCRIPTION);
        assert_eq!(conflict.base, "Thick film, 1%");
        assert_eq!(conflict.local, "hand-checked: 0.1%");
        assert_eq!(conflict.remote, "Thin film, 1%");
        assert_eq!(conflict.kept, "hand-checked: 0.1%");

        // The conflicted field stays local; unrelated fields still sync.
        assert!(change_for(&plan, FIELD_DESCRIPTION).is_none());
        assert_eq!(change_for(&plan, FIELD_STOCK).unwrap().new, "350");
    }

    #[test]
    fn prefer_remote_overwrites_but_still_reports() {
        let record = remote();
        let snapshot = record.managed_fields();
        let mut current = snapshot.clone();
        current.insert(FIELD_DESCRIPTION.to_string(), "local edit".to_string());

        let mut updated = record.clone();
        updated.description = Some("remote edit".to_string());

        let plan = reconcile(&current, Some(&snapshot), &updated, ConflictPolicy::PreferRemote);

        assert_eq!(plan.conflicts.len(), 1);
        assert_eq!(plan.conflicts[0].kept, "remote edit");
        assert_eq!(change_for(&plan, FIELD_DESCRIPTION).unwrap().new, "remote edit");
    }

    #[test]
    fn convergent_edits_do_not_conflict() {
        let record = remote();
        let snapshot = record.managed_fields();
        let mut current = snapshot.clone();
        current.insert(FIELD_DESCRIPTION.to_string(), "Thin film, 1%".to_string());

        let mut updated = record.clone();
        updated.description = Some("Thin film, 1%".to_string());

        let plan = reconcile(&current, Some(&snapshot), &updated, ConflictPolicy::PreferLocal);
        assert!(plan.is_noop(), "unexpected plan: {:?}", plan);
    }

    #[test]
    fn conflict_is_not_re_reported_on_next_pass() {
        let record = remote();
        let snapshot = record.managed_fields();
        let mut current = snapshot.clone();
        current.insert(FIELD_DESCRIPTION.to_string(), "local edit".to_string());

        let mut updated = record.clone();
        updated.description = Some("remote edit".to_string());

        let plan = reconcile(&current, Some(&snapshot), &updated, ConflictPolicy::PreferLocal);
        assert_eq!(plan.conflicts.len(), 1);

        // Apply the plan, persist its snapshot, run again unchanged.
        let mut after = current.clone();
        for change in &plan.changes {
            after.insert(change.field.clone(), change.new.clone());
        }
        let second = reconcile(&after, Some(&plan.snapshot), &updated, ConflictPolicy::PreferLocal);
        assert!(second.is_noop(), "unexpected plan: {:?}", second);
    }

    #[test]
    fn cleared_remote_value_clears_untouched_field() {
        let record = remote();
        let snapshot = record.managed_fields();
        let current = snapshot.clone();

        let mut updated = record.clone();
        updated.storage_location = None;

        let plan = reconcile(&current, Some(&snapshot), &updated, ConflictPolicy::PreferLocal);
        let change = change_for(&plan, FIELD_STORAGE_LOCATION).unwrap();
        assert_eq!(change.new, "");
    }

    #[test]
    fn apply_then_reconcile_is_idempotent() {
        let record = remote();
        let current = ComponentFields::new();

        let first = reconcile(&current, None, &record, ConflictPolicy::PreferLocal);
        let mut after = current.clone();
        for change in &first.changes {
            after.insert(change.field.clone(), change.new.clone());
        }

        let second = reconcile(&after, Some(&first.snapshot), &record, ConflictPolicy::PreferLocal);
        assert!(second.is_noop(), "unexpected plan: {:?}", second);
    }
}
