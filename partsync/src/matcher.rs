//! Matcher
//!
//! Resolves a design component to its inventory record. A component
//! that already carries a `PartDB_ID` field is trusted outright
//! (stability over re-discovery); otherwise identifying fields drive a
//! backend search. Ambiguity is reported, never guessed away.

use std::sync::Arc;

use serde::Serialize;

use crate::design::ComponentFields;
use crate::record::{FIELD_DESCRIPTION, FIELD_MPN, FIELD_PARTDB_ID};
use crate::remote::{InventoryClient, RemoteError, SearchHit, SearchQuery};

/// Outcome of matching one component against the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MatchResult {
    Resolved(String),
    Ambiguous(Vec<String>),
    Unresolved,
}

pub struct Matcher {
    client: Arc<dyn InventoryClient>,
}

impl Matcher {
    pub fn new(client: Arc<dyn InventoryClient>) -> Self {
        Self { client }
    }

    /// Determine the inventory record for a component from its current
    /// fields.
    pub async fn match_component(
        &self,
        component_id: &str,
        fields: &ComponentFields,
    ) -> Result<MatchResult, RemoteError> {
        // Prior resolution is authoritative.
        if let Some(id) = non_empty(fields.get(FIELD_PARTDB_ID)) {
            tracing::debug!("{}: trusting existing inventory id {}", component_id, id);
            return Ok(MatchResult::Resolved(id.to_string()));
        }

        let query = SearchQuery {
            manufacturer_part_number: non_empty(fields.get(FIELD_MPN)).map(str::to_string),
            description: non_empty(fields.get(FIELD_DESCRIPTION)).map(str::to_string),
        };
        if query.is_empty() {
            tracing::debug!("{}: no identifying fields, unresolved", component_id);
            return Ok(MatchResult::Unresolved);
        }

        let hits = self.client.search(&query).await?;

        // An exact manufacturer-part-number hit short-circuits.
        if let Some(ref mpn) = query.manufacturer_part_number {
            if let Some(hit) = hits.iter().find(|h| mpn_matches(h, mpn)) {
                return Ok(MatchResult::Resolved(hit.record.inventory_id.clone()));
            }
        }

        Ok(rank_hits(&hits))
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.trim().is_empty())
}

fn mpn_matches(hit: &SearchHit, mpn: &str) -> bool {
    hit.record
        .manufacturer_part_number
        .as_deref()
        .map(|m| m.eq_ignore_ascii_case(mpn))
        .unwrap_or(false)
}

/// Rank partial hits: a unique best candidate resolves, a tie at the
/// top is ambiguous, nothing at all is unresolved.
fn rank_hits(hits: &[SearchHit]) -> MatchResult {
    let best = hits
        .iter()
        .map(|h| h.relevance)
        .fold(f32::NEG_INFINITY, f32::max);
    let mut top: Vec<String> = hits
        .iter()
        .filter(|h| (h.relevance - best).abs() < f32::EPSILON)
        .map(|h| h.record.inventory_id.clone())
        .collect();

    match top.len() {
        0 => MatchResult::Unresolved,
        1 => MatchResult::Resolved(top.remove(0)),
        _ => {
            top.sort();
            MatchResult::Ambiguous(top)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::PartRecord;
    use async_trait::async_trait;

    fn record(id: &str, mpn: Option<&str>) -> PartRecord {
        PartRecord {
            inventory_id: id.to_string(),
            name: format!("part {}", id),
            manufacturer_part_number: mpn.map(str::to_string),
            description: None,
            datasheet_url: None,
            stock_quantity: 0,
            unit_price: None,
            footprint_ref: None,
            symbol_ref: None,
            storage_location: None,
            last_modified: None,
        }
    }

    struct FakeClient {
        hits: Vec<SearchHit>,
    }

    #[async_trait]
    impl InventoryClient for FakeClient {
        fn name(&self) -> &str {
            "fake"
        }

        async fn is_available(&self) -> bool {
            true
        }

        async fn fetch_by_id(&self, _id: &str) -> Result<Option<PartRecord>, RemoteError> {
            Ok(None)
        }

        async fn search(&self, _query: &SearchQuery) -> Result<Vec<SearchHit>, RemoteError> {
            Ok(self.hits.clone())
        }
    }

    fn matcher(hits: Vec<SearchHit>) -> Matcher {
        Matcher::new(Arc::new(FakeClient { hits }))
    }

    fn fields(entries: &[(&str, &str)]) -> ComponentFields {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn existing_inventory_id_is_trusted() {
        let m = matcher(vec![]);
        let result = m
            .match_component("R1", &fields(&[(FIELD_PARTDB_ID, "42")]))
            .await
            .unwrap();
        assert_eq!(result, MatchResult::Resolved("42".to_string()));
    }

    #[tokio::test]
    async fn exact_mpn_short_circuits() {
        let m = matcher(vec![
            SearchHit {
                record: record("1", Some("R-1206-10K-X")),
                relevance: 0.5,
            },
            SearchHit {
                record: record("2", Some("R-1206-10K")),
                relevance: 1.0,
            },
        ]);
        let result = m
            .match_component("R1", &fields(&[(FIELD_MPN, "r-1206-10k")]))
            .await
            .unwrap();
        assert_eq!(result, MatchResult::Resolved("2".to_string()));
    }

    #[tokio::test]
    async fn equally_ranked_hits_are_ambiguous() {
        let m = matcher(vec![
            SearchHit {
                record: record("7", Some("R-1206-10K-A")),
                relevance: 0.5,
            },
            SearchHit {
                record: record("3", Some("R-1206-10K-B")),
                relevance: 0.5,
            },
        ]);
        let result = m
            .match_component("R1", &fields(&[(FIELD_MPN, "R-1206-10K")]))
            .await
            .unwrap();
        assert_eq!(
            result,
            MatchResult::Ambiguous(vec!["3".to_string(), "7".to_string()])
        );
    }

    #[tokio::test]
    async fn unique_top_hit_resolves() {
        let m = matcher(vec![
            SearchHit {
                record: record("7", Some("R-1206-10K-A")),
                relevance: 0.8,
            },
            SearchHit {
                record: record("3", Some("R-1206-10K-B")),
                relevance: 0.5,
            },
        ]);
        let result = m
            .match_component("R1", &fields(&[(FIELD_MPN, "R-1206-10K")]))
            .await
            .unwrap();
        assert_eq!(result, MatchResult::Resolved("7".to_string()));
    }

    #[tokio::test]
    async fn no_identifying_fields_is_unresolved() {
        let m = matcher(vec![SearchHit {
            record: record("1", None),
            relevance: 1.0,
        }]);
        let result = m.match_component("R1", &fields(&[])).await.unwrap();
        assert_eq!(result, MatchResult::Unresolved);

        // Whitespace-only fields count as absent.
        let result = m
            .match_component("R1", &fields(&[(FIELD_MPN, "  ")]))
            .await
            .unwrap();
        assert_eq!(result, MatchResult::Unresolved);
    }

    #[tokio::test]
    async fn no_hits_is_unresolved() {
        let m = matcher(vec![]);
        let result = m
            .match_component("R1", &fields(&[(FIELD_MPN, "R-1206-10K")]))
            .await
            .unwrap();
        assert_eq!(result, MatchResult::Unresolved);
    }
}
