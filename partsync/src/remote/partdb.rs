//! Part-DB REST client.
//!
//! Speaks the Part-DB JSON API: bearer-token auth, `parts/{id}` for
//! direct lookups and filtered `parts` collection queries (wrapped in
//! the `hydra:member` envelope) for searches.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::record::PartRecord;
use crate::remote::client::{InventoryClient, SearchHit, SearchQuery};
use crate::remote::RemoteError;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Relevance assigned to an exact manufacturer-part-number hit.
const RELEVANCE_EXACT: f32 = 1.0;
/// Relevance assigned to partial hits; equal on purpose so that several
/// partial candidates rank as indistinguishable.
const RELEVANCE_PARTIAL: f32 = 0.5;

/// Client for a Part-DB instance.
pub struct PartDbClient {
    client: Client,
    base_url: String,
    token: String,
}

impl PartDbClient {
    /// Create a client for `base_url` (e.g. `https://partdb.example.com/api`).
    pub fn new(base_url: &str, token: &str) -> Result<Self, RemoteError> {
        if token.trim().is_empty() {
            return Err(RemoteError::MissingToken);
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>, RemoteError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| status.to_string());
            return Err(RemoteError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let value = response
            .json::<T>()
            .await
            .map_err(|e| RemoteError::Parse(e.to_string()))?;
        Ok(Some(value))
    }

    async fn search_parts(
        &self,
        param: (&str, &str),
    ) -> Result<Vec<PartRecord>, RemoteError> {
        let url = self.url("parts");
        let collection: Option<HydraCollection> = self.get_json(&url, &[param]).await?;
        Ok(collection
            .map(|c| c.member.into_iter().map(ApiPart::into_record).collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl InventoryClient for PartDbClient {
    fn name(&self) -> &str {
        "partdb"
    }

    async fn is_available(&self) -> bool {
        let url = self.url("parts");
        match self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[("itemsPerPage", "1")])
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::warn!("Part-DB instance at {} not reachable: {}", self.base_url, e);
                false
            }
        }
    }

    async fn fetch_by_id(&self, id: &str) -> Result<Option<PartRecord>, RemoteError> {
        let url = self.url(&format!("parts/{}", id));
        tracing::debug!("Fetching Part-DB record {}", id);
        let part: Option<ApiPart> = self.get_json(&url, &[]).await?;
        Ok(part.map(ApiPart::into_record))
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, RemoteError> {
        if let Some(ref mpn) = query.manufacturer_part_number {
            let records = self
                .search_parts(("manufacturer_product_number", mpn.as_str()))
                .await?;
            if !records.is_empty() {
                let mut hits: Vec<SearchHit> = records
                    .into_iter()
                    .map(|record| {
                        let relevance = mpn_relevance(mpn, &record);
                        SearchHit { record, relevance }
                    })
                    .collect();
                hits.sort_by(|a, b| {
                    b.relevance
                        .partial_cmp(&a.relevance)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                return Ok(hits);
            }
        }

        if let Some(ref description) = query.description {
            let records = self.search_parts(("name", description.as_str())).await?;
            return Ok(records
                .into_iter()
                .map(|record| SearchHit {
                    record,
                    relevance: RELEVANCE_PARTIAL,
                })
                .collect());
        }

        Ok(vec![])
    }
}

fn mpn_relevance(query: &str, record: &PartRecord) -> f32 {
    let exact = record
        .manufacturer_part_number
        .as_deref()
        .map(|m| m.eq_ignore_ascii_case(query))
        .unwrap_or(false);
    if exact {
        RELEVANCE_EXACT
    } else {
        RELEVANCE_PARTIAL
    }
}

// --- Wire format -----------------------------------------------------------
//
// API Platform serializes Part-DB entities in camelCase with relation
// sub-objects inlined; only the attributes the engine projects into
// managed fields are modeled here.

#[derive(Debug, Deserialize)]
struct HydraCollection {
    #[serde(rename = "hydra:member", default)]
    member: Vec<ApiPart>,
}

#[derive(Debug, Deserialize)]
struct ApiPart {
    id: i64,
    name: String,
    #[serde(default)]
    manufacturer_product_number: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    manufacturer_product_url: Option<String>,
    #[serde(default, rename = "partLots")]
    part_lots: Vec<ApiPartLot>,
    #[serde(default)]
    orderdetails: Vec<ApiOrderDetail>,
    #[serde(default)]
    eda_info: Option<ApiEdaInfo>,
    #[serde(default, rename = "lastModified")]
    last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ApiPartLot {
    #[serde(default)]
    amount: f64,
    #[serde(default)]
    storage_location: Option<ApiStorage>,
}

#[derive(Debug, Deserialize)]
struct ApiStorage {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiOrderDetail {
    #[serde(default)]
    pricedetails: Vec<ApiPriceDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiPriceDetail {
    price: String,
    #[serde(default = "one")]
    min_discount_quantity: f64,
}

fn one() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
struct ApiEdaInfo {
    #[serde(default)]
    kicad_symbol: Option<String>,
    #[serde(default)]
    kicad_footprint: Option<String>,
}

impl ApiPart {
    fn into_record(self) -> PartRecord {
        let stock_quantity = self
            .part_lots
            .iter()
            .map(|lot| lot.amount)
            .sum::<f64>()
            .round() as u64;

        let locations: Vec<&str> = self
            .part_lots
            .iter()
            .filter_map(|lot| lot.storage_location.as_ref())
            .map(|s| s.name.as_str())
            .collect();
        let storage_location = if locations.is_empty() {
            None
        } else {
            Some(locations.join(", "))
        };

        // Lowest price quoted for a single unit, across all suppliers.
        let unit_price = self
            .orderdetails
            .iter()
            .flat_map(|od| od.pricedetails.iter())
            .filter(|pd| pd.min_discount_quantity <= 1.0)
            .filter_map(|pd| Decimal::from_str(&pd.price).ok())
            .min();

        let (symbol_ref, footprint_ref) = match self.eda_info {
            Some(eda) => (eda.kicad_symbol, eda.kicad_footprint),
            None => (None, None),
        };

        PartRecord {
            inventory_id: self.id.to_string(),
            name: self.name,
            manufacturer_part_number: self.manufacturer_product_number,
            description: self.description,
            datasheet_url: self.manufacturer_product_url,
            stock_quantity,
            unit_price,
            footprint_ref,
            symbol_ref,
            storage_location,
            last_modified: self.last_modified,
        }
    }
}
