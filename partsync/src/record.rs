//! Canonical inventory records and the managed-field vocabulary.
//!
//! A [`PartRecord`] is an immutable snapshot of a Part-DB part as the
//! engine last fetched it. The engine never mutates a record; a re-fetch
//! supersedes it. Design components carry a bounded set of named string
//! fields, and only the names listed in [`MANAGED_FIELDS`] are ever
//! touched by the engine.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Inventory identifier written back to the design (trusted on re-runs).
pub const FIELD_PARTDB_ID: &str = "PartDB_ID";
/// Manufacturer part number.
pub const FIELD_MPN: &str = "MPN";
pub const FIELD_DESCRIPTION: &str = "Description";
pub const FIELD_DATASHEET: &str = "Datasheet";
pub const FIELD_STOCK: &str = "Stock";
pub const FIELD_UNIT_PRICE: &str = "Unit_Price";
pub const FIELD_FOOTPRINT: &str = "Footprint";
pub const FIELD_SYMBOL: &str = "Symbol";
pub const FIELD_STORAGE_LOCATION: &str = "Storage_Location";

/// Design-component fields the engine is authorized to read and write.
pub const MANAGED_FIELDS: [&str; 9] = [
    FIELD_PARTDB_ID,
    FIELD_MPN,
    FIELD_DESCRIPTION,
    FIELD_DATASHEET,
    FIELD_STOCK,
    FIELD_UNIT_PRICE,
    FIELD_FOOTPRINT,
    FIELD_SYMBOL,
    FIELD_STORAGE_LOCATION,
];

/// Canonical inventory entity, as last fetched from the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartRecord {
    /// Unique, stable identifier in the inventory system.
    pub inventory_id: String,
    /// Human-readable part name.
    pub name: String,
    pub manufacturer_part_number: Option<String>,
    pub description: Option<String>,
    pub datasheet_url: Option<String>,
    /// Total amount across all part lots.
    pub stock_quantity: u64,
    /// Lowest single-unit price, when the backend carries price details.
    pub unit_price: Option<Decimal>,
    pub footprint_ref: Option<String>,
    pub symbol_ref: Option<String>,
    /// Comma-joined storage location names across part lots.
    pub storage_location: Option<String>,
    /// Remote modification timestamp.
    pub last_modified: Option<DateTime<Utc>>,
}

impl PartRecord {
    /// Value this record supplies for a managed design field.
    ///
    /// Attributes the record does not carry map to the empty string, same
    /// as what the engine writes into the design for a missing value.
    /// Unknown field names also map to the empty string; callers iterate
    /// [`MANAGED_FIELDS`] so this only matters for bad input.
    pub fn field_value(&self, field: &str) -> String {
        match field {
            FIELD_PARTDB_ID => self.inventory_id.clone(),
            FIELD_MPN => self.manufacturer_part_number.clone().unwrap_or_default(),
            FIELD_DESCRIPTION => self.description.clone().unwrap_or_default(),
            FIELD_DATASHEET => self.datasheet_url.clone().unwrap_or_default(),
            FIELD_STOCK => self.stock_quantity.to_string(),
            FIELD_UNIT_PRICE => self
                .unit_price
                .map(|p| p.to_string())
                .unwrap_or_default(),
            FIELD_FOOTPRINT => self.footprint_ref.clone().unwrap_or_default(),
            FIELD_SYMBOL => self.symbol_ref.clone().unwrap_or_default(),
            FIELD_STORAGE_LOCATION => self.storage_location.clone().unwrap_or_default(),
            _ => String::new(),
        }
    }

    /// All managed field values this record would project into a design.
    pub fn managed_fields(&self) -> BTreeMap<String, String> {
        MANAGED_FIELDS
            .iter()
            .map(|f| (f.to_string(), self.field_value(f)))
            .collect()
    }
}
