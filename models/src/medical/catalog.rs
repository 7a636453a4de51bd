// models/src/medical/catalog.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::{require_text, ValidationResult};
use crate::money::ensure_non_negative;

/// Normalizes names for the loose description/name match used by billing.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceListItem {
    pub id: String,
    pub name: String,
    pub category: String,
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl PriceListItem {
    pub fn validated(mut self) -> ValidationResult<Self> {
        self.name = require_text("name", &self.name)?;
        self.category = require_text("category", &self.category)?;
        self.price = ensure_non_negative("price", self.price)?;
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: String,
    pub name: String,
    pub category: String,
    /// May go negative when stock is billed before it is booked in.
    pub quantity: i64,
    pub unit: String,
    #[serde(default)]
    pub reorder_level: i64,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    pub fn validated(mut self) -> ValidationResult<Self> {
        self.name = require_text("name", &self.name)?;
        self.category = require_text("category", &self.category)?;
        self.unit = require_text("unit", &self.unit)?;
        Ok(self)
    }

    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.reorder_level
    }

    pub fn matches_name(&self, description: &str) -> bool {
        normalize_name(&self.name) == normalize_name(description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_match_names_loosely() {
        let item = InventoryItem {
            id: "inv-1".to_string(),
            name: "Paracetamol  500mg".to_string(),
            category: "Drugs".to_string(),
            quantity: 10,
            unit: "tablet".to_string(),
            reorder_level: 2,
            updated_at: Utc::now(),
        };
        assert!(item.matches_name(" paracetamol 500MG "));
        assert!(!item.matches_name("Paracetamol 1g"));
    }
}
