// models/src/medical/billing.rs

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::{require_text, ValidationError, ValidationResult};
use crate::identifiers::HospitalNumber;
use crate::money::{ensure_non_negative, round_money};

/// Settlement state of a bill, fixed when the bill is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BillStatus {
    Paid,
    #[serde(rename = "Partially Paid")]
    PartiallyPaid,
    Unpaid,
}

impl BillStatus {
    /// Pure function of the bill total and the amount paid with it.
    ///
    /// Nothing paid against a positive total is `Unpaid`; paying the total or
    /// more is `Paid`; anything between is `PartiallyPaid`. A zero total with
    /// zero paid counts as `Paid`.
    pub fn derive(total: Decimal, paid: Decimal) -> Self {
        if paid <= Decimal::ZERO && total > Decimal::ZERO {
            BillStatus::Unpaid
        } else if paid >= total {
            BillStatus::Paid
        } else {
            BillStatus::PartiallyPaid
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BillStatus::Paid => "Paid",
            BillStatus::PartiallyPaid => "Partially Paid",
            BillStatus::Unpaid => "Unpaid",
        }
    }
}

impl fmt::Display for BillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
    Insurance,
    /// Billed on account; no money changes hands.
    Credit,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Cash",
            PaymentMethod::Card => "Card",
            PaymentMethod::Transfer => "Transfer",
            PaymentMethod::Insurance => "Insurance",
            PaymentMethod::Credit => "Credit",
        }
    }

    pub const ALL: [PaymentMethod; 5] = [
        PaymentMethod::Cash,
        PaymentMethod::Card,
        PaymentMethod::Transfer,
        PaymentMethod::Insurance,
        PaymentMethod::Credit,
    ];
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BillItemKind {
    #[default]
    Service,
    /// Stock item; billing it draws down inventory.
    Product,
    BedCharge,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillItem {
    pub description: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub total: Decimal,
    #[serde(default)]
    pub kind: BillItemKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory_item_id: Option<String>,
}

impl BillItem {
    pub fn new(description: impl Into<String>, quantity: u32, unit_price: Decimal, kind: BillItemKind) -> Self {
        let unit_price = round_money(unit_price);
        BillItem {
            description: description.into(),
            quantity,
            unit_price,
            total: round_money(unit_price * Decimal::from(quantity)),
            kind,
            inventory_item_id: None,
        }
    }

    pub fn with_inventory_item(mut self, inventory_item_id: impl Into<String>) -> Self {
        self.inventory_item_id = Some(inventory_item_id.into());
        self
    }

    /// Cleans the description and recomputes the line total from its parts.
    pub fn validated(mut self) -> ValidationResult<Self> {
        self.description = require_text("item description", &self.description)?;
        if self.quantity == 0 {
            return Err(ValidationError::InvalidQuantity(self.description));
        }
        self.unit_price = ensure_non_negative(&self.description, self.unit_price)?;
        self.total = round_money(self.unit_price * Decimal::from(self.quantity));
        Ok(self)
    }
}

/// An immutable snapshot of what was billed and what was paid with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bill {
    pub id: String,
    pub patient_id: String,
    pub hospital_number: HospitalNumber,
    pub patient_name: String,
    pub items: Vec<BillItem>,
    pub total_bill: Decimal,
    pub amount_paid_at_time_of_bill: Decimal,
    pub balance: Decimal,
    pub status: BillStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
    pub processed_by: String,
    pub created_at: DateTime<Utc>,
}

impl Bill {
    pub fn total_of(items: &[BillItem]) -> Decimal {
        items.iter().map(|item| item.total).sum()
    }
}

/// One append-only entry of the payment ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub patient_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bill_id: Option<String>,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub processed_by: String,
    pub processed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn should_derive_status_from_totals() {
        assert_eq!(BillStatus::derive(dec!(100), dec!(100)), BillStatus::Paid);
        assert_eq!(BillStatus::derive(dec!(100), dec!(150)), BillStatus::Paid);
        assert_eq!(BillStatus::derive(dec!(100), dec!(40)), BillStatus::PartiallyPaid);
        assert_eq!(BillStatus::derive(dec!(100), dec!(0)), BillStatus::Unpaid);
        assert_eq!(BillStatus::derive(dec!(0), dec!(0)), BillStatus::Paid);
    }

    #[test]
    fn should_serialize_partial_status_with_space() {
        let json = serde_json::to_value(BillStatus::PartiallyPaid).unwrap();
        assert_eq!(json, serde_json::json!("Partially Paid"));
    }

    #[test]
    fn should_compute_line_totals() {
        let item = BillItem::new("Paracetamol 500mg", 3, dec!(2.50), BillItemKind::Product);
        assert_eq!(item.total, dec!(7.50));
        assert_eq!(Bill::total_of(&[item.clone(), item]), dec!(15.00));
    }

    #[test]
    fn should_reject_zero_quantity_items() {
        let item = BillItem::new("X-ray", 0, dec!(30), BillItemKind::Service);
        assert_eq!(
            item.validated(),
            Err(ValidationError::InvalidQuantity("X-ray".to_string()))
        );
    }
}
