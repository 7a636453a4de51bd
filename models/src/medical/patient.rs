// models/src/medical/patient.rs

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::{require_text, ValidationError, ValidationResult};
use crate::identifiers::HospitalNumber;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatientStatus {
    /// Registered but not currently holding a bed.
    Outpatient,
    Admitted,
    PendingDischarge,
    Discharged,
}

impl PatientStatus {
    /// Admitted and pending-discharge patients both keep their bed.
    pub fn occupies_bed(self) -> bool {
        matches!(self, PatientStatus::Admitted | PatientStatus::PendingDischarge)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PatientStatus::Outpatient => "Outpatient",
            PatientStatus::Admitted => "Admitted",
            PatientStatus::PendingDischarge => "PendingDischarge",
            PatientStatus::Discharged => "Discharged",
        }
    }
}

impl fmt::Display for PatientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// Running ledger totals kept on the patient document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Financials {
    pub total_bill: Decimal,
    pub amount_paid: Decimal,
    pub balance: Decimal,
}

impl Financials {
    /// `balance == totalBill - amountPaid`, exactly.
    pub fn is_consistent(&self) -> bool {
        self.balance == self.total_bill - self.amount_paid
    }

    /// The totals after billing `charged` and receiving `paid`.
    pub fn after(&self, charged: Decimal, paid: Decimal) -> Self {
        Financials {
            total_bill: self.total_bill + charged,
            amount_paid: self.amount_paid + paid,
            balance: self.balance + charged - paid,
        }
    }

    pub fn has_outstanding_balance(&self) -> bool {
        self.balance > Decimal::ZERO
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextOfKin {
    pub name: String,
    pub relationship: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Demographics {
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_names: Option<String>,
    pub gender: Gender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_of_kin: Option<NextOfKin>,
}

impl Demographics {
    pub fn full_name(&self) -> String {
        match self.other_names.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(other) => format!("{} {} {}", self.first_name, other, self.last_name),
            None => format!("{} {}", self.first_name, self.last_name),
        }
    }

    /// Trims names and checks phone numbers; returns the cleaned record.
    pub fn validated(mut self, today: NaiveDate) -> ValidationResult<Self> {
        self.first_name = require_text("firstName", &self.first_name)?;
        self.last_name = require_text("lastName", &self.last_name)?;
        if let Some(phone) = &self.phone {
            validate_phone("phone", phone)?;
        }
        if let Some(kin) = &self.next_of_kin {
            require_text("nextOfKin.name", &kin.name)?;
            if let Some(phone) = &kin.phone {
                validate_phone("nextOfKin.phone", phone)?;
            }
        }
        if let Some(dob) = self.date_of_birth {
            if dob > today {
                return Err(ValidationError::InvalidValue {
                    field: "dateOfBirth".to_string(),
                    reason: "date of birth is in the future".to_string(),
                });
            }
        }
        Ok(self)
    }
}

fn validate_phone(field: &str, phone: &str) -> ValidationResult<()> {
    let trimmed = phone.trim();
    let body = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let allowed = body.chars().all(|c| c.is_ascii_digit() || c == ' ' || c == '-');
    let digits = body.chars().filter(char::is_ascii_digit).count();
    if !allowed || digits < 7 {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            reason: format!("'{}' is not a phone number", phone),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: String,
    pub hospital_number: HospitalNumber,
    pub demographics: Demographics,
    pub status: PatientStatus,
    #[serde(default)]
    pub financials: Financials,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_ward_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_ward_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_bed_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_admission_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discharge_requested_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discharge_requested_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discharge_notes: Option<String>,
    pub registered_by: String,
    pub registered_at: DateTime<Utc>,
}

impl Patient {
    pub fn full_name(&self) -> String {
        self.demographics.full_name()
    }

    /// Ward id and bed number, when the patient holds a bed.
    pub fn bed(&self) -> Option<(&str, u32)> {
        match (&self.current_ward_id, self.current_bed_number) {
            (Some(ward), Some(bed)) if self.status.occupies_bed() => Some((ward.as_str(), bed)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn demographics() -> Demographics {
        Demographics {
            first_name: "  Ada ".to_string(),
            last_name: "Obi".to_string(),
            other_names: None,
            gender: Gender::Female,
            date_of_birth: NaiveDate::from_ymd_opt(1990, 4, 2),
            phone: Some("+234 801-234-5678".to_string()),
            address: None,
            next_of_kin: None,
        }
    }

    #[test]
    fn should_keep_balance_consistent_after_charges() {
        let start = Financials::default();
        let after = start.after(dec!(100), dec!(40)).after(dec!(20), dec!(0));
        assert_eq!(after.total_bill, dec!(120));
        assert_eq!(after.amount_paid, dec!(40));
        assert_eq!(after.balance, dec!(80));
        assert!(after.is_consistent());
    }

    #[test]
    fn should_trim_names_on_validation() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let cleaned = demographics().validated(today).unwrap();
        assert_eq!(cleaned.first_name, "Ada");
        assert_eq!(cleaned.full_name(), "Ada Obi");
    }

    #[test]
    fn should_reject_bad_phone_numbers() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let mut bad = demographics();
        bad.phone = Some("call me".to_string());
        assert!(matches!(
            bad.validated(today),
            Err(ValidationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn should_only_count_bed_for_occupying_statuses() {
        assert!(PatientStatus::Admitted.occupies_bed());
        assert!(PatientStatus::PendingDischarge.occupies_bed());
        assert!(!PatientStatus::Discharged.occupies_bed());
        assert!(!PatientStatus::Outpatient.occupies_bed());
    }
}
