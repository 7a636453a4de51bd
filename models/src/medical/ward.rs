// models/src/medical/ward.rs

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::{require_text, ValidationError, ValidationResult};
use crate::money::ensure_non_negative;

/// A ward. Beds are numbered `1..=total_beds` and are not stored individually.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ward {
    pub id: String,
    pub name: String,
    pub total_beds: u32,
    pub price_per_day: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Ward {
    pub fn validated(mut self) -> ValidationResult<Self> {
        self.name = require_text("ward name", &self.name)?;
        if self.total_beds == 0 {
            return Err(ValidationError::InvalidValue {
                field: "totalBeds".to_string(),
                reason: "a ward needs at least one bed".to_string(),
            });
        }
        self.price_per_day = ensure_non_negative("pricePerDay", self.price_per_day)?;
        Ok(self)
    }

    pub fn check_bed(&self, bed_number: u32) -> ValidationResult<()> {
        if bed_number == 0 || bed_number > self.total_beds {
            return Err(ValidationError::BedOutOfRange {
                bed: bed_number,
                total_beds: self.total_beds,
            });
        }
        Ok(())
    }
}

/// Upper bound on days billed by one accrual; more means a corrupt cursor.
pub const MAX_UNBILLED_DAYS: u32 = 3650;

/// One admission episode, stored under `patients/{id}/admissionHistory`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRecord {
    pub id: String,
    pub patient_id: String,
    pub ward_id: String,
    pub ward_name: String,
    pub bed_number: u32,
    pub admission_date: DateTime<Utc>,
    pub admitted_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_billed_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discharge_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discharged_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discharge_notes: Option<String>,
}

impl AdmissionRecord {
    pub fn is_open(&self) -> bool {
        self.discharge_date.is_none()
    }

    /// Where bed-charge accrual resumes from.
    pub fn billing_cursor(&self) -> DateTime<Utc> {
        self.last_billed_date.unwrap_or(self.admission_date)
    }

    /// Whole 24-hour periods between the cursor and `now`, capped one past
    /// [`MAX_UNBILLED_DAYS`].
    pub fn unbilled_days(&self, now: DateTime<Utc>) -> u32 {
        let elapsed = now - self.billing_cursor();
        if elapsed < Duration::zero() {
            return 0;
        }
        let days = elapsed.num_days().min(i64::from(MAX_UNBILLED_DAYS) + 1);
        u32::try_from(days).unwrap_or(MAX_UNBILLED_DAYS + 1)
    }
}

/// Claim on one bed, keyed `{wardId}:{bedNumber}`; at most one exists per bed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BedAssignment {
    pub ward_id: String,
    pub bed_number: u32,
    pub patient_id: String,
    pub admission_id: String,
    pub assigned_at: DateTime<Utc>,
}

impl BedAssignment {
    pub fn key(ward_id: &str, bed_number: u32) -> String {
        format!("{}:{}", ward_id, bed_number)
    }
}
