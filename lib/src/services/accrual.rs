// lib/src/services/accrual.rs

//! Automatic day-by-day bed charges for patients holding a bed.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Duration;
use models::{
    new_document_id, AdmissionRecord, Bill, BillItem, BillItemKind, BillStatus, HospitalError, HospitalResult, Patient,
    PatientStatus, Ward, MAX_UNBILLED_DAYS,
};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::session::{SessionContext, SYSTEM_UID};
use crate::storage_engine::{
    fetch, query_typed, to_document, Collection, CollectionPath, Condition, Delta, DocumentStore, QueryFilter, StoreError,
    WriteBatch,
};

use super::load;

/// Patients with an accrual run in flight in this process.
#[derive(Debug, Clone, Default)]
pub struct AccrualGuard {
    in_flight: Arc<Mutex<HashSet<String>>>,
}

/// Releases the patient when dropped.
#[derive(Debug)]
pub struct AccrualPermit {
    guard: AccrualGuard,
    patient_id: String,
}

impl AccrualGuard {
    pub fn try_acquire(&self, patient_id: &str) -> Option<AccrualPermit> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(patient_id.to_string()) {
            return None;
        }
        Some(AccrualPermit { guard: self.clone(), patient_id: patient_id.to_string() })
    }

    pub fn is_running(&self, patient_id: &str) -> bool {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner).contains(patient_id)
    }
}

impl Drop for AccrualPermit {
    fn drop(&mut self) {
        self.guard
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.patient_id);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AccrualOutcome {
    Billed { bill: Bill, days: u32 },
    /// Less than one whole day since the cursor.
    NothingDue,
    /// The patient holds no bed or has no open admission.
    NotApplicable,
    /// Another run for this patient is in flight or committed first.
    AlreadyRunning,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccrualSummary {
    pub patients_checked: usize,
    pub bills_created: usize,
    pub days_billed: u32,
    pub amount_billed: Decimal,
    pub failures: usize,
}

#[derive(Debug, Clone)]
pub struct AccrualService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    guard: AccrualGuard,
}

impl AccrualService {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        AccrualService { store, clock, guard: AccrualGuard::default() }
    }

    pub fn guard(&self) -> &AccrualGuard {
        &self.guard
    }

    /// Bills every whole day elapsed since the admission's billing cursor as
    /// one unpaid bill, and advances the cursor by those days.
    pub async fn accrue(&self, session: &SessionContext, patient_id: &str) -> HospitalResult<AccrualOutcome> {
        let Some(_permit) = self.guard.try_acquire(patient_id) else {
            debug!(patient_id, "Accrual already in flight");
            return Ok(AccrualOutcome::AlreadyRunning);
        };
        let patient: Patient = load(self.store.as_ref(), &Collection::Patients.path(), patient_id, "Patient").await?;
        let (Some(_), Some(admission_id)) = (patient.bed(), patient.current_admission_id.as_deref()) else {
            return Ok(AccrualOutcome::NotApplicable);
        };
        let history = CollectionPath::admission_history(patient_id);
        let record: AdmissionRecord = load(self.store.as_ref(), &history, admission_id, "Admission record").await?;
        if !record.is_open() {
            return Ok(AccrualOutcome::NotApplicable);
        }
        let now = self.clock.now();
        let days = record.unbilled_days(now);
        if days == 0 {
            return Ok(AccrualOutcome::NothingDue);
        }
        if days > MAX_UNBILLED_DAYS {
            return Err(HospitalError::invalid_state(format!(
                "admission {} has {} unbilled days since {}; check its billing cursor",
                record.id,
                days,
                record.billing_cursor()
            )));
        }
        let ward: Ward = load(self.store.as_ref(), &Collection::Wards.path(), &record.ward_id, "Ward").await?;

        let bill = bed_charge_bill(&patient, &record, &ward, days, now);
        let cursor = record.billing_cursor();
        let new_cursor = cursor + Duration::days(i64::from(days));

        let patients = Collection::Patients.path();
        let mut batch = WriteBatch::new();
        batch
            .create(Collection::Bills, bill.id.clone(), to_document(&bill)?)
            .expect(
                patients.clone(),
                patient_id,
                Condition::FieldEquals("currentAdmissionId".to_string(), json!(record.id)),
            )
            .increment(patients.clone(), patient_id, "financials.totalBill", Delta::Decimal(bill.total_bill))
            .increment(patients, patient_id, "financials.balance", Delta::Decimal(bill.total_bill))
            .expect(history.clone(), record.id.clone(), cursor_unchanged(&record))
            .merge(history, record.id.clone(), [("lastBilledDate", json!(new_cursor))]);

        match self.store.commit(batch).await {
            Ok(()) => {}
            Err(StoreError::PreconditionFailed { reason, .. }) => {
                warn!(patient_id, %reason, "Bed charges were accrued concurrently; skipping");
                return Ok(AccrualOutcome::AlreadyRunning);
            }
            Err(e) => return Err(e.into()),
        }
        info!(
            patient_id,
            bill_id = %bill.id,
            days,
            amount = %bill.total_bill,
            triggered_by = session.uid(),
            "Bed charges accrued"
        );
        Ok(AccrualOutcome::Billed { bill, days })
    }

    /// Bills everything due before a bed is released or changed. Fails with
    /// `Conflict` while another run for the patient is in flight, so no day
    /// is left unbilled. Returns the open admission record as of the
    /// settled cursor; pin it with [`cursor_unchanged`] in the follow-up batch.
    pub async fn settle(&self, session: &SessionContext, patient_id: &str) -> HospitalResult<Option<AdmissionRecord>> {
        if self.accrue(session, patient_id).await? == AccrualOutcome::AlreadyRunning {
            return Err(HospitalError::Conflict(format!(
                "bed charges for patient {} are being accrued; retry shortly",
                patient_id
            )));
        }
        let patient: Patient = load(self.store.as_ref(), &Collection::Patients.path(), patient_id, "Patient").await?;
        match patient.current_admission_id.as_deref() {
            Some(admission_id) => {
                Ok(fetch(self.store.as_ref(), &CollectionPath::admission_history(patient_id), admission_id).await?)
            }
            None => Ok(None),
        }
    }

    /// Runs `accrue` for every bed-occupying patient; individual failures
    /// are logged and counted, never fatal to the sweep.
    pub async fn accrue_all(&self, session: &SessionContext) -> HospitalResult<AccrualSummary> {
        let filters = [QueryFilter::any_of(
            "status",
            vec![json!(PatientStatus::Admitted), json!(PatientStatus::PendingDischarge)],
        )];
        let patients: Vec<Patient> = query_typed(self.store.as_ref(), &Collection::Patients.path(), &filters).await?;
        let mut summary = AccrualSummary::default();
        for patient in patients {
            summary.patients_checked += 1;
            match self.accrue(session, &patient.id).await {
                Ok(AccrualOutcome::Billed { bill, days }) => {
                    summary.bills_created += 1;
                    summary.days_billed += days;
                    summary.amount_billed += bill.total_bill;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(patient_id = %patient.id, error = %e, "Accrual failed");
                    summary.failures += 1;
                }
            }
        }
        Ok(summary)
    }
}

/// Holds when no accrual has moved the record's cursor since it was read.
pub fn cursor_unchanged(record: &AdmissionRecord) -> Condition {
    Condition::FieldEquals("lastBilledDate".to_string(), json!(record.last_billed_date))
}

/// Builds the unpaid bill for `days` bed-days starting at the cursor.
fn bed_charge_bill(
    patient: &Patient,
    record: &AdmissionRecord,
    ward: &Ward,
    days: u32,
    now: chrono::DateTime<chrono::Utc>,
) -> Bill {
    let cursor = record.billing_cursor();
    let days_before_cursor = (cursor - record.admission_date).num_days().max(0);
    let items: Vec<BillItem> = (0..days)
        .map(|offset| {
            let day_start = cursor + Duration::days(i64::from(offset));
            let day_number = days_before_cursor + i64::from(offset) + 1;
            BillItem::new(
                format!(
                    "Bed charge - {} (Bed {}) - Day {} ({})",
                    record.ward_name,
                    record.bed_number,
                    day_number,
                    day_start.format("%Y-%m-%d")
                ),
                1,
                ward.price_per_day,
                BillItemKind::BedCharge,
            )
        })
        .collect();
    let total = Bill::total_of(&items);
    Bill {
        id: new_document_id(),
        patient_id: patient.id.clone(),
        hospital_number: patient.hospital_number.clone(),
        patient_name: patient.full_name(),
        items,
        total_bill: total,
        amount_paid_at_time_of_bill: Decimal::ZERO,
        balance: total,
        status: BillStatus::Unpaid,
        payment_method: None,
        processed_by: SYSTEM_UID.to_string(),
        created_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_release_guard_when_permit_drops() {
        let guard = AccrualGuard::default();
        let permit = guard.try_acquire("p-1").unwrap();
        assert!(guard.try_acquire("p-1").is_none());
        assert!(guard.try_acquire("p-2").is_some());
        drop(permit);
        assert!(!guard.is_running("p-1"));
        assert!(guard.try_acquire("p-1").is_some());
    }
}
