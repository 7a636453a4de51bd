// lib/src/services/discharge.rs

//! Two-step discharge: a clinician requests it, an approver settles it.
//!
//! Admitted -> PendingDischarge -> Discharged, or back to Admitted when the
//! request is rejected. Any other transition fails with `InvalidState`.

use std::sync::Arc;

use models::errors::require_text;
use models::{
    BedAssignment, HospitalError, HospitalResult, NotificationKind, Patient, PatientStatus,
};
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::session::SessionContext;
use crate::storage_engine::{
    query_typed, Collection, CollectionPath, Condition, DocumentStore, QueryFilter, StoreError, WriteBatch,
};

use super::accrual::{cursor_unchanged, AccrualService};
use super::notifications::{NotificationDraft, NotificationRouting, NotificationService};
use super::{load, DISCHARGE_REQUEST_FIELDS};

const BED_POINTER_FIELDS: [&str; 4] = ["currentWardId", "currentWardName", "currentBedNumber", "currentAdmissionId"];

#[derive(Debug, Clone)]
pub struct DischargeService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    accrual: AccrualService,
    notifications: NotificationService,
    routing: NotificationRouting,
}

impl DischargeService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        accrual: AccrualService,
        notifications: NotificationService,
        routing: NotificationRouting,
    ) -> Self {
        DischargeService { store, clock, accrual, notifications, routing }
    }

    pub async fn request_discharge(
        &self,
        session: &SessionContext,
        patient_id: &str,
        notes: Option<String>,
    ) -> HospitalResult<Patient> {
        let patient = self.patient(patient_id).await?;
        expect_status(&patient, PatientStatus::Admitted, "request discharge for")?;
        let notes = notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        let now = self.clock.now();

        let patients = Collection::Patients.path();
        let mut batch = WriteBatch::new();
        batch
            .expect(patients.clone(), patient_id, status_is(PatientStatus::Admitted))
            .merge(
                patients.clone(),
                patient_id,
                [
                    ("status", json!(PatientStatus::PendingDischarge)),
                    ("dischargeRequestedBy", json!(session.uid())),
                    ("dischargeRequestedAt", json!(now)),
                ],
            );
        match &notes {
            Some(notes) => batch.merge(patients, patient_id, [("dischargeNotes", json!(notes))]),
            None => batch.remove_fields(patients, patient_id, ["dischargeNotes"]),
        };

        let draft = NotificationDraft::new(
            NotificationKind::DischargeRequested,
            format!("Discharge requested: {}", patient.full_name()),
            format!(
                "{} ({}) is ready for discharge approval.{}",
                patient.full_name(),
                patient.hospital_number,
                notes.as_deref().map(|n| format!(" Notes: {}", n)).unwrap_or_default()
            ),
        )
        .from_sender(session.uid())
        .about_patient(patient_id);
        let approvers = self.notifications.recipients_with_roles(&self.routing.discharge_approvers).await?;
        for approver in approvers.iter().filter(|u| u.uid != session.uid()) {
            self.notifications.stage(&mut batch, &approver.uid, &draft)?;
        }

        self.commit_transition(batch, &patient).await?;
        info!(patient_id, by = session.uid(), approvers = approvers.len(), "Discharge requested");
        self.patient(patient_id).await
    }

    /// Discharges a patient whose balance is settled, releasing the bed and
    /// closing the admission record. Outstanding bed-days are billed first;
    /// while another accrual for the patient is running this fails with
    /// `Conflict` and nothing changes.
    pub async fn approve_discharge(&self, session: &SessionContext, patient_id: &str) -> HospitalResult<Patient> {
        let patient = self.patient(patient_id).await?;
        expect_status(&patient, PatientStatus::PendingDischarge, "approve discharge for")?;
        let admission = self.accrual.settle(session, patient_id).await?;
        let patient = self.patient(patient_id).await?;
        expect_status(&patient, PatientStatus::PendingDischarge, "approve discharge for")?;
        if patient.financials.has_outstanding_balance() {
            return Err(HospitalError::invalid_state(format!(
                "patient {} has an outstanding balance of {}",
                patient.hospital_number, patient.financials.balance
            )));
        }

        let now = self.clock.now();
        let patients = Collection::Patients.path();
        let mut batch = WriteBatch::new();
        batch
            .expect(patients.clone(), patient_id, status_is(PatientStatus::PendingDischarge))
            .expect(
                patients.clone(),
                patient_id,
                Condition::FieldAtMost("financials.balance".to_string(), Decimal::ZERO),
            )
            .merge(patients.clone(), patient_id, [("status", json!(PatientStatus::Discharged))])
            .remove_fields(patients.clone(), patient_id, BED_POINTER_FIELDS)
            .remove_fields(patients, patient_id, DISCHARGE_REQUEST_FIELDS);
        if let Some(record) = &admission {
            let history = CollectionPath::admission_history(patient_id);
            let mut closing = vec![("dischargeDate", json!(now)), ("dischargedBy", json!(session.uid()))];
            if let Some(notes) = &patient.discharge_notes {
                closing.push(("dischargeNotes", json!(notes)));
            }
            batch
                .expect(history.clone(), record.id.clone(), cursor_unchanged(record))
                .merge(history, record.id.clone(), closing);
        }
        if let Some((ward_id, bed)) = patient.bed() {
            batch.delete(Collection::BedAssignments, BedAssignment::key(ward_id, bed));
        }
        if let Some(requester) = patient.discharge_requested_by.as_deref() {
            let draft = NotificationDraft::new(
                NotificationKind::DischargeApproved,
                format!("Discharge approved: {}", patient.full_name()),
                format!("{} ({}) has been discharged.", patient.full_name(), patient.hospital_number),
            )
            .from_sender(session.uid())
            .about_patient(patient_id);
            self.notifications.stage(&mut batch, requester, &draft)?;
        }

        self.commit_transition(batch, &patient).await?;
        info!(
            patient_id,
            ward = patient.current_ward_name.as_deref().unwrap_or("-"),
            by = session.uid(),
            "Patient discharged"
        );
        self.patient(patient_id).await
    }

    /// Sends a pending discharge back to Admitted; the bed is kept.
    pub async fn reject_discharge(
        &self,
        session: &SessionContext,
        patient_id: &str,
        reason: &str,
    ) -> HospitalResult<Patient> {
        let reason = require_text("reason", reason)?;
        let patient = self.patient(patient_id).await?;
        expect_status(&patient, PatientStatus::PendingDischarge, "reject discharge for")?;

        let patients = Collection::Patients.path();
        let mut batch = WriteBatch::new();
        batch
            .expect(patients.clone(), patient_id, status_is(PatientStatus::PendingDischarge))
            .merge(patients.clone(), patient_id, [("status", json!(PatientStatus::Admitted))])
            .remove_fields(patients, patient_id, DISCHARGE_REQUEST_FIELDS);
        match patient.discharge_requested_by.as_deref() {
            Some(requester) => {
                let draft = NotificationDraft::new(
                    NotificationKind::DischargeRejected,
                    format!("Discharge rejected: {}", patient.full_name()),
                    format!("Discharge of {} ({}) was rejected: {}", patient.full_name(), patient.hospital_number, reason),
                )
                .from_sender(session.uid())
                .about_patient(patient_id);
                self.notifications.stage(&mut batch, requester, &draft)?;
            }
            None => warn!(patient_id, "Pending discharge carries no requester to notify"),
        }

        self.commit_transition(batch, &patient).await?;
        info!(patient_id, by = session.uid(), %reason, "Discharge rejected");
        self.patient(patient_id).await
    }

    /// Patients awaiting approval, oldest request first.
    pub async fn pending_discharges(&self) -> HospitalResult<Vec<Patient>> {
        let filters = [QueryFilter::eq("status", json!(PatientStatus::PendingDischarge))];
        let mut pending: Vec<Patient> = query_typed(self.store.as_ref(), &Collection::Patients.path(), &filters).await?;
        pending.sort_by(|a, b| a.discharge_requested_at.cmp(&b.discharge_requested_at));
        Ok(pending)
    }

    async fn patient(&self, patient_id: &str) -> HospitalResult<Patient> {
        load(self.store.as_ref(), &Collection::Patients.path(), patient_id, "Patient").await
    }

    async fn commit_transition(&self, batch: WriteBatch, patient: &Patient) -> HospitalResult<()> {
        match self.store.commit(batch).await {
            Ok(()) => Ok(()),
            Err(StoreError::PreconditionFailed { reason, .. }) => Err(HospitalError::invalid_state(format!(
                "patient {} changed during the discharge step: {}",
                patient.hospital_number, reason
            ))),
            Err(e) => Err(e.into()),
        }
    }
}

fn status_is(status: PatientStatus) -> Condition {
    Condition::FieldEquals("status".to_string(), json!(status))
}

fn expect_status(patient: &Patient, wanted: PatientStatus, action: &str) -> HospitalResult<()> {
    if patient.status != wanted {
        return Err(HospitalError::invalid_state(format!(
            "cannot {} patient {} in status {}",
            action, patient.hospital_number, patient.status
        )));
    }
    Ok(())
}
