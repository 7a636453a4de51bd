// lib/src/services/admission.rs

use std::sync::Arc;

use models::{
    new_document_id, AdmissionRecord, BedAssignment, HospitalError, HospitalResult, Patient, PatientStatus,
    ValidationError, Ward,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::clock::Clock;
use crate::session::SessionContext;
use crate::storage_engine::{
    fetch, list_typed, to_document, Collection, CollectionPath, Condition, DocumentStore, StoreError, WriteBatch,
};

use super::accrual::{cursor_unchanged, AccrualService};
use super::wards::WardService;
use super::{load, DISCHARGE_REQUEST_FIELDS};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    pub ward_id: String,
    pub bed_number: u32,
}

#[derive(Debug, Clone)]
pub struct AdmissionService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    wards: WardService,
    accrual: AccrualService,
}

impl AdmissionService {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>, wards: WardService, accrual: AccrualService) -> Self {
        AdmissionService { store, clock, wards, accrual }
    }

    /// Opens an admission episode and claims the bed.
    ///
    /// The bed claim document makes a second admission into the same bed
    /// fail at commit time even when both admitting users saw it free.
    pub async fn admit(
        &self,
        session: &SessionContext,
        patient_id: &str,
        request: AdmissionRequest,
    ) -> HospitalResult<AdmissionRecord> {
        let patient: Patient = load(self.store.as_ref(), &Collection::Patients.path(), patient_id, "Patient").await?;
        if patient.status.occupies_bed() {
            return Err(HospitalError::invalid_state(format!(
                "patient {} is already {}",
                patient.hospital_number, patient.status
            )));
        }
        let ward = self.wards.get(&request.ward_id).await?;
        self.ensure_bed_free(&ward, request.bed_number).await?;

        let now = self.clock.now();
        let record = AdmissionRecord {
            id: new_document_id(),
            patient_id: patient.id.clone(),
            ward_id: ward.id.clone(),
            ward_name: ward.name.clone(),
            bed_number: request.bed_number,
            admission_date: now,
            admitted_by: session.uid().to_string(),
            last_billed_date: None,
            discharge_date: None,
            discharged_by: None,
            discharge_notes: None,
        };
        let claim = BedAssignment {
            ward_id: ward.id.clone(),
            bed_number: request.bed_number,
            patient_id: patient.id.clone(),
            admission_id: record.id.clone(),
            assigned_at: now,
        };

        let patients = Collection::Patients.path();
        let mut batch = WriteBatch::new();
        batch
            .expect(patients.clone(), patient_id, Condition::FieldEquals("status".to_string(), json!(patient.status)))
            .create(CollectionPath::admission_history(patient_id), record.id.clone(), to_document(&record)?)
            .create(
                Collection::BedAssignments,
                BedAssignment::key(&ward.id, request.bed_number),
                to_document(&claim)?,
            )
            .merge(
                patients.clone(),
                patient_id,
                [
                    ("status", json!(PatientStatus::Admitted)),
                    ("currentWardId", json!(ward.id)),
                    ("currentWardName", json!(ward.name)),
                    ("currentBedNumber", json!(request.bed_number)),
                    ("currentAdmissionId", json!(record.id)),
                ],
            )
            .remove_fields(patients, patient_id, DISCHARGE_REQUEST_FIELDS);
        self.commit_claiming(batch, &ward, request.bed_number).await?;
        info!(
            patient_id,
            ward = %ward.name,
            bed = request.bed_number,
            admission_id = %record.id,
            by = session.uid(),
            "Patient admitted"
        );
        Ok(record)
    }

    /// Moves an admitted patient to another bed, billing the days spent in
    /// the old bed at the old ward's rate first.
    pub async fn transfer(
        &self,
        session: &SessionContext,
        patient_id: &str,
        request: AdmissionRequest,
    ) -> HospitalResult<AdmissionRecord> {
        let patient: Patient = load(self.store.as_ref(), &Collection::Patients.path(), patient_id, "Patient").await?;
        let (Some((old_ward_id, old_bed)), Some(admission_id)) =
            (patient.bed(), patient.current_admission_id.as_deref())
        else {
            return Err(HospitalError::invalid_state(format!(
                "patient {} does not hold a bed",
                patient.hospital_number
            )));
        };
        if old_ward_id == request.ward_id && old_bed == request.bed_number {
            return Err(ValidationError::InvalidValue {
                field: "bedNumber".to_string(),
                reason: "the patient already occupies this bed".to_string(),
            }
            .into());
        }
        let ward = self.wards.get(&request.ward_id).await?;
        self.ensure_bed_free(&ward, request.bed_number).await?;

        let record = self
            .accrual
            .settle(session, patient_id)
            .await?
            .ok_or_else(|| HospitalError::not_found("Admission record", admission_id))?;
        let history = CollectionPath::admission_history(patient_id);
        let claim = BedAssignment {
            ward_id: ward.id.clone(),
            bed_number: request.bed_number,
            patient_id: patient.id.clone(),
            admission_id: record.id.clone(),
            assigned_at: self.clock.now(),
        };

        let patients = Collection::Patients.path();
        let mut batch = WriteBatch::new();
        batch
            .expect(
                patients.clone(),
                patient_id,
                Condition::FieldEquals("currentBedNumber".to_string(), json!(old_bed)),
            )
            .expect(
                patients.clone(),
                patient_id,
                Condition::FieldEquals("currentWardId".to_string(), json!(old_ward_id)),
            )
            .expect(history.clone(), record.id.clone(), cursor_unchanged(&record))
            .delete(Collection::BedAssignments, BedAssignment::key(old_ward_id, old_bed))
            .create(
                Collection::BedAssignments,
                BedAssignment::key(&ward.id, request.bed_number),
                to_document(&claim)?,
            )
            .merge(
                patients,
                patient_id,
                [
                    ("currentWardId", json!(ward.id)),
                    ("currentWardName", json!(ward.name)),
                    ("currentBedNumber", json!(request.bed_number)),
                ],
            )
            .merge(
                history,
                record.id.clone(),
                [
                    ("wardId", json!(ward.id)),
                    ("wardName", json!(ward.name)),
                    ("bedNumber", json!(request.bed_number)),
                ],
            );
        self.commit_claiming(batch, &ward, request.bed_number).await?;
        info!(patient_id, ward = %ward.name, bed = request.bed_number, by = session.uid(), "Patient transferred");
        Ok(AdmissionRecord {
            ward_id: ward.id,
            ward_name: ward.name,
            bed_number: request.bed_number,
            ..record
        })
    }

    /// Admission episodes of a patient, newest first.
    pub async fn history(&self, patient_id: &str) -> HospitalResult<Vec<AdmissionRecord>> {
        let mut records: Vec<AdmissionRecord> =
            list_typed(self.store.as_ref(), &CollectionPath::admission_history(patient_id)).await?;
        records.sort_by(|a, b| b.admission_date.cmp(&a.admission_date));
        Ok(records)
    }

    pub async fn current_admission(&self, patient: &Patient) -> HospitalResult<Option<AdmissionRecord>> {
        match patient.current_admission_id.as_deref() {
            Some(id) => Ok(fetch(self.store.as_ref(), &CollectionPath::admission_history(&patient.id), id).await?),
            None => Ok(None),
        }
    }

    /// Checks, without claiming it, that a bed exists and is free right now.
    pub async fn check_bed_available(&self, ward_id: &str, bed_number: u32) -> HospitalResult<Ward> {
        let ward = self.wards.get(ward_id).await?;
        self.ensure_bed_free(&ward, bed_number).await?;
        Ok(ward)
    }

    async fn ensure_bed_free(&self, ward: &Ward, bed_number: u32) -> HospitalResult<()> {
        ward.check_bed(bed_number)?;
        let claimed = self
            .store
            .get(&Collection::BedAssignments.path(), &BedAssignment::key(&ward.id, bed_number))
            .await?
            .is_some();
        let pointed_at = self
            .wards
            .occupants(&ward.id)
            .await?
            .iter()
            .any(|p| p.current_bed_number == Some(bed_number));
        if claimed || pointed_at {
            return Err(bed_taken(ward, bed_number));
        }
        Ok(())
    }

    async fn commit_claiming(&self, batch: WriteBatch, ward: &Ward, bed_number: u32) -> HospitalResult<()> {
        match self.store.commit(batch).await {
            Ok(()) => Ok(()),
            Err(StoreError::AlreadyExists { path, .. }) if path == Collection::BedAssignments.name() => {
                Err(bed_taken(ward, bed_number))
            }
            Err(StoreError::PreconditionFailed { reason, .. }) => {
                Err(HospitalError::Conflict(format!("patient changed while updating the bed: {}", reason)))
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn bed_taken(ward: &Ward, bed_number: u32) -> HospitalError {
    HospitalError::Conflict(format!("bed {} in ward '{}' is already occupied", bed_number, ward.name))
}
