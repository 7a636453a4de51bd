// lib/src/services/registration.rs

use std::sync::Arc;

use chrono::{DateTime, Utc};
use models::{
    new_document_id, AdmissionRecord, Demographics, Financials, HospitalError, HospitalNumber, HospitalResult, Patient,
    PatientStatus, ValidationResult,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::BillingConfig;
use crate::session::SessionContext;
use crate::storage_engine::{
    list_typed, query_typed, to_document, Collection, DocumentStore, QueryFilter, SequenceBuilder, StoreError, StoreResult,
    WriteBatch,
};

use super::admission::{AdmissionRequest, AdmissionService};
use super::load;

/// Counter document and field backing hospital numbers.
pub const PATIENT_COUNTER_ID: &str = "patients";
pub const PATIENT_COUNTER_FIELD: &str = "current";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPatient {
    pub demographics: Demographics,
    /// Admits the patient right after registration.
    #[serde(default)]
    pub admission: Option<AdmissionRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub patient: Patient,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admission: Option<AdmissionRecord>,
    /// Set when the patient was registered but the requested admission failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admission_error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientSearch {
    /// Hospital number prefix or a fragment of the patient's name.
    #[serde(default)]
    pub term: Option<String>,
    #[serde(default)]
    pub status: Option<PatientStatus>,
}

#[derive(Debug, Clone)]
pub struct RegistrationService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    config: BillingConfig,
    admissions: AdmissionService,
}

struct PatientSeed {
    id: String,
    demographics: Demographics,
    registered_by: String,
    registered_at: DateTime<Utc>,
    config: BillingConfig,
}

impl PatientSeed {
    fn build(&self, sequence: u64) -> ValidationResult<Patient> {
        Ok(Patient {
            id: self.id.clone(),
            hospital_number: HospitalNumber::from_sequence(
                &self.config.hospital_number_prefix,
                self.config.hospital_number_width,
                sequence,
            )?,
            demographics: self.demographics.clone(),
            status: PatientStatus::Outpatient,
            financials: Financials::default(),
            current_ward_id: None,
            current_ward_name: None,
            current_bed_number: None,
            current_admission_id: None,
            discharge_requested_by: None,
            discharge_requested_at: None,
            discharge_notes: None,
            registered_by: self.registered_by.clone(),
            registered_at: self.registered_at,
        })
    }
}

impl RegistrationService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        config: BillingConfig,
        admissions: AdmissionService,
    ) -> Self {
        RegistrationService { store, clock, config, admissions }
    }

    /// Registers a patient under the next hospital number.
    ///
    /// The counter increment and the patient document commit in one
    /// transaction: a failed registration consumes no number and leaves no
    /// patient behind.
    pub async fn register(&self, session: &SessionContext, request: NewPatient) -> HospitalResult<Registration> {
        let now = self.clock.now();
        let demographics = request.demographics.validated(now.date_naive())?;
        HospitalNumber::from_sequence(&self.config.hospital_number_prefix, self.config.hospital_number_width, 1)?;
        if let Some(admission) = &request.admission {
            self.admissions
                .check_bed_available(&admission.ward_id, admission.bed_number)
                .await?;
        }

        let seed = Arc::new(PatientSeed {
            id: new_document_id(),
            demographics,
            registered_by: session.uid().to_string(),
            registered_at: now,
            config: self.config.clone(),
        });
        let build: SequenceBuilder = {
            let seed = seed.clone();
            Arc::new(move |sequence: u64| -> StoreResult<WriteBatch> {
                let patient = seed.build(sequence).map_err(|e| StoreError::Rejected(e.to_string()))?;
                let mut batch = WriteBatch::new();
                batch.create(Collection::Patients, patient.id.clone(), to_document(&patient)?);
                Ok(batch)
            })
        };
        let sequence = self
            .store
            .commit_with_sequence(PATIENT_COUNTER_ID, PATIENT_COUNTER_FIELD, build)
            .await
            .map_err(|e| HospitalError::TransactionError(format!("registration failed: {}", e)))?;
        let patient = seed.build(sequence)?;
        info!(
            patient_id = %patient.id,
            hospital_number = %patient.hospital_number,
            by = session.uid(),
            "Patient registered"
        );

        let (admission, admission_error) = match request.admission {
            None => (None, None),
            Some(admission) => match self.admissions.admit(session, &patient.id, admission).await {
                Ok(record) => (Some(record), None),
                Err(e) => {
                    warn!(patient_id = %patient.id, error = %e, "Registered patient could not be admitted");
                    (None, Some(e.to_string()))
                }
            },
        };
        let patient = match admission {
            Some(_) => self.get(&patient.id).await?,
            None => patient,
        };
        Ok(Registration { patient, admission, admission_error })
    }

    pub async fn get(&self, patient_id: &str) -> HospitalResult<Patient> {
        load(self.store.as_ref(), &Collection::Patients.path(), patient_id, "Patient").await
    }

    pub async fn find_by_hospital_number(&self, number: &str) -> HospitalResult<Option<Patient>> {
        let number: HospitalNumber = number.trim().to_ascii_uppercase().parse()?;
        let filters = [QueryFilter::eq("hospitalNumber", number.to_string())];
        let mut found: Vec<Patient> = query_typed(self.store.as_ref(), &Collection::Patients.path(), &filters).await?;
        Ok(found.pop())
    }

    /// All patients ordered by hospital number.
    pub async fn list(&self) -> HospitalResult<Vec<Patient>> {
        let mut patients: Vec<Patient> = list_typed(self.store.as_ref(), &Collection::Patients.path()).await?;
        patients.sort_by(|a, b| a.hospital_number.cmp(&b.hospital_number));
        Ok(patients)
    }

    pub async fn search(&self, search: &PatientSearch) -> HospitalResult<Vec<Patient>> {
        let term = search
            .term
            .as_deref()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty());
        let patients = self.list().await?;
        Ok(patients
            .into_iter()
            .filter(|p| search.status.map_or(true, |status| p.status == status))
            .filter(|p| match &term {
                None => true,
                Some(term) => {
                    p.hospital_number.to_string().to_lowercase().starts_with(term.as_str())
                        || p.full_name().to_lowercase().contains(term.as_str())
                }
            })
            .collect())
    }

    /// Replaces the demographic block of a patient record.
    pub async fn update_demographics(
        &self,
        session: &SessionContext,
        patient_id: &str,
        demographics: Demographics,
    ) -> HospitalResult<Patient> {
        self.get(patient_id).await?;
        let demographics = demographics.validated(self.clock.now().date_naive())?;
        let mut batch = WriteBatch::new();
        batch.merge(Collection::Patients, patient_id, [("demographics", to_document(&demographics)?)]);
        self.store.commit(batch).await?;
        info!(patient_id, by = session.uid(), "Patient demographics updated");
        self.get(patient_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::services::accrual::AccrualService;
    use crate::services::wards::WardService;
    use crate::storage_engine::InMemoryStore;
    use models::Gender;

    fn service() -> RegistrationService {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryStore::new());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let wards = WardService::new(store.clone(), clock.clone());
        let accrual = AccrualService::new(store.clone(), clock.clone());
        let admissions = AdmissionService::new(store.clone(), clock.clone(), wards, accrual);
        RegistrationService::new(store, clock, BillingConfig::default(), admissions)
    }

    fn new_patient(first: &str, last: &str) -> NewPatient {
        NewPatient {
            demographics: Demographics {
                first_name: first.to_string(),
                last_name: last.to_string(),
                other_names: None,
                gender: Gender::Male,
                date_of_birth: None,
                phone: None,
                address: None,
                next_of_kin: None,
            },
            admission: None,
        }
    }

    #[tokio::test]
    async fn should_issue_sequential_hospital_numbers() {
        let registration = service();
        let session = SessionContext::system();
        let first = registration.register(&session, new_patient("Ada", "Obi")).await.unwrap();
        let second = registration.register(&session, new_patient("Musa", "Bello")).await.unwrap();
        assert_eq!(first.patient.hospital_number.to_string(), "MH0001");
        assert_eq!(second.patient.hospital_number.to_string(), "MH0002");
        assert_eq!(first.patient.status, PatientStatus::Outpatient);
        assert!(first.patient.financials.is_consistent());
    }

    #[tokio::test]
    async fn should_not_consume_number_on_invalid_input() {
        let registration = service();
        let session = SessionContext::system();
        let err = registration.register(&session, new_patient("  ", "Obi")).await.unwrap_err();
        assert!(matches!(err, HospitalError::Validation(_)));
        let ok = registration.register(&session, new_patient("Ada", "Obi")).await.unwrap();
        assert_eq!(ok.patient.hospital_number.sequence(), 1);
    }

    #[tokio::test]
    async fn should_search_by_number_prefix_and_name() {
        let registration = service();
        let session = SessionContext::system();
        registration.register(&session, new_patient("Ada", "Obi")).await.unwrap();
        registration.register(&session, new_patient("Musa", "Bello")).await.unwrap();

        let by_name = registration
            .search(&PatientSearch { term: Some("bell".to_string()), status: None })
            .await
            .unwrap();
        assert_eq!(by_name.len(), 1);
        let found = registration.find_by_hospital_number("mh0002").await.unwrap().unwrap();
        assert_eq!(found.demographics.first_name, "Musa");
        let outpatients = registration
            .search(&PatientSearch { term: None, status: Some(PatientStatus::Outpatient) })
            .await
            .unwrap();
        assert_eq!(outpatients.len(), 2);
    }
}
